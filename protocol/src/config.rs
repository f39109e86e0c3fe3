//! # Protocol Configuration & Constants
//!
//! Every magic number in bankwire lives here. Both endpoints must agree on
//! all of these, so changing one means redeploying the ATM fleet and the
//! bank together.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string reported by `bankwire version`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Envelope cipher. CBC with PKCS#7 padding and a random IV per message.
pub const SYMMETRIC_ALGORITHM: &str = "AES-256-CBC";

/// AES-256 key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES block size, which is also the IV length for CBC.
pub const AES_BLOCK_LENGTH: usize = 16;

/// CBC initialization vector length in bytes. Always one block.
pub const AES_IV_LENGTH: usize = AES_BLOCK_LENGTH;

/// Integrity code over `timestamp,ciphertext`.
pub const MAC_ALGORITHM: &str = "HMAC-SHA256";

/// MAC key length in bytes. One full SHA-256 block, so HMAC never has to
/// pre-hash the key.
pub const MAC_KEY_LENGTH: usize = 64;

/// HMAC-SHA256 output length in bytes.
pub const MAC_TAG_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Maximum tolerated distance between an envelope's timestamp and the
/// receiver's clock, in milliseconds (~2.7 hours).
///
/// This bounds clock skew between ATM and bank, not network latency. Replays
/// inside the window are the watermark's job.
pub const FRESHNESS_WINDOW_MS: u64 = 10_000_000;

/// How long the terminal waits for a sealed response before giving up.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Terminal Parameters
// ---------------------------------------------------------------------------

/// PINs are exactly this many ASCII digits.
pub const PIN_LENGTH: usize = 4;

/// File extension of card files in the card directory.
pub const CARD_FILE_EXTENSION: &str = "card";

/// Console prompt while no user is logged in.
pub const ATM_PROMPT: &str = "ATM: ";

/// Asked after `begin-session <user>`.
pub const PIN_PROMPT: &str = "PIN? ";

/// Console prompt of the bank operator.
pub const BANK_PROMPT: &str = "Bank: ";

// ---------------------------------------------------------------------------
// Network Parameters
// ---------------------------------------------------------------------------

/// Default relay port the bank connects to.
pub const DEFAULT_BANK_PORT: u16 = 2101;

/// Default relay port ATMs connect to.
pub const DEFAULT_ATM_PORT: u16 = 2102;

/// Longest envelope line either endpoint will buffer. A sealed command is a
/// few hundred bytes; anything past this is garbage from the relay.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

// ---------------------------------------------------------------------------
// Demo Accounts
// ---------------------------------------------------------------------------

/// Accounts seeded by `bankwire init` and by the bank when no accounts file
/// is given: `(name, balance, pin, card secret)`.
pub const DEMO_ACCOUNTS: &[(&str, u64, &str, &str)] = &[
    ("Alice", 100, "1234", "alice-card-7f3a9c"),
    ("Bob", 100, "2345", "bob-card-51d2e8"),
    ("Carol", 0, "3456", "carol-card-0b64f1"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_parameter_sizes() {
        assert_eq!(AES_KEY_LENGTH, 32);
        assert_eq!(AES_IV_LENGTH, 16);
        assert_eq!(MAC_TAG_LENGTH, 32);
        assert_eq!(MAC_KEY_LENGTH, 64);
    }

    #[test]
    fn test_timing_constants_sanity() {
        // The window tolerates skew; the response wait is about latency.
        assert!(RESPONSE_TIMEOUT.as_millis() < u128::from(FRESHNESS_WINDOW_MS));
    }

    #[test]
    fn test_demo_accounts_have_valid_pins() {
        for (name, _, pin, card) in DEMO_ACCOUNTS {
            assert_eq!(pin.len(), PIN_LENGTH, "bad pin for {name}");
            assert!(pin.bytes().all(|b| b.is_ascii_digit()));
            assert!(!card.is_empty());
            assert!(!name.contains(':'), "names must not collide with the grammar");
        }
    }
}
