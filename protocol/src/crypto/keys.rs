//! # Channel Key Material
//!
//! The pre-shared secrets both endpoints load at startup: one AES-256 key
//! for confidentiality and one HMAC-SHA256 key for integrity. Keys are
//! distributed out of band and never change for the lifetime of a process.
//!
//! ## Security considerations
//!
//! - Key bytes are zeroized on drop.
//! - `Debug` is redacted. Key bytes are never logged.
//! - Raw bytes are only reachable from inside the crate, so the only way to
//!   use a [`ChannelKeys`] is to hand it to a
//!   [`SecureChannel`](crate::channel::SecureChannel).
//!
//! ## Key file format
//!
//! Two lines of hex: the cipher key, then the MAC key. Blank lines and lines
//! starting with `#` are ignored.
//!
//! ```text
//! # bankwire channel keys
//! 000102...1f
//! 404142...7f
//! ```

use std::fmt;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{AES_KEY_LENGTH, MAC_KEY_LENGTH};

/// Errors that can occur while loading key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid cipher key: expected {AES_KEY_LENGTH} hex-encoded bytes")]
    InvalidCipherKey,

    #[error("invalid MAC key: expected {MAC_KEY_LENGTH} hex-encoded bytes")]
    InvalidMacKey,

    #[error("malformed key file: expected exactly two hex lines, found {0}")]
    MalformedKeyFile(usize),

    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Symmetric key material shared by the ATM and the bank.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChannelKeys {
    cipher_key: [u8; AES_KEY_LENGTH],
    mac_key: [u8; MAC_KEY_LENGTH],
}

impl ChannelKeys {
    /// Builds key material from raw bytes.
    pub fn new(cipher_key: [u8; AES_KEY_LENGTH], mac_key: [u8; MAC_KEY_LENGTH]) -> Self {
        Self {
            cipher_key,
            mac_key,
        }
    }

    /// Generates fresh keys from the OS RNG. Used by `bankwire init`.
    pub fn generate() -> Self {
        let mut cipher_key = [0u8; AES_KEY_LENGTH];
        let mut mac_key = [0u8; MAC_KEY_LENGTH];
        OsRng.fill_bytes(&mut cipher_key);
        OsRng.fill_bytes(&mut mac_key);
        Self::new(cipher_key, mac_key)
    }

    /// Parses a hex cipher key and a hex MAC key.
    pub fn from_hex(cipher_hex: &str, mac_hex: &str) -> Result<Self, KeyError> {
        let mut cipher_key = [0u8; AES_KEY_LENGTH];
        hex::decode_to_slice(cipher_hex.trim(), &mut cipher_key)
            .map_err(|_| KeyError::InvalidCipherKey)?;

        let mut mac_key = [0u8; MAC_KEY_LENGTH];
        if hex::decode_to_slice(mac_hex.trim(), &mut mac_key).is_err() {
            cipher_key.zeroize();
            return Err(KeyError::InvalidMacKey);
        }

        Ok(Self::new(cipher_key, mac_key))
    }

    /// Parses the contents of a key file.
    pub fn from_key_file_contents(contents: &str) -> Result<Self, KeyError> {
        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        match lines.as_slice() {
            [cipher_hex, mac_hex] => Self::from_hex(cipher_hex, mac_hex),
            other => Err(KeyError::MalformedKeyFile(other.len())),
        }
    }

    /// Reads and parses a key file from disk.
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        let mut contents = std::fs::read_to_string(path).map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let keys = Self::from_key_file_contents(&contents);
        contents.zeroize();
        keys
    }

    /// Renders the key file format. The caller is responsible for writing it
    /// somewhere with sane permissions.
    pub fn to_key_file_contents(&self) -> String {
        format!(
            "# bankwire channel keys: cipher key, then MAC key\n{}\n{}\n",
            hex::encode(self.cipher_key),
            hex::encode(self.mac_key),
        )
    }

    pub(crate) fn cipher_key(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.cipher_key
    }

    pub(crate) fn mac_key(&self) -> &[u8; MAC_KEY_LENGTH] {
        &self.mac_key
    }
}

impl fmt::Debug for ChannelKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelKeys")
            .field("cipher_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_roundtrip() {
        let keys = ChannelKeys::generate();
        let contents = keys.to_key_file_contents();
        let loaded = ChannelKeys::from_key_file_contents(&contents).unwrap();

        assert_eq!(loaded.cipher_key(), keys.cipher_key());
        assert_eq!(loaded.mac_key(), keys.mac_key());
    }

    #[test]
    fn generated_keys_differ() {
        let a = ChannelKeys::generate();
        let b = ChannelKeys::generate();
        assert_ne!(a.cipher_key(), b.cipher_key());
        assert_ne!(a.mac_key(), b.mac_key());
    }

    #[test]
    fn short_cipher_key_rejected() {
        let result = ChannelKeys::from_hex(&"00".repeat(16), &"11".repeat(MAC_KEY_LENGTH));
        assert!(matches!(result, Err(KeyError::InvalidCipherKey)));
    }

    #[test]
    fn non_hex_mac_key_rejected() {
        let result = ChannelKeys::from_hex(&"00".repeat(AES_KEY_LENGTH), &"zz".repeat(64));
        assert!(matches!(result, Err(KeyError::InvalidMacKey)));
    }

    #[test]
    fn key_file_with_extra_line_rejected() {
        let contents = format!("{}\n{}\n{}\n", "00".repeat(32), "11".repeat(64), "22");
        assert!(matches!(
            ChannelKeys::from_key_file_contents(&contents),
            Err(KeyError::MalformedKeyFile(3))
        ));
    }

    #[test]
    fn key_file_ignores_comments_and_blanks() {
        let contents = format!("# keys\n\n{}\n\n{}\n", "00".repeat(32), "11".repeat(64));
        let keys = ChannelKeys::from_key_file_contents(&contents).unwrap();
        assert_eq!(keys.cipher_key(), &[0u8; 32]);
        assert_eq!(keys.mac_key(), &[0x11u8; 64]);
    }

    #[test]
    fn debug_output_is_redacted() {
        let keys = ChannelKeys::new([0xAB; 32], [0xCD; 64]);
        let debug = format!("{:?}", keys);
        assert!(debug.contains("redacted"));
        assert!(!debug.to_lowercase().contains("abab"));
    }

    #[test]
    fn missing_key_file_reports_path() {
        let err = ChannelKeys::from_file(Path::new("/nonexistent/bankwire.key")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bankwire.key"));
    }
}
