//! # Secure Channel
//!
//! Encrypt-then-MAC over a pre-shared key pair:
//!
//! ```text
//! seal(m):  ts  = max(now, last_ts + 1)
//!           ct  = IV || AES-256-CBC(K_enc, IV, m)
//!           tag = HMAC-SHA256(K_mac, "<ts>,<HEX ct>")
//!
//! open(e):  1. tag check (constant time)      -> TamperDetected
//!           2. |now - ts| <= FRESHNESS_WINDOW_MS -> StaleMessage
//!           3. decrypt + UTF-8                -> UndecryptablePayload
//! ```
//!
//! The order matters: nothing touches the ciphertext until the tag has
//! verified, so a tampering relay learns nothing from padding behaviour.
//!
//! Replay detection is layered on top by [`SecureChannel::accept`], which
//! runs [`open`](SecureChannel::open) and then the direction's
//! [`ReplayGuard`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::envelope::SecuredEnvelope;
use super::error::ChannelError;
use super::replay::ReplayGuard;
use crate::config::FRESHNESS_WINDOW_MS;
use crate::crypto::{self, ChannelKeys};

/// One endpoint's view of the shared channel.
///
/// Cheap to share behind an `Arc`; [`seal`](Self::seal) and
/// [`open`](Self::open) take `&self`.
pub struct SecureChannel {
    keys: ChannelKeys,
    clock: Arc<dyn Clock>,
    /// Last timestamp this endpoint stamped. Keeps outgoing timestamps
    /// strictly increasing even when two seals land in the same millisecond.
    last_sealed: AtomicU64,
}

impl SecureChannel {
    /// A channel driven by the system clock.
    pub fn new(keys: ChannelKeys) -> Self {
        Self::with_clock(keys, Arc::new(SystemClock))
    }

    pub fn with_clock(keys: ChannelKeys, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            clock,
            last_sealed: AtomicU64::new(0),
        }
    }

    /// Encrypts and authenticates `plaintext`.
    pub fn seal(&self, plaintext: &str) -> SecuredEnvelope {
        let timestamp = self.next_timestamp();
        let ciphertext = crypto::encrypt(self.keys.cipher_key(), plaintext.as_bytes());

        let mut envelope = SecuredEnvelope {
            timestamp,
            ciphertext,
            tag: Vec::new(),
        };
        envelope.tag = crypto::compute_tag(
            self.keys.mac_key(),
            envelope.authenticated_data().as_bytes(),
        )
        .to_vec();
        envelope
    }

    /// Verifies integrity and freshness, then decrypts.
    ///
    /// Does not consult any replay watermark; see [`accept`](Self::accept).
    pub fn open(&self, envelope: &SecuredEnvelope) -> Result<String, ChannelError> {
        if !crypto::verify_tag(
            self.keys.mac_key(),
            envelope.authenticated_data().as_bytes(),
            &envelope.tag,
        ) {
            return Err(ChannelError::TamperDetected);
        }

        let skew_ms = self.clock.now_millis().abs_diff(envelope.timestamp);
        if skew_ms > FRESHNESS_WINDOW_MS {
            return Err(ChannelError::StaleMessage {
                timestamp: envelope.timestamp,
                skew_ms,
            });
        }

        let plaintext = crypto::decrypt(self.keys.cipher_key(), &envelope.ciphertext)
            .map_err(|_| ChannelError::UndecryptablePayload)?;
        String::from_utf8(plaintext).map_err(|_| ChannelError::UndecryptablePayload)
    }

    /// [`open`](Self::open) followed by the watermark check.
    ///
    /// The watermark only advances for envelopes that pass every other
    /// check, so a forged timestamp cannot push it forward.
    pub fn accept(
        &self,
        envelope: &SecuredEnvelope,
        guard: &mut ReplayGuard,
    ) -> Result<String, ChannelError> {
        let plaintext = self.open(envelope)?;
        if !guard.admit(envelope.timestamp) {
            return Err(ChannelError::Replayed {
                timestamp: envelope.timestamp,
                watermark: guard.last_accepted(),
            });
        }
        Ok(plaintext)
    }

    /// Parses a raw line and runs [`accept`](Self::accept) on it.
    pub fn accept_line(&self, line: &str, guard: &mut ReplayGuard) -> Result<String, ChannelError> {
        let envelope = SecuredEnvelope::parse_line(line)?;
        self.accept(&envelope, guard)
    }

    fn next_timestamp(&self) -> u64 {
        let now = self.clock.now_millis();
        let bump = |last: u64| now.max(last.saturating_add(1));
        let previous = match self
            .last_sealed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(bump(last)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        bump(previous)
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("keys", &self.keys)
            .field("last_sealed", &self.last_sealed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::clock::ManualClock;
    use crate::channel::replay::Direction;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    fn pair() -> (SecureChannel, SecureChannel, Arc<ManualClock>) {
        let keys = ChannelKeys::generate();
        let clock = Arc::new(ManualClock::new(T0));
        (
            SecureChannel::with_clock(keys.clone(), clock.clone()),
            SecureChannel::with_clock(keys, clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let (a, b, _) = pair();
        let env = a.seal("AUTH:Alice:1234:alice-card");
        assert_eq!(b.open(&env).unwrap(), "AUTH:Alice:1234:alice-card");
    }

    #[test]
    fn test_empty_plaintext() {
        let (a, b, _) = pair();
        assert_eq!(b.open(&a.seal("")).unwrap(), "");
    }

    #[test]
    fn test_timestamps_strictly_increase_under_frozen_clock() {
        let (a, _, _) = pair();
        let first = a.seal("BALANCE:Alice").timestamp;
        let second = a.seal("BALANCE:Alice").timestamp;
        let third = a.seal("BALANCE:Alice").timestamp;
        assert_eq!(first, T0);
        assert_eq!(second, T0 + 1);
        assert_eq!(third, T0 + 2);
    }

    #[test]
    fn test_same_plaintext_different_ciphertext() {
        let (a, _, _) = pair();
        assert_ne!(a.seal("BALANCE:Bob").ciphertext, a.seal("BALANCE:Bob").ciphertext);
    }

    #[test]
    fn test_modified_timestamp_is_tamper() {
        let (a, b, _) = pair();
        let mut env = a.seal("BALANCE:Alice");
        env.timestamp += 1;
        assert_eq!(b.open(&env), Err(ChannelError::TamperDetected));
    }

    #[test]
    fn test_flipped_ciphertext_bit_is_tamper() {
        let (a, b, _) = pair();
        let mut env = a.seal("WITHDRAW:Alice:10");
        env.ciphertext[20] ^= 0x01;
        assert_eq!(b.open(&env), Err(ChannelError::TamperDetected));
    }

    #[test]
    fn test_flipped_tag_bit_is_tamper() {
        let (a, b, _) = pair();
        let mut env = a.seal("WITHDRAW:Alice:10");
        env.tag[0] ^= 0x80;
        assert_eq!(b.open(&env), Err(ChannelError::TamperDetected));
    }

    #[test]
    fn test_foreign_keys_are_tamper() {
        let (a, _, clock) = pair();
        let stranger = SecureChannel::with_clock(ChannelKeys::generate(), clock);
        assert_eq!(
            stranger.open(&a.seal("BALANCE:Carol")),
            Err(ChannelError::TamperDetected)
        );
    }

    #[test]
    fn test_freshness_window_edges() {
        let (a, b, clock) = pair();
        let env = a.seal("BALANCE:Alice");

        clock.advance(Duration::from_millis(FRESHNESS_WINDOW_MS));
        assert!(b.open(&env).is_ok());

        clock.advance(Duration::from_millis(1));
        assert!(matches!(
            b.open(&env),
            Err(ChannelError::StaleMessage { skew_ms, .. }) if skew_ms == FRESHNESS_WINDOW_MS + 1
        ));
    }

    #[test]
    fn test_future_timestamp_is_stale() {
        let (a, b, clock) = pair();
        clock.set(T0 + FRESHNESS_WINDOW_MS + 1);
        let env = a.seal("BALANCE:Alice");
        clock.set(T0);
        assert!(matches!(b.open(&env), Err(ChannelError::StaleMessage { .. })));
    }

    #[test]
    fn test_mac_key_without_cipher_key_is_undecryptable() {
        let clock = Arc::new(ManualClock::new(T0));
        let shared = ChannelKeys::generate();
        let forged_keys = ChannelKeys::new([0x11; 32], *shared.mac_key());
        let sender = SecureChannel::with_clock(forged_keys, clock.clone());
        let receiver = SecureChannel::with_clock(shared, clock);
        assert_eq!(
            receiver.open(&sender.seal("WITHDRAW:Alice:100")),
            Err(ChannelError::UndecryptablePayload)
        );
    }

    #[test]
    fn test_accept_rejects_replay() {
        let (a, b, _) = pair();
        let mut guard = ReplayGuard::new(Direction::ClientToServer);
        let env = a.seal("WITHDRAW:Alice:10");

        assert!(b.accept(&env, &mut guard).is_ok());
        assert_eq!(
            b.accept(&env, &mut guard),
            Err(ChannelError::Replayed {
                timestamp: T0,
                watermark: T0
            })
        );
    }

    #[test]
    fn test_accept_tamper_does_not_advance_watermark() {
        let (a, b, _) = pair();
        let mut guard = ReplayGuard::new(Direction::ClientToServer);
        let mut forged = a.seal("BALANCE:Alice");
        forged.timestamp = u64::MAX;
        assert!(b.accept(&forged, &mut guard).is_err());
        assert_eq!(guard.last_accepted(), 0);
    }

    #[test]
    fn test_accept_line_parses_wire_form() {
        let (a, b, _) = pair();
        let mut guard = ReplayGuard::new(Direction::ServerToClient);
        let line = a.seal("BALANCE:Alice:100").to_string();
        assert_eq!(
            b.accept_line(&line, &mut guard).unwrap(),
            "BALANCE:Alice:100"
        );
        assert!(matches!(
            b.accept_line("FAIL", &mut guard),
            Err(ChannelError::MalformedEnvelope(_))
        ));
    }
}
