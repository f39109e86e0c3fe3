//! Rejection reasons for inbound envelopes.
//!
//! These are precise on purpose: they go to the local log so an operator
//! can tell a tampering relay from a skewed clock. They are NEVER sent to
//! the far end. At the protocol boundary every variant collapses into the
//! same sealed `FAIL` (bank side) or `unauthorized` (terminal side).

use thiserror::Error;

/// Why an inbound envelope was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The line is not a three-field `timestamp,hex,hex` record.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The integrity tag does not match `timestamp,ciphertext`.
    #[error("integrity tag mismatch")]
    TamperDetected,

    /// The timestamp is outside the freshness window.
    #[error("stale envelope: timestamp {timestamp} is {skew_ms}ms away from local clock")]
    StaleMessage {
        /// Timestamp carried by the envelope.
        timestamp: u64,
        /// Distance from the receiver's clock in milliseconds.
        skew_ms: u64,
    },

    /// The timestamp is not above the direction's watermark.
    #[error("replayed envelope: timestamp {timestamp} <= watermark {watermark}")]
    Replayed {
        /// Timestamp carried by the envelope.
        timestamp: u64,
        /// Last accepted timestamp in this direction.
        watermark: u64,
    },

    /// The tag verified but the payload would not decrypt to UTF-8 text.
    /// Only reachable when the peer holds the MAC key but not the cipher key.
    #[error("authenticated payload could not be decrypted")]
    UndecryptablePayload,
}
