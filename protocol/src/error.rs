//! Crate-level error taxonomy.
//!
//! Module errors ([`ChannelError`], [`AccountError`], [`CardError`], ...)
//! stay precise for local logging. They convert into [`ProtocolError`] at the
//! session and console boundaries, where cryptographic causes are folded
//! together so neither the far end nor the person at the terminal can use
//! them as an oracle.

use thiserror::Error;

use crate::atm::card::CardError;
use crate::bank::account::AccountError;
use crate::channel::ChannelError;
use crate::crypto::{EncryptionError, KeyError};
use crate::transport::TransportError;

/// Everything that can go wrong in a bank or terminal operation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A local command was not understood. No traffic was sent.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The bank refused the session, or its answer could not be trusted.
    #[error("authentication failed")]
    AuthenticationFailure,

    #[error("integrity check failed")]
    TamperDetected,

    /// Outside the freshness window or at/below the replay watermark.
    #[error("stale or replayed message")]
    StaleMessage,

    #[error("insufficient funds")]
    InsufficientFunds,

    /// The bank answered with a sealed `FAIL`.
    #[error("request refused by bank")]
    Rejected,

    /// A session command arrived with nobody logged in. No traffic was sent.
    #[error("no user logged in")]
    NotLoggedIn,

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),

    /// The relay connection is gone. Fatal to the session.
    #[error("connection closed")]
    TransportClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key material: {0}")]
    Key(#[from] KeyError),
}

impl ProtocolError {
    /// `true` if the session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportClosed | Self::Io(_))
    }
}

impl From<ChannelError> for ProtocolError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::MalformedEnvelope(_)
            | ChannelError::TamperDetected
            | ChannelError::UndecryptablePayload => Self::TamperDetected,
            ChannelError::StaleMessage { .. } | ChannelError::Replayed { .. } => {
                Self::StaleMessage
            }
        }
    }
}

impl From<EncryptionError> for ProtocolError {
    fn from(_: EncryptionError) -> Self {
        Self::TamperDetected
    }
}

impl From<AccountError> for ProtocolError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UnknownUser(user) => Self::UnknownUser(user),
            AccountError::InsufficientFunds { .. } => Self::InsufficientFunds,
            AccountError::InvalidAmount => Self::MalformedInput(err.to_string()),
        }
    }
}

impl From<CardError> for ProtocolError {
    fn from(_: CardError) -> Self {
        // A missing or unreadable card looks the same as a refused login.
        Self::AuthenticationFailure
    }
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed | TransportError::LineTooLong => Self::TransportClosed,
            TransportError::Io(io) => Self::Io(io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_errors_collapse() {
        let tamper: ProtocolError = ChannelError::TamperDetected.into();
        let undecryptable: ProtocolError = ChannelError::UndecryptablePayload.into();
        assert_eq!(tamper.to_string(), undecryptable.to_string());

        let stale: ProtocolError = ChannelError::StaleMessage {
            timestamp: 1,
            skew_ms: 2,
        }
        .into();
        let replay: ProtocolError = ChannelError::Replayed {
            timestamp: 1,
            watermark: 1,
        }
        .into();
        assert_eq!(stale.to_string(), replay.to_string());
        assert!(!stale.to_string().contains('1'));
    }

    #[test]
    fn account_errors_stay_precise() {
        let err: ProtocolError = AccountError::UnknownUser("Mallory".into()).into();
        assert!(matches!(err, ProtocolError::UnknownUser(ref u) if u == "Mallory"));
        let err: ProtocolError = AccountError::InsufficientFunds {
            balance: 1,
            requested: 2,
        }
        .into();
        assert!(matches!(err, ProtocolError::InsufficientFunds));
    }

    #[test]
    fn only_transport_loss_is_fatal() {
        assert!(ProtocolError::TransportClosed.is_fatal());
        assert!(ProtocolError::from(TransportError::Closed).is_fatal());
        assert!(!ProtocolError::Timeout(std::time::Duration::from_secs(1)).is_fatal());
        assert!(!ProtocolError::AuthenticationFailure.is_fatal());
        assert!(!ProtocolError::StaleMessage.is_fatal());
    }
}
