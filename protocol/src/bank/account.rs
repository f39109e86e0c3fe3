//! # Accounts
//!
//! An [`Account`] is a name, a balance and the two secrets a terminal must
//! present to open a session: the 4-digit PIN and the card secret.
//!
//! ## Balance Rules
//!
//! - The balance is a `u64` and can never go negative.
//! - Deposits saturate at `u64::MAX` rather than wrapping.
//! - Withdrawals and deposits must be strictly positive.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from account operations. These are safe to report precisely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("no such user: {0}")]
    UnknownUser(String),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the attempt.
        balance: u64,
        /// Amount that was asked for.
        requested: u64,
    },

    /// Zero-amount operations are rejected.
    #[error("amount must be positive")]
    InvalidAmount,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A single bank account.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub balance: u64,
    pin: String,
    card_secret: String,
}

impl Account {
    pub fn new(
        name: impl Into<String>,
        balance: u64,
        pin: impl Into<String>,
        card_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            balance,
            pin: pin.into(),
            card_secret: card_secret.into(),
        }
    }

    /// Checks PIN and card secret together, in constant time with respect to
    /// the stored values. Both must match.
    pub fn verify(&self, pin: &str, card_secret: &str) -> bool {
        let pin_ok = self.pin.as_bytes().ct_eq(pin.as_bytes());
        let card_ok = self.card_secret.as_bytes().ct_eq(card_secret.as_bytes());
        (pin_ok & card_ok).into()
    }

    /// Adds `amount`, saturating at `u64::MAX`. Returns the new balance.
    pub fn deposit(&mut self, amount: u64) -> Result<u64, AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount);
        }
        self.balance = self.balance.saturating_add(amount);
        Ok(self.balance)
    }

    /// Removes `amount` if the balance covers it. Returns the new balance.
    pub fn withdraw(&mut self, amount: u64) -> Result<u64, AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    /// The secret a terminal reads from this user's card file.
    pub fn card_secret(&self) -> &str {
        &self.card_secret
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("balance", &self.balance)
            .field("pin", &"[REDACTED]")
            .field("card_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Account {
        Account::new("Alice", 100, "1234", "alice-card")
    }

    #[test]
    fn verify_requires_both_secrets() {
        let a = alice();
        assert!(a.verify("1234", "alice-card"));
        assert!(!a.verify("1235", "alice-card"));
        assert!(!a.verify("1234", "bob-card"));
        assert!(!a.verify("", ""));
        assert!(!a.verify("12345", "alice-card"));
    }

    #[test]
    fn withdraw_reduces_balance() {
        let mut a = alice();
        assert_eq!(a.withdraw(50).unwrap(), 50);
        assert_eq!(a.withdraw(50).unwrap(), 0);
    }

    #[test]
    fn withdraw_insufficient_leaves_balance() {
        let mut a = alice();
        assert_eq!(
            a.withdraw(101),
            Err(AccountError::InsufficientFunds {
                balance: 100,
                requested: 101
            })
        );
        assert_eq!(a.balance, 100);
    }

    #[test]
    fn zero_amounts_rejected() {
        let mut a = alice();
        assert_eq!(a.withdraw(0), Err(AccountError::InvalidAmount));
        assert_eq!(a.deposit(0), Err(AccountError::InvalidAmount));
        assert_eq!(a.balance, 100);
    }

    #[test]
    fn deposit_saturates() {
        let mut a = alice();
        assert_eq!(a.deposit(u64::MAX).unwrap(), u64::MAX);
        assert_eq!(a.deposit(1).unwrap(), u64::MAX);
    }

    #[test]
    fn debug_redacts_secrets() {
        let dbg = format!("{:?}", alice());
        assert!(dbg.contains("Alice"));
        assert!(!dbg.contains("1234"));
        assert!(!dbg.contains("alice-card"));
    }

    #[test]
    fn serde_roundtrip() {
        let a = alice();
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"card_secret\""));
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
