//! # Account Store
//!
//! The bank's account table. The network loop and the operator console both
//! mutate it concurrently, so every operation goes through the
//! [`AccountStore`] trait and the in-memory implementation locks one account
//! at a time.
//!
//! ## Locking
//!
//! [`InMemoryAccountStore`] keeps a `parking_lot::Mutex` per account. The
//! map itself is fixed after construction, so lookups need no lock. A lock is
//! held for exactly one verify/balance/deposit/withdraw and never across an
//! `.await`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::{Account, AccountError};
use crate::config::DEMO_ACCOUNTS;

/// Operation-level access to the account table.
pub trait AccountStore: Send + Sync {
    /// `Ok(true)` iff `user` exists and both secrets match.
    fn verify(&self, user: &str, pin: &str, card_secret: &str) -> Result<bool, AccountError>;

    fn balance(&self, user: &str) -> Result<u64, AccountError>;

    /// Returns the new balance.
    fn deposit(&self, user: &str, amount: u64) -> Result<u64, AccountError>;

    /// Returns the new balance.
    fn withdraw(&self, user: &str, amount: u64) -> Result<u64, AccountError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Account table held in memory for the life of the bank process.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: HashMap<String, Mutex<Account>>,
}

impl InMemoryAccountStore {
    /// Builds a store from `accounts`. A later duplicate name replaces an
    /// earlier one; use [`AccountsFile::validate`] to reject duplicates.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.name.clone(), Mutex::new(account)))
            .collect();
        Self { accounts }
    }

    /// The three demo accounts: Alice and Bob with 100, Carol with 0.
    pub fn demo() -> Self {
        Self::new(AccountsFile::demo().accounts)
    }

    /// Account names, sorted.
    pub fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.accounts.keys().cloned().collect();
        users.sort();
        users
    }

    fn with_account<T>(
        &self,
        user: &str,
        f: impl FnOnce(&mut Account) -> Result<T, AccountError>,
    ) -> Result<T, AccountError> {
        let slot = self
            .accounts
            .get(user)
            .ok_or_else(|| AccountError::UnknownUser(user.to_string()))?;
        let mut account = slot.lock();
        f(&mut account)
    }
}

impl AccountStore for InMemoryAccountStore {
    fn verify(&self, user: &str, pin: &str, card_secret: &str) -> Result<bool, AccountError> {
        self.with_account(user, |account| Ok(account.verify(pin, card_secret)))
    }

    fn balance(&self, user: &str) -> Result<u64, AccountError> {
        self.with_account(user, |account| Ok(account.balance))
    }

    fn deposit(&self, user: &str, amount: u64) -> Result<u64, AccountError> {
        self.with_account(user, |account| account.deposit(amount))
    }

    fn withdraw(&self, user: &str, amount: u64) -> Result<u64, AccountError> {
        self.with_account(user, |account| account.withdraw(amount))
    }
}

// ---------------------------------------------------------------------------
// Accounts file
// ---------------------------------------------------------------------------

/// Errors loading or saving an accounts file.
#[derive(Debug, Error)]
pub enum AccountsFileError {
    #[error("could not access accounts file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid accounts file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate account: {0}")]
    DuplicateUser(String),

    #[error("invalid account name: {0:?}")]
    InvalidName(String),
}

/// JSON seed for the account table:
///
/// ```json
/// { "accounts": [ { "name": "Alice", "balance": 100, "pin": "1234", "card_secret": "..." } ] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountsFile {
    pub accounts: Vec<Account>,
}

impl AccountsFile {
    pub fn demo() -> Self {
        Self {
            accounts: DEMO_ACCOUNTS
                .iter()
                .map(|&(name, balance, pin, card)| Account::new(name, balance, pin, card))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, AccountsFileError> {
        let file: Self = serde_json::from_str(json)?;
        file.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, AccountsFileError> {
        let json = std::fs::read_to_string(path).map_err(|source| AccountsFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, AccountsFileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), AccountsFileError> {
        std::fs::write(path, self.to_json()?).map_err(|source| AccountsFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects duplicate names and names the wire grammar cannot carry.
    pub fn validate(&self) -> Result<(), AccountsFileError> {
        let mut seen = std::collections::HashSet::new();
        for account in &self.accounts {
            if !crate::message::is_valid_user(&account.name) {
                return Err(AccountsFileError::InvalidName(account.name.clone()));
            }
            if !seen.insert(account.name.as_str()) {
                return Err(AccountsFileError::DuplicateUser(account.name.clone()));
            }
        }
        Ok(())
    }

    pub fn into_store(self) -> InMemoryAccountStore {
        InMemoryAccountStore::new(self.accounts)
    }
}
