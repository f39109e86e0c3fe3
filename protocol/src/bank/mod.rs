//! # Bank
//!
//! The server side: the account table, the [`TransactionService`] that
//! answers sealed requests from the relay, and the operator console that
//! works on the same accounts locally.

pub mod account;
pub mod console;
pub mod service;
pub mod store;

pub use account::{Account, AccountError};
pub use console::{run_console, BankCommand};
pub use service::{serve_connection, serve_transport, TransactionService};
pub use store::{AccountStore, AccountsFile, AccountsFileError, InMemoryAccountStore};
