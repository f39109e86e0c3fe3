//! # ATM
//!
//! The client side: card lookup, the [`TerminalSession`] state machine that
//! talks to the bank through the relay, and the console a customer types
//! into.

pub mod card;
pub mod console;
pub mod session;

pub use card::{CardDirectory, CardError, CardStore};
pub use console::{run_terminal, AtmCommand};
pub use session::{SessionState, TerminalConfig, TerminalSession};
