//! # CLI Interface
//!
//! Defines the command-line argument structure for `bankwire` using `clap`
//! derive. Five subcommands: `relay`, `bank`, `atm`, `init` and `version`.
//! Every flag can also come from a `BANKWIRE_*` environment variable.

use clap::{Parser, Subcommand};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use bankwire_protocol::config::{DEFAULT_ATM_PORT, DEFAULT_BANK_PORT, RESPONSE_TIMEOUT};

/// Where the bank finds the relay by default.
fn default_bank_side() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_BANK_PORT))
}

/// Where the ATM finds the relay by default.
fn default_atm_side() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_ATM_PORT))
}

/// Secure ATM/bank messaging over an untrusted relay.
///
/// Start the relay first, then the bank, then the ATM. The bank and the ATM
/// must be given the same key file; the relay never sees it.
#[derive(Parser, Debug)]
#[command(
    name = "bankwire",
    about = "Secure ATM/bank messaging over an untrusted relay",
    version,
    propagate_version = true
)]
pub struct BankwireCli {
    /// Log output format on stderr: `pretty` or `json`.
    #[arg(long, global = true, env = "BANKWIRE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay between the bank and the ATM.
    Relay(RelayArgs),
    /// Run the bank: serve the relay and read operator commands from stdin.
    Bank(BankArgs),
    /// Run an ATM terminal reading customer commands from stdin.
    Atm(AtmArgs),
    /// Create a key file, an accounts file and demo cards.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `relay` subcommand.
#[derive(Parser, Debug)]
pub struct RelayArgs {
    /// Address to listen on.
    #[arg(long, env = "BANKWIRE_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port the bank connects to.
    #[arg(long, env = "BANKWIRE_BANK_PORT", default_value_t = DEFAULT_BANK_PORT)]
    pub bank_port: u16,

    /// Port the ATM connects to.
    #[arg(long, env = "BANKWIRE_ATM_PORT", default_value_t = DEFAULT_ATM_PORT)]
    pub atm_port: u16,
}

/// Arguments for the `bank` subcommand.
#[derive(Parser, Debug)]
pub struct BankArgs {
    /// Relay's bank-side address.
    #[arg(long, env = "BANKWIRE_RELAY_ADDR", default_value_t = default_bank_side())]
    pub relay_addr: SocketAddr,

    /// Shared key file written by `bankwire init`.
    #[arg(long, short = 'k', env = "BANKWIRE_KEY_FILE")]
    pub key_file: PathBuf,

    /// Accounts JSON. The built-in demo accounts are used when omitted.
    #[arg(long, short = 'a', env = "BANKWIRE_ACCOUNTS")]
    pub accounts: Option<PathBuf>,
}

/// Arguments for the `atm` subcommand.
#[derive(Parser, Debug)]
pub struct AtmArgs {
    /// Relay's ATM-side address.
    #[arg(long, env = "BANKWIRE_RELAY_ADDR", default_value_t = default_atm_side())]
    pub relay_addr: SocketAddr,

    /// Shared key file written by `bankwire init`.
    #[arg(long, short = 'k', env = "BANKWIRE_KEY_FILE")]
    pub key_file: PathBuf,

    /// Directory holding `<user>.card` files.
    #[arg(long, short = 'c', env = "BANKWIRE_CARD_DIR", default_value = ".")]
    pub card_dir: PathBuf,

    /// How long to wait for the bank's reply to one request.
    #[arg(long, env = "BANKWIRE_RESPONSE_TIMEOUT_MS", default_value_t = RESPONSE_TIMEOUT.as_millis() as u64)]
    pub response_timeout_ms: u64,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to write `bankwire.key`, `accounts.json` and `cards/` into.
    #[arg(long, short = 'd', env = "BANKWIRE_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}
