// Copyright (c) 2026 Bankwire Contributors. MIT License.
// See LICENSE for details.

//! # Bankwire Node
//!
//! Entry point for the `bankwire` binary. Parses CLI arguments, initializes
//! logging, and runs one of the three processes of a deployment or one of
//! the housekeeping commands:
//!
//! - `relay`: the untrusted byte pipe between bank and ATM
//! - `bank`: transaction service plus operator console
//! - `atm`: customer terminal
//! - `init`: generate a key file, accounts file and demo cards
//! - `version`: print build version information

mod atm;
mod bank;
mod cli;
mod logging;
mod relay;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;

use bankwire_protocol::atm::CardDirectory;
use bankwire_protocol::bank::AccountsFile;
use bankwire_protocol::config::{MAC_ALGORITHM, PROTOCOL_VERSION, SYMMETRIC_ALGORITHM};
use bankwire_protocol::crypto::ChannelKeys;

use cli::{BankwireCli, Commands};
use logging::{LogFormat, Role};

const KEY_FILE_NAME: &str = "bankwire.key";
const ACCOUNTS_FILE_NAME: &str = "accounts.json";
const CARD_DIR_NAME: &str = "cards";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BankwireCli::parse();
    let format = LogFormat::from_str_lossy(&cli.log_format);

    match cli.command {
        Commands::Relay(args) => {
            logging::init_logging(Role::Relay, format);
            tokio::select! {
                res = relay::run_relay(args) => res,
                _ = shutdown_signal() => {
                    tracing::info!("shutdown signal received");
                    Ok(())
                }
            }
        }
        Commands::Bank(args) => {
            logging::init_logging(Role::Bank, format);
            bank::run_bank(args).await
        }
        Commands::Atm(args) => {
            logging::init_logging(Role::Atm, format);
            atm::run_atm(args).await
        }
        Commands::Init(args) => {
            logging::init_logging(Role::Tool, format);
            init_node(&args.data_dir, args.force).map(|summary| summary.print())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// What `init` wrote.
struct InitSummary {
    key_path: PathBuf,
    accounts_path: PathBuf,
    card_paths: Vec<PathBuf>,
}

impl InitSummary {
    fn print(&self) {
        println!("Bankwire initialized.");
        println!("  Key file  : {}", self.key_path.display());
        println!("  Accounts  : {}", self.accounts_path.display());
        for card in &self.card_paths {
            println!("  Card      : {}", card.display());
        }
        println!();
        println!("Give the key file to the bank and the ATM. Never to the relay.");
    }
}

/// Generates a fresh shared key, the demo accounts file and one card per
/// account under `data_dir`.
fn init_node(data_dir: &Path, force: bool) -> Result<InitSummary> {
    tracing::info!(data_dir = %data_dir.display(), "initializing");

    let card_dir = data_dir.join(CARD_DIR_NAME);
    std::fs::create_dir_all(&card_dir)
        .with_context(|| format!("failed to create card directory: {}", card_dir.display()))?;

    let key_path = data_dir.join(KEY_FILE_NAME);
    if key_path.exists() && !force {
        bail!(
            "{} already exists; pass --force to replace it",
            key_path.display()
        );
    }
    let keys = ChannelKeys::generate();
    std::fs::write(&key_path, keys.to_key_file_contents())
        .with_context(|| format!("failed to write key file to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }
    tracing::info!(key_path = %key_path.display(), "shared key generated");

    let accounts = AccountsFile::demo();
    let accounts_path = data_dir.join(ACCOUNTS_FILE_NAME);
    accounts
        .save(&accounts_path)
        .with_context(|| format!("failed to write {}", accounts_path.display()))?;

    let cards = CardDirectory::new(&card_dir);
    let card_paths = accounts
        .accounts
        .iter()
        .map(|account| cards.write_card(&account.name, account.card_secret()))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to write card files")?;

    Ok(InitSummary {
        key_path,
        accounts_path,
        card_paths,
    })
}

/// Prints version information to stdout.
fn print_version() {
    println!("bankwire  {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", PROTOCOL_VERSION);
    println!("channel   {} + {}", SYMMETRIC_ALGORITHM, MAC_ALGORITHM);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankwire_protocol::atm::CardStore;
    use bankwire_protocol::bank::AccountStore;

    #[test]
    fn init_writes_a_usable_deployment() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = init_node(tmp.path(), false).unwrap();

        ChannelKeys::from_file(&summary.key_path).unwrap();
        let store = AccountsFile::load(&summary.accounts_path)
            .unwrap()
            .into_store();
        assert_eq!(store.balance("Alice").unwrap(), 100);

        let cards = CardDirectory::new(tmp.path().join(CARD_DIR_NAME));
        assert_eq!(summary.card_paths.len(), 3);
        let (_, _, pin, _) = bankwire_protocol::config::DEMO_ACCOUNTS[0];
        let secret = cards.card_secret("Alice").unwrap();
        assert!(store.verify("Alice", pin, &secret).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let summary = init_node(tmp.path(), false).unwrap();
        let mode = std::fs::metadata(&summary.key_path)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn init_refuses_to_replace_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let first = init_node(tmp.path(), false).unwrap();
        let before = std::fs::read_to_string(&first.key_path).unwrap();

        assert!(init_node(tmp.path(), false).is_err());
        assert_eq!(std::fs::read_to_string(&first.key_path).unwrap(), before);

        init_node(tmp.path(), true).unwrap();
        assert_ne!(std::fs::read_to_string(&first.key_path).unwrap(), before);
    }
}
