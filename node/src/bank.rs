//! # Bank Process
//!
//! Connects to the relay's bank port and runs two things side by side: the
//! network loop answering sealed requests, and the operator console on
//! stdin/stdout. Both work on the same account store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::net::TcpStream;

use bankwire_protocol::bank::{
    run_console, serve_connection, AccountStore, AccountsFile, TransactionService,
};
use bankwire_protocol::channel::SecureChannel;
use bankwire_protocol::crypto::ChannelKeys;

use crate::cli::BankArgs;
use crate::shutdown_signal;

pub async fn run_bank(args: BankArgs) -> Result<()> {
    let keys = ChannelKeys::from_file(&args.key_file)
        .with_context(|| format!("failed to load key file {}", args.key_file.display()))?;

    let accounts = match &args.accounts {
        Some(path) => AccountsFile::load(path)
            .with_context(|| format!("failed to load accounts from {}", path.display()))?,
        None => {
            tracing::warn!("no accounts file given, using demo accounts");
            AccountsFile::demo()
        }
    };
    let store = Arc::new(accounts.into_store());
    tracing::info!(users = ?store.users(), "accounts loaded");

    let service = Arc::new(TransactionService::new(
        SecureChannel::new(keys),
        store.clone(),
    ));

    let stream = TcpStream::connect(&args.relay_addr)
        .await
        .with_context(|| format!("failed to connect to relay at {}", args.relay_addr))?;
    tracing::info!(relay = %args.relay_addr, "connected to relay");
    let (reader, writer) = stream.into_split();
    let mut network = tokio::spawn(serve_connection(reader, writer, service));

    let console_store: &dyn AccountStore = store.as_ref();
    let console = run_console(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        console_store,
    );

    tokio::select! {
        res = &mut network => {
            res.context("network task panicked")?
                .context("relay connection failed")?;
        }
        res = console => {
            res.context("operator console failed")?;
            tracing::info!("operator console closed");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    network.abort();
    tracing::info!("bank stopped");
    Ok(())
}
