//! # ATM Process
//!
//! Connects to the relay's ATM port and runs the customer console on
//! stdin/stdout until input ends or the relay goes away.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::net::TcpStream;

use bankwire_protocol::atm::{run_terminal, CardDirectory, TerminalConfig, TerminalSession};
use bankwire_protocol::channel::SecureChannel;
use bankwire_protocol::crypto::ChannelKeys;
use bankwire_protocol::transport::LineTransport;

use crate::cli::AtmArgs;

pub async fn run_atm(args: AtmArgs) -> Result<()> {
    let keys = ChannelKeys::from_file(&args.key_file)
        .with_context(|| format!("failed to load key file {}", args.key_file.display()))?;

    let stream = TcpStream::connect(&args.relay_addr)
        .await
        .with_context(|| format!("failed to connect to relay at {}", args.relay_addr))?;
    let cards = CardDirectory::new(&args.card_dir);
    tracing::info!(relay = %args.relay_addr, card_dir = %cards.dir().display(), "connected to relay");

    let config = TerminalConfig {
        response_timeout: Duration::from_millis(args.response_timeout_ms),
    };
    let mut session = TerminalSession::new(
        SecureChannel::new(keys),
        LineTransport::from_tcp(stream),
        Arc::new(cards),
        config,
    );

    run_terminal(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        &mut session,
    )
    .await
    .context("terminal stopped")?;

    tracing::info!("ATM stopped");
    Ok(())
}
