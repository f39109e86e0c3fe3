//! # Relay
//!
//! The untrusted hop between bank and ATM. Listens on two ports, takes one
//! connection on each (bank first, then ATM), and copies raw bytes both ways
//! until either side hangs up. It knows nothing about envelopes.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use crate::cli::RelayArgs;

pub async fn run_relay(args: RelayArgs) -> Result<()> {
    let bank_addr = format!("{}:{}", args.bind, args.bank_port);
    let atm_addr = format!("{}:{}", args.bind, args.atm_port);

    let bank_listener = TcpListener::bind(&bank_addr)
        .await
        .with_context(|| format!("failed to bind bank listener on {bank_addr}"))?;
    let atm_listener = TcpListener::bind(&atm_addr)
        .await
        .with_context(|| format!("failed to bind ATM listener on {atm_addr}"))?;

    tracing::info!(%bank_addr, "waiting for bank");
    let (bank, bank_peer) = bank_listener
        .accept()
        .await
        .context("failed to accept bank connection")?;
    tracing::info!(%bank_peer, "bank connected");

    tracing::info!(%atm_addr, "waiting for ATM");
    let (atm, atm_peer) = atm_listener
        .accept()
        .await
        .context("failed to accept ATM connection")?;
    tracing::info!(%atm_peer, "ATM connected");

    let (to_bank, to_atm) = forward(bank, atm).await?;
    tracing::info!(to_bank, to_atm, "relay closed");
    Ok(())
}

/// Copies bytes between `bank` and `atm` until either direction ends.
/// Returns the byte counts (ATM→bank, bank→ATM) forwarded so far.
pub async fn forward<B, A>(bank: B, atm: A) -> std::io::Result<(u64, u64)>
where
    B: AsyncRead + AsyncWrite + Unpin,
    A: AsyncRead + AsyncWrite + Unpin,
{
    let (mut bank_rx, mut bank_tx) = tokio::io::split(bank);
    let (mut atm_rx, mut atm_tx) = tokio::io::split(atm);

    let counts = tokio::select! {
        res = tokio::io::copy(&mut atm_rx, &mut bank_tx) => {
            tracing::info!("ATM side closed");
            (res?, 0)
        }
        res = tokio::io::copy(&mut bank_rx, &mut atm_tx) => {
            tracing::info!("bank side closed");
            (0, res?)
        }
    };
    Ok(counts)
}
