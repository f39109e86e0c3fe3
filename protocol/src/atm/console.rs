//! Customer-facing console of the terminal.
//!
//! ```text
//! ATM: begin-session Alice
//! PIN? 1234
//! authorized
//! ATM (Alice): withdraw 50
//! $50 dispensed
//! ATM (Alice): end-session
//! user logged out
//! ```
//!
//! Failures that carry no useful information for the customer print an
//! empty line. Cryptographic failures during login all print `unauthorized`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::session::TerminalSession;
use crate::config::{ATM_PROMPT, PIN_PROMPT};
use crate::error::ProtocolError;
use crate::message::parse_amount;
use crate::transport::Transport;

pub const AUTHORIZED: &str = "authorized";
pub const UNAUTHORIZED: &str = "unauthorized";
pub const NO_USER_LOGGED_IN: &str = "no user logged in";
pub const INSUFFICIENT_FUNDS: &str = "insufficient funds";
pub const USER_LOGGED_OUT: &str = "user logged out";

/// One parsed customer command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtmCommand {
    BeginSession { user: String },
    Balance,
    Withdraw { amount: u64 },
    EndSession,
}

impl AtmCommand {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["begin-session", user] => Ok(Self::BeginSession {
                user: user.to_string(),
            }),
            ["balance"] => Ok(Self::Balance),
            ["withdraw", amount] => parse_amount(amount)
                .map(|amount| Self::Withdraw { amount })
                .ok_or_else(|| ProtocolError::MalformedInput(format!("invalid amount: {amount}"))),
            ["end-session"] => Ok(Self::EndSession),
            _ => Err(ProtocolError::MalformedInput(line.trim().to_string())),
        }
    }

    /// `true` for commands that only make sense inside a session.
    pub fn is_session_command(word: &str) -> bool {
        matches!(word, "balance" | "withdraw" | "end-session")
    }
}

/// The prompt for the session's current state.
pub fn prompt<T: Transport>(session: &TerminalSession<T>) -> String {
    match session.logged_in_user() {
        Some(user) => format!("ATM ({user}): "),
        None => ATM_PROMPT.to_string(),
    }
}

/// Maps a failed in-session command to its console line. Fatal errors are
/// handed back to the caller.
fn render_error(err: ProtocolError) -> Result<String, ProtocolError> {
    if err.is_fatal() {
        return Err(err);
    }
    debug!(error = %err, "command failed");
    Ok(match err {
        ProtocolError::NotLoggedIn => NO_USER_LOGGED_IN.to_string(),
        ProtocolError::InsufficientFunds => INSUFFICIENT_FUNDS.to_string(),
        _ => String::new(),
    })
}

/// Prompt-read-reply loop. Returns when `input` reaches EOF or the relay
/// connection is lost; the latter is returned as an error.
pub async fn run_terminal<R, W, T>(
    input: R,
    mut output: W,
    session: &mut TerminalSession<T>,
) -> Result<(), ProtocolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    T: Transport,
{
    let mut lines = input.lines();
    loop {
        output.write_all(prompt(session).as_bytes()).await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match AtmCommand::parse(&line) {
            Ok(AtmCommand::BeginSession { .. }) if session.logged_in_user().is_some() => {
                String::new()
            }
            Ok(AtmCommand::BeginSession { user }) => {
                output.write_all(PIN_PROMPT.as_bytes()).await?;
                output.flush().await?;
                let Some(pin) = lines.next_line().await? else {
                    break;
                };
                match session.begin_session(&user, pin.trim()).await {
                    Ok(()) => AUTHORIZED.to_string(),
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(_) => UNAUTHORIZED.to_string(),
                }
            }
            Ok(AtmCommand::Balance) => match session.balance().await {
                Ok(balance) => format!("${balance}"),
                Err(err) => render_error(err)?,
            },
            Ok(AtmCommand::Withdraw { amount }) => match session.withdraw(amount).await {
                Ok(()) => format!("${amount} dispensed"),
                Err(err) => render_error(err)?,
            },
            Ok(AtmCommand::EndSession) => match session.end_session() {
                Ok(_) => USER_LOGGED_OUT.to_string(),
                Err(err) => render_error(err)?,
            },
            Err(_) => {
                let first = line.split_whitespace().next().unwrap_or_default();
                if session.logged_in_user().is_none() && AtmCommand::is_session_command(first) {
                    NO_USER_LOGGED_IN.to_string()
                } else {
                    String::new()
                }
            }
        };

        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await?;
    Ok(())
}
