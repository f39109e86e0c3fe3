//! Operator console for the bank.
//!
//! ```text
//! Bank: balance Alice
//! $100
//! Bank: deposit Alice 25
//! $25 added to Alice's account
//! ```
//!
//! Commands act on the account store directly, not through the secure
//! channel. Anything that fails prints an empty line; the reason goes to the
//! log.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::store::AccountStore;
use crate::config::BANK_PROMPT;
use crate::error::ProtocolError;
use crate::message::parse_amount;

/// One parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankCommand {
    Balance { user: String },
    Deposit { user: String, amount: u64 },
}

impl BankCommand {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["balance", user] => Ok(Self::Balance {
                user: user.to_string(),
            }),
            ["deposit", user, amount] => {
                let amount = parse_amount(amount).ok_or_else(|| {
                    ProtocolError::MalformedInput(format!("invalid amount: {amount}"))
                })?;
                Ok(Self::Deposit {
                    user: user.to_string(),
                    amount,
                })
            }
            _ => Err(ProtocolError::MalformedInput(line.trim().to_string())),
        }
    }

    /// Runs the command and returns the console reply.
    pub fn execute(&self, store: &dyn AccountStore) -> Result<String, ProtocolError> {
        match self {
            Self::Balance { user } => Ok(format!("${}", store.balance(user)?)),
            Self::Deposit { user, amount } => {
                let balance = store.deposit(user, *amount)?;
                info!(%user, amount, balance, "operator deposit");
                Ok(format!("${amount} added to {user}'s account"))
            }
        }
    }
}

impl fmt::Display for BankCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balance { user } => write!(f, "balance {user}"),
            Self::Deposit { user, amount } => write!(f, "deposit {user} {amount}"),
        }
    }
}

/// Parses and runs one console line. Failures become an empty reply.
pub fn respond(line: &str, store: &dyn AccountStore) -> String {
    match BankCommand::parse(line).and_then(|cmd| cmd.execute(store)) {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "console command failed");
            String::new()
        }
    }
}

/// Prompt-read-reply loop until `input` reaches EOF.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    store: &dyn AccountStore,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(BANK_PROMPT.as_bytes()).await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let reply = respond(&line, store);
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::store::InMemoryAccountStore;

    #[test]
    fn test_parse() {
        assert_eq!(
            BankCommand::parse("balance Alice").unwrap(),
            BankCommand::Balance {
                user: "Alice".into()
            }
        );
        assert_eq!(
            BankCommand::parse("  deposit   Bob 20 ").unwrap(),
            BankCommand::Deposit {
                user: "Bob".into(),
                amount: 20
            }
        );
    }

    #[test]
    fn test_parse_rejects() {
        for line in [
            "",
            "balance",
            "balance Alice extra",
            "deposit Alice",
            "deposit Alice 0",
            "deposit Alice -3",
            "deposit Alice ten",
            "withdraw Alice 5",
        ] {
            assert!(
                matches!(
                    BankCommand::parse(line),
                    Err(ProtocolError::MalformedInput(_))
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn test_respond() {
        let store = InMemoryAccountStore::demo();
        assert_eq!(respond("balance Alice", &store), "$100");
        assert_eq!(
            respond("deposit Alice 25", &store),
            "$25 added to Alice's account"
        );
        assert_eq!(respond("balance Alice", &store), "$125");
        assert_eq!(respond("balance Mallory", &store), "");
        assert_eq!(respond("deposit Mallory 5", &store), "");
        assert_eq!(respond("nonsense", &store), "");
    }

    #[test]
    fn test_deposit_saturates() {
        let store = InMemoryAccountStore::demo();
        let max = u64::MAX;
        respond(&format!("deposit Carol {max}"), &store);
        respond("deposit Carol 1", &store);
        assert_eq!(respond("balance Carol", &store), format!("${max}"));
    }

    #[tokio::test]
    async fn test_console_loop() {
        let store = InMemoryAccountStore::demo();
        let input: &[u8] = b"balance Bob\ndeposit Bob 5\nbogus\n";
        let mut output = Vec::new();
        run_console(input, &mut output, &store).await.unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Bank: $100\nBank: $5 added to Bob's account\nBank: \nBank: "
        );
    }
}
