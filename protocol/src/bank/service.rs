//! # Transaction Service
//!
//! The bank's side of the protocol. For every inbound line:
//!
//! 1. Open the envelope and admit its timestamp against the client-to-server
//!    watermark. Any failure ⇒ sealed `FAIL`.
//! 2. Parse the plaintext request and run it against the [`AccountStore`].
//! 3. Seal the reply with a fresh timestamp.
//!
//! Every reply is a sealed envelope, failures included. The terminal never
//! has to interpret an unauthenticated line.
//!
//! The watermark lock is held across admit and dispatch, so a replayed
//! envelope racing its original can never both pass the check. The store
//! takes its own per-account lock inside dispatch; neither lock is held
//! across an `.await`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::account::AccountError;
use super::store::AccountStore;
use crate::channel::{Direction, ReplayGuard, SecureChannel, SecuredEnvelope};
use crate::message::{AuthVerdict, MessageError, Outcome, Request, Response};
use crate::transport::{LineTransport, Transport, TransportError};

/// Server state: the channel, the account table and one watermark.
pub struct TransactionService {
    channel: SecureChannel,
    store: Arc<dyn AccountStore>,
    inbound: Mutex<ReplayGuard>,
}

impl TransactionService {
    pub fn new(channel: SecureChannel, store: Arc<dyn AccountStore>) -> Self {
        Self {
            channel,
            store,
            inbound: Mutex::new(ReplayGuard::new(Direction::ClientToServer)),
        }
    }

    /// Handles one raw line from the relay and returns the sealed reply.
    pub fn handle_line(&self, line: &str) -> SecuredEnvelope {
        let reply = self.process(line);
        self.channel.seal(&reply.to_string())
    }

    /// Last accepted client timestamp.
    pub fn last_accepted(&self) -> u64 {
        self.inbound.lock().last_accepted()
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    fn process(&self, line: &str) -> Response {
        let mut guard = self.inbound.lock();
        let plaintext = match self.channel.accept_line(line, &mut guard) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                warn!(error = %err, "rejected inbound envelope");
                return Response::Fail;
            }
        };
        let reply = self.dispatch(&plaintext);
        drop(guard);
        reply
    }

    /// Runs one already-authenticated plaintext request.
    fn dispatch(&self, plaintext: &str) -> Response {
        let request = match Request::parse(plaintext) {
            Ok(request) => request,
            Err(MessageError::InvalidAmount { user }) => {
                info!(%user, "withdraw with invalid amount");
                return Response::Withdraw {
                    user,
                    outcome: Outcome::Fail,
                };
            }
            Err(MessageError::Malformed) => {
                warn!("authenticated request did not parse");
                return Response::Fail;
            }
        };

        match request {
            Request::Auth {
                user,
                pin,
                credential,
            } => {
                // Unknown users get the same answer as a wrong PIN.
                let verdict = match self.store.verify(&user, &pin, &credential) {
                    Ok(true) => AuthVerdict::Pass,
                    Ok(false) | Err(_) => AuthVerdict::Fail,
                };
                info!(%user, ?verdict, "authentication attempt");
                Response::Auth { user, verdict }
            }
            Request::Balance { user } => match self.store.balance(&user) {
                Ok(balance) => {
                    debug!(%user, "balance query");
                    Response::Balance { user, balance }
                }
                Err(err) => {
                    info!(%user, error = %err, "balance query refused");
                    Response::Fail
                }
            },
            Request::Withdraw { user, amount } => match self.store.withdraw(&user, amount) {
                Ok(remaining) => {
                    info!(%user, amount, remaining, "withdrawal");
                    Response::Withdraw {
                        user,
                        outcome: Outcome::Succeed,
                    }
                }
                Err(AccountError::InsufficientFunds { balance, .. }) => {
                    info!(%user, amount, balance, "withdrawal refused: insufficient funds");
                    Response::Withdraw {
                        user,
                        outcome: Outcome::Insufficient,
                    }
                }
                Err(AccountError::InvalidAmount) => Response::Withdraw {
                    user,
                    outcome: Outcome::Fail,
                },
                Err(AccountError::UnknownUser(_)) => {
                    info!(%user, "withdrawal for unknown user");
                    Response::Fail
                }
            },
        }
    }
}

/// Serves one relay connection until it closes.
///
/// Blank lines are ignored. Everything else gets exactly one sealed reply.
pub async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    service: Arc<TransactionService>,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    serve_transport(&mut LineTransport::new(reader, writer), &service).await
}

/// [`serve_connection`] over an already-framed transport.
pub async fn serve_transport<T: Transport + ?Sized>(
    transport: &mut T,
    service: &TransactionService,
) -> Result<(), TransportError> {
    while let Some(line) = transport.recv_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = service.handle_line(&line);
        transport.send_line(&reply.to_string()).await?;
    }
    info!("relay connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::store::InMemoryAccountStore;
    use crate::channel::{ManualClock, SecureChannel};
    use crate::config::DEMO_ACCOUNTS;
    use crate::crypto::ChannelKeys;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000_000;

    struct Harness {
        service: TransactionService,
        client: SecureChannel,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            let keys = ChannelKeys::generate();
            let clock = Arc::new(ManualClock::new(T0));
            let service = TransactionService::new(
                SecureChannel::with_clock(keys.clone(), clock.clone()),
                Arc::new(InMemoryAccountStore::demo()),
            );
            Self {
                service,
                client: SecureChannel::with_clock(keys, clock.clone()),
                clock,
            }
        }

        fn send(&self, plaintext: &str) -> String {
            let line = self.client.seal(plaintext).to_string();
            self.send_raw(&line)
        }

        fn send_raw(&self, line: &str) -> String {
            let reply = self.service.handle_line(line);
            self.client.open(&reply).expect("bank replies are always sealed")
        }
    }

    fn auth(user: &str) -> String {
        let (_, _, pin, card) = DEMO_ACCOUNTS
            .iter()
            .copied()
            .find(|(name, ..)| *name == user)
            .unwrap();
        format!("AUTH:{user}:{pin}:{card}")
    }

    #[test]
    fn test_auth_pass_and_fail() {
        let h = Harness::new();
        assert_eq!(h.send(&auth("Alice")), "AUTH:Alice:PASS");
        let card = DEMO_ACCOUNTS[0].3;
        assert_eq!(h.send(&format!("AUTH:Alice:9999:{card}")), "AUTH:Alice:FAIL");
        assert_eq!(h.send("AUTH:Mallory:1234:x"), "AUTH:Mallory:FAIL");
    }

    #[test]
    fn test_balance() {
        let h = Harness::new();
        assert_eq!(h.send("BALANCE:Alice"), "BALANCE:Alice:100");
        assert_eq!(h.send("BALANCE:Carol"), "BALANCE:Carol:0");
        assert_eq!(h.send("BALANCE:Mallory"), "FAIL");
    }

    #[test]
    fn test_withdraw_scenario() {
        let h = Harness::new();
        assert_eq!(h.send("WITHDRAW:Alice:50"), "WITHDRAW:Alice:SUCCEED");
        assert_eq!(h.send("WITHDRAW:Alice:100"), "WITHDRAW:Alice:INSUFFICIENT");
        assert_eq!(h.send("BALANCE:Alice"), "BALANCE:Alice:50");
    }

    #[test]
    fn test_withdraw_bad_amounts() {
        let h = Harness::new();
        for amount in ["0", "-5", "lots"] {
            assert_eq!(
                h.send(&format!("WITHDRAW:Bob:{amount}")),
                "WITHDRAW:Bob:FAIL"
            );
        }
        assert_eq!(h.send("WITHDRAW:Mallory:5"), "FAIL");
        assert_eq!(h.service.store().balance("Bob").unwrap(), 100);
    }

    #[test]
    fn test_unknown_action_fails() {
        let h = Harness::new();
        assert_eq!(h.send("DEPOSIT:Alice:1000"), "FAIL");
        assert_eq!(h.send("hello"), "FAIL");
    }

    #[test]
    fn test_replayed_withdraw_fails_without_mutation() {
        let h = Harness::new();
        let captured = h.client.seal("WITHDRAW:Alice:10").to_string();
        assert_eq!(h.send_raw(&captured), "WITHDRAW:Alice:SUCCEED");

        h.clock.advance(Duration::from_secs(1));
        assert_eq!(h.send_raw(&captured), "FAIL");
        assert_eq!(h.service.store().balance("Alice").unwrap(), 90);
    }

    #[test]
    fn test_garbage_and_tamper_get_sealed_fail() {
        let h = Harness::new();
        assert_eq!(h.send_raw("not an envelope"), "FAIL");

        let mut env = h.client.seal("WITHDRAW:Alice:10");
        env.ciphertext[17] ^= 0x04;
        assert_eq!(h.send_raw(&env.to_string()), "FAIL");
        assert_eq!(h.service.last_accepted(), 0);
        assert_eq!(h.service.store().balance("Alice").unwrap(), 100);
    }

    #[test]
    fn test_stale_request_fails() {
        let h = Harness::new();
        let env = h.client.seal("WITHDRAW:Alice:10");
        h.clock.advance(Duration::from_millis(crate::config::FRESHNESS_WINDOW_MS + 1));
        assert_eq!(h.send_raw(&env.to_string()), "FAIL");
        assert_eq!(h.service.store().balance("Alice").unwrap(), 100);
    }

    #[test]
    fn test_wrong_pin_advances_watermark_once() {
        let h = Harness::new();
        let card = DEMO_ACCOUNTS[0].3;
        let env = h.client.seal(&format!("AUTH:Alice:0000:{card}"));
        assert_eq!(h.send_raw(&env.to_string()), "AUTH:Alice:FAIL");
        assert_eq!(h.service.last_accepted(), env.timestamp);
    }

    #[tokio::test]
    async fn test_serve_connection_over_duplex() {
        let keys = ChannelKeys::generate();
        let service = Arc::new(TransactionService::new(
            SecureChannel::new(keys.clone()),
            Arc::new(InMemoryAccountStore::demo()),
        ));
        let client = SecureChannel::new(keys);

        let (bank_side, atm_side) = tokio::io::duplex(4096);
        let (br, bw) = tokio::io::split(bank_side);
        let server = tokio::spawn(serve_connection(br, bw, service));

        let (ar, aw) = tokio::io::split(atm_side);
        let mut atm = LineTransport::new(ar, aw);
        atm.send_line("").await.unwrap();
        atm.send_line(&client.seal("BALANCE:Bob").to_string())
            .await
            .unwrap();
        let reply = atm.recv_line().await.unwrap().unwrap();
        let reply = client.open(&reply.parse().unwrap()).unwrap();
        assert_eq!(reply, "BALANCE:Bob:100");

        drop(atm);
        server.await.unwrap().unwrap();
    }
}
