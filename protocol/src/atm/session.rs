//! # Terminal Session
//!
//! Client-side state machine for one relay connection:
//!
//! ```text
//!             begin_session              AUTH:<user>:PASS
//! LoggedOut ───────────────► Authenticating ───────────────► LoggedIn
//!     ▲                            │                             │
//!     │        anything else       │          end_session        │
//!     └────────────────────────────┴─────────────────────────────┘
//! ```
//!
//! Every request is sealed and sent, then lines are read until one opens
//! cleanly, clears the server-to-client watermark and answers the request
//! that was sent (same action, same user), or until
//! [`TerminalConfig::response_timeout`] runs out. Everything else is skipped:
//! the relay may duplicate requests, and the bank answers each duplicate
//! with a sealed bare `FAIL` that belongs to no request. If the deadline
//! passes after a line was skipped during login, the result is a refused
//! login.
//!
//! A request that timed out may still be answered later. Before the next
//! request goes out, the session waits one more timeout for that reply and
//! consumes it. If it never comes, the terminal can no longer tell which
//! reply belongs to which request, and the session ends.
//!
//! Losing the relay connection logs the user out.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::card::CardStore;
use crate::channel::{Direction, ReplayGuard, SecureChannel};
use crate::config::{PIN_LENGTH, RESPONSE_TIMEOUT};
use crate::error::ProtocolError;
use crate::message::{AuthVerdict, Outcome, Request, Response};
use crate::transport::Transport;

/// Terminal runtime settings.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// How long to wait for the bank's reply to one request.
    pub response_timeout: Duration,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            response_timeout: RESPONSE_TIMEOUT,
        }
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    /// An `AUTH` request is outstanding.
    Authenticating { user: String },
    LoggedIn { user: String, session_id: Uuid },
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::LoggedOut => f.write_str("logged out"),
            SessionState::Authenticating { user } => write!(f, "authenticating {user}"),
            SessionState::LoggedIn { user, .. } => write!(f, "logged in as {user}"),
        }
    }
}

/// `true` for exactly [`PIN_LENGTH`] ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
}

/// One terminal's connection to the bank.
pub struct TerminalSession<T: Transport> {
    channel: SecureChannel,
    transport: T,
    cards: Arc<dyn CardStore>,
    inbound: ReplayGuard,
    state: SessionState,
    config: TerminalConfig,
    /// The last request whose reply did not arrive in time.
    unanswered: Option<Request>,
}

impl<T: Transport> TerminalSession<T> {
    pub fn new(
        channel: SecureChannel,
        transport: T,
        cards: Arc<dyn CardStore>,
        config: TerminalConfig,
    ) -> Self {
        Self {
            channel,
            transport,
            cards,
            inbound: ReplayGuard::new(Direction::ServerToClient),
            state: SessionState::LoggedOut,
            config,
            unanswered: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn logged_in_user(&self) -> Option<&str> {
        match &self.state {
            SessionState::LoggedIn { user, .. } => Some(user),
            _ => None,
        }
    }

    /// Last accepted bank timestamp.
    pub fn last_accepted(&self) -> u64 {
        self.inbound.last_accepted()
    }

    /// Authenticates `user` with `pin` and the secret on their card.
    ///
    /// A PIN that is not 4 digits is rejected before anything is sent.
    pub async fn begin_session(&mut self, user: &str, pin: &str) -> Result<(), ProtocolError> {
        if let SessionState::LoggedIn { user: current, .. } = &self.state {
            return Err(ProtocolError::MalformedInput(format!(
                "{current} is already logged in"
            )));
        }
        if !is_valid_pin(pin) {
            return Err(ProtocolError::MalformedInput(format!(
                "PIN must be {PIN_LENGTH} digits"
            )));
        }
        let credential = self.cards.card_secret(user).map_err(|err| {
            warn!(%user, error = %err, "card unreadable");
            ProtocolError::from(err)
        })?;

        self.state = SessionState::Authenticating {
            user: user.to_string(),
        };
        let request = Request::Auth {
            user: user.to_string(),
            pin: pin.to_string(),
            credential,
        };

        match self.exchange(&request).await {
            Ok(Response::Auth {
                verdict: AuthVerdict::Pass,
                ..
            }) => {
                let session_id = Uuid::new_v4();
                info!(%user, %session_id, "session started");
                self.state = SessionState::LoggedIn {
                    user: user.to_string(),
                    session_id,
                };
                Ok(())
            }
            Ok(_) => {
                self.state = SessionState::LoggedOut;
                info!(%user, "authentication refused");
                Err(ProtocolError::AuthenticationFailure)
            }
            Err(err) => {
                self.state = SessionState::LoggedOut;
                if err.is_fatal() || matches!(err, ProtocolError::Timeout(_)) {
                    Err(err)
                } else {
                    Err(ProtocolError::AuthenticationFailure)
                }
            }
        }
    }

    /// Asks the bank for the logged-in user's balance.
    pub async fn balance(&mut self) -> Result<u64, ProtocolError> {
        let user = self.require_user()?;
        match self.exchange(&Request::Balance { user }).await? {
            Response::Balance { balance, .. } => Ok(balance),
            _ => Err(ProtocolError::Rejected),
        }
    }

    /// Withdraws `amount` from the logged-in user's account.
    pub async fn withdraw(&mut self, amount: u64) -> Result<(), ProtocolError> {
        let user = self.require_user()?;
        if amount == 0 {
            return Err(ProtocolError::MalformedInput("amount must be positive".into()));
        }
        match self.exchange(&Request::Withdraw { user, amount }).await? {
            Response::Withdraw {
                outcome: Outcome::Succeed,
                ..
            } => Ok(()),
            Response::Withdraw {
                outcome: Outcome::Insufficient,
                ..
            } => Err(ProtocolError::InsufficientFunds),
            _ => Err(ProtocolError::Rejected),
        }
    }

    /// Logs out locally. Nothing is sent. Returns who was logged in.
    pub fn end_session(&mut self) -> Result<String, ProtocolError> {
        let user = self.require_user()?;
        if let SessionState::LoggedIn { session_id, .. } = &self.state {
            info!(%user, %session_id, "session ended");
        }
        self.state = SessionState::LoggedOut;
        Ok(user)
    }

    fn require_user(&self) -> Result<String, ProtocolError> {
        self.logged_in_user()
            .map(str::to_string)
            .ok_or(ProtocolError::NotLoggedIn)
    }

    /// Settle, seal, send, then wait for the reply to `request`.
    async fn exchange(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        self.settle_unanswered().await?;

        let envelope = self.channel.seal(&request.to_string());
        debug!(action = request.action(), timestamp = envelope.timestamp, "sending request");
        if let Err(err) = self.transport.send_line(&envelope.to_string()).await {
            return Err(self.connection_lost(err.into()));
        }

        let deadline = Instant::now() + self.config.response_timeout;
        match self.await_reply(request, deadline).await {
            Err(err) if !err.is_fatal() => {
                warn!(action = request.action(), error = %err, "no usable response from bank");
                self.unanswered = Some(request.clone());
                Err(err)
            }
            other => other,
        }
    }

    /// Waits out the reply to a request that timed out earlier, so it cannot
    /// be taken for the reply to the next one.
    async fn settle_unanswered(&mut self) -> Result<(), ProtocolError> {
        let Some(unanswered) = self.unanswered.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + self.config.response_timeout;
        match self.await_reply(&unanswered, deadline).await {
            Ok(_) => {
                warn!(action = unanswered.action(), "late response consumed");
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(_) => {
                warn!(
                    action = unanswered.action(),
                    state = %self.state,
                    "bank never answered, ending session"
                );
                self.state = SessionState::LoggedOut;
                Err(ProtocolError::Timeout(self.config.response_timeout))
            }
        }
    }

    /// Reads lines until one answers `request`. At the deadline, returns why
    /// the last line was skipped, or `Timeout` if nothing arrived at all.
    async fn await_reply(
        &mut self,
        request: &Request,
        deadline: Instant,
    ) -> Result<Response, ProtocolError> {
        let mut skipped = None;
        loop {
            let line = match tokio::time::timeout_at(deadline, self.transport.recv_line()).await {
                Err(_) => {
                    return Err(
                        skipped.unwrap_or(ProtocolError::Timeout(self.config.response_timeout))
                    )
                }
                Ok(Err(err)) => return Err(self.connection_lost(err.into())),
                Ok(Ok(None)) => return Err(self.connection_lost(ProtocolError::TransportClosed)),
                Ok(Ok(Some(line))) => line,
            };

            let plaintext = match self.channel.accept_line(&line, &mut self.inbound) {
                Ok(plaintext) => plaintext,
                Err(err) => {
                    warn!(error = %err, "skipping rejected bank line");
                    skipped = Some(ProtocolError::from(err));
                    continue;
                }
            };

            match Response::parse(&plaintext) {
                Ok(response) if response.answers(request) => return Ok(response),
                Ok(Response::Fail) => {
                    debug!(expected = request.action(), "skipping bare FAIL");
                }
                Ok(_) => {
                    warn!(expected = request.action(), "skipping response to another request");
                }
                Err(_) => warn!("authenticated response did not parse"),
            }
            skipped = Some(ProtocolError::Rejected);
        }
    }

    fn connection_lost(&mut self, err: ProtocolError) -> ProtocolError {
        warn!(state = %self.state, error = %err, "relay connection lost");
        self.state = SessionState::LoggedOut;
        err
    }
}
