//! # Plaintext Command Grammar
//!
//! What travels inside a sealed envelope. Colon-delimited ASCII:
//!
//! ```text
//! request                          response
//! -------------------------------  ----------------------------------------
//! AUTH:<user>:<pin>:<credential>   AUTH:<user>:PASS | AUTH:<user>:FAIL
//! BALANCE:<user>                   BALANCE:<user>:<amount>
//! WITHDRAW:<user>:<amount>         WITHDRAW:<user>:SUCCEED|INSUFFICIENT|FAIL
//!                                  FAIL
//! ```
//!
//! Bare `FAIL` is the catch-all reply for anything the bank will not answer
//! more specifically: channel rejections, replays, unknown users, garbage.

use std::fmt;

use thiserror::Error;

pub const AUTH: &str = "AUTH";
pub const BALANCE: &str = "BALANCE";
pub const WITHDRAW: &str = "WITHDRAW";
pub const FAIL: &str = "FAIL";

/// Why a plaintext did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("unrecognized message")]
    Malformed,

    /// A well-formed `WITHDRAW` whose amount is zero, negative or not a number.
    /// Carries the user so the bank can still answer `WITHDRAW:<user>:FAIL`.
    #[error("invalid amount for {user}")]
    InvalidAmount { user: String },
}

/// Parses a strictly positive decimal amount.
pub fn parse_amount(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok().filter(|&amount| amount > 0)
}

/// `true` if `user` can appear as a field without breaking the grammar.
pub fn is_valid_user(user: &str) -> bool {
    !user.is_empty() && !user.contains(':') && !user.chars().any(char::is_whitespace)
}

fn user_field(user: &str) -> Result<String, MessageError> {
    if is_valid_user(user) {
        Ok(user.to_string())
    } else {
        Err(MessageError::Malformed)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Terminal-to-bank command.
#[derive(Clone, PartialEq, Eq)]
pub enum Request {
    Auth {
        user: String,
        pin: String,
        credential: String,
    },
    Balance {
        user: String,
    },
    Withdraw {
        user: String,
        amount: u64,
    },
}

impl Request {
    pub fn parse(plaintext: &str) -> Result<Self, MessageError> {
        let (action, rest) = plaintext.split_once(':').ok_or(MessageError::Malformed)?;
        match action {
            AUTH => {
                // The credential is the tail; it may itself contain colons.
                let mut parts = rest.splitn(3, ':');
                let (Some(user), Some(pin), Some(credential)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(MessageError::Malformed);
                };
                Ok(Request::Auth {
                    user: user_field(user)?,
                    pin: pin.to_string(),
                    credential: credential.to_string(),
                })
            }
            BALANCE => Ok(Request::Balance {
                user: user_field(rest)?,
            }),
            WITHDRAW => {
                let (user, amount) = rest.split_once(':').ok_or(MessageError::Malformed)?;
                let user = user_field(user)?;
                match parse_amount(amount) {
                    Some(amount) => Ok(Request::Withdraw { user, amount }),
                    None => Err(MessageError::InvalidAmount { user }),
                }
            }
            _ => Err(MessageError::Malformed),
        }
    }

    pub fn user(&self) -> &str {
        match self {
            Request::Auth { user, .. }
            | Request::Balance { user }
            | Request::Withdraw { user, .. } => user,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::Auth { .. } => AUTH,
            Request::Balance { .. } => BALANCE,
            Request::Withdraw { .. } => WITHDRAW,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Auth {
                user,
                pin,
                credential,
            } => write!(f, "{AUTH}:{user}:{pin}:{credential}"),
            Request::Balance { user } => write!(f, "{BALANCE}:{user}"),
            Request::Withdraw { user, amount } => write!(f, "{WITHDRAW}:{user}:{amount}"),
        }
    }
}

// Requests carry the PIN and card secret; keep them out of logs.
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Auth { user, .. } => f
                .debug_struct("Auth")
                .field("user", user)
                .field("pin", &"[REDACTED]")
                .field("credential", &"[REDACTED]")
                .finish(),
            Request::Balance { user } => f.debug_struct("Balance").field("user", user).finish(),
            Request::Withdraw { user, amount } => f
                .debug_struct("Withdraw")
                .field("user", user)
                .field("amount", amount)
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Verdict on an `AUTH` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Pass,
    Fail,
}

/// Result of a `WITHDRAW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Insufficient,
    Fail,
}

impl fmt::Display for AuthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthVerdict::Pass => "PASS",
            AuthVerdict::Fail => FAIL,
        })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Succeed => "SUCCEED",
            Outcome::Insufficient => "INSUFFICIENT",
            Outcome::Fail => FAIL,
        })
    }
}

/// Bank-to-terminal reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Auth { user: String, verdict: AuthVerdict },
    Balance { user: String, balance: u64 },
    Withdraw { user: String, outcome: Outcome },
    Fail,
}

impl Response {
    pub fn parse(plaintext: &str) -> Result<Self, MessageError> {
        if plaintext == FAIL {
            return Ok(Response::Fail);
        }
        let mut parts = plaintext.split(':');
        let (Some(action), Some(user), Some(value), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(MessageError::Malformed);
        };
        let user = user_field(user)?;

        match (action, value) {
            (AUTH, "PASS") => Ok(Response::Auth {
                user,
                verdict: AuthVerdict::Pass,
            }),
            (AUTH, FAIL) => Ok(Response::Auth {
                user,
                verdict: AuthVerdict::Fail,
            }),
            (BALANCE, amount) if !amount.is_empty() && amount.bytes().all(|b| b.is_ascii_digit()) => {
                let balance = amount.parse().map_err(|_| MessageError::Malformed)?;
                Ok(Response::Balance { user, balance })
            }
            (WITHDRAW, "SUCCEED") => Ok(Response::Withdraw {
                user,
                outcome: Outcome::Succeed,
            }),
            (WITHDRAW, "INSUFFICIENT") => Ok(Response::Withdraw {
                user,
                outcome: Outcome::Insufficient,
            }),
            (WITHDRAW, FAIL) => Ok(Response::Withdraw {
                user,
                outcome: Outcome::Fail,
            }),
            _ => Err(MessageError::Malformed),
        }
    }

    /// `true` if this reply is about the same action and user as `request`.
    ///
    /// Bare `FAIL` answers nothing: the bank also sends it for duplicated or
    /// tampered envelopes, so it cannot be tied to any one request.
    pub fn answers(&self, request: &Request) -> bool {
        let user = match (self, request) {
            (Response::Auth { user, .. }, Request::Auth { .. })
            | (Response::Balance { user, .. }, Request::Balance { .. })
            | (Response::Withdraw { user, .. }, Request::Withdraw { .. }) => user,
            _ => return false,
        };
        user == request.user()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Auth { user, verdict } => write!(f, "{AUTH}:{user}:{verdict}"),
            Response::Balance { user, balance } => write!(f, "{BALANCE}:{user}:{balance}"),
            Response::Withdraw { user, outcome } => write!(f, "{WITHDRAW}:{user}:{outcome}"),
            Response::Fail => f.write_str(FAIL),
        }
    }
}
