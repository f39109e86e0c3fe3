//! Replay protection via a per-direction timestamp watermark.
//!
//! Each receiving endpoint keeps one guard for the direction it reads from.
//! The guard rejects any envelope whose timestamp is not strictly above the
//! last one it accepted. This is independent of the integrity tag: a replay
//! carries a perfectly valid tag, and only the watermark can tell it apart
//! from the original.
//!
//! The guard itself is not synchronized. Callers that can see concurrent
//! envelopes hold it behind a lock for the whole admit-then-act sequence.

use std::fmt;

/// Which way the traffic a guard watches is flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Requests from the terminal, checked by the bank.
    ClientToServer,
    /// Responses from the bank, checked by the terminal.
    ServerToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToServer => f.write_str("client->server"),
            Direction::ServerToClient => f.write_str("server->client"),
        }
    }
}

/// Strictly increasing watermark for one direction.
#[derive(Debug, Clone)]
pub struct ReplayGuard {
    direction: Direction,
    last_accepted: u64,
}

impl ReplayGuard {
    /// A fresh guard with the watermark at zero.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            last_accepted: 0,
        }
    }

    /// Accepts `timestamp` iff it is strictly above the watermark, advancing
    /// the watermark on acceptance.
    pub fn admit(&mut self, timestamp: u64) -> bool {
        if timestamp <= self.last_accepted {
            tracing::debug!(
                direction = %self.direction,
                timestamp,
                watermark = self.last_accepted,
                "watermark rejected envelope"
            );
            return false;
        }
        self.last_accepted = timestamp;
        true
    }

    /// The last accepted timestamp, or 0 if nothing was accepted yet.
    pub fn last_accepted(&self) -> u64 {
        self.last_accepted
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_monotonic() {
        let mut guard = ReplayGuard::new(Direction::ClientToServer);
        assert!(guard.admit(1));
        assert!(guard.admit(2));
        assert!(!guard.admit(2)); // replay
        assert!(!guard.admit(1)); // behind
        assert!(guard.admit(3));
        assert!(guard.admit(100)); // gaps are fine
        assert!(!guard.admit(50));
        assert_eq!(guard.last_accepted(), 100);
    }

    #[test]
    fn test_zero_is_never_admitted() {
        let mut guard = ReplayGuard::new(Direction::ServerToClient);
        assert!(!guard.admit(0));
        assert_eq!(guard.last_accepted(), 0);
    }

    #[test]
    fn test_rejection_leaves_watermark_alone() {
        let mut guard = ReplayGuard::new(Direction::ServerToClient);
        assert!(guard.admit(10));
        assert!(!guard.admit(5));
        assert_eq!(guard.last_accepted(), 10);
    }

    #[test]
    fn test_direction_label() {
        assert_eq!(Direction::ClientToServer.to_string(), "client->server");
        assert_eq!(
            ReplayGuard::new(Direction::ServerToClient).direction(),
            Direction::ServerToClient
        );
    }
}
