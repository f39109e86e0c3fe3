// Copyright (c) 2026 Bankwire Contributors. MIT License.
// See LICENSE for details.

//! # Bankwire Protocol Core Library
//!
//! Authenticated, encrypted request/response messaging between an ATM and
//! its bank when the only path between them is a relay nobody trusts.
//!
//! The relay may read, drop, reorder, duplicate, modify or inject anything it
//! carries. What it cannot do, without the pre-shared keys, is forge a
//! message either endpoint will accept, learn what a message says, or make
//! an endpoint act twice on the same message.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants. Both endpoints must agree on all of them.
//! - **crypto**: AES-256-CBC, HMAC-SHA256 and the shared key material.
//! - **channel**: Sealed envelopes, freshness and the replay watermark.
//! - **message**: The colon-delimited plaintext command grammar.
//! - **transport**: One envelope per line over any byte stream.
//! - **bank**: Accounts, the transaction service and the operator console.
//! - **atm**: Cards, the terminal session state machine and its console.
//! - **error**: The error taxonomy both sides report in.
//!
//! ## Ground Rules
//!
//! 1. Nothing is acted on before its tag, its freshness and its watermark
//!    have all checked out.
//! 2. The far end never learns *why* something was rejected.
//! 3. Keys are loaded once, owned by the channel, and zeroized on drop.

pub mod atm;
pub mod bank;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod error;
pub mod message;
pub mod transport;

pub use error::ProtocolError;
