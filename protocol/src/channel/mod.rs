//! # Secure Channel
//!
//! The only thing that crosses the relay is a [`SecuredEnvelope`]. This
//! module seals plaintext into envelopes and opens them again, and keeps the
//! per-direction [`ReplayGuard`] watermark that catches replays.
//!
//! Both endpoints hold the same [`ChannelKeys`](crate::crypto::ChannelKeys).
//! The relay holds nothing and is assumed hostile: it may drop, reorder,
//! duplicate, modify or inject lines.

pub mod clock;
pub mod envelope;
pub mod error;
pub mod replay;
pub mod secure;

pub use clock::{Clock, ManualClock, SystemClock};
pub use envelope::SecuredEnvelope;
pub use error::ChannelError;
pub use replay::{Direction, ReplayGuard};
pub use secure::SecureChannel;
