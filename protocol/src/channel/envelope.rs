//! # Secured Envelope Wire Format
//!
//! One envelope per line, three comma-separated ASCII fields:
//!
//! ```text
//! <timestamp-ms>,<HEX iv || ciphertext>,<HEX hmac tag>
//! ```
//!
//! The tag covers the first two fields exactly as [`SecuredEnvelope::authenticated_data`]
//! renders them. Hex is written uppercase; either case parses.

use std::fmt;
use std::str::FromStr;

use super::error::ChannelError;

/// A sealed message as it crosses the relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecuredEnvelope {
    /// Sender's wall-clock time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// `iv || AES-256-CBC ciphertext`.
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over [`authenticated_data`](Self::authenticated_data).
    pub tag: Vec<u8>,
}

impl SecuredEnvelope {
    /// The bytes the integrity tag is computed over: `"<timestamp>,<HEX ciphertext>"`.
    pub fn authenticated_data(&self) -> String {
        format!("{},{}", self.timestamp, hex::encode_upper(&self.ciphertext))
    }

    /// Parses one line off the wire. Alias for `str::parse` that reads better
    /// at call sites handling raw transport input.
    pub fn parse_line(line: &str) -> Result<Self, ChannelError> {
        line.parse()
    }
}

impl fmt::Display for SecuredEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{}",
            self.authenticated_data(),
            hex::encode_upper(&self.tag)
        )
    }
}

impl FromStr for SecuredEnvelope {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').collect();
        let [timestamp, ciphertext, tag] = fields.as_slice() else {
            return Err(ChannelError::MalformedEnvelope(format!(
                "expected 3 fields, found {}",
                fields.len()
            )));
        };

        let timestamp = timestamp
            .trim()
            .parse::<u64>()
            .map_err(|_| ChannelError::MalformedEnvelope("timestamp is not a number".into()))?;
        let ciphertext = hex::decode(ciphertext.trim())
            .map_err(|_| ChannelError::MalformedEnvelope("ciphertext is not hex".into()))?;
        let tag = hex::decode(tag.trim())
            .map_err(|_| ChannelError::MalformedEnvelope("tag is not hex".into()))?;

        Ok(Self {
            timestamp,
            ciphertext,
            tag,
        })
    }
}
