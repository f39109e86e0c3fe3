//! # Message Authentication
//!
//! HMAC-SHA256 integrity tags for envelopes. The tag covers the exact ASCII
//! text `"<timestamp>,<HEX ciphertext>"`, so neither the timestamp nor a
//! single ciphertext bit can change without the tag noticing.
//!
//! Verification goes through [`Mac::verify_slice`], which compares in
//! constant time. Never compare tags with `==`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{MAC_KEY_LENGTH, MAC_TAG_LENGTH};

type HmacSha256 = Hmac<Sha256>;

fn keyed(key: &[u8; MAC_KEY_LENGTH]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length")
}

/// Computes the integrity tag over `data`.
pub fn compute_tag(key: &[u8; MAC_KEY_LENGTH], data: &[u8]) -> [u8; MAC_TAG_LENGTH] {
    let mut mac = keyed(key);
    mac.update(data);
    let mut tag = [0u8; MAC_TAG_LENGTH];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Checks `tag` against the tag of `data` in constant time.
///
/// Returns `false` for wrong-length tags as well as mismatches. We don't say
/// which.
pub fn verify_tag(key: &[u8; MAC_KEY_LENGTH], data: &[u8], tag: &[u8]) -> bool {
    let mut mac = keyed(key);
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}
