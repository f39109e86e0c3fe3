//! # Cryptographic Primitives
//!
//! Everything secret flows through here:
//!
//! - **AES-256-CBC** with PKCS#7 padding for payload confidentiality.
//! - **HMAC-SHA256** over `timestamp,ciphertext` for integrity.
//! - **ChannelKeys** for the pre-shared key material.
//!
//! These are thin wrappers around the RustCrypto implementations. The
//! envelope logic that combines them lives in [`crate::channel`]; nothing
//! outside that module should need to call the cipher or the MAC directly.

pub mod encryption;
pub mod keys;
pub mod mac;

pub use encryption::{decrypt, encrypt, EncryptionError};
pub use keys::{ChannelKeys, KeyError};
pub use mac::{compute_tag, verify_tag};
