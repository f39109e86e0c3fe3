//! # AES-256-CBC Encryption
//!
//! Confidentiality layer for envelope payloads. CBC is not an AEAD, so it
//! is never used on its own: every ciphertext produced here is covered by
//! the HMAC in [`super::mac`] before it leaves the process, and
//! [`decrypt`] is only called on ciphertexts whose tag already verified.
//! That ordering is what keeps padding-oracle tricks off the table.
//!
//! ## Wire format
//!
//! [`encrypt`] returns `iv || ciphertext` as a single `Vec<u8>`. The first
//! 16 bytes are the random IV, the rest is the PKCS#7-padded ciphertext,
//! always a whole number of blocks. [`decrypt`] expects the same layout.

use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_BLOCK_LENGTH, AES_IV_LENGTH, AES_KEY_LENGTH};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Errors that can occur during encryption/decryption.
///
/// Kept vague on purpose. "Bad padding" versus "bad length" is exactly the
/// kind of detail a padding oracle feeds on.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {} bytes", AES_IV_LENGTH + AES_BLOCK_LENGTH)]
    CiphertextTooShort,

    #[error("ciphertext is not a whole number of {AES_BLOCK_LENGTH}-byte blocks")]
    UnalignedCiphertext,
}

/// Encrypt plaintext with AES-256-CBC under a fresh random IV.
///
/// Returns `iv || ciphertext`. Encrypting the same plaintext twice yields
/// unrelated outputs because the IV comes from the OS RNG each time.
///
/// # Example
///
/// ```
/// use bankwire_protocol::crypto::encryption::{decrypt, encrypt};
///
/// let key = [0x42u8; 32];
/// let sealed = encrypt(&key, b"BALANCE:Alice");
/// assert_eq!(decrypt(&key, &sealed).unwrap(), b"BALANCE:Alice");
/// ```
pub fn encrypt(key: &[u8; AES_KEY_LENGTH], plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; AES_IV_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&(*key).into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt data previously produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`EncryptionError::CiphertextTooShort`] or
/// [`EncryptionError::UnalignedCiphertext`] for structurally impossible
/// inputs, and [`EncryptionError::DecryptFailed`] when the padding does not
/// check out (wrong key or modified bytes). Callers authenticate first, so
/// in practice the last case means the peer holds a different cipher key.
pub fn decrypt(key: &[u8; AES_KEY_LENGTH], data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_IV_LENGTH + AES_BLOCK_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (iv, ciphertext) = data.split_at(AES_IV_LENGTH);
    if ciphertext.len() % AES_BLOCK_LENGTH != 0 {
        return Err(EncryptionError::UnalignedCiphertext);
    }

    let mut iv_block = [0u8; AES_IV_LENGTH];
    iv_block.copy_from_slice(iv);

    Aes256CbcDec::new(&(*key).into(), &iv_block.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"WITHDRAW:Alice:50";

        let sealed = encrypt(&key, plaintext);
        assert_eq!(decrypt(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_encrypt_empty_plaintext() {
        // PKCS#7 always adds padding, so even nothing becomes one full block.
        let key = test_key();
        let sealed = encrypt(&key, b"");
        assert_eq!(sealed.len(), AES_IV_LENGTH + AES_BLOCK_LENGTH);
        assert!(decrypt(&key, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_block_aligned_plaintext_gets_full_padding_block() {
        let key = test_key();
        let sealed = encrypt(&key, &[0x41; 16]);
        assert_eq!(sealed.len(), AES_IV_LENGTH + 2 * AES_BLOCK_LENGTH);
    }

    #[test]
    fn test_unique_ivs() {
        let key = test_key();
        let a = encrypt(&key, b"message");
        let b = encrypt(&key, b"message");
        assert_ne!(&a[..AES_IV_LENGTH], &b[..AES_IV_LENGTH]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let key = test_key();
        let sealed = encrypt(&key, b"AUTH:Alice:1234:secret");

        let mut wrong_key = test_key();
        wrong_key[0] ^= 0xFF;

        // CBC without a MAC can occasionally unpad garbage successfully;
        // what matters is that the plaintext never comes back.
        match decrypt(&wrong_key, &sealed) {
            Ok(recovered) => assert_ne!(recovered, b"AUTH:Alice:1234:secret"),
            Err(e) => assert!(matches!(e, EncryptionError::DecryptFailed)),
        }
    }

    #[test]
    fn test_decrypt_too_short() {
        let key = test_key();
        assert!(matches!(
            decrypt(&key, &[0u8; 20]),
            Err(EncryptionError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_decrypt_unaligned() {
        let key = test_key();
        let mut sealed = encrypt(&key, b"hello");
        sealed.push(0);
        assert!(matches!(
            decrypt(&key, &sealed),
            Err(EncryptionError::UnalignedCiphertext)
        ));
    }
}
