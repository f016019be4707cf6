//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! Sealed output is `nonce || ciphertext || tag`; the 24-byte nonce is
//! random per call.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};

use crate::keys::VaultKey;
use passvault_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt and authenticate `plaintext` under `key`.
pub fn seal(key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Verify and decrypt a buffer produced by [`seal`].
///
/// # Errors
/// - `InvalidPasswordOrFormat` if the buffer is truncated or the tag does
///   not verify. A wrong passphrase surfaces here, since it derives a
///   different key.
pub fn open(key: &VaultKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::InvalidPasswordOrFormat(
            "Sealed payload too short".to_string(),
        ));
    }

    let (nonce, body) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()));

    cipher
        .decrypt(GenericArray::from_slice(nonce), body)
        .map_err(|_| {
            Error::InvalidPasswordOrFormat("Payload authentication failed".to_string())
        })
}
