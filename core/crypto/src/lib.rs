//! Cryptographic primitives for the passvault container.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Key material that is zeroized on drop
//!
//! Nothing here defines the container layout; the vault crate decides how
//! salts, parameters and sealed payloads are laid out on disk.

pub mod cipher;
pub mod kdf;
pub mod keys;

pub use cipher::{open, seal, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_key, KdfParams};
pub use keys::{Salt, VaultKey, KEY_LENGTH, SALT_LENGTH};
