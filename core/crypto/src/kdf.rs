//! Passphrase key derivation using Argon2id.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::keys::{Salt, VaultKey, KEY_LENGTH};
use passvault_common::{Error, Result};

/// Parameters for Argon2id key derivation.
///
/// Stored alongside the salt in every container so a vault created with
/// one preset can be opened after the defaults change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Desktop default, roughly half a second to a second per unlock.
    pub fn interactive() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Lighter preset for constrained devices.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 32768,
            time_cost: 3,
            parallelism: 2,
        }
    }

    /// Slow preset for high-value vaults.
    pub fn sensitive() -> Self {
        Self {
            memory_cost: 262144,
            time_cost: 4,
            parallelism: 4,
        }
    }

    /// Look up a preset by name.
    pub fn from_preset(name: &str) -> Option<Self> {
        match name {
            "interactive" => Some(Self::interactive()),
            "moderate" => Some(Self::moderate()),
            "sensitive" => Some(Self::sensitive()),
            _ => None,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a vault key from a passphrase and salt.
///
/// # Errors
/// - `InvalidInput` if the passphrase is empty
/// - `Crypto` if the Argon2id parameters are rejected
pub fn derive_key(passphrase: &[u8], salt: &Salt, params: &KdfParams) -> Result<VaultKey> {
    if passphrase.is_empty() {
        return Err(Error::InvalidInput("Passphrase cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(VaultKey::from_bytes(key_bytes))
}
