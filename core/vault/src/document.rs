//! The encrypted vault container.
//!
//! A vault file is a small JSON envelope:
//!
//! ```text
//! { "format": "passvault", "version": 1, "salt": <base64>,
//!   "kdf": { memory_cost, time_cost, parallelism }, "payload": <base64> }
//! ```
//!
//! `payload` is the XChaCha20-Poly1305 sealed JSON body (entries, header
//! records, policies) under a key derived from the passphrase with
//! Argon2id. The session layer only ever sees the decrypted body through
//! the [`VaultDocument`] trait.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use zeroize::Zeroizing;

use crate::entry::{Entry, HeaderRecord};
use passvault_common::{Error, Result};
use passvault_crypto::{derive_key, open, seal, KdfParams, Salt, VaultKey};
use passvault_policy::PasswordPolicy;

/// Format tag written into every container.
pub const FORMAT_NAME: &str = "passvault";

/// Current container version.
pub const FORMAT_VERSION: u32 = 1;

/// An opened, decrypted vault document.
#[async_trait]
pub trait VaultDocument: Send + Sync + Sized {
    /// Create an empty document protected by `passphrase`.
    fn create(passphrase: &[u8], kdf: &KdfParams) -> Result<Self>;

    /// Open the document at `path`.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    /// - `InvalidPasswordOrFormat` for a wrong passphrase or a file that
    ///   is not a readable container
    /// - `Io` for other read failures
    async fn load(path: &Path, passphrase: &[u8]) -> Result<Self>;

    /// Write the document to `path` and clear the changed flag.
    async fn save(&mut self, path: &Path) -> Result<()>;

    /// Re-key the document under `passphrase` and write it to `path`.
    ///
    /// The new key is only adopted once the write succeeded; on error the
    /// document keeps its previous key and changed flag.
    async fn change_passphrase(&mut self, path: &Path, passphrase: &[u8]) -> Result<()>;

    fn entries(&self) -> &[Entry];
    fn entries_mut(&mut self) -> &mut Vec<Entry>;
    fn headers(&self) -> &[HeaderRecord];
    fn headers_mut(&mut self) -> &mut Vec<HeaderRecord>;
    fn policies(&self) -> &[PasswordPolicy];
    fn policies_mut(&mut self) -> &mut Vec<PasswordPolicy>;

    /// Entries and headers borrowed together, for group operations.
    fn groups_mut(&mut self) -> (&mut Vec<Entry>, &mut Vec<HeaderRecord>);

    /// Whether there are unsaved changes.
    fn has_changed(&self) -> bool;

    /// Flag unsaved changes.
    fn mark_changed(&mut self);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocumentBody {
    #[serde(default)]
    entries: Vec<Entry>,
    #[serde(default)]
    headers: Vec<HeaderRecord>,
    #[serde(default)]
    policies: Vec<PasswordPolicy>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    salt: String,
    kdf: KdfParams,
    payload: String,
}

/// Argon2id + XChaCha20-Poly1305 sealed JSON document.
pub struct EncryptedDocument {
    body: DocumentBody,
    key: VaultKey,
    salt: Salt,
    kdf: KdfParams,
    changed: bool,
}

impl EncryptedDocument {
    fn with_key(body: DocumentBody, passphrase: &[u8], salt: Salt, kdf: KdfParams) -> Result<Self> {
        let key = derive_key(passphrase, &salt, &kdf)?;
        Ok(Self {
            body,
            key,
            salt,
            kdf,
            changed: false,
        })
    }

    /// KDF parameters the container was written with.
    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf
    }

    fn decode(bytes: &[u8], passphrase: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes).map_err(|_| {
            Error::InvalidPasswordOrFormat("File is not a passvault container".to_string())
        })?;

        if envelope.format != FORMAT_NAME {
            return Err(Error::InvalidPasswordOrFormat(format!(
                "Unknown container format: {}",
                envelope.format
            )));
        }
        if envelope.version != FORMAT_VERSION {
            return Err(Error::InvalidPasswordOrFormat(format!(
                "Unsupported container version: {}",
                envelope.version
            )));
        }

        let salt = BASE64
            .decode(&envelope.salt)
            .ok()
            .and_then(|bytes| Salt::from_slice(&bytes))
            .ok_or_else(|| Error::InvalidPasswordOrFormat("Corrupt salt".to_string()))?;
        let sealed = BASE64
            .decode(&envelope.payload)
            .map_err(|_| Error::InvalidPasswordOrFormat("Corrupt payload".to_string()))?;

        let mut document = Self::with_key(DocumentBody::default(), passphrase, salt, envelope.kdf)?;
        let plaintext = Zeroizing::new(open(&document.key, &sealed)?);
        document.body = serde_json::from_slice(&plaintext).map_err(|_| {
            Error::InvalidPasswordOrFormat("Decrypted payload is malformed".to_string())
        })?;

        Ok(document)
    }

    fn encode(&self, key: &VaultKey, salt: &Salt) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(serde_json::to_vec(&self.body)?);
        let sealed = seal(key, &plaintext)?;

        let envelope = Envelope {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
            salt: BASE64.encode(salt.as_bytes()),
            kdf: self.kdf.clone(),
            payload: BASE64.encode(sealed),
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_path(path);
    fs::write(&temp, bytes).await?;
    fs::rename(&temp, path).await?;
    Ok(())
}

#[async_trait]
impl VaultDocument for EncryptedDocument {
    fn create(passphrase: &[u8], kdf: &KdfParams) -> Result<Self> {
        let mut document =
            Self::with_key(DocumentBody::default(), passphrase, Salt::generate(), kdf.clone())?;
        document.changed = true;
        Ok(document)
    }

    async fn load(path: &Path, passphrase: &[u8]) -> Result<Self> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "Vault file not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let document = Self::decode(&bytes, passphrase)?;
        debug!(path = %path.display(), entries = document.body.entries.len(), "Opened container");
        Ok(document)
    }

    async fn save(&mut self, path: &Path) -> Result<()> {
        let bytes = self.encode(&self.key, &self.salt)?;
        write_atomic(path, &bytes).await?;

        self.changed = false;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote container");
        Ok(())
    }

    async fn change_passphrase(&mut self, path: &Path, passphrase: &[u8]) -> Result<()> {
        let salt = Salt::generate();
        let key = derive_key(passphrase, &salt, &self.kdf)?;
        let bytes = self.encode(&key, &salt)?;
        write_atomic(path, &bytes).await?;

        self.key = key;
        self.salt = salt;
        self.changed = false;
        debug!(path = %path.display(), "Re-keyed container");
        Ok(())
    }

    fn entries(&self) -> &[Entry] {
        &self.body.entries
    }

    fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.body.entries
    }

    fn headers(&self) -> &[HeaderRecord] {
        &self.body.headers
    }

    fn headers_mut(&mut self) -> &mut Vec<HeaderRecord> {
        &mut self.body.headers
    }

    fn policies(&self) -> &[PasswordPolicy] {
        &self.body.policies
    }

    fn policies_mut(&mut self) -> &mut Vec<PasswordPolicy> {
        &mut self.body.policies
    }

    fn groups_mut(&mut self) -> (&mut Vec<Entry>, &mut Vec<HeaderRecord>) {
        (&mut self.body.entries, &mut self.body.headers)
    }

    fn has_changed(&self) -> bool {
        self.changed
    }

    fn mark_changed(&mut self) {
        self.changed = true;
    }
}
