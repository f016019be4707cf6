//! Storage provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use passvault_common::{Error, Result};

/// Metadata for a mirrored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// File name inside the mirror.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last write time, used for conflict detection.
    pub modified: DateTime<Utc>,
}

/// A replication target for vault files.
///
/// Implementations must handle their own authentication and rate limiting.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "dropbox", "local", "memory").
    fn name(&self) -> &str;

    /// Get metadata for a mirrored file, or `None` if it is absent.
    async fn metadata(&self, file_name: &str) -> Result<Option<Metadata>>;

    /// Check if a mirrored file exists.
    async fn exists(&self, file_name: &str) -> Result<bool> {
        Ok(self.metadata(file_name).await?.is_some())
    }

    /// Copy a local file into the mirror, replacing any existing copy.
    ///
    /// # Postconditions
    /// - The mirror holds a byte-for-byte copy of `source`
    /// - The copy's modified time is the source's modified time
    /// - Returns metadata of the written copy
    ///
    /// # Errors
    /// - `Cancelled` if `cancel` fires before or after the copy; a copy
    ///   interrupted this way may leave a partial file behind
    /// - I/O errors reading the source or writing the mirror
    async fn upload_file(
        &self,
        source: &Path,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Metadata>;

    /// Read a mirrored file.
    ///
    /// # Errors
    /// - `NotFound` if the file is absent
    async fn download(&self, file_name: &str) -> Result<Vec<u8>>;

    /// Remove a mirrored file.
    ///
    /// # Errors
    /// - `NotFound` if the file is absent
    async fn delete(&self, file_name: &str) -> Result<()>;
}

/// Reject names that would escape a flat mirror directory.
pub(crate) fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return Err(Error::InvalidInput(format!(
            "Invalid mirror file name: '{}'",
            file_name
        )));
    }
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(Error::InvalidInput(
            "Mirror file name cannot contain separators".to_string(),
        ));
    }
    Ok(())
}
