//! Local filesystem mirror provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::provider::{check_file_name, Metadata, StorageProvider};
use passvault_common::{Error, Result};

/// Mirror provider backed by a local directory.
///
/// Cloud services are modelled as `{mirror_root}/{provider}` so a synced
/// folder (Dropbox, OneDrive, ...) can act as the replication target.
pub struct LocalProvider {
    name: String,
    root: PathBuf,
}

impl LocalProvider {
    /// Create a provider named "local" rooted at `root`.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_name("local", root)
    }

    /// Create a provider for `provider` under a shared mirror root.
    ///
    /// The mirror directory is `{mirror_root}/{provider}`.
    pub fn for_provider(mirror_root: impl AsRef<Path>, provider: &str) -> Result<Self> {
        check_file_name(provider)?;
        Self::with_name(provider, mirror_root.as_ref().join(provider))
    }

    fn with_name(name: &str, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Sync create in the constructor
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self {
            name: name.to_string(),
            root,
        })
    }

    /// Directory the mirror files live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a mirrored file.
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    fn create_metadata(file_name: &str, fs_meta: &std::fs::Metadata) -> Metadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        Metadata {
            name: file_name.to_string(),
            size: fs_meta.len(),
            modified,
        }
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn metadata(&self, file_name: &str) -> Result<Option<Metadata>> {
        check_file_name(file_name)?;
        let fs_path = self.file_path(file_name);

        match fs::metadata(&fs_path).await {
            Ok(fs_meta) if fs_meta.is_file() => Ok(Some(Self::create_metadata(file_name, &fs_meta))),
            Ok(_) => Err(Error::InvalidInput(format!(
                "Mirror entry is not a file: {}",
                file_name
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload_file(
        &self,
        source: &Path,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Metadata> {
        check_file_name(file_name)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // The mirror root may have been removed since construction
        fs::create_dir_all(&self.root).await?;

        let dest = self.file_path(file_name);
        let source_meta = fs::metadata(source).await?;
        let bytes = fs::copy(source, &dest).await?;

        // The mirror carries the source's write time, not the copy time
        let mtime = FileTime::from_last_modification_time(&source_meta);
        let stamped = dest.clone();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&stamped, mtime))
            .await
            .map_err(|e| Error::Storage(format!("Failed to stamp mirror file: {}", e)))??;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(provider = %self.name, file = %file_name, bytes, "Mirrored file");

        let fs_meta = fs::metadata(&dest).await?;
        Ok(Self::create_metadata(file_name, &fs_meta))
    }

    async fn download(&self, file_name: &str) -> Result<Vec<u8>> {
        check_file_name(file_name)?;
        let fs_path = self.file_path(file_name);

        if !fs_path.is_file() {
            return Err(Error::NotFound(format!("File not found: {}", file_name)));
        }

        Ok(fs::read(&fs_path).await?)
    }

    async fn delete(&self, file_name: &str) -> Result<()> {
        check_file_name(file_name)?;
        let fs_path = self.file_path(file_name);

        if !fs_path.is_file() {
            return Err(Error::NotFound(format!("File not found: {}", file_name)));
        }

        fs::remove_file(&fs_path).await?;
        Ok(())
    }
}
