//! In-memory mirror provider for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use crate::provider::{check_file_name, Metadata, StorageProvider};
use passvault_common::{Error, Result};

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    metadata: Metadata,
}

/// In-memory mirror provider.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Clones share the same storage.
#[derive(Clone)]
pub struct MemoryProvider {
    storage: Arc<RwLock<HashMap<String, StoredFile>>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store `data` directly, bypassing a source file.
    pub fn insert(&self, file_name: &str, data: Vec<u8>) -> Result<Metadata> {
        check_file_name(file_name)?;
        let metadata = Metadata {
            name: file_name.to_string(),
            size: data.len() as u64,
            modified: Utc::now(),
        };
        self.write()?.insert(
            file_name.to_string(),
            StoredFile {
                data,
                metadata: metadata.clone(),
            },
        );
        Ok(metadata)
    }

    /// Override the recorded write time of a stored file.
    pub fn set_modified(&self, file_name: &str, modified: DateTime<Utc>) -> Result<()> {
        let mut storage = self.write()?;
        let file = storage
            .get_mut(file_name)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file_name)))?;
        file.metadata.modified = modified;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredFile>>> {
        self.storage
            .read()
            .map_err(|_| Error::Storage("Memory provider lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredFile>>> {
        self.storage
            .write()
            .map_err(|_| Error::Storage("Memory provider lock poisoned".to_string()))
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn metadata(&self, file_name: &str) -> Result<Option<Metadata>> {
        check_file_name(file_name)?;
        Ok(self.read()?.get(file_name).map(|f| f.metadata.clone()))
    }

    async fn upload_file(
        &self,
        source: &Path,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Metadata> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let modified: DateTime<Utc> = tokio::fs::metadata(source).await?.modified()?.into();
        let data = tokio::fs::read(source).await?;
        let metadata = Metadata {
            modified,
            ..self.insert(file_name, data)?
        };
        self.set_modified(file_name, modified)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(metadata)
    }

    async fn download(&self, file_name: &str) -> Result<Vec<u8>> {
        self.read()?
            .get(file_name)
            .map(|f| f.data.clone())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file_name)))
    }

    async fn delete(&self, file_name: &str) -> Result<()> {
        self.write()?
            .remove(file_name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_upload_and_download() {
        let temp = tempfile::TempDir::new().unwrap();
        let source = temp.path().join("vault.pvlt");
        std::fs::write(&source, b"Hello, World!").unwrap();

        let provider = MemoryProvider::new();
        let metadata = provider
            .upload_file(&source, "vault.pvlt", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(metadata.size, 13);
        let written: DateTime<Utc> = std::fs::metadata(&source).unwrap().modified().unwrap().into();
        assert_eq!(metadata.modified, written);
        assert_eq!(provider.metadata("vault.pvlt").await.unwrap(), Some(metadata));

        let downloaded = provider.download("vault.pvlt").await.unwrap();
        assert_eq!(downloaded, b"Hello, World!");
    }

    #[tokio::test]
    async fn test_set_modified() {
        let provider = MemoryProvider::new();
        provider.insert("vault.pvlt", vec![1, 2, 3]).unwrap();

        let later = Utc::now() + Duration::minutes(5);
        provider.set_modified("vault.pvlt", later).unwrap();

        let metadata = provider.metadata("vault.pvlt").await.unwrap().unwrap();
        assert_eq!(metadata.modified, later);
        assert!(provider.set_modified("missing.pvlt", later).is_err());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let provider = MemoryProvider::new();
        let clone = provider.clone();
        provider.insert("vault.pvlt", vec![9]).unwrap();
        assert!(clone.exists("vault.pvlt").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = MemoryProvider::new();
        provider.insert("vault.pvlt", vec![1]).unwrap();

        provider.delete("vault.pvlt").await.unwrap();
        assert!(!provider.exists("vault.pvlt").await.unwrap());
        assert!(matches!(
            provider.delete("vault.pvlt").await,
            Err(Error::NotFound(_))
        ));
    }
}
