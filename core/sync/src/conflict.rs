//! Conflict detection.
//!
//! A mirror copy is in conflict when it was written more than
//! [`CONFLICT_GRACE_SECONDS`] after the local vault file. That means the
//! mirror was changed by someone else since our last upload and
//! overwriting it would lose data.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use passvault_common::Result;
use passvault_storage::StorageProvider;

/// Slack allowed between the source and mirror write times.
pub const CONFLICT_GRACE_SECONDS: i64 = 2;

/// Information about a detected conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// Mirror file name.
    pub file_name: String,
    /// Last write of the local vault file.
    pub source_modified: DateTime<Utc>,
    /// Last write of the mirror copy.
    pub mirror_modified: DateTime<Utc>,
    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
}

impl ConflictInfo {
    /// Human-readable summary.
    pub fn message(&self) -> String {
        format!(
            "Mirror copy of {} was modified at {}, after the local vault ({})",
            self.file_name,
            self.mirror_modified.format("%Y-%m-%d %H:%M:%S"),
            self.source_modified.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

/// Whether a mirror written at `mirror_modified` conflicts with a source
/// written at `source_modified`.
pub fn is_conflict(source_modified: DateTime<Utc>, mirror_modified: DateTime<Utc>) -> bool {
    mirror_modified > source_modified + Duration::seconds(CONFLICT_GRACE_SECONDS)
}

/// Compare `source` with its mirror copy.
///
/// Returns `None` when the mirror has no copy yet or the copy is not newer.
///
/// # Errors
/// - I/O errors reading the source metadata
/// - provider errors reading the mirror metadata
pub async fn detect_conflict(
    provider: &dyn StorageProvider,
    source: &Path,
    file_name: &str,
) -> Result<Option<ConflictInfo>> {
    let Some(mirror) = provider.metadata(file_name).await? else {
        return Ok(None);
    };

    let source_modified: DateTime<Utc> = tokio::fs::metadata(source).await?.modified()?.into();

    if !is_conflict(source_modified, mirror.modified) {
        return Ok(None);
    }

    Ok(Some(ConflictInfo {
        file_name: file_name.to_string(),
        source_modified,
        mirror_modified: mirror.modified,
        detected_at: Utc::now(),
    }))
}
