//! Backup rotation for vault files.
//!
//! Backups sit next to the vault as `{stem}_{n}.ibak`, where `n` grows by
//! one with every rotation. Only the newest `max` copies are kept.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use passvault_common::{Error, Result};

/// Extension of backup files.
pub const BACKUP_EXTENSION: &str = "ibak";

/// A backup file found next to a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub version: u64,
    pub path: PathBuf,
}

fn stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parent_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Path of backup `version` for `source`.
pub fn backup_path(source: &Path, version: u64) -> PathBuf {
    parent_dir(source).join(format!("{}_{}.{}", stem(source), version, BACKUP_EXTENSION))
}

fn parse_version(file_name: &str, prefix: &str) -> Option<u64> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(BACKUP_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Backups of `source`, oldest first.
pub async fn list_backups(source: &Path) -> Result<Vec<BackupFile>> {
    let dir = parent_dir(source);
    let prefix = format!("{}_", stem(source));
    let mut backups = Vec::new();

    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(version) = parse_version(&name.to_string_lossy(), &prefix) else {
            continue;
        };
        backups.push(BackupFile {
            version,
            path: entry.path(),
        });
    }

    backups.sort_by_key(|b| b.version);
    Ok(backups)
}

/// Copy `source` to the next backup version and trim old backups.
///
/// Does nothing when `source` does not exist yet or `max` is zero. After
/// a rotation exactly `min(max, existing + 1)` backups remain, holding the
/// highest versions.
///
/// Returns the path of the new backup, if one was written.
///
/// # Errors
/// - `Cancelled` if `cancel` fires before or after the copy; old backups
///   are still trimmed once the copy exists
/// - I/O errors copying or deleting files
pub async fn rotate(source: &Path, max: usize, cancel: &CancellationToken) -> Result<Option<PathBuf>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    if max == 0 {
        debug!(path = %source.display(), "Backups disabled");
        return Ok(None);
    }

    if !fs::try_exists(source).await? {
        debug!(path = %source.display(), "Nothing to back up yet");
        return Ok(None);
    }

    let mut backups = list_backups(source).await?;
    let version = backups.last().map_or(1, |b| b.version + 1);
    let target = backup_path(source, version);

    fs::copy(source, &target).await?;

    backups.push(BackupFile {
        version,
        path: target.clone(),
    });

    let excess = backups.len().saturating_sub(max);
    for old in backups.drain(..excess) {
        fs::remove_file(&old.path).await?;
        debug!(path = %old.path.display(), "Removed old backup");
    }

    // Retention is enforced even when cancelled after the copy
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    info!(path = %target.display(), version, "Created backup");
    Ok(Some(target))
}
