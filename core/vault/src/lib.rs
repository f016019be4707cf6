//! Vault engine for passvault.
//!
//! This module provides:
//! - The encrypted document container
//! - Entry CRUD with password policy enforcement
//! - Group hierarchy operations over dotted group paths
//! - Backup rotation on every save
//! - Settings and the session that ties them together
//!
//! # Architecture
//! The session is the only mutator of an open document. Replication sits
//! on top of it in the sync crate and observes it through session events.

pub mod backup;
pub mod config;
pub mod document;
pub mod entry;
pub mod groups;
pub mod session;

pub use backup::{backup_path, list_backups, rotate, BackupFile, BACKUP_EXTENSION};
pub use config::{
    JsonSettingsStore, ReplicationSettings, Settings, SettingsStore, StaticSettings,
    DEFAULT_MAX_BACKUP_COUNT,
};
pub use document::{EncryptedDocument, VaultDocument};
pub use entry::{Entry, EntryRequest, HeaderKind, HeaderRecord};
pub use session::{SessionEvent, VaultSession};
