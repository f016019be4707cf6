//! Vault session management.
//!
//! A session owns at most one open document. All entry, group and policy
//! mutations go through it synchronously; file I/O (create, load, save,
//! passphrase change) is async and honours a cancellation token. The
//! session is single-writer: callers that share it wrap it in a
//! `tokio::sync::Mutex`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backup;
use crate::config::{SettingsStore, DEFAULT_MAX_BACKUP_COUNT};
use crate::document::{EncryptedDocument, VaultDocument};
use crate::entry::{Entry, EntryRequest, HeaderKind, HeaderRecord};
use crate::groups;
use passvault_common::{Error, GroupPath, Result};
use passvault_crypto::KdfParams;
use passvault_policy::{generate, validate, PasswordPolicy, PolicyStyle};

/// Length of passwords generated when no policy applies.
pub const FALLBACK_PASSWORD_LENGTH: usize = 20;

const EVENT_CAPACITY: usize = 16;

/// Lifecycle notifications published by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A vault was opened or created.
    Loaded { path: PathBuf },
    /// The vault was written to disk.
    Saved { path: PathBuf },
    /// The vault was closed.
    Unloaded,
}

/// An open (or closed) vault.
pub struct VaultSession<D: VaultDocument = EncryptedDocument> {
    document: Option<D>,
    path: Option<PathBuf>,
    read_only: bool,
    settings: Arc<dyn SettingsStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl<D: VaultDocument> VaultSession<D> {
    /// Create a closed session.
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            document: None,
            path: None,
            read_only: false,
            settings,
            events,
        }
    }

    /// Receive lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn is_unlocked(&self) -> bool {
        self.document.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn current_file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether there are unsaved changes.
    pub fn has_changed(&self) -> bool {
        self.document.as_ref().map_or(false, |d| d.has_changed())
    }

    fn document(&self) -> Result<&D> {
        self.document
            .as_ref()
            .ok_or_else(|| Error::NotPermitted("Vault is locked.".to_string()))
    }

    fn writable(&mut self) -> Result<&mut D> {
        if self.read_only && self.document.is_some() {
            return Err(Error::NotPermitted("Vault is read-only.".to_string()));
        }
        self.document
            .as_mut()
            .ok_or_else(|| Error::NotPermitted("Vault is locked.".to_string()))
    }

    fn open_path(&self) -> Result<PathBuf> {
        self.path
            .clone()
            .ok_or_else(|| Error::NotPermitted("Vault is locked.".to_string()))
    }

    pub fn entries(&self) -> Result<&[Entry]> {
        Ok(self.document()?.entries())
    }

    pub fn entry(&self, index: usize) -> Result<&Entry> {
        self.document()?
            .entries()
            .get(index)
            .ok_or_else(|| groups::out_of_range(index))
    }

    /// Add an entry and return its index.
    ///
    /// The effective policy is the request's policy if it names an
    /// existing one, otherwise the vault default, otherwise none. When a
    /// policy applies the password must satisfy it, and the policy's
    /// parameters are copied onto the entry.
    ///
    /// # Errors
    /// - `NotPermitted` if locked or read-only
    /// - `InvalidInput` for a missing title or password, or a policy violation
    pub fn create_entry(&mut self, request: EntryRequest) -> Result<usize> {
        let document = self.writable()?;
        request.check()?;

        let policy = effective_policy(document, request.policy_name.as_deref());
        if let Some(policy) = &policy {
            validate(&request.password, policy)?;
        }

        let entry = Entry::new(request, policy.as_ref());
        debug!(group = %entry.group, policy = ?entry.policy_name, "Created entry");

        document.entries_mut().push(entry);
        let index = document.entries().len() - 1;
        let (entries, headers) = document.groups_mut();
        groups::prune_markers(entries, headers);
        document.mark_changed();
        Ok(index)
    }

    /// Replace the fields of entry `index`, keeping its id and creation time.
    ///
    /// Same rules as [`create_entry`](Self::create_entry). On error the
    /// entry is unchanged.
    pub fn update_entry(&mut self, index: usize, request: EntryRequest) -> Result<()> {
        let document = self.writable()?;
        if index >= document.entries().len() {
            return Err(groups::out_of_range(index));
        }
        request.check()?;

        let policy = effective_policy(document, request.policy_name.as_deref());
        if let Some(policy) = &policy {
            validate(&request.password, policy)?;
        }

        document.entries_mut()[index].apply(request, policy.as_ref());
        let (entries, headers) = document.groups_mut();
        groups::prune_markers(entries, headers);
        document.mark_changed();
        Ok(())
    }

    /// Remove entry `index` and return it.
    pub fn delete_entry(&mut self, index: usize) -> Result<Entry> {
        let document = self.writable()?;
        if index >= document.entries().len() {
            return Err(groups::out_of_range(index));
        }
        let entry = document.entries_mut().remove(index);
        document.mark_changed();
        Ok(entry)
    }

    pub fn create_group(&mut self, path: &str) -> Result<GroupPath> {
        let document = self.writable()?;
        let (entries, headers) = document.groups_mut();
        let group = groups::create_group(entries, headers, path)?;
        document.mark_changed();
        Ok(group)
    }

    /// Rename a group and everything below it. Returns the number of entries moved.
    pub fn rename_group(&mut self, old: &str, new: &str) -> Result<usize> {
        let document = self.writable()?;
        let (entries, headers) = document.groups_mut();
        let moved = groups::rename_group(entries, headers, old, new)?;
        if GroupPath::normalize(old) != GroupPath::normalize(new) {
            document.mark_changed();
        }
        Ok(moved)
    }

    pub fn delete_empty_group(&mut self, path: &str) -> Result<()> {
        let document = self.writable()?;
        let (entries, headers) = document.groups_mut();
        groups::delete_empty_group(entries, headers, path)?;
        document.mark_changed();
        Ok(())
    }

    pub fn move_entry(&mut self, index: usize, group: &str) -> Result<()> {
        let document = self.writable()?;
        let (entries, headers) = document.groups_mut();
        groups::move_entry(entries, headers, index, group)?;
        document.mark_changed();
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<GroupPath>> {
        let document = self.document()?;
        Ok(groups::list_groups(document.entries(), document.headers()))
    }

    pub fn password_policies(&self) -> Result<&[PasswordPolicy]> {
        Ok(self.document()?.policies())
    }

    pub fn find_policy(&self, name: &str) -> Result<Option<&PasswordPolicy>> {
        Ok(self.document()?.policies().iter().find(|p| p.is_named(name)))
    }

    /// Insert or overwrite a named policy.
    ///
    /// With `original_name` the policy stored under that name is replaced
    /// (a rename when the names differ). Without it, the policy is matched
    /// by its own name. A replaced policy keeps its id. Renaming the
    /// default policy keeps it the default, and entries referring to the
    /// old name follow the rename.
    ///
    /// # Errors
    /// - `InvalidInput` if the policy is inconsistent
    /// - `NotFound` if `original_name` names no policy
    /// - `AlreadyExists` if the new name belongs to another policy
    pub fn save_password_policy(
        &mut self,
        mut policy: PasswordPolicy,
        original_name: Option<&str>,
    ) -> Result<()> {
        let document = self.writable()?;
        policy.name = policy.name.trim().to_string();
        policy.check()?;

        let target = original_name.unwrap_or(&policy.name).to_string();
        let existing = document.policies().iter().position(|p| p.is_named(&target));

        if original_name.is_some() && existing.is_none() {
            return Err(Error::NotFound(format!("Policy '{}' not found.", target)));
        }

        let collision = document
            .policies()
            .iter()
            .enumerate()
            .any(|(i, p)| Some(i) != existing && p.is_named(&policy.name));
        if collision {
            return Err(Error::AlreadyExists(format!(
                "A policy named '{}' already exists.",
                policy.name
            )));
        }

        match existing {
            Some(index) => {
                let old = document.policies()[index].clone();
                policy.id = old.id;

                if old.name != policy.name {
                    for header in document.headers_mut().iter_mut() {
                        if header.kind == HeaderKind::DefaultPolicy && refers_to(header, &old) {
                            header.text = Some(policy.name.clone());
                        }
                    }
                    for entry in document.entries_mut().iter_mut() {
                        if entry.policy_name.as_deref().map_or(false, |n| old.is_named(n)) {
                            entry.policy_name = Some(policy.name.clone());
                        }
                    }
                }

                debug!(from = %old.name, to = %policy.name, "Updated policy");
                document.policies_mut()[index] = policy;
            }
            None => {
                debug!(name = %policy.name, "Added policy");
                document.policies_mut().push(policy);
            }
        }

        document.mark_changed();
        Ok(())
    }

    /// Remove a named policy. If it was the default, the vault has no default afterwards.
    pub fn delete_password_policy(&mut self, name: &str) -> Result<()> {
        let document = self.writable()?;
        let index = document
            .policies()
            .iter()
            .position(|p| p.is_named(name))
            .ok_or_else(|| Error::NotFound(format!("Policy '{}' not found.", name.trim())))?;

        let removed = document.policies_mut().remove(index);
        document.headers_mut().retain(|h| {
            h.kind != HeaderKind::DefaultPolicy || !refers_to(h, &removed)
        });
        document.mark_changed();
        Ok(())
    }

    /// Set or clear the vault-wide default policy.
    ///
    /// # Errors
    /// - `NotFound` if `name` names no policy
    pub fn set_default_password_policy(&mut self, name: Option<&str>) -> Result<()> {
        let document = self.writable()?;

        let record = match name {
            Some(name) => {
                let policy = document
                    .policies()
                    .iter()
                    .find(|p| p.is_named(name))
                    .ok_or_else(|| Error::NotFound(format!("Policy '{}' not found.", name.trim())))?;
                Some(HeaderRecord::default_policy(policy.name.clone()))
            }
            None => None,
        };

        let headers = document.headers_mut();
        headers.retain(|h| h.kind != HeaderKind::DefaultPolicy);
        headers.extend(record);
        document.mark_changed();
        Ok(())
    }

    /// Name of the default policy.
    ///
    /// Reads the record's text; older vaults only carry the policy id,
    /// which is resolved against the stored policies.
    pub fn default_password_policy_name(&self) -> Result<Option<String>> {
        Ok(default_policy_name(self.document()?))
    }

    /// Generate a password for a named policy, or the default policy when
    /// `policy_name` is `None`. Without any policy a built-in one is used.
    ///
    /// # Errors
    /// - `NotFound` if `policy_name` names no policy
    /// - errors from the generator
    pub fn generate_password(&self, policy_name: Option<&str>) -> Result<String> {
        let document = self.document()?;

        let policy = match policy_name {
            Some(name) => document
                .policies()
                .iter()
                .find(|p| p.is_named(name))
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Policy '{}' not found.", name.trim())))?,
            None => effective_policy(document, None).unwrap_or_else(|| {
                PasswordPolicy::new("Built-in", FALLBACK_PASSWORD_LENGTH, PolicyStyle::default())
            }),
        };

        generate(&policy)
    }

    /// Create a new vault file at `path` and open it.
    ///
    /// # Errors
    /// - `AlreadyExists` if `path` exists
    /// - `Cancelled` if `cancel` fires first
    pub async fn create(
        &mut self,
        path: &Path,
        passphrase: &[u8],
        kdf: &KdfParams,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if tokio::fs::try_exists(path).await? {
            return Err(Error::AlreadyExists(format!(
                "Vault file already exists: {}",
                path.display()
            )));
        }

        let mut document = D::create(passphrase, kdf)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        document.save(path).await?;

        self.open(document, path, false);
        info!(path = %path.display(), "Created vault");
        Ok(())
    }

    /// Open the vault at `path`.
    ///
    /// On failure the session keeps whatever it had open before. Use
    /// [`Error::load_failure`] to tell a missing file from a wrong
    /// passphrase.
    pub async fn load(
        &mut self,
        path: &Path,
        passphrase: &[u8],
        read_only: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let document = D::load(path, passphrase).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.open(document, path, read_only);
        info!(path = %path.display(), read_only, "Opened vault");
        Ok(())
    }

    fn open(&mut self, document: D, path: &Path, read_only: bool) {
        self.document = Some(document);
        self.path = Some(path.to_path_buf());
        self.read_only = read_only;
        self.publish(SessionEvent::Loaded {
            path: path.to_path_buf(),
        });
    }

    /// Write pending changes, rotating a backup first.
    ///
    /// Returns `false` without touching disk when nothing changed or the
    /// session is read-only.
    ///
    /// # Errors
    /// - `NotPermitted` if no vault is open
    /// - `Cancelled` if `cancel` fires before or between the copy steps
    /// - I/O errors from the backup or the write
    pub async fn save(&mut self, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let path = self.open_path()?;
        if self.read_only || !self.has_changed() {
            return Ok(false);
        }

        backup::rotate(&path, self.max_backup_count(), cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.writable()?.save(&path).await?;

        info!(path = %path.display(), "Saved vault");
        self.publish(SessionEvent::Saved { path });
        Ok(true)
    }

    /// Close the vault, dropping the decrypted document.
    pub fn unload(&mut self) {
        let was_open = self.document.take().is_some();
        self.path = None;
        self.read_only = false;
        if was_open {
            info!("Closed vault");
            self.publish(SessionEvent::Unloaded);
        }
    }

    /// Re-key the vault file under `new`.
    ///
    /// The file on disk is re-opened with `current` first, so a stale or
    /// tampered in-memory document cannot bypass the check. A backup is
    /// taken before the rewrite. If the rewrite fails the session keeps
    /// the current passphrase.
    ///
    /// # Errors
    /// - `NotPermitted` if locked or read-only
    /// - `InvalidPasswordOrFormat` if `current` does not open the file
    /// - `InvalidInput` if `new` is empty
    pub async fn change_passphrase(
        &mut self,
        current: &[u8],
        new: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.writable()?;
        if new.is_empty() {
            return Err(Error::InvalidInput("Passphrase cannot be empty".to_string()));
        }
        let path = self.open_path()?;

        D::load(&path, current).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        backup::rotate(&path, self.max_backup_count(), cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.writable()?.change_passphrase(&path, new).await?;

        info!(path = %path.display(), "Changed passphrase");
        self.publish(SessionEvent::Saved { path });
        Ok(())
    }

    fn max_backup_count(&self) -> usize {
        match self.settings.load() {
            Ok(settings) => settings.max_backup_count,
            Err(e) => {
                warn!(error = %e, fallback = DEFAULT_MAX_BACKUP_COUNT, "Could not read settings");
                DEFAULT_MAX_BACKUP_COUNT
            }
        }
    }
}

/// The request's policy if it names one, otherwise the default if it resolves.
fn effective_policy<D: VaultDocument>(document: &D, requested: Option<&str>) -> Option<PasswordPolicy> {
    let find = |name: &str| document.policies().iter().find(|p| p.is_named(name)).cloned();
    requested
        .filter(|name| !name.trim().is_empty())
        .and_then(find)
        .or_else(|| default_policy_name(document).and_then(|name| find(&name)))
}

fn default_policy_name<D: VaultDocument>(document: &D) -> Option<String> {
    let record = document
        .headers()
        .iter()
        .find(|h| h.kind == HeaderKind::DefaultPolicy)?;

    if let Some(text) = record.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Some(text.to_string());
    }

    // Legacy records carry only the policy id
    let id = record.uuid?;
    document
        .policies()
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.clone())
}

fn refers_to(record: &HeaderRecord, policy: &PasswordPolicy) -> bool {
    match record.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => policy.is_named(text),
        None => record.uuid == Some(policy.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::list_backups;
    use crate::config::{Settings, StaticSettings};
    use crate::document::tests::test_kdf;
    use passvault_common::LoadFailure;
    use passvault_policy::CharacterClasses;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct BrokenSettings;

    impl SettingsStore for BrokenSettings {
        fn load(&self) -> Result<Settings> {
            Err(Error::Serialization("corrupt settings".to_string()))
        }

        fn save(&self, _settings: &Settings) -> Result<()> {
            Err(Error::Storage("read-only settings".to_string()))
        }
    }

    fn settings(max_backup_count: usize) -> Arc<dyn SettingsStore> {
        Arc::new(StaticSettings::new(Settings {
            max_backup_count,
            ..Settings::default()
        }))
    }

    async fn open_session(temp: &TempDir, max_backup_count: usize) -> (VaultSession, PathBuf) {
        let path = temp.path().join("vault.pvlt");
        let mut session = VaultSession::new(settings(max_backup_count));
        session
            .create(&path, b"passphrase", &test_kdf(), &CancellationToken::new())
            .await
            .unwrap();
        (session, path)
    }

    fn pin_policy() -> PasswordPolicy {
        PasswordPolicy::new("Pin", 10, PolicyStyle::Standard(CharacterClasses::digits_only()))
            .with_min_digits(10)
    }

    #[test]
    fn test_locked_session_rejects_mutation() {
        let mut session: VaultSession = VaultSession::new(settings(10));
        assert!(!session.is_unlocked());

        let err = session.create_entry(EntryRequest::new("Bank", "pw")).unwrap_err();
        assert_eq!(err.message(), "Vault is locked.");
        assert!(session.create_group("Work").is_err());
        assert!(session.list_groups().is_err());
    }

    #[tokio::test]
    async fn test_create_save_load() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 10).await;
        let cancel = CancellationToken::new();

        assert!(session.is_unlocked());
        assert_eq!(session.current_file_path(), Some(path.as_path()));

        session
            .create_entry(
                EntryRequest::new("Mail", "hunter2")
                    .with_username("me")
                    .with_group(" Work . Mail "),
            )
            .unwrap();
        assert!(session.save(&cancel).await.unwrap());
        assert!(!session.save(&cancel).await.unwrap());

        session.unload();
        assert!(!session.is_unlocked());
        assert!(session.current_file_path().is_none());

        session.load(&path, b"passphrase", false, &cancel).await.unwrap();
        let entry = session.entry(0).unwrap();
        assert_eq!(entry.title, "Mail");
        assert_eq!(entry.group, "Work.Mail");
    }

    #[tokio::test]
    async fn test_load_failures() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 10).await;
        session.unload();
        let cancel = CancellationToken::new();

        let err = session.load(&path, b"wrong", false, &cancel).await.unwrap_err();
        assert_eq!(err.load_failure(), LoadFailure::InvalidPasswordOrFormat);

        let err = session
            .load(&temp.path().join("missing.pvlt"), b"passphrase", false, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.load_failure(), LoadFailure::FileNotFound);
        assert!(!session.is_unlocked());
    }

    #[tokio::test]
    async fn test_create_refuses_existing_file() {
        let temp = TempDir::new().unwrap();
        let (_session, path) = open_session(&temp, 10).await;

        let mut other: VaultSession = VaultSession::new(settings(10));
        let err = other
            .create(&path, b"x", &test_kdf(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_read_only_session() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 10).await;
        session.unload();
        let cancel = CancellationToken::new();

        session.load(&path, b"passphrase", true, &cancel).await.unwrap();
        assert!(session.is_read_only());

        let err = session.create_entry(EntryRequest::new("Bank", "pw")).unwrap_err();
        assert_eq!(err.message(), "Vault is read-only.");
        assert!(!session.save(&cancel).await.unwrap());
        assert!(session.generate_password(None).is_ok());
    }

    #[tokio::test]
    async fn test_entry_validation() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;

        assert_eq!(
            session.create_entry(EntryRequest::new("", "pw")).unwrap_err().message(),
            "Title is required."
        );
        assert_eq!(
            session.create_entry(EntryRequest::new("Bank", "")).unwrap_err().message(),
            "Password is required."
        );
        assert!(session.entries().unwrap().is_empty());
        assert!(matches!(session.delete_entry(0), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_policy_violation_is_atomic() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;
        session.save_password_policy(pin_policy(), None).unwrap();

        let err = session
            .create_entry(EntryRequest::new("Door", "abcdefghij").with_policy("pin"))
            .unwrap_err();
        assert_eq!(err.message(), "Password must include at least 10 digits.");
        assert!(session.entries().unwrap().is_empty());

        let index = session
            .create_entry(EntryRequest::new("Door", "0123456789").with_policy("PIN"))
            .unwrap();
        let entry = session.entry(index).unwrap();
        assert_eq!(entry.policy_name.as_deref(), Some("Pin"));
        assert_eq!(entry.policy.as_ref().map(|p| p.min_digits), Some(10));

        let err = session
            .update_entry(index, EntryRequest::new("Door", "short").with_policy("Pin"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(session.entry(index).unwrap().password, "0123456789");
    }

    #[tokio::test]
    async fn test_default_policy_applies_and_unknown_names_fall_back() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;
        session.save_password_policy(pin_policy(), None).unwrap();
        session.set_default_password_policy(Some("pin")).unwrap();
        assert_eq!(session.default_password_policy_name().unwrap().as_deref(), Some("Pin"));

        assert!(session.create_entry(EntryRequest::new("A", "letters")).is_err());
        assert!(session
            .create_entry(EntryRequest::new("A", "letters").with_policy("Nope"))
            .is_err());
        assert!(session.create_entry(EntryRequest::new("A", "9876543210")).is_ok());

        session.set_default_password_policy(None).unwrap();
        assert!(session.default_password_policy_name().unwrap().is_none());
        let index = session.create_entry(EntryRequest::new("B", "letters")).unwrap();
        assert!(session.entry(index).unwrap().policy.is_none());

        assert!(matches!(
            session.set_default_password_policy(Some("Nope")),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_default_policy_uuid() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;
        let policy = pin_policy();
        let id = policy.id;
        session.save_password_policy(policy, None).unwrap();

        session.writable().unwrap().headers_mut().push(HeaderRecord {
            kind: HeaderKind::DefaultPolicy,
            text: None,
            uuid: Some(id),
        });
        assert_eq!(session.default_password_policy_name().unwrap().as_deref(), Some("Pin"));

        session.writable().unwrap().headers_mut()[0].uuid = Some(Uuid::new_v4());
        assert!(session.default_password_policy_name().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_policy_rename() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;
        let web = PasswordPolicy::new("Web", 16, PolicyStyle::default());
        let web_id = web.id;
        session.save_password_policy(web, None).unwrap();
        session.save_password_policy(pin_policy(), None).unwrap();
        session.set_default_password_policy(Some("Web")).unwrap();

        let clash = PasswordPolicy::new("pin", 12, PolicyStyle::default());
        assert!(matches!(
            session.save_password_policy(clash, Some("Web")),
            Err(Error::AlreadyExists(_))
        ));

        let renamed = PasswordPolicy::new("Websites", 24, PolicyStyle::default()).with_symbols("!#");
        session.save_password_policy(renamed, Some("web")).unwrap();

        let stored = session.find_policy("websites").unwrap().unwrap();
        assert_eq!(stored.id, web_id);
        assert_eq!(stored.length, 24);
        assert_eq!(stored.symbols.as_deref(), Some("!#"));
        assert!(session.find_policy("Web").unwrap().is_none());
        assert_eq!(
            session.default_password_policy_name().unwrap().as_deref(),
            Some("Websites")
        );
        assert_eq!(session.password_policies().unwrap().len(), 2);

        assert!(matches!(
            session.save_password_policy(pin_policy(), Some("Ghost")),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_default_policy_clears_default() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;
        session.save_password_policy(pin_policy(), None).unwrap();
        session.set_default_password_policy(Some("Pin")).unwrap();

        session.delete_password_policy("pin").unwrap();
        assert!(session.default_password_policy_name().unwrap().is_none());
        assert!(session.delete_password_policy("pin").is_err());
    }

    #[tokio::test]
    async fn test_generate_password() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;

        assert_eq!(
            session.generate_password(None).unwrap().len(),
            FALLBACK_PASSWORD_LENGTH
        );

        session.save_password_policy(pin_policy(), None).unwrap();
        let pin = session.generate_password(Some("Pin")).unwrap();
        assert_eq!(pin.len(), 10);
        assert!(pin.chars().all(|c| c.is_ascii_digit()));
        assert!(session.generate_password(Some("Other")).is_err());
    }

    #[tokio::test]
    async fn test_group_scenario() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;

        session
            .create_entry(EntryRequest::new("Chat", "pw").with_group("Work.Personal"))
            .unwrap();
        session.create_group("Work.Archive").unwrap();
        assert!(session.create_group("work.archive").is_err());

        session.rename_group("Work", "Office").unwrap();
        assert_eq!(session.entry(0).unwrap().group, "Office.Personal");
        let groups: Vec<String> = session
            .list_groups()
            .unwrap()
            .iter()
            .map(|g| g.as_string())
            .collect();
        assert_eq!(groups, vec!["Office", "Office.Archive", "Office.Personal"]);

        session.move_entry(0, "Office.Archive").unwrap();
        session.delete_empty_group("Office.Archive").unwrap_err();
        session.move_entry(0, "").unwrap();
        assert!(session.list_groups().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entry_clears_destination_marker() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = open_session(&temp, 10).await;

        session.create_group("Travel").unwrap();
        session
            .create_entry(EntryRequest::new("Airline", "pw").with_group("travel"))
            .unwrap();
        assert!(session.writable().unwrap().headers().is_empty());
    }

    #[tokio::test]
    async fn test_backups_after_saves() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 3).await;
        let cancel = CancellationToken::new();

        for n in 0..7 {
            session
                .create_entry(EntryRequest::new(format!("Entry {}", n), "pw"))
                .unwrap();
            session.save(&cancel).await.unwrap();
        }

        let versions: Vec<u64> = list_backups(&path)
            .await
            .unwrap()
            .iter()
            .map(|b| b.version)
            .collect();
        assert_eq!(versions, vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn test_unreadable_settings_fall_back_to_default_retention() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault.pvlt");
        let cancel = CancellationToken::new();
        let mut session: VaultSession = VaultSession::new(Arc::new(BrokenSettings));
        session.create(&path, b"pw", &test_kdf(), &cancel).await.unwrap();

        for n in 0..12 {
            session
                .create_entry(EntryRequest::new(format!("Entry {}", n), "pw"))
                .unwrap();
            session.save(&cancel).await.unwrap();
        }

        assert_eq!(list_backups(&path).await.unwrap().len(), DEFAULT_MAX_BACKUP_COUNT);
    }

    #[tokio::test]
    async fn test_save_cancelled() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 3).await;
        session.create_entry(EntryRequest::new("A", "pw")).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(session.save(&cancel).await, Err(Error::Cancelled)));
        assert!(session.has_changed());
        assert!(list_backups(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_passphrase() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 5).await;
        let cancel = CancellationToken::new();

        let err = session
            .change_passphrase(b"not it", b"new pass", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.load_failure(), LoadFailure::InvalidPasswordOrFormat);

        session
            .change_passphrase(b"passphrase", b"new pass", &cancel)
            .await
            .unwrap();
        assert_eq!(list_backups(&path).await.unwrap().len(), 1);

        session.unload();
        assert!(session.load(&path, b"passphrase", false, &cancel).await.is_err());
        session.load(&path, b"new pass", false, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_change_passphrase_is_atomic() {
        let temp = TempDir::new().unwrap();
        let (mut session, path) = open_session(&temp, 0).await;
        let cancel = CancellationToken::new();

        let blocker = path.with_file_name("vault.pvlt.tmp");
        std::fs::create_dir(&blocker).unwrap();
        assert!(session
            .change_passphrase(b"passphrase", b"new pass", &cancel)
            .await
            .is_err());
        std::fs::remove_dir(&blocker).unwrap();

        session.create_entry(EntryRequest::new("Bank", "pw")).unwrap();
        assert!(session.save(&cancel).await.unwrap());

        session.unload();
        assert!(session.load(&path, b"new pass", false, &cancel).await.is_err());
        session.load(&path, b"passphrase", false, &cancel).await.unwrap();
        assert_eq!(session.entries().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_events() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vault.pvlt");
        let cancel = CancellationToken::new();
        let mut session: VaultSession = VaultSession::new(settings(2));
        let mut events = session.subscribe();

        session.create(&path, b"pw", &test_kdf(), &cancel).await.unwrap();
        session.create_entry(EntryRequest::new("A", "pw")).unwrap();
        session.save(&cancel).await.unwrap();
        session.unload();

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Loaded { path: path.clone() });
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Saved { path });
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Unloaded);
    }
}
