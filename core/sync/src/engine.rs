//! Replication engine that copies the open vault file to its mirror.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use passvault_common::{Error, Result};
use passvault_storage::{ProviderRegistry, StorageProvider};
use passvault_vault::{ReplicationSettings, SessionEvent, VaultDocument, VaultSession};

use crate::conflict::detect_conflict;
use crate::scheduler::SyncSchedule;
use crate::state::{ReplicationState, ReplicationStatus};

/// Why a sync was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncTrigger {
    /// Requested by the user.
    Manual,
    /// Follows a vault save.
    Save,
    /// Requested by an external scheduler.
    Scheduled,
    /// The user chose to overwrite a conflicting mirror.
    ConflictResolution,
}

/// Outcome reported to the caller of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub is_success: bool,
    /// The mirror was newer and was left untouched.
    pub had_conflict: bool,
    pub error_message: Option<String>,
}

impl SyncResult {
    pub fn success() -> Self {
        Self {
            is_success: true,
            had_conflict: false,
            error_message: None,
        }
    }

    /// A sync that stopped to protect a newer mirror copy.
    pub fn conflict() -> Self {
        Self {
            is_success: true,
            had_conflict: true,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            had_conflict: false,
            error_message: Some(message.into()),
        }
    }
}

/// The vault a sync replicates.
#[async_trait]
pub trait SyncSource: Send + Sync {
    async fn is_unlocked(&self) -> bool;
    async fn current_file_path(&self) -> Option<PathBuf>;
    /// Persist pending changes; returns whether anything was written.
    async fn save(&self, cancel: &CancellationToken) -> Result<bool>;
}

#[async_trait]
impl<D: VaultDocument + 'static> SyncSource for Mutex<VaultSession<D>> {
    async fn is_unlocked(&self) -> bool {
        self.lock().await.is_unlocked()
    }

    async fn current_file_path(&self) -> Option<PathBuf> {
        self.lock().await.current_file_path().map(Path::to_path_buf)
    }

    async fn save(&self, cancel: &CancellationToken) -> Result<bool> {
        self.lock().await.save(cancel).await
    }
}

enum Outcome {
    Synced,
    Conflict(String),
}

struct Inner {
    state: ReplicationState,
    provider: Option<Arc<dyn StorageProvider>>,
}

/// Replication state machine.
///
/// Status fields sit behind one lock so UI reads never see a torn state;
/// a separate gate makes sync runs mutually exclusive.
pub struct ReplicationEngine {
    inner: RwLock<Inner>,
    gate: Mutex<()>,
}

impl ReplicationEngine {
    /// Create an unconfigured engine.
    pub fn new(schedule: SyncSchedule, sync_on_save: bool) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: ReplicationState {
                    schedule,
                    sync_on_save,
                    ..ReplicationState::default()
                },
                provider: None,
            }),
            gate: Mutex::new(()),
        }
    }

    /// Create an engine with the schedule and triggers from settings.
    pub fn from_settings(settings: &ReplicationSettings) -> Self {
        Self::new(
            SyncSchedule::from_minutes(settings.interval_minutes),
            settings.sync_on_save,
        )
    }

    /// Attach a provider; the engine becomes `Ready`.
    pub async fn configure(&self, provider: Arc<dyn StorageProvider>, account: Option<String>) {
        let mut inner = self.inner.write().await;
        inner.state.mark_configured(provider.name(), account);
        info!(provider = %provider.name(), "Replication configured");
        inner.provider = Some(provider);
    }

    /// Resolve the provider named in `settings` and attach it.
    ///
    /// Returns `false` when no provider is configured.
    ///
    /// # Errors
    /// - `InvalidInput` if a provider is named but no mirror root is set
    /// - registry errors resolving the provider
    pub async fn configure_from_settings(
        &self,
        settings: &ReplicationSettings,
        registry: &ProviderRegistry,
    ) -> Result<bool> {
        let Some(name) = settings.provider.as_deref() else {
            return Ok(false);
        };
        let root = settings.mirror_root.as_ref().ok_or_else(|| {
            Error::InvalidInput(format!("Provider '{}' needs a mirror root", name))
        })?;

        let provider = registry.resolve(name, json!({ "root": root.to_string_lossy() }))?;
        self.configure(provider, settings.account.clone()).await;
        Ok(true)
    }

    /// Detach the provider; syncs fail until `configure` is called again.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.write().await;
        inner.state.mark_disconnected();
        inner.provider = None;
        info!("Replication disconnected");
    }

    pub async fn set_schedule(&self, schedule: SyncSchedule) {
        let mut inner = self.inner.write().await;
        inner.state.schedule = schedule;
        inner.state.reschedule(Utc::now());
    }

    pub async fn set_sync_on_save(&self, enabled: bool) {
        self.inner.write().await.state.sync_on_save = enabled;
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> ReplicationState {
        self.inner.read().await.state.clone()
    }

    /// Snapshot without waiting; `None` while a writer holds the lock.
    pub fn try_state(&self) -> Option<ReplicationState> {
        self.inner.try_read().ok().map(|inner| inner.state.clone())
    }

    /// Whether a scheduled sync is due at `now`.
    pub async fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.inner.read().await.state.is_due(now)
    }

    /// Run a `Scheduled` sync if one is due.
    pub async fn sync_if_due(
        &self,
        source: &dyn SyncSource,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncResult>> {
        if !self.is_due(Utc::now()).await {
            return Ok(None);
        }
        self.trigger_sync(source, SyncTrigger::Scheduled, cancel)
            .await
            .map(Some)
    }

    /// Replicate the source's vault file to the mirror.
    ///
    /// Failures are reported in the returned [`SyncResult`]. When there is
    /// no provider, the vault is locked or its file is missing, the state is
    /// left alone. Concurrent calls run one at a time.
    ///
    /// Unless `trigger` is `ConflictResolution`, pending changes are saved
    /// first and a mirror copy newer than the source (beyond the grace
    /// window) is left untouched; the result then reports success with a
    /// conflict and the state becomes `SyncFailed`.
    ///
    /// # Errors
    /// - `Cancelled` if `cancel` fires; the previous status is restored
    pub async fn trigger_sync(
        &self,
        source: &dyn SyncSource,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> Result<SyncResult> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let provider = {
            let inner = self.inner.read().await;
            match &inner.provider {
                Some(provider) if inner.state.is_configured() => provider.clone(),
                _ => return Ok(SyncResult::failure("Replication is not configured.")),
            }
        };

        if !source.is_unlocked().await {
            return Ok(SyncResult::failure("Vault is locked."));
        }
        let Some(path) = source.current_file_path().await else {
            return Ok(SyncResult::failure("No vault file is open."));
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(SyncResult::failure(format!(
                "Vault file does not exist: {}",
                path.display()
            )));
        }

        let _gate = self.gate.lock().await;

        let previous = {
            let mut inner = self.inner.write().await;
            let previous = inner.state.status;
            inner.state.mark_syncing();
            previous
        };
        debug!(?trigger, provider = %provider.name(), path = %path.display(), "Sync started");

        let outcome = self.run(source, provider.as_ref(), &path, trigger, cancel).await;

        let mut inner = self.inner.write().await;
        match outcome {
            Ok(Outcome::Synced) => {
                inner.state.mark_synced(Utc::now());
                info!(?trigger, provider = %provider.name(), "Sync completed");
                Ok(SyncResult::success())
            }
            Ok(Outcome::Conflict(message)) => {
                warn!(?trigger, %message, "Sync stopped by conflict");
                inner.state.mark_failed(message);
                Ok(SyncResult::conflict())
            }
            Err(Error::Cancelled) => {
                inner.state.status = previous;
                info!(?trigger, "Sync cancelled");
                Err(Error::Cancelled)
            }
            Err(e) => {
                error!(?trigger, error = %e, "Sync failed");
                let message = e.to_string();
                inner.state.mark_failed(message.clone());
                Ok(SyncResult::failure(message))
            }
        }
    }

    async fn run(
        &self,
        source: &dyn SyncSource,
        provider: &dyn StorageProvider,
        path: &Path,
        trigger: SyncTrigger,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("Invalid vault path: {}", path.display())))?;

        if trigger != SyncTrigger::ConflictResolution {
            source.save(cancel).await?;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Some(conflict) = detect_conflict(provider, path, file_name).await? {
                return Ok(Outcome::Conflict(conflict.message()));
            }
        }

        provider.upload_file(path, file_name, cancel).await?;
        Ok(Outcome::Synced)
    }

    /// React to a session event.
    ///
    /// `Saved` starts a sync when sync-on-save is enabled, `Loaded`
    /// recomputes the next scheduled sync and `Unloaded` clears it.
    pub async fn handle_event(
        &self,
        source: &dyn SyncSource,
        event: &SessionEvent,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncResult>> {
        match event {
            SessionEvent::Saved { .. } => {
                let wanted = {
                    let inner = self.inner.read().await;
                    inner.state.sync_on_save && inner.state.is_configured()
                };
                if !wanted {
                    return Ok(None);
                }
                self.trigger_sync(source, SyncTrigger::Save, cancel)
                    .await
                    .map(Some)
            }
            SessionEvent::Loaded { .. } => {
                self.inner.write().await.state.reschedule(Utc::now());
                Ok(None)
            }
            SessionEvent::Unloaded => {
                self.inner.write().await.state.next_scheduled = None;
                Ok(None)
            }
        }
    }

    /// Follow a session's events until `cancel` fires or the session is dropped.
    pub async fn watch(
        &self,
        source: &dyn SyncSource,
        mut events: broadcast::Receiver<SessionEvent>,
        cancel: &CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => match self.handle_event(source, &event, cancel).await {
                    Ok(Some(result)) if !result.is_success => {
                        warn!(error = ?result.error_message, "Sync after session event failed");
                    }
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() => return,
                    Err(e) => warn!(error = %e, "Could not handle session event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed session events");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
