//! Replication state tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scheduler::SyncSchedule;

/// Where the replication state machine is.
///
/// `NotConfigured -> Ready <-> Syncing -> {Ready, SyncFailed}`;
/// `Disconnected` holds until the engine is configured again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReplicationStatus {
    /// No provider has been configured.
    #[default]
    NotConfigured,
    /// Configured and idle.
    Ready,
    /// A sync is running.
    Syncing,
    /// The last sync failed or found a conflict.
    SyncFailed,
    /// The provider was disconnected by the user.
    Disconnected,
}

/// Snapshot of the replication state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplicationState {
    /// Provider name, once configured.
    pub provider: Option<String>,
    /// Account label.
    pub account: Option<String>,
    pub status: ReplicationStatus,
    /// Last successful sync.
    pub last_synced: Option<DateTime<Utc>>,
    /// Next advisory scheduled sync.
    pub next_scheduled: Option<DateTime<Utc>>,
    /// Message of the last failure or conflict.
    pub last_error: Option<String>,
    pub schedule: SyncSchedule,
    /// Replicate after every save.
    pub sync_on_save: bool,
}

impl ReplicationState {
    /// Whether a provider is attached and usable.
    pub fn is_configured(&self) -> bool {
        !matches!(
            self.status,
            ReplicationStatus::NotConfigured | ReplicationStatus::Disconnected
        )
    }

    /// Attach a provider.
    pub fn mark_configured(&mut self, provider: impl Into<String>, account: Option<String>) {
        self.provider = Some(provider.into());
        self.account = account;
        self.status = ReplicationStatus::Ready;
        self.last_error = None;
        self.reschedule(Utc::now());
    }

    /// Detach the provider.
    pub fn mark_disconnected(&mut self) {
        self.status = ReplicationStatus::Disconnected;
        self.next_scheduled = None;
    }

    /// Mark a sync as running.
    pub fn mark_syncing(&mut self) {
        self.status = ReplicationStatus::Syncing;
    }

    /// Mark a sync as finished successfully.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.status = ReplicationStatus::Ready;
        self.last_synced = Some(at);
        self.last_error = None;
        self.reschedule(at);
    }

    /// Mark a sync as failed or conflicted.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ReplicationStatus::SyncFailed;
        self.last_error = Some(error.into());
    }

    /// Recompute the next scheduled sync.
    pub fn reschedule(&mut self, now: DateTime<Utc>) {
        self.next_scheduled = if self.is_configured() {
            self.schedule.next_run(self.last_synced, now)
        } else {
            None
        };
    }

    /// Whether a scheduled sync is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_configured() && SyncSchedule::is_due(self.next_scheduled, now)
    }
}
