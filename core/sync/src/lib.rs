//! passvault replication engine
//!
//! This module replicates the open vault file to a mirror, including:
//! - A replication state machine guarded by one lock
//! - Conflict detection against the mirror's write time
//! - Advisory scheduling for an external timer
//! - Reacting to session save/load/unload events

pub mod conflict;
pub mod engine;
pub mod scheduler;
pub mod state;

// Re-export main types
pub use conflict::{detect_conflict, is_conflict, ConflictInfo, CONFLICT_GRACE_SECONDS};
pub use engine::{ReplicationEngine, SyncResult, SyncSource, SyncTrigger};
pub use scheduler::SyncSchedule;
pub use state::{ReplicationState, ReplicationStatus};
