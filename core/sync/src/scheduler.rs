//! Advisory sync scheduling.
//!
//! The engine never runs a timer of its own. It records when the next
//! scheduled sync is due and an outside scheduler polls for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When scheduled syncs should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncSchedule {
    /// Only explicit or save-triggered syncs.
    #[default]
    Manual,
    /// Every `interval` after the last successful sync.
    Interval(Duration),
}

impl SyncSchedule {
    /// Build a schedule from a minutes setting; `None` or zero means manual.
    pub fn from_minutes(minutes: Option<u64>) -> Self {
        match minutes {
            Some(m) if m > 0 => SyncSchedule::Interval(Duration::from_secs(m.saturating_mul(60))),
            _ => SyncSchedule::Manual,
        }
    }

    /// Next scheduled run after `last_success`.
    ///
    /// A vault that has never synced is due at `now`. Manual schedules
    /// have no next run.
    pub fn next_run(&self, last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SyncSchedule::Manual => None,
            SyncSchedule::Interval(interval) => match last_success {
                Some(last) => last.checked_add_signed(chrono::Duration::from_std(*interval).ok()?),
                None => Some(now),
            },
        }
    }

    /// Whether a run scheduled for `next` is due at `now`.
    pub fn is_due(next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        next.map_or(false, |next| next <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minutes() {
        assert_eq!(SyncSchedule::from_minutes(None), SyncSchedule::Manual);
        assert_eq!(SyncSchedule::from_minutes(Some(0)), SyncSchedule::Manual);
        assert_eq!(
            SyncSchedule::from_minutes(Some(15)),
            SyncSchedule::Interval(Duration::from_secs(900))
        );
        assert_eq!(
            SyncSchedule::from_minutes(Some(u64::MAX)),
            SyncSchedule::Interval(Duration::from_secs(u64::MAX))
        );

        let huge = SyncSchedule::from_minutes(Some(u64::MAX));
        let now = Utc::now();
        assert_eq!(huge.next_run(None, now), Some(now));
        assert_eq!(huge.next_run(Some(now), now), None);
    }

    #[test]
    fn test_manual_never_due() {
        let now = Utc::now();
        assert_eq!(SyncSchedule::Manual.next_run(Some(now), now), None);
        assert!(!SyncSchedule::is_due(None, now));
    }

    #[test]
    fn test_interval_next_run() {
        let now = Utc::now();
        let schedule = SyncSchedule::Interval(Duration::from_secs(600));

        assert_eq!(schedule.next_run(None, now), Some(now));

        let last = now - chrono::Duration::minutes(4);
        let next = schedule.next_run(Some(last), now).unwrap();
        assert_eq!(next, last + chrono::Duration::minutes(10));
        assert!(!SyncSchedule::is_due(Some(next), now));
        assert!(SyncSchedule::is_due(Some(next), next));
    }
}
