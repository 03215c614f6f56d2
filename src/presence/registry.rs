//! Per-participant activity state with read-path expiry

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::ParticipantKey;

/// How long an inactive record is kept before it is purged
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(5);

/// Latest activity reported for one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityRecord {
    /// Participant is currently talking
    pub is_active: bool,
    /// Time of the most recent report, active or not
    pub last_activity: Instant,
}

impl ActivityRecord {
    fn is_expired(&self, now: Instant, grace: Duration) -> bool {
        !self.is_active && now.saturating_duration_since(self.last_activity) > grace
    }
}

/// Map from participant key to activity state
///
/// Eviction only happens inside [`PresenceRegistry::active_keys`]. The
/// registry is read once per reconciliation tick, so there is no separate
/// sweep timer.
#[derive(Debug)]
pub struct PresenceRegistry {
    records: HashMap<ParticipantKey, ActivityRecord>,
    grace_window: Duration,
}

impl PresenceRegistry {
    /// Create an empty registry with the default grace window
    pub fn new() -> Self {
        Self::with_grace_window(DEFAULT_GRACE_WINDOW)
    }

    /// Create an empty registry with a custom grace window
    pub fn with_grace_window(grace_window: Duration) -> Self {
        Self {
            records: HashMap::new(),
            grace_window,
        }
    }

    /// Record that `key` is (or is not) talking as of `now`
    ///
    /// The timestamp is refreshed even when the flag is unchanged: callers
    /// report liveness, not only transitions.
    pub fn set_active(&mut self, key: ParticipantKey, is_active: bool, now: Instant) {
        let record = self.records.entry(key).or_insert(ActivityRecord {
            is_active,
            last_activity: now,
        });
        if record.is_active != is_active {
            debug!(%key, is_active, "presence changed");
        }
        record.is_active = is_active;
        record.last_activity = now;
    }

    /// Purge expired records, then return every key that is talking
    pub fn active_keys(&mut self, now: Instant) -> BTreeSet<ParticipantKey> {
        let grace = self.grace_window;
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now, grace));

        let evicted = before - self.records.len();
        if evicted > 0 {
            trace!(evicted, remaining = self.records.len(), "expired presence records");
        }

        self.records
            .iter()
            .filter(|(_, record)| record.is_active)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Look up the record for `key` without evicting anything
    pub fn record(&self, key: ParticipantKey) -> Option<&ActivityRecord> {
        self.records.get(&key)
    }

    /// Number of records currently retained, active or not
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
