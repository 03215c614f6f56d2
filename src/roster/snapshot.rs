//! Throttled snapshot of the roster

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{EntityHandle, EntityInfo, Roster};
use crate::presence::ParticipantKey;

/// Minimum time between two full roster enumerations
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Cache of resolvable entity handles, replaced wholesale on refresh
///
/// Lookups may be up to one refresh interval stale. A handle found here is
/// only a hint; callers revalidate it against the roster before use.
#[derive(Debug)]
pub struct EntitySnapshotCache {
    entries: Vec<(ParticipantKey, EntityHandle)>,
    index: HashMap<ParticipantKey, usize>,
    last_refresh: Option<Instant>,
    min_interval: Duration,
}

impl EntitySnapshotCache {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            last_refresh: None,
            min_interval,
        }
    }

    /// Re-enumerate the roster if the snapshot is older than the interval
    ///
    /// The first call always refreshes. Returns true if a refresh happened.
    pub fn refresh_if_stale(&mut self, now: Instant, roster: &dyn Roster) -> bool {
        let stale = match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.min_interval,
        };
        if stale {
            self.replace(roster.list_live_entities(), now);
        }
        stale
    }

    /// Unconditionally re-enumerate the roster
    pub fn refresh(&mut self, now: Instant, roster: &dyn Roster) {
        self.replace(roster.list_live_entities(), now);
    }

    fn replace(&mut self, entries: Vec<(ParticipantKey, EntityHandle)>, now: Instant) {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, (key, _)) in entries.iter().enumerate() {
            // First entry wins when the roster reports a key twice
            index.entry(*key).or_insert(position);
        }
        debug!(entities = entries.len(), "roster snapshot refreshed");
        self.entries = entries;
        self.index = index;
        self.last_refresh = Some(now);
    }

    /// Look up the handle for `key` in the current snapshot
    pub fn resolve(&self, key: ParticipantKey) -> Option<EntityHandle> {
        self.index
            .get(&key)
            .and_then(|position| self.entries.get(*position))
            .map(|(_, handle)| *handle)
    }

    /// Resolve `key` and revalidate the handle against `roster`
    ///
    /// Returns the entity's current attributes, or `None` if the key is
    /// missing from the snapshot or its entity is gone.
    pub fn resolve_live(&self, key: ParticipantKey, roster: &dyn Roster) -> Option<EntityInfo> {
        let handle = self.resolve(key)?;
        roster.entity(handle).filter(|entity| entity.key == key)
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget the snapshot; the next refresh check always refreshes
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.last_refresh = None;
    }
}

impl Default for EntitySnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
