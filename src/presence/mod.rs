//! Presence module for tracking who is currently talking
//!
//! The registry holds one activity record per participant and expires
//! inactive records after a grace window. The feed is the queue through
//! which voice events from other threads reach the registry.

mod feed;
mod registry;

use serde::{Deserialize, Serialize};

pub use feed::{ActivityFeed, ActivityReport, ActivitySender};
pub use registry::{ActivityRecord, PresenceRegistry, DEFAULT_GRACE_WINDOW};

/// Stable identifier for a session participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantKey(pub u64);

impl std::fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
