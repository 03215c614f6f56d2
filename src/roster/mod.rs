//! Roster module: the live entities indicators can be attached to
//!
//! The roster collaborator enumerates live entities and revalidates weak
//! handles. The snapshot cache throttles enumeration; the arena is the
//! in-process roster the daemon keeps from client updates.

mod arena;
mod snapshot;

use serde::{Deserialize, Serialize};

use crate::presence::ParticipantKey;

pub use arena::EntityArena;
pub use snapshot::{EntitySnapshotCache, DEFAULT_REFRESH_INTERVAL};

/// Generation-counted weak reference to a roster entity
///
/// A handle carries no ownership. It must be revalidated through
/// [`Roster::entity`] before each use because the entity may have been
/// removed (and its slot reused) since the handle was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle {
    pub index: u32,
    pub generation: u32,
}

/// Team a player belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    #[default]
    None,
    Red,
    Blue,
    Spectator,
}

/// Point in world space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Current attributes of a live entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub key: ParticipantKey,
    pub name: String,
    /// Jersey number shown in the speaker panel
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub team: Team,
    /// Body position; `None` while the player has no spawned body
    #[serde(default)]
    pub body: Option<Position>,
}

/// Roster collaborator consumed by the snapshot cache and reconciler
pub trait Roster {
    /// Enumerate every live entity; may be expensive
    fn list_live_entities(&self) -> Vec<(ParticipantKey, EntityHandle)>;

    /// Revalidate `handle`, returning the entity's current attributes
    fn entity(&self, handle: EntityHandle) -> Option<EntityInfo>;

    /// Position the local viewer is looking from (own body or spectator camera)
    fn viewer_position(&self) -> Option<Position>;
}
