//! Generational arena holding the daemon's view of the roster

use std::collections::HashMap;

use tracing::debug;

use super::{EntityHandle, EntityInfo, Position, Roster};
use crate::presence::ParticipantKey;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entity: Option<EntityInfo>,
}

/// Live entities keyed by participant, addressed by generational handles
///
/// Removing an entity bumps its slot generation, so every handle taken
/// before the removal fails revalidation even after the slot is reused.
#[derive(Debug, Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_key: HashMap<ParticipantKey, EntityHandle>,
    viewer: Option<Position>,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity or replace the attributes of an existing one
    ///
    /// An existing entity keeps its handle.
    pub fn upsert(&mut self, info: EntityInfo) -> EntityHandle {
        if let Some(handle) = self.by_key.get(&info.key).copied() {
            if let Some(slot) = self.slots.get_mut(handle.index as usize) {
                slot.entity = Some(info);
                return handle;
            }
        }

        let key = info.key;
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entity = Some(info);
                EntityHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(info),
                });
                EntityHandle {
                    index,
                    generation: 0,
                }
            }
        };

        debug!(%key, ?handle, "entity spawned");
        self.by_key.insert(key, handle);
        handle
    }

    /// Remove the entity for `key`; returns false if it was not present
    pub fn remove(&mut self, key: ParticipantKey) -> bool {
        let Some(handle) = self.by_key.remove(&key) else {
            return false;
        };
        if let Some(slot) = self.slots.get_mut(handle.index as usize) {
            slot.entity = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(handle.index);
        }
        debug!(%key, ?handle, "entity despawned");
        true
    }

    /// Mutable access to the entity for `key`
    pub fn get_mut(&mut self, key: ParticipantKey) -> Option<&mut EntityInfo> {
        let handle = *self.by_key.get(&key)?;
        self.slots
            .get_mut(handle.index as usize)
            .and_then(|slot| slot.entity.as_mut())
    }

    /// Set where the local viewer is looking from
    pub fn set_viewer(&mut self, position: Option<Position>) {
        self.viewer = position;
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Roster for EntityArena {
    fn list_live_entities(&self) -> Vec<(ParticipantKey, EntityHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.entity.as_ref().map(|entity| {
                    (
                        entity.key,
                        EntityHandle {
                            index: index as u32,
                            generation: slot.generation,
                        },
                    )
                })
            })
            .collect()
    }

    fn entity(&self, handle: EntityHandle) -> Option<EntityInfo> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entity.clone()
    }

    fn viewer_position(&self) -> Option<Position> {
        self.viewer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Team;

    fn player(key: u64, name: &str) -> EntityInfo {
        EntityInfo {
            key: ParticipantKey(key),
            name: name.to_string(),
            number: key as u32,
            team: Team::Red,
            body: None,
        }
    }

    #[test]
    fn test_upsert_and_lookup() {
        let mut arena = EntityArena::new();
        let handle = arena.upsert(player(1, "alpha"));

        assert_eq!(arena.entity(handle).unwrap().name, "alpha");
        assert_eq!(arena.list_live_entities(), vec![(ParticipantKey(1), handle)]);
    }

    #[test]
    fn test_upsert_existing_keeps_handle() {
        let mut arena = EntityArena::new();
        let first = arena.upsert(player(1, "alpha"));
        let second = arena.upsert(player(1, "renamed"));

        assert_eq!(first, second);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.entity(first).unwrap().name, "renamed");
    }

    #[test]
    fn test_stale_handle_after_remove() {
        let mut arena = EntityArena::new();
        let old = arena.upsert(player(1, "alpha"));
        assert!(arena.remove(ParticipantKey(1)));

        assert!(arena.entity(old).is_none());

        // Slot is reused under a new generation
        let new = arena.upsert(player(2, "beta"));
        assert_eq!(new.index, old.index);
        assert_ne!(new.generation, old.generation);
        assert!(arena.entity(old).is_none());
        assert_eq!(arena.entity(new).unwrap().name, "beta");
    }

    #[test]
    fn test_remove_missing() {
        let mut arena = EntityArena::new();
        assert!(!arena.remove(ParticipantKey(99)));
    }

    #[test]
    fn test_get_mut_and_viewer() {
        let mut arena = EntityArena::new();
        arena.upsert(player(1, "alpha"));
        arena.get_mut(ParticipantKey(1)).unwrap().body = Some(Position::new(1.0, 0.0, 0.0));
        arena.set_viewer(Some(Position::default()));

        let (_, handle) = arena.list_live_entities()[0];
        assert!(arena.entity(handle).unwrap().body.is_some());
        assert_eq!(arena.viewer_position(), Some(Position::default()));
    }
}
