//! # Entity Registry
//!
//! The single id -> entity map. Entities come into existence through
//! create-on-lookup and leave through explicit removal; there is no other
//! mutation path into the map itself.
//!
//! ## Iteration Order
//!
//! Backed by a `BTreeMap`, so iteration follows [`EntityId`]'s derived
//! ordering: slot ids ascending, then remote ids lexicographic. The order
//! is documented because it is the tie-break for first-match collision
//! scans - same world, same scan, every time.

use std::collections::BTreeMap;

use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::WorldError;
use crate::FIRST_EPHEMERAL_ID;

/// Owns every live entity in the world.
#[derive(Debug, Default)]
pub struct Registry {
    entities: BTreeMap<EntityId, Entity>,
    next_ephemeral: u32,
}

impl Registry {
    /// An empty registry; the ephemeral id counter starts above the
    /// reserved controller slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_ephemeral: FIRST_EPHEMERAL_ID,
        }
    }

    /// Looks up an entity without creating it.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Mutable lookup without creation.
    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Looks up `id`, creating a default entity of `kind` if absent.
    ///
    /// Creation is the only place a full default state is established.
    pub fn get_or_create(&mut self, id: EntityId, kind: EntityKind) -> &mut Entity {
        self.entities
            .entry(id.clone())
            .or_insert_with(|| Entity::new(id, kind))
    }

    /// Like [`Self::get_or_create`], but with a wire-supplied kind tag.
    ///
    /// Returns `None` (and logs) if the entity does not exist and the tag
    /// resolves to nothing - the caller treats that as a no-op.
    pub fn get_or_create_tagged(&mut self, id: EntityId, tag: &str) -> Option<&mut Entity> {
        if self.entities.contains_key(&id) {
            return self.entities.get_mut(&id);
        }
        let Some(kind) = EntityKind::from_tag(tag) else {
            let err = WorldError::UnknownTypeTag(tag.to_owned());
            tracing::warn!(%id, %err, "refusing entity creation");
            return None;
        };
        Some(self.get_or_create(id, kind))
    }

    /// Removes an entity, returning it if it existed.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        self.entities.remove(id)
    }

    /// True if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates entities in the documented id order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Snapshot of all ids, in iteration order.
    ///
    /// The simulation walks this while inserting and removing entities,
    /// so it cannot borrow the map across the walk.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().cloned().collect()
    }

    /// Allocates the next ephemeral slot id.
    ///
    /// Monotonic within a process; never re-used, never below
    /// [`FIRST_EPHEMERAL_ID`], so ephemeral ids cannot collide with
    /// controller slots.
    pub fn alloc_ephemeral(&mut self) -> EntityId {
        let id = self.next_ephemeral;
        self.next_ephemeral += 1;
        EntityId::Slot(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_does_not_create() {
        let registry = Registry::new();
        assert!(registry.get(&EntityId::Slot(0)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_create_on_lookup() {
        let mut registry = Registry::new();
        let entity = registry.get_or_create(EntityId::Slot(0), EntityKind::Controller);
        assert_eq!(entity.kind(), EntityKind::Controller);

        // Second lookup returns the same entity, not a fresh default.
        registry
            .get_mut(&EntityId::Slot(0))
            .unwrap()
            .as_controller_mut()
            .unwrap()
            .color_value = 0x12_34_56;
        let again = registry.get_or_create(EntityId::Slot(0), EntityKind::Controller);
        assert_eq!(again.as_controller().unwrap().color_value, 0x12_34_56);
    }

    #[test]
    fn test_tagged_creation() {
        let mut registry = Registry::new();
        assert!(registry
            .get_or_create_tagged(EntityId::remote("p1"), "Player")
            .is_some());
        assert!(registry
            .get_or_create_tagged(EntityId::remote("p2"), "Dragon")
            .is_none());
        // The bad tag must not have registered anything.
        assert!(!registry.contains(&EntityId::remote("p2")));
        // An existing entity is returned even with a junk tag.
        assert!(registry
            .get_or_create_tagged(EntityId::remote("p1"), "Dragon")
            .is_some());
    }

    #[test]
    fn test_removal() {
        let mut registry = Registry::new();
        registry.get_or_create(EntityId::Slot(3), EntityKind::Enemy);
        assert!(registry.remove(&EntityId::Slot(3)).is_some());
        assert!(registry.remove(&EntityId::Slot(3)).is_none());
        assert!(!registry.contains(&EntityId::Slot(3)));
    }

    #[test]
    fn test_ephemeral_ids_above_controller_slots() {
        let mut registry = Registry::new();
        let first = registry.alloc_ephemeral();
        let second = registry.alloc_ephemeral();
        assert_eq!(first, EntityId::Slot(crate::FIRST_EPHEMERAL_ID));
        assert_eq!(second, EntityId::Slot(crate::FIRST_EPHEMERAL_ID + 1));
    }

    #[test]
    fn test_iteration_order_is_insertion_independent() {
        let mut a = Registry::new();
        a.get_or_create(EntityId::Slot(2), EntityKind::Enemy);
        a.get_or_create(EntityId::remote("z"), EntityKind::Player);
        a.get_or_create(EntityId::Slot(1), EntityKind::Enemy);

        let mut b = Registry::new();
        b.get_or_create(EntityId::remote("z"), EntityKind::Player);
        b.get_or_create(EntityId::Slot(1), EntityKind::Enemy);
        b.get_or_create(EntityId::Slot(2), EntityKind::Enemy);

        let order_a: Vec<_> = a.iter().map(|(id, _)| id.clone()).collect();
        let order_b: Vec<_> = b.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(order_a, order_b);
        assert_eq!(order_a[0], EntityId::Slot(1));
    }
}
