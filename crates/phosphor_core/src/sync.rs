//! # Dirty-Key Replication Cache
//!
//! Records which property names changed per entity since the last flush.
//! The flush resolves values through the registry *at flush time* - mark a
//! key five times in one tick and viewers still receive only the latest
//! value - then clears itself atomically.
//!
//! An entity removed before the flush is simply absent from the diff; the
//! simulation guarantees `life` is marked dirty on the tick an entity
//! dies, so viewers always see the terminal `life <= 0` before the id
//! goes silent.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use serde_json::{Map, Value};

use crate::entity::EntityId;
use crate::properties;
use crate::registry::Registry;

/// Wire key carrying the entity kind tag in every flushed entry.
pub const TYPE_TAG_KEY: &str = "_t";

/// Per-entity dirty property names, between two flushes.
#[derive(Debug, Default)]
pub struct SyncCache {
    dirty: BTreeMap<EntityId, BTreeSet<&'static str>>,
}

impl SyncCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks properties of `id` as changed. Idempotent and additive.
    pub fn mark(&mut self, id: &EntityId, keys: &[&'static str]) {
        let set = self.dirty.entry(id.clone()).or_default();
        set.extend(keys.iter().copied());
    }

    /// True if nothing has been marked since the last flush.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Number of entities with pending dirty keys.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.dirty.len()
    }

    /// Drains the cache into a diff payload.
    ///
    /// Each entry carries its kind under [`TYPE_TAG_KEY`] plus the current
    /// value of every dirty property, read through `registry` now.
    /// Entities no longer registered are dropped. The cache is empty when
    /// this returns, whatever the payload contains.
    pub fn flush(&mut self, registry: &Registry) -> Map<String, Value> {
        let drained = mem::take(&mut self.dirty);
        let mut payload = Map::new();
        for (id, keys) in drained {
            let Some(entity) = registry.get(&id) else {
                continue;
            };
            let mut entry = Map::new();
            entry.insert(TYPE_TAG_KEY.to_owned(), Value::from(entity.kind().tag()));
            for key in keys {
                if let Some(value) = properties::read(entity, key) {
                    entry.insert(key.to_owned(), value);
                }
            }
            payload.insert(id.to_string(), Value::Object(entry));
        }
        payload
    }
}
