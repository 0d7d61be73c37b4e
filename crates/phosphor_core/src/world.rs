//! The process-scoped world aggregate.
//!
//! One registry plus one replication cache, constructed at startup and
//! passed explicitly to every component. No global statics anywhere.

use serde_json::{Map, Value};

use crate::registry::Registry;
use crate::sync::SyncCache;

/// Everything the authoritative process owns.
#[derive(Debug, Default)]
pub struct World {
    /// The id -> entity map.
    pub registry: Registry,
    /// Dirty keys pending replication.
    pub sync: SyncCache,
}

impl World {
    /// An empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            sync: SyncCache::new(),
        }
    }

    /// Flushes the replication cache against this world's registry.
    pub fn flush_sync(&mut self) -> Map<String, Value> {
        self.sync.flush(&self.registry)
    }
}
