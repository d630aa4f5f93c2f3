//! Startup-built registry of shard handles.

use std::{collections::BTreeMap, sync::Arc};

use tracing::warn;

use crate::{
    application::repos::{ProjectionsRepo, ShardStore},
    domain::shard::{ShardKey, ShardKeyError},
};

/// Fixed mapping from shard key to store. The global shard is always present.
pub struct ShardRegistry {
    shards: BTreeMap<ShardKey, Arc<dyn ShardStore>>,
    global: Arc<dyn ShardStore>,
    projections: Arc<dyn ProjectionsRepo>,
}

impl ShardRegistry {
    /// `global` and `projections` are two views of the same global store.
    pub fn new(global: Arc<dyn ShardStore>, projections: Arc<dyn ProjectionsRepo>) -> Self {
        let mut shards = BTreeMap::new();
        shards.insert(ShardKey::Global, Arc::clone(&global));
        Self {
            shards,
            global,
            projections,
        }
    }

    /// Registers a regional shard. The global slot is fixed at construction.
    pub fn with_shard(mut self, key: ShardKey, store: Arc<dyn ShardStore>) -> Self {
        if key.is_global() {
            warn!(
                target = "shardpress::application::shards",
                "ignoring attempt to replace the global shard"
            );
            return self;
        }
        self.shards.insert(key, store);
        self
    }

    /// Parses and looks up a caller-supplied key. No fallback shard.
    pub fn resolve(&self, raw: &str) -> Result<(ShardKey, Arc<dyn ShardStore>), ShardKeyError> {
        let key = ShardKey::parse(raw)?;
        self.get(key)
            .map(|store| (key, store))
            .ok_or(ShardKeyError::Unregistered(key))
    }

    pub fn get(&self, key: ShardKey) -> Option<Arc<dyn ShardStore>> {
        self.shards.get(&key).cloned()
    }

    pub fn global(&self) -> Arc<dyn ShardStore> {
        Arc::clone(&self.global)
    }

    pub fn projections(&self) -> &Arc<dyn ProjectionsRepo> {
        &self.projections
    }

    /// Registered shards in key order, global last.
    pub fn iter(&self) -> impl Iterator<Item = (ShardKey, &Arc<dyn ShardStore>)> {
        self.shards.iter().map(|(key, store)| (*key, store))
    }

    pub fn keys(&self) -> Vec<ShardKey> {
        self.shards.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
