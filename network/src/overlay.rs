use std::sync::{Arc, RwLock};

use dht_types::{DhtConfig, DhtError, DhtNode};
use rayon::prelude::*;

use crate::pool;
use crate::registry::Registry;
use crate::stats::{key_counts_summary, NetworkStats, ProtocolStats};

type Construct<N> = fn(&str, &DhtConfig) -> Result<Arc<N>, DhtError>;
type Seed<N> = fn(&Arc<N>);
type Join<N> = fn(&Arc<N>, &Arc<N>) -> Result<u32, DhtError>;
type Leave<N> = fn(&Arc<N>) -> u32;
type ExtraStats<N> = fn(&[Arc<N>]) -> ProtocolStats;

/// Generic engine behind both [`crate::Network::Chord`] and
/// [`crate::Network::Pastry`]: everything in §4.5 that is the same shape
/// regardless of protocol, parameterized over the few operations that
/// aren't (construction, seeding, join, leave, protocol-specific stats).
pub struct Overlay<N: DhtNode> {
    registry: RwLock<Registry<N>>,
    config: DhtConfig,
    construct: Construct<N>,
    seed: Seed<N>,
    join: Join<N>,
    leave: Leave<N>,
    extra_stats: ExtraStats<N>,
}

impl<N: DhtNode + 'static> Overlay<N> {
    pub fn new(
        config: DhtConfig,
        construct: Construct<N>,
        seed: Seed<N>,
        join: Join<N>,
        leave: Leave<N>,
        extra_stats: ExtraStats<N>,
    ) -> Self {
        Overlay {
            registry: RwLock::new(Registry::new()),
            config,
            construct,
            seed,
            join,
            leave,
            extra_stats,
        }
    }

    pub fn create_node(&self, name: &str) -> Result<Arc<N>, DhtError> {
        let mut registry = self.registry.write().unwrap();
        if registry.contains_name(name) {
            return Err(DhtError::DuplicateName(name.to_string()));
        }
        let node = (self.construct)(name, &self.config)?;
        registry.insert(node.clone());
        Ok(node)
    }

    /// Seeds the first node for free; every subsequent node joins through a
    /// uniformly-random existing node. Returns the join's hop count.
    #[tracing::instrument(skip(self))]
    pub fn add_node(&self, name: &str) -> Result<u32, DhtError> {
        let bootstrap = self.registry.read().unwrap().random_active();
        let node = self.create_node(name)?;
        match bootstrap {
            None => {
                (self.seed)(&node);
                Ok(0)
            }
            Some(bootstrap) => (self.join)(&node, &bootstrap),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn remove_node(&self, name: &str) -> (bool, u32) {
        let node = self.registry.read().unwrap().get(name);
        let Some(node) = node else { return (false, 0) };
        let hops = (self.leave)(&node);
        self.registry.write().unwrap().remove(name);
        (true, hops)
    }

    /// Sequentially creates and adds `k` nodes named `{prefix}{i}`. Returns
    /// each node's name and hop count, in join order.
    pub fn build_network(&self, k: usize, prefix: &str) -> Result<Vec<(String, u32)>, DhtError> {
        (0..k)
            .map(|i| {
                let name = format!("{prefix}{i}");
                let hops = self.add_node(&name)?;
                Ok((name, hops))
            })
            .collect()
    }

    fn pick_entry(&self, entry: Option<&str>) -> Result<Arc<N>, DhtError> {
        let registry = self.registry.read().unwrap();
        if registry.is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        if let Some(name) = entry {
            if let Some(node) = registry.get(name) {
                if node.is_active() {
                    return Ok(node);
                }
            }
        }
        registry.random_active().ok_or(DhtError::EmptyNetwork)
    }

    pub fn insert(&self, key: &str, value: Vec<u8>, entry: Option<&str>) -> Result<(bool, u32), DhtError> {
        self.pick_entry(entry)?.insert(key, value)
    }

    pub fn lookup(&self, key: &str, entry: Option<&str>) -> Result<(Option<Vec<u8>>, u32), DhtError> {
        self.pick_entry(entry)?.lookup(key)
    }

    pub fn update(&self, key: &str, value: Vec<u8>, entry: Option<&str>) -> Result<(bool, u32), DhtError> {
        self.pick_entry(entry)?.update(key, value)
    }

    pub fn delete(&self, key: &str, entry: Option<&str>) -> Result<(bool, u32), DhtError> {
        self.pick_entry(entry)?.delete(key)
    }

    pub fn bulk_insert(
        &self,
        items: Vec<(String, Vec<u8>)>,
        entry: Option<&str>,
    ) -> Result<Vec<(bool, u32)>, DhtError> {
        items.into_iter().map(|(k, v)| self.insert(&k, v, entry)).collect()
    }

    pub fn bulk_lookup(&self, keys: Vec<String>, entry: Option<&str>) -> Result<Vec<(Option<Vec<u8>>, u32)>, DhtError> {
        keys.iter().map(|k| self.lookup(k, entry)).collect()
    }

    pub fn bulk_update(
        &self,
        items: Vec<(String, Vec<u8>)>,
        entry: Option<&str>,
    ) -> Result<Vec<(bool, u32)>, DhtError> {
        items.into_iter().map(|(k, v)| self.update(&k, v, entry)).collect()
    }

    pub fn bulk_delete(&self, keys: Vec<String>, entry: Option<&str>) -> Result<Vec<(bool, u32)>, DhtError> {
        keys.iter().map(|k| self.delete(k, entry)).collect()
    }

    /// Issues the `N` lookups across a worker pool of `min(N, worker_pool_size)`
    /// threads. Each task resolves its own entry node and completes end to
    /// end; no suspension points inside a task.
    pub fn concurrent_lookup(
        &self,
        keys: Vec<String>,
        entry: Option<&str>,
    ) -> Result<Vec<(Option<Vec<u8>>, u32)>, DhtError> {
        if self.registry.read().unwrap().is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let pool = pool::build(self.config.worker_pool_size, keys.len());
        pool.install(|| keys.par_iter().map(|k| self.lookup(k, entry)).collect())
    }

    pub fn concurrent_insert(
        &self,
        items: Vec<(String, Vec<u8>)>,
        entry: Option<&str>,
    ) -> Result<Vec<(bool, u32)>, DhtError> {
        if self.registry.read().unwrap().is_empty() {
            return Err(DhtError::EmptyNetwork);
        }
        let pool = pool::build(self.config.worker_pool_size, items.len());
        pool.install(|| items.par_iter().map(|(k, v)| self.insert(k, v.clone(), entry)).collect())
    }

    /// Snapshot of every active node, for protocol-specific housekeeping
    /// (Chord's stabilization rounds) that doesn't belong on this generic
    /// engine.
    pub fn active_nodes(&self) -> Vec<Arc<N>> {
        self.registry.read().unwrap().values().filter(|n| n.is_active()).cloned().collect()
    }

    pub fn get_network_stats(&self) -> NetworkStats {
        let registry = self.registry.read().unwrap();
        let active: Vec<Arc<N>> = registry.values().filter(|n| n.is_active()).cloned().collect();
        let counts: Vec<usize> = active.iter().map(|n| n.local_len()).collect();
        let (total, min, max, mean) = key_counts_summary(&counts);
        NetworkStats {
            node_count: active.len(),
            total_keys: total,
            min_keys: min,
            max_keys: max,
            mean_keys: mean,
            protocol: (self.extra_stats)(&active),
        }
    }

    /// Marks every node inactive, clears every local index, empties the set.
    pub fn clear(&self) {
        let mut registry = self.registry.write().unwrap();
        for node in registry.values() {
            node.deactivate();
            node.clear_local();
        }
        registry.clear();
    }
}
