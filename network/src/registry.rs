use std::collections::HashMap;
use std::sync::Arc;

use dht_types::{DhtNode, Identifier};

/// Active-node set indexed by name, by id, and by insertion order.
///
/// A plain `HashMap` pair behind the facade's `RwLock` (see
/// [`crate::overlay::Overlay`]) rather than a lock-free concurrent map: the
/// three views must be updated atomically with each other, which a
/// lock-free structure would not buy us anything for given writes are
/// already serialized through one exclusive lock.
pub struct Registry<N> {
    by_name: HashMap<String, Arc<N>>,
    by_id: HashMap<Identifier, Arc<N>>,
    order: Vec<String>,
}

impl<N: DhtNode> Registry<N> {
    pub fn new() -> Self {
        Registry {
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn insert(&mut self, node: Arc<N>) {
        self.order.push(node.name().to_string());
        self.by_id.insert(node.id().clone(), node.clone());
        self.by_name.insert(node.name().to_string(), node);
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<N>> {
        let node = self.by_name.remove(name)?;
        self.by_id.remove(node.id());
        self.order.retain(|n| n != name);
        Some(node)
    }

    pub fn get(&self, name: &str) -> Option<Arc<N>> {
        self.by_name.get(name).cloned()
    }

    pub fn get_by_id(&self, id: &Identifier) -> Option<Arc<N>> {
        self.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// A uniformly-random active node, or `None` if there isn't one.
    pub fn random_active(&self) -> Option<Arc<N>> {
        let active: Vec<&String> = self.order.iter().filter(|n| self.by_name[*n].is_active()).collect();
        if active.is_empty() {
            return None;
        }
        let idx = fastrand::usize(..active.len());
        self.by_name.get(active[idx]).cloned()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<N>> {
        self.by_name.values()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
        self.order.clear();
    }
}

impl<N: DhtNode> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}
