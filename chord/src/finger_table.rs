use std::sync::Arc;

use dht_types::Identifier;
use num_bigint::BigUint;
use num_traits::One;

use crate::ChordNode;

/// Entry `i` points to the successor of `start = (self + 2^i) mod 2^m`.
/// `node` is `None` until `fix_fingers` (or a lucky join) resolves it.
#[derive(Clone)]
pub struct FingerEntry {
    pub start: Identifier,
    pub node: Option<Arc<ChordNode>>,
}

/// `m` finger entries. Entry 0 always mirrors the node's successor.
pub struct FingerTable {
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    pub fn new(self_id: &Identifier, m: u32, size: usize) -> Self {
        let modulus = BigUint::one() << m;
        let entries = (0..size)
            .map(|i| {
                let offset = BigUint::one() << i;
                let start = (self_id.value() + &offset) % &modulus;
                FingerEntry {
                    start: Identifier::from_biguint(start, m),
                    node: None,
                }
            })
            .collect();
        FingerTable { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, i: usize) -> &FingerEntry {
        &self.entries[i]
    }

    pub fn set(&mut self, i: usize, node: Arc<ChordNode>) {
        self.entries[i].node = Some(node);
    }

    pub fn set_successor(&mut self, node: Arc<ChordNode>) {
        if let Some(first) = self.entries.first_mut() {
            first.node = Some(node);
        }
    }

    /// Scans high to low for the first finger strictly between `self.id` and
    /// `key_id`; callers fall back to `self` when none matches.
    pub fn closest_preceding(&self, self_id: &Identifier, key_id: &Identifier, m: u32) -> Option<Arc<ChordNode>> {
        for entry in self.entries.iter().rev() {
            if let Some(node) = &entry.node {
                if node.is_active() && dht_types::in_range(node.id(), self_id, key_id, false, false, m) {
                    return Some(node.clone());
                }
            }
        }
        None
    }

    /// Number of distinct non-empty nodes referenced by the table, used for
    /// the network stats' average-unique-fingers summary.
    pub fn unique_node_count(&self) -> usize {
        let mut ids = std::collections::HashSet::new();
        for entry in &self.entries {
            if let Some(node) = &entry.node {
                ids.insert(node.id().clone());
            }
        }
        ids.len()
    }
}
