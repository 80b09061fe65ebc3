use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bplustree::BPlusTree;
use dht_types::{hash_id, id_to_hex_digits, shared_prefix_len, DhtError, DhtNode, Identifier};

use crate::routing_table::abs_distance;
use crate::{LeafSet, RoutingTable};

/// A Pastry participant: identifier, human name, local ordered index, and
/// the routing-table/leaf-set routing state.
pub struct PastryNode {
    id: Identifier,
    name: String,
    m: u32,
    b: u32,
    rows: usize,
    active: AtomicBool,
    index: Mutex<BPlusTree<String, Vec<u8>>>,
    routing_table: Mutex<RoutingTable>,
    leaf_set: Mutex<LeafSet>,
}

impl PastryNode {
    /// Fails with `InvalidOrder` if `bplus_tree_order < 3`.
    pub fn new(
        name: impl Into<String>,
        m: u32,
        b: u32,
        leaf_half: usize,
        bplus_tree_order: usize,
    ) -> Result<Arc<Self>, DhtError> {
        let name = name.into();
        let id = hash_id(name.as_bytes(), m);
        let rows = (m / b) as usize;
        let base = 1usize << b;
        let index = BPlusTree::new(bplus_tree_order)?;
        Ok(Arc::new(PastryNode {
            id,
            name,
            m,
            b,
            rows,
            active: AtomicBool::new(false),
            index: Mutex::new(index),
            routing_table: Mutex::new(RoutingTable::new(rows, base)),
            leaf_set: Mutex::new(LeafSet::new(leaf_half)),
        }))
    }

    pub fn seed(self: &Arc<Self>) {
        self.active.store(true, Ordering::SeqCst);
    }

    fn hex(&self) -> String {
        id_to_hex_digits(&self.id, self.rows).expect("rows sized to hold the full identifier")
    }

    fn routing_cap(&self) -> usize {
        self.rows + 2 * self.leaf_set.lock().unwrap().half()
    }

    pub fn leaf_set_len(&self) -> usize {
        self.leaf_set.lock().unwrap().len()
    }

    pub fn routing_table_filled(&self) -> usize {
        self.routing_table.lock().unwrap().filled_count()
    }

    /// Picks the next candidate per the Pastry routing rule: closer leaf-set
    /// member first, then an exact routing-table hit, then any row entry
    /// with an equal-or-better prefix match and strictly closer distance.
    /// `None` means `current` is the closest node known.
    fn next_hop(self: &Arc<Self>, key_id: &Identifier) -> Option<Arc<PastryNode>> {
        let cur_dist = abs_distance(self.id(), key_id, self.m);
        if let Some(closest) = self.leaf_set.lock().unwrap().closest(key_id, self.m) {
            if abs_distance(closest.id(), key_id, self.m) < cur_dist {
                return Some(closest);
            }
        }

        let key_hex = id_to_hex_digits(key_id, self.rows).ok()?;
        let p = shared_prefix_len(&self.hex(), &key_hex) as usize;
        if p < self.rows {
            let digit = key_hex.chars().nth(p)?.to_digit(16)? as usize;
            if let Some(node) = self.routing_table.lock().unwrap().get(p, digit) {
                if node.is_active() {
                    return Some(node);
                }
            }

            let row: Vec<Option<Arc<PastryNode>>> = self.routing_table.lock().unwrap().row(p).to_vec();
            let best = row
                .into_iter()
                .flatten()
                .filter(|n| n.is_active())
                .filter(|n| abs_distance(n.id(), key_id, self.m) < cur_dist)
                .min_by(|a, b| abs_distance(a.id(), key_id, self.m).cmp(&abs_distance(b.id(), key_id, self.m)));
            if best.is_some() {
                return best;
            }
        }
        None
    }

    /// Iterative routing with a visited set and the monotone-convergence
    /// check: stop as soon as a candidate would not strictly improve on the
    /// current node's distance to `key_id`.
    #[tracing::instrument(skip(self))]
    pub fn route(self: &Arc<Self>, key_id: &Identifier) -> Result<(Arc<PastryNode>, u32), DhtError> {
        let mut current = self.clone();
        let mut visited = HashSet::new();
        let mut hops = 0u32;
        let cap = self.routing_cap();

        loop {
            if !visited.insert(current.id().clone()) {
                return Ok((current, hops));
            }
            let Some(candidate) = current.next_hop(key_id) else {
                return Ok((current, hops));
            };
            if Arc::ptr_eq(&candidate, &current) {
                return Ok((current, hops));
            }
            if abs_distance(candidate.id(), key_id, self.m) >= abs_distance(current.id(), key_id, self.m) {
                return Ok((current, hops));
            }
            hops += 1;
            current = candidate;
            if hops as usize > cap {
                return Err(DhtError::RoutingDiverged(cap));
            }
        }
    }

    fn insert_into_routing_table(self: &Arc<Self>, node: Arc<PastryNode>) {
        let node_hex = id_to_hex_digits(node.id(), self.rows).expect("rows sized to hold the full identifier");
        let p = shared_prefix_len(&self.hex(), &node_hex) as usize;
        if p < self.rows {
            if let Some(digit) = node_hex.chars().nth(p).and_then(|c| c.to_digit(16)) {
                self.routing_table.lock().unwrap().set(p, digit as usize, node);
            }
        }
    }

    /// Inserts `node` into both this node's routing table and leaf set, as
    /// happens when a joining peer notifies its final leaf-set neighbors.
    pub fn insert_into_routing_state(self: &Arc<Self>, node: Arc<PastryNode>) {
        self.insert_into_routing_table(node.clone());
        self.leaf_set.lock().unwrap().insert(self.id(), node);
    }

    fn remove_from_routing_state(self: &Arc<Self>, id: &Identifier) {
        self.routing_table.lock().unwrap().remove_node(id);
        self.leaf_set.lock().unwrap().remove(id);
    }

    /// Absorbs routing state from `h`, a hop encountered while routing the
    /// join message toward `self.id`: add `h` to routing table and leaf set,
    /// copy `h`'s row `shared_prefix_len(self, h)` into our own table, and
    /// merge `h`'s leaf set into ours.
    fn absorb_from(self: &Arc<Self>, h: &Arc<PastryNode>) {
        self.insert_into_routing_table(h.clone());
        self.leaf_set.lock().unwrap().insert(self.id(), h.clone());

        let h_hex = id_to_hex_digits(h.id(), self.rows).expect("rows sized to hold the full identifier");
        let row_idx = shared_prefix_len(&self.hex(), &h_hex) as usize;
        if row_idx < self.rows {
            let h_row: Vec<Option<Arc<PastryNode>>> = h.routing_table.lock().unwrap().row(row_idx).to_vec();
            let mut rt = self.routing_table.lock().unwrap();
            for (col, entry) in h_row.into_iter().enumerate() {
                if let Some(node) = entry {
                    if !Arc::ptr_eq(&node, self) {
                        rt.set(row_idx, col, node);
                    }
                }
            }
        }

        let h_leaves: Vec<Arc<PastryNode>> = h.leaf_set.lock().unwrap().all().cloned().collect();
        let mut leaf_set = self.leaf_set.lock().unwrap();
        for node in h_leaves {
            if !Arc::ptr_eq(&node, self) {
                leaf_set.insert(self.id(), node);
            }
        }
    }

    fn migrate_from(self: &Arc<Self>, donor: &Arc<PastryNode>) -> bool {
        let to_move: Vec<(String, Vec<u8>)> = {
            let donor_index = donor.index.lock().unwrap();
            donor_index
                .iter_items()
                .filter(|(k, _)| {
                    let kid = hash_id(k.as_bytes(), self.m);
                    abs_distance(&kid, self.id(), self.m) < abs_distance(&kid, donor.id(), self.m)
                })
                .collect()
        };
        if to_move.is_empty() {
            return false;
        }
        let mut donor_index = donor.index.lock().unwrap();
        let mut self_index = self.index.lock().unwrap();
        for (k, v) in to_move {
            donor_index.remove(&k);
            self_index.put(k, v);
        }
        true
    }

    /// Routes a join message from `bootstrap` toward `self.id`, absorbing
    /// routing state at each hop, then notifies the final leaf set and
    /// migrates keys that now belong to `self`.
    #[tracing::instrument(skip(self, bootstrap))]
    pub fn join(self: &Arc<Self>, bootstrap: &Arc<PastryNode>) -> Result<u32, DhtError> {
        let mut hops = 0u32;
        let mut current = bootstrap.clone();
        let cap = self.routing_cap();

        loop {
            self.absorb_from(&current);
            let Some(candidate) = current.next_hop(self.id()) else {
                break;
            };
            if Arc::ptr_eq(&candidate, &current) {
                break;
            }
            if abs_distance(candidate.id(), self.id(), self.m) >= abs_distance(current.id(), self.id(), self.m) {
                break;
            }
            hops += 1;
            current = candidate;
            if hops as usize > cap {
                return Err(DhtError::RoutingDiverged(cap));
            }
        }
        self.absorb_from(&current);

        let members: Vec<Arc<PastryNode>> = self.leaf_set.lock().unwrap().all().cloned().collect();
        for member in &members {
            if !Arc::ptr_eq(member, self) {
                member.insert_into_routing_state(self.clone());
                hops += 1;
            }
        }
        for member in &members {
            if !Arc::ptr_eq(member, self) && self.migrate_from(member) {
                hops += 1;
            }
        }

        self.active.store(true, Ordering::SeqCst);
        Ok(hops)
    }

    /// Transfers all local keys to the numerically closest leaf neighbor,
    /// tells every leaf neighbor to drop `self`, marks inactive.
    #[tracing::instrument(skip(self))]
    pub fn leave(self: &Arc<Self>) -> u32 {
        if !self.is_active() {
            return 0;
        }
        let neighbors: Vec<Arc<PastryNode>> = self.leaf_set.lock().unwrap().all().cloned().collect();
        let mut hops = 0u32;

        let closest = neighbors
            .iter()
            .min_by(|a, b| abs_distance(self.id(), a.id(), self.m).cmp(&abs_distance(self.id(), b.id(), self.m)))
            .cloned();
        if let Some(closest) = closest {
            let moved: Vec<(String, Vec<u8>)> = {
                let mut idx = self.index.lock().unwrap();
                let items: Vec<(String, Vec<u8>)> = idx.iter_items().collect();
                for (k, _) in &items {
                    idx.remove(k);
                }
                items
            };
            if !moved.is_empty() {
                let mut closest_index = closest.index.lock().unwrap();
                for (k, v) in moved {
                    closest_index.put(k, v);
                }
                hops += 1;
            }
        }

        for neighbor in &neighbors {
            neighbor.remove_from_routing_state(self.id());
            hops += 1;
        }

        self.index.lock().unwrap().clear();
        self.active.store(false, Ordering::SeqCst);
        hops
    }
}

impl DhtNode for PastryNode {
    fn id(&self) -> &Identifier {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn bit_width(&self) -> u32 {
        self.m
    }

    fn locate(self: &Arc<Self>, key_id: &Identifier) -> Result<(Arc<Self>, u32), DhtError> {
        self.route(key_id)
    }

    fn routing_table_size(&self) -> usize {
        self.routing_table.lock().unwrap().filled_count()
    }

    fn local_get(&self, key: &str) -> Option<Vec<u8>> {
        self.index.lock().unwrap().get(&key.to_string())
    }

    fn local_put(&self, key: &str, value: Vec<u8>) {
        self.index.lock().unwrap().put(key.to_string(), value);
    }

    fn local_remove(&self, key: &str) -> bool {
        self.index.lock().unwrap().remove(&key.to_string())
    }

    fn local_len(&self) -> usize {
        self.index.lock().unwrap().len()
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn clear_local(&self) {
        self.index.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn network(n: usize, m: u32, b: u32, leaf_half: usize) -> Vec<Arc<PastryNode>> {
        let seed = PastryNode::new("node_0", m, b, leaf_half, 8).unwrap();
        seed.seed();
        let mut nodes = vec![seed];
        for i in 1..n {
            let node = PastryNode::new(format!("node_{i}"), m, b, leaf_half, 8).unwrap();
            node.join(&nodes[0]).unwrap();
            nodes.push(node);
        }
        nodes
    }

    #[test]
    fn seed_node_is_active_with_empty_state() {
        let seed = PastryNode::new("node_0", 16, 4, 2, 8).unwrap();
        seed.seed();
        assert!(seed.is_active());
        assert_eq!(seed.leaf_set_len(), 0);
    }

    #[test]
    fn join_populates_leaf_set_on_both_sides() {
        let nodes = network(16, 16, 4, 4);
        for node in &nodes {
            assert!(node.is_active());
        }
        assert!(nodes[0].leaf_set_len() > 0);
        assert!(nodes[15].leaf_set_len() > 0);
    }

    #[test]
    fn insert_update_lookup_round_trip() {
        let nodes = network(16, 16, 4, 4);
        nodes[0].insert("Inception", b"2010,8.8".to_vec()).unwrap();
        let (ok, _) = nodes[3].update("Inception", b"2010,9.0".to_vec()).unwrap();
        assert!(ok);
        let (value, _) = nodes[7].lookup("Inception").unwrap();
        assert_eq!(value, Some(b"2010,9.0".to_vec()));
    }

    #[test]
    fn leave_preserves_keys_on_neighbor() {
        let nodes = network(8, 16, 4, 4);
        for i in 0..50 {
            nodes[0].insert(&format!("key{i}"), vec![i as u8]).unwrap();
        }
        let stored: Vec<(String, Option<Vec<u8>>)> = (0..50)
            .map(|i| {
                let k = format!("key{i}");
                (k.clone(), nodes[0].lookup(&k).unwrap().0)
            })
            .collect();

        let departing = nodes[3].clone();
        departing.leave();
        assert!(!departing.is_active());
        assert_eq!(departing.local_len(), 0);

        for (k, expected) in stored {
            let (value, _) = nodes[1].lookup(&k).unwrap();
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn single_node_leave_is_free() {
        let seed = PastryNode::new("solo", 16, 4, 4, 8).unwrap();
        seed.seed();
        assert_eq!(seed.leave(), 0);
    }

    #[test]
    fn new_rejects_undersized_bplus_tree_order() {
        let err = PastryNode::new("node_0", 16, 4, 4, 1).unwrap_err();
        assert_eq!(err, DhtError::from(bplustree::BPlusTreeError::InvalidOrder(1)));
    }
}
