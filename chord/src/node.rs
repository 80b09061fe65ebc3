use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bplustree::BPlusTree;
use dht_types::{hash_id, in_range, DhtError, DhtNode, Identifier};

use crate::FingerTable;

/// A Chord ring participant: identifier, human name, local ordered index,
/// and the successor/predecessor/finger-table routing state.
pub struct ChordNode {
    id: Identifier,
    name: String,
    m: u32,
    active: AtomicBool,
    index: Mutex<BPlusTree<String, Vec<u8>>>,
    successor: Mutex<Option<Arc<ChordNode>>>,
    predecessor: Mutex<Option<Arc<ChordNode>>>,
    finger_table: Mutex<FingerTable>,
}

impl ChordNode {
    /// Builds an inactive node. `join` (or seeding the first node of a
    /// network) is what makes it active. Fails with `InvalidOrder` if
    /// `bplus_tree_order < 3`.
    pub fn new(
        name: impl Into<String>,
        m: u32,
        finger_table_size: usize,
        bplus_tree_order: usize,
    ) -> Result<Arc<Self>, DhtError> {
        let name = name.into();
        let id = hash_id(name.as_bytes(), m);
        let finger_table = FingerTable::new(&id, m, finger_table_size);
        let index = BPlusTree::new(bplus_tree_order)?;
        Ok(Arc::new(ChordNode {
            id,
            name,
            m,
            active: AtomicBool::new(false),
            index: Mutex::new(index),
            successor: Mutex::new(None),
            predecessor: Mutex::new(None),
            finger_table: Mutex::new(finger_table),
        }))
    }

    /// Makes a just-constructed node the seed of a brand-new network: its
    /// own successor, no predecessor, active, 0 hops.
    pub fn seed(self: &Arc<Self>) {
        *self.successor.lock().unwrap() = Some(self.clone());
        self.finger_table.lock().unwrap().set_successor(self.clone());
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn successor(self: &Arc<Self>) -> Option<Arc<ChordNode>> {
        self.successor.lock().unwrap().clone()
    }

    pub fn predecessor(self: &Arc<Self>) -> Option<Arc<ChordNode>> {
        self.predecessor.lock().unwrap().clone()
    }

    pub fn finger_table_size(&self) -> usize {
        self.finger_table.lock().unwrap().len()
    }

    fn routing_cap(&self) -> usize {
        self.m as usize
    }

    /// `find_successor`: `find_predecessor` then that node's successor.
    #[tracing::instrument(skip(self))]
    pub fn find_successor(self: &Arc<Self>, key_id: &Identifier) -> Result<(Arc<ChordNode>, u32), DhtError> {
        let (pred, hops) = self.find_predecessor(key_id)?;
        let succ = pred.successor().unwrap_or(pred);
        Ok((succ, hops))
    }

    #[tracing::instrument(skip(self))]
    pub fn find_predecessor(self: &Arc<Self>, key_id: &Identifier) -> Result<(Arc<ChordNode>, u32), DhtError> {
        let mut n = self.clone();
        let mut hops = 0u32;
        let cap = self.routing_cap();

        loop {
            let succ = match n.successor() {
                Some(s) => s,
                None => return Ok((n, hops)),
            };
            if Arc::ptr_eq(&n, &succ) || in_range(key_id, n.id(), succ.id(), false, true, self.m) {
                return Ok((n, hops));
            }
            let next = n.closest_preceding_finger(key_id);
            if Arc::ptr_eq(&next, &n) {
                return Ok((n, hops));
            }
            n = next;
            hops += 1;
            if hops as usize > cap {
                return Err(DhtError::RoutingDiverged(cap));
            }
        }
    }

    pub fn closest_preceding_finger(self: &Arc<Self>, key_id: &Identifier) -> Arc<ChordNode> {
        self.finger_table
            .lock()
            .unwrap()
            .closest_preceding(self.id(), key_id, self.m)
            .unwrap_or_else(|| self.clone())
    }

    /// The lazy/practical join variant: attach to the ring through
    /// `bootstrap`, pick up predecessor/successor pointers and migrate the
    /// keys that now fall under `self`, but leave the finger table for
    /// `fix_fingers` to fill in.
    #[tracing::instrument(skip(self, bootstrap))]
    pub fn join(self: &Arc<Self>, bootstrap: &Arc<ChordNode>) -> Result<u32, DhtError> {
        let (successor, mut hops) = bootstrap.find_successor(self.id())?;
        *self.successor.lock().unwrap() = Some(successor.clone());
        self.finger_table.lock().unwrap().set_successor(successor.clone());

        let predecessor = successor.predecessor();
        hops += 1; // query successor.predecessor

        *successor.predecessor.lock().unwrap() = Some(self.clone());
        hops += 1; // notify successor

        if let Some(predecessor) = &predecessor {
            if !Arc::ptr_eq(predecessor, self) && !Arc::ptr_eq(predecessor, &successor) {
                *predecessor.successor.lock().unwrap() = Some(self.clone());
                hops += 1;
            }
        }
        *self.predecessor.lock().unwrap() = predecessor.clone();

        let pred_id = predecessor.map(|p| p.id().clone()).unwrap_or_else(|| successor.id().clone());
        let moved = self.migrate_from(&successor, &pred_id);
        if moved {
            hops += 1;
        }

        self.active.store(true, Ordering::SeqCst);
        Ok(hops)
    }

    /// Pulls every key owned by `self` under `(pred_id, self.id]` out of
    /// `donor`'s local index. Returns whether anything moved.
    fn migrate_from(self: &Arc<Self>, donor: &Arc<ChordNode>, pred_id: &Identifier) -> bool {
        let to_move: Vec<(String, Vec<u8>)> = {
            let donor_index = donor.index.lock().unwrap();
            donor_index
                .iter_items()
                .filter(|(k, _)| {
                    let kid = hash_id(k.as_bytes(), self.m);
                    in_range(&kid, pred_id, self.id(), false, true, self.m)
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

    #[tracing::instrument(skip(self))]
    pub fn stabilize(self: &Arc<Self>) {
        let Some(succ) = self.successor() else { return };
        let x = succ.predecessor();
        let mut succ = succ;
        if let Some(x) = &x {
            if !Arc::ptr_eq(x, self) && in_range(x.id(), self.id(), succ.id(), false, false, self.m) {
                *self.successor.lock().unwrap() = Some(x.clone());
                self.finger_table.lock().unwrap().set_successor(x.clone());
                succ = x.clone();
            }
        }
        succ.notify(self.clone());
    }

    pub fn notify(self: &Arc<Self>, candidate: Arc<ChordNode>) {
        let mut predecessor = self.predecessor.lock().unwrap();
        let accept = match predecessor.as_ref() {
            None => true,
            Some(current) => in_range(candidate.id(), current.id(), self.id(), false, false, self.m),
        };
        if accept {
            *predecessor = Some(candidate);
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn fix_finger(self: &Arc<Self>, i: usize) -> Result<(), DhtError> {
        let start = self.finger_table.lock().unwrap().entry(i).start.clone();
        let (succ, _hops) = self.find_successor(&start)?;
        self.finger_table.lock().unwrap().set(i, succ);
        Ok(())
    }

    /// Transfer local keys to the successor, piggyback pointer repair, mark
    /// inactive. Single-node rings (successor == self or absent) just clear
    /// with 0 hops.
    #[tracing::instrument(skip(self))]
    pub fn leave(self: &Arc<Self>) -> u32 {
        if !self.is_active() {
            return 0;
        }
        let successor = self.successor();
        let predecessor = self.predecessor();
        let mut hops = 0u32;

        if let Some(successor) = &successor {
            if !Arc::ptr_eq(successor, self) {
                let moved: Vec<(String, Vec<u8>)> = {
                    let mut self_index = self.index.lock().unwrap();
                    let items: Vec<(String, Vec<u8>)> = self_index.iter_items().collect();
                    for (k, _) in &items {
                        self_index.remove(k);
                    }
                    items
                };
                if !moved.is_empty() {
                    let mut succ_index = successor.index.lock().unwrap();
                    for (k, v) in moved {
                        succ_index.put(k, v);
                    }
                    hops += 1;
                }
                *successor.predecessor.lock().unwrap() = predecessor.clone();
                if let Some(predecessor) = &predecessor {
                    if !Arc::ptr_eq(predecessor, self) {
                        *predecessor.successor.lock().unwrap() = Some(successor.clone());
                        hops += 1;
                    }
                }
            }
        }

        self.index.lock().unwrap().clear();
        *self.successor.lock().unwrap() = None;
        *self.predecessor.lock().unwrap() = None;
        self.active.store(false, Ordering::SeqCst);
        hops
    }
}

impl DhtNode for ChordNode {
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
        self.find_successor(key_id)
    }

    fn routing_table_size(&self) -> usize {
        self.finger_table.lock().unwrap().unique_node_count()
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

    fn ring(n: usize, m: u32) -> Vec<Arc<ChordNode>> {
        let seed = ChordNode::new("node_0", m, m as usize, 8).unwrap();
        seed.seed();
        let mut nodes = vec![seed];
        for i in 1..n {
            let node = ChordNode::new(format!("node_{i}"), m, m as usize, 8).unwrap();
            node.join(&nodes[0]).unwrap();
            nodes.push(node);
        }
        for _ in 0..(n * 4) {
            for node in &nodes {
                node.stabilize();
            }
        }
        nodes
    }

    #[test]
    fn seed_node_is_its_own_successor() {
        let seed = ChordNode::new("node_0", 16, 16, 8).unwrap();
        seed.seed();
        assert!(Arc::ptr_eq(&seed.successor().unwrap(), &seed));
        assert!(seed.is_active());
    }

    #[test]
    fn join_sets_successor_and_predecessor_after_stabilization() {
        let nodes = ring(8, 16);
        for node in &nodes {
            assert!(node.is_active());
            assert!(node.successor().is_some());
            assert!(node.predecessor().is_some());
        }
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let nodes = ring(8, 16);
        let (ok, _hops) = nodes[0].insert("The Matrix", b"1999".to_vec()).unwrap();
        assert!(ok);
        let (value, _hops) = nodes[3].lookup("The Matrix").unwrap();
        assert_eq!(value, Some(b"1999".to_vec()));
    }

    #[test]
    fn delete_then_lookup_reports_absent() {
        let nodes = ring(8, 16);
        nodes[0].insert("k", b"v".to_vec()).unwrap();
        let (removed, _) = nodes[1].delete("k").unwrap();
        assert!(removed);
        let (value, _) = nodes[2].lookup("k").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn leave_transfers_keys_to_successor() {
        let nodes = ring(8, 16);
        for i in 0..20 {
            nodes[0].insert(&format!("key{i}"), vec![i as u8]).unwrap();
        }
        let departing = nodes[3].clone();
        let successor = departing.successor().unwrap();
        let successor_len_before = successor.local_len();
        let moved_keys = departing.local_len();
        departing.leave();
        assert!(!departing.is_active());
        assert_eq!(departing.local_len(), 0);
        if moved_keys > 0 {
            assert_eq!(successor.local_len(), successor_len_before + moved_keys);
        }
    }

    #[test]
    fn single_node_leave_is_free() {
        let seed = ChordNode::new("solo", 16, 16, 8).unwrap();
        seed.seed();
        assert_eq!(seed.leave(), 0);
    }

    #[test]
    fn new_rejects_undersized_bplus_tree_order() {
        let err = ChordNode::new("node_0", 16, 16, 2).unwrap_err();
        assert_eq!(err, DhtError::from(bplustree::BPlusTreeError::InvalidOrder(2)));
    }
}
