use std::sync::Arc;

use dht_types::{DhtNode, Identifier};
use num_bigint::BigUint;

use crate::PastryNode;

/// Symmetric numeric distance on the identifier ring: the shorter of the two
/// clockwise distances between `a` and `b`. Pastry's "closest node" rule
/// (unlike Chord's directional successor rule) is distance-symmetric.
pub fn abs_distance(a: &Identifier, b: &Identifier, m: u32) -> BigUint {
    let forward = dht_types::cw_distance(a, b, m);
    let backward = dht_types::cw_distance(b, a, m);
    std::cmp::min(forward.value().clone(), backward.value().clone())
}

/// `rows x base` table indexed by (shared prefix length, next hex digit).
/// Cell `(r, c)` holds a node sharing the first `r` digits with self whose
/// `(r+1)`-th digit is `c`; self occupies `(r, self_digit_r)` implicitly and
/// is never stored as a cell.
pub struct RoutingTable {
    rows: usize,
    base: usize,
    cells: Vec<Vec<Option<Arc<PastryNode>>>>,
}

impl RoutingTable {
    pub fn new(rows: usize, base: usize) -> Self {
        RoutingTable {
            rows,
            base,
            cells: vec![vec![None; base]; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn get(&self, r: usize, c: usize) -> Option<Arc<PastryNode>> {
        self.cells.get(r).and_then(|row| row.get(c)).cloned().flatten()
    }

    pub fn set(&mut self, r: usize, c: usize, node: Arc<PastryNode>) {
        if r < self.rows && c < self.base {
            self.cells[r][c] = Some(node);
        }
    }

    pub fn row(&self, r: usize) -> &[Option<Arc<PastryNode>>] {
        &self.cells[r]
    }

    pub fn remove_node(&mut self, id: &Identifier) {
        for row in &mut self.cells {
            for cell in row.iter_mut() {
                if cell.as_ref().map(|n| n.id()) == Some(id) {
                    *cell = None;
                }
            }
        }
    }

    /// Count of non-empty cells, used for `get_network_stats`'s average
    /// routing-table fill.
    pub fn filled_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }
}

/// Up to `2*half` nodes nearest to self on the ring, split into a `left`
/// (smaller identifiers) and `right` (larger) half, each sorted by
/// proximity - here, symmetric numeric distance - to self.
pub struct LeafSet {
    half: usize,
    left: Vec<Arc<PastryNode>>,
    right: Vec<Arc<PastryNode>>,
}

impl LeafSet {
    pub fn new(half: usize) -> Self {
        LeafSet {
            half,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    pub fn half(&self) -> usize {
        self.half
    }

    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.left.iter().chain(self.right.iter()).any(|n| n.id() == id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<PastryNode>> {
        self.left.iter().chain(self.right.iter())
    }

    /// Inserts `node`, keeping each side sorted by distance to `self_id` and
    /// trimmed to `half` entries; smaller identifiers (by ring position
    /// relative to `self_id`, i.e. predecessor direction) go left.
    pub fn insert(&mut self, self_id: &Identifier, node: Arc<PastryNode>) {
        if node.id() == self_id || self.contains(node.id()) {
            return;
        }
        let m = node.bit_width();
        // Clockwise-closer (successor direction) goes right; the rest left.
        let forward = dht_types::cw_distance(self_id, node.id(), m);
        let backward = dht_types::cw_distance(node.id(), self_id, m);
        let goes_right = forward.value() <= backward.value();
        let side = if goes_right { &mut self.right } else { &mut self.left };
        side.push(node);
        side.sort_by(|a, b| abs_distance(self_id, a.id(), m).cmp(&abs_distance(self_id, b.id(), m)));
        if side.len() > self.half {
            side.pop();
        }
    }

    pub fn remove(&mut self, id: &Identifier) {
        self.left.retain(|n| n.id() != id);
        self.right.retain(|n| n.id() != id);
    }

    /// The member (or self, represented by `None`) numerically closest to
    /// `key_id`.
    pub fn closest(&self, key_id: &Identifier, m: u32) -> Option<Arc<PastryNode>> {
        self.all()
            .filter(|n| n.is_active())
            .min_by(|a, b| abs_distance(key_id, a.id(), m).cmp(&abs_distance(key_id, b.id(), m)))
            .cloned()
    }
}
