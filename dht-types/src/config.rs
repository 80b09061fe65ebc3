/// Tunables for the identifier space, the per-protocol routing structures,
/// the local B+ tree index and the worker pool backing concurrent network
/// operations.
///
/// Mirrors the recognized configuration surface: every field has the
/// documented default and can be overridden with a `with_*` builder method.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DhtConfig {
    /// Bit-width `m` of the cyclic identifier space `[0, 2^m)`.
    pub hash_bit_size: u32,
    /// Number of Chord finger-table entries. Defaults to `hash_bit_size`;
    /// smaller values trade routing speed for memory.
    pub chord_finger_table_size: usize,
    /// Bits per Pastry routing-table digit (`B`); base is `2^B`.
    pub pastry_b: u32,
    /// Half-width of the Pastry leaf set (`L/2` on each side).
    pub pastry_leaf_size: usize,
    /// Order `O` of each node's local B+ tree index.
    pub bplus_tree_order: usize,
    /// Size of the worker pool backing `concurrent_lookup`/`concurrent_insert`.
    pub worker_pool_size: usize,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            hash_bit_size: 160,
            chord_finger_table_size: 160,
            pastry_b: 4,
            pastry_leaf_size: 8,
            bplus_tree_order: 32,
            worker_pool_size: 32,
        }
    }
}

impl DhtConfig {
    pub fn with_hash_bit_size(mut self, m: u32) -> Self {
        self.hash_bit_size = m;
        self
    }

    pub fn with_chord_finger_table_size(mut self, size: usize) -> Self {
        self.chord_finger_table_size = size;
        self
    }

    pub fn with_pastry_b(mut self, b: u32) -> Self {
        self.pastry_b = b;
        self
    }

    pub fn with_pastry_leaf_size(mut self, half: usize) -> Self {
        self.pastry_leaf_size = half;
        self
    }

    pub fn with_bplus_tree_order(mut self, order: usize) -> Self {
        self.bplus_tree_order = order;
        self
    }

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Number of rows in a Pastry routing table, `m / B`.
    pub fn pastry_rows(&self) -> usize {
        (self.hash_bit_size / self.pastry_b) as usize
    }

    /// Number of columns in a Pastry routing table row, `2^B`.
    pub fn pastry_base(&self) -> usize {
        1usize << self.pastry_b
    }

    /// Hard cap on routing iterations before a route is declared diverged:
    /// `m` for Chord, `m/B + L` for Pastry.
    pub fn pastry_routing_cap(&self) -> usize {
        self.pastry_rows() + 2 * self.pastry_leaf_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = DhtConfig::default();
        assert_eq!(cfg.hash_bit_size, 160);
        assert_eq!(cfg.chord_finger_table_size, 160);
        assert_eq!(cfg.pastry_b, 4);
        assert_eq!(cfg.pastry_leaf_size, 8);
        assert_eq!(cfg.bplus_tree_order, 32);
        assert_eq!(cfg.worker_pool_size, 32);
    }

    #[test]
    fn builders_override_fields() {
        let cfg = DhtConfig::default()
            .with_hash_bit_size(32)
            .with_pastry_b(4)
            .with_worker_pool_size(4);
        assert_eq!(cfg.hash_bit_size, 32);
        assert_eq!(cfg.pastry_rows(), 8);
        assert_eq!(cfg.pastry_base(), 16);
        assert_eq!(cfg.worker_pool_size, 4);
    }
}
