use chord::ChordNode;
use dht_types::{DhtConfig, DhtError};
use pastry::PastryNode;

use crate::overlay::Overlay;
use crate::stats::NetworkStats;
use crate::{chord_network, pastry_network};

/// Protocol-agnostic facade over a set of DHT nodes. Which overlay is in
/// play is a runtime choice (the tagged-variant half of the polymorphism
/// design note; the trait-default half lives in `dht_types::DhtNode`).
pub enum Network {
    Chord(Overlay<ChordNode>),
    Pastry(Overlay<PastryNode>),
}

impl Network {
    pub fn new_chord(config: DhtConfig) -> Self {
        Network::Chord(chord_network::new(config))
    }

    pub fn new_pastry(config: DhtConfig) -> Self {
        Network::Pastry(pastry_network::new(config))
    }

    pub fn add_node(&self, name: &str) -> Result<u32, DhtError> {
        match self {
            Network::Chord(o) => o.add_node(name),
            Network::Pastry(o) => o.add_node(name),
        }
    }

    pub fn remove_node(&self, name: &str) -> (bool, u32) {
        match self {
            Network::Chord(o) => o.remove_node(name),
            Network::Pastry(o) => o.remove_node(name),
        }
    }

    pub fn build_network(&self, k: usize, prefix: &str) -> Result<Vec<(String, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.build_network(k, prefix),
            Network::Pastry(o) => o.build_network(k, prefix),
        }
    }

    pub fn insert(&self, key: &str, value: Vec<u8>, entry: Option<&str>) -> Result<(bool, u32), DhtError> {
        match self {
            Network::Chord(o) => o.insert(key, value, entry),
            Network::Pastry(o) => o.insert(key, value, entry),
        }
    }

    pub fn lookup(&self, key: &str, entry: Option<&str>) -> Result<(Option<Vec<u8>>, u32), DhtError> {
        match self {
            Network::Chord(o) => o.lookup(key, entry),
            Network::Pastry(o) => o.lookup(key, entry),
        }
    }

    pub fn update(&self, key: &str, value: Vec<u8>, entry: Option<&str>) -> Result<(bool, u32), DhtError> {
        match self {
            Network::Chord(o) => o.update(key, value, entry),
            Network::Pastry(o) => o.update(key, value, entry),
        }
    }

    pub fn delete(&self, key: &str, entry: Option<&str>) -> Result<(bool, u32), DhtError> {
        match self {
            Network::Chord(o) => o.delete(key, entry),
            Network::Pastry(o) => o.delete(key, entry),
        }
    }

    pub fn bulk_insert(&self, items: Vec<(String, Vec<u8>)>, entry: Option<&str>) -> Result<Vec<(bool, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.bulk_insert(items, entry),
            Network::Pastry(o) => o.bulk_insert(items, entry),
        }
    }

    pub fn bulk_lookup(&self, keys: Vec<String>, entry: Option<&str>) -> Result<Vec<(Option<Vec<u8>>, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.bulk_lookup(keys, entry),
            Network::Pastry(o) => o.bulk_lookup(keys, entry),
        }
    }

    pub fn bulk_update(&self, items: Vec<(String, Vec<u8>)>, entry: Option<&str>) -> Result<Vec<(bool, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.bulk_update(items, entry),
            Network::Pastry(o) => o.bulk_update(items, entry),
        }
    }

    pub fn bulk_delete(&self, keys: Vec<String>, entry: Option<&str>) -> Result<Vec<(bool, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.bulk_delete(keys, entry),
            Network::Pastry(o) => o.bulk_delete(keys, entry),
        }
    }

    pub fn concurrent_lookup(&self, keys: Vec<String>, entry: Option<&str>) -> Result<Vec<(Option<Vec<u8>>, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.concurrent_lookup(keys, entry),
            Network::Pastry(o) => o.concurrent_lookup(keys, entry),
        }
    }

    pub fn concurrent_insert(&self, items: Vec<(String, Vec<u8>)>, entry: Option<&str>) -> Result<Vec<(bool, u32)>, DhtError> {
        match self {
            Network::Chord(o) => o.concurrent_insert(items, entry),
            Network::Pastry(o) => o.concurrent_insert(items, entry),
        }
    }

    pub fn get_network_stats(&self) -> NetworkStats {
        match self {
            Network::Chord(o) => o.get_network_stats(),
            Network::Pastry(o) => o.get_network_stats(),
        }
    }

    pub fn clear(&self) {
        match self {
            Network::Chord(o) => o.clear(),
            Network::Pastry(o) => o.clear(),
        }
    }

    /// Runs `rounds` of background repair: `stabilize` + one `fix_fingers`
    /// tick per node for Chord; a no-op for Pastry, whose routing state is
    /// repaired passively on future joins per the design notes. Tests that
    /// assert hop bounds must call this after bulk joins to reach steady
    /// state - the spec fixes no specific schedule.
    pub fn run_stabilization(&self, rounds: usize) {
        let Network::Chord(overlay) = self else { return };
        let nodes = overlay.active_nodes();
        for round in 0..rounds {
            for node in &nodes {
                node.stabilize();
                let size = node.finger_table_size();
                if size > 0 {
                    let _ = node.fix_finger(round % size);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::DhtConfig;
    use pretty_assertions::assert_eq;

    fn small_config() -> DhtConfig {
        DhtConfig::default().with_hash_bit_size(16).with_chord_finger_table_size(16)
    }

    #[test]
    fn build_and_lookup_chord() {
        let net = Network::new_chord(small_config());
        net.build_network(8, "node_").unwrap();
        net.run_stabilization(32);

        net.insert("The Matrix", b"{\"year\":1999}".to_vec(), None).unwrap();
        let (value, _hops) = net.lookup("The Matrix", None).unwrap();
        assert_eq!(value, Some(b"{\"year\":1999}".to_vec()));
    }

    #[test]
    fn update_overwrites_pastry() {
        let net = Network::new_pastry(small_config());
        net.build_network(16, "node_").unwrap();

        net.insert("Inception", b"{\"year\":2010,\"rating\":8.8}".to_vec(), None).unwrap();
        let (ok, _) = net.update("Inception", b"{\"year\":2010,\"rating\":9.0}".to_vec(), None).unwrap();
        assert!(ok);
        let (value, _) = net.lookup("Inception", None).unwrap();
        assert_eq!(value, Some(b"{\"year\":2010,\"rating\":9.0}".to_vec()));
    }

    #[test]
    fn delete_then_lookup_reports_absent() {
        let net = Network::new_chord(small_config());
        net.build_network(32, "node_").unwrap();
        net.run_stabilization(64);

        let titles: Vec<String> = (0..100).map(|i| format!("title-{i}")).collect();
        for title in &titles {
            net.insert(title, title.clone().into_bytes(), None).unwrap();
        }
        let (deleted, kept) = titles.split_at(50);
        // spec scenario deletes the LAST 50; keep the call shape the same.
        for title in kept {
            net.delete(title, None).unwrap();
        }
        for title in kept {
            let (value, _) = net.lookup(title, None).unwrap();
            assert_eq!(value, None);
        }
        for title in deleted {
            let (value, _) = net.lookup(title, None).unwrap();
            assert_eq!(value, Some(title.clone().into_bytes()));
        }
    }

    #[test]
    fn join_migrates_keys_to_new_node() {
        let net = Network::new_chord(small_config());
        net.build_network(8, "node_").unwrap();
        net.run_stabilization(32);

        for i in 0..200 {
            net.insert(&format!("key{i}"), vec![i as u8], None).unwrap();
        }
        let before = net.get_network_stats().total_keys;

        net.add_node("new_node_0").unwrap();
        net.run_stabilization(32);

        let after = net.get_network_stats();
        assert_eq!(after.total_keys, before);
        let new_node_keys = match &net {
            Network::Chord(overlay) => overlay
                .active_nodes()
                .into_iter()
                .find(|n| dht_types::DhtNode::name(n.as_ref()) == "new_node_0")
                .map(|n| dht_types::DhtNode::local_len(n.as_ref()))
                .unwrap_or(0),
            Network::Pastry(_) => unreachable!(),
        };
        assert!(new_node_keys > 0, "expected the new node to absorb at least one key");
    }

    #[test]
    fn leave_preserves_keys_pastry() {
        let net = Network::new_pastry(small_config());
        net.build_network(8, "node_").unwrap();

        let keys: Vec<String> = (0..50).map(|i| format!("key{i}")).collect();
        for k in &keys {
            net.insert(k, k.clone().into_bytes(), None).unwrap();
        }

        let (removed, _) = net.remove_node("node_3");
        assert!(removed);

        for k in &keys {
            let (value, _) = net.lookup(k, None).unwrap();
            assert_eq!(value, Some(k.clone().into_bytes()));
        }
    }

    #[test]
    fn empty_network_reports_empty_network_error() {
        let net = Network::new_chord(small_config());
        assert_eq!(net.lookup("anything", None).unwrap_err(), DhtError::EmptyNetwork);
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let net = Network::new_chord(small_config());
        net.add_node("node_0").unwrap();
        match &net {
            Network::Chord(overlay) => {
                assert_eq!(overlay.create_node("node_0").unwrap_err(), DhtError::DuplicateName("node_0".to_string()));
            }
            Network::Pastry(_) => unreachable!(),
        }
    }

    #[test]
    fn invalid_bplus_tree_order_surfaces_from_add_node() {
        let net = Network::new_chord(small_config().with_bplus_tree_order(2));
        let err = net.add_node("node_0").unwrap_err();
        assert_eq!(err, DhtError::from(bplustree::BPlusTreeError::InvalidOrder(2)));
    }

    #[test]
    fn clear_empties_the_network() {
        let net = Network::new_chord(small_config());
        net.build_network(4, "node_").unwrap();
        net.insert("k", b"v".to_vec(), None).unwrap();
        net.clear();
        assert_eq!(net.lookup("k", None).unwrap_err(), DhtError::EmptyNetwork);
    }

    #[test]
    fn concurrent_lookup_matches_sequential() {
        let net = Network::new_chord(small_config());
        net.build_network(8, "node_").unwrap();
        net.run_stabilization(32);

        let keys: Vec<String> = (0..40).map(|i| format!("key{i}")).collect();
        for k in &keys {
            net.insert(k, k.clone().into_bytes(), None).unwrap();
        }

        let sequential: Vec<Option<Vec<u8>>> = net
            .bulk_lookup(keys.clone(), None)
            .unwrap()
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        let concurrent: Vec<Option<Vec<u8>>> = net
            .concurrent_lookup(keys, None)
            .unwrap()
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        assert_eq!(sequential, concurrent);
    }
}
