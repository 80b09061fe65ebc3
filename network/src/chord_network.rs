use std::sync::Arc;

use chord::ChordNode;
use dht_types::{DhtConfig, DhtError, DhtNode};

use crate::overlay::Overlay;
use crate::stats::{average, ProtocolStats};

fn construct(name: &str, config: &DhtConfig) -> Result<Arc<ChordNode>, DhtError> {
    ChordNode::new(name, config.hash_bit_size, config.chord_finger_table_size, config.bplus_tree_order)
}

fn seed(node: &Arc<ChordNode>) {
    node.seed();
}

fn join(node: &Arc<ChordNode>, bootstrap: &Arc<ChordNode>) -> Result<u32, DhtError> {
    node.join(bootstrap)
}

fn leave(node: &Arc<ChordNode>) -> u32 {
    node.leave()
}

fn extra_stats(nodes: &[Arc<ChordNode>]) -> ProtocolStats {
    let fingers: Vec<usize> = nodes.iter().map(|n| n.routing_table_size()).collect();
    ProtocolStats::Chord { avg_unique_fingers: average(&fingers) }
}

pub fn new(config: DhtConfig) -> Overlay<ChordNode> {
    Overlay::new(config, construct, seed, join, leave, extra_stats)
}
