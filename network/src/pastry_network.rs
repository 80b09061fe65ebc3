use std::sync::Arc;

use dht_types::{DhtConfig, DhtError};
use pastry::PastryNode;

use crate::overlay::Overlay;
use crate::stats::{average, ProtocolStats};

fn construct(name: &str, config: &DhtConfig) -> Result<Arc<PastryNode>, DhtError> {
    PastryNode::new(name, config.hash_bit_size, config.pastry_b, config.pastry_leaf_size, config.bplus_tree_order)
}

fn seed(node: &Arc<PastryNode>) {
    node.seed();
}

fn join(node: &Arc<PastryNode>, bootstrap: &Arc<PastryNode>) -> Result<u32, DhtError> {
    node.join(bootstrap)
}

fn leave(node: &Arc<PastryNode>) -> u32 {
    node.leave()
}

fn extra_stats(nodes: &[Arc<PastryNode>]) -> ProtocolStats {
    let fill: Vec<usize> = nodes.iter().map(|n| n.routing_table_filled()).collect();
    let leaf: Vec<usize> = nodes.iter().map(|n| n.leaf_set_len()).collect();
    ProtocolStats::Pastry {
        avg_routing_table_fill: average(&fill),
        avg_leaf_set_size: average(&leaf),
    }
}

pub fn new(config: DhtConfig) -> Overlay<PastryNode> {
    Overlay::new(config, construct, seed, join, leave, extra_stats)
}
