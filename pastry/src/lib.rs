//! Prefix-based (Pastry) overlay: the routing table, the leaf set, route,
//! join and leave.

mod node;
mod routing_table;

pub use node::PastryNode;
pub use routing_table::{abs_distance, LeafSet, RoutingTable};
