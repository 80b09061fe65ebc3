/// Network-wide counters plus a protocol-specific routing summary.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkStats {
    pub node_count: usize,
    pub total_keys: usize,
    pub min_keys: usize,
    pub max_keys: usize,
    pub mean_keys: f64,
    pub protocol: ProtocolStats,
}

/// Routing-structure summaries that differ in shape between the two
/// protocols: Chord reports unique fingers, Pastry reports table fill and
/// leaf-set size separately.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolStats {
    Chord { avg_unique_fingers: f64 },
    Pastry { avg_routing_table_fill: f64, avg_leaf_set_size: f64 },
}

pub fn key_counts_summary(counts: &[usize]) -> (usize, usize, usize, f64) {
    if counts.is_empty() {
        return (0, 0, 0, 0.0);
    }
    let total: usize = counts.iter().sum();
    let min = *counts.iter().min().unwrap();
    let max = *counts.iter().max().unwrap();
    let mean = total as f64 / counts.len() as f64;
    (total, min, max, mean)
}

pub fn average(values: &[usize]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<usize>() as f64 / values.len() as f64
    }
}
