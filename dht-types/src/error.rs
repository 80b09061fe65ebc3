use thiserror::Error;

/// Structural and data-plane error kinds shared across the DHT crates.
///
/// "Not found" on `lookup`/`update`/`delete` is deliberately NOT a variant
/// here: the protocols report absence as `(false, hops)` / `(None, hops)`,
/// never as an error. These variants are the ones the spec calls out as
/// surfacing to the caller without recovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DhtError {
    #[error("network has no active nodes")]
    EmptyNetwork,
    #[error("node name `{0}` already exists")]
    DuplicateName(String),
    #[error("routing exceeded the iteration cap of {0}")]
    RoutingDiverged(usize),
    #[error("hex representation needs {0} digits but only {1} were allotted")]
    InvalidIndex(usize, usize),
    #[error(transparent)]
    Index(#[from] bplustree::BPlusTreeError),
}
