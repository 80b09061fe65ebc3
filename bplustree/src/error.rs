use thiserror::Error;

/// Errors surfaced by [`crate::BPlusTree`].
///
/// These are structural violations rather than data-plane "not found" results;
/// callers that just want presence/absence should use [`crate::BPlusTree::get`].
#[derive(Error, Debug, Eq, PartialEq, Clone)]
pub enum BPlusTreeError {
    #[error("B+ tree order must be >= 3, got {0}")]
    InvalidOrder(usize),
    #[error("key not found")]
    NotFound,
}
