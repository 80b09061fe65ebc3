use std::sync::Arc;

use crate::{hash_id, DhtError, Identifier};

/// Capability set shared by every DHT node regardless of protocol.
///
/// A node is polymorphic over `{locate, routing_table_size}`; the four
/// data-plane operations are default-implemented on top of `locate` alone,
/// so `chord::ChordNode` and `pastry::PastryNode` only need to supply their
/// own routing procedure and local-store plumbing.
pub trait DhtNode: Send + Sync {
    fn id(&self) -> &Identifier;

    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    /// Bit-width of the identifier space this node was constructed with.
    fn bit_width(&self) -> u32;

    /// Routes `key_id` to the node responsible for it and returns the hop
    /// count spent doing so. Implemented by `find_successor` (Chord) or
    /// `route` (Pastry).
    fn locate(self: &Arc<Self>, key_id: &Identifier) -> Result<(Arc<Self>, u32), DhtError>;

    /// Size of this node's routing structure, for `get_network_stats`:
    /// unique fingers for Chord, filled routing-table cells for Pastry.
    fn routing_table_size(&self) -> usize;

    fn local_get(&self, key: &str) -> Option<Vec<u8>>;

    fn local_put(&self, key: &str, value: Vec<u8>);

    fn local_remove(&self, key: &str) -> bool;

    fn local_len(&self) -> usize;

    /// Marks the node inactive without running a membership protocol -
    /// used by the network facade's `clear()`, which wipes the whole set
    /// rather than migrating keys off one node at a time.
    fn deactivate(&self);

    /// Empties the local index - paired with `deactivate` for `clear()`.
    fn clear_local(&self);

    fn insert(self: &Arc<Self>, key: &str, value: Vec<u8>) -> Result<(bool, u32), DhtError> {
        let (owner, hops) = self.route_to_owner(key)?;
        owner.local_put(key, value);
        Ok((true, hops))
    }

    fn lookup(self: &Arc<Self>, key: &str) -> Result<(Option<Vec<u8>>, u32), DhtError> {
        let (owner, hops) = self.route_to_owner(key)?;
        Ok((owner.local_get(key), hops))
    }

    fn update(self: &Arc<Self>, key: &str, value: Vec<u8>) -> Result<(bool, u32), DhtError> {
        let (owner, hops) = self.route_to_owner(key)?;
        if owner.local_get(key).is_some() {
            owner.local_put(key, value);
            Ok((true, hops))
        } else {
            Ok((false, hops))
        }
    }

    fn delete(self: &Arc<Self>, key: &str) -> Result<(bool, u32), DhtError> {
        let (owner, hops) = self.route_to_owner(key)?;
        Ok((owner.local_remove(key), hops))
    }

    /// Hashes `key`, routes to its owner, and tacks on the one hop for final
    /// delivery when the owner differs from the issuing node. Self-to-self
    /// operations contribute 0 hops.
    fn route_to_owner(self: &Arc<Self>, key: &str) -> Result<(Arc<Self>, u32), DhtError> {
        let key_id = hash_id(key.as_bytes(), self.bit_width());
        let (owner, mut hops) = self.locate(&key_id)?;
        if !Arc::ptr_eq(self, &owner) {
            hops += 1;
        }
        Ok((owner, hops))
    }
}
