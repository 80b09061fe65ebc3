//! Ring-based (Chord) overlay: the finger table, successor/predecessor
//! pointers, lazy join, stabilize/notify/fix_fingers, and leave.

mod finger_table;
mod node;

pub use finger_table::FingerTable;
pub use node::ChordNode;
