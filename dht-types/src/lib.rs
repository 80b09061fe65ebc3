//! Identifier-space arithmetic, shared configuration and the protocol-agnostic
//! node trait on which the `chord`, `pastry` and `network` crates are built.

mod config;
mod error;
mod identifier;
mod node;

pub use config::DhtConfig;
pub use error::DhtError;
pub use identifier::{cw_distance, hash_id, id_to_hex_digits, in_range, shared_prefix_len, Identifier};
pub use node::DhtNode;
