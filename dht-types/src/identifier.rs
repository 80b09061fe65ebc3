use num_bigint::BigUint;
use num_traits::{One, Zero};
use sha1::{Digest, Sha1};

use crate::DhtError;

/// A point in the cyclic identifier space `[0, 2^m)`.
///
/// Ring width `m` is not carried on the value itself - it is a property of
/// the network/config a value is used within - so every ring-arithmetic
/// function below takes `m` explicitly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Identifier(BigUint);

impl Identifier {
    pub fn from_biguint(value: BigUint, m: u32) -> Self {
        Identifier(value & ring_mask(m))
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn zero() -> Self {
        Identifier(BigUint::zero())
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn ring_mask(m: u32) -> BigUint {
    (BigUint::one() << m) - BigUint::one()
}

fn ring_modulus(m: u32) -> BigUint {
    BigUint::one() << m
}

/// Hashes `bytes` with SHA-1, big-endian, masked to `m` bits. Deterministic
/// and - courtesy of SHA-1 - uniformly distributed modulo `2^m`.
pub fn hash_id(bytes: &[u8], m: u32) -> Identifier {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let full = BigUint::from_bytes_be(&digest);
    Identifier(full & ring_mask(m))
}

/// `(b - a) mod 2^m`: the clockwise distance travelled from `a` to reach `b`.
pub fn cw_distance(a: &Identifier, b: &Identifier, m: u32) -> Identifier {
    let modulus = ring_modulus(m);
    let a = &a.0 % &modulus;
    let b = &b.0 % &modulus;
    let diff = if b >= a { &b - &a } else { &modulus - &a + &b };
    Identifier(diff)
}

/// Tests whether `x` lies in the ring range from `a` to `b`, with each
/// endpoint's inclusion controlled independently.
///
/// The degenerate case `a == b` denotes the full ring; `x` is considered a
/// member unless it equals that single point and neither endpoint flag
/// includes it.
pub fn in_range(x: &Identifier, a: &Identifier, b: &Identifier, inc_start: bool, inc_end: bool, m: u32) -> bool {
    if a == b {
        return x != a || inc_start || inc_end;
    }
    if x == a {
        return inc_start;
    }
    if x == b {
        return inc_end;
    }
    let dist_ab = cw_distance(a, b, m);
    let dist_ax = cw_distance(a, x, m);
    dist_ax > Identifier::zero() && dist_ax < dist_ab
}

/// Renders `x` as a fixed-width, zero-padded hex string. Fails with
/// `InvalidIndex` when `x` does not fit in `digits` hex characters.
pub fn id_to_hex_digits(x: &Identifier, digits: usize) -> Result<String, DhtError> {
    let raw = format!("{:x}", x.0);
    if raw.len() > digits {
        return Err(DhtError::InvalidIndex(raw.len(), digits));
    }
    Ok(format!("{raw:0>digits$}"))
}

/// Number of leading hex characters `hex_a` and `hex_b` have in common.
pub fn shared_prefix_len(hex_a: &str, hex_b: &str) -> u32 {
    hex_a
        .chars()
        .zip(hex_b.chars())
        .take_while(|(a, b)| a == b)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(n: u64, m: u32) -> Identifier {
        Identifier::from_biguint(BigUint::from(n), m)
    }

    #[test]
    fn hash_id_is_deterministic_and_masked() {
        let a = hash_id(b"node_0", 160);
        let b = hash_id(b"node_0", 160);
        assert_eq!(a, b);
        assert!(a.value() < &ring_modulus(160));

        let small = hash_id(b"node_0", 8);
        assert!(small.value() < &BigUint::from(256u32));
    }

    #[test]
    fn hash_id_differs_across_inputs() {
        assert_ne!(hash_id(b"node_0", 160), hash_id(b"node_1", 160));
    }

    #[test]
    fn cw_distance_wraps_around() {
        let m = 8;
        assert_eq!(cw_distance(&id(250, m), &id(2, m), m), id(8, m));
        assert_eq!(cw_distance(&id(10, m), &id(20, m), m), id(10, m));
        assert_eq!(cw_distance(&id(10, m), &id(10, m), m), id(0, m));
    }

    #[test]
    fn in_range_half_open_standard_case() {
        let m = 8;
        let (a, b) = (id(10, m), id(20, m));
        assert!(!in_range(&id(10, m), &a, &b, false, true, m));
        assert!(in_range(&id(15, m), &a, &b, false, true, m));
        assert!(in_range(&id(20, m), &a, &b, false, true, m));
        assert!(!in_range(&id(21, m), &a, &b, false, true, m));
    }

    #[test]
    fn in_range_handles_wraparound() {
        let m = 8;
        let (a, b) = (id(250, m), id(5, m));
        assert!(in_range(&id(0, m), &a, &b, false, true, m));
        assert!(in_range(&id(5, m), &a, &b, false, true, m));
        assert!(!in_range(&id(6, m), &a, &b, false, true, m));
        assert!(!in_range(&id(250, m), &a, &b, false, true, m));
    }

    #[test]
    fn in_range_degenerate_single_node_ring() {
        let m = 8;
        let a = id(42, m);
        assert!(in_range(&id(0, m), &a, &a, false, false, m));
        assert!(!in_range(&a, &a, &a, false, false, m));
        assert!(in_range(&a, &a, &a, true, false, m));
    }

    #[test]
    fn id_to_hex_digits_pads_and_rejects_overflow() {
        let m = 16;
        let x = id(0xAB, m);
        assert_eq!(id_to_hex_digits(&x, 4).unwrap(), "00ab");
        assert!(id_to_hex_digits(&x, 1).is_err());
    }

    #[test]
    fn shared_prefix_len_counts_matching_hex_chars() {
        assert_eq!(shared_prefix_len("1a2b", "1a3c"), 2);
        assert_eq!(shared_prefix_len("ffff", "0000"), 0);
        assert_eq!(shared_prefix_len("abcd", "abcd"), 4);
    }
}
