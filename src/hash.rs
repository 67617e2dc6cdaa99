//! The design philosophy underlying `unity_ledger` is small, explicit and deterministic.
//! Each module isolates one primitive of the token ledger, so that every value the
//! ledger commits to can be recomputed from its inputs by anyone holding the parameters.
//!
//! Hash-to-field derivation.
//!
//! Every "random-looking but verifiable" quantity in the crate comes from
//! here: challenges, key material, identifiers and keystreams.  A value is
//! canonically encoded, digested with SHA-256, read as a big-endian integer
//! and reduced into the target modulus.  A zero result is remapped to `1` so
//! the output is always safe as a divisor or exponent base.

use crate::codec::{encode, Canonical, Value};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of the canonical encoding of `value`.
pub fn digest(value: &Value) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(encode(value).as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Maps `value` into `[1, modulus)`.
///
/// # Panics
///
/// Panics if `modulus` is zero.
pub fn hash_to_field(value: &Value, modulus: &BigUint) -> BigUint {
    assert!(!modulus.is_zero(), "modulus must be non-zero");
    let reduced = BigUint::from_bytes_be(&digest(value)) % modulus;
    if reduced.is_zero() {
        BigUint::from(1u8)
    } else {
        reduced
    }
}

/// Convenience wrapper hashing any [`Canonical`] type.
pub fn hash_canonical<T: Canonical + ?Sized>(item: &T, modulus: &BigUint) -> BigUint {
    hash_to_field(&item.canonical(), modulus)
}

/// Hashes the lowercase hex text of an integer, the form used for scalar-derived material.
pub fn hash_hex(n: &BigUint, modulus: &BigUint) -> BigUint {
    hash_to_field(&Value::Text(n.to_str_radix(16)), modulus)
}

/// A deterministic byte stream derived from a seed by hashing it forward.
///
/// Byte `i` is the low byte of `hash_hex(seed + i, modulus)`.  Sealing and
/// opening an envelope run the same stream, so XOR-masking with it is its
/// own inverse.
#[derive(Debug, Clone)]
pub struct Keystream {
    seed: BigUint,
    modulus: BigUint,
    counter: u64,
}

impl Keystream {
    /// Creates a stream positioned at byte zero.
    pub fn new(seed: BigUint, modulus: BigUint) -> Self {
        Self {
            seed,
            modulus,
            counter: 0,
        }
    }

    /// Returns the next mask byte.
    pub fn next_byte(&mut self) -> u8 {
        let position = &self.seed + BigUint::from(self.counter);
        let word = hash_hex(&position, &self.modulus) & BigUint::from(0xffu8);
        self.counter = self.counter.wrapping_add(1);
        word.to_u8().unwrap_or_default()
    }

    /// XORs `buf` in place with the stream.
    pub fn apply(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte ^= self.next_byte();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldParams;

    #[test]
    fn hash_is_deterministic() {
        let p = FieldParams::default().p().clone();
        let a = Value::record([("x", Value::from(1u64)), ("y", Value::from("z"))]);
        let b = Value::record([("y", Value::from("z")), ("x", Value::from(1u64))]);
        assert_eq!(hash_to_field(&a, &p), hash_to_field(&b, &p));
        assert_ne!(hash_to_field(&a, &p), hash_to_field(&Value::from("other"), &p));
    }

    #[test]
    fn hash_known_digest() {
        // SHA-256 of the two bytes `""` (an encoded empty string).
        assert_eq!(
            digest(&Value::from("")),
            [
                0x12, 0xae, 0x32, 0xcb, 0x1e, 0xc0, 0x2d, 0x01,
                0xed, 0xa3, 0x58, 0x1b, 0x12, 0x7c, 0x1f, 0xee,
                0x3b, 0x0d, 0xc5, 0x35, 0x72, 0xed, 0x6b, 0xaf,
                0x23, 0x97, 0x21, 0xa0, 0x3d, 0x82, 0xe1, 0x26,
            ]
        );
    }

    #[test]
    fn hash_never_zero() {
        let one = BigUint::from(1u8);
        assert_eq!(hash_to_field(&Value::Null, &one), one);
        let small = BigUint::from(2u8);
        for i in 0..32u64 {
            assert_eq!(hash_to_field(&Value::from(i), &small), one);
        }
    }

    #[test]
    fn keystream_is_involution() {
        let p = FieldParams::default().p().clone();
        let mut data = b"attack at dawn".to_vec();
        Keystream::new(BigUint::from(77u8), p.clone()).apply(&mut data);
        assert_ne!(&data, b"attack at dawn");
        Keystream::new(BigUint::from(77u8), p).apply(&mut data);
        assert_eq!(&data, b"attack at dawn");
    }
}
