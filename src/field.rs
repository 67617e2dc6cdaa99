//! The design philosophy underlying `unity_ledger` is small, explicit and deterministic.
//! Each module isolates one primitive of the token ledger, so that every value the
//! ledger commits to can be recomputed from its inputs by anyone holding the parameters.
//!
//! Big-integer modular arithmetic.
//!
//! This module provides the numeric toolkit shared by every other component:
//! the extended-Euclid inverse, square-and-multiply exponentiation, bit masks,
//! and little-endian conversions between integers and byte strings.  The
//! [`Field`](struct.Field.html) type wraps a single modulus and exposes the
//! reduced operations the VDF needs, while [`FieldParams`] carries the pair of
//! moduli `(p, q)` used by the key scheme.

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the numeric toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    /// `a` has no inverse modulo `m` because the two share a factor.
    #[error("{a} is not invertible modulo {m}")]
    NotInvertible {
        /// Operand that was inverted.
        a: BigUint,
        /// Modulus of the inversion.
        m: BigUint,
    },
    /// The modulus of an operation was zero.
    #[error("modulus must be non-zero")]
    ZeroModulus,
    /// Field parameters failed validation.
    #[error("invalid field parameters: {0}")]
    InvalidParams(&'static str),
}

/// Returns `x` with `a·x ≡ 1 (mod m)`.
///
/// Runs the extended Euclidean algorithm over signed integers and reports
/// [`ArithmeticError::NotInvertible`] when `gcd(a, m) ≠ 1`.  The modulus `1`
/// is special-cased: every value is congruent to `0`, which is returned.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, ArithmeticError> {
    if m.is_zero() {
        return Err(ArithmeticError::ZeroModulus);
    }
    if m.is_one() {
        return Ok(BigUint::zero());
    }
    let modulus = BigInt::from_biguint(Sign::Plus, m.clone());
    let mut old_r = BigInt::from_biguint(Sign::Plus, a % m);
    let mut r = modulus.clone();
    let mut old_s = BigInt::one();
    let mut s = BigInt::zero();
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);
    }
    if !old_r.is_one() {
        return Err(ArithmeticError::NotInvertible {
            a: a.clone(),
            m: m.clone(),
        });
    }
    let mut inverse = old_s % &modulus;
    if inverse.sign() == Sign::Minus {
        inverse += &modulus;
    }
    // `inverse` is non-negative here.
    Ok(inverse.to_biguint().unwrap_or_default())
}

/// Computes `base^exponent mod modulus` by square-and-multiply.
///
/// `mod_pow(x, 0, m)` is `1` for every `m > 1` and `0` for `m = 1`.
///
/// # Panics
///
/// Panics if `modulus` is zero.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    assert!(!modulus.is_zero(), "modulus must be non-zero");
    let mut result = BigUint::one() % modulus;
    let mut acc = base % modulus;
    let bits = exponent.bits();
    for i in 0..bits {
        if exponent.bit(i) {
            result = (&result * &acc) % modulus;
        }
        if i + 1 < bits {
            acc = (&acc * &acc) % modulus;
        }
    }
    result
}

/// Number of significant bits in `n` (`0` for zero).
#[inline]
pub fn bit_length(n: &BigUint) -> u64 {
    n.bits()
}

/// Returns `2^bits − 1`.
#[inline]
pub fn mask(bits: u64) -> BigUint {
    (BigUint::one() << bits) - BigUint::one()
}

/// Little-endian bytes of `n`; zero maps to the empty slice.
pub fn to_bytes_le(n: &BigUint) -> Vec<u8> {
    if n.is_zero() {
        return Vec::new();
    }
    n.to_bytes_le()
}

/// Reads a little-endian byte string as a non-negative integer.
#[inline]
pub fn from_bytes_le(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_le(bytes)
}

/// Interprets the UTF-8 bytes of `text` as a little-endian integer.
pub fn text_to_integer(text: &str) -> BigUint {
    from_bytes_le(text.as_bytes())
}

/// Draws a uniformly random integer of at most `bits` bits from the OS-seeded thread RNG.
pub fn random_bits(bits: u64) -> BigUint {
    let len = ((bits + 7) / 8) as usize;
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    from_bytes_le(&buf) & mask(bits)
}

/// Draws a random integer in `[1, bound)` by rejection over `bit_length(bound)` bits.
///
/// # Panics
///
/// Panics if `bound < 2`.
pub fn random_below(bound: &BigUint) -> BigUint {
    assert!(*bound > BigUint::one(), "bound must exceed one");
    let bits = bit_length(bound);
    loop {
        let candidate = random_bits(bits);
        if !candidate.is_zero() && candidate < *bound {
            return candidate;
        }
    }
}

/// Arithmetic modulo a single big-integer modulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    modulus: BigUint,
}

impl Field {
    /// Creates a field over `modulus`.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::InvalidParams`] if the modulus is below `2`.
    pub fn new(modulus: BigUint) -> Result<Self, ArithmeticError> {
        if modulus < BigUint::from(2u8) {
            return Err(ArithmeticError::InvalidParams("modulus must be at least 2"));
        }
        Ok(Self { modulus })
    }

    /// Returns the modulus.
    #[inline]
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Multiplies two elements.
    #[inline]
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }

    /// Squares an element.
    #[inline]
    pub fn square(&self, a: &BigUint) -> BigUint {
        (a * a) % &self.modulus
    }

    /// Exponentiates `a` by `e`.
    #[inline]
    pub fn pow(&self, a: &BigUint, e: &BigUint) -> BigUint {
        mod_pow(a, e, &self.modulus)
    }

    /// Multiplicative inverse of `a`.
    pub fn inv(&self, a: &BigUint) -> Result<BigUint, ArithmeticError> {
        mod_inverse(a, &self.modulus)
    }
}

/// The pair of moduli shared by every operation of one ledger instance.
///
/// `p` is the signature/encryption modulus; `q` is the much larger masking
/// modulus.  Both are fixed at construction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldParams {
    p: BigUint,
    q: BigUint,
}

impl FieldParams {
    /// Validates and wraps a `(p, q)` pair.
    ///
    /// # Errors
    ///
    /// Fails when `p < 3` or `q ≤ p`.
    pub fn new(p: BigUint, q: BigUint) -> Result<Self, ArithmeticError> {
        if p < BigUint::from(3u8) {
            return Err(ArithmeticError::InvalidParams("p must be at least 3"));
        }
        if q <= p {
            return Err(ArithmeticError::InvalidParams("q must exceed p"));
        }
        Ok(Self { p, q })
    }

    /// Signature/encryption modulus.
    #[inline]
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// Masking modulus.
    #[inline]
    pub fn q(&self) -> &BigUint {
        &self.q
    }

    /// Bit length of `p`, the width private scalars are masked to.
    #[inline]
    pub fn p_bits(&self) -> u64 {
        bit_length(&self.p)
    }
}

impl Default for FieldParams {
    /// `p = 2^256 − 587`, `q = 2^1279 − 1`.
    fn default() -> Self {
        let p = (BigUint::one() << 256u32) - BigUint::from(587u32);
        let q = (BigUint::one() << 1279u32) - BigUint::one();
        Self { p, q }
    }
}
