//! Lattice-style asymmetric primitive: key generation, scalar encryption and signatures.
//!
//! The construction is a simplified NTRU-like scheme over the moduli of a
//! [`FieldParams`].  A private scalar `f < p` yields the public value
//! `h = H(f) · f⁻¹ mod q`, where `H(f)` is the hash-to-field of the hex text of
//! `f`.  It is not a standardised or audited scheme.
//!
//! Correct decryption needs `seed · p · H(f) + m · f < q`, which holds for the
//! default parameters (`q` has 1279 bits against a 256-bit `p`).  Custom
//! parameters should keep `q` above roughly `p³`.

use crate::codec::Value;
use crate::field::{mask, mod_inverse, random_below, random_bits, ArithmeticError, FieldParams};
use crate::hash::{hash_hex, hash_to_field};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by key generation, decryption and signing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NtruError {
    /// An inversion on the key path failed.
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    /// A supplied private scalar reduced to zero modulo `p`.
    #[error("private scalar reduces to zero")]
    DegenerateScalar,
}

/// A private scalar and its public value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Private scalar `f`, always in `[1, p)`.
    pub private: BigUint,
    /// Public value `h`, in `[0, q)`.
    pub public: BigUint,
}

/// The key scheme bound to one set of field parameters.
#[derive(Debug, Clone)]
pub struct Ntru {
    params: FieldParams,
}

impl Ntru {
    /// Binds the scheme to `params`.
    pub fn new(params: FieldParams) -> Self {
        Self { params }
    }

    /// Parameters this instance operates over.
    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    /// Generates a key pair, optionally from a caller-supplied scalar.
    ///
    /// A supplied scalar is masked to the bit length of `p` and reduced mod
    /// `p`; without one, a scalar is drawn uniformly from `[1, p)`.
    pub fn generate_keys(&self, scalar: Option<&BigUint>) -> Result<KeyPair, NtruError> {
        let p = self.params.p();
        let private = match scalar {
            Some(s) => {
                let f = (s & mask(self.params.p_bits())) % p;
                if f.is_zero() {
                    return Err(NtruError::DegenerateScalar);
                }
                f
            }
            None => random_below(p),
        };
        let public = self.public_key(&private)?;
        Ok(KeyPair { private, public })
    }

    /// Derives `h = H(f mod p) · (f mod p)⁻¹ mod q`.
    pub fn public_key(&self, f: &BigUint) -> Result<BigUint, NtruError> {
        let (p, q) = (self.params.p(), self.params.q());
        let fp = f % p;
        let fh = hash_hex(&fp, p);
        let fq = mod_inverse(&fp, q)?;
        Ok((fh * fq) % q)
    }

    /// Encrypts a scalar `m < p` under `h`; `e = (seed · p · h + m) mod q`.
    ///
    /// A missing or zero seed is replaced by a fresh random value masked to
    /// the bit length of `p`.
    pub fn encrypt(&self, m: &BigUint, h: &BigUint, seed: Option<&BigUint>) -> BigUint {
        let (p, q) = (self.params.p(), self.params.q());
        let bits = self.params.p_bits();
        let mut seed = seed.map(|s| s & mask(bits)).unwrap_or_default();
        while seed.is_zero() {
            seed = random_bits(bits);
        }
        (seed * p * (h % q) + m) % q
    }

    /// Recovers `m mod p` from a ciphertext with the private scalar `f`.
    pub fn decrypt(&self, e: &BigUint, f: &BigUint) -> Result<BigUint, NtruError> {
        let (p, q) = (self.params.p(), self.params.q());
        let f_inv = mod_inverse(f, p)?;
        Ok(((e * f) % q * f_inv) % p)
    }

    /// Signs the canonical form of `message`.
    ///
    /// The signature is `m · f · H(f)⁻¹` with `m` the hash-to-field of the
    /// message.  The factors are already reduced and the product is left
    /// unreduced, since a final reduction mod `p` would break the `(s·h) mod q`
    /// identity the verifier relies on.
    pub fn sign(&self, message: &Value, f: &BigUint) -> Result<BigUint, NtruError> {
        let p = self.params.p();
        let m = hash_to_field(message, p);
        let fh = hash_hex(&(f % p), p);
        let fh_inv = mod_inverse(&fh, p)?;
        Ok(m * f * fh_inv)
    }

    /// Checks a signature; never errors.
    ///
    /// Accepts iff `(s · h) mod q mod p` equals the message hash and `s` is not
    /// congruent to `m · h⁻¹ (mod q)`, the trivial forgery from `h` alone.
    pub fn verify(&self, message: &Value, signature: &BigUint, h: &BigUint) -> bool {
        let (p, q) = (self.params.p(), self.params.q());
        let m = hash_to_field(message, p);
        if (signature * h) % q % p != m {
            return false;
        }
        match mod_inverse(h, q) {
            Ok(h_inv) => (signature % q) != (&m * h_inv) % q,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ntru() -> Ntru {
        Ntru::new(FieldParams::default())
    }

    #[test]
    fn keys_are_deterministic_from_scalar() {
        let scheme = ntru();
        let a = scheme.generate_keys(Some(&BigUint::from(123_456u32))).unwrap();
        let b = scheme.generate_keys(Some(&BigUint::from(123_456u32))).unwrap();
        assert_eq!(a, b);
        assert!(a.private < *scheme.params().p());
        assert!(a.public < *scheme.params().q());
    }

    #[test]
    fn zero_scalar_rejected() {
        let scheme = ntru();
        let p = scheme.params().p().clone();
        assert_eq!(
            scheme.generate_keys(Some(&p)).unwrap_err(),
            NtruError::DegenerateScalar
        );
    }

    #[test]
    fn scalar_roundtrip() {
        let scheme = ntru();
        let keys = scheme.generate_keys(None).unwrap();
        let m = BigUint::from(0xfeed_beefu64);
        let e = scheme.encrypt(&m, &keys.public, None);
        assert_eq!(scheme.decrypt(&e, &keys.private).unwrap(), m);
        let fixed = scheme.encrypt(&m, &keys.public, Some(&BigUint::from(99u8)));
        assert_eq!(fixed, scheme.encrypt(&m, &keys.public, Some(&BigUint::from(99u8))));
    }

    #[test]
    fn sign_and_verify() {
        let scheme = ntru();
        let keys = scheme.generate_keys(None).unwrap();
        let msg = Value::record([("hello", Value::from("world"))]);
        let sig = scheme.sign(&msg, &keys.private).unwrap();
        assert!(scheme.verify(&msg, &sig, &keys.public));
        assert!(!scheme.verify(&Value::from("other"), &sig, &keys.public));
    }

    #[test]
    fn wrong_key_rejected() {
        let scheme = ntru();
        let a = scheme.generate_keys(Some(&BigUint::from(11u8))).unwrap();
        let b = scheme.generate_keys(Some(&BigUint::from(13u8))).unwrap();
        let msg = Value::from("payload");
        let sig = scheme.sign(&msg, &a.private).unwrap();
        assert!(!scheme.verify(&msg, &sig, &b.public));
    }

    #[test]
    fn bit_flips_rejected() {
        let scheme = ntru();
        let keys = scheme.generate_keys(None).unwrap();
        let msg = Value::from(42u64);
        let sig = scheme.sign(&msg, &keys.private).unwrap();
        for bit in [0u64, 1, 17, 128, sig.bits() - 1] {
            let mut forged = sig.clone();
            forged.set_bit(bit, !sig.bit(bit));
            assert!(!scheme.verify(&msg, &forged, &keys.public), "bit {bit}");
        }
    }

    #[test]
    fn trivial_forgery_rejected() {
        let scheme = ntru();
        let keys = scheme.generate_keys(None).unwrap();
        let msg = Value::from("forge me");
        let (p, q) = (scheme.params().p(), scheme.params().q());
        let m = hash_to_field(&msg, p);
        let forged = m * mod_inverse(&keys.public, q).unwrap();
        assert!(!scheme.verify(&msg, &forged, &keys.public));
    }
}
