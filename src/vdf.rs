//! Recursive halving verifiable delay function.
//!
//! The prover shows that a chain of modular squarings of length `T` was
//! performed.  Each level maps its input into the field with
//! [`hash_to_field`], and then:
//!
//! * at `T = 1` the output is `x² mod N` and the level adds no proof round;
//! * at odd `T > 1` both sides square once and continue at `T − 1`, again
//!   without a proof round;
//! * at even `T = 2k` the prover computes `x_k = x^{2^k}` by `k` sequential
//!   squarings, derives `r = H("x:x_k:T")`, and recurses on
//!   `x_k · x^r mod N` with `k` steps, recording `(x_k, r)`.
//!
//! Round `i + 1` depends on the challenge of round `i`, so proving cannot be
//! parallelised across levels.  The verifier replays the levels from the
//! recorded rounds with one short exponentiation each, giving `O(log T)`
//! verification against `O(T)` proving.

use crate::codec::Value;
use crate::field::{ArithmeticError, Field};
use crate::hash::hash_to_field;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::trace;

/// Squarings performed between two polls of the cancellation flag.
const CANCEL_POLL_INTERVAL: u64 = 1 << 10;

/// Errors reported by the prover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VdfError {
    /// `T = 0` has no defined output.
    #[error("step count must be at least one")]
    ZeroSteps,
    /// The caller raised the cancellation flag.
    #[error("proof computation cancelled")]
    Cancelled,
}

/// One halving round of the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdfRound {
    /// Midpoint `x^{2^k} mod N` of the level.
    pub x_k: BigUint,
    /// Challenge bound to `(x, x_k, T)`.
    pub r: BigUint,
}

/// Output of the prover: the final value and the halving rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdfOutput {
    /// Final squared value.
    pub y: BigUint,
    /// Rounds, outermost first.
    pub proof: Vec<VdfRound>,
}

/// Prover and verifier over a fixed modulus `N`.
#[derive(Debug, Clone)]
pub struct Vdf {
    field: Field,
}

impl Vdf {
    /// Creates an instance over `modulus`.
    pub fn new(modulus: BigUint) -> Result<Self, ArithmeticError> {
        Ok(Self {
            field: Field::new(modulus)?,
        })
    }

    /// Modulus `N`.
    pub fn modulus(&self) -> &BigUint {
        self.field.modulus()
    }

    /// Proves `steps` sequential squarings seeded by `message`.
    pub fn prove(&self, message: &Value, steps: u64) -> Result<VdfOutput, VdfError> {
        self.prove_cancellable(message, steps, &AtomicBool::new(false))
    }

    /// As [`Vdf::prove`], polling `cancel` while squaring.
    pub fn prove_cancellable(
        &self,
        message: &Value,
        steps: u64,
        cancel: &AtomicBool,
    ) -> Result<VdfOutput, VdfError> {
        if steps == 0 {
            return Err(VdfError::ZeroSteps);
        }
        let n = self.field.modulus();
        let mut current = message.clone();
        let mut t = steps;
        let mut proof = Vec::new();
        loop {
            let x = hash_to_field(&current, n);
            if t == 1 {
                trace!(steps, rounds = proof.len(), "vdf proof complete");
                return Ok(VdfOutput {
                    y: self.field.square(&x),
                    proof,
                });
            }
            if t % 2 == 1 {
                current = Value::from(self.field.square(&x));
                t -= 1;
                continue;
            }
            let k = t / 2;
            let x_k = self.square_chain(&x, k, cancel)?;
            let r = self.challenge(&x, &x_k, t);
            let next = self.field.mul(&x_k, &self.field.pow(&x, &r));
            proof.push(VdfRound { x_k, r });
            current = Value::from(next);
            t = k;
        }
    }

    /// Checks a claimed output and proof; never errors.
    ///
    /// Rejects a mismatched challenge, an unreduced midpoint, a missing round,
    /// or rounds left over once the base level is reached.
    pub fn verify(&self, message: &Value, steps: u64, y: &BigUint, proof: &[VdfRound]) -> bool {
        if steps == 0 {
            return false;
        }
        let n = self.field.modulus();
        let mut rounds = proof.iter();
        let mut current = message.clone();
        let mut t = steps;
        loop {
            let x = hash_to_field(&current, n);
            if t == 1 {
                return rounds.next().is_none() && self.field.square(&x) == *y;
            }
            if t % 2 == 1 {
                current = Value::from(self.field.square(&x));
                t -= 1;
                continue;
            }
            let Some(round) = rounds.next() else {
                return false;
            };
            if round.x_k >= *n || round.r != self.challenge(&x, &round.x_k, t) {
                return false;
            }
            let next = self.field.mul(&round.x_k, &self.field.pow(&x, &round.r));
            current = Value::from(next);
            t /= 2;
        }
    }

    fn challenge(&self, x: &BigUint, x_k: &BigUint, t: u64) -> BigUint {
        hash_to_field(&Value::Text(format!("{x}:{x_k}:{t}")), self.field.modulus())
    }

    fn square_chain(&self, x: &BigUint, k: u64, cancel: &AtomicBool) -> Result<BigUint, VdfError> {
        let mut acc = x.clone();
        for i in 0..k {
            if i % CANCEL_POLL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return Err(VdfError::Cancelled);
            }
            acc = self.field.square(&acc);
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::mod_pow;
    use crate::field::FieldParams;

    fn vdf() -> Vdf {
        Vdf::new(FieldParams::default().p().clone()).unwrap()
    }

    #[test]
    fn base_case() {
        let vdf = vdf();
        let msg = Value::from("seed");
        let out = vdf.prove(&msg, 1).unwrap();
        assert!(out.proof.is_empty());
        let x = hash_to_field(&msg, vdf.modulus());
        assert_eq!(out.y, (&x * &x) % vdf.modulus());
        assert!(vdf.verify(&msg, 1, &out.y, &out.proof));
    }

    #[test]
    fn powers_of_two() {
        let vdf = vdf();
        let msg = Value::from("token");
        for exp in 0..8u32 {
            let t = 1u64 << exp;
            let out = vdf.prove(&msg, t).unwrap();
            assert_eq!(out.proof.len(), exp as usize);
            assert!(vdf.verify(&msg, t, &out.y, &out.proof), "T = {t}");
        }
    }

    #[test]
    fn first_midpoint_is_repeated_square() {
        let vdf = vdf();
        let msg = Value::from("mid");
        let out = vdf.prove(&msg, 16).unwrap();
        let x = hash_to_field(&msg, vdf.modulus());
        let expected = mod_pow(&x, &BigUint::from(1u64 << 8), vdf.modulus());
        assert_eq!(out.proof[0].x_k, expected);
    }

    #[test]
    fn odd_steps() {
        let vdf = vdf();
        let msg = Value::from("odd");
        for t in [3u64, 5, 7, 12, 100] {
            let out = vdf.prove(&msg, t).unwrap();
            assert!(vdf.verify(&msg, t, &out.y, &out.proof), "T = {t}");
            assert!(!vdf.verify(&msg, t + 1, &out.y, &out.proof));
        }
    }

    #[test]
    fn zero_steps() {
        let vdf = vdf();
        assert_eq!(vdf.prove(&Value::Null, 0).unwrap_err(), VdfError::ZeroSteps);
        assert!(!vdf.verify(&Value::Null, 0, &BigUint::from(1u8), &[]));
    }

    #[test]
    fn tampering_rejected() {
        let vdf = vdf();
        let msg = Value::from("tamper");
        let out = vdf.prove(&msg, 32).unwrap();
        let one = BigUint::from(1u8);

        assert!(!vdf.verify(&msg, 32, &(&out.y + &one), &out.proof));
        for i in 0..out.proof.len() {
            let mut bad = out.proof.clone();
            bad[i].x_k = (&bad[i].x_k + &one) % vdf.modulus();
            assert!(!vdf.verify(&msg, 32, &out.y, &bad), "x_k {i}");
            let mut bad = out.proof.clone();
            bad[i].r += &one;
            assert!(!vdf.verify(&msg, 32, &out.y, &bad), "r {i}");
        }
        let truncated = &out.proof[..out.proof.len() - 1];
        assert!(!vdf.verify(&msg, 32, &out.y, truncated));
        let mut extended = out.proof.clone();
        extended.push(out.proof[0].clone());
        assert!(!vdf.verify(&msg, 32, &out.y, &extended));
        assert!(!vdf.verify(&Value::from("other"), 32, &out.y, &out.proof));
    }

    #[test]
    fn cancellation() {
        let vdf = vdf();
        let cancel = AtomicBool::new(true);
        assert_eq!(
            vdf.prove_cancellable(&Value::Null, 4096, &cancel).unwrap_err(),
            VdfError::Cancelled
        );
    }
}
