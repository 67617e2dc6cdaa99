//! Verifiable random function built from the signature scheme.
//!
//! The output of a message is its hash-to-field image under `p`; the proof is
//! a signature over that output.  Anyone holding the public value can check
//! that the output belongs to the message and that the key holder vouched
//! for it.

use crate::codec::Value;
use crate::hash::hash_to_field;
use crate::ntru::{Ntru, NtruError};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Output of one evaluation together with its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfProof {
    /// Pseudo-random output in `[1, p)`.
    pub output: BigUint,
    /// Signature over `output`.
    pub proof: BigUint,
}

impl Ntru {
    /// Evaluates the VRF on `message` under private scalar `f`.
    pub fn vrf_evaluate(&self, message: &Value, f: &BigUint) -> Result<VrfProof, NtruError> {
        let output = hash_to_field(message, self.params().p());
        let proof = self.sign(&Value::from(&output), f)?;
        Ok(VrfProof { output, proof })
    }

    /// Checks that `result` is the output of `message` vouched for by `h`.
    pub fn vrf_verify(&self, message: &Value, result: &VrfProof, h: &BigUint) -> bool {
        if hash_to_field(message, self.params().p()) != result.output {
            return false;
        }
        self.verify(&Value::from(&result.output), &result.proof, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldParams;

    #[test]
    fn evaluate_and_verify() {
        let scheme = Ntru::new(FieldParams::default());
        let keys = scheme.generate_keys(None).unwrap();
        let msg = Value::from("round 7");
        let result = scheme.vrf_evaluate(&msg, &keys.private).unwrap();
        assert!(scheme.vrf_verify(&msg, &result, &keys.public));
        // Output is a function of the message only.
        let again = scheme.vrf_evaluate(&msg, &keys.private).unwrap();
        assert_eq!(result.output, again.output);
    }

    #[test]
    fn rejects_other_message_and_key() {
        let scheme = Ntru::new(FieldParams::default());
        let keys = scheme.generate_keys(None).unwrap();
        let other = scheme.generate_keys(None).unwrap();
        let msg = Value::from("round 7");
        let result = scheme.vrf_evaluate(&msg, &keys.private).unwrap();
        assert!(!scheme.vrf_verify(&Value::from("round 8"), &result, &keys.public));
        assert!(!scheme.vrf_verify(&msg, &result, &other.public));

        let mut forged = result.clone();
        forged.output += 1u8;
        assert!(!scheme.vrf_verify(&msg, &forged, &keys.public));
    }
}
