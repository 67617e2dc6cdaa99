//! Hybrid envelopes: a scalar-encrypted session seed plus a keystream-masked payload.
//!
//! `seal` draws a session seed below `p`, derives `ivn = H(hex(seed))`,
//! encrypts the seed under the recipient's public value with `ivn` as the
//! randomiser, and XOR-masks the canonical payload with the
//! [`Keystream`](crate::hash::Keystream) seeded by `ivn`.  The wire form is
//!
//! ```text
//! base64( base64(le_bytes(e)) ":" base64(masked_payload) )
//! ```
//!
//! `open` reverses each step.  The password variants derive the key pair
//! from the canonical encoding of the password, so the same password always
//! opens what it sealed.

use crate::codec::{decode, encode, CodecError, Value};
use crate::field::{from_bytes_le, mask, random_below, text_to_integer, to_bytes_le};
use crate::hash::{hash_hex, Keystream};
use crate::ntru::{KeyPair, Ntru, NtruError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use num_bigint::BigUint;
use num_traits::Zero;
use thiserror::Error;

/// Errors reported while sealing or opening an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Outer or inner base64 failed to decode.
    #[error("invalid base64: {0}")]
    Base64(String),
    /// The unwrapped envelope had no `:` separator.
    #[error("envelope is missing its separator")]
    MissingSeparator,
    /// The unwrapped payload was not UTF-8.
    #[error("payload is not valid UTF-8")]
    Utf8,
    /// The unmasked payload failed canonical decoding.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Key derivation or seed decryption failed.
    #[error(transparent)]
    Ntru(#[from] NtruError),
}

fn b64_decode(input: &str) -> Result<Vec<u8>, EnvelopeError> {
    BASE64
        .decode(input)
        .map_err(|err| EnvelopeError::Base64(err.to_string()))
}

impl Ntru {
    /// Seals `payload` for the holder of the private scalar behind `h`.
    ///
    /// A supplied seed is reduced below `p`; a missing or zero seed is drawn
    /// at random.
    pub fn seal(&self, payload: &Value, h: &BigUint, seed: Option<&BigUint>) -> String {
        let p = self.params().p();
        let mut seed = seed.map(|s| s % p).unwrap_or_default();
        if seed.is_zero() {
            seed = random_below(p);
        }
        let ivn = hash_hex(&seed, p);
        let e = self.encrypt(&seed, h, Some(&ivn));
        let mut body = encode(payload).into_bytes();
        Keystream::new(ivn, p.clone()).apply(&mut body);
        let inner = format!(
            "{}:{}",
            BASE64.encode(to_bytes_le(&e)),
            BASE64.encode(&body)
        );
        BASE64.encode(inner)
    }

    /// Opens an envelope with the private scalar `f`.
    pub fn open(&self, envelope: &str, f: &BigUint) -> Result<Value, EnvelopeError> {
        let p = self.params().p();
        let inner = String::from_utf8(b64_decode(envelope.trim())?)
            .map_err(|_| EnvelopeError::Utf8)?;
        let (cipher, masked) = inner
            .split_once(':')
            .ok_or(EnvelopeError::MissingSeparator)?;
        let e = from_bytes_le(&b64_decode(cipher)?);
        let seed = self.decrypt(&e, f)? & mask(self.params().p_bits());
        let ivn = hash_hex(&seed, p);
        let mut body = b64_decode(masked)?;
        Keystream::new(ivn, p.clone()).apply(&mut body);
        let text = String::from_utf8(body).map_err(|_| EnvelopeError::Utf8)?;
        Ok(decode(&text)?)
    }

    /// Derives the key pair bound to `password`.
    pub fn password_keys(&self, password: &Value) -> Result<KeyPair, NtruError> {
        self.generate_keys(Some(&text_to_integer(&encode(password))))
    }

    /// Seals `payload` under a password-derived key.
    pub fn seal_with_password(
        &self,
        payload: &Value,
        password: &Value,
        seed: Option<&BigUint>,
    ) -> Result<String, EnvelopeError> {
        let keys = self.password_keys(password)?;
        Ok(self.seal(payload, &keys.public, seed))
    }

    /// Opens an envelope sealed with [`Ntru::seal_with_password`].
    pub fn open_with_password(
        &self,
        envelope: &str,
        password: &Value,
    ) -> Result<Value, EnvelopeError> {
        let keys = self.password_keys(password)?;
        self.open(envelope, &keys.private)
    }
}
