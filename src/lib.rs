#![deny(missing_docs)]

//! The design philosophy underlying `unity_ledger` is small, explicit and deterministic.
//! Each module isolates one primitive of the token ledger, so that every value the
//! ledger commits to can be recomputed from its inputs by anyone holding the parameters.
//!
//! This crate is an experimental, unaudited construction intended for study; the key
//! scheme is a simplified lattice-style primitive, not standard NTRU.
//! # unity_ledger
//!
//! **unity_ledger** builds a value-token ledger on a small home-grown cryptosystem.
//! Tokens are minted with a face value backed by a verifiable delay function whose
//! step count is that value, and value moves between holders through a hash-linked
//! chain of signed transactions.
//!
//! ## Features
//!
//! * **Modular arithmetic** over [`num_bigint`] integers in the [`field`] module:
//!   extended-Euclid inverse, square-and-multiply exponentiation, masks and
//!   little-endian byte conversions, plus the [`FieldParams`] pair `(p, q)`.
//! * **Canonical codec**: the [`codec`] module encodes a closed set of value kinds
//!   (big integers, non-finite floats, timestamps, patterns, buffers, maps, sets and
//!   records with sorted keys) into a byte-reproducible JSON text and back.
//! * **Hash-to-field**: [`hash_to_field`] digests a canonical encoding with SHA-256
//!   and reduces it into a modulus; it is the crate's only source of verifiable
//!   pseudo-randomness.
//! * **Key scheme**: [`Ntru`] generates keys, encrypts scalars, signs and verifies,
//!   and seals whole values into base64 envelopes (see [`envelope`]).
//! * **Delay and randomness**: [`Vdf`] proves `T` sequential squarings with a
//!   recursive halving proof verified in `O(log T)`; [`VrfProof`] pairs a
//!   deterministic output with a signature over it.
//! * **Ledger**: [`Ledger`] mints and verifies tokens, builds and appends
//!   transactions with fork and overspend checks, and answers depth, balance and
//!   ownership queries.  State changes are published to an optional [`EventBus`].
//!
//! ## Usage
//!
//! ```rust
//! use unity_ledger::{FieldParams, Ledger, TransferConfig};
//!
//! let ledger = Ledger::new(FieldParams::default()).unwrap();
//! let alice = ledger.ntru().generate_keys(None).unwrap();
//! let bob = ledger.ntru().generate_keys(None).unwrap();
//!
//! // Face value 4 means four sequential squarings.
//! let mut token = ledger.mint_token(&alice.public, 4).unwrap();
//! assert!(ledger.verify_token(&token));
//!
//! let config = TransferConfig::spend(alice.public.clone(), bob.public.clone(), 1);
//! let tx = ledger.create_transaction(&token, None, &alice.private, config).unwrap();
//! ledger.append_transaction(&mut token, tx).unwrap();
//! assert_eq!(ledger.spendable_value(&token, &alice.public), 3);
//! assert_eq!(ledger.current_owners(&token), vec![bob.public.clone()]);
//! ```
//!
//! Logging is emitted through `tracing`; call [`init_logging`] once from a binary
//! to see it.

pub mod codec;
pub mod config;
pub mod envelope;
pub mod events;
pub mod field;
pub mod hash;
pub mod ledger;
pub mod logging;
pub mod ntru;
pub mod vdf;
pub mod vrf;

pub use codec::{
    decode, encode, Canonical, CodecError, FileBlob, Pattern, Timestamp, TypedArray, Value,
};
pub use config::{ConfigError, LedgerConfig};
pub use envelope::EnvelopeError;
pub use events::{EventBus, EventHandler, LedgerEvent, LocalEventBus};
pub use field::{mod_inverse, mod_pow, ArithmeticError, Field, FieldParams};
pub use hash::{hash_canonical, hash_to_field, Keystream};
pub use ledger::{
    Ledger, LedgerError, Token, Transaction, TransactionData, TransferConfig, TxId, TxKind,
    ValidationError,
};
pub use logging::{init_logging, LogFormat};
pub use ntru::{KeyPair, Ntru, NtruError};
pub use vdf::{Vdf, VdfError, VdfOutput, VdfRound};
pub use vrf::VrfProof;
