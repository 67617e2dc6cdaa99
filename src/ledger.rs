//! The design philosophy underlying `unity_ledger` is small, explicit and deterministic.
//! Each module isolates one primitive of the token ledger, so that every value the
//! ledger commits to can be recomputed from its inputs by anyone holding the parameters.
//!
//! Token and transaction engine.
//!
//! A [`Token`] is minted with a face value backed by a VDF proof whose step
//! count is that value, so larger tokens cost more sequential work.  Value
//! then moves between holders through a hash-linked chain of signed
//! [`Transaction`]s.  Addresses are public values of the key scheme.
//!
//! Identifiers are hash-to-field images (mod `p`) of canonical records:
//! a token over `{pubKey, value, timestamp, proof}` and a transaction over
//! `{tokenId, prevTxId, data}`.  The signature is not part of a transaction
//! identifier, so an id is fixed before signing.
//!
//! Queries fold over the transaction list and never touch cryptography.
//! [`Ledger::append_transaction`] is the only mutating operation and it
//! enforces chain integrity: the new transaction must extend the current tip,
//! carry a valid signature from its sender, and not spend more than the
//! sender holds.

use crate::codec::{Canonical, Value};
use crate::events::{
    EventBus, LedgerEvent, TOKEN_MINTED, TRANSACTION_APPENDED, TRANSACTION_REJECTED,
};
use crate::field::{ArithmeticError, FieldParams};
use crate::hash::hash_canonical;
use crate::ntru::{Ntru, NtruError};
use crate::vdf::{Vdf, VdfError, VdfOutput};
use chrono::Utc;
use num_bigint::{BigInt, BigUint};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Identifier of a transaction.
pub type TxId = BigUint;

/// Malformed transaction input, reported before any cryptography runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A spend carried no amount.
    #[error("spend transaction requires an amount")]
    MissingAmount,
    /// The amount was present but not a non-negative integer.
    #[error("amount must be a non-negative integer")]
    InvalidAmount,
    /// A party field was absent or not an integer.
    #[error("missing or invalid `{0}` address")]
    InvalidAddress(&'static str),
    /// The configuration was not a record or its type was not text.
    #[error("malformed transfer configuration")]
    MalformedConfig,
    /// The token already has transactions, so a predecessor is required.
    #[error("a predecessor is required once the token has transactions")]
    MissingPrevTx,
    /// The predecessor does not belong to the token.
    #[error("predecessor {0:x} not found in token")]
    UnknownPrevTx(BigUint),
}

/// Errors raised by minting, signing and appending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The minting proof could not be produced.
    #[error("vdf: {0}")]
    Vdf(#[from] VdfError),
    /// Signing failed.
    #[error(transparent)]
    Ntru(#[from] NtruError),
    /// The transaction names a different token.
    #[error("transaction belongs to another token")]
    ForeignTransaction,
    /// The predecessor is not the current tip; the chain would fork.
    #[error("transaction does not extend the current chain tip")]
    NotTip,
    /// The signature does not verify against the sender.
    #[error("signature does not verify against the sender")]
    BadSignature,
    /// The sender cannot cover the amount.
    #[error("sender can spend {available}, requested {requested}")]
    InsufficientFunds {
        /// Spendable value before the transaction.
        available: i128,
        /// Amount the transaction moves.
        requested: u64,
    },
}

/// Kind of a transfer.  Only spends move value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TxKind {
    /// Moves `amount` from `from` to `to`.
    Spend,
    /// Any other annotation carried on the chain.
    Other(String),
}

impl TxKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Spend => "spend",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for TxKind {
    fn from(name: String) -> Self {
        if name == "spend" {
            Self::Spend
        } else {
            Self::Other(name)
        }
    }
}

impl From<TxKind> for String {
    fn from(kind: TxKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sender, recipient and amount of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Transfer kind.
    pub kind: TxKind,
    /// Sender's public value.
    pub from: BigUint,
    /// Recipient's public value.
    pub to: BigUint,
    /// Amount moved; required for spends.
    pub amount: Option<u64>,
}

impl TransferConfig {
    /// A spend of `amount` from `from` to `to`.
    pub fn spend(from: BigUint, to: BigUint, amount: u64) -> Self {
        Self {
            kind: TxKind::Spend,
            from,
            to,
            amount: Some(amount),
        }
    }

    /// Reads a configuration from its canonical record form.
    ///
    /// The record has `type` (text, default `"spend"`), `from` and `to`
    /// (integers) and an optional `data.value` integer.  A present amount of
    /// any other kind is rejected rather than ignored.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        if !matches!(value, Value::Record(_)) {
            return Err(ValidationError::MalformedConfig);
        }
        let kind = match value.get("type") {
            None | Some(Value::Null) => TxKind::Spend,
            Some(v) => TxKind::from(
                v.as_text()
                    .ok_or(ValidationError::MalformedConfig)?
                    .to_string(),
            ),
        };
        let from = address(value, "from")?;
        let to = address(value, "to")?;
        let amount = match value.get("data").and_then(|data| data.get("value")) {
            None | Some(Value::Null) => None,
            Some(Value::Integer(n)) => Some(n.to_u64().ok_or(ValidationError::InvalidAmount)?),
            Some(_) => return Err(ValidationError::InvalidAmount),
        };
        Ok(Self {
            kind,
            from,
            to,
            amount,
        })
    }

    fn is_spend(&self) -> bool {
        self.kind == TxKind::Spend
    }

    /// Amount moved by a spend; zero for anything else.
    fn spend_amount(&self) -> u64 {
        if self.is_spend() {
            self.amount.unwrap_or(0)
        } else {
            0
        }
    }
}

fn address(value: &Value, key: &'static str) -> Result<BigUint, ValidationError> {
    value
        .get(key)
        .and_then(Value::as_integer)
        .and_then(BigInt::to_biguint)
        .ok_or(ValidationError::InvalidAddress(key))
}

impl Canonical for TransferConfig {
    fn canonical(&self) -> Value {
        let mut fields = vec![
            ("type", Value::from(self.kind.as_str())),
            ("from", Value::from(&self.from)),
            ("to", Value::from(&self.to)),
        ];
        if let Some(amount) = self.amount {
            fields.push(("data", Value::record([("value", Value::from(amount))])));
        }
        Value::record(fields)
    }
}

/// Signed payload of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    /// Transfer details.
    pub config: TransferConfig,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Canonical for TransactionData {
    fn canonical(&self) -> Value {
        Value::record([
            ("config", self.config.canonical()),
            ("timestamp", Value::Number(self.timestamp as f64)),
        ])
    }
}

/// One link of a token's transaction chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Token the transaction belongs to.
    pub token_id: BigUint,
    /// Predecessor, or `None` for the root.
    pub prev_tx_id: Option<TxId>,
    /// Signed payload.
    pub data: TransactionData,
    /// Sender's signature over the canonical record.
    pub signature: BigUint,
}

impl Canonical for Transaction {
    /// `{tokenId, prevTxId, data}`; this is both the signed message and the
    /// identifying record.
    fn canonical(&self) -> Value {
        Value::record([
            ("tokenId", Value::from(&self.token_id)),
            ("prevTxId", Value::from(self.prev_tx_id.as_ref())),
            ("data", self.data.canonical()),
        ])
    }
}

/// A minted unit of value and its transaction chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Minter's public value.
    pub pub_key: BigUint,
    /// Face value, also the VDF step count.
    pub value: u64,
    /// Mint time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// VDF proof over the minting input.
    pub proof: VdfOutput,
    /// Append-only transaction chain.
    pub transactions: Vec<Transaction>,
}

impl Token {
    /// Most recently appended transaction.
    pub fn tip(&self) -> Option<&Transaction> {
        self.transactions.last()
    }
}

impl Canonical for VdfOutput {
    fn canonical(&self) -> Value {
        let rounds = self
            .proof
            .iter()
            .map(|round| {
                Value::record([("x_k", Value::from(&round.x_k)), ("r", Value::from(&round.r))])
            })
            .collect();
        Value::record([("y", Value::from(&self.y)), ("proof", Value::Array(rounds))])
    }
}

impl Canonical for Token {
    /// Minting fields only; transactions do not change a token's identity.
    fn canonical(&self) -> Value {
        Value::record([
            ("pubKey", Value::from(&self.pub_key)),
            ("value", Value::from(self.value)),
            ("timestamp", Value::Number(self.timestamp as f64)),
            ("proof", self.proof.canonical()),
        ])
    }
}

/// Mints tokens and maintains their transaction chains.
pub struct Ledger {
    ntru: Ntru,
    vdf: Vdf,
    events: Option<Arc<dyn EventBus>>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("params", self.ntru.params())
            .field("vdf_modulus", self.vdf.modulus())
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl Ledger {
    /// Creates a ledger whose VDF runs modulo `p`.
    pub fn new(params: FieldParams) -> Result<Self, ArithmeticError> {
        let modulus = params.p().clone();
        Self::with_vdf_modulus(params, modulus)
    }

    /// Creates a ledger with a separate VDF modulus.
    pub fn with_vdf_modulus(params: FieldParams, modulus: BigUint) -> Result<Self, ArithmeticError> {
        Ok(Self {
            ntru: Ntru::new(params),
            vdf: Vdf::new(modulus)?,
            events: None,
        })
    }

    /// Attaches an observer bus.
    pub fn with_events(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Key scheme used for signatures.
    pub fn ntru(&self) -> &Ntru {
        &self.ntru
    }

    /// Delay function used for minting.
    pub fn vdf(&self) -> &Vdf {
        &self.vdf
    }

    fn publish(&self, name: &str, event: LedgerEvent) {
        if let Some(bus) = &self.events {
            bus.publish(name, &event);
        }
    }

    fn mint_input(pub_key: &BigUint, value: u64, timestamp: i64) -> Value {
        Value::Text(format!("{pub_key:x}{value:x}{timestamp:x}"))
    }

    /// Mints a token stamped with the current time.
    pub fn mint_token(&self, pub_key: &BigUint, value: u64) -> Result<Token, LedgerError> {
        self.mint_token_at(pub_key, value, Utc::now().timestamp_millis())
    }

    /// Mints a token with an explicit timestamp.
    pub fn mint_token_at(
        &self,
        pub_key: &BigUint,
        value: u64,
        timestamp: i64,
    ) -> Result<Token, LedgerError> {
        self.mint(pub_key, value, timestamp, &AtomicBool::new(false))
    }

    /// Mints a token, abandoning the proof when `cancel` is raised.
    pub fn mint_token_cancellable(
        &self,
        pub_key: &BigUint,
        value: u64,
        cancel: &AtomicBool,
    ) -> Result<Token, LedgerError> {
        self.mint(pub_key, value, Utc::now().timestamp_millis(), cancel)
    }

    fn mint(
        &self,
        pub_key: &BigUint,
        value: u64,
        timestamp: i64,
        cancel: &AtomicBool,
    ) -> Result<Token, LedgerError> {
        let input = Self::mint_input(pub_key, value, timestamp);
        let proof = self.vdf.prove_cancellable(&input, value, cancel)?;
        let token = Token {
            pub_key: pub_key.clone(),
            value,
            timestamp,
            proof,
            transactions: Vec::new(),
        };
        let token_id = self.token_id(&token);
        debug!(token = %format!("{token_id:x}"), value, rounds = token.proof.proof.len(), "minted token");
        self.publish(
            TOKEN_MINTED,
            LedgerEvent::TokenMinted {
                token_id,
                pub_key: pub_key.clone(),
                value,
            },
        );
        Ok(token)
    }

    /// Checks a token's minting proof.
    pub fn verify_token(&self, token: &Token) -> bool {
        let input = Self::mint_input(&token.pub_key, token.value, token.timestamp);
        let ok = self
            .vdf
            .verify(&input, token.value, &token.proof.y, &token.proof.proof);
        debug!(value = token.value, ok, "verified token");
        ok
    }

    /// Checks many tokens; independent tokens are verified in parallel.
    pub fn verify_tokens(&self, tokens: &[Token]) -> Vec<bool> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            tokens.par_iter().map(|t| self.verify_token(t)).collect()
        }
        #[cfg(target_arch = "wasm32")]
        {
            tokens.iter().map(|t| self.verify_token(t)).collect()
        }
    }

    /// Identifier of a token.
    pub fn token_id(&self, token: &Token) -> BigUint {
        hash_canonical(token, self.ntru.params().p())
    }

    /// Identifier of a transaction.
    pub fn transaction_id(&self, tx: &Transaction) -> TxId {
        hash_canonical(tx, self.ntru.params().p())
    }

    /// Finds the transaction of `token` with identifier `id`.
    pub fn find_transaction<'a>(&self, token: &'a Token, id: &TxId) -> Option<&'a Transaction> {
        token
            .transactions
            .iter()
            .find(|tx| self.transaction_id(tx) == *id)
    }

    /// Builds and signs a transaction on `token`.
    ///
    /// Validation runs first: a spend needs an amount, `prev` may be omitted
    /// only while the token has no transactions, and a given `prev` must
    /// belong to the token.  The result is not appended.
    pub fn create_transaction(
        &self,
        token: &Token,
        prev: Option<&TxId>,
        private_key: &BigUint,
        config: TransferConfig,
    ) -> Result<Transaction, LedgerError> {
        if config.is_spend() && config.amount.is_none() {
            return Err(ValidationError::MissingAmount.into());
        }
        match prev {
            None if !token.transactions.is_empty() => {
                return Err(ValidationError::MissingPrevTx.into());
            }
            Some(id) if self.find_transaction(token, id).is_none() => {
                return Err(ValidationError::UnknownPrevTx(id.clone()).into());
            }
            _ => {}
        }
        let mut tx = Transaction {
            token_id: self.token_id(token),
            prev_tx_id: prev.cloned(),
            data: TransactionData {
                config,
                timestamp: Utc::now().timestamp_millis(),
            },
            signature: BigUint::default(),
        };
        tx.signature = self.ntru.sign(&tx.canonical(), private_key)?;
        Ok(tx)
    }

    /// Checks a transaction's signature against `public_key`.
    pub fn verify_transaction(&self, tx: &Transaction, public_key: &BigUint) -> bool {
        self.ntru.verify(&tx.canonical(), &tx.signature, public_key)
    }

    /// Appends `tx` to `token` if it extends the current tip.
    ///
    /// This is a compare-and-append: when two transactions are built on the
    /// same predecessor, the first append wins and the second is refused with
    /// [`LedgerError::NotTip`].  Spends above the sender's spendable value are
    /// refused with [`LedgerError::InsufficientFunds`].
    pub fn append_transaction(&self, token: &mut Token, tx: Transaction) -> Result<TxId, LedgerError> {
        let token_id = self.token_id(token);
        match self.check_append(token, &token_id, &tx) {
            Ok(()) => {
                let tx_id = self.transaction_id(&tx);
                debug!(
                    token = %format!("{token_id:x}"),
                    tx = %format!("{tx_id:x}"),
                    kind = %tx.data.config.kind,
                    amount = ?tx.data.config.amount,
                    "appended transaction"
                );
                token.transactions.push(tx);
                self.publish(
                    TRANSACTION_APPENDED,
                    LedgerEvent::TransactionAppended {
                        token_id,
                        tx_id: tx_id.clone(),
                    },
                );
                Ok(tx_id)
            }
            Err(err) => {
                warn!(token = %format!("{token_id:x}"), error = %err, "rejected transaction");
                self.publish(
                    TRANSACTION_REJECTED,
                    LedgerEvent::TransactionRejected {
                        token_id,
                        reason: err.to_string(),
                    },
                );
                Err(err)
            }
        }
    }

    fn check_append(&self, token: &Token, token_id: &BigUint, tx: &Transaction) -> Result<(), LedgerError> {
        let config = &tx.data.config;
        if config.is_spend() && config.amount.is_none() {
            return Err(ValidationError::MissingAmount.into());
        }
        if tx.token_id != *token_id {
            return Err(LedgerError::ForeignTransaction);
        }
        let tip = token.tip().map(|t| self.transaction_id(t));
        if tx.prev_tx_id != tip {
            return Err(LedgerError::NotTip);
        }
        if !self.verify_transaction(tx, &config.from) {
            return Err(LedgerError::BadSignature);
        }
        if config.is_spend() {
            let requested = config.spend_amount();
            let available = self.spendable_value(token, &config.from);
            if i128::from(requested) > available {
                return Err(LedgerError::InsufficientFunds {
                    available,
                    requested,
                });
            }
        }
        Ok(())
    }

    /// Number of predecessor links from `tx_id` back to the root.
    ///
    /// The root has depth `0`, as does an identifier not in the token.  The
    /// walk stops at the first unresolved link and never exceeds the number
    /// of transactions.
    pub fn chain_depth(&self, token: &Token, tx_id: &TxId) -> u64 {
        let index: HashMap<TxId, &Transaction> = token
            .transactions
            .iter()
            .map(|tx| (self.transaction_id(tx), tx))
            .collect();
        let mut depth = 0;
        let mut current = index.get(tx_id);
        while let Some(tx) = current {
            match &tx.prev_tx_id {
                Some(prev) if (depth as usize) < token.transactions.len() => {
                    depth += 1;
                    current = index.get(prev);
                }
                _ => break,
            }
        }
        depth
    }

    /// Sum of spends addressed to `pub_key`.
    pub fn received_value(&self, token: &Token, pub_key: &BigUint) -> u128 {
        token
            .transactions
            .iter()
            .filter(|tx| tx.data.config.to == *pub_key)
            .map(|tx| u128::from(tx.data.config.spend_amount()))
            .sum()
    }

    /// Sum of spends sent by `pub_key`.
    pub fn spent_value(&self, token: &Token, pub_key: &BigUint) -> u128 {
        token
            .transactions
            .iter()
            .filter(|tx| tx.data.config.from == *pub_key)
            .map(|tx| u128::from(tx.data.config.spend_amount()))
            .sum()
    }

    /// Value `pub_key` can still spend.
    ///
    /// The minter's base is the face value and receipts back to the minter
    /// are not counted; every other holder's base is what they received.
    /// Spends are subtracted from the base.  Negative only if an overspend
    /// reached the chain without going through [`Ledger::append_transaction`].
    pub fn spendable_value(&self, token: &Token, pub_key: &BigUint) -> i128 {
        let base = if *pub_key == token.pub_key {
            i128::from(token.value)
        } else {
            self.received_value(token, pub_key) as i128
        };
        base - self.spent_value(token, pub_key) as i128
    }

    /// Recipients that never appear as a sender, in first-seen order.
    ///
    /// Falls back to the minter while no such recipient exists.
    pub fn current_owners(&self, token: &Token) -> Vec<BigUint> {
        let senders: HashSet<&BigUint> = token
            .transactions
            .iter()
            .map(|tx| &tx.data.config.from)
            .collect();
        let mut seen = HashSet::new();
        let owners: Vec<BigUint> = token
            .transactions
            .iter()
            .map(|tx| &tx.data.config.to)
            .filter(|to| !senders.contains(to) && seen.insert(*to))
            .cloned()
            .collect();
        if owners.is_empty() {
            vec![token.pub_key.clone()]
        } else {
            owners
        }
    }
}
