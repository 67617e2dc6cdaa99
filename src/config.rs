//! JSON configuration for a ledger instance.
//!
//! Every field is optional.  Moduli are strings, either decimal or `0x`
//! prefixed hex, so values wider than any JSON number survive intact:
//!
//! ```json
//! { "p": "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffb5",
//!   "q": "0x7fff…ffff",
//!   "vdf_modulus": "1000000007",
//!   "log_level": "debug" }
//! ```
//!
//! Omitted moduli fall back to [`FieldParams::default`]; an omitted VDF
//! modulus means the VDF runs modulo `p`.

use crate::field::{ArithmeticError, FieldParams};
use crate::ledger::Ledger;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or applying a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    /// The file could not be read.
    Io(String),
    #[error("decode error: {0}")]
    /// The file is not a valid configuration document.
    Parse(String),
    #[error("`{field}` is not a decimal or 0x-hex integer: {value}")]
    /// A modulus string did not parse.
    InvalidInteger {
        /// Offending field.
        field: &'static str,
        /// Raw value.
        value: String,
    },
    #[error(transparent)]
    /// The moduli failed validation.
    Params(#[from] ArithmeticError),
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parameters and log level for one ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Signature/encryption modulus.
    #[serde(default)]
    pub p: Option<String>,
    /// Masking modulus.
    #[serde(default)]
    pub q: Option<String>,
    /// Modulus of the minting VDF.
    #[serde(default)]
    pub vdf_modulus: Option<String>,
    /// Default `tracing` filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            p: None,
            q: None,
            vdf_modulus: None,
            log_level: default_log_level(),
        }
    }
}

impl LedgerConfig {
    /// Parses a configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_json_str(&contents)
    }

    /// Validated field parameters, with defaults for omitted moduli.
    pub fn field_params(&self) -> Result<FieldParams, ConfigError> {
        let defaults = FieldParams::default();
        let p = match &self.p {
            Some(raw) => parse_integer("p", raw)?,
            None => defaults.p().clone(),
        };
        let q = match &self.q {
            Some(raw) => parse_integer("q", raw)?,
            None => defaults.q().clone(),
        };
        Ok(FieldParams::new(p, q)?)
    }

    /// The configured VDF modulus, if any.
    pub fn vdf_modulus(&self) -> Result<Option<BigUint>, ConfigError> {
        self.vdf_modulus
            .as_deref()
            .map(|raw| parse_integer("vdf_modulus", raw))
            .transpose()
    }

    /// Builds a ledger from this configuration.
    pub fn build_ledger(&self) -> Result<Ledger, ConfigError> {
        let params = self.field_params()?;
        let ledger = match self.vdf_modulus()? {
            Some(modulus) => Ledger::with_vdf_modulus(params, modulus)?,
            None => Ledger::new(params)?,
        };
        Ok(ledger)
    }
}

fn parse_integer(field: &'static str, raw: &str) -> Result<BigUint, ConfigError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(trimmed.as_bytes(), 10),
    };
    parsed.ok_or_else(|| ConfigError::InvalidInteger {
        field,
        value: raw.to_string(),
    })
}
