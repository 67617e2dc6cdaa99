//! Deterministic, type-tagged serialization of structured values.
//!
//! The codec turns a [`Value`] into a JSON text that is byte-for-byte
//! reproducible, so that identical logical values always hash identically.
//! The wire shape nests encodings: every child of an array, record, map or
//! set is first encoded to its own JSON text, and that text is embedded in
//! the parent as a JSON string.  Non-primitive kinds are wrapped as
//! `{"type": <tag>, "value": <payload>}`.  Because a record field is always a
//! nested JSON text while a tag is a bare identifier, the `type`
//! discriminant can never be confused with an ordinary record field.
//!
//! Keys of records and maps are emitted in sorted order and set members are
//! deduplicated and ordered by their encodings, so the output depends only on
//! the canonical form of a value and never on construction order.  Decoding
//! is exhaustive over the known tags and fails closed on anything else.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::{BigInt, BigUint};
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

const TAG_BIGINT: &str = "BigInt";
const TAG_NAN: &str = "NaN";
const TAG_INFINITY: &str = "Infinity";
const TAG_NEG_INFINITY: &str = "-Infinity";
const TAG_DATE: &str = "Date";
const TAG_REGEXP: &str = "RegExp";
const TAG_MAP: &str = "Map";
const TAG_SET: &str = "Set";
const TAG_ARRAY_BUFFER: &str = "ArrayBuffer";
const TAG_SHARED_BUFFER: &str = "SharedArrayBuffer";
const TAG_FILE: &str = "File/Blob";

const PATTERN_FLAGS: &str = "dgimsuvy";
/// Largest magnitude below which integral floats are emitted without a fraction.
const SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Errors produced while decoding canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The input was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// A tagged value carried a discriminant outside the supported set.
    #[error("unsupported value tag: {0}")]
    UnsupportedTag(String),
    /// A tagged value carried a payload of the wrong shape.
    #[error("malformed {tag} payload: {reason}")]
    InvalidPayload {
        /// Tag whose payload was rejected.
        tag: String,
        /// Reason for the rejection.
        reason: String,
    },
    /// A container child was not embedded as a nested JSON text.
    #[error("container child is not an encoded string")]
    NonStringChild,
    /// A base64 body failed to decode.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    /// A pattern carried a flag outside the supported set, or a repeated flag.
    #[error("invalid pattern flags: {0:?}")]
    InvalidPatternFlags(String),
    /// A timestamp fell outside the four-digit-year range of the wire format.
    #[error("timestamp {0} ms is outside years 0001..=9999")]
    TimestampOutOfRange(i64),
}

impl CodecError {
    fn payload(tag: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

/// A regular-expression literal kept as its source and flags.
///
/// Flags are validated on construction, so the literal `/source/flags`
/// always splits back into the same pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    flags: String,
}

impl Pattern {
    /// Creates a pattern literal.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidPatternFlags`] if a flag is not one of
    /// `dgimsuvy` or appears twice.
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Result<Self, CodecError> {
        let flags = flags.into();
        let mut seen = String::new();
        for c in flags.chars() {
            if !PATTERN_FLAGS.contains(c) || seen.contains(c) {
                return Err(CodecError::InvalidPatternFlags(flags));
            }
            seen.push(c);
        }
        Ok(Self {
            source: source.into(),
            flags,
        })
    }

    /// Pattern body between the slashes.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Flag characters following the closing slash.
    pub fn flags(&self) -> &str {
        &self.flags
    }

    fn literal(&self) -> String {
        format!("/{}/{}", self.source, self.flags)
    }

    fn parse(literal: &str) -> Result<Self, CodecError> {
        let body = literal
            .strip_prefix('/')
            .ok_or_else(|| CodecError::payload(TAG_REGEXP, "missing leading slash"))?;
        let split = body
            .rfind('/')
            .ok_or_else(|| CodecError::payload(TAG_REGEXP, "missing closing slash"))?;
        Self::new(&body[..split], &body[split + 1..])
    }
}

/// Milliseconds since the Unix epoch, UTC, within years `0001..=9999`.
///
/// The range is what a four-digit RFC 3339 date can express, so every
/// timestamp has exactly one wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    /// `0001-01-01T00:00:00.000Z`.
    pub const MIN_MILLIS: i64 = -62_135_596_800_000;
    /// `9999-12-31T23:59:59.999Z`.
    pub const MAX_MILLIS: i64 = 253_402_300_799_999;

    /// Checks `ms` against the representable range.
    pub fn from_millis(ms: i64) -> Result<Self, CodecError> {
        if (Self::MIN_MILLIS..=Self::MAX_MILLIS).contains(&ms) {
            Ok(Self(ms))
        } else {
            Err(CodecError::TimestampOutOfRange(ms))
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis(self) -> i64 {
        self.0
    }

    fn to_rfc3339(self) -> String {
        // In range by construction, so the default is never taken.
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Fixed-width element buffers, keyed by their element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedArray {
    /// Unsigned bytes.
    Uint8(Vec<u8>),
    /// Unsigned bytes with clamping semantics.
    Uint8Clamped(Vec<u8>),
    /// Signed bytes.
    Int8(Vec<i8>),
    /// Unsigned 16-bit words.
    Uint16(Vec<u16>),
    /// Signed 16-bit words.
    Int16(Vec<i16>),
    /// Unsigned 32-bit words.
    Uint32(Vec<u32>),
    /// Signed 32-bit words.
    Int32(Vec<i32>),
}

impl TypedArray {
    const TAGS: [&'static str; 7] = [
        "Uint8Array",
        "Uint8ClampedArray",
        "Int8Array",
        "Uint16Array",
        "Int16Array",
        "Uint32Array",
        "Int32Array",
    ];

    /// Wire tag of this buffer kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Uint8(_) => Self::TAGS[0],
            Self::Uint8Clamped(_) => Self::TAGS[1],
            Self::Int8(_) => Self::TAGS[2],
            Self::Uint16(_) => Self::TAGS[3],
            Self::Int16(_) => Self::TAGS[4],
            Self::Uint32(_) => Self::TAGS[5],
            Self::Int32(_) => Self::TAGS[6],
        }
    }

    fn elements(&self) -> Vec<Json> {
        fn collect<T: Copy + Into<i64>>(items: &[T]) -> Vec<Json> {
            items.iter().map(|&v| Json::from(Into::<i64>::into(v))).collect()
        }
        match self {
            Self::Uint8(v) | Self::Uint8Clamped(v) => collect(v),
            Self::Int8(v) => collect(v),
            Self::Uint16(v) => collect(v),
            Self::Int16(v) => collect(v),
            Self::Uint32(v) => collect(v),
            Self::Int32(v) => collect(v),
        }
    }

    fn from_elements(tag: &str, items: &[Json]) -> Result<Self, CodecError> {
        fn narrow<T: TryFrom<i64>>(tag: &str, items: &[Json]) -> Result<Vec<T>, CodecError> {
            items
                .iter()
                .map(|item| {
                    item.as_i64()
                        .and_then(|v| T::try_from(v).ok())
                        .ok_or_else(|| CodecError::payload(tag, "element out of range"))
                })
                .collect()
        }
        Ok(match tag {
            "Uint8Array" => Self::Uint8(narrow(tag, items)?),
            "Uint8ClampedArray" => Self::Uint8Clamped(narrow(tag, items)?),
            "Int8Array" => Self::Int8(narrow(tag, items)?),
            "Uint16Array" => Self::Uint16(narrow(tag, items)?),
            "Int16Array" => Self::Int16(narrow(tag, items)?),
            "Uint32Array" => Self::Uint32(narrow(tag, items)?),
            "Int32Array" => Self::Int32(narrow(tag, items)?),
            other => return Err(CodecError::UnsupportedTag(other.to_string())),
        })
    }
}

/// A named binary payload with a MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    /// File name.
    pub name: String,
    /// MIME type of the body.
    pub mime: String,
    /// Raw body.
    pub bytes: Vec<u8>,
}

impl FileBlob {
    fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }
}

/// The closed set of value kinds the codec understands.
///
/// Non-finite floats have their own variants so that structural equality
/// holds after a round trip; build floats through `Value::from(f64)` to get
/// that normalisation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence marker.
    Null,
    /// Boolean.
    Bool(bool),
    /// UTF-8 text.
    Text(String),
    /// Arbitrary-precision signed integer.
    Integer(BigInt),
    /// Finite floating-point number.
    Number(f64),
    /// Not-a-number sentinel.
    NaN,
    /// Positive infinity sentinel.
    Infinity,
    /// Negative infinity sentinel.
    NegInfinity,
    /// Point in time, millisecond precision.
    Timestamp(Timestamp),
    /// Regular-expression literal.
    Pattern(Pattern),
    /// Variable-width opaque bytes.
    Buffer(Vec<u8>),
    /// Variable-width opaque bytes flagged as shared.
    SharedBuffer(Vec<u8>),
    /// Fixed-width element buffer.
    Typed(TypedArray),
    /// Named binary payload.
    File(FileBlob),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Mapping with unique text keys.
    Map(BTreeMap<String, Value>),
    /// Set of unique values in canonical order.
    Set(Vec<Value>),
    /// Plain keyed record.
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a record from key/value pairs.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a mapping from key/value pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a set, dropping duplicates and ordering members by encoding.
    pub fn set<I: IntoIterator<Item = Value>>(members: I) -> Self {
        let mut keyed: Vec<(String, Value)> =
            members.into_iter().map(|v| (encode(&v), v)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Self::Set(keyed.into_iter().map(|(_, v)| v).collect())
    }

    /// Returns the integer payload, if any.
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Self::Integer(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a field of a record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Self::Integer(v)
    }
}

impl From<&BigUint> for Value {
    fn from(v: &BigUint) -> Self {
        Self::Integer(BigInt::from(v.clone()))
    }
}

impl From<BigUint> for Value {
    fn from(v: BigUint) -> Self {
        Self::Integer(BigInt::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Integer(BigInt::from(v))
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Pattern> for Value {
    fn from(v: Pattern) -> Self {
        Self::Pattern(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Self::NaN
        } else if v == f64::INFINITY {
            Self::Infinity
        } else if v == f64::NEG_INFINITY {
            Self::NegInfinity
        } else {
            Self::Number(v)
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Types that have a canonical [`Value`] form used for hashing and signing.
pub trait Canonical {
    /// Returns the canonical value of `self`.
    fn canonical(&self) -> Value;
}

impl Canonical for Value {
    fn canonical(&self) -> Value {
        self.clone()
    }
}

/// Encodes a value into its canonical text.
pub fn encode(value: &Value) -> String {
    to_json(value).to_string()
}

/// Decodes canonical text back into a value.
///
/// # Errors
///
/// Returns [`CodecError`] for malformed JSON, unknown tags, or payloads that
/// do not match their tag; nothing is partially decoded.
pub fn decode(text: &str) -> Result<Value, CodecError> {
    let json: Json =
        serde_json::from_str(text).map_err(|err| CodecError::InvalidJson(err.to_string()))?;
    from_json(json)
}

fn nested(value: &Value) -> Json {
    Json::String(encode(value))
}

fn tagged(tag: &str, payload: Option<Json>) -> Json {
    let mut obj = JsonMap::new();
    obj.insert("type".to_string(), Json::String(tag.to_string()));
    if let Some(payload) = payload {
        obj.insert("value".to_string(), payload);
    }
    Json::Object(obj)
}

fn number(v: f64) -> Json {
    if v.fract() == 0.0 && v.abs() < SAFE_INTEGER {
        Json::Number(Number::from(v as i64))
    } else {
        Number::from_f64(v).map_or(Json::Null, Json::Number)
    }
}

fn bytes_json(bytes: &[u8]) -> Json {
    Json::Array(bytes.iter().map(|&b| Json::from(b)).collect())
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Text(s) => Json::String(s.clone()),
        Value::Number(v) if v.is_nan() => tagged(TAG_NAN, None),
        Value::Number(v) if v.is_infinite() => {
            let tag = if *v > 0.0 { TAG_INFINITY } else { TAG_NEG_INFINITY };
            tagged(tag, None)
        }
        Value::Number(v) => number(*v),
        Value::NaN => tagged(TAG_NAN, None),
        Value::Infinity => tagged(TAG_INFINITY, None),
        Value::NegInfinity => tagged(TAG_NEG_INFINITY, None),
        Value::Integer(n) => tagged(TAG_BIGINT, Some(Json::String(n.to_string()))),
        Value::Timestamp(ts) => tagged(TAG_DATE, Some(Json::String(ts.to_rfc3339()))),
        Value::Pattern(p) => tagged(TAG_REGEXP, Some(Json::String(p.literal()))),
        Value::Buffer(bytes) => tagged(TAG_ARRAY_BUFFER, Some(bytes_json(bytes))),
        Value::SharedBuffer(bytes) => tagged(TAG_SHARED_BUFFER, Some(bytes_json(bytes))),
        Value::Typed(arr) => tagged(arr.tag(), Some(Json::Array(arr.elements()))),
        Value::File(file) => {
            // Keys are inserted in sorted order so the output is identical
            // whichever map backing serde_json was built with.
            let mut obj = JsonMap::new();
            obj.insert("content".to_string(), Json::String(file.data_url()));
            obj.insert("name".to_string(), Json::String(file.name.clone()));
            obj.insert("size".to_string(), Json::from(file.bytes.len() as u64));
            obj.insert("type".to_string(), Json::String(TAG_FILE.to_string()));
            obj.insert("typeMime".to_string(), Json::String(file.mime.clone()));
            Json::Object(obj)
        }
        Value::Array(items) => Json::Array(items.iter().map(nested).collect()),
        Value::Map(entries) => {
            let obj = entries.iter().map(|(k, v)| (k.clone(), nested(v))).collect();
            tagged(TAG_MAP, Some(Json::Object(obj)))
        }
        Value::Set(members) => {
            let mut encoded: Vec<String> = members.iter().map(encode).collect();
            encoded.sort();
            encoded.dedup();
            tagged(
                TAG_SET,
                Some(Json::Array(encoded.into_iter().map(Json::String).collect())),
            )
        }
        Value::Record(fields) => {
            Json::Object(fields.iter().map(|(k, v)| (k.clone(), nested(v))).collect())
        }
    }
}

fn child(json: &Json) -> Result<Value, CodecError> {
    match json {
        Json::String(text) => decode(text),
        _ => Err(CodecError::NonStringChild),
    }
}

/// A tag is a bare identifier; a record field is always a nested JSON text.
fn as_tag(obj: &JsonMap<String, Json>) -> Option<&str> {
    match obj.get("type") {
        Some(Json::String(tag)) if serde_json::from_str::<Json>(tag).is_err() => Some(tag),
        _ => None,
    }
}

fn from_json(json: Json) -> Result<Value, CodecError> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::String(s) => Ok(Value::Text(s)),
        Json::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| CodecError::InvalidJson("number out of range".to_string())),
        Json::Array(items) => items
            .iter()
            .map(child)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Json::Object(obj) => match as_tag(&obj) {
            Some(tag) => from_tagged(tag, &obj),
            None => obj
                .iter()
                .map(|(k, v)| Ok((k.clone(), child(v)?)))
                .collect::<Result<BTreeMap<_, _>, CodecError>>()
                .map(Value::Record),
        },
    }
}

fn payload_str<'a>(
    tag: &str,
    obj: &'a JsonMap<String, Json>,
    key: &str,
) -> Result<&'a str, CodecError> {
    obj.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| CodecError::payload(tag, format!("missing string `{key}`")))
}

fn payload_bytes(tag: &str, obj: &JsonMap<String, Json>) -> Result<Vec<u8>, CodecError> {
    let items = obj
        .get("value")
        .and_then(Json::as_array)
        .ok_or_else(|| CodecError::payload(tag, "missing byte array"))?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .ok_or_else(|| CodecError::payload(tag, "byte out of range"))
        })
        .collect()
}

fn from_tagged(tag: &str, obj: &JsonMap<String, Json>) -> Result<Value, CodecError> {
    match tag {
        TAG_NAN => Ok(Value::NaN),
        TAG_INFINITY => Ok(Value::Infinity),
        TAG_NEG_INFINITY => Ok(Value::NegInfinity),
        TAG_BIGINT => {
            let digits = payload_str(tag, obj, "value")?;
            BigInt::from_str(digits)
                .map(Value::Integer)
                .map_err(|err| CodecError::payload(tag, err.to_string()))
        }
        TAG_DATE => {
            let iso = payload_str(tag, obj, "value")?;
            let dt = DateTime::parse_from_rfc3339(iso)
                .map_err(|err| CodecError::payload(tag, err.to_string()))?;
            Timestamp::from_millis(dt.timestamp_millis()).map(Value::Timestamp)
        }
        TAG_REGEXP => Pattern::parse(payload_str(tag, obj, "value")?).map(Value::Pattern),
        TAG_MAP => {
            let entries = obj
                .get("value")
                .and_then(Json::as_object)
                .ok_or_else(|| CodecError::payload(tag, "missing entry object"))?;
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), child(v)?)))
                .collect::<Result<BTreeMap<_, _>, CodecError>>()
                .map(Value::Map)
        }
        TAG_SET => {
            let members = obj
                .get("value")
                .and_then(Json::as_array)
                .ok_or_else(|| CodecError::payload(tag, "missing member array"))?;
            let members = members.iter().map(child).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::set(members))
        }
        TAG_ARRAY_BUFFER => payload_bytes(tag, obj).map(Value::Buffer),
        TAG_SHARED_BUFFER => payload_bytes(tag, obj).map(Value::SharedBuffer),
        TAG_FILE => {
            let name = payload_str(tag, obj, "name")?.to_string();
            let mime = payload_str(tag, obj, "typeMime")?.to_string();
            let content = payload_str(tag, obj, "content")?;
            let (_, body) = content
                .rsplit_once(',')
                .ok_or_else(|| CodecError::payload(tag, "content is not a data URL"))?;
            let bytes = BASE64
                .decode(body)
                .map_err(|err| CodecError::InvalidBase64(err.to_string()))?;
            Ok(Value::File(FileBlob { name, mime, bytes }))
        }
        typed if TypedArray::TAGS.contains(&typed) => {
            let items = obj
                .get("value")
                .and_then(Json::as_array)
                .ok_or_else(|| CodecError::payload(tag, "missing element array"))?;
            TypedArray::from_elements(typed, items).map(Value::Typed)
        }
        other => Err(CodecError::UnsupportedTag(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) {
        let text = encode(&value);
        assert_eq!(decode(&text).unwrap(), value, "roundtrip of {text}");
    }

    #[test]
    fn primitive_wire_shapes() {
        assert_eq!(encode(&Value::Null), "null");
        assert_eq!(encode(&Value::from(true)), "true");
        assert_eq!(encode(&Value::from("hi")), "\"hi\"");
        assert_eq!(encode(&Value::from(1.0)), "1");
        assert_eq!(encode(&Value::from(1.5)), "1.5");
        assert_eq!(encode(&Value::from(42u64)), r#"{"type":"BigInt","value":"42"}"#);
        assert_eq!(encode(&Value::from(f64::NAN)), r#"{"type":"NaN"}"#);
        assert_eq!(encode(&Value::from(f64::NEG_INFINITY)), r#"{"type":"-Infinity"}"#);
    }

    #[test]
    fn children_are_nested_texts() {
        let value = Value::record([("a", Value::from(1u64))]);
        assert_eq!(
            encode(&value),
            r#"{"a":"{\"type\":\"BigInt\",\"value\":\"1\"}"}"#
        );
        let array = Value::Array(vec![Value::from("x"), Value::Null]);
        assert_eq!(encode(&array), r#"["\"x\"","null"]"#);
    }

    #[test]
    fn record_order_independent() {
        let a = Value::record([("b", Value::from(2u64)), ("a", Value::from("x"))]);
        let b = Value::record([("a", Value::from("x")), ("b", Value::from(2u64))]);
        assert_eq!(encode(&a), encode(&b));
        assert!(encode(&a).starts_with("{\"a\""));
    }

    #[test]
    fn set_canonical_order() {
        let a = Value::set([Value::from(2u64), Value::from("x"), Value::from(2u64)]);
        let b = Value::set([Value::from("x"), Value::from(2u64)]);
        assert_eq!(a, b);
        assert_eq!(encode(&a), encode(&b));
        if let Value::Set(members) = &a {
            assert_eq!(members.len(), 2);
        }
    }

    #[test]
    fn roundtrip_every_kind() {
        roundtrip(Value::Null);
        roundtrip(Value::from(false));
        roundtrip(Value::from("text with \"quotes\""));
        roundtrip(Value::Integer(BigInt::from(-123_456_789_012_345_678i64) * BigInt::from(1u64 << 40)));
        roundtrip(Value::from(-2.25));
        roundtrip(Value::NaN);
        roundtrip(Value::Infinity);
        roundtrip(Value::NegInfinity);
        roundtrip(Value::from(Timestamp::from_millis(1_700_000_000_123).unwrap()));
        roundtrip(Value::from(Pattern::new("a/b+", "gi").unwrap()));
        roundtrip(Value::Buffer(vec![0, 1, 255]));
        roundtrip(Value::SharedBuffer(vec![9, 8]));
        roundtrip(Value::Typed(TypedArray::Int16(vec![-3, 700])));
        roundtrip(Value::Typed(TypedArray::Uint32(vec![u32::MAX])));
        roundtrip(Value::File(FileBlob {
            name: "note.txt".into(),
            mime: "text/plain".into(),
            bytes: b"hello".to_vec(),
        }));
        roundtrip(Value::Array(vec![Value::from(1u64), Value::from("a"), Value::Null]));
        roundtrip(Value::map([("k", Value::from(true)), ("j", Value::from(3u64))]));
        roundtrip(Value::set([Value::from(1u64), Value::from(2u64)]));
        roundtrip(Value::record([
            ("type", Value::from("BigInt")),
            ("inner", Value::record([("value", Value::from(7u64))])),
            ("list", Value::Array(vec![Value::set([Value::from("s")])])),
        ]));
    }

    #[test]
    fn record_with_type_field_is_not_a_tag() {
        let value = Value::record([("type", Value::from("Map")), ("value", Value::Null)]);
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn decode_fails_closed() {
        assert!(matches!(
            decode(r#"{"type":"Symbol","value":"Symbol(x)"}"#),
            Err(CodecError::UnsupportedTag(_))
        ));
        assert!(matches!(decode("[1]"), Err(CodecError::NonStringChild)));
        assert!(matches!(decode("{\"a\":true}"), Err(CodecError::NonStringChild)));
        assert!(decode(r#"{"type":"BigInt","value":"12x"}"#).is_err());
        assert!(decode(r#"{"type":"Date","value":"yesterday"}"#).is_err());
        assert!(decode(r#"{"type":"Uint8Array","value":[256]}"#).is_err());
        assert!(decode(r#"{"type":"RegExp","value":"abc"}"#).is_err());
        assert!(matches!(decode("{"), Err(CodecError::InvalidJson(_))));
    }

    #[test]
    fn timestamp_iso_form() {
        let text = encode(&Value::from(Timestamp::from_millis(0).unwrap()));
        assert_eq!(text, r#"{"type":"Date","value":"1970-01-01T00:00:00.000Z"}"#);
    }

    #[test]
    fn timestamp_range_edges() {
        for ms in [Timestamp::MIN_MILLIS, Timestamp::MAX_MILLIS] {
            roundtrip(Value::from(Timestamp::from_millis(ms).unwrap()));
        }
        let max = encode(&Value::from(Timestamp::from_millis(Timestamp::MAX_MILLIS).unwrap()));
        assert_eq!(max, r#"{"type":"Date","value":"9999-12-31T23:59:59.999Z"}"#);
        for ms in [i64::MAX, i64::MIN, Timestamp::MAX_MILLIS + 1, Timestamp::MIN_MILLIS - 1] {
            assert_eq!(
                Timestamp::from_millis(ms),
                Err(CodecError::TimestampOutOfRange(ms))
            );
        }
        // An offset can push a four-digit date past the range.
        assert!(matches!(
            decode(r#"{"type":"Date","value":"9999-12-31T23:59:59.999-01:00"}"#),
            Err(CodecError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn pattern_flags_validated() {
        assert_eq!(
            Pattern::new("a", "g/"),
            Err(CodecError::InvalidPatternFlags("g/".into()))
        );
        assert!(Pattern::new("a", "gg").is_err());
        assert!(Pattern::new("a", "x").is_err());
        let slashy = Pattern::new("a/g", "").unwrap();
        assert_eq!(encode(&Value::from(slashy.clone())), r#"{"type":"RegExp","value":"/a/g/"}"#);
        roundtrip(Value::from(slashy));
        assert!(decode(r#"{"type":"RegExp","value":"/a/gg"}"#).is_err());
    }

    #[test]
    fn file_mime_with_comma_roundtrips() {
        roundtrip(Value::File(FileBlob {
            name: "a.csv".into(),
            mime: "text/csv; charset=utf-8, q=1".into(),
            bytes: b"x,y".to_vec(),
        }));
    }
}
