use crate::errors::{CorimError, Result};
use crate::type_choice::describe_cbor;
use serde_cbor::Value;
use std::collections::BTreeMap;

/// Standard tag for a URI text string
pub const TAG_URI: u64 = 32;

/// Standard tag for an epoch-based date/time
pub const TAG_EPOCH: u64 = 1;

/// Serialize a value tree to CBOR bytes
pub fn to_vec(value: &Value) -> Result<Vec<u8>> {
    serde_cbor::to_vec(value)
        .map_err(|e| CorimError::malformed("CBOR data", format!("failed to serialize: {e}")))
}

/// Parse CBOR bytes into a value tree
pub fn from_slice(bytes: &[u8]) -> Result<Value> {
    Ok(serde_cbor::from_slice(bytes)?)
}

/// Unsigned integer value
pub fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

/// Signed integer value
pub fn int(n: i64) -> Value {
    Value::Integer(n.into())
}

/// URI text wrapped in tag 32
pub fn uri(text: &str) -> Value {
    Value::Tag(TAG_URI, Box::new(Value::Text(text.to_string())))
}

/// Epoch seconds wrapped in tag 1
pub fn epoch(seconds: i64) -> Value {
    Value::Tag(TAG_EPOCH, Box::new(int(seconds)))
}

/// Embed a value tree as a CBOR byte string (`bstr .cbor`)
///
/// Serialising a `Value` into memory has no failure path, so an error here
/// can only yield an empty string, which decoding then rejects.
pub fn embed(value: &Value) -> Value {
    Value::Bytes(serde_cbor::to_vec(value).unwrap_or_default())
}

/// Array of values
pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Value {
    Value::Array(items.into_iter().collect())
}

fn wrong_type(what: &str, expected: &str, got: &Value) -> CorimError {
    CorimError::malformed(
        what,
        format!("expecting {expected}, got {}", describe_cbor(got)),
    )
}

/// Take a text string
pub fn expect_text(what: &str, value: Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(wrong_type(what, "text string", &other)),
    }
}

/// Take a byte string
pub fn expect_bytes(what: &str, value: Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b),
        other => Err(wrong_type(what, "byte string", &other)),
    }
}

/// Take an unsigned integer
pub fn expect_uint(what: &str, value: Value) -> Result<u64> {
    match value {
        Value::Integer(n) => u64::try_from(n)
            .map_err(|_| CorimError::malformed(what, format!("{n} is not a uint64"))),
        other => Err(wrong_type(what, "unsigned integer", &other)),
    }
}

/// Take a signed integer
pub fn expect_int(what: &str, value: Value) -> Result<i64> {
    match value {
        Value::Integer(n) => i64::try_from(n)
            .map_err(|_| CorimError::malformed(what, format!("{n} is out of int64 range"))),
        other => Err(wrong_type(what, "integer", &other)),
    }
}

/// Take a boolean
pub fn expect_bool(what: &str, value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(wrong_type(what, "bool", &other)),
    }
}

/// Take an array
pub fn expect_array(what: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(wrong_type(what, "array", &other)),
    }
}

/// Take an array of exactly `len` items
pub fn expect_array_of(what: &str, value: Value, len: usize) -> Result<Vec<Value>> {
    let items = expect_array(what, value)?;
    if items.len() != len {
        return Err(CorimError::malformed(
            what,
            format!("expecting {len} array items, got {}", items.len()),
        ));
    }
    Ok(items)
}

/// Strip a specific tag and return its body
pub fn expect_tag(what: &str, value: Value, tag: u64) -> Result<Value> {
    match value {
        Value::Tag(t, body) if t == tag => Ok(*body),
        Value::Tag(t, _) => Err(CorimError::malformed(
            what,
            format!("expecting tag {tag}, got tag {t}"),
        )),
        other => Err(wrong_type(what, &format!("tag {tag}"), &other)),
    }
}

/// Take a tag-32 URI
pub fn expect_uri(what: &str, value: Value) -> Result<String> {
    expect_text(what, expect_tag(what, value, TAG_URI)?)
}

/// Take a tag-1 epoch time
pub fn expect_epoch(what: &str, value: Value) -> Result<i64> {
    expect_int(what, expect_tag(what, value, TAG_EPOCH)?)
}

/// Decode the embedded CBOR inside a byte string
pub fn expect_embedded(what: &str, value: Value) -> Result<Value> {
    let bytes = expect_bytes(what, value)?;
    from_slice(&bytes).map_err(|e| e.context(format!("decoding embedded {what}")))
}

// ============================================================================
// Integer-keyed maps
// ============================================================================

/// Builder for an integer-keyed CBOR map
#[derive(Debug, Default)]
pub struct MapEncoder {
    entries: BTreeMap<Value, Value>,
}

impl MapEncoder {
    /// Start an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn insert(mut self, key: i64, value: Value) -> Self {
        self.entries.insert(int(key), value);
        self
    }

    /// Add a field when present; absent fields are omitted
    pub fn insert_opt(self, key: i64, value: Option<Value>) -> Self {
        match value {
            Some(value) => self.insert(key, value),
            None => self,
        }
    }

    /// Add every entry of an already-encoded map
    pub fn extend(mut self, entries: BTreeMap<Value, Value>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Finish into a map value
    pub fn finish(self) -> Value {
        Value::Map(self.entries)
    }
}

/// Consuming reader over an integer-keyed CBOR map
///
/// Fields are taken out one by one; [`MapDecoder::finish`] rejects whatever
/// is left over.
#[derive(Debug)]
pub struct MapDecoder {
    what: String,
    entries: BTreeMap<Value, Value>,
}

impl MapDecoder {
    /// Open a map value
    pub fn new(what: impl Into<String>, value: Value) -> Result<Self> {
        let what = what.into();
        match value {
            Value::Map(entries) => Ok(Self { what, entries }),
            other => Err(wrong_type(&what, "map", &other)),
        }
    }

    /// Take an optional field
    pub fn take(&mut self, key: i64) -> Option<Value> {
        self.entries.remove(&int(key))
    }

    /// Take a mandatory field
    pub fn required(&mut self, key: i64, field: &str) -> Result<Value> {
        self.take(key)
            .ok_or_else(|| CorimError::missing(format!("{} {field}", self.what)))
    }

    /// Take every remaining entry
    pub fn take_remaining(&mut self) -> BTreeMap<Value, Value> {
        std::mem::take(&mut self.entries)
    }

    /// Fail on any field not taken
    pub fn finish(self) -> Result<()> {
        match self.entries.keys().next() {
            None => Ok(()),
            Some(key) => Err(CorimError::malformed(
                self.what,
                format!("unexpected key {}", describe_key(key)),
            )),
        }
    }
}

/// Render a map key for error messages
pub fn describe_key(key: &Value) -> String {
    match key {
        Value::Integer(n) => n.to_string(),
        Value::Text(s) => format!("{s:?}"),
        other => describe_cbor(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_expect_helpers() {
        assert_eq!(expect_uint("n", uint(5)).unwrap(), 5);
        assert_eq!(expect_int("n", int(-77)).unwrap(), -77);
        assert_eq!(
            expect_uint("n", int(-1)).unwrap_err().kind(),
            ErrorKind::MalformedValue
        );
        assert_eq!(
            expect_text("t", Value::Bytes(vec![])).unwrap_err().kind(),
            ErrorKind::MalformedValue
        );
        assert_eq!(expect_uri("u", uri("https://x")).unwrap(), "https://x");
        assert_eq!(expect_epoch("e", epoch(1_700_000_000)).unwrap(), 1_700_000_000);
        assert!(expect_tag("t", epoch(0), TAG_URI).is_err());
    }

    #[test]
    fn test_map_key_order_is_deterministic() {
        let a = MapEncoder::new()
            .insert(4, uint(1))
            .insert(0, uint(2))
            .insert(-1, uint(3))
            .finish();
        let b = MapEncoder::new()
            .insert(-1, uint(3))
            .insert(4, uint(1))
            .insert(0, uint(2))
            .finish();
        assert_eq!(to_vec(&a).unwrap(), to_vec(&b).unwrap());
    }

    #[test]
    fn test_map_decoder_leftovers() {
        let value = MapEncoder::new().insert(0, uint(1)).insert(9, uint(2)).finish();
        let mut map = MapDecoder::new("thing", value).unwrap();
        assert_eq!(map.take(0), Some(uint(1)));
        let err = map.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
        assert!(err.to_string().contains("unexpected key 9"));
    }

    #[test]
    fn test_embedded_cbor() {
        let inner = to_vec(&uint(42)).unwrap();
        assert_eq!(expect_embedded("x", Value::Bytes(inner)).unwrap(), uint(42));
        assert_eq!(
            expect_embedded("x", Value::Bytes(vec![0xba, 0xdc, 0xb0, 0x30]))
                .unwrap_err()
                .kind(),
            ErrorKind::MalformedValue
        );
    }
}
