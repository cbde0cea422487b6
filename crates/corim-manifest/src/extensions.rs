//! Measurement-value extension fields
//!
//! Profiles may add fields to `measurement-values-map` under keys the core
//! map does not use (by convention negative integers). Each field is
//! described by an [`ExtensionField`]; the active profile's fields form the
//! schema used to decode a document. Keys outside both the core map and the
//! schema are rejected.

use corim_core::codec::cbor::{self, describe_key};
use corim_core::codec::json;
use corim_core::{CborValue, CorimError, JsonValue, Result, ResultExt};
use std::collections::BTreeMap;
use std::fmt;

/// Shape of an extension value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    /// Unsigned integer
    Uint,
    /// Signed integer
    Int,
    /// Text string
    Text,
    /// Byte string, base64 in JSON
    Bytes,
    /// Non-empty array of text strings
    TextSet,
    /// Either an unsigned integer or a byte string
    UintOrBytes,
}

/// Decoded extension value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    /// Unsigned integer
    Uint(u64),
    /// Signed integer
    Int(i64),
    /// Text string
    Text(String),
    /// Byte string
    Bytes(Vec<u8>),
    /// Array of text strings
    TextSet(Vec<String>),
}

impl ExtensionValue {
    fn fits(&self, kind: ExtensionKind) -> bool {
        matches!(
            (kind, self),
            (ExtensionKind::Uint, Self::Uint(_))
                | (ExtensionKind::Int, Self::Int(_))
                | (ExtensionKind::Text, Self::Text(_))
                | (ExtensionKind::Bytes, Self::Bytes(_))
                | (ExtensionKind::TextSet, Self::TextSet(_))
                | (ExtensionKind::UintOrBytes, Self::Uint(_) | Self::Bytes(_))
        )
    }

    /// CBOR form
    pub fn to_cbor_value(&self) -> CborValue {
        match self {
            Self::Uint(n) => cbor::uint(*n),
            Self::Int(n) => cbor::int(*n),
            Self::Text(s) => CborValue::Text(s.clone()),
            Self::Bytes(b) => CborValue::Bytes(b.clone()),
            Self::TextSet(items) => cbor::array(items.iter().cloned().map(CborValue::Text)),
        }
    }

    /// JSON form
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Self::Uint(n) => JsonValue::from(*n),
            Self::Int(n) => JsonValue::from(*n),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Bytes(b) => JsonValue::String(json::b64_encode(b)),
            Self::TextSet(items) => {
                JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
            }
        }
    }

    /// Unsigned integer view
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Byte view
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Text set view
    pub fn as_text_set(&self) -> Option<&[String]> {
        match self {
            Self::TextSet(items) => Some(items),
            _ => None,
        }
    }
}

/// Extra validity predicate for an extension value
pub type ExtensionCheck = fn(&ExtensionValue) -> Result<()>;

/// Description of one extension field
#[derive(Clone, Copy)]
pub struct ExtensionField {
    /// Integer key in the CBOR map
    pub key: i64,
    /// Member name in the JSON object
    pub name: &'static str,
    /// Value shape
    pub kind: ExtensionKind,
    /// Optional validity predicate, run after the shape check
    pub check: Option<ExtensionCheck>,
}

impl fmt::Debug for ExtensionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionField")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl ExtensionField {
    /// Field without an extra predicate
    pub const fn new(key: i64, name: &'static str, kind: ExtensionKind) -> Self {
        Self {
            key,
            name,
            kind,
            check: None,
        }
    }

    /// Field with an extra predicate
    pub const fn with_check(mut self, check: ExtensionCheck) -> Self {
        self.check = Some(check);
        self
    }

    /// Check shape and predicate
    pub fn check_value(&self, value: &ExtensionValue) -> Result<()> {
        if !value.fits(self.kind) {
            return Err(CorimError::invalid(
                self.name,
                format!("expecting {:?}, got {value:?}", self.kind),
            ));
        }
        if let ExtensionValue::TextSet(items) = value {
            if items.is_empty() {
                return Err(CorimError::invalid(self.name, "empty set"));
            }
        }
        match self.check {
            Some(check) => check(value),
            None => Ok(()),
        }
    }

    /// Decode a CBOR value of this field's shape
    pub fn decode_cbor(&self, value: CborValue) -> Result<ExtensionValue> {
        let what = self.name;
        Ok(match self.kind {
            ExtensionKind::Uint => ExtensionValue::Uint(cbor::expect_uint(what, value)?),
            ExtensionKind::Int => ExtensionValue::Int(cbor::expect_int(what, value)?),
            ExtensionKind::Text => ExtensionValue::Text(cbor::expect_text(what, value)?),
            ExtensionKind::Bytes => ExtensionValue::Bytes(cbor::expect_bytes(what, value)?),
            ExtensionKind::TextSet => ExtensionValue::TextSet(
                cbor::expect_array(what, value)?
                    .into_iter()
                    .map(|v| cbor::expect_text(what, v))
                    .collect::<Result<_>>()?,
            ),
            ExtensionKind::UintOrBytes => match value {
                CborValue::Bytes(b) => ExtensionValue::Bytes(b),
                other => ExtensionValue::Uint(cbor::expect_uint(what, other)?),
            },
        })
    }

    /// Decode a JSON value of this field's shape
    pub fn decode_json(&self, value: JsonValue) -> Result<ExtensionValue> {
        let what = self.name;
        Ok(match self.kind {
            ExtensionKind::Uint => ExtensionValue::Uint(json::expect_u64(what, value)?),
            ExtensionKind::Int => ExtensionValue::Int(json::expect_i64(what, value)?),
            ExtensionKind::Text => ExtensionValue::Text(json::expect_string(what, value)?),
            ExtensionKind::Bytes => ExtensionValue::Bytes(json::expect_b64(what, value)?),
            ExtensionKind::TextSet => ExtensionValue::TextSet(
                json::expect_array(what, value)?
                    .into_iter()
                    .map(|v| json::expect_string(what, v))
                    .collect::<Result<_>>()?,
            ),
            ExtensionKind::UintOrBytes => match value {
                JsonValue::String(s) => ExtensionValue::Bytes(json::b64_decode(what, &s)?),
                other => ExtensionValue::Uint(json::expect_u64(what, other)?),
            },
        })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    field: ExtensionField,
    value: ExtensionValue,
}

/// Extension values held by one `measurement-values-map`
#[derive(Debug, Clone, Default)]
pub struct Extensions {
    entries: BTreeMap<i64, Entry>,
}

impl PartialEq for Extensions {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((ka, a), (kb, b))| ka == kb && a.value == b.value)
    }
}

impl Extensions {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field after checking the value
    pub fn set(&mut self, field: &ExtensionField, value: ExtensionValue) -> Result<()> {
        field.check_value(&value)?;
        self.entries.insert(
            field.key,
            Entry {
                field: *field,
                value,
            },
        );
        Ok(())
    }

    /// Value of a field by JSON name
    pub fn get(&self, name: &str) -> Option<&ExtensionValue> {
        self.entries
            .values()
            .find(|e| e.field.name == name)
            .map(|e| &e.value)
    }

    /// Value of a field by CBOR key
    pub fn get_by_key(&self, key: i64) -> Option<&ExtensionValue> {
        self.entries.get(&key).map(|e| &e.value)
    }

    /// Number of fields set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-check every value
    pub fn validate(&self) -> Result<()> {
        for entry in self.entries.values() {
            entry
                .field
                .check_value(&entry.value)
                .with_context(|| format!("extension {}", entry.field.name))?;
        }
        Ok(())
    }

    /// CBOR map entries, ready to merge into the enclosing map
    pub fn cbor_entries(&self) -> BTreeMap<CborValue, CborValue> {
        self.entries
            .iter()
            .map(|(key, e)| (cbor::int(*key), e.value.to_cbor_value()))
            .collect()
    }

    /// JSON members, ready to merge into the enclosing object
    pub fn json_members(&self) -> serde_json::Map<String, JsonValue> {
        self.entries
            .values()
            .map(|e| (e.field.name.to_string(), e.value.to_json_value()))
            .collect()
    }

    /// Decode leftover CBOR entries against a schema
    pub fn from_cbor_entries(
        schema: &[ExtensionField],
        entries: BTreeMap<CborValue, CborValue>,
    ) -> Result<Self> {
        let mut out = Self::new();
        for (key, value) in entries {
            let field = match &key {
                CborValue::Integer(k) => schema.iter().find(|f| i128::from(f.key) == *k),
                _ => None,
            }
            .ok_or_else(|| {
                CorimError::malformed(
                    "measurement values",
                    format!("unexpected key {}", describe_key(&key)),
                )
            })?;
            let value = field.decode_cbor(value)?;
            out.entries.insert(
                field.key,
                Entry {
                    field: *field,
                    value,
                },
            );
        }
        Ok(out)
    }

    /// Decode leftover JSON members against a schema
    pub fn from_json_members(
        schema: &[ExtensionField],
        members: serde_json::Map<String, JsonValue>,
    ) -> Result<Self> {
        let mut out = Self::new();
        for (name, value) in members {
            let field = schema.iter().find(|f| f.name == name).ok_or_else(|| {
                CorimError::malformed(
                    "measurement values",
                    format!("unexpected member {name:?}"),
                )
            })?;
            let value = field.decode_json(value)?;
            out.entries.insert(
                field.key,
                Entry {
                    field: *field,
                    value,
                },
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::ErrorKind;

    fn not_zero(value: &ExtensionValue) -> Result<()> {
        match value.as_uint() {
            Some(0) => Err(CorimError::invalid("counter", "zero")),
            _ => Ok(()),
        }
    }

    const SCHEMA: &[ExtensionField] = &[
        ExtensionField::new(-1, "counter", ExtensionKind::Uint).with_check(not_zero),
        ExtensionField::new(-2, "label", ExtensionKind::Text),
        ExtensionField::new(-3, "id", ExtensionKind::UintOrBytes),
    ];

    #[test]
    fn test_set_checks_kind_and_predicate() {
        let mut ext = Extensions::new();
        ext.set(&SCHEMA[0], ExtensionValue::Uint(3)).unwrap();
        assert_eq!(
            ext.set(&SCHEMA[0], ExtensionValue::Uint(0)).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(
            ext.set(&SCHEMA[1], ExtensionValue::Uint(1)).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(ext.get("counter"), Some(&ExtensionValue::Uint(3)));
    }

    #[test]
    fn test_cbor_and_json_agree() {
        let mut ext = Extensions::new();
        ext.set(&SCHEMA[1], ExtensionValue::Text("x".into())).unwrap();
        ext.set(&SCHEMA[2], ExtensionValue::Bytes(vec![1, 2])).unwrap();

        let from_cbor = Extensions::from_cbor_entries(SCHEMA, ext.cbor_entries()).unwrap();
        let from_json = Extensions::from_json_members(SCHEMA, ext.json_members()).unwrap();
        assert_eq!(from_cbor, ext);
        assert_eq!(from_json, ext);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert(cbor::int(-99), cbor::uint(1));
        let err = Extensions::from_cbor_entries(SCHEMA, entries).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }
}
