use crate::codec::{cbor, json};
use crate::errors::{CorimError, Result};
use crate::type_choice::TaggedValue;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;
use std::fmt;

/// RFC 4122 UUID (`#6.37`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaggedUuid(::uuid::Uuid);

impl TaggedUuid {
    /// Wrap a UUID
    pub fn new(uuid: ::uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Parse the canonical hyphenated form
    pub fn parse(text: &str) -> Result<Self> {
        if text.len() != 36 {
            return Err(CorimError::malformed(
                "UUID",
                format!("expecting 8-4-4-4-12 form, got {text:?}"),
            ));
        }
        ::uuid::Uuid::parse_str(text)
            .map(Self)
            .map_err(|e| CorimError::malformed("UUID", e.to_string()))
    }

    /// Build from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        ::uuid::Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| {
                CorimError::malformed("UUID", format!("expecting 16 bytes, got {}", bytes.len()))
            })
    }

    /// Inner UUID
    pub fn as_uuid(&self) -> &::uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for TaggedUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl TaggedValue for TaggedUuid {
    const TYPE_NAME: &'static str = "uuid";
    const BINARY_TAG: u64 = 37;

    fn validate_value(&self) -> Result<()> {
        if self.0.get_variant() != ::uuid::Variant::RFC4122 {
            return Err(CorimError::invalid(
                "UUID",
                format!("expecting RFC4122 UUID, got {:?} instead", self.0.get_variant()),
            ));
        }
        Ok(())
    }

    fn encode_body(&self) -> CborValue {
        CborValue::Bytes(self.0.as_bytes().to_vec())
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        Self::from_slice(&cbor::expect_bytes("UUID", body)?)
    }

    fn encode_text(&self) -> JsonValue {
        JsonValue::String(self.to_string())
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        Self::parse(&json::expect_string("UUID", value)?)
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        Some(self.0.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_parse_and_display() {
        let u = TaggedUuid::parse("31fb5abf-023e-4992-aa4e-95f9c1503bfa").unwrap();
        assert_eq!(u.to_string(), "31fb5abf-023e-4992-aa4e-95f9c1503bfa");
        assert!(u.validate_value().is_ok());
    }

    #[test]
    fn test_non_canonical_text_rejected() {
        let err = TaggedUuid::parse("31fb5abf023e4992aa4e95f9c1503bfa").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let err = TaggedUuid::decode_body(CborValue::Bytes(vec![0; 15])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_non_rfc4122_variant_is_invalid() {
        // variant bits 0b111 (reserved)
        let mut bytes = [0x11u8; 16];
        bytes[8] = 0xe0;
        let u = TaggedUuid::from_slice(&bytes).unwrap();
        assert_eq!(u.validate_value().unwrap_err().kind(), ErrorKind::InvalidValue);
    }
}
