use corim_core::codec::{cbor, json};
use corim_core::values::TaggedUuid;
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    TaggedValue, Validate,
};
use std::fmt;

/// Text or UUID identifier, used for manifest ids and tag ids
///
/// The UUID form is carried as an untagged 16-byte string in CBOR. In JSON
/// both forms are plain strings; a string in canonical UUID form decodes as
/// a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Free-form text
    Text(String),
    /// RFC 4122 UUID
    Uuid(TaggedUuid),
}

impl Identifier {
    /// Text identifier
    pub fn text(id: impl Into<String>) -> Self {
        Self::Text(id.into())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl Validate for Identifier {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Text(s) if s.is_empty() => Err(CorimError::EmptyIdentifier),
            Self::Text(_) => Ok(()),
            Self::Uuid(u) => u.validate_value(),
        }
    }
}

impl CborEncode for Identifier {
    fn to_cbor_value(&self) -> CborValue {
        match self {
            Self::Text(s) => CborValue::Text(s.clone()),
            Self::Uuid(u) => CborValue::Bytes(u.as_uuid().as_bytes().to_vec()),
        }
    }
}

impl CborDecode for Identifier {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        match value {
            CborValue::Text(s) => Ok(Self::Text(s)),
            CborValue::Bytes(b) => Ok(Self::Uuid(TaggedUuid::from_slice(&b)?)),
            other => Err(CorimError::malformed(
                "identifier",
                format!("expecting text or UUID, got {}", cbor::describe_key(&other)),
            )),
        }
    }
}

impl JsonEncode for Identifier {
    fn to_json_value(&self) -> JsonValue {
        JsonValue::String(self.to_string())
    }
}

impl JsonDecode for Identifier {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let text = json::expect_string("identifier", value)?;
        Ok(match TaggedUuid::parse(&text) {
            Ok(u) => Self::Uuid(u),
            Err(_) => Self::Text(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::ErrorKind;

    #[test]
    fn test_empty_text() {
        assert_eq!(
            Identifier::text("").validate().unwrap_err().kind(),
            ErrorKind::EmptyIdentifier
        );
    }

    #[test]
    fn test_uuid_forms() {
        let id = Identifier::from_json_value(serde_json::json!(
            "43bbe37f-2e61-4b33-aed3-53cff1428b16"
        ))
        .unwrap();
        assert!(matches!(id, Identifier::Uuid(_)));
        assert_eq!(
            cbor::to_vec(&id.to_cbor_value()).unwrap()[..1],
            [0x50]
        );
        assert_eq!(Identifier::from_cbor_value(id.to_cbor_value()).unwrap(), id);
    }
}
