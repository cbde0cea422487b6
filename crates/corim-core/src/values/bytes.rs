use crate::codec::{cbor, json};
use crate::errors::{CorimError, Result};
use crate::type_choice::TaggedValue;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;

/// Opaque non-empty byte string (`#6.560`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedBytes(Vec<u8>);

impl TaggedBytes {
    /// Wrap raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Inner bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl TaggedValue for TaggedBytes {
    const TYPE_NAME: &'static str = "bytes";
    const BINARY_TAG: u64 = 560;

    fn validate_value(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(CorimError::invalid("tagged bytes", "empty"));
        }
        Ok(())
    }

    fn encode_body(&self) -> CborValue {
        CborValue::Bytes(self.0.clone())
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        Ok(Self(cbor::expect_bytes("tagged bytes", body)?))
    }

    fn encode_text(&self) -> JsonValue {
        JsonValue::String(json::b64_encode(&self.0))
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        Ok(Self(json::expect_b64("tagged bytes", value)?))
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}
