use crate::codec::{cbor, json};
use crate::errors::{CorimError, Result};
use crate::type_choice::TaggedValue;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;

const PEM_BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_END: &str = "-----END PUBLIC KEY-----";

/// PEM-encoded SubjectPublicKeyInfo (`#6.554`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PkixBase64Key(String);

impl PkixBase64Key {
    /// Wrap a PEM string
    pub fn new(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    /// The PEM text
    pub fn as_pem(&self) -> &str {
        &self.0
    }

    /// DER bytes of the SubjectPublicKeyInfo
    pub fn der(&self) -> Result<Vec<u8>> {
        let body = self
            .0
            .trim()
            .strip_prefix(PEM_BEGIN)
            .and_then(|rest| rest.strip_suffix(PEM_END))
            .ok_or_else(|| CorimError::invalid("PKIX key", "expecting a PEM PUBLIC KEY block"))?;
        let b64: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(b64)
            .map_err(|e| CorimError::invalid("PKIX key", format!("bad PEM body: {e}")))?;
        if der.is_empty() {
            return Err(CorimError::invalid("PKIX key", "empty PEM body"));
        }
        Ok(der)
    }
}

impl TaggedValue for PkixBase64Key {
    const TYPE_NAME: &'static str = "pkix-base64-key";
    const BINARY_TAG: u64 = 554;

    fn validate_value(&self) -> Result<()> {
        self.der().map(|_| ())
    }

    fn encode_body(&self) -> CborValue {
        CborValue::Text(self.0.clone())
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        Ok(Self(cbor::expect_text("PKIX key", body)?))
    }

    fn encode_text(&self) -> JsonValue {
        JsonValue::String(self.0.clone())
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        Ok(Self(json::expect_string("PKIX key", value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const KEY: &str = "-----BEGIN PUBLIC KEY-----\nMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEFn0taoAwR3PmrKkYLtAsD9o05KSM\n6mbgfNCgpuL0g6VpTHkZl73wk5BDxoV7n+Oeee0iIqkW3HMZT3ETiniJdg==\n-----END PUBLIC KEY-----";

    #[test]
    fn test_pem_decodes() {
        let key = PkixBase64Key::new(KEY);
        assert!(key.validate_value().is_ok());
        assert_eq!(key.der().unwrap()[0], 0x30);
    }

    #[test]
    fn test_not_pem() {
        let err = PkixBase64Key::new("MFkwEwYHKoZIzj0").validate_value().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
