use crate::codec::json::{self, ObjectDecoder};
use crate::codec::cbor;
use crate::errors::{CorimError, Result};
use crate::type_choice::TaggedValue;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;

/// Raw value with a bit mask selecting the bits that matter (`#6.563`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaskedRawValue {
    /// Expected bits
    pub value: Vec<u8>,
    /// Mask applied before comparison
    pub mask: Vec<u8>,
}

impl MaskedRawValue {
    /// Build from value and mask
    pub fn new(value: impl Into<Vec<u8>>, mask: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            mask: mask.into(),
        }
    }

    /// True if `candidate` equals `value` on every masked bit
    pub fn matches(&self, candidate: &[u8]) -> bool {
        candidate.len() == self.value.len()
            && candidate
                .iter()
                .zip(&self.value)
                .zip(&self.mask)
                .all(|((c, v), m)| c & m == v & m)
    }
}

impl TaggedValue for MaskedRawValue {
    const TYPE_NAME: &'static str = "masked-raw-value";
    const BINARY_TAG: u64 = 563;

    fn validate_value(&self) -> Result<()> {
        if self.value.is_empty() {
            return Err(CorimError::invalid("masked raw value", "empty value"));
        }
        if self.value.len() != self.mask.len() {
            return Err(CorimError::invalid(
                "masked raw value",
                format!(
                    "value ({}) and mask ({}) lengths differ",
                    self.value.len(),
                    self.mask.len()
                ),
            ));
        }
        Ok(())
    }

    fn encode_body(&self) -> CborValue {
        cbor::array([
            CborValue::Bytes(self.value.clone()),
            CborValue::Bytes(self.mask.clone()),
        ])
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        let mut items = cbor::expect_array_of("masked raw value", body, 2)?.into_iter();
        let (Some(value), Some(mask)) = (items.next(), items.next()) else {
            return Err(CorimError::malformed("masked raw value", "expecting [value, mask]"));
        };
        Ok(Self {
            value: cbor::expect_bytes("masked raw value", value)?,
            mask: cbor::expect_bytes("masked raw value mask", mask)?,
        })
    }

    fn encode_text(&self) -> JsonValue {
        serde_json::json!({
            "value": json::b64_encode(&self.value),
            "mask": json::b64_encode(&self.mask),
        })
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("masked raw value", value)?;
        let value = json::expect_b64("masked raw value", obj.required("value")?)?;
        let mask = json::expect_b64("masked raw value mask", obj.required("mask")?)?;
        obj.finish()?;
        Ok(Self { value, mask })
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        Some(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_length_mismatch_invalid() {
        let v = MaskedRawValue::new(vec![1, 2], vec![0xff]);
        assert_eq!(v.validate_value().unwrap_err().kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_matches() {
        let v = MaskedRawValue::new(vec![0xa0, 0x0f], vec![0xf0, 0x0f]);
        assert!(v.matches(&[0xab, 0xcf]));
        assert!(!v.matches(&[0xbb, 0xcf]));
        assert!(!v.matches(&[0xa0]));
    }

    #[test]
    fn test_body_shape() {
        let err = MaskedRawValue::decode_body(cbor::array([CborValue::Bytes(vec![1])])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }
}
