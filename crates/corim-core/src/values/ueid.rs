use crate::codec::{cbor, json};
use crate::errors::{CorimError, Result};
use crate::type_choice::TaggedValue;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;

/// Leading type byte of a UEID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeidType {
    /// Random, 16, 24 or 32 bytes after the type byte
    Rand,
    /// IEEE EUI, 6 bytes after the type byte
    Eui,
    /// 3GPP IMEI, 14 bytes after the type byte
    Imei,
}

impl UeidType {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Rand),
            0x02 => Some(Self::Eui),
            0x03 => Some(Self::Imei),
            _ => None,
        }
    }

    fn accepts_len(self, len: usize) -> bool {
        match self {
            Self::Rand => matches!(len, 17 | 25 | 33),
            Self::Eui => len == 7,
            Self::Imei => len == 15,
        }
    }
}

/// Universal Entity ID (`#6.550`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ueid(Vec<u8>);

impl Ueid {
    /// Wrap raw UEID bytes, type byte included
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// UEID type, if the leading byte is a known one
    pub fn ueid_type(&self) -> Option<UeidType> {
        self.0.first().copied().and_then(UeidType::from_byte)
    }
}

impl TaggedValue for Ueid {
    const TYPE_NAME: &'static str = "ueid";
    const BINARY_TAG: u64 = 550;

    fn validate_value(&self) -> Result<()> {
        let first = *self
            .0
            .first()
            .ok_or_else(|| CorimError::invalid("UEID", "empty"))?;
        let ty = UeidType::from_byte(first)
            .ok_or_else(|| CorimError::invalid("UEID", format!("unknown type byte {first:#04x}")))?;
        if !ty.accepts_len(self.0.len()) {
            return Err(CorimError::invalid(
                "UEID",
                format!("length {} not allowed for {ty:?}", self.0.len()),
            ));
        }
        Ok(())
    }

    fn encode_body(&self) -> CborValue {
        CborValue::Bytes(self.0.clone())
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        Ok(Self(cbor::expect_bytes("UEID", body)?))
    }

    fn encode_text(&self) -> JsonValue {
        JsonValue::String(json::b64_encode(&self.0))
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        Ok(Self(json::expect_b64("UEID", value)?))
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_lengths_per_type() {
        let mut rand = vec![0x01];
        rand.extend([0xab; 32]);
        assert!(Ueid::new(rand).validate_value().is_ok());

        let mut eui = vec![0x02];
        eui.extend([0xcd; 6]);
        let eui = Ueid::new(eui);
        assert!(eui.validate_value().is_ok());
        assert_eq!(eui.ueid_type(), Some(UeidType::Eui));

        let mut imei = vec![0x03];
        imei.extend([0x01; 13]);
        assert_eq!(
            Ueid::new(imei).validate_value().unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
    }

    #[test]
    fn test_unknown_type_byte() {
        let err = Ueid::new(vec![0x09; 17]).validate_value().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }
}
