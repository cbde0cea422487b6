//! Signer metadata (`corim-meta-map`)
//!
//! Carried in protected header 8 of a signed manifest as an embedded CBOR
//! byte string. It names the signer and may bound the signature's validity.

use crate::validity::Validity;
use chrono::{DateTime, Utc};
use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, Document, JsonDecode, JsonEncode, JsonValue,
    Result, ResultExt, Staged, Validate,
};

/// `corim-signer-map`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    /// Signer name
    pub name: String,
    /// Signer URI
    pub uri: Option<String>,
}

impl Validate for Signer {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CorimError::invalid("signer", "empty name"));
        }
        if self.uri.as_deref() == Some("") {
            return Err(CorimError::invalid("signer", "empty URI"));
        }
        Ok(())
    }
}

impl CborEncode for Signer {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert(0, CborValue::Text(self.name.clone()))
            .insert_opt(1, self.uri.as_deref().map(cbor::uri))
            .finish()
    }
}

impl CborDecode for Signer {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("signer", value)?;
        let name = cbor::expect_text("signer name", map.required(0, "name")?)?;
        let uri = map
            .take(1)
            .map(|v| cbor::expect_uri("signer URI", v))
            .transpose()?;
        map.finish()?;
        Ok(Self { name, uri })
    }
}

impl JsonEncode for Signer {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("name", JsonValue::String(self.name.clone()))
            .insert_opt("uri", self.uri.clone().map(JsonValue::String))
            .finish()
    }
}

impl JsonDecode for Signer {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("signer", value)?;
        let name = json::expect_string("signer name", obj.required("name")?)?;
        let uri = obj
            .take("uri")
            .map(|v| json::expect_string("signer URI", v))
            .transpose()?;
        obj.finish()?;
        Ok(Self { name, uri })
    }
}

/// `corim-meta-map`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Who signed
    pub signer: Signer,
    /// Signature validity window
    pub validity: Option<Validity>,
}

impl Meta {
    /// Metadata naming a signer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            signer: Signer {
                name: name.into(),
                uri: None,
            },
            validity: None,
        }
    }

    /// Fail with `InvalidValue` if `now` is outside the validity window
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<()> {
        match &self.validity {
            Some(validity) => validity.check_at(now).context("signature validity"),
            None => Ok(()),
        }
    }
}

impl Validate for Meta {
    fn validate(&self) -> Result<()> {
        self.signer.validate().context("signer")?;
        if let Some(validity) = &self.validity {
            validity.validate().context("validity")?;
        }
        Ok(())
    }
}

impl CborEncode for Meta {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert(0, self.signer.to_cbor_value())
            .insert_opt(1, self.validity.as_ref().map(Validity::to_cbor_value))
            .finish()
    }
}

impl CborDecode for Meta {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("meta", value)?;
        let signer = Signer::from_cbor_value(map.required(0, "signer")?)?;
        let validity = map.take(1).map(Validity::from_cbor_value).transpose()?;
        map.finish()?;
        Ok(Self { signer, validity })
    }
}

impl JsonEncode for Meta {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("signer", self.signer.to_json_value())
            .insert_opt("validity", self.validity.as_ref().map(Validity::to_json_value))
            .finish()
    }
}

impl JsonDecode for Meta {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("meta", value)?;
        let signer = Signer::from_json_value(obj.required("signer")?)?;
        let validity = obj
            .take("validity")
            .map(Validity::from_json_value)
            .transpose()?;
        obj.finish()?;
        Ok(Self { signer, validity })
    }
}

impl Document for Meta {
    const NAME: &'static str = "CoRIM meta";
}

/// Builder for [`Meta`]
#[derive(Debug)]
pub struct MetaBuilder {
    state: Staged<Meta>,
}

impl MetaBuilder {
    /// Start with the signer's name
    pub fn new(name: impl Into<String>) -> Self {
        let meta = Meta::new(name);
        let mut state = Staged::new(meta);
        state.apply("signer", |m| m.signer.validate());
        Self { state }
    }

    /// Set the signer URI
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        self.state.apply("signer URI", |m| {
            m.signer.uri = Some(uri);
            m.signer.validate()
        });
        self
    }

    /// Set the validity window
    pub fn validity(mut self, validity: Validity) -> Self {
        self.state.apply("validity", |m| {
            validity.validate()?;
            m.validity = Some(validity);
            Ok(())
        });
        self
    }

    /// Finish
    pub fn build(self) -> Result<Meta> {
        self.state.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use corim_core::ErrorKind;

    // {0: {0: "ACME Ltd."}, 1: {1: 1(1605181526)}}
    const META: &str = "a200a1006941434d45204c74642e01a101c11a5fad2056";

    #[test]
    fn test_known_encoding() {
        let meta = MetaBuilder::new("ACME Ltd.")
            .validity(Validity::until(Utc.timestamp_opt(1605181526, 0).unwrap()))
            .build()
            .unwrap();
        let bytes = meta.to_cbor().unwrap();
        assert_eq!(hex::encode(&bytes), META);
        assert_eq!(Meta::from_cbor(&bytes).unwrap(), meta);
    }

    #[test]
    fn test_json_roundtrip() {
        let meta = MetaBuilder::new("ACME Ltd.")
            .uri("https://acme.example")
            .build()
            .unwrap();
        let text = meta.to_json().unwrap();
        assert!(text.contains("\"uri\":\"https://acme.example\""));
        assert_eq!(Meta::from_json(&text).unwrap(), meta);
    }

    #[test]
    fn test_empty_signer_name() {
        let err = MetaBuilder::new("").uri("x").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(err.to_string().starts_with("signer: "));
    }

    #[test]
    fn test_expired() {
        let meta = MetaBuilder::new("ACME Ltd.")
            .validity(Validity::until(Utc.timestamp_opt(1605181526, 0).unwrap()))
            .build()
            .unwrap();
        let later = Utc.timestamp_opt(1705181526, 0).unwrap();
        assert_eq!(meta.check_validity(later).unwrap_err().kind(), ErrorKind::InvalidValue);
    }
}
