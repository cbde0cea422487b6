//! PSA profile (`http://arm.com/psa/iot/1`)
//!
//! Adds two type-choice variants: the implementation id used as a class id
//! and the reference-value id used as a measurement key.

use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::{CborValue, CorimError, JsonValue, Result, TaggedValue};
use corim_manifest::profile::register_profile;
use corim_manifest::{Profile, ProfileId};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Profile identifier
pub const PROFILE_ID: &str = "http://arm.com/psa/iot/1";

/// Implementation id length
pub const IMPL_ID_LEN: usize = 32;

/// PSA implementation id (`#6.600`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImplId([u8; IMPL_ID_LEN]);

impl ImplId {
    /// Wrap 32 bytes
    pub fn new(bytes: [u8; IMPL_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, failing unless it is 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array = bytes.try_into().map_err(|_| {
            CorimError::invalid(
                "PSA implementation id",
                format!("expecting {IMPL_ID_LEN} bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Self(array))
    }

    /// Inner bytes
    pub fn as_bytes(&self) -> &[u8; IMPL_ID_LEN] {
        &self.0
    }
}

impl TaggedValue for ImplId {
    const TYPE_NAME: &'static str = "psa.impl-id";
    const BINARY_TAG: u64 = 600;

    fn validate_value(&self) -> Result<()> {
        Ok(())
    }

    fn encode_body(&self) -> CborValue {
        CborValue::Bytes(self.0.to_vec())
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        Self::from_slice(&cbor::expect_bytes("PSA implementation id", body)?)
    }

    fn encode_text(&self) -> JsonValue {
        JsonValue::String(json::b64_encode(&self.0))
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        Self::from_slice(&json::expect_b64("PSA implementation id", value)?)
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        Some(self.0.to_vec())
    }
}

/// PSA reference-value id (`#6.601`)
///
/// Names a firmware component by label, version and the hash of its
/// signing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefValId {
    /// Component label, e.g. `BL`
    pub label: Option<String>,
    /// Component version
    pub version: Option<String>,
    /// Hash of the signing key
    pub signer_id: Vec<u8>,
}

impl RefValId {
    /// Id with only a signer id
    pub fn new(signer_id: impl Into<Vec<u8>>) -> Self {
        Self {
            label: None,
            version: None,
            signer_id: signer_id.into(),
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl TaggedValue for RefValId {
    const TYPE_NAME: &'static str = "psa.refval-id";
    const BINARY_TAG: u64 = 601;

    fn validate_value(&self) -> Result<()> {
        if !(32..=64).contains(&self.signer_id.len()) {
            return Err(CorimError::invalid(
                "PSA refval id",
                format!(
                    "signer-id must be 32 to 64 bytes, got {}",
                    self.signer_id.len()
                ),
            ));
        }
        if self.label.as_deref() == Some("") || self.version.as_deref() == Some("") {
            return Err(CorimError::invalid("PSA refval id", "empty label or version"));
        }
        Ok(())
    }

    fn encode_body(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(1, self.label.clone().map(CborValue::Text))
            .insert_opt(4, self.version.clone().map(CborValue::Text))
            .insert(5, CborValue::Bytes(self.signer_id.clone()))
            .finish()
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("PSA refval id", body)?;
        let label = map
            .take(1)
            .map(|v| cbor::expect_text("PSA label", v))
            .transpose()?;
        let version = map
            .take(4)
            .map(|v| cbor::expect_text("PSA version", v))
            .transpose()?;
        let signer_id = cbor::expect_bytes("PSA signer-id", map.required(5, "signer-id")?)?;
        map.finish()?;
        Ok(Self {
            label,
            version,
            signer_id,
        })
    }

    fn encode_text(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert_opt("label", self.label.clone().map(JsonValue::String))
            .insert_opt("version", self.version.clone().map(JsonValue::String))
            .insert("signer-id", JsonValue::String(json::b64_encode(&self.signer_id)))
            .finish()
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("PSA refval id", value)?;
        let label = obj
            .take("label")
            .map(|v| json::expect_string("PSA label", v))
            .transpose()?;
        let version = obj
            .take("version")
            .map(|v| json::expect_string("PSA version", v))
            .transpose()?;
        let signer_id = json::expect_b64("PSA signer-id", obj.required("signer-id")?)?;
        obj.finish()?;
        Ok(Self {
            label,
            version,
            signer_id,
        })
    }
}

/// Profile record
pub fn profile() -> Result<Profile> {
    Ok(Profile::new(ProfileId::parse(PROFILE_ID)?)
        .with_type_choice::<ImplId>()
        .with_type_choice::<RefValId>())
}

static REGISTERED: OnceCell<Arc<Profile>> = OnceCell::new();

/// Register the profile once per process
pub fn init() -> Result<Arc<Profile>> {
    REGISTERED
        .get_or_try_init(|| {
            tracing::debug!(profile = PROFILE_ID, "initialising PSA profile");
            register_profile(profile()?)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::{ErrorKind, TypeChoice};

    #[test]
    fn test_impl_id_length() {
        let err = ImplId::from_slice(&[0; 31]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(ImplId::from_slice(&[7; 32]).unwrap().as_bytes(), &[7; 32]);
    }

    #[test]
    fn test_refval_id_signer_id_bounds() {
        assert!(RefValId::new(vec![0; 31]).validate_value().is_err());
        assert!(RefValId::new(vec![0; 65]).validate_value().is_err());
        RefValId::new(vec![0; 48]).validate_value().unwrap();
        assert!(RefValId::new(vec![0; 32])
            .with_label("")
            .validate_value()
            .is_err());
    }

    #[test]
    fn test_refval_id_roundtrip() {
        init().unwrap();
        let id = RefValId::new(vec![0xac; 32])
            .with_label("BL")
            .with_version("2.1.0");
        let choice = TypeChoice::new(id.clone()).unwrap();
        assert_eq!(choice.type_name(), "psa.refval-id");

        let back = TypeChoice::from_cbor_value(choice.to_cbor_value()).unwrap();
        assert_eq!(back.downcast_ref::<RefValId>(), Some(&id));
        let back = TypeChoice::from_json_value(choice.to_json_value()).unwrap();
        assert_eq!(back.downcast_ref::<RefValId>(), Some(&id));
    }

    #[test]
    fn test_init_is_idempotent() {
        let a = init().unwrap();
        let b = init().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
