//! Concise module identifier (CoMID) tags
//!
//! A CoMID names one module (its tag identity), who produced the tag, and
//! the triples describing the module: reference values, endorsed values and
//! key material. Inside a manifest a CoMID travels as
//! `bstr .cbor #6.506(concise-mid-tag)`.

mod environment;
pub(crate) mod measurement;
mod triples;

pub use environment::{Class, Environment};
pub use measurement::{Measurement, MeasurementBuilder, MeasurementValues, Version};
pub use triples::{KeyTriple, Triples, ValueTriple};

use crate::entity::{self, ComidRole, Entity};
use crate::id::Identifier;
use crate::profile::DecodeContext;
use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::values::TaggedUuid;
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, Document, JsonDecode, JsonEncode, JsonValue,
    Result, ResultExt, Staged, TypeChoice, Validate,
};

/// Tag identifier: text or UUID
pub type TagId = Identifier;

/// `tag-identity-map`
#[derive(Debug, Clone, PartialEq)]
pub struct TagIdentity {
    /// Tag identifier
    pub tag_id: TagId,
    /// Tag version
    pub version: Option<u64>,
}

impl Validate for TagIdentity {
    fn validate(&self) -> Result<()> {
        self.tag_id.validate().context("tag-id")
    }
}

impl CborEncode for TagIdentity {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert(0, self.tag_id.to_cbor_value())
            .insert_opt(1, self.version.map(cbor::uint))
            .finish()
    }
}

impl CborDecode for TagIdentity {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("tag-identity", value)?;
        let tag_id = TagId::from_cbor_value(map.required(0, "tag-id")?)?;
        let version = map
            .take(1)
            .map(|v| cbor::expect_uint("tag-version", v))
            .transpose()?;
        map.finish()?;
        Ok(Self { tag_id, version })
    }
}

impl JsonEncode for TagIdentity {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("id", self.tag_id.to_json_value())
            .insert_opt("version", self.version.map(JsonValue::from))
            .finish()
    }
}

impl JsonDecode for TagIdentity {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("tag-identity", value)?;
        let tag_id = TagId::from_json_value(obj.required("id")?)?;
        let version = obj
            .take("version")
            .map(|v| json::expect_u64("tag-version", v))
            .transpose()?;
        obj.finish()?;
        Ok(Self { tag_id, version })
    }
}

/// `concise-mid-tag`
#[derive(Debug, Clone, PartialEq)]
pub struct Comid {
    /// BCP 47 language tag
    pub language: Option<String>,
    /// Tag identity
    pub tag_identity: TagIdentity,
    /// Entities responsible for the tag
    pub entities: Vec<Entity<ComidRole>>,
    /// Triples
    pub triples: Triples,
}

impl Comid {
    /// Decode the map body with the extension fields of `ctx`
    pub fn decode_cbor_in(value: CborValue, ctx: &DecodeContext) -> Result<Self> {
        let mut map = MapDecoder::new("comid", value)?;
        let language = map
            .take(0)
            .map(|v| cbor::expect_text("language", v))
            .transpose()?;
        let tag_identity = TagIdentity::from_cbor_value(map.required(1, "tag-identity")?)
            .context("tag-identity")?;
        let entities = map
            .take(2)
            .map(|v| {
                cbor::expect_array("entities", v)?
                    .into_iter()
                    .map(Entity::from_cbor_value)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let triples =
            Triples::decode_cbor_in(map.required(4, "triples")?, ctx).context("triples")?;
        map.finish()?;
        Ok(Self {
            language,
            tag_identity,
            entities,
            triples,
        })
    }

    /// Decode the JSON object with the extension fields of `ctx`
    pub fn decode_json_in(value: JsonValue, ctx: &DecodeContext) -> Result<Self> {
        let mut obj = ObjectDecoder::new("comid", value)?;
        let language = obj
            .take("lang")
            .map(|v| json::expect_string("lang", v))
            .transpose()?;
        let tag_identity = TagIdentity::from_json_value(obj.required("tag-identity")?)
            .context("tag-identity")?;
        let entities = obj
            .take("entities")
            .map(|v| {
                json::expect_array("entities", v)?
                    .into_iter()
                    .map(Entity::from_json_value)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let triples =
            Triples::decode_json_in(obj.required("triples")?, ctx).context("triples")?;
        obj.finish()?;
        Ok(Self {
            language,
            tag_identity,
            entities,
            triples,
        })
    }

    /// Decode standalone CBOR bytes with the extension fields of `ctx`
    ///
    /// The `#6.506` tag is optional on input.
    pub fn from_cbor_in(bytes: &[u8], ctx: &DecodeContext) -> Result<Self> {
        let value = match cbor::from_slice(bytes)? {
            CborValue::Tag(tag, body) if tag == COMID_TAG => *body,
            CborValue::Tag(tag, _) => {
                return Err(CorimError::malformed(
                    "CoMID",
                    format!("expecting tag {COMID_TAG}, got {tag}"),
                ))
            }
            other => other,
        };
        let comid = Self::decode_cbor_in(value, ctx).context("decoding CoMID")?;
        comid.validate().context("failed validation of CoMID")?;
        Ok(comid)
    }

    /// Decode JSON text with the extension fields of `ctx`
    pub fn from_json_in(text: &str, ctx: &DecodeContext) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(text)?;
        let comid = Self::decode_json_in(value, ctx).context("decoding CoMID")?;
        comid.validate().context("failed validation of CoMID")?;
        Ok(comid)
    }
}

/// Standalone tag of a CoMID
pub const COMID_TAG: u64 = 506;

impl Validate for Comid {
    fn validate(&self) -> Result<()> {
        if self.language.as_deref() == Some("") {
            return Err(CorimError::invalid("comid", "empty language"));
        }
        self.tag_identity
            .validate()
            .context("tag-identity validation failed")?;
        entity::validate_all(&self.entities).context("entities validation failed")?;
        self.triples
            .validate()
            .context("triples validation failed")
    }
}

impl CborEncode for Comid {
    fn to_cbor_value(&self) -> CborValue {
        let entities = (!self.entities.is_empty())
            .then(|| cbor::array(self.entities.iter().map(Entity::to_cbor_value)));
        MapEncoder::new()
            .insert_opt(0, self.language.clone().map(CborValue::Text))
            .insert(1, self.tag_identity.to_cbor_value())
            .insert_opt(2, entities)
            .insert(4, self.triples.to_cbor_value())
            .finish()
    }
}

impl CborDecode for Comid {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        Self::decode_cbor_in(value, &DecodeContext::default())
    }
}

impl JsonEncode for Comid {
    fn to_json_value(&self) -> JsonValue {
        let entities = (!self.entities.is_empty())
            .then(|| JsonValue::Array(self.entities.iter().map(Entity::to_json_value).collect()));
        ObjectEncoder::new()
            .insert_opt("lang", self.language.clone().map(JsonValue::String))
            .insert("tag-identity", self.tag_identity.to_json_value())
            .insert_opt("entities", entities)
            .insert("triples", self.triples.to_json_value())
            .finish()
    }
}

impl JsonDecode for Comid {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::decode_json_in(value, &DecodeContext::default())
    }
}

impl Document for Comid {
    const NAME: &'static str = "CoMID";
    const CBOR_TAG: Option<u64> = Some(COMID_TAG);
}

/// Builder for a [`Comid`]
///
/// Setters validate their arguments as they are supplied. The first failure
/// is kept and returned by [`ComidBuilder::build`]; later setters are
/// skipped.
#[derive(Debug)]
pub struct ComidBuilder {
    state: Staged<Comid>,
}

impl Default for ComidBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ComidBuilder {
    /// Empty CoMID with a placeholder tag id that must be replaced
    pub fn new() -> Self {
        Self {
            state: Staged::new(Comid {
                language: None,
                tag_identity: TagIdentity {
                    tag_id: TagId::text(""),
                    version: None,
                },
                entities: Vec::new(),
                triples: Triples::default(),
            }),
        }
    }

    /// Set the language tag
    pub fn language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        self.state.apply("language", |c| {
            if language.is_empty() {
                return Err(CorimError::invalid("comid", "empty language"));
            }
            c.language = Some(language);
            Ok(())
        });
        self
    }

    /// Set a text tag id
    pub fn tag_id(mut self, id: impl Into<String>) -> Self {
        let id = TagId::text(id);
        self.state.apply("tag-id", |c| {
            id.validate()?;
            c.tag_identity.tag_id = id;
            Ok(())
        });
        self
    }

    /// Set a UUID tag id
    pub fn tag_id_uuid(mut self, id: TaggedUuid) -> Self {
        let id = TagId::Uuid(id);
        self.state.apply("tag-id", |c| {
            id.validate()?;
            c.tag_identity.tag_id = id;
            Ok(())
        });
        self
    }

    /// Set the tag version
    pub fn tag_version(mut self, version: u64) -> Self {
        self.state.apply("tag-version", |c| {
            c.tag_identity.version = Some(version);
            Ok(())
        });
        self
    }

    /// Add an entity
    pub fn entity(mut self, entity: Entity<ComidRole>) -> Self {
        self.state.apply("entity", |c| {
            entity.validate()?;
            c.entities.push(entity);
            Ok(())
        });
        self
    }

    /// Add a reference-value triple
    pub fn reference_value(mut self, env: Environment, measurement: Measurement) -> Self {
        self.state.apply("reference value", |c| {
            let triple = ValueTriple::new(env, vec![measurement]);
            triple.validate()?;
            c.triples.reference_values.push(triple);
            Ok(())
        });
        self
    }

    /// Add an endorsed-value triple
    pub fn endorsed_value(mut self, env: Environment, measurement: Measurement) -> Self {
        self.state.apply("endorsed value", |c| {
            let triple = ValueTriple::new(env, vec![measurement]);
            triple.validate()?;
            c.triples.endorsed_values.push(triple);
            Ok(())
        });
        self
    }

    /// Add a device identity key triple
    pub fn identity_key(mut self, env: Environment, keys: Vec<TypeChoice>) -> Self {
        self.state.apply("identity key", |c| {
            let triple = KeyTriple::new(env, keys);
            triple.validate()?;
            c.triples.identity_keys.push(triple);
            Ok(())
        });
        self
    }

    /// Add an attestation verification key triple
    pub fn attest_key(mut self, env: Environment, keys: Vec<TypeChoice>) -> Self {
        self.state.apply("attestation key", |c| {
            let triple = KeyTriple::new(env, keys);
            triple.validate()?;
            c.triples.attest_keys.push(triple);
            Ok(())
        });
        self
    }

    /// Finish, validating the whole tag
    pub fn build(self) -> Result<Comid> {
        let comid = self.state.finish()?;
        comid.validate().context("failed validation of CoMID")?;
        Ok(comid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::values::{Oid, TaggedBytes};
    use corim_core::ErrorKind;

    fn sample() -> Comid {
        let env = Environment::with_class(Class {
            class_id: Some(TypeChoice::new(Oid::parse("2.5.2.8192").unwrap()).unwrap()),
            vendor: Some("ACME Inc.".into()),
            model: Some("RoadRunner".into()),
            ..Class::default()
        });
        ComidBuilder::new()
            .language("en-GB")
            .tag_id("acme-roadrunner-fw")
            .tag_version(0)
            .entity(Entity::new(
                "ACME Ltd.",
                vec![ComidRole::TagCreator, ComidRole::Creator],
            ))
            .reference_value(
                env,
                MeasurementBuilder::new()
                    .svn(2)
                    .raw_value(vec![0x01, 0x02])
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_document_roundtrip() {
        let comid = sample();
        let bytes = comid.to_cbor().unwrap();
        assert_eq!(&bytes[..3], &[0xd9, 0x01, 0xfa]);
        assert_eq!(Comid::from_cbor(&bytes).unwrap(), comid);
        assert_eq!(Comid::from_json(&comid.to_json().unwrap()).unwrap(), comid);
    }

    #[test]
    fn test_builder_requires_tag_id() {
        let err = ComidBuilder::new()
            .reference_value(
                Environment::with_instance(TypeChoice::new(TaggedBytes::new(vec![1])).unwrap()),
                MeasurementBuilder::new().name("x").build().unwrap(),
            )
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyIdentifier);
    }

    #[test]
    fn test_builder_first_error_wins() {
        let err = ComidBuilder::new()
            .tag_id("")
            .language("")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyIdentifier);
        assert!(err.to_string().starts_with("tag-id: "));
    }

    #[test]
    fn test_missing_triples() {
        let value = MapEncoder::new()
            .insert(1, sample().tag_identity.to_cbor_value())
            .finish();
        let err = Comid::from_cbor_value(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }
}
