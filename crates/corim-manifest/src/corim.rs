//! Unsigned CoRIM (`unsigned-corim-map`)
//!
//! | key | JSON name        | value                                      |
//! |-----|------------------|--------------------------------------------|
//! | 0   | `corim-id`       | text or UUID                               |
//! | 1   | `tags`           | `[+ concise-tag]`                          |
//! | 2   | `dependent-rims` | `[+ {0 href, 1 thumbprint}]`               |
//! | 3   | `profile`        | URI (`#6.32`) or OID (`#6.111`)            |
//! | 4   | `validity`       | `{0 not-before, 1 not-after}`              |
//! | 5   | `entities`       | `[+ entity]`                               |
//!
//! The profile field is read before the tags so that CoMIDs are decoded with
//! the extension fields of the manifest's own profile.

use crate::comid::{Comid, COMID_TAG};
use crate::digest::Digest;
use crate::entity::{self, Entity, ManifestRole};
use crate::id::Identifier;
use crate::profile::{DecodeContext, ProfileId};
use crate::validity::Validity;
use chrono::{DateTime, Utc};
use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::values::TaggedUuid;
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, Document, JsonDecode, JsonEncode, JsonValue,
    Result, ResultExt, Staged, Validate,
};
use tracing::trace;

/// Manifest identifier: text or UUID
pub type ManifestId = Identifier;

/// Standalone tag of an unsigned CoRIM
pub const UNSIGNED_CORIM_TAG: u64 = 501;

/// Leading bytes of an embedded `#6.506` CoMID
const COMID_PREFIX: [u8; 3] = [0xd9, 0x01, 0xfa];

// ============================================================================
// Embedded tags
// ============================================================================

/// One entry of the manifest's `tags` list
#[derive(Debug, Clone, PartialEq)]
pub enum ConciseTag {
    /// Decoded CoMID
    Comid(Box<Comid>),
    /// Any other tag kind, kept as its encoded bytes
    Opaque(Vec<u8>),
}

impl ConciseTag {
    /// The CoMID, if this entry is one
    pub fn as_comid(&self) -> Option<&Comid> {
        match self {
            Self::Comid(comid) => Some(comid),
            Self::Opaque(_) => None,
        }
    }

    fn decode_cbor_in(value: CborValue, ctx: &DecodeContext) -> Result<Self> {
        let bytes = cbor::expect_bytes("concise tag", value)?;
        if !bytes.starts_with(&COMID_PREFIX) {
            trace!(len = bytes.len(), "keeping non-CoMID tag opaque");
            return Ok(Self::Opaque(bytes));
        }
        let inner = cbor::expect_tag("CoMID", cbor::from_slice(&bytes)?, COMID_TAG)?;
        Ok(Self::Comid(Box::new(Comid::decode_cbor_in(inner, ctx)?)))
    }

    fn decode_json_in(value: JsonValue, ctx: &DecodeContext) -> Result<Self> {
        let (kind, value) = json::split_type_and_value(value)?;
        match kind.as_str() {
            "comid" => Ok(Self::Comid(Box::new(Comid::decode_json_in(value, ctx)?))),
            "opaque" => Ok(Self::Opaque(json::expect_b64("opaque tag", value)?)),
            other => Err(CorimError::malformed(
                "concise tag",
                format!("unknown tag type {other:?}"),
            )),
        }
    }
}

impl Validate for ConciseTag {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Comid(comid) => comid.validate(),
            Self::Opaque(bytes) if bytes.is_empty() => {
                Err(CorimError::invalid("concise tag", "empty tag"))
            }
            Self::Opaque(_) => Ok(()),
        }
    }
}

impl CborEncode for ConciseTag {
    fn to_cbor_value(&self) -> CborValue {
        match self {
            Self::Comid(comid) => {
                cbor::embed(&CborValue::Tag(COMID_TAG, Box::new(comid.to_cbor_value())))
            }
            Self::Opaque(bytes) => CborValue::Bytes(bytes.clone()),
        }
    }
}

impl JsonEncode for ConciseTag {
    fn to_json_value(&self) -> JsonValue {
        match self {
            Self::Comid(comid) => json::typed("comid", comid.to_json_value()),
            Self::Opaque(bytes) => json::typed("opaque", JsonValue::String(json::b64_encode(bytes))),
        }
    }
}

// ============================================================================
// Locators
// ============================================================================

/// `corim-locator-map`: where to fetch a dependent manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// Manifest URI
    pub href: String,
    /// Digest of the referenced manifest
    pub thumbprint: Option<Digest>,
}

impl Locator {
    /// Locator without a thumbprint
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            thumbprint: None,
        }
    }
}

impl Validate for Locator {
    fn validate(&self) -> Result<()> {
        if self.href.is_empty() {
            return Err(CorimError::invalid("locator", "empty href"));
        }
        if let Some(thumbprint) = &self.thumbprint {
            thumbprint.validate().context("thumbprint")?;
        }
        Ok(())
    }
}

impl CborEncode for Locator {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert(0, cbor::uri(&self.href))
            .insert_opt(1, self.thumbprint.as_ref().map(Digest::to_cbor_value))
            .finish()
    }
}

impl CborDecode for Locator {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("locator", value)?;
        let href = cbor::expect_uri("href", map.required(0, "href")?)?;
        let thumbprint = map.take(1).map(Digest::from_cbor_value).transpose()?;
        map.finish()?;
        Ok(Self { href, thumbprint })
    }
}

impl JsonEncode for Locator {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("href", JsonValue::String(self.href.clone()))
            .insert_opt("thumbprint", self.thumbprint.as_ref().map(Digest::to_json_value))
            .finish()
    }
}

impl JsonDecode for Locator {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("locator", value)?;
        let href = json::expect_string("href", obj.required("href")?)?;
        let thumbprint = obj
            .take("thumbprint")
            .map(Digest::from_json_value)
            .transpose()?;
        obj.finish()?;
        Ok(Self { href, thumbprint })
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// `unsigned-corim-map`
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedManifest {
    /// Manifest identifier
    pub id: ManifestId,
    /// Embedded tags, at least one
    pub tags: Vec<ConciseTag>,
    /// Manifests this one depends on
    pub dependent_rims: Vec<Locator>,
    /// Profile governing the embedded tags
    pub profile: Option<ProfileId>,
    /// Validity window of the manifest
    pub validity: Option<Validity>,
    /// Entities responsible for the manifest
    pub entities: Vec<Entity<ManifestRole>>,
}

impl UnsignedManifest {
    /// Manifest with an identifier and no tags yet
    pub fn new(id: ManifestId) -> Self {
        Self {
            id,
            tags: Vec::new(),
            dependent_rims: Vec::new(),
            profile: None,
            validity: None,
            entities: Vec::new(),
        }
    }

    /// Append a CoMID after validating it
    pub fn add_comid(&mut self, comid: Comid) -> Result<&mut Self> {
        comid.validate().context("adding CoMID")?;
        self.tags.push(ConciseTag::Comid(Box::new(comid)));
        Ok(self)
    }

    /// Embedded CoMIDs in order
    pub fn comids(&self) -> impl Iterator<Item = &Comid> {
        self.tags.iter().filter_map(ConciseTag::as_comid)
    }

    /// Decode context selected by this manifest's profile
    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext::for_id(self.profile.as_ref())
    }

    /// Fail with `InvalidValue` if `now` is outside the validity window
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<()> {
        match &self.validity {
            Some(validity) => validity.check_at(now).context("manifest validity"),
            None => Ok(()),
        }
    }
}

impl Validate for UnsignedManifest {
    fn validate(&self) -> Result<()> {
        self.id.validate()?;
        if self.tags.is_empty() {
            return Err(CorimError::missing("tags"));
        }
        for (i, tag) in self.tags.iter().enumerate() {
            tag.validate()
                .with_context(|| format!("tag at index {i}"))?;
        }
        for (i, locator) in self.dependent_rims.iter().enumerate() {
            locator
                .validate()
                .with_context(|| format!("dependent RIM at index {i}"))?;
        }
        if let Some(profile) = &self.profile {
            profile.validate().context("profile")?;
        }
        if let Some(validity) = &self.validity {
            validity.validate().context("validity")?;
        }
        entity::validate_all(&self.entities).context("entities")
    }
}

impl CborEncode for UnsignedManifest {
    fn to_cbor_value(&self) -> CborValue {
        let rims = (!self.dependent_rims.is_empty())
            .then(|| cbor::array(self.dependent_rims.iter().map(Locator::to_cbor_value)));
        let entities = (!self.entities.is_empty())
            .then(|| cbor::array(self.entities.iter().map(Entity::to_cbor_value)));
        MapEncoder::new()
            .insert(0, self.id.to_cbor_value())
            .insert(1, cbor::array(self.tags.iter().map(ConciseTag::to_cbor_value)))
            .insert_opt(2, rims)
            .insert_opt(3, self.profile.as_ref().map(ProfileId::to_cbor_value))
            .insert_opt(4, self.validity.as_ref().map(Validity::to_cbor_value))
            .insert_opt(5, entities)
            .finish()
    }
}

impl CborDecode for UnsignedManifest {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("unsigned CoRIM", value)?;
        let profile = map
            .take(3)
            .map(ProfileId::from_cbor_value)
            .transpose()
            .context("profile")?;
        let ctx = DecodeContext::for_id(profile.as_ref());

        let id = ManifestId::from_cbor_value(map.required(0, "corim-id")?).context("corim-id")?;
        let tags = cbor::expect_array("tags", map.required(1, "tags")?)?
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                ConciseTag::decode_cbor_in(t, &ctx).with_context(|| format!("tag at index {i}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let dependent_rims = map
            .take(2)
            .map(|v| {
                cbor::expect_array("dependent-rims", v)?
                    .into_iter()
                    .map(Locator::from_cbor_value)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let validity = map
            .take(4)
            .map(Validity::from_cbor_value)
            .transpose()
            .context("validity")?;
        let entities = map
            .take(5)
            .map(|v| {
                cbor::expect_array("entities", v)?
                    .into_iter()
                    .map(Entity::from_cbor_value)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        map.finish()?;

        Ok(Self {
            id,
            tags,
            dependent_rims,
            profile,
            validity,
            entities,
        })
    }
}

impl JsonEncode for UnsignedManifest {
    fn to_json_value(&self) -> JsonValue {
        let rims = (!self.dependent_rims.is_empty()).then(|| {
            JsonValue::Array(self.dependent_rims.iter().map(Locator::to_json_value).collect())
        });
        let entities = (!self.entities.is_empty())
            .then(|| JsonValue::Array(self.entities.iter().map(Entity::to_json_value).collect()));
        ObjectEncoder::new()
            .insert("corim-id", self.id.to_json_value())
            .insert(
                "tags",
                JsonValue::Array(self.tags.iter().map(ConciseTag::to_json_value).collect()),
            )
            .insert_opt("dependent-rims", rims)
            .insert_opt("profile", self.profile.as_ref().map(ProfileId::to_json_value))
            .insert_opt("validity", self.validity.as_ref().map(Validity::to_json_value))
            .insert_opt("entities", entities)
            .finish()
    }
}

impl JsonDecode for UnsignedManifest {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("unsigned CoRIM", value)?;
        let profile = obj
            .take("profile")
            .map(ProfileId::from_json_value)
            .transpose()
            .context("profile")?;
        let ctx = DecodeContext::for_id(profile.as_ref());

        let id = ManifestId::from_json_value(obj.required("corim-id")?).context("corim-id")?;
        let tags = json::expect_array("tags", obj.required("tags")?)?
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                ConciseTag::decode_json_in(t, &ctx).with_context(|| format!("tag at index {i}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let dependent_rims = obj
            .take("dependent-rims")
            .map(|v| {
                json::expect_array("dependent-rims", v)?
                    .into_iter()
                    .map(Locator::from_json_value)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        let validity = obj
            .take("validity")
            .map(Validity::from_json_value)
            .transpose()
            .context("validity")?;
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
        obj.finish()?;

        Ok(Self {
            id,
            tags,
            dependent_rims,
            profile,
            validity,
            entities,
        })
    }
}

impl Document for UnsignedManifest {
    const NAME: &'static str = "unsigned CoRIM";
    const CBOR_TAG: Option<u64> = Some(UNSIGNED_CORIM_TAG);
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for an [`UnsignedManifest`]
///
/// Setters validate their arguments as they are supplied; the first failure
/// is kept and returned by [`ManifestBuilder::build`].
#[derive(Debug)]
pub struct ManifestBuilder {
    state: Staged<UnsignedManifest>,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestBuilder {
    /// Empty manifest with a placeholder id that must be replaced
    pub fn new() -> Self {
        Self {
            state: Staged::new(UnsignedManifest::new(ManifestId::text(""))),
        }
    }

    /// Set a text identifier
    pub fn id(mut self, id: impl Into<String>) -> Self {
        let id = ManifestId::text(id);
        self.state.apply("corim-id", |m| {
            id.validate()?;
            m.id = id;
            Ok(())
        });
        self
    }

    /// Set a UUID identifier
    pub fn id_uuid(mut self, id: TaggedUuid) -> Self {
        let id = ManifestId::Uuid(id);
        self.state.apply("corim-id", |m| {
            id.validate()?;
            m.id = id;
            Ok(())
        });
        self
    }

    /// Append a CoMID
    pub fn comid(mut self, comid: Comid) -> Self {
        self.state.apply("tag", |m| m.add_comid(comid).map(|_| ()));
        self
    }

    /// Append an opaque tag
    pub fn opaque_tag(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        let tag = ConciseTag::Opaque(bytes.into());
        self.state.apply("tag", |m| {
            tag.validate()?;
            m.tags.push(tag);
            Ok(())
        });
        self
    }

    /// Append a dependent manifest locator
    pub fn dependent_rim(mut self, locator: Locator) -> Self {
        self.state.apply("dependent RIM", |m| {
            locator.validate()?;
            m.dependent_rims.push(locator);
            Ok(())
        });
        self
    }

    /// Set the profile
    pub fn profile(mut self, profile: ProfileId) -> Self {
        self.state.apply("profile", |m| {
            profile.validate()?;
            m.profile = Some(profile);
            Ok(())
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

    /// Add an entity
    pub fn entity(mut self, entity: Entity<ManifestRole>) -> Self {
        self.state.apply("entity", |m| {
            entity.validate()?;
            m.entities.push(entity);
            Ok(())
        });
        self
    }

    /// Finish, validating the whole manifest
    pub fn build(self) -> Result<UnsignedManifest> {
        let manifest = self.state.finish()?;
        manifest
            .validate()
            .context("failed validation of unsigned CoRIM")?;
        Ok(manifest)
    }
}
