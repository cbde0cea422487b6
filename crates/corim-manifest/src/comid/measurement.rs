//! Measurements and measurement values
//!
//! `measurement-values-map` carries the core fields below plus whatever
//! extension fields the active profile defines. Decoding therefore takes a
//! [`DecodeContext`]; the plain `CborDecode`/`JsonDecode` impls decode with
//! core fields only.
//!
//! | key | JSON name        | value                                |
//! |-----|------------------|--------------------------------------|
//! | 0   | `version`        | `{0 value, 1 scheme}`                |
//! | 1   | `svn`            | `svn` / `min-svn`, or a plain uint   |
//! | 2   | `digests`        | `[+ [alg, bytes]]`                   |
//! | 4   | `raw-value`      | `bytes` / `masked-raw-value`         |
//! | 5   | `raw-value-mask` | bstr                                 |
//! | 8   | `serial-number`  | tstr                                 |
//! | 9   | `ueid`           | untagged UEID bstr                   |
//! | 10  | `uuid`           | untagged 16-byte bstr                |
//! | 11  | `name`           | tstr                                 |

use crate::digest::{self, Digest};
use crate::extensions::{ExtensionField, ExtensionValue, Extensions};
use crate::profile::DecodeContext;
use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::values::{MaskedRawValue, MinSvn, Svn, TaggedBytes, TaggedUuid, Ueid};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    ResultExt, Staged, TaggedValue, TypeChoice, Validate,
};

/// JSON member names of the core fields
pub(crate) const CORE_MEMBERS: [&str; 9] = [
    "version",
    "svn",
    "digests",
    "raw-value",
    "raw-value-mask",
    "serial-number",
    "ueid",
    "uuid",
    "name",
];

// ============================================================================
// Version
// ============================================================================

/// Version schemes: (code, name)
const VERSION_SCHEMES: &[(i64, &str)] = &[
    (1, "multipartnumeric"),
    (2, "multipartnumeric+suffix"),
    (3, "alphanumeric"),
    (4, "decimal"),
    (16384, "semver"),
];

fn scheme_name(code: i64) -> Option<&'static str> {
    VERSION_SCHEMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
}

fn scheme_code(name: &str) -> Option<i64> {
    VERSION_SCHEMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(c, _)| *c)
}

/// `version-map`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Version string
    pub version: String,
    /// Version scheme code
    pub scheme: Option<i64>,
}

impl Version {
    /// Version with an optional scheme
    pub fn new(version: impl Into<String>, scheme: Option<i64>) -> Self {
        Self {
            version: version.into(),
            scheme,
        }
    }

    /// Semantic version
    pub fn semver(version: impl Into<String>) -> Self {
        Self::new(version, Some(16384))
    }
}

impl Validate for Version {
    fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(CorimError::invalid("version", "empty version"));
        }
        Ok(())
    }
}

impl CborEncode for Version {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert(0, CborValue::Text(self.version.clone()))
            .insert_opt(1, self.scheme.map(cbor::int))
            .finish()
    }
}

impl CborDecode for Version {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("version", value)?;
        let version = cbor::expect_text("version", map.required(0, "version")?)?;
        let scheme = map
            .take(1)
            .map(|v| cbor::expect_int("version scheme", v))
            .transpose()?;
        map.finish()?;
        Ok(Self { version, scheme })
    }
}

impl JsonEncode for Version {
    fn to_json_value(&self) -> JsonValue {
        let scheme = self.scheme.map(|code| match scheme_name(code) {
            Some(name) => JsonValue::String(name.to_string()),
            None => JsonValue::from(code),
        });
        ObjectEncoder::new()
            .insert("value", JsonValue::String(self.version.clone()))
            .insert_opt("scheme", scheme)
            .finish()
    }
}

impl JsonDecode for Version {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("version", value)?;
        let version = json::expect_string("version", obj.required("value")?)?;
        let scheme = match obj.take("scheme") {
            None => None,
            Some(JsonValue::String(name)) => Some(scheme_code(&name).ok_or_else(|| {
                CorimError::malformed("version scheme", format!("unknown scheme {name:?}"))
            })?),
            Some(other) => Some(json::expect_i64("version scheme", other)?),
        };
        obj.finish()?;
        Ok(Self { version, scheme })
    }
}

// ============================================================================
// Measurement values
// ============================================================================

/// `measurement-values-map`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementValues {
    /// Version
    pub version: Option<Version>,
    /// Exact or minimum security version number
    pub svn: Option<TypeChoice>,
    /// Digests of the measured object
    pub digests: Option<Vec<Digest>>,
    /// Raw value, plain bytes or masked
    pub raw_value: Option<TypeChoice>,
    /// Mask applied to a plain raw value
    pub raw_value_mask: Option<Vec<u8>>,
    /// Serial number
    pub serial_number: Option<String>,
    /// Universal entity id
    pub ueid: Option<Ueid>,
    /// UUID
    pub uuid: Option<TaggedUuid>,
    /// Name
    pub name: Option<String>,
    /// Profile extension fields
    pub extensions: Extensions,
}

impl MeasurementValues {
    fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.svn.is_none()
            && self.digests.is_none()
            && self.raw_value.is_none()
            && self.raw_value_mask.is_none()
            && self.serial_number.is_none()
            && self.ueid.is_none()
            && self.uuid.is_none()
            && self.name.is_none()
            && self.extensions.is_empty()
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_cbor_in(value: CborValue, ctx: &DecodeContext) -> Result<Self> {
        let mut map = MapDecoder::new("measurement values", value)?;
        let mut mval = Self {
            version: map
                .take(0)
                .map(Version::from_cbor_value)
                .transpose()
                .context("version")?,
            svn: map.take(1).map(decode_svn_cbor).transpose().context("svn")?,
            digests: map
                .take(2)
                .map(|v| {
                    cbor::expect_array("digests", v)?
                        .into_iter()
                        .map(Digest::from_cbor_value)
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()
                .context("digests")?,
            raw_value: map
                .take(4)
                .map(TypeChoice::from_cbor_value)
                .transpose()
                .context("raw value")?,
            raw_value_mask: map
                .take(5)
                .map(|v| cbor::expect_bytes("raw value mask", v))
                .transpose()?,
            serial_number: map
                .take(8)
                .map(|v| cbor::expect_text("serial number", v))
                .transpose()?,
            ueid: map
                .take(9)
                .map(|v| Ok::<_, CorimError>(Ueid::new(cbor::expect_bytes("ueid", v)?)))
                .transpose()?,
            uuid: map
                .take(10)
                .map(|v| TaggedUuid::from_slice(&cbor::expect_bytes("uuid", v)?))
                .transpose()?,
            name: map
                .take(11)
                .map(|v| cbor::expect_text("name", v))
                .transpose()?,
            extensions: Extensions::new(),
        };
        mval.extensions = Extensions::from_cbor_entries(ctx.extension_fields(), map.take_remaining())?;
        Ok(mval)
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_json_in(value: JsonValue, ctx: &DecodeContext) -> Result<Self> {
        let mut obj = ObjectDecoder::new("measurement values", value)?;
        let mut mval = Self {
            version: obj
                .take("version")
                .map(Version::from_json_value)
                .transpose()
                .context("version")?,
            svn: obj
                .take("svn")
                .map(TypeChoice::from_json_value)
                .transpose()
                .context("svn")?,
            digests: obj
                .take("digests")
                .map(|v| {
                    json::expect_array("digests", v)?
                        .into_iter()
                        .map(Digest::from_json_value)
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()
                .context("digests")?,
            raw_value: obj
                .take("raw-value")
                .map(TypeChoice::from_json_value)
                .transpose()
                .context("raw value")?,
            raw_value_mask: obj
                .take("raw-value-mask")
                .map(|v| json::expect_b64("raw value mask", v))
                .transpose()?,
            serial_number: obj
                .take("serial-number")
                .map(|v| json::expect_string("serial number", v))
                .transpose()?,
            ueid: obj.take("ueid").map(Ueid::decode_text).transpose()?,
            uuid: obj.take("uuid").map(TaggedUuid::decode_text).transpose()?,
            name: obj
                .take("name")
                .map(|v| json::expect_string("name", v))
                .transpose()?,
            extensions: Extensions::new(),
        };
        mval.extensions = Extensions::from_json_members(ctx.extension_fields(), obj.take_remaining())?;
        Ok(mval)
    }
}

/// A plain uint in the svn slot is an exact svn
fn decode_svn_cbor(value: CborValue) -> Result<TypeChoice> {
    match value {
        CborValue::Integer(_) => TypeChoice::new(Svn::new(cbor::expect_uint("svn", value)?)),
        tagged => TypeChoice::from_cbor_value(tagged),
    }
}

fn non_empty(what: &str, text: &Option<String>) -> Result<()> {
    match text {
        Some(t) if t.is_empty() => Err(CorimError::invalid(what, format!("empty {what}"))),
        _ => Ok(()),
    }
}

impl Validate for MeasurementValues {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(CorimError::invalid(
                "measurement values",
                "no measurement value set",
            ));
        }
        if let Some(version) = &self.version {
            version.validate().context("version")?;
        }
        if let Some(svn) = &self.svn {
            if !(svn.is::<Svn>() || svn.is::<MinSvn>()) {
                return Err(CorimError::invalid(
                    "svn",
                    format!("expecting svn or min-svn, got {}", svn.type_name()),
                ));
            }
        }
        if let Some(digests) = &self.digests {
            digest::validate_digests(digests)?;
        }
        if let Some(raw) = &self.raw_value {
            if !(raw.is::<TaggedBytes>() || raw.is::<MaskedRawValue>()) {
                return Err(CorimError::invalid(
                    "raw value",
                    format!("expecting bytes or masked-raw-value, got {}", raw.type_name()),
                ));
            }
            raw.validate().context("raw value")?;
        }
        if let Some(mask) = &self.raw_value_mask {
            let Some(raw) = self.raw_value.as_ref().and_then(|r| r.downcast_ref::<TaggedBytes>())
            else {
                return Err(CorimError::invalid(
                    "raw value mask",
                    "mask requires a plain raw value",
                ));
            };
            if mask.len() != raw.as_slice().len() {
                return Err(CorimError::invalid(
                    "raw value mask",
                    format!(
                        "mask length {} does not match raw value length {}",
                        mask.len(),
                        raw.as_slice().len()
                    ),
                ));
            }
        }
        non_empty("serial number", &self.serial_number)?;
        if let Some(ueid) = &self.ueid {
            ueid.validate_value().context("ueid")?;
        }
        if let Some(uuid) = &self.uuid {
            uuid.validate_value().context("uuid")?;
        }
        non_empty("name", &self.name)?;
        self.extensions.validate()
    }
}

impl CborEncode for MeasurementValues {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(0, self.version.as_ref().map(Version::to_cbor_value))
            .insert_opt(1, self.svn.as_ref().map(TypeChoice::to_cbor_value))
            .insert_opt(
                2,
                self.digests
                    .as_ref()
                    .map(|d| cbor::array(d.iter().map(Digest::to_cbor_value))),
            )
            .insert_opt(4, self.raw_value.as_ref().map(TypeChoice::to_cbor_value))
            .insert_opt(5, self.raw_value_mask.clone().map(CborValue::Bytes))
            .insert_opt(8, self.serial_number.clone().map(CborValue::Text))
            .insert_opt(9, self.ueid.as_ref().map(Ueid::encode_body))
            .insert_opt(
                10,
                self.uuid
                    .map(|u| CborValue::Bytes(u.as_uuid().as_bytes().to_vec())),
            )
            .insert_opt(11, self.name.clone().map(CborValue::Text))
            .extend(self.extensions.cbor_entries())
            .finish()
    }
}

impl CborDecode for MeasurementValues {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        Self::decode_cbor_in(value, &DecodeContext::default())
    }
}

impl JsonEncode for MeasurementValues {
    fn to_json_value(&self) -> JsonValue {
        let mut obj = ObjectEncoder::new()
            .insert_opt("version", self.version.as_ref().map(Version::to_json_value))
            .insert_opt("svn", self.svn.as_ref().map(TypeChoice::to_json_value))
            .insert_opt(
                "digests",
                self.digests
                    .as_ref()
                    .map(|d| JsonValue::Array(d.iter().map(Digest::to_json_value).collect())),
            )
            .insert_opt("raw-value", self.raw_value.as_ref().map(TypeChoice::to_json_value))
            .insert_opt(
                "raw-value-mask",
                self.raw_value_mask
                    .as_ref()
                    .map(|m| JsonValue::String(json::b64_encode(m))),
            )
            .insert_opt("serial-number", self.serial_number.clone().map(JsonValue::String))
            .insert_opt("ueid", self.ueid.as_ref().map(Ueid::encode_text))
            .insert_opt("uuid", self.uuid.as_ref().map(TaggedUuid::encode_text))
            .insert_opt("name", self.name.clone().map(JsonValue::String));
        for (name, value) in self.extensions.json_members() {
            obj = obj.insert(&name, value);
        }
        obj.finish()
    }
}

impl JsonDecode for MeasurementValues {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::decode_json_in(value, &DecodeContext::default())
    }
}

// ============================================================================
// Measurement
// ============================================================================

/// `measurement-map`: optional key plus values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    /// Measured-element key type choice
    pub key: Option<TypeChoice>,
    /// Measured values
    pub values: MeasurementValues,
}

impl Measurement {
    /// Decode with the extension fields of `ctx`
    pub fn decode_cbor_in(value: CborValue, ctx: &DecodeContext) -> Result<Self> {
        let mut map = MapDecoder::new("measurement", value)?;
        let key = map
            .take(0)
            .map(TypeChoice::from_cbor_value)
            .transpose()
            .context("measurement key")?;
        let values = MeasurementValues::decode_cbor_in(map.required(1, "values")?, ctx)?;
        map.finish()?;
        Ok(Self { key, values })
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_json_in(value: JsonValue, ctx: &DecodeContext) -> Result<Self> {
        let mut obj = ObjectDecoder::new("measurement", value)?;
        let key = obj
            .take("key")
            .map(TypeChoice::from_json_value)
            .transpose()
            .context("measurement key")?;
        let values = MeasurementValues::decode_json_in(obj.required("value")?, ctx)?;
        obj.finish()?;
        Ok(Self { key, values })
    }
}

impl Validate for Measurement {
    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.key {
            key.validate().context("measurement key")?;
        }
        self.values.validate()
    }
}

impl CborEncode for Measurement {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(0, self.key.as_ref().map(TypeChoice::to_cbor_value))
            .insert(1, self.values.to_cbor_value())
            .finish()
    }
}

impl CborDecode for Measurement {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        Self::decode_cbor_in(value, &DecodeContext::default())
    }
}

impl JsonEncode for Measurement {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert_opt("key", self.key.as_ref().map(TypeChoice::to_json_value))
            .insert("value", self.values.to_json_value())
            .finish()
    }
}

impl JsonDecode for Measurement {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::decode_json_in(value, &DecodeContext::default())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for a [`Measurement`]
///
/// Each setter validates its argument; the first failure is returned by
/// [`MeasurementBuilder::build`].
#[derive(Debug, Default)]
pub struct MeasurementBuilder {
    state: Staged<Measurement>,
}

impl MeasurementBuilder {
    /// Empty measurement
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the measurement key
    pub fn key<T: TaggedValue>(mut self, key: T) -> Self {
        self.state.apply("measurement key", |m| {
            m.key = Some(TypeChoice::new(key)?);
            Ok(())
        });
        self
    }

    /// Set the version
    pub fn version(mut self, version: Version) -> Self {
        self.state.apply("version", |m| {
            version.validate()?;
            m.values.version = Some(version);
            Ok(())
        });
        self
    }

    /// Set an exact security version number
    pub fn svn(mut self, svn: u64) -> Self {
        self.state.apply("svn", |m| {
            m.values.svn = Some(TypeChoice::new(Svn::new(svn))?);
            Ok(())
        });
        self
    }

    /// Set a minimum security version number
    pub fn min_svn(mut self, svn: u64) -> Self {
        self.state.apply("min-svn", |m| {
            m.values.svn = Some(TypeChoice::new(MinSvn::new(svn))?);
            Ok(())
        });
        self
    }

    /// Append a digest
    pub fn digest(mut self, digest: Digest) -> Self {
        self.state.apply("digest", |m| {
            digest.validate()?;
            m.values.digests.get_or_insert_with(Vec::new).push(digest);
            Ok(())
        });
        self
    }

    /// Set a plain raw value
    pub fn raw_value(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.state.apply("raw value", |m| {
            m.values.raw_value = Some(TypeChoice::new(TaggedBytes::new(raw))?);
            Ok(())
        });
        self
    }

    /// Set a masked raw value
    pub fn masked_raw_value(mut self, value: impl Into<Vec<u8>>, mask: impl Into<Vec<u8>>) -> Self {
        self.state.apply("masked raw value", |m| {
            m.values.raw_value = Some(TypeChoice::new(MaskedRawValue::new(value, mask))?);
            Ok(())
        });
        self
    }

    /// Set the serial number
    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        let serial = serial.into();
        self.state.apply("serial number", |m| {
            m.values.serial_number = Some(serial);
            non_empty("serial number", &m.values.serial_number)
        });
        self
    }

    /// Set the UEID
    pub fn ueid(mut self, ueid: Ueid) -> Self {
        self.state.apply("ueid", |m| {
            ueid.validate_value()?;
            m.values.ueid = Some(ueid);
            Ok(())
        });
        self
    }

    /// Set the UUID
    pub fn uuid(mut self, uuid: TaggedUuid) -> Self {
        self.state.apply("uuid", |m| {
            uuid.validate_value()?;
            m.values.uuid = Some(uuid);
            Ok(())
        });
        self
    }

    /// Set the name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.state.apply("name", |m| {
            m.values.name = Some(name);
            non_empty("name", &m.values.name)
        });
        self
    }

    /// Set a profile extension field
    pub fn extension(mut self, field: &ExtensionField, value: ExtensionValue) -> Self {
        self.state.apply(field.name, |m| m.values.extensions.set(field, value));
        self
    }

    /// Finish, validating the whole measurement
    pub fn build(self) -> Result<Measurement> {
        let measurement = self.state.finish()?;
        measurement.validate()?;
        Ok(measurement)
    }
}
