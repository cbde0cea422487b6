//! Profile registration
//!
//! A profile bundles the type-choice variants and measurement-value
//! extension fields of one attestation ecosystem under an identifier. The
//! identifier carried in a manifest selects, at decode time, which
//! extension fields its measurements may use.
//!
//! Profiles are registered once, before any decode of documents that use
//! them. Registering a profile installs its type-choice variants in the
//! process-wide registry.

use crate::comid::measurement::CORE_MEMBERS;
use crate::comid::ComidBuilder;
use crate::corim::ManifestBuilder;
use crate::extensions::ExtensionField;
use corim_core::codec::cbor;
use corim_core::codec::json;
use corim_core::registry::{self, TypeChoiceRegistry};
use corim_core::values::Oid;
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    ResultExt, TaggedValue, Validate,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Identifier
// ============================================================================

/// Profile identifier: a URI or an OID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProfileId {
    /// URI, tag 32 in CBOR
    Uri(String),
    /// Object identifier, tag 111 in CBOR
    Oid(Oid),
}

impl ProfileId {
    /// Parse the text form; dotted decimal is read as an OID
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(CorimError::invalid("profile", "empty profile identifier"));
        }
        if is_dotted_decimal(text) {
            return Ok(Self::Oid(Oid::parse(text)?));
        }
        Ok(Self::Uri(text.to_string()))
    }
}

fn is_dotted_decimal(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit() || c == '.')
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(uri) => f.write_str(uri),
            Self::Oid(oid) => write!(f, "{oid}"),
        }
    }
}

impl Validate for ProfileId {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Uri(uri) if uri.is_empty() => {
                Err(CorimError::invalid("profile", "empty profile URI"))
            }
            Self::Uri(uri) if is_dotted_decimal(uri) => Err(CorimError::invalid(
                "profile",
                format!("URI {uri:?} reads as an OID"),
            )),
            Self::Uri(_) => Ok(()),
            Self::Oid(oid) => oid.validate_value(),
        }
    }
}

impl CborEncode for ProfileId {
    fn to_cbor_value(&self) -> CborValue {
        match self {
            Self::Uri(uri) => cbor::uri(uri),
            Self::Oid(oid) => CborValue::Tag(Oid::BINARY_TAG, Box::new(oid.encode_body())),
        }
    }
}

impl CborDecode for ProfileId {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        match value {
            CborValue::Tag(cbor::TAG_URI, body) => {
                Ok(Self::Uri(cbor::expect_text("profile URI", *body)?))
            }
            CborValue::Tag(Oid::BINARY_TAG, body) => Ok(Self::Oid(Oid::decode_body(*body)?)),
            other => Err(CorimError::malformed(
                "profile",
                format!("expecting URI or OID, got {}", cbor::describe_key(&other)),
            )),
        }
    }
}

impl JsonEncode for ProfileId {
    fn to_json_value(&self) -> JsonValue {
        JsonValue::String(self.to_string())
    }
}

impl JsonDecode for ProfileId {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::parse(&json::expect_string("profile", value)?)
    }
}

// ============================================================================
// Profile record
// ============================================================================

/// Installs one type-choice variant into a registry
pub type TypeChoiceInstaller = fn(&TypeChoiceRegistry) -> Result<()>;

fn install<T: TaggedValue>(registry: &TypeChoiceRegistry) -> Result<()> {
    registry.register_value::<T>()
}

/// Profile registration record
#[derive(Clone)]
pub struct Profile {
    id: ProfileId,
    type_choices: Vec<TypeChoiceInstaller>,
    extensions: Vec<ExtensionField>,
}

impl Profile {
    /// Empty profile for an identifier
    pub fn new(id: ProfileId) -> Self {
        Self {
            id,
            type_choices: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Add a type-choice variant
    pub fn with_type_choice<T: TaggedValue>(mut self) -> Self {
        self.type_choices.push(install::<T>);
        self
    }

    /// Add a measurement-value extension field
    pub fn with_extension(mut self, field: ExtensionField) -> Self {
        self.extensions.push(field);
        self
    }

    /// Identifier
    pub fn id(&self) -> &ProfileId {
        &self.id
    }

    /// Extension fields
    pub fn extensions(&self) -> &[ExtensionField] {
        &self.extensions
    }

    /// Extension field by JSON name
    pub fn extension(&self, name: &str) -> Option<&ExtensionField> {
        self.extensions.iter().find(|f| f.name == name)
    }

    /// Manifest builder preset with this profile's identifier
    pub fn new_manifest(&self) -> ManifestBuilder {
        ManifestBuilder::new().profile(self.id.clone())
    }

    /// CoMID builder for documents of this profile
    pub fn new_comid(&self) -> ComidBuilder {
        ComidBuilder::new()
    }

    fn check(&self) -> Result<()> {
        self.id.validate()?;
        for (i, field) in self.extensions.iter().enumerate() {
            if (0..=11).contains(&field.key) {
                return Err(CorimError::invalid(
                    "profile",
                    format!("extension {} reuses core key {}", field.name, field.key),
                ));
            }
            if CORE_MEMBERS.contains(&field.name) {
                return Err(CorimError::invalid(
                    "profile",
                    format!("extension {} reuses a core member name", field.name),
                ));
            }
            if self.extensions[..i]
                .iter()
                .any(|other| other.key == field.key || other.name == field.name)
            {
                return Err(CorimError::duplicate(format!(
                    "extension {} ({})",
                    field.name, field.key
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("type_choices", &self.type_choices.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

// ============================================================================
// Process-wide profile table
// ============================================================================

static PROFILES: Lazy<RwLock<HashMap<ProfileId, Arc<Profile>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a profile, installing its type choices in the global registry
pub fn register_profile(profile: Profile) -> Result<Arc<Profile>> {
    register_profile_in(registry::global(), profile)
}

/// Register a profile, installing its type choices in `registry`
///
/// Fails with `DuplicateRegistration` if a profile with the same identifier
/// exists or one of its type choices collides with an existing entry. Type
/// choices installed before a failing one stay in the registry; the profile
/// itself is not recorded.
pub fn register_profile_in(
    registry: &TypeChoiceRegistry,
    profile: Profile,
) -> Result<Arc<Profile>> {
    profile
        .check()
        .with_context(|| format!("registering profile {}", profile.id))?;

    let mut profiles = PROFILES.write();
    if profiles.contains_key(&profile.id) {
        warn!(profile = %profile.id, "profile already registered");
        return Err(CorimError::duplicate(format!("profile {}", profile.id)));
    }

    for installer in &profile.type_choices {
        installer(registry).with_context(|| format!("registering profile {}", profile.id))?;
    }

    debug!(
        profile = %profile.id,
        type_choices = profile.type_choices.len(),
        extensions = profile.extensions.len(),
        "registered profile"
    );
    let profile = Arc::new(profile);
    profiles.insert(profile.id.clone(), Arc::clone(&profile));
    Ok(profile)
}

/// Profile registered under an identifier
pub fn lookup_profile(id: &ProfileId) -> Option<Arc<Profile>> {
    PROFILES.read().get(id).cloned()
}

/// Profile registered under the text form of an identifier
pub fn lookup_profile_str(id: &str) -> Option<Arc<Profile>> {
    ProfileId::parse(id).ok().and_then(|id| lookup_profile(&id))
}

// ============================================================================
// Decode context
// ============================================================================

/// Per-document decoding state: the active profile, if any
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    profile: Option<Arc<Profile>>,
}

impl DecodeContext {
    /// Context for a specific profile
    pub fn with_profile(profile: Arc<Profile>) -> Self {
        Self {
            profile: Some(profile),
        }
    }

    /// Context selected by a manifest's profile identifier
    ///
    /// An identifier with no registered profile yields the core-only context.
    pub fn for_id(id: Option<&ProfileId>) -> Self {
        let Some(id) = id else {
            return Self::default();
        };
        match lookup_profile(id) {
            Some(profile) => Self::with_profile(profile),
            None => {
                debug!(profile = %id, "profile not registered, decoding with core fields only");
                Self::default()
            }
        }
    }

    /// Active profile
    pub fn profile(&self) -> Option<&Arc<Profile>> {
        self.profile.as_ref()
    }

    /// Extension fields allowed in measurement values
    pub fn extension_fields(&self) -> &[ExtensionField] {
        match &self.profile {
            Some(profile) => profile.extensions(),
            None => &[],
        }
    }
}
