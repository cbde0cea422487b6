//! Entities and roles
//!
//! CoRIM and CoMID share the `entity-map` layout but use different role
//! vocabularies, so [`Entity`] is generic over a [`Role`] set.

use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    ResultExt, Validate,
};
use std::fmt::Debug;

/// Closed set of roles an entity may hold
pub trait Role: Copy + Eq + Debug + Send + Sync + 'static {
    /// Integer code used in CBOR
    fn code(self) -> u64;
    /// Role for an integer code
    fn from_code(code: u64) -> Option<Self>;
    /// Name used in JSON
    fn name(self) -> &'static str;
    /// Role for a JSON name
    fn from_name(name: &str) -> Option<Self>;
}

/// Roles of a CoRIM entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestRole {
    /// Creator of the manifest
    ManifestCreator,
}

impl Role for ManifestRole {
    fn code(self) -> u64 {
        match self {
            Self::ManifestCreator => 1,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::ManifestCreator),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::ManifestCreator => "manifestCreator",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "manifestCreator" => Some(Self::ManifestCreator),
            _ => None,
        }
    }
}

/// Roles of a CoMID entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComidRole {
    /// Creator of the tag
    TagCreator,
    /// Creator of the module
    Creator,
    /// Maintainer of the module
    Maintainer,
}

impl Role for ComidRole {
    fn code(self) -> u64 {
        match self {
            Self::TagCreator => 0,
            Self::Creator => 1,
            Self::Maintainer => 2,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::TagCreator),
            1 => Some(Self::Creator),
            2 => Some(Self::Maintainer),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::TagCreator => "tagCreator",
            Self::Creator => "creator",
            Self::Maintainer => "maintainer",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "tagCreator" => Some(Self::TagCreator),
            "creator" => Some(Self::Creator),
            "maintainer" => Some(Self::Maintainer),
            _ => None,
        }
    }
}

/// `entity-map`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity<R: Role> {
    /// Entity name
    pub name: String,
    /// Registration identifier URI
    pub reg_id: Option<String>,
    /// Roles held, at least one
    pub roles: Vec<R>,
}

impl<R: Role> Entity<R> {
    /// Entity with a name and roles
    pub fn new(name: impl Into<String>, roles: Vec<R>) -> Self {
        Self {
            name: name.into(),
            reg_id: None,
            roles,
        }
    }

    /// Set the registration identifier
    pub fn with_reg_id(mut self, reg_id: impl Into<String>) -> Self {
        self.reg_id = Some(reg_id.into());
        self
    }
}

impl<R: Role> Validate for Entity<R> {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CorimError::invalid("entity", "empty entity-name"));
        }
        if let Some(reg_id) = &self.reg_id {
            if reg_id.is_empty() {
                return Err(CorimError::invalid("entity", "empty reg-id"));
            }
        }
        if self.roles.is_empty() {
            return Err(CorimError::invalid("entity", "empty roles"));
        }
        Ok(())
    }
}

impl<R: Role> CborEncode for Entity<R> {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert(0, CborValue::Text(self.name.clone()))
            .insert_opt(1, self.reg_id.as_deref().map(cbor::uri))
            .insert(2, cbor::array(self.roles.iter().map(|r| cbor::uint(r.code()))))
            .finish()
    }
}

impl<R: Role> CborDecode for Entity<R> {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("entity", value)?;
        let name = cbor::expect_text("entity-name", map.required(0, "entity-name")?)?;
        let reg_id = map
            .take(1)
            .map(|v| cbor::expect_uri("reg-id", v))
            .transpose()?;
        let roles = cbor::expect_array("roles", map.required(2, "roles")?)?
            .into_iter()
            .map(|v| {
                let code = cbor::expect_uint("role", v)?;
                R::from_code(code)
                    .ok_or_else(|| CorimError::malformed("role", format!("unknown role {code}")))
            })
            .collect::<Result<Vec<_>>>()?;
        map.finish()?;
        Ok(Self {
            name,
            reg_id,
            roles,
        })
    }
}

impl<R: Role> JsonEncode for Entity<R> {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("name", JsonValue::String(self.name.clone()))
            .insert_opt("regid", self.reg_id.clone().map(JsonValue::String))
            .insert(
                "roles",
                JsonValue::Array(
                    self.roles
                        .iter()
                        .map(|r| JsonValue::String(r.name().to_string()))
                        .collect(),
                ),
            )
            .finish()
    }
}

impl<R: Role> JsonDecode for Entity<R> {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("entity", value)?;
        let name = json::expect_string("entity name", obj.required("name")?)?;
        let reg_id = obj
            .take("regid")
            .map(|v| json::expect_string("regid", v))
            .transpose()?;
        let roles = json::expect_array("roles", obj.required("roles")?)?
            .into_iter()
            .map(|v| {
                let name = json::expect_string("role", v)?;
                R::from_name(&name)
                    .ok_or_else(|| CorimError::malformed("role", format!("unknown role {name:?}")))
            })
            .collect::<Result<Vec<_>>>()?;
        obj.finish()?;
        Ok(Self {
            name,
            reg_id,
            roles,
        })
    }
}

/// Validate a list of entities, tagging failures with their index
pub(crate) fn validate_all<R: Role>(entities: &[Entity<R>]) -> Result<()> {
    for (i, entity) in entities.iter().enumerate() {
        entity
            .validate()
            .with_context(|| format!("entity at index {i}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::ErrorKind;

    #[test]
    fn test_comid_entity_cbor() {
        // {0: "ACME Ltd.", 1: 32("https://acme.example"), 2: [0, 1, 2]}
        let entity = Entity::new(
            "ACME Ltd.",
            vec![ComidRole::TagCreator, ComidRole::Creator, ComidRole::Maintainer],
        )
        .with_reg_id("https://acme.example");
        let bytes = cbor::to_vec(&entity.to_cbor_value()).unwrap();
        assert_eq!(
            hex::encode(&bytes),
            "a3006941434d45204c74642e01d8207468747470733a2f2f61636d652e6578616d706c650283000102"
        );

        let decoded: Entity<ComidRole> =
            Entity::from_cbor_value(cbor::from_slice(&bytes).unwrap()).unwrap();
        assert_eq!(decoded, entity);
    }

    #[test]
    fn test_unknown_role_code() {
        let value = MapEncoder::new()
            .insert(0, CborValue::Text("x".into()))
            .insert(2, cbor::array([cbor::uint(0)]))
            .finish();
        let err = Entity::<ManifestRole>::from_cbor_value(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_empty_roles_invalid() {
        let entity = Entity::<ManifestRole>::new("ACME", vec![]);
        assert_eq!(entity.validate().unwrap_err().kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_json_names() {
        let entity = Entity::new("ACME", vec![ManifestRole::ManifestCreator]);
        assert_eq!(
            entity.to_json_value(),
            serde_json::json!({"name": "ACME", "roles": ["manifestCreator"]})
        );
    }
}
