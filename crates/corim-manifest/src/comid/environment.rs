use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    ResultExt, TypeChoice, Validate,
};

/// `class-map`: what kind of module the environment describes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Class {
    /// Class identifier type choice (UUID, OID, profile-defined ids)
    pub class_id: Option<TypeChoice>,
    /// Vendor name
    pub vendor: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Layer within a layered attester
    pub layer: Option<u64>,
    /// Index among identical modules
    pub index: Option<u64>,
}

impl Class {
    fn is_empty(&self) -> bool {
        self.class_id.is_none()
            && self.vendor.is_none()
            && self.model.is_none()
            && self.layer.is_none()
            && self.index.is_none()
    }
}

impl Validate for Class {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(CorimError::invalid("class", "class must not be empty"));
        }
        if let Some(id) = &self.class_id {
            id.validate().context("class id")?;
        }
        if self.vendor.as_deref() == Some("") {
            return Err(CorimError::invalid("class", "empty vendor"));
        }
        if self.model.as_deref() == Some("") {
            return Err(CorimError::invalid("class", "empty model"));
        }
        Ok(())
    }
}

impl CborEncode for Class {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(0, self.class_id.as_ref().map(TypeChoice::to_cbor_value))
            .insert_opt(1, self.vendor.clone().map(CborValue::Text))
            .insert_opt(2, self.model.clone().map(CborValue::Text))
            .insert_opt(3, self.layer.map(cbor::uint))
            .insert_opt(4, self.index.map(cbor::uint))
            .finish()
    }
}

impl CborDecode for Class {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("class", value)?;
        let class = Self {
            class_id: map.take(0).map(TypeChoice::from_cbor_value).transpose()?,
            vendor: map
                .take(1)
                .map(|v| cbor::expect_text("vendor", v))
                .transpose()?,
            model: map
                .take(2)
                .map(|v| cbor::expect_text("model", v))
                .transpose()?,
            layer: map
                .take(3)
                .map(|v| cbor::expect_uint("layer", v))
                .transpose()?,
            index: map
                .take(4)
                .map(|v| cbor::expect_uint("index", v))
                .transpose()?,
        };
        map.finish()?;
        Ok(class)
    }
}

impl JsonEncode for Class {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert_opt("id", self.class_id.as_ref().map(TypeChoice::to_json_value))
            .insert_opt("vendor", self.vendor.clone().map(JsonValue::String))
            .insert_opt("model", self.model.clone().map(JsonValue::String))
            .insert_opt("layer", self.layer.map(JsonValue::from))
            .insert_opt("index", self.index.map(JsonValue::from))
            .finish()
    }
}

impl JsonDecode for Class {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("class", value)?;
        let class = Self {
            class_id: obj.take("id").map(TypeChoice::from_json_value).transpose()?,
            vendor: obj
                .take("vendor")
                .map(|v| json::expect_string("vendor", v))
                .transpose()?,
            model: obj
                .take("model")
                .map(|v| json::expect_string("model", v))
                .transpose()?,
            layer: obj
                .take("layer")
                .map(|v| json::expect_u64("layer", v))
                .transpose()?,
            index: obj
                .take("index")
                .map(|v| json::expect_u64("index", v))
                .transpose()?,
        };
        obj.finish()?;
        Ok(class)
    }
}

/// `environment-map`: the module a triple talks about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    /// Module class
    pub class: Option<Class>,
    /// Instance identifier type choice (UEID, UUID, keys)
    pub instance: Option<TypeChoice>,
    /// Group identifier type choice
    pub group: Option<TypeChoice>,
}

impl Environment {
    /// Environment identified by class only
    pub fn with_class(class: Class) -> Self {
        Self {
            class: Some(class),
            ..Self::default()
        }
    }

    /// Environment identified by instance only
    pub fn with_instance(instance: TypeChoice) -> Self {
        Self {
            instance: Some(instance),
            ..Self::default()
        }
    }
}

impl Validate for Environment {
    fn validate(&self) -> Result<()> {
        if self.class.is_none() && self.instance.is_none() && self.group.is_none() {
            return Err(CorimError::invalid(
                "environment",
                "environment must not be empty",
            ));
        }
        if let Some(class) = &self.class {
            class.validate().context("class validation failed")?;
        }
        if let Some(instance) = &self.instance {
            instance.validate().context("instance validation failed")?;
        }
        if let Some(group) = &self.group {
            group.validate().context("group validation failed")?;
        }
        Ok(())
    }
}

impl CborEncode for Environment {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(0, self.class.as_ref().map(Class::to_cbor_value))
            .insert_opt(1, self.instance.as_ref().map(TypeChoice::to_cbor_value))
            .insert_opt(2, self.group.as_ref().map(TypeChoice::to_cbor_value))
            .finish()
    }
}

impl CborDecode for Environment {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("environment", value)?;
        let env = Self {
            class: map.take(0).map(Class::from_cbor_value).transpose()?,
            instance: map.take(1).map(TypeChoice::from_cbor_value).transpose()?,
            group: map.take(2).map(TypeChoice::from_cbor_value).transpose()?,
        };
        map.finish()?;
        Ok(env)
    }
}

impl JsonEncode for Environment {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert_opt("class", self.class.as_ref().map(Class::to_json_value))
            .insert_opt("instance", self.instance.as_ref().map(TypeChoice::to_json_value))
            .insert_opt("group", self.group.as_ref().map(TypeChoice::to_json_value))
            .finish()
    }
}

impl JsonDecode for Environment {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("environment", value)?;
        let env = Self {
            class: obj.take("class").map(Class::from_json_value).transpose()?,
            instance: obj
                .take("instance")
                .map(TypeChoice::from_json_value)
                .transpose()?,
            group: obj
                .take("group")
                .map(TypeChoice::from_json_value)
                .transpose()?,
        };
        obj.finish()?;
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::values::{Oid, Ueid};
    use corim_core::ErrorKind;

    #[test]
    fn test_empty_environment_invalid() {
        let err = Environment::default().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_nested_error_keeps_kind() {
        let mut ueid = vec![0x02];
        ueid.extend([0; 3]);
        let env = Environment::with_instance(TypeChoice::from_boxed(Box::new(Ueid::new(ueid))));
        let err = env.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert!(err.to_string().starts_with("instance validation failed: "));
    }

    #[test]
    fn test_roundtrip_both_formats() {
        let env = Environment::with_class(Class {
            class_id: Some(TypeChoice::new(Oid::parse("2.16.840.1.113741.1.2.3.4.6").unwrap()).unwrap()),
            vendor: Some("Intel Corporation".into()),
            model: Some("0123456789ABCDEF".into()),
            ..Class::default()
        });
        assert_eq!(Environment::from_cbor_value(env.to_cbor_value()).unwrap(), env);
        assert_eq!(Environment::from_json_value(env.to_json_value()).unwrap(), env);
    }
}
