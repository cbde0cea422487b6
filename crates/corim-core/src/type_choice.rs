//! Type-Choice Value contract
//!
//! A type-choice field holds exactly one concrete variant picked from an
//! open set. In CBOR the variant is identified by the tag wrapping the value
//! body; in JSON by a sibling `type` member:
//!
//! ```text
//! CBOR:  #6.37(h'31fb5abf...')
//! JSON:  {"type": "uuid", "value": "31fb5abf-023e-4992-aa4e-95f9c1503bfa"}
//! ```
//!
//! Concrete variants implement [`TaggedValue`]; the blanket impl turns every
//! one of them into an object-safe [`TypeChoiceValue`] that the registry can
//! hand out as a trait object.

use crate::errors::{CorimError, Result, ResultExt};
use crate::registry::{self, TypeChoiceRegistry};
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;

/// Object-safe contract shared by every type-choice variant
pub trait TypeChoiceValue: fmt::Debug + Send + Sync + 'static {
    /// Registered text name, e.g. `"uuid"`
    fn type_name(&self) -> &'static str;

    /// Registered CBOR tag number
    fn binary_tag(&self) -> u64;

    /// Check the value's validity predicate
    fn validate(&self) -> Result<()>;

    /// CBOR tag body, without the tag itself
    fn binary_body(&self) -> CborValue;

    /// JSON `value` member, without the `type` discriminator
    fn text_value(&self) -> JsonValue;

    /// Raw byte view, for variants that have one
    fn as_bytes(&self) -> Option<Vec<u8>>;

    /// Downcasting support
    fn as_any(&self) -> &dyn Any;

    /// Clone into a new box
    fn clone_boxed(&self) -> Box<dyn TypeChoiceValue>;
}

/// Static contract implemented by concrete variants
///
/// `decode_body` and `decode_text` only check shape and fail with
/// `MalformedValue`. Semantic checks belong in `validate_value`, which
/// decoders call afterwards and report as `InvalidValue`.
pub trait TaggedValue: Clone + fmt::Debug + Send + Sync + Sized + 'static {
    /// Text type name
    const TYPE_NAME: &'static str;

    /// CBOR tag number
    const BINARY_TAG: u64;

    /// Validity predicate, independent of any encoding
    fn validate_value(&self) -> Result<()>;

    /// Encode the tag body
    fn encode_body(&self) -> CborValue;

    /// Decode from a tag body
    fn decode_body(body: CborValue) -> Result<Self>;

    /// Encode the JSON `value` member
    fn encode_text(&self) -> JsonValue;

    /// Decode from a JSON `value` member
    fn decode_text(value: JsonValue) -> Result<Self>;

    /// Raw byte view
    fn raw_bytes(&self) -> Option<Vec<u8>> {
        None
    }
}

impl<T: TaggedValue> TypeChoiceValue for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn binary_tag(&self) -> u64 {
        T::BINARY_TAG
    }

    fn validate(&self) -> Result<()> {
        self.validate_value()
    }

    fn binary_body(&self) -> CborValue {
        self.encode_body()
    }

    fn text_value(&self) -> JsonValue {
        self.encode_text()
    }

    fn as_bytes(&self) -> Option<Vec<u8>> {
        self.raw_bytes()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn TypeChoiceValue> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Container
// ============================================================================

/// Owned type-choice value
///
/// Two containers are equal when they hold the same variant with an
/// identical binary body.
pub struct TypeChoice(Box<dyn TypeChoiceValue>);

impl TypeChoice {
    /// Wrap a concrete variant, checking its validity predicate
    pub fn new<T: TaggedValue>(value: T) -> Result<Self> {
        value
            .validate_value()
            .with_context(|| format!("validating {}", T::TYPE_NAME))?;
        Ok(Self(Box::new(value)))
    }

    /// Wrap an already constructed trait object without validation
    pub fn from_boxed(value: Box<dyn TypeChoiceValue>) -> Self {
        Self(value)
    }

    /// Registered text name of the held variant
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    /// Registered tag number of the held variant
    pub fn binary_tag(&self) -> u64 {
        self.0.binary_tag()
    }

    /// Check the held variant's validity predicate
    pub fn validate(&self) -> Result<()> {
        self.0.validate()
    }

    /// Raw byte view of the held variant
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        self.0.as_bytes()
    }

    /// Borrow the held variant as a concrete type
    pub fn downcast_ref<T: TypeChoiceValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// True if the held variant is `T`
    pub fn is<T: TypeChoiceValue>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Borrow the trait object
    pub fn inner(&self) -> &dyn TypeChoiceValue {
        self.0.as_ref()
    }

    /// Tagged CBOR value
    pub fn to_cbor_value(&self) -> CborValue {
        CborValue::Tag(self.binary_tag(), Box::new(self.0.binary_body()))
    }

    /// `{type, value}` JSON object
    pub fn to_json_value(&self) -> JsonValue {
        serde_json::json!({
            "type": self.type_name(),
            "value": self.0.text_value(),
        })
    }

    /// Decode a tagged CBOR value through the process-wide registry
    pub fn from_cbor_value(value: CborValue) -> Result<Self> {
        Self::from_cbor_value_in(registry::global(), value)
    }

    /// Decode a tagged CBOR value through `registry`
    pub fn from_cbor_value_in(registry: &TypeChoiceRegistry, value: CborValue) -> Result<Self> {
        let (tag, body) = match value {
            CborValue::Tag(tag, body) => (tag, *body),
            other => {
                return Err(CorimError::malformed(
                    "type choice",
                    format!("expecting tagged value, got {}", describe_cbor(&other)),
                ))
            }
        };

        let inner = registry.decode_binary(tag, body)?;
        inner
            .validate()
            .with_context(|| format!("validating {}", inner.type_name()))?;
        Ok(Self(inner))
    }

    /// Decode a `{type, value}` JSON object through the process-wide registry
    pub fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::from_json_value_in(registry::global(), value)
    }

    /// Decode a `{type, value}` JSON object through `registry`
    pub fn from_json_value_in(registry: &TypeChoiceRegistry, value: JsonValue) -> Result<Self> {
        let (name, inner_value) = crate::codec::json::split_type_and_value(value)?;

        let inner = registry.decode_text(&name, inner_value)?;
        inner
            .validate()
            .with_context(|| format!("validating {}", inner.type_name()))?;
        Ok(Self(inner))
    }
}

impl Clone for TypeChoice {
    fn clone(&self) -> Self {
        Self(self.0.clone_boxed())
    }
}

impl PartialEq for TypeChoice {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.0.binary_body() == other.0.binary_body()
    }
}

impl fmt::Debug for TypeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeChoice({:?})", self.0)
    }
}

impl fmt::Display for TypeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.text_value() {
            JsonValue::String(s) => write!(f, "{}:{}", self.type_name(), s),
            other => write!(f, "{}:{}", self.type_name(), other),
        }
    }
}

/// Short human-readable description of a CBOR value's major type
pub(crate) fn describe_cbor(value: &CborValue) -> &'static str {
    match value {
        CborValue::Null => "null",
        CborValue::Bool(_) => "bool",
        CborValue::Integer(_) => "integer",
        CborValue::Float(_) => "float",
        CborValue::Bytes(_) => "byte string",
        CborValue::Text(_) => "text string",
        CborValue::Array(_) => "array",
        CborValue::Map(_) => "map",
        CborValue::Tag(..) => "tagged value",
        _ => "unknown item",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::values::{Svn, TaggedBytes, TaggedUuid};
    use serde_json::json;

    const UUID: &str = "31fb5abf-023e-4992-aa4e-95f9c1503bfa";

    #[test]
    fn test_cbor_dispatch() {
        let choice = TypeChoice::new(TaggedUuid::parse(UUID).unwrap()).unwrap();
        let encoded = choice.to_cbor_value();
        assert!(matches!(encoded, CborValue::Tag(37, _)));

        let decoded = TypeChoice::from_cbor_value(encoded).unwrap();
        assert_eq!(decoded, choice);
        assert!(decoded.is::<TaggedUuid>());
        assert_eq!(decoded.type_name(), "uuid");
    }

    #[test]
    fn test_json_dispatch() {
        let decoded = TypeChoice::from_json_value(json!({"type": "uuid", "value": UUID})).unwrap();
        assert_eq!(
            decoded.downcast_ref::<TaggedUuid>().unwrap().to_string(),
            UUID
        );
        assert_eq!(decoded.to_json_value(), json!({"type": "uuid", "value": UUID}));
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let unknown = TypeChoice::from_cbor_value(CborValue::Tag(
            9999,
            Box::new(CborValue::Bytes(vec![0; 16])),
        ))
        .unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::UnknownTypeChoice);

        let malformed = TypeChoice::from_cbor_value(CborValue::Tag(
            37,
            Box::new(CborValue::Text("not bytes".into())),
        ))
        .unwrap_err();
        assert_eq!(malformed.kind(), ErrorKind::MalformedValue);

        let invalid =
            TypeChoice::from_cbor_value(CborValue::Tag(560, Box::new(CborValue::Bytes(vec![]))))
                .unwrap_err();
        assert_eq!(invalid.kind(), ErrorKind::InvalidValue);

        let untagged = TypeChoice::from_cbor_value(CborValue::Bytes(vec![1])).unwrap_err();
        assert_eq!(untagged.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_equality_by_name_and_body() {
        let a = TypeChoice::new(Svn::new(7)).unwrap();
        let b = TypeChoice::new(Svn::new(7)).unwrap();
        let c = TypeChoice::new(crate::values::MinSvn::new(7)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_new_rejects_invalid() {
        let err = TypeChoice::new(TaggedBytes::new(Vec::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_display() {
        let choice = TypeChoice::new(Svn::new(3)).unwrap();
        assert_eq!(choice.to_string(), "svn:3");
    }
}
