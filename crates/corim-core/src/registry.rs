//! Tagged-Value Registry
//!
//! Maps CBOR tag numbers and text type names to constructors for
//! type-choice values. Both keys are unique for the lifetime of the
//! registry; entries are never removed or replaced.
//!
//! The process-wide instance returned by [`global`] is populated with the
//! built-in variants on first access. Profile modules add their own entries
//! through [`register`] or [`register_value`]; every such call must happen
//! before the first decode of a document that uses the new variants.

use crate::errors::{CorimError, Result};
use crate::type_choice::{TaggedValue, TypeChoiceValue};
use crate::values;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Raw input handed to a constructor
#[derive(Debug, Clone, PartialEq)]
pub enum UntypedValue {
    /// The tag body from the binary encoding (tag already stripped)
    Binary(serde_cbor::Value),
    /// The `value` member of a `{type, value}` text object
    Text(serde_json::Value),
}

/// Factory producing a concrete value from untyped input
pub type Constructor =
    Arc<dyn Fn(UntypedValue) -> Result<Box<dyn TypeChoiceValue>> + Send + Sync>;

struct Registration {
    tag: u64,
    name: String,
    ctor: Constructor,
    // Set only for registrations made through `register_value`
    type_id: Option<TypeId>,
}

#[derive(Default)]
struct Tables {
    by_tag: HashMap<u64, Arc<Registration>>,
    by_name: HashMap<String, Arc<Registration>>,
}

// ============================================================================
// Registry
// ============================================================================

/// Table of type-choice constructors keyed by tag and by name
pub struct TypeChoiceRegistry {
    tables: RwLock<Tables>,
}

impl TypeChoiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Create a registry pre-populated with the built-in variants
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        if let Err(err) = values::register_builtins(&registry) {
            warn!(error = %err, "failed to install built-in type choices");
        }
        registry
    }

    /// Register a constructor under `tag` and `name`
    ///
    /// Fails with `DuplicateRegistration` if either key is already taken.
    /// The existing entry stays active.
    pub fn register(&self, tag: u64, name: impl Into<String>, ctor: Constructor) -> Result<()> {
        self.insert(tag, name.into(), ctor, None)
    }

    /// Register a [`TaggedValue`] type under its own tag and name
    ///
    /// Registering the same type again under the same keys is a no-op.
    pub fn register_value<T: TaggedValue>(&self) -> Result<()> {
        let ctor: Constructor = Arc::new(|input| {
            let value = match input {
                UntypedValue::Binary(body) => T::decode_body(body)?,
                UntypedValue::Text(value) => T::decode_text(value)?,
            };
            Ok(Box::new(value) as Box<dyn TypeChoiceValue>)
        });
        self.insert(
            T::BINARY_TAG,
            T::TYPE_NAME.to_string(),
            ctor,
            Some(TypeId::of::<T>()),
        )
    }

    fn insert(
        &self,
        tag: u64,
        name: String,
        ctor: Constructor,
        type_id: Option<TypeId>,
    ) -> Result<()> {
        let mut tables = self.tables.write();

        let existing_tag = tables.by_tag.get(&tag).cloned();
        let existing_name = tables.by_name.get(&name).cloned();

        match (existing_tag, existing_name) {
            (None, None) => {}
            (Some(by_tag), Some(by_name))
                if type_id.is_some()
                    && by_tag.type_id == type_id
                    && Arc::ptr_eq(&by_tag, &by_name) =>
            {
                trace!(tag, name = %name, "type choice already registered");
                return Ok(());
            }
            (Some(existing), _) => {
                warn!(tag, name = %name, holder = %existing.name, "tag already registered");
                return Err(CorimError::duplicate(format!("tag {tag}")));
            }
            (None, Some(existing)) => {
                warn!(tag, name = %name, holder = existing.tag, "type name already registered");
                return Err(CorimError::duplicate(format!("type name {name:?}")));
            }
        }

        debug!(tag, name = %name, "registered type choice");

        let entry = Arc::new(Registration {
            tag,
            name: name.clone(),
            ctor,
            type_id,
        });
        tables.by_tag.insert(tag, Arc::clone(&entry));
        tables.by_name.insert(name, entry);
        Ok(())
    }

    /// Constructor registered under a tag number
    pub fn lookup_by_tag(&self, tag: u64) -> Option<Constructor> {
        self.tables
            .read()
            .by_tag
            .get(&tag)
            .map(|entry| Arc::clone(&entry.ctor))
    }

    /// Constructor registered under a type name
    pub fn lookup_by_name(&self, name: &str) -> Option<Constructor> {
        self.tables
            .read()
            .by_name
            .get(name)
            .map(|entry| Arc::clone(&entry.ctor))
    }

    /// Type name registered for a tag number
    pub fn name_of(&self, tag: u64) -> Option<String> {
        self.tables
            .read()
            .by_tag
            .get(&tag)
            .map(|entry| entry.name.clone())
    }

    /// Tag number registered for a type name
    pub fn tag_of(&self, name: &str) -> Option<u64> {
        self.tables.read().by_name.get(name).map(|entry| entry.tag)
    }

    /// Build a value from a tag body
    pub fn decode_binary(
        &self,
        tag: u64,
        body: serde_cbor::Value,
    ) -> Result<Box<dyn TypeChoiceValue>> {
        // Lock is released before the constructor runs
        let ctor = self
            .lookup_by_tag(tag)
            .ok_or_else(|| CorimError::unknown_choice(format!("tag {tag}")))?;
        trace!(tag, "dispatching binary type choice");
        ctor(UntypedValue::Binary(body))
    }

    /// Build a value from the `value` member of a text object
    pub fn decode_text(
        &self,
        name: &str,
        value: serde_json::Value,
    ) -> Result<Box<dyn TypeChoiceValue>> {
        let ctor = self
            .lookup_by_name(name)
            .ok_or_else(|| CorimError::unknown_choice(format!("type {name:?}")))?;
        trace!(name, "dispatching text type choice");
        ctor(UntypedValue::Text(value))
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.tables.read().by_tag.len()
    }

    /// True if nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeChoiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeChoiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        let mut names: Vec<_> = tables.by_name.keys().cloned().collect();
        names.sort();
        f.debug_struct("TypeChoiceRegistry")
            .field("entries", &names)
            .finish()
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

static GLOBAL_REGISTRY: Lazy<TypeChoiceRegistry> = Lazy::new(TypeChoiceRegistry::with_builtins);

/// The process-wide registry, with built-ins installed
pub fn global() -> &'static TypeChoiceRegistry {
    &GLOBAL_REGISTRY
}

/// Register a constructor in the process-wide registry
pub fn register(tag: u64, name: impl Into<String>, ctor: Constructor) -> Result<()> {
    global().register(tag, name, ctor)
}

/// Register a [`TaggedValue`] type in the process-wide registry
pub fn register_value<T: TaggedValue>() -> Result<()> {
    global().register_value::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::values::{TaggedBytes, TaggedUuid};
    use serde_cbor::Value;

    fn bytes_ctor() -> Constructor {
        Arc::new(|input| match input {
            UntypedValue::Binary(body) => {
                Ok(Box::new(TaggedBytes::decode_body(body)?) as Box<dyn TypeChoiceValue>)
            }
            UntypedValue::Text(value) => {
                Ok(Box::new(TaggedBytes::decode_text(value)?) as Box<dyn TypeChoiceValue>)
            }
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = TypeChoiceRegistry::new();
        registry.register(70000, "test.bytes", bytes_ctor()).unwrap();

        assert!(registry.lookup_by_tag(70000).is_some());
        assert!(registry.lookup_by_name("test.bytes").is_some());
        assert!(registry.lookup_by_tag(70001).is_none());
        assert_eq!(registry.name_of(70000).as_deref(), Some("test.bytes"));
        assert_eq!(registry.tag_of("test.bytes"), Some(70000));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let registry = TypeChoiceRegistry::new();
        registry.register(70000, "first", bytes_ctor()).unwrap();

        let err = registry.register(70000, "second", bytes_ctor()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);

        // first entry stays, second name was not half-inserted
        assert_eq!(registry.name_of(70000).as_deref(), Some("first"));
        assert!(registry.lookup_by_name("second").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = TypeChoiceRegistry::new();
        registry.register(70000, "same", bytes_ctor()).unwrap();

        let err = registry.register(70001, "same", bytes_ctor()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
        assert!(registry.lookup_by_tag(70001).is_none());
    }

    #[test]
    fn test_register_value_is_idempotent() {
        let registry = TypeChoiceRegistry::new();
        registry.register_value::<TaggedUuid>().unwrap();
        registry.register_value::<TaggedUuid>().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_untyped_registration_not_idempotent() {
        let registry = TypeChoiceRegistry::new();
        registry.register(70000, "x", bytes_ctor()).unwrap();
        assert!(registry.register(70000, "x", bytes_ctor()).is_err());
    }

    #[test]
    fn test_different_type_same_keys_rejected() {
        let registry = TypeChoiceRegistry::new();
        registry
            .register(TaggedUuid::BINARY_TAG, TaggedUuid::TYPE_NAME, bytes_ctor())
            .unwrap();
        let err = registry.register_value::<TaggedUuid>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
    }

    #[test]
    fn test_decode_unknown_tag() {
        let registry = TypeChoiceRegistry::with_builtins();
        let err = registry
            .decode_binary(9999, Value::Bytes(vec![1]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTypeChoice);

        let err = registry
            .decode_text("no-such-type", serde_json::json!("x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTypeChoice);
    }

    #[test]
    fn test_decode_malformed_body() {
        let registry = TypeChoiceRegistry::with_builtins();
        let err = registry
            .decode_binary(TaggedUuid::BINARY_TAG, Value::Text("nope".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(TypeChoiceRegistry::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut failures = 0;
                    for j in 0..32u64 {
                        // every thread races for the same 32 keys
                        if registry
                            .register(80000 + j, format!("race.{j}"), bytes_ctor())
                            .is_err()
                        {
                            failures += 1;
                        }
                        let _ = registry.lookup_by_tag(80000 + ((i + j) % 32));
                    }
                    failures
                })
            })
            .collect();

        let failures: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(registry.len(), 32);
        assert_eq!(failures, 8 * 32 - 32);
    }

    #[test]
    fn test_global_has_builtins() {
        assert!(global().lookup_by_name("uuid").is_some());
        assert!(global().lookup_by_tag(37).is_some());
    }
}
