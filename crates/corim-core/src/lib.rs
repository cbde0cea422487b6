//! CoRIM Core - Tagged Values and Dual Codec
//!
//! Foundation layer for Concise Reference Integrity Manifests. Everything
//! above this crate (documents, envelopes, profiles) is built from the
//! pieces defined here.
//!
//! # Components
//!
//! - [`registry`]: process-wide table mapping CBOR tag numbers and text type
//!   names to value constructors. Profiles extend it at start-up.
//! - [`type_choice`]: the [`TypeChoiceValue`] contract every polymorphic field
//!   implements, plus the owned [`TypeChoice`] container.
//! - [`values`]: built-in variants (UUID, OID, UEID, raw bytes, integers,
//!   SVNs, masked raw values, PKIX keys).
//! - [`codec`]: CBOR and JSON primitives shared by every document type.
//! - [`builder`]: error-carrying builder state.
//!
//! # Initialisation order
//!
//! All registrations must complete before the first decode that depends on
//! them. Built-in variants are installed lazily on first access to
//! [`registry::global`].

#![forbid(unsafe_code)]

/// Error-carrying builder state
pub mod builder;

/// CBOR and JSON codec primitives
pub mod codec;

/// Unified error handling
pub mod errors;

/// Tagged-value registry
pub mod registry;

/// Type-choice value contract and container
pub mod type_choice;

/// Built-in type-choice variants
pub mod values;

pub use builder::Staged;
pub use codec::{CborDecode, CborEncode, Document, JsonDecode, JsonEncode, Validate};
pub use errors::{CorimError, ErrorKind, Result, ResultExt};
pub use registry::{Constructor, TypeChoiceRegistry, UntypedValue};
pub use type_choice::{TaggedValue, TypeChoice, TypeChoiceValue};

/// Re-exported value trees used throughout the codec layer
pub use serde_cbor::Value as CborValue;
pub use serde_json::Value as JsonValue;
