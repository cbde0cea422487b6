//! CoRIM Manifest - Document Model
//!
//! Aggregate structures of a Concise Reference Integrity Manifest:
//!
//! - [`UnsignedManifest`]: the `unsigned-corim-map`, carrying an identifier,
//!   embedded tags, dependent manifests, an optional profile, validity and
//!   entities.
//! - [`Comid`]: a concise module identifier tag with reference values,
//!   endorsements and key triples.
//! - [`Meta`]: signer metadata placed in the protected header of a signed
//!   manifest.
//!
//! Every aggregate implements [`corim_core::Validate`] recursively and the
//! [`corim_core::Document`] codec where it is exchanged on its own.
//! Construction goes through the builders, which validate each argument as
//! it is supplied and report the first failure from `build()`.
//!
//! Profiles ([`profile`]) extend decoding with new type-choice variants and
//! measurement-value extension fields, selected by the manifest's profile
//! identifier.

#![forbid(unsafe_code)]

/// Concise module identifier tags
pub mod comid;

/// Unsigned CoRIM
pub mod corim;

/// Digests and hash algorithm names
pub mod digest;

/// Entities and their roles
pub mod entity;

/// Profile-defined measurement-value extension fields
pub mod extensions;

/// Text or UUID identifiers
pub mod id;

/// Signer metadata
pub mod meta;

/// Profile registration and lookup
pub mod profile;

/// Validity windows
pub mod validity;

pub use comid::{
    Class, Comid, ComidBuilder, Environment, KeyTriple, Measurement, MeasurementBuilder,
    MeasurementValues, TagId, TagIdentity, Triples, ValueTriple, Version,
};
pub use corim::{ConciseTag, Locator, ManifestBuilder, ManifestId, UnsignedManifest};
pub use digest::Digest;
pub use entity::{ComidRole, Entity, ManifestRole};
pub use extensions::{ExtensionField, ExtensionKind, ExtensionValue, Extensions};
pub use id::Identifier;
pub use meta::{Meta, MetaBuilder, Signer};
pub use profile::{DecodeContext, Profile, ProfileId};
pub use validity::Validity;
