//! CoRIM Signature - Signing Envelope
//!
//! Wraps an [`corim_manifest::UnsignedManifest`] and its
//! [`corim_manifest::Meta`] in a COSE_Sign1 envelope and verifies such
//! envelopes.
//!
//! # Outcomes
//!
//! [`SignedManifest::from_cose`] decodes and validates without touching the
//! signature, so callers can tell apart:
//!
//! - garbage input (`CorimError::is_malformed`)
//! - well-formed but invalid input (`CorimError::is_invalid`)
//! - valid input whose signature does not verify (`CorimError::is_untrusted`)
//!
//! [`corim_core::CorimError`] is shared with the lower layers.

#![forbid(unsafe_code)]

/// Verification policy
pub mod config;

/// COSE_Sign1 sign and verify
pub mod envelope;

/// ES256 and EdDSA keys
pub mod keys;

pub use config::VerificationPolicy;
pub use envelope::{sign, verify, SignedManifest, CONTENT_TYPE};
pub use keys::{
    Algorithm, EdDsaSigner, EdDsaVerifier, Es256Signer, Es256Verifier, ManifestSigner,
    ManifestVerifier,
};
