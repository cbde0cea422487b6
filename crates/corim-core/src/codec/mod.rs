//! Dual CBOR/JSON codec
//!
//! Documents are converted to and from intermediate value trees
//! (`serde_cbor::Value`, `serde_json::Value`) rather than through derived
//! serde impls. This keeps the integer-keyed CBOR layout and the name-keyed
//! JSON layout independent while sharing one validation path.
//!
//! CBOR output is deterministic: maps are held in ordered trees, absent
//! optional fields are omitted and never encoded as null.

use crate::errors::{Result, ResultExt};
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;
use tracing::trace;

/// CBOR value-tree helpers
pub mod cbor;

/// JSON value-tree helpers
pub mod json;

/// Convert into a CBOR value tree
pub trait CborEncode {
    /// Encode as a CBOR value
    fn to_cbor_value(&self) -> CborValue;
}

/// Build from a CBOR value tree
pub trait CborDecode: Sized {
    /// Decode from a CBOR value
    fn from_cbor_value(value: CborValue) -> Result<Self>;
}

/// Convert into a JSON value tree
pub trait JsonEncode {
    /// Encode as a JSON value
    fn to_json_value(&self) -> JsonValue;
}

/// Build from a JSON value tree
pub trait JsonDecode: Sized {
    /// Decode from a JSON value
    fn from_json_value(value: JsonValue) -> Result<Self>;
}

/// Structural and semantic validity check
pub trait Validate {
    /// Validate this value and everything it contains
    fn validate(&self) -> Result<()>;
}

/// Top-level value exchanged as CBOR bytes or JSON text
///
/// Both directions validate: encoding refuses an invalid value and decoding
/// validates after the structural decode, so a value read from either format
/// is held to the same rules.
pub trait Document: CborEncode + CborDecode + JsonEncode + JsonDecode + Validate {
    /// Human-readable name used in error context
    const NAME: &'static str;

    /// Standalone CBOR tag wrapping the encoded document, if any
    const CBOR_TAG: Option<u64> = None;

    /// Validate and encode to CBOR bytes
    fn to_cbor(&self) -> Result<Vec<u8>> {
        self.validate()
            .with_context(|| format!("failed validation of {}", Self::NAME))?;
        let value = match Self::CBOR_TAG {
            Some(tag) => CborValue::Tag(tag, Box::new(self.to_cbor_value())),
            None => self.to_cbor_value(),
        };
        cbor::to_vec(&value)
    }

    /// Decode and validate from CBOR bytes
    ///
    /// The standalone tag, if the document has one, is optional on input.
    fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let value = cbor::from_slice(bytes)
            .with_context(|| format!("decoding {}", Self::NAME))?;
        let value = match (Self::CBOR_TAG, value) {
            (Some(expected), CborValue::Tag(tag, body)) => {
                if tag != expected {
                    return Err(crate::CorimError::malformed(
                        Self::NAME,
                        format!("expecting tag {expected}, got {tag}"),
                    ));
                }
                *body
            }
            (_, value) => value,
        };

        trace!(document = Self::NAME, len = bytes.len(), "decoding CBOR document");
        let doc = Self::from_cbor_value(value)
            .with_context(|| format!("decoding {}", Self::NAME))?;
        doc.validate()
            .with_context(|| format!("failed validation of {}", Self::NAME))?;
        Ok(doc)
    }

    /// Validate and encode to JSON text
    fn to_json(&self) -> Result<String> {
        self.validate()
            .with_context(|| format!("failed validation of {}", Self::NAME))?;
        Ok(serde_json::to_string(&self.to_json_value())?)
    }

    /// Decode and validate from JSON text
    fn from_json(text: &str) -> Result<Self> {
        let value: JsonValue =
            serde_json::from_str(text).map_err(crate::CorimError::from)?;

        trace!(document = Self::NAME, len = text.len(), "decoding JSON document");
        let doc = Self::from_json_value(value)
            .with_context(|| format!("decoding {}", Self::NAME))?;
        doc.validate()
            .with_context(|| format!("failed validation of {}", Self::NAME))?;
        Ok(doc)
    }
}
