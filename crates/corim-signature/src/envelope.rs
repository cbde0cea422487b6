//! COSE_Sign1 envelope
//!
//! A signed manifest is a `#6.18` COSE_Sign1 whose protected header carries
//! the algorithm, the mandated content type, an optional key id and the
//! signer metadata (label 8, embedded CBOR). The payload is the untagged
//! `unsigned-corim-map`; external AAD is empty.

use crate::config::VerificationPolicy;
use crate::keys::{Algorithm, ManifestSigner, ManifestVerifier};
use chrono::{DateTime, Utc};
use corim_core::{CborEncode, CorimError, Document, Result, ResultExt, Validate};
use corim_manifest::{Meta, UnsignedManifest};
use coset::cbor::value::Value;
use coset::{
    CoseSign1, CoseSign1Builder, HeaderBuilder, Label, RegisteredLabel,
    RegisteredLabelWithPrivate, TaggedCborSerializable,
};
use tracing::{debug, warn};

/// Content type every signed manifest carries
pub const CONTENT_TYPE: &str = "application/rim+cbor";

/// Protected header label of the signer metadata
pub const META_LABEL: i64 = 8;

/// Sign a manifest
///
/// Both documents are validated first. Fails with `NilSigner` when no key
/// is supplied.
pub fn sign(
    manifest: &UnsignedManifest,
    meta: &Meta,
    signer: Option<&dyn ManifestSigner>,
) -> Result<Vec<u8>> {
    let signer = signer.ok_or(CorimError::NilSigner)?;
    manifest
        .validate()
        .context("failed validation of unsigned CoRIM")?;

    let payload = corim_core::codec::cbor::to_vec(&manifest.to_cbor_value())?;
    let meta_bytes = meta.to_cbor()?;

    let mut header = HeaderBuilder::new()
        .algorithm(signer.algorithm().iana())
        .content_type(CONTENT_TYPE.to_string())
        .value(META_LABEL, Value::Bytes(meta_bytes));
    if let Some(key_id) = signer.key_id() {
        header = header.key_id(key_id);
    }

    debug!(
        manifest_id = %manifest.id,
        algorithm = %signer.algorithm(),
        payload_len = payload.len(),
        "signing manifest"
    );

    CoseSign1Builder::new()
        .protected(header.build())
        .payload(payload)
        .try_create_signature(&[], |tbs| signer.sign(tbs))?
        .build()
        .to_tagged_vec()
        .map_err(|e| CorimError::crypto(format!("encoding COSE_Sign1: {e}")))
}

/// Decode an envelope and verify its signature
pub fn verify(bytes: &[u8], verifier: &dyn ManifestVerifier) -> Result<SignedManifest> {
    let signed = SignedManifest::from_cose(bytes)?;
    signed.verify(verifier)?;
    Ok(signed)
}

/// A decoded, structurally valid signed manifest
///
/// Decoding does not check the signature; call [`SignedManifest::verify`]
/// before trusting the content.
#[derive(Debug, Clone)]
pub struct SignedManifest {
    /// The signed manifest
    pub manifest: UnsignedManifest,
    /// Signer metadata, if the envelope carried any
    pub meta: Option<Meta>,
    algorithm: Option<Algorithm>,
    sign1: CoseSign1,
}

impl SignedManifest {
    /// Decode and validate an envelope without checking its signature
    pub fn from_cose(bytes: &[u8]) -> Result<Self> {
        let sign1 = CoseSign1::from_tagged_slice(bytes)
            .map_err(|e| CorimError::not_an_envelope(e.to_string()))?;
        let header = &sign1.protected.header;

        match &header.content_type {
            None => return Err(CorimError::MissingContentType),
            Some(RegisteredLabel::Text(ct)) if ct == CONTENT_TYPE => {}
            Some(other) => {
                return Err(CorimError::UnexpectedContentType {
                    expected: CONTENT_TYPE.to_string(),
                    actual: match other {
                        RegisteredLabel::Text(ct) => ct.clone(),
                        RegisteredLabel::Assigned(assigned) => format!("{assigned:?}"),
                    },
                })
            }
        }

        let algorithm = match &header.alg {
            None => return Err(CorimError::missing("protected header alg")),
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => Algorithm::from_iana(*alg),
            Some(_) => None,
        };
        debug!(?algorithm, kid_len = header.key_id.len(), "decoded protected header");

        let meta = header
            .rest
            .iter()
            .find(|(label, _)| *label == Label::Int(META_LABEL))
            .map(|(_, value)| match value {
                Value::Bytes(bytes) => Meta::from_cbor(bytes),
                _ => Err(CorimError::malformed("meta", "expecting a byte string")),
            })
            .transpose()
            .context("decoding meta")?;

        let payload = sign1
            .payload
            .as_deref()
            .ok_or_else(|| CorimError::missing("payload"))?;
        let manifest = UnsignedManifest::from_cbor(payload).context("decoding payload")?;
        debug!(manifest_id = %manifest.id, "decoded payload");

        Ok(Self {
            manifest,
            meta,
            algorithm,
            sign1,
        })
    }

    /// Algorithm from the protected header, if supported
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Key id from the protected header
    pub fn key_id(&self) -> Option<&[u8]> {
        let kid = &self.sign1.protected.header.key_id;
        (!kid.is_empty()).then_some(kid.as_slice())
    }

    /// Raw signature bytes
    pub fn signature(&self) -> &[u8] {
        &self.sign1.signature
    }

    /// Check the signature against `verifier`
    pub fn verify(&self, verifier: &dyn ManifestVerifier) -> Result<()> {
        let result = match self.algorithm {
            None => Err(CorimError::signature_mismatch("unsupported algorithm")),
            Some(alg) if alg != verifier.algorithm() => Err(CorimError::signature_mismatch(
                format!("envelope uses {alg}, key is {}", verifier.algorithm()),
            )),
            Some(_) => self
                .sign1
                .verify_signature(&[], |sig, data| verifier.verify(data, sig)),
        };

        match &result {
            Ok(()) => debug!(manifest_id = %self.manifest.id, "signature verified"),
            Err(e) => warn!(manifest_id = %self.manifest.id, error = %e, "signature rejected"),
        }
        result
    }

    /// Apply `policy`, then check the signature
    pub fn verify_with_policy(
        &self,
        verifier: &dyn ManifestVerifier,
        policy: &VerificationPolicy,
        now: DateTime<Utc>,
    ) -> Result<()> {
        policy.validate()?;

        match self.algorithm {
            Some(alg) if policy.allows(alg) => {}
            Some(alg) => {
                return Err(CorimError::signature_mismatch(format!(
                    "algorithm {alg} not allowed by policy"
                )))
            }
            None => return Err(CorimError::signature_mismatch("unsupported algorithm")),
        }

        if policy.require_meta && self.meta.is_none() {
            return Err(CorimError::missing("meta"));
        }

        if policy.check_validity {
            if let Some(meta) = &self.meta {
                meta.check_validity(now)?;
            }
            self.manifest.check_validity(now)?;
        }
        debug!(manifest_id = %self.manifest.id, "policy checks passed");

        self.verify(verifier)
    }
}
