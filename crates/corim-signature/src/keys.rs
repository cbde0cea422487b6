//! Signing and verification keys
//!
//! Two schemes are supported: ECDSA over P-256 with SHA-256 (`ES256`) and
//! Ed25519 (`EdDSA`). Keys can be built from raw bytes or read from a JSON
//! Web Key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use corim_core::{CorimError, Result};
use coset::iana;
use serde::Deserialize;
use signature::{Signer, Verifier};
use std::fmt;

/// Signature algorithm carried in protected header 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA P-256 with SHA-256
    Es256,
    /// Ed25519
    EdDsa,
}

impl Algorithm {
    /// Every supported algorithm
    pub const ALL: [Algorithm; 2] = [Algorithm::Es256, Algorithm::EdDsa];

    /// JOSE/COSE name
    pub fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::EdDsa => "EdDSA",
        }
    }

    /// Parse a JOSE/COSE name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.name() == name)
    }

    /// IANA COSE algorithm
    pub fn iana(self) -> iana::Algorithm {
        match self {
            Self::Es256 => iana::Algorithm::ES256,
            Self::EdDsa => iana::Algorithm::EdDSA,
        }
    }

    /// Algorithm for an IANA value, if supported
    pub fn from_iana(alg: iana::Algorithm) -> Option<Self> {
        match alg {
            iana::Algorithm::ES256 => Some(Self::Es256),
            iana::Algorithm::EdDSA => Some(Self::EdDsa),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Produces signatures over the COSE `Sig_structure`
pub trait ManifestSigner: Send + Sync {
    /// Algorithm placed in the protected header
    fn algorithm(&self) -> Algorithm;

    /// Key identifier placed in the protected header
    fn key_id(&self) -> Option<Vec<u8>> {
        None
    }

    /// Sign the to-be-signed bytes
    fn sign(&self, tbs: &[u8]) -> Result<Vec<u8>>;
}

/// Checks signatures over the COSE `Sig_structure`
pub trait ManifestVerifier: Send + Sync {
    /// Algorithm this key verifies
    fn algorithm(&self) -> Algorithm;

    /// Fail with `SignatureMismatch` unless `signature` is valid for `tbs`
    fn verify(&self, tbs: &[u8], signature: &[u8]) -> Result<()>;
}

// ============================================================================
// JSON Web Keys
// ============================================================================

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
    d: Option<String>,
    kid: Option<String>,
}

impl Jwk {
    fn parse(text: &str, kty: &str, crv: &str) -> Result<Self> {
        let jwk: Jwk = serde_json::from_str(text)
            .map_err(|e| CorimError::malformed("JWK", e.to_string()))?;
        if jwk.kty != kty || jwk.crv.as_deref() != Some(crv) {
            return Err(CorimError::invalid(
                "JWK",
                format!(
                    "expecting kty {kty} crv {crv}, got kty {} crv {}",
                    jwk.kty,
                    jwk.crv.as_deref().unwrap_or("-")
                ),
            ));
        }
        Ok(jwk)
    }

    fn member(&self, name: &str, value: &Option<String>, len: usize) -> Result<Vec<u8>> {
        let text = value
            .as_deref()
            .ok_or_else(|| CorimError::missing(format!("JWK {name}")))?;
        let bytes = URL_SAFE_NO_PAD.decode(text)?;
        if bytes.len() != len {
            return Err(CorimError::invalid(
                "JWK",
                format!("{name}: expecting {len} bytes, got {}", bytes.len()),
            ));
        }
        Ok(bytes)
    }

    fn key_id(&self) -> Option<Vec<u8>> {
        self.kid.as_ref().map(|kid| kid.as_bytes().to_vec())
    }
}

fn ed25519_array(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| CorimError::crypto(format!("expecting 32 key bytes, got {}", bytes.len())))
}

// ============================================================================
// ES256
// ============================================================================

/// ECDSA P-256 private key
pub struct Es256Signer {
    key: p256::ecdsa::SigningKey,
    key_id: Option<Vec<u8>>,
}

impl Es256Signer {
    /// Key from a 32-byte big-endian scalar
    pub fn from_bytes(scalar: &[u8]) -> Result<Self> {
        let key = p256::ecdsa::SigningKey::from_slice(scalar)
            .map_err(|e| CorimError::crypto(format!("P-256 private key: {e}")))?;
        Ok(Self { key, key_id: None })
    }

    /// Key from an `EC`/`P-256` JWK with a `d` member
    pub fn from_jwk(text: &str) -> Result<Self> {
        let jwk = Jwk::parse(text, "EC", "P-256")?;
        let signer = Self::from_bytes(&jwk.member("d", &jwk.d, 32)?)?;
        Ok(Self {
            key_id: jwk.key_id(),
            ..signer
        })
    }

    /// Attach a key identifier
    pub fn with_key_id(mut self, key_id: impl Into<Vec<u8>>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Matching public key
    pub fn verifier(&self) -> Es256Verifier {
        Es256Verifier {
            key: p256::ecdsa::VerifyingKey::from(&self.key),
        }
    }
}

impl fmt::Debug for Es256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Es256Signer")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ManifestSigner for Es256Signer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Es256
    }

    fn key_id(&self) -> Option<Vec<u8>> {
        self.key_id.clone()
    }

    fn sign(&self, tbs: &[u8]) -> Result<Vec<u8>> {
        let sig: p256::ecdsa::Signature = self
            .key
            .try_sign(tbs)
            .map_err(|e| CorimError::crypto(format!("ES256 signing failed: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }
}

/// ECDSA P-256 public key
#[derive(Debug, Clone)]
pub struct Es256Verifier {
    key: p256::ecdsa::VerifyingKey,
}

impl Es256Verifier {
    /// Key from a SEC1-encoded point
    pub fn from_sec1_bytes(point: &[u8]) -> Result<Self> {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(point)
            .map_err(|e| CorimError::crypto(format!("P-256 public key: {e}")))?;
        Ok(Self { key })
    }

    /// Key from an `EC`/`P-256` JWK with `x` and `y` members
    pub fn from_jwk(text: &str) -> Result<Self> {
        let jwk = Jwk::parse(text, "EC", "P-256")?;
        let mut point = vec![0x04];
        point.extend(jwk.member("x", &jwk.x, 32)?);
        point.extend(jwk.member("y", &jwk.y, 32)?);
        Self::from_sec1_bytes(&point)
    }
}

impl ManifestVerifier for Es256Verifier {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Es256
    }

    fn verify(&self, tbs: &[u8], signature: &[u8]) -> Result<()> {
        let sig = p256::ecdsa::Signature::from_slice(signature)
            .map_err(|e| CorimError::signature_mismatch(format!("bad ES256 signature: {e}")))?;
        self.key
            .verify(tbs, &sig)
            .map_err(|e| CorimError::signature_mismatch(e.to_string()))
    }
}

// ============================================================================
// EdDSA
// ============================================================================

/// Ed25519 private key
pub struct EdDsaSigner {
    key: ed25519_dalek::SigningKey,
    key_id: Option<Vec<u8>>,
}

impl EdDsaSigner {
    /// Key from a 32-byte seed
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            key: ed25519_dalek::SigningKey::from_bytes(seed),
            key_id: None,
        }
    }

    /// Key from an `OKP`/`Ed25519` JWK with a `d` member
    pub fn from_jwk(text: &str) -> Result<Self> {
        let jwk = Jwk::parse(text, "OKP", "Ed25519")?;
        let seed = ed25519_array(&jwk.member("d", &jwk.d, 32)?)?;
        Ok(Self {
            key_id: jwk.key_id(),
            ..Self::from_bytes(&seed)
        })
    }

    /// Attach a key identifier
    pub fn with_key_id(mut self, key_id: impl Into<Vec<u8>>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Matching public key
    pub fn verifier(&self) -> EdDsaVerifier {
        EdDsaVerifier {
            key: self.key.verifying_key(),
        }
    }
}

impl fmt::Debug for EdDsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdDsaSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl ManifestSigner for EdDsaSigner {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDsa
    }

    fn key_id(&self) -> Option<Vec<u8>> {
        self.key_id.clone()
    }

    fn sign(&self, tbs: &[u8]) -> Result<Vec<u8>> {
        let sig: ed25519_dalek::Signature = self
            .key
            .try_sign(tbs)
            .map_err(|e| CorimError::crypto(format!("EdDSA signing failed: {e}")))?;
        Ok(sig.to_bytes().to_vec())
    }
}

/// Ed25519 public key
#[derive(Debug, Clone)]
pub struct EdDsaVerifier {
    key: ed25519_dalek::VerifyingKey,
}

impl EdDsaVerifier {
    /// Key from its 32-byte encoding
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|e| CorimError::crypto(format!("Ed25519 public key: {e}")))?;
        Ok(Self { key })
    }

    /// Key from an `OKP`/`Ed25519` JWK with an `x` member
    pub fn from_jwk(text: &str) -> Result<Self> {
        let jwk = Jwk::parse(text, "OKP", "Ed25519")?;
        Self::from_bytes(&ed25519_array(&jwk.member("x", &jwk.x, 32)?)?)
    }
}

impl ManifestVerifier for EdDsaVerifier {
    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDsa
    }

    fn verify(&self, tbs: &[u8], signature: &[u8]) -> Result<()> {
        let sig = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|e| CorimError::signature_mismatch(format!("bad EdDSA signature: {e}")))?;
        self.key
            .verify(tbs, &sig)
            .map_err(|e| CorimError::signature_mismatch(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::ErrorKind;

    const EC_JWK: &str = r#"{
        "kty": "EC",
        "crv": "P-256",
        "d": "870MB6gfuTJ4HtUnUvYMyJpr5eUZNP4Bk43bVdj3eAE",
        "kid": "1"
    }"#;

    #[test]
    fn test_algorithm_names() {
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::from_name(alg.name()), Some(alg));
            assert_eq!(Algorithm::from_iana(alg.iana()), Some(alg));
        }
        assert_eq!(Algorithm::from_name("PS256"), None);
    }

    #[test]
    fn test_es256_jwk() {
        let signer = Es256Signer::from_jwk(EC_JWK).unwrap();
        assert_eq!(ManifestSigner::key_id(&signer), Some(b"1".to_vec()));
        let sig = signer.sign(b"payload").unwrap();
        assert_eq!(sig.len(), 64);
        signer.verifier().verify(b"payload", &sig).unwrap();
        let err = signer.verifier().verify(b"other", &sig).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    }

    #[test]
    fn test_wrong_key_type() {
        let err = EdDsaSigner::from_jwk(EC_JWK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_eddsa_roundtrip() {
        let signer = EdDsaSigner::from_bytes(&[7; 32]);
        let sig = signer.sign(b"payload").unwrap();
        signer.verifier().verify(b"payload", &sig).unwrap();
        let err = signer.verifier().verify(b"payload", &sig[..63]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    }
}
