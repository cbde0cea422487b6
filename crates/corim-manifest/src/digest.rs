use corim_core::codec::{cbor, json};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    ResultExt, Validate,
};
use std::fmt;

/// Named hash algorithms: (IANA named-information id, name, digest length)
const ALGORITHMS: &[(u64, &str, usize)] = &[
    (1, "sha-256", 32),
    (2, "sha-256-128", 16),
    (3, "sha-256-120", 15),
    (4, "sha-256-96", 12),
    (5, "sha-256-64", 8),
    (6, "sha-256-32", 4),
    (7, "sha-384", 48),
    (8, "sha-512", 64),
    (9, "sha3-224", 28),
    (10, "sha3-256", 32),
    (11, "sha3-384", 48),
    (12, "sha3-512", 64),
];

/// Well-known algorithm id for SHA-256
pub const SHA256: u64 = 1;

/// Well-known algorithm id for SHA-384
pub const SHA384: u64 = 7;

/// Well-known algorithm id for SHA-512
pub const SHA512: u64 = 8;

/// Name for an algorithm id, if it is a named one
pub fn algorithm_name(alg: u64) -> Option<&'static str> {
    ALGORITHMS
        .iter()
        .find(|(id, ..)| *id == alg)
        .map(|(_, name, _)| *name)
}

/// Algorithm id for a name or a decimal number
pub fn algorithm_id(name: &str) -> Option<u64> {
    ALGORITHMS
        .iter()
        .find(|(_, n, _)| *n == name)
        .map(|(id, ..)| *id)
        .or_else(|| name.parse().ok())
}

fn expected_len(alg: u64) -> Option<usize> {
    ALGORITHMS
        .iter()
        .find(|(id, ..)| *id == alg)
        .map(|(.., len)| *len)
}

/// Hash entry: `[alg, value]`, text form `"sha-256;<base64>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    /// Hash algorithm id
    pub alg: u64,
    /// Digest bytes
    pub value: Vec<u8>,
}

impl Digest {
    /// Digest with algorithm id
    pub fn new(alg: u64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            alg,
            value: value.into(),
        }
    }

    /// SHA-256 digest
    pub fn sha256(value: impl Into<Vec<u8>>) -> Self {
        Self::new(SHA256, value)
    }

    /// Parse the `"<alg>;<base64>"` text form
    pub fn parse(text: &str) -> Result<Self> {
        let (name, b64) = text
            .split_once(';')
            .ok_or_else(|| CorimError::malformed("digest", format!("no ';' in {text:?}")))?;
        let alg = algorithm_id(name).ok_or_else(|| {
            CorimError::malformed("digest", format!("unknown hash algorithm {name:?}"))
        })?;
        Ok(Self::new(alg, json::b64_decode("digest", b64)?))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match algorithm_name(self.alg) {
            Some(name) => write!(f, "{name};{}", json::b64_encode(&self.value)),
            None => write!(f, "{};{}", self.alg, json::b64_encode(&self.value)),
        }
    }
}

impl Validate for Digest {
    fn validate(&self) -> Result<()> {
        if self.value.is_empty() {
            return Err(CorimError::invalid("digest", "empty digest value"));
        }
        if let Some(len) = expected_len(self.alg) {
            if self.value.len() != len {
                return Err(CorimError::invalid(
                    "digest",
                    format!(
                        "length mismatch for hash algorithm {}: want {len} bytes, got {}",
                        algorithm_name(self.alg).unwrap_or("?"),
                        self.value.len()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl CborEncode for Digest {
    fn to_cbor_value(&self) -> CborValue {
        cbor::array([cbor::uint(self.alg), CborValue::Bytes(self.value.clone())])
    }
}

impl CborDecode for Digest {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut items = cbor::expect_array_of("digest", value, 2)?.into_iter();
        let (Some(alg), Some(bytes)) = (items.next(), items.next()) else {
            return Err(CorimError::malformed("digest", "expecting [alg, value]"));
        };
        Ok(Self {
            alg: cbor::expect_uint("digest alg", alg)?,
            value: cbor::expect_bytes("digest value", bytes)?,
        })
    }
}

impl JsonEncode for Digest {
    fn to_json_value(&self) -> JsonValue {
        JsonValue::String(self.to_string())
    }
}

impl JsonDecode for Digest {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::parse(&json::expect_string("digest", value)?)
    }
}

/// Validate a non-empty digest list
pub(crate) fn validate_digests(digests: &[Digest]) -> Result<()> {
    if digests.is_empty() {
        return Err(CorimError::invalid("digests", "empty digests"));
    }
    for (i, digest) in digests.iter().enumerate() {
        digest
            .validate()
            .with_context(|| format!("digest at index {i}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corim_core::ErrorKind;

    #[test]
    fn test_text_form() {
        let d = Digest::sha256(vec![0xab; 32]);
        let text = d.to_string();
        assert!(text.starts_with("sha-256;"));
        assert_eq!(Digest::parse(&text).unwrap(), d);
    }

    #[test]
    fn test_numeric_algorithm() {
        let d = Digest::parse("5000;3q2+7w==").unwrap();
        assert_eq!(d.alg, 5000);
        assert_eq!(d.to_string(), "5000;3q2+7w==");
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_length_checked() {
        let err = Digest::sha256(vec![0; 20]).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_bad_text() {
        assert_eq!(Digest::parse("sha-256").unwrap_err().kind(), ErrorKind::MalformedValue);
        assert_eq!(
            Digest::parse("md5;3q2+7w==").unwrap_err().kind(),
            ErrorKind::MalformedValue
        );
    }
}
