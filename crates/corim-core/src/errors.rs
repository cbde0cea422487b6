//! Error taxonomy shared by every CoRIM layer
//!
//! Each layer (registry, type-choice values, codecs, documents, envelope)
//! reports its own distinguishable kind. Higher layers add context through
//! [`CorimError::Context`] but never replace the inner kind, so callers can
//! always tell "malformed input" from "well-formed but invalid" from
//! "well-formed and valid but untrusted".

/// Unified error type for all CoRIM operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorimError {
    /// A registry key (binary tag, type name or profile id) is already taken
    #[error("duplicate registration: {key} is already registered")]
    DuplicateRegistration {
        /// The colliding key, rendered for humans
        key: String,
    },

    /// A type-choice discriminator is not present in the registry
    #[error("unknown type choice {discriminator}")]
    UnknownTypeChoice {
        /// The unknown tag number or type name
        discriminator: String,
    },

    /// Discriminator is known but the value body has the wrong shape
    #[error("malformed {what}: {message}")]
    MalformedValue {
        /// What was being decoded
        what: String,
        /// Error message describing the structural problem
        message: String,
    },

    /// Value decoded but fails its validity predicate
    #[error("invalid {what}: {message}")]
    InvalidValue {
        /// What was being validated
        what: String,
        /// Error message describing the semantic problem
        message: String,
    },

    /// A mandatory field is absent
    #[error("missing mandatory field: {field}")]
    MissingField {
        /// Name of the absent field
        field: String,
    },

    /// Document identifier is empty
    #[error("empty id")]
    EmptyIdentifier,

    /// Outer envelope is not a COSE_Sign1 structure
    #[error("not a COSE_Sign1 envelope: {message}")]
    NotAnEnvelope {
        /// Error message describing what was found instead
        message: String,
    },

    /// Protected header has no content type
    #[error("missing mandatory content type")]
    MissingContentType,

    /// Protected header content type is not the mandated value
    #[error("expecting content type {expected:?}, got {actual:?} instead")]
    UnexpectedContentType {
        /// The mandated content type
        expected: String,
        /// The content type found in the header
        actual: String,
    },

    /// Sign was called without a signing key
    #[error("nil signer")]
    NilSigner,

    /// Envelope is well formed but the signature does not verify
    #[error("signature verification failed: {message}")]
    SignatureMismatch {
        /// Error message describing the verification failure
        message: String,
    },

    /// Signing backend failed
    #[error("crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Inner error with added context
    #[error("{context}: {source}")]
    Context {
        /// What the caller was doing
        context: String,
        /// The error being wrapped
        #[source]
        source: Box<CorimError>,
    },
}

/// Discriminant of [`CorimError`] with context layers stripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CorimError::DuplicateRegistration`]
    DuplicateRegistration,
    /// See [`CorimError::UnknownTypeChoice`]
    UnknownTypeChoice,
    /// See [`CorimError::MalformedValue`]
    MalformedValue,
    /// See [`CorimError::InvalidValue`]
    InvalidValue,
    /// See [`CorimError::MissingField`]
    MissingField,
    /// See [`CorimError::EmptyIdentifier`]
    EmptyIdentifier,
    /// See [`CorimError::NotAnEnvelope`]
    NotAnEnvelope,
    /// See [`CorimError::MissingContentType`]
    MissingContentType,
    /// See [`CorimError::UnexpectedContentType`]
    UnexpectedContentType,
    /// See [`CorimError::NilSigner`]
    NilSigner,
    /// See [`CorimError::SignatureMismatch`]
    SignatureMismatch,
    /// See [`CorimError::Crypto`]
    Crypto,
    /// See [`CorimError::Config`]
    Config,
}

impl CorimError {
    /// Create a duplicate registration error
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::DuplicateRegistration { key: key.into() }
    }

    /// Create an unknown type choice error
    pub fn unknown_choice(discriminator: impl Into<String>) -> Self {
        Self::UnknownTypeChoice {
            discriminator: discriminator.into(),
        }
    }

    /// Create a malformed value error
    pub fn malformed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedValue {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a not-an-envelope error
    pub fn not_an_envelope(message: impl Into<String>) -> Self {
        Self::NotAnEnvelope {
            message: message.into(),
        }
    }

    /// Create a signature mismatch error
    pub fn signature_mismatch(message: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wrap this error with a context prefix
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, past any context layers
    pub fn root(&self) -> &CorimError {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::DuplicateRegistration { .. } => ErrorKind::DuplicateRegistration,
            Self::UnknownTypeChoice { .. } => ErrorKind::UnknownTypeChoice,
            Self::MalformedValue { .. } => ErrorKind::MalformedValue,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::EmptyIdentifier => ErrorKind::EmptyIdentifier,
            Self::NotAnEnvelope { .. } => ErrorKind::NotAnEnvelope,
            Self::MissingContentType => ErrorKind::MissingContentType,
            Self::UnexpectedContentType { .. } => ErrorKind::UnexpectedContentType,
            Self::NilSigner => ErrorKind::NilSigner,
            Self::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            Self::Crypto { .. } => ErrorKind::Crypto,
            Self::Config { .. } => ErrorKind::Config,
            // root() never stops on a context layer
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Input could not be parsed at all
    pub fn is_malformed(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnknownTypeChoice | ErrorKind::MalformedValue | ErrorKind::NotAnEnvelope
        )
    }

    /// Input parsed but breaks a semantic rule
    pub fn is_invalid(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidValue
                | ErrorKind::MissingField
                | ErrorKind::EmptyIdentifier
                | ErrorKind::MissingContentType
                | ErrorKind::UnexpectedContentType
        )
    }

    /// Input is well formed and valid but its signature does not verify
    pub fn is_untrusted(&self) -> bool {
        self.kind() == ErrorKind::SignatureMismatch
    }
}

/// Standard Result type for CoRIM operations
pub type Result<T> = std::result::Result<T, CorimError>;

/// Context helpers for `Result`
pub trait ResultExt<T> {
    /// Prefix the error, if any, with a fixed context string
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Prefix the error, if any, with a lazily built context string
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

impl From<serde_cbor::Error> for CorimError {
    fn from(err: serde_cbor::Error) -> Self {
        Self::malformed("CBOR data", err.to_string())
    }
}

impl From<serde_json::Error> for CorimError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed("JSON data", err.to_string())
    }
}

impl From<base64::DecodeError> for CorimError {
    fn from(err: base64::DecodeError) -> Self {
        Self::malformed("base64 string", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CorimError::invalid("UUID", "expecting RFC4122 UUID");
        assert!(matches!(err, CorimError::InvalidValue { .. }));
        assert_eq!(err.to_string(), "invalid UUID: expecting RFC4122 UUID");
    }

    #[test]
    fn test_context_keeps_inner_kind() {
        let err = CorimError::EmptyIdentifier
            .context("validating tag identity")
            .context("failed validation of unsigned CoRIM");

        assert_eq!(err.kind(), ErrorKind::EmptyIdentifier);
        assert_eq!(
            err.to_string(),
            "failed validation of unsigned CoRIM: validating tag identity: empty id"
        );
        assert_eq!(err.root(), &CorimError::EmptyIdentifier);
    }

    #[test]
    fn test_classification() {
        assert!(CorimError::unknown_choice("tag 9999").is_malformed());
        assert!(CorimError::malformed("x", "y").is_malformed());
        assert!(CorimError::missing("tags").is_invalid());
        assert!(CorimError::MissingContentType.is_invalid());
        assert!(CorimError::signature_mismatch("bad").is_untrusted());
        assert!(!CorimError::signature_mismatch("bad").is_malformed());
    }

    #[test]
    fn test_result_ext() {
        let res: Result<()> = Err(CorimError::NilSigner);
        let err = res.with_context(|| format!("signing {}", "corim")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NilSigner);
        assert_eq!(err.to_string(), "signing corim: nil signer");
    }

    #[test]
    fn test_cbor_error_conversion() {
        let err: CorimError = serde_cbor::from_slice::<serde_cbor::Value>(&[0xff])
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }
}
