//! Verification policy
//!
//! Loaded from TOML or JSON, then optionally overridden from `CORIM_*`
//! environment variables:
//!
//! ```toml
//! allowed_algorithms = ["ES256", "EdDSA"]
//! require_meta = false
//! check_validity = true
//! ```

use crate::keys::Algorithm;
use corim_core::{CorimError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of the environment overrides
pub const ENV_PREFIX: &str = "CORIM_";

/// What a verifier accepts beyond a valid signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationPolicy {
    /// Accepted algorithm names
    pub allowed_algorithms: Vec<String>,
    /// Reject envelopes without signer metadata
    pub require_meta: bool,
    /// Check the metadata and manifest validity windows
    pub check_validity: bool,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            allowed_algorithms: Algorithm::ALL.iter().map(|a| a.name().to_string()).collect(),
            require_meta: false,
            check_validity: false,
        }
    }
}

impl VerificationPolicy {
    /// Parse a TOML policy
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CorimError::config(format!("invalid TOML: {e}")))
    }

    /// Parse a JSON policy
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CorimError::config(format!("invalid JSON: {e}")))
    }

    /// Load a policy file, `.toml` or `.json`
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorimError::config(format!("failed to read {}: {e}", path.display()))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(CorimError::config(format!(
                "unsupported policy file format: {}",
                path.display()
            ))),
        }
    }

    /// Apply `CORIM_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `CORIM_*` overrides from `(name, value)` pairs
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "ALLOWED_ALGORITHMS" => {
                    self.allowed_algorithms = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "REQUIRE_META" => self.require_meta = parse_flag(&key, &value)?,
                "CHECK_VALIDITY" => self.check_validity = parse_flag(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Fail with `Config` on an empty or unknown algorithm list
    pub fn validate(&self) -> Result<()> {
        if self.allowed_algorithms.is_empty() {
            return Err(CorimError::config("no allowed algorithms"));
        }
        for name in &self.allowed_algorithms {
            if Algorithm::from_name(name).is_none() {
                return Err(CorimError::config(format!("unknown algorithm {name:?}")));
            }
        }
        Ok(())
    }

    /// Whether `alg` is on the allow-list
    pub fn allows(&self, alg: Algorithm) -> bool {
        self.allowed_algorithms.iter().any(|name| name == alg.name())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(CorimError::config(format!("{key}: expecting a boolean, got {other:?}"))),
    }
}
