use super::environment::Environment;
use super::measurement::Measurement;
use crate::profile::DecodeContext;
use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    ResultExt, TypeChoice, Validate,
};

/// `[environment, [+ measurement]]`, used for reference and endorsed values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTriple {
    /// Target environment
    pub environment: Environment,
    /// Measurements, at least one
    pub measurements: Vec<Measurement>,
}

impl ValueTriple {
    /// Triple over one environment
    pub fn new(environment: Environment, measurements: Vec<Measurement>) -> Self {
        Self {
            environment,
            measurements,
        }
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_cbor_in(value: CborValue, ctx: &DecodeContext) -> Result<Self> {
        let mut items = cbor::expect_array_of("value triple", value, 2)?.into_iter();
        let (Some(env), Some(meas)) = (items.next(), items.next()) else {
            return Err(CorimError::malformed(
                "value triple",
                "expecting [environment, measurements]",
            ));
        };
        Ok(Self {
            environment: Environment::from_cbor_value(env).context("environment")?,
            measurements: cbor::expect_array("measurements", meas)?
                .into_iter()
                .map(|m| Measurement::decode_cbor_in(m, ctx))
                .collect::<Result<_>>()?,
        })
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_json_in(value: JsonValue, ctx: &DecodeContext) -> Result<Self> {
        let mut obj = ObjectDecoder::new("value triple", value)?;
        let environment =
            Environment::from_json_value(obj.required("environment")?).context("environment")?;
        let measurements = json::expect_array("measurements", obj.required("measurements")?)?
            .into_iter()
            .map(|m| Measurement::decode_json_in(m, ctx))
            .collect::<Result<_>>()?;
        obj.finish()?;
        Ok(Self {
            environment,
            measurements,
        })
    }
}

impl Validate for ValueTriple {
    fn validate(&self) -> Result<()> {
        self.environment
            .validate()
            .context("environment validation failed")?;
        if self.measurements.is_empty() {
            return Err(CorimError::invalid("value triple", "no measurements"));
        }
        for (i, m) in self.measurements.iter().enumerate() {
            m.validate()
                .with_context(|| format!("measurement at index {i}"))?;
        }
        Ok(())
    }
}

impl CborEncode for ValueTriple {
    fn to_cbor_value(&self) -> CborValue {
        cbor::array([
            self.environment.to_cbor_value(),
            cbor::array(self.measurements.iter().map(Measurement::to_cbor_value)),
        ])
    }
}

impl JsonEncode for ValueTriple {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("environment", self.environment.to_json_value())
            .insert(
                "measurements",
                JsonValue::Array(self.measurements.iter().map(Measurement::to_json_value).collect()),
            )
            .finish()
    }
}

/// `[environment, [+ key]]`, used for identity and attestation keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyTriple {
    /// Environment holding the keys
    pub environment: Environment,
    /// Key material type choices, at least one
    pub keys: Vec<TypeChoice>,
}

impl KeyTriple {
    /// Triple over one environment
    pub fn new(environment: Environment, keys: Vec<TypeChoice>) -> Self {
        Self { environment, keys }
    }
}

impl Validate for KeyTriple {
    fn validate(&self) -> Result<()> {
        self.environment
            .validate()
            .context("environment validation failed")?;
        if self.keys.is_empty() {
            return Err(CorimError::invalid("key triple", "no keys"));
        }
        for (i, key) in self.keys.iter().enumerate() {
            key.validate().with_context(|| format!("key at index {i}"))?;
        }
        Ok(())
    }
}

impl CborEncode for KeyTriple {
    fn to_cbor_value(&self) -> CborValue {
        cbor::array([
            self.environment.to_cbor_value(),
            cbor::array(self.keys.iter().map(TypeChoice::to_cbor_value)),
        ])
    }
}

impl CborDecode for KeyTriple {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut items = cbor::expect_array_of("key triple", value, 2)?.into_iter();
        let (Some(env), Some(keys)) = (items.next(), items.next()) else {
            return Err(CorimError::malformed("key triple", "expecting [environment, keys]"));
        };
        Ok(Self {
            environment: Environment::from_cbor_value(env).context("environment")?,
            keys: cbor::expect_array("keys", keys)?
                .into_iter()
                .map(TypeChoice::from_cbor_value)
                .collect::<Result<_>>()?,
        })
    }
}

impl JsonEncode for KeyTriple {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert("environment", self.environment.to_json_value())
            .insert(
                "verification-keys",
                JsonValue::Array(self.keys.iter().map(TypeChoice::to_json_value).collect()),
            )
            .finish()
    }
}

impl JsonDecode for KeyTriple {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("key triple", value)?;
        let environment =
            Environment::from_json_value(obj.required("environment")?).context("environment")?;
        let keys = json::expect_array("verification-keys", obj.required("verification-keys")?)?
            .into_iter()
            .map(TypeChoice::from_json_value)
            .collect::<Result<_>>()?;
        obj.finish()?;
        Ok(Self { environment, keys })
    }
}

/// `triples-map`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triples {
    /// Reference values (key 0)
    pub reference_values: Vec<ValueTriple>,
    /// Endorsed values (key 1)
    pub endorsed_values: Vec<ValueTriple>,
    /// Device identity keys (key 2)
    pub identity_keys: Vec<KeyTriple>,
    /// Attestation verification keys (key 3)
    pub attest_keys: Vec<KeyTriple>,
}

impl Triples {
    /// True if no triple of any kind is present
    pub fn is_empty(&self) -> bool {
        self.reference_values.is_empty()
            && self.endorsed_values.is_empty()
            && self.identity_keys.is_empty()
            && self.attest_keys.is_empty()
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_cbor_in(value: CborValue, ctx: &DecodeContext) -> Result<Self> {
        let mut map = MapDecoder::new("triples", value)?;
        let value_triples = |v: CborValue, what: &str| -> Result<Vec<ValueTriple>> {
            cbor::expect_array(what, v)?
                .into_iter()
                .enumerate()
                .map(|(i, t)| {
                    ValueTriple::decode_cbor_in(t, ctx)
                        .with_context(|| format!("{what} at index {i}"))
                })
                .collect()
        };
        let key_triples = |v: CborValue, what: &str| -> Result<Vec<KeyTriple>> {
            cbor::expect_array(what, v)?
                .into_iter()
                .enumerate()
                .map(|(i, t)| {
                    KeyTriple::from_cbor_value(t).with_context(|| format!("{what} at index {i}"))
                })
                .collect()
        };

        let triples = Self {
            reference_values: map
                .take(0)
                .map(|v| value_triples(v, "reference value"))
                .transpose()?
                .unwrap_or_default(),
            endorsed_values: map
                .take(1)
                .map(|v| value_triples(v, "endorsed value"))
                .transpose()?
                .unwrap_or_default(),
            identity_keys: map
                .take(2)
                .map(|v| key_triples(v, "identity key"))
                .transpose()?
                .unwrap_or_default(),
            attest_keys: map
                .take(3)
                .map(|v| key_triples(v, "attestation key"))
                .transpose()?
                .unwrap_or_default(),
        };
        map.finish()?;
        Ok(triples)
    }

    /// Decode with the extension fields of `ctx`
    pub fn decode_json_in(value: JsonValue, ctx: &DecodeContext) -> Result<Self> {
        let mut obj = ObjectDecoder::new("triples", value)?;
        let value_triples = |v: JsonValue, what: &str| -> Result<Vec<ValueTriple>> {
            json::expect_array(what, v)?
                .into_iter()
                .map(|t| ValueTriple::decode_json_in(t, ctx))
                .collect()
        };
        let key_triples = |v: JsonValue, what: &str| -> Result<Vec<KeyTriple>> {
            json::expect_array(what, v)?
                .into_iter()
                .map(KeyTriple::from_json_value)
                .collect()
        };

        let triples = Self {
            reference_values: obj
                .take("reference-values")
                .map(|v| value_triples(v, "reference-values"))
                .transpose()?
                .unwrap_or_default(),
            endorsed_values: obj
                .take("endorsed-values")
                .map(|v| value_triples(v, "endorsed-values"))
                .transpose()?
                .unwrap_or_default(),
            identity_keys: obj
                .take("dev-identity-keys")
                .map(|v| key_triples(v, "dev-identity-keys"))
                .transpose()?
                .unwrap_or_default(),
            attest_keys: obj
                .take("attester-verification-keys")
                .map(|v| key_triples(v, "attester-verification-keys"))
                .transpose()?
                .unwrap_or_default(),
        };
        obj.finish()?;
        Ok(triples)
    }
}

fn validate_list<T: Validate>(items: &[T], what: &str) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        item.validate()
            .with_context(|| format!("{what} at index {i}"))?;
    }
    Ok(())
}

impl Validate for Triples {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(CorimError::invalid("triples", "no triples"));
        }
        validate_list(&self.reference_values, "reference value")?;
        validate_list(&self.endorsed_values, "endorsed value")?;
        validate_list(&self.identity_keys, "identity key")?;
        validate_list(&self.attest_keys, "attestation key")
    }
}

fn non_empty_array<T>(items: &[T], encode: impl Fn(&T) -> CborValue) -> Option<CborValue> {
    (!items.is_empty()).then(|| cbor::array(items.iter().map(encode)))
}

fn non_empty_json<T>(items: &[T], encode: impl Fn(&T) -> JsonValue) -> Option<JsonValue> {
    (!items.is_empty()).then(|| JsonValue::Array(items.iter().map(encode).collect()))
}

impl CborEncode for Triples {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(0, non_empty_array(&self.reference_values, ValueTriple::to_cbor_value))
            .insert_opt(1, non_empty_array(&self.endorsed_values, ValueTriple::to_cbor_value))
            .insert_opt(2, non_empty_array(&self.identity_keys, KeyTriple::to_cbor_value))
            .insert_opt(3, non_empty_array(&self.attest_keys, KeyTriple::to_cbor_value))
            .finish()
    }
}

impl CborDecode for Triples {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        Self::decode_cbor_in(value, &DecodeContext::default())
    }
}

impl JsonEncode for Triples {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert_opt(
                "reference-values",
                non_empty_json(&self.reference_values, ValueTriple::to_json_value),
            )
            .insert_opt(
                "endorsed-values",
                non_empty_json(&self.endorsed_values, ValueTriple::to_json_value),
            )
            .insert_opt(
                "dev-identity-keys",
                non_empty_json(&self.identity_keys, KeyTriple::to_json_value),
            )
            .insert_opt(
                "attester-verification-keys",
                non_empty_json(&self.attest_keys, KeyTriple::to_json_value),
            )
            .finish()
    }
}

impl JsonDecode for Triples {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        Self::decode_json_in(value, &DecodeContext::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comid::environment::Class;
    use crate::comid::measurement::MeasurementBuilder;
    use corim_core::values::PkixBase64Key;
    use corim_core::ErrorKind;

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEW1BvqF+/ry8BWa7ZEMU1xYYHEQ8BlLT4MFHOaO+ICTtIvrEeEpr/sfTAP66H2hCHdb5HEXKtRKod6QLcOLPA1Q==\n-----END PUBLIC KEY-----";

    fn acme_env() -> Environment {
        Environment::with_class(Class {
            vendor: Some("ACME".into()),
            ..Class::default()
        })
    }

    #[test]
    fn test_empty_triples_rejected() {
        let err = Triples::default().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_error_path_names_index() {
        let triples = Triples {
            reference_values: vec![ValueTriple::new(acme_env(), vec![])],
            ..Triples::default()
        };
        let err = triples.validate().unwrap_err();
        assert!(err.to_string().starts_with("reference value at index 0: "));
    }

    #[test]
    fn test_roundtrip() {
        let m = MeasurementBuilder::new().name("ROM").build().unwrap();
        let triples = Triples {
            reference_values: vec![ValueTriple::new(acme_env(), vec![m])],
            attest_keys: vec![KeyTriple::new(
                acme_env(),
                vec![TypeChoice::new(PkixBase64Key::new(PEM)).unwrap()],
            )],
            ..Triples::default()
        };
        triples.validate().unwrap();
        assert_eq!(Triples::from_cbor_value(triples.to_cbor_value()).unwrap(), triples);
        assert_eq!(Triples::from_json_value(triples.to_json_value()).unwrap(), triples);
    }
}
