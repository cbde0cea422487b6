use crate::errors::{CorimError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

/// Standard base64 with padding
pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64
pub fn b64_decode(what: &str, text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| CorimError::malformed(what, format!("bad base64: {e}")))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(what: &str, expected: &str, got: &Value) -> CorimError {
    CorimError::malformed(what, format!("expecting {expected}, got {}", json_type(got)))
}

/// Take a string
pub fn expect_string(what: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(wrong_type(what, "string", &other)),
    }
}

/// Take a non-negative integer
pub fn expect_u64(what: &str, value: Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| wrong_type(what, "unsigned integer", &value))
}

/// Take a signed integer
pub fn expect_i64(what: &str, value: Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| wrong_type(what, "integer", &value))
}

/// Take a boolean
pub fn expect_bool(what: &str, value: Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| wrong_type(what, "bool", &value))
}

/// Take an array
pub fn expect_array(what: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(wrong_type(what, "array", &other)),
    }
}

/// Take a base64 string and decode it
pub fn expect_b64(what: &str, value: Value) -> Result<Vec<u8>> {
    b64_decode(what, &expect_string(what, value)?)
}

/// Build a `{type, value}` object
pub fn typed(type_name: &str, value: Value) -> Value {
    serde_json::json!({ "type": type_name, "value": value })
}

/// Split a `{type, value}` object into its two members
pub fn split_type_and_value(value: Value) -> Result<(String, Value)> {
    let mut obj = ObjectDecoder::new("type choice", value)?;
    let name = expect_string("type choice type", obj.required("type")?)?;
    let inner = obj.required("value")?;
    obj.finish()?;
    Ok((name, inner))
}

// ============================================================================
// Name-keyed objects
// ============================================================================

/// Consuming reader over a JSON object
#[derive(Debug)]
pub struct ObjectDecoder {
    what: String,
    fields: Map<String, Value>,
}

impl ObjectDecoder {
    /// Open an object value
    pub fn new(what: impl Into<String>, value: Value) -> Result<Self> {
        let what = what.into();
        match value {
            Value::Object(fields) => Ok(Self { what, fields }),
            other => Err(wrong_type(&what, "object", &other)),
        }
    }

    /// Take an optional member
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Take a mandatory member
    pub fn required(&mut self, name: &str) -> Result<Value> {
        self.take(name)
            .ok_or_else(|| CorimError::missing(format!("{} {name}", self.what)))
    }

    /// Take every remaining member
    pub fn take_remaining(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.fields)
    }

    /// Fail on any member not taken
    pub fn finish(self) -> Result<()> {
        match self.fields.keys().next() {
            None => Ok(()),
            Some(name) => Err(CorimError::malformed(
                self.what,
                format!("unexpected member {name:?}"),
            )),
        }
    }
}

/// Builder for a JSON object that skips absent members
#[derive(Debug, Default)]
pub struct ObjectEncoder {
    fields: Map<String, Value>,
}

impl ObjectEncoder {
    /// Start an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member
    pub fn insert(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Add a member when present
    pub fn insert_opt(self, name: &str, value: Option<Value>) -> Self {
        match value {
            Some(value) => self.insert(name, value),
            None => self,
        }
    }

    /// Finish into an object value
    pub fn finish(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_split_type_and_value() {
        let (name, value) = split_type_and_value(json!({"type": "oid", "value": "1.2.3"})).unwrap();
        assert_eq!(name, "oid");
        assert_eq!(value, json!("1.2.3"));

        let err = split_type_and_value(json!({"value": "1.2.3"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);

        let err = split_type_and_value(json!("oid")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_base64() {
        assert_eq!(b64_encode(&[0xde, 0xad, 0xbe, 0xef]), "3q2+7w==");
        assert_eq!(b64_decode("x", "3q2+7w==").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(b64_decode("x", "!!").unwrap_err().kind(), ErrorKind::MalformedValue);
    }

    #[test]
    fn test_object_encoder_skips_absent() {
        let obj = ObjectEncoder::new()
            .insert("a", json!(1))
            .insert_opt("b", None)
            .finish();
        assert_eq!(obj, json!({"a": 1}));
    }
}
