use chrono::{DateTime, TimeZone, Timelike, Utc};
use corim_core::codec::cbor::{self, MapDecoder, MapEncoder};
use corim_core::codec::json::{self, ObjectDecoder, ObjectEncoder};
use corim_core::{
    CborDecode, CborEncode, CborValue, CorimError, JsonDecode, JsonEncode, JsonValue, Result,
    Validate,
};

/// `validity-map`: optional not-before, mandatory not-after
///
/// Both bounds are whole seconds, the resolution of the epoch encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    /// Start of the window, if bounded
    pub not_before: Option<DateTime<Utc>>,
    /// End of the window
    pub not_after: DateTime<Utc>,
}

impl Validity {
    /// Window ending at `not_after`, truncated to the second
    pub fn until(not_after: DateTime<Utc>) -> Self {
        Self {
            not_before: None,
            not_after: whole_seconds(not_after),
        }
    }

    /// Window bounded on both sides, truncated to the second
    pub fn between(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Result<Self> {
        let validity = Self {
            not_before: Some(whole_seconds(not_before)),
            not_after: whole_seconds(not_after),
        };
        validity.validate()?;
        Ok(validity)
    }

    /// True if `now` falls inside the window
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |nb| nb <= now) && now <= self.not_after
    }

    /// Fail with `InvalidValue` if `now` is outside the window
    pub fn check_at(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.contains(now) {
            return Err(CorimError::invalid(
                "validity",
                format!("{now} is outside the validity window"),
            ));
        }
        Ok(())
    }
}

fn whole_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_nanosecond(0).unwrap_or(at)
}

fn check_whole_seconds(what: &str, at: DateTime<Utc>) -> Result<()> {
    if at.timestamp_subsec_nanos() != 0 {
        return Err(CorimError::invalid(
            what,
            format!("{at} has a fractional second"),
        ));
    }
    Ok(())
}

fn from_epoch(what: &str, seconds: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| CorimError::malformed(what, format!("epoch {seconds} out of range")))
}

fn from_rfc3339(what: &str, value: JsonValue) -> Result<DateTime<Utc>> {
    let text = json::expect_string(what, value)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CorimError::malformed(what, format!("bad timestamp {text:?}: {e}")))
}

impl Validate for Validity {
    fn validate(&self) -> Result<()> {
        check_whole_seconds("not-after", self.not_after)?;
        if let Some(not_before) = self.not_before {
            check_whole_seconds("not-before", not_before)?;
            if not_before > self.not_after {
                return Err(CorimError::invalid(
                    "validity",
                    "not-before is later than not-after",
                ));
            }
        }
        Ok(())
    }
}

impl CborEncode for Validity {
    fn to_cbor_value(&self) -> CborValue {
        MapEncoder::new()
            .insert_opt(0, self.not_before.map(|nb| cbor::epoch(nb.timestamp())))
            .insert(1, cbor::epoch(self.not_after.timestamp()))
            .finish()
    }
}

impl CborDecode for Validity {
    fn from_cbor_value(value: CborValue) -> Result<Self> {
        let mut map = MapDecoder::new("validity", value)?;
        let not_before = map
            .take(0)
            .map(|v| from_epoch("not-before", cbor::expect_epoch("not-before", v)?))
            .transpose()?;
        let not_after = from_epoch(
            "not-after",
            cbor::expect_epoch("not-after", map.required(1, "not-after")?)?,
        )?;
        map.finish()?;
        Ok(Self {
            not_before,
            not_after,
        })
    }
}

impl JsonEncode for Validity {
    fn to_json_value(&self) -> JsonValue {
        ObjectEncoder::new()
            .insert_opt(
                "not-before",
                self.not_before.map(|nb| JsonValue::String(nb.to_rfc3339())),
            )
            .insert("not-after", JsonValue::String(self.not_after.to_rfc3339()))
            .finish()
    }
}

impl JsonDecode for Validity {
    fn from_json_value(value: JsonValue) -> Result<Self> {
        let mut obj = ObjectDecoder::new("validity", value)?;
        let not_before = obj
            .take("not-before")
            .map(|v| from_rfc3339("not-before", v))
            .transpose()?;
        let not_after = from_rfc3339("not-after", obj.required("not-after")?)?;
        obj.finish()?;
        Ok(Self {
            not_before,
            not_after,
        })
    }
}
