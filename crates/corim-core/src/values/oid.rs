use crate::codec::{cbor, json};
use crate::errors::{CorimError, Result};
use crate::type_choice::TaggedValue;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;
use std::fmt;

/// Object identifier (`#6.111`), held as BER-encoded arcs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u8>);

impl Oid {
    /// Wrap already BER-encoded arcs
    pub fn from_ber(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse dotted-decimal notation, e.g. `2.16.840.1.113741`
    pub fn parse(text: &str) -> Result<Self> {
        let arcs = text
            .split('.')
            .map(|arc| {
                arc.parse::<u64>().map_err(|_| {
                    CorimError::malformed("OID", format!("bad arc {arc:?} in {text:?}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if arcs.len() < 2 {
            return Err(CorimError::malformed(
                "OID",
                format!("expecting at least two arcs in {text:?}"),
            ));
        }
        if arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
            return Err(CorimError::malformed(
                "OID",
                format!("bad leading arcs in {text:?}"),
            ));
        }

        let first = arcs[0]
            .checked_mul(40)
            .and_then(|n| n.checked_add(arcs[1]))
            .ok_or_else(|| CorimError::malformed("OID", "leading arcs overflow"))?;

        let mut ber = Vec::new();
        push_base128(&mut ber, first);
        for &arc in &arcs[2..] {
            push_base128(&mut ber, arc);
        }
        Ok(Self(ber))
    }

    /// BER-encoded arcs
    pub fn as_ber(&self) -> &[u8] {
        &self.0
    }

    /// Decoded arcs
    pub fn arcs(&self) -> Result<Vec<u64>> {
        let mut subids = Vec::new();
        let mut acc: u64 = 0;
        for (i, &byte) in self.0.iter().enumerate() {
            if acc == 0 && byte == 0x80 {
                return Err(CorimError::invalid(
                    "OID",
                    format!("non-minimal encoding at offset {i}"),
                ));
            }
            acc = acc
                .checked_mul(128)
                .map(|n| n | u64::from(byte & 0x7f))
                .ok_or_else(|| CorimError::invalid("OID", "arc overflows 64 bits"))?;
            if byte & 0x80 == 0 {
                subids.push(acc);
                acc = 0;
            }
        }
        if self.0.last().is_some_and(|b| b & 0x80 != 0) {
            return Err(CorimError::invalid("OID", "truncated final arc"));
        }

        let first = *subids
            .first()
            .ok_or_else(|| CorimError::invalid("OID", "no arcs"))?;
        let (a, b) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut arcs = vec![a, b];
        arcs.extend_from_slice(&subids[1..]);
        Ok(arcs)
    }
}

fn push_base128(out: &mut Vec<u8>, mut n: u64) {
    let mut tmp = [0u8; 10];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (j, byte) in tmp.iter().enumerate().skip(i) {
        out.push(if j == last { *byte } else { *byte | 0x80 });
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arcs() {
            Ok(arcs) => {
                let parts: Vec<String> = arcs.iter().map(u64::to_string).collect();
                write!(f, "{}", parts.join("."))
            }
            Err(_) => write!(f, "<invalid OID>"),
        }
    }
}

impl TaggedValue for Oid {
    const TYPE_NAME: &'static str = "oid";
    const BINARY_TAG: u64 = 111;

    fn validate_value(&self) -> Result<()> {
        self.arcs().map(|_| ())
    }

    fn encode_body(&self) -> CborValue {
        CborValue::Bytes(self.0.clone())
    }

    fn decode_body(body: CborValue) -> Result<Self> {
        Ok(Self(cbor::expect_bytes("OID", body)?))
    }

    fn encode_text(&self) -> JsonValue {
        JsonValue::String(self.to_string())
    }

    fn decode_text(value: JsonValue) -> Result<Self> {
        Self::parse(&json::expect_string("OID", value)?)
    }

    fn raw_bytes(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}
