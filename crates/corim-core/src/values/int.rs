//! Unsigned-integer variants
//!
//! `int`, `svn` and `min-svn` share a representation and differ only in
//! their registered keys, so they are stamped out by one macro.

use crate::codec::{cbor, json};
use crate::errors::Result;
use crate::type_choice::TaggedValue;
use serde_cbor::Value as CborValue;
use serde_json::Value as JsonValue;

macro_rules! uint_choice {
    ($(#[$doc:meta])* $name:ident, $type_name:literal, $tag:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a number
            pub fn new(n: u64) -> Self {
                Self(n)
            }

            /// Inner number
            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl TaggedValue for $name {
            const TYPE_NAME: &'static str = $type_name;
            const BINARY_TAG: u64 = $tag;

            fn validate_value(&self) -> Result<()> {
                Ok(())
            }

            fn encode_body(&self) -> CborValue {
                cbor::uint(self.0)
            }

            fn decode_body(body: CborValue) -> Result<Self> {
                Ok(Self(cbor::expect_uint($type_name, body)?))
            }

            fn encode_text(&self) -> JsonValue {
                JsonValue::from(self.0)
            }

            fn decode_text(value: JsonValue) -> Result<Self> {
                Ok(Self(json::expect_u64($type_name, value)?))
            }
        }
    };
}

uint_choice!(
    /// Tagged unsigned integer (`#6.551`)
    TaggedInt,
    "int",
    551
);

uint_choice!(
    /// Exact security version number (`#6.552`)
    Svn,
    "svn",
    552
);

uint_choice!(
    /// Minimum acceptable security version number (`#6.553`)
    MinSvn,
    "min-svn",
    553
);
