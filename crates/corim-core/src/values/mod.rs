//! Built-in type-choice variants
//!
//! | type name          | tag | CBOR body                  | JSON value        |
//! |--------------------|-----|----------------------------|-------------------|
//! | `uuid`             | 37  | 16-byte bstr               | 8-4-4-4-12 string |
//! | `oid`              | 111 | BER-encoded arcs           | dotted decimal    |
//! | `ueid`             | 550 | bstr                       | base64            |
//! | `int`              | 551 | uint                       | number            |
//! | `svn`              | 552 | uint                       | number            |
//! | `min-svn`          | 553 | uint                       | number            |
//! | `pkix-base64-key`  | 554 | PEM tstr                   | PEM string        |
//! | `bytes`            | 560 | non-empty bstr             | base64            |
//! | `masked-raw-value` | 563 | `[value, mask]`            | `{value, mask}`   |

mod bytes;
mod int;
mod masked;
mod oid;
mod pkix;
mod ueid;
mod uuid;

pub use self::bytes::TaggedBytes;
pub use self::int::{MinSvn, Svn, TaggedInt};
pub use self::masked::MaskedRawValue;
pub use self::oid::Oid;
pub use self::pkix::PkixBase64Key;
pub use self::ueid::{Ueid, UeidType};
pub use self::uuid::TaggedUuid;

use crate::errors::Result;
use crate::registry::TypeChoiceRegistry;

/// Install every built-in variant into `registry`
pub fn register_builtins(registry: &TypeChoiceRegistry) -> Result<()> {
    registry.register_value::<TaggedUuid>()?;
    registry.register_value::<Oid>()?;
    registry.register_value::<Ueid>()?;
    registry.register_value::<TaggedInt>()?;
    registry.register_value::<Svn>()?;
    registry.register_value::<MinSvn>()?;
    registry.register_value::<PkixBase64Key>()?;
    registry.register_value::<TaggedBytes>()?;
    registry.register_value::<MaskedRawValue>()?;
    Ok(())
}
