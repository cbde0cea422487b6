//! CoRIM Profiles
//!
//! Two profiles built on the extension points of the document model:
//!
//! - [`psa`]: new type-choice variants (`psa.impl-id`, `psa.refval-id`)
//! - [`tdx`]: measurement-value extension fields
//!
//! Call [`init`] (or a profile's own `init`) before decoding documents that
//! name these profiles. Registration is once per process and safe to repeat.

#![forbid(unsafe_code)]

/// Arm PSA profile
pub mod psa;

/// Intel TDX profile
pub mod tdx;

use corim_core::Result;

/// Register every bundled profile
pub fn init() -> Result<()> {
    psa::init()?;
    tdx::init()?;
    Ok(())
}
