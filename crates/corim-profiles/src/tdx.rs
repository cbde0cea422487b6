//! TDX profile (`http://intel.com/tdx-profile`)
//!
//! Extends `measurement-values-map` with TEE-specific fields. No new
//! type-choice variants.

use corim_core::{CorimError, Result};
use corim_manifest::profile::register_profile;
use corim_manifest::{ExtensionField, ExtensionKind, ExtensionValue, Profile, ProfileId};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Profile identifier
pub const PROFILE_ID: &str = "http://intel.com/tdx-profile";

fn non_empty_text(value: &ExtensionValue) -> Result<()> {
    match value.as_text() {
        Some("") => Err(CorimError::invalid("pceid", "empty")),
        _ => Ok(()),
    }
}

fn non_empty_bytes(value: &ExtensionValue) -> Result<()> {
    match value.as_bytes() {
        Some([]) => Err(CorimError::invalid("miscselect", "zero length")),
        _ => Ok(()),
    }
}

/// TEE instance id
pub const INSTANCE_ID: ExtensionField =
    ExtensionField::new(-77, "instanceid", ExtensionKind::Uint);

/// Provisioning certification enclave id
pub const PCE_ID: ExtensionField =
    ExtensionField::new(-80, "pceid", ExtensionKind::Text).with_check(non_empty_text);

/// MISCSELECT mask
pub const MISC_SELECT: ExtensionField =
    ExtensionField::new(-81, "miscselect", ExtensionKind::Bytes).with_check(non_empty_bytes);

/// ISV product id
pub const ISV_PROD_ID: ExtensionField =
    ExtensionField::new(-85, "isvprodid", ExtensionKind::UintOrBytes);

/// TCB status strings
pub const TCB_STATUS: ExtensionField =
    ExtensionField::new(-88, "tcbstatus", ExtensionKind::TextSet);

/// Security advisory ids
pub const ADVISORY_IDS: ExtensionField =
    ExtensionField::new(-89, "advisoryids", ExtensionKind::TextSet);

/// Every extension field of the profile
pub const FIELDS: [ExtensionField; 6] = [
    INSTANCE_ID,
    PCE_ID,
    MISC_SELECT,
    ISV_PROD_ID,
    TCB_STATUS,
    ADVISORY_IDS,
];

/// Profile record
pub fn profile() -> Result<Profile> {
    Ok(FIELDS
        .into_iter()
        .fold(Profile::new(ProfileId::parse(PROFILE_ID)?), Profile::with_extension))
}

static REGISTERED: OnceCell<Arc<Profile>> = OnceCell::new();

/// Register the profile once per process
pub fn init() -> Result<Arc<Profile>> {
    REGISTERED
        .get_or_try_init(|| {
            tracing::debug!(profile = PROFILE_ID, "initialising TDX profile");
            register_profile(profile()?)
        })
        .cloned()
}
