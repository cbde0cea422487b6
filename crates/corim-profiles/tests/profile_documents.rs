//! Manifests governed by the bundled profiles
//!
//! - PSA type choices survive both codecs and a signed envelope
//! - TDX extension fields decode only under the TDX profile
//! - Repeated and concurrent initialisation

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use corim_core::{CorimError, Document, ErrorKind, TypeChoice};
use corim_manifest::profile::lookup_profile_str;
use corim_manifest::{
    Class, Digest, Environment, ExtensionValue, ManifestBuilder, MeasurementBuilder, Meta,
    UnsignedManifest,
};
use corim_profiles::psa::{self, ImplId, RefValId};
use corim_profiles::tdx;
use corim_signature::{sign, verify, EdDsaSigner};

fn psa_manifest() -> UnsignedManifest {
    let profile = psa::init().unwrap();
    let env = Environment::with_class(Class {
        class_id: Some(TypeChoice::new(ImplId::new([0x61; 32])).unwrap()),
        vendor: Some("ACME".into()),
        model: Some("RoadRunner".into()),
        layer: None,
        index: None,
    });
    let measurement = MeasurementBuilder::new()
        .key(
            RefValId::new(vec![0xac; 32])
                .with_label("BL")
                .with_version("2.1.0"),
        )
        .digest(Digest::sha256(vec![0x87; 32]))
        .build()
        .unwrap();
    let comid = profile
        .new_comid()
        .tag_id("psa-bl")
        .reference_value(env, measurement)
        .build()
        .unwrap();
    profile
        .new_manifest()
        .id("psa manifest")
        .comid(comid)
        .build()
        .unwrap()
}

#[test]
fn test_psa_manifest_roundtrip() {
    let manifest = psa_manifest();
    assert_eq!(
        UnsignedManifest::from_cbor(&manifest.to_cbor().unwrap()).unwrap(),
        manifest
    );
    let back = UnsignedManifest::from_json(&manifest.to_json().unwrap()).unwrap();
    let comid = back.comids().next().unwrap();
    let key = comid.triples.reference_values[0].measurements[0]
        .key
        .as_ref()
        .unwrap();
    assert_eq!(key.type_name(), "psa.refval-id");
    assert_eq!(
        key.downcast_ref::<RefValId>().unwrap().label.as_deref(),
        Some("BL")
    );
}

#[test]
fn test_psa_manifest_signed() {
    let signer = EdDsaSigner::from_bytes(&[9; 32]);
    let manifest = psa_manifest();
    let bytes = sign(&manifest, &Meta::new("ACME Ltd."), Some(&signer)).unwrap();
    let signed = verify(&bytes, &signer.verifier()).unwrap();
    assert_eq!(signed.manifest, manifest);
}

#[test]
fn test_psa_impl_id_length_on_decode() {
    psa::init().unwrap();
    let json = r#"{"type": "psa.impl-id", "value": "YWFh"}"#;
    let err = TypeChoice::from_json_value(serde_json::from_str(json).unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

fn tdx_manifest() -> UnsignedManifest {
    let profile = tdx::init().unwrap();
    let measurement = MeasurementBuilder::new()
        .svn(10)
        .extension(&tdx::PCE_ID, ExtensionValue::Text("0000".into()))
        .extension(&tdx::MISC_SELECT, ExtensionValue::Bytes(vec![0xc0, 0x00]))
        .extension(&tdx::ISV_PROD_ID, ExtensionValue::Bytes(vec![0x01]))
        .extension(
            &tdx::TCB_STATUS,
            ExtensionValue::TextSet(vec!["UpToDate".into()]),
        )
        .extension(
            &tdx::ADVISORY_IDS,
            ExtensionValue::TextSet(vec!["INTEL-SA-00078".into()]),
        )
        .build()
        .unwrap();
    let env = Environment::with_class(Class {
        class_id: None,
        vendor: Some("Intel Corporation".into()),
        model: Some("TDX SEAM".into()),
        layer: None,
        index: None,
    });
    let comid = profile
        .new_comid()
        .tag_id("tdx-seam")
        .reference_value(env, measurement)
        .build()
        .unwrap();
    profile
        .new_manifest()
        .id("tdx manifest")
        .comid(comid)
        .build()
        .unwrap()
}

#[test]
fn test_tdx_extensions_roundtrip() {
    let manifest = tdx_manifest();
    let text = manifest.to_json().unwrap();
    assert!(text.contains("\"pceid\":\"0000\""));

    for back in [
        UnsignedManifest::from_cbor(&manifest.to_cbor().unwrap()).unwrap(),
        UnsignedManifest::from_json(&text).unwrap(),
    ] {
        let values = &back.comids().next().unwrap().triples.reference_values[0].measurements[0]
            .values;
        assert_eq!(
            values.extensions.get("isvprodid").and_then(ExtensionValue::as_bytes),
            Some(&[0x01][..])
        );
        assert_eq!(back, manifest);
    }
}

#[test]
fn test_tdx_extensions_need_the_profile() {
    // same measurement, manifest without a profile id
    let mut manifest = tdx_manifest();
    let tags = std::mem::take(&mut manifest.tags);
    let mut builder = ManifestBuilder::new().id("no profile");
    for tag in tags {
        builder = builder.comid(tag.as_comid().unwrap().clone());
    }
    let bytes = builder.build().unwrap().to_cbor().unwrap();
    let err = UnsignedManifest::from_cbor(&bytes).unwrap_err();
    assert_matches!(err.root(), CorimError::MalformedValue { .. });
}

#[test]
fn test_tdx_invalid_pceid_rejected() {
    tdx::init().unwrap();
    let err = MeasurementBuilder::new()
        .extension(&tdx::PCE_ID, ExtensionValue::Text(String::new()))
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_concurrent_init() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| corim_profiles::init().unwrap()))
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(lookup_profile_str(psa::PROFILE_ID).is_some());
    assert!(lookup_profile_str(tdx::PROFILE_ID).is_some());
}
