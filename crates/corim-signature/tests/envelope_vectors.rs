//! Envelope sign/verify tests
//!
//! - Fixed COSE_Sign1 vectors for every decode failure path
//! - Sign/verify agreement and single-bit tampering
//! - Verification policy loaded from files

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use corim_core::codec::cbor;
use corim_core::values::TaggedUuid;
use corim_core::{CborEncode, CorimError, ErrorKind};
use corim_manifest::{
    ComidBuilder, Environment, ManifestBuilder, MeasurementBuilder, Meta, MetaBuilder,
    UnsignedManifest, Validity,
};
use corim_signature::{
    sign, verify, EdDsaSigner, Es256Signer, ManifestSigner, SignedManifest, VerificationPolicy,
    CONTENT_TYPE,
};
use coset::{iana, CoseSign1Builder, HeaderBuilder, TaggedCborSerializable};
use proptest::prelude::*;

const EC_JWK: &str = r#"{
    "kty": "EC",
    "crv": "P-256",
    "d": "870MB6gfuTJ4HtUnUvYMyJpr5eUZNP4Bk43bVdj3eAE"
}"#;

// protected {1: -7, 3: "application/rim+cbor", 8: <<meta>>}, payload h'badcb030'
const BAD_PAYLOAD: &str = "d2845832a3012603746170706c69636174696f6e2f72696d2b63626f720857a200a1006941434d45204c74642e01a101c11a5fad2056a044badcb03044deadbeef";

// same header, payload <<{0: "invalid corim"}>>
const NO_TAGS: &str = "d2845832a3012603746170706c69636174696f6e2f72696d2b63626f720857a200a1006941434d45204c74642e01a101c11a5fad2056a050a1006d696e76616c696420636f72696d44deadbeef";

// protected {1: -7}
const NO_CONTENT_TYPE: &str =
    "d28443a10126a057a2006d7465737420636f72696d206964018144cafecafe44deadbeef";

// protected {1: -7, 3: "application/cbor"}
const WRONG_CONTENT_TYPE: &str = "d28455a2012603706170706c69636174696f6e2f63626f72a057a2006d7465737420636f72696d206964018144cafecafe44deadbeef";

fn decode_err(hex_text: &str) -> CorimError {
    SignedManifest::from_cose(&hex::decode(hex_text).unwrap()).unwrap_err()
}

#[test]
fn test_not_an_envelope() {
    let err = SignedManifest::from_cose(&[0xf6]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAnEnvelope);
    assert!(err.is_malformed());
}

#[test]
fn test_sign1_body_under_other_tag() {
    // COSE_Sign1 array re-tagged as 98 (COSE_Sign)
    let retagged = format!("d862{}", &NO_CONTENT_TYPE[2..]);
    let err = decode_err(&retagged);
    assert_eq!(err.kind(), ErrorKind::NotAnEnvelope);

    // no tag at all
    let err = decode_err(&NO_CONTENT_TYPE[2..]);
    assert_eq!(err.kind(), ErrorKind::NotAnEnvelope);
    assert!(err.is_malformed());
}

#[test]
fn test_missing_content_type() {
    let err = decode_err(NO_CONTENT_TYPE);
    assert_matches!(err, CorimError::MissingContentType);
}

#[test]
fn test_unexpected_content_type() {
    let err = decode_err(WRONG_CONTENT_TYPE);
    assert_matches!(
        err,
        CorimError::UnexpectedContentType { ref actual, .. } if actual == "application/cbor"
    );
    assert_eq!(
        err.to_string(),
        r#"expecting content type "application/rim+cbor", got "application/cbor" instead"#
    );
}

#[test]
fn test_bad_payload_cbor() {
    let err = decode_err(BAD_PAYLOAD);
    assert_eq!(err.kind(), ErrorKind::MalformedValue);
    assert!(err.to_string().starts_with("decoding payload: "));
}

#[test]
fn test_payload_without_tags() {
    let err = decode_err(NO_TAGS);
    assert_eq!(err.kind(), ErrorKind::MissingField);
    assert!(err.is_invalid());
}

fn test_manifest() -> UnsignedManifest {
    let comid = ComidBuilder::new()
        .tag_id_uuid(TaggedUuid::parse("43bbe37f-2e61-4b33-aed3-53cff1428b16").unwrap())
        .reference_value(
            Environment::with_instance(
                corim_core::TypeChoice::new(TaggedUuid::parse(
                    "31fb5abf-023e-4992-aa4e-95f9c1503bfa",
                )
                .unwrap())
                .unwrap(),
            ),
            MeasurementBuilder::new().svn(2).build().unwrap(),
        )
        .build()
        .unwrap();
    ManifestBuilder::new()
        .id("test corim id")
        .comid(comid)
        .build()
        .unwrap()
}

fn test_meta() -> Meta {
    MetaBuilder::new("ACME Ltd.").build().unwrap()
}

#[test]
fn test_sign_then_verify_es256() {
    let signer = Es256Signer::from_jwk(EC_JWK).unwrap();
    let manifest = test_manifest();
    let mut bytes = sign(&manifest, &test_meta(), Some(&signer)).unwrap();

    let signed = verify(&bytes, &signer.verifier()).unwrap();
    assert_eq!(signed.manifest, manifest);
    assert_eq!(signed.meta, Some(test_meta()));

    // tampering with the signature leaves the envelope decodable
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let tampered = SignedManifest::from_cose(&bytes).unwrap();
    assert_eq!(tampered.manifest, manifest);
    let err = tampered.verify(&signer.verifier()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    assert!(err.is_untrusted());
}

#[test]
fn test_sign_then_verify_eddsa() {
    let signer = EdDsaSigner::from_bytes(&[42; 32]);
    let bytes = sign(&test_manifest(), &test_meta(), Some(&signer)).unwrap();
    verify(&bytes, &signer.verifier()).unwrap();

    let other = EdDsaSigner::from_bytes(&[43; 32]).verifier();
    assert!(verify(&bytes, &other).unwrap_err().is_untrusted());
}

#[test]
fn test_policy_from_files() {
    let dir = tempfile::tempdir().unwrap();

    let toml_path = dir.path().join("policy.toml");
    std::fs::write(
        &toml_path,
        "allowed_algorithms = [\"EdDSA\"]\nrequire_meta = true\ncheck_validity = true\n",
    )
    .unwrap();
    let policy = VerificationPolicy::load_from_file(&toml_path).unwrap();
    assert!(policy.require_meta);

    let json_path = dir.path().join("policy.json");
    std::fs::write(&json_path, r#"{"allowed_algorithms": ["EdDSA"], "require_meta": true, "check_validity": true}"#).unwrap();
    assert_eq!(VerificationPolicy::load_from_file(&json_path).unwrap(), policy);

    let yaml_path = dir.path().join("policy.yaml");
    std::fs::write(&yaml_path, "require_meta: true").unwrap();
    let err = VerificationPolicy::load_from_file(&yaml_path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = VerificationPolicy::load_from_file(&dir.path().join("missing.toml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_policy_algorithm_allow_list() {
    let policy = VerificationPolicy::from_toml_str("allowed_algorithms = [\"EdDSA\"]").unwrap();
    let signer = Es256Signer::from_jwk(EC_JWK).unwrap();
    let bytes = sign(&test_manifest(), &test_meta(), Some(&signer)).unwrap();
    let signed = SignedManifest::from_cose(&bytes).unwrap();

    let err = signed
        .verify_with_policy(&signer.verifier(), &policy, Utc::now())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    signed
        .verify_with_policy(&signer.verifier(), &VerificationPolicy::default(), Utc::now())
        .unwrap();
}

#[test]
fn test_policy_requires_meta() {
    let signer = EdDsaSigner::from_bytes(&[5; 32]);
    let payload = cbor::to_vec(&test_manifest().to_cbor_value()).unwrap();
    let bytes = CoseSign1Builder::new()
        .protected(
            HeaderBuilder::new()
                .algorithm(iana::Algorithm::EdDSA)
                .content_type(CONTENT_TYPE.to_string())
                .build(),
        )
        .payload(payload)
        .try_create_signature(&[], |tbs| signer.sign(tbs))
        .unwrap()
        .build()
        .to_tagged_vec()
        .unwrap();

    let signed = verify(&bytes, &signer.verifier()).unwrap();
    assert!(signed.meta.is_none());

    let policy = VerificationPolicy {
        require_meta: true,
        ..VerificationPolicy::default()
    };
    let err = signed
        .verify_with_policy(&signer.verifier(), &policy, Utc::now())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingField);
}

#[test]
fn test_policy_checks_validity() {
    let signer = EdDsaSigner::from_bytes(&[6; 32]);
    let not_after = Utc.timestamp_opt(1_605_181_526, 0).unwrap();
    let meta = MetaBuilder::new("ACME Ltd.")
        .validity(Validity::until(not_after))
        .build()
        .unwrap();
    let bytes = sign(&test_manifest(), &meta, Some(&signer)).unwrap();
    let signed = SignedManifest::from_cose(&bytes).unwrap();

    let policy = VerificationPolicy {
        check_validity: true,
        ..VerificationPolicy::default()
    };
    let before = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
    signed
        .verify_with_policy(&signer.verifier(), &policy, before)
        .unwrap();
    let after = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let err = signed
        .verify_with_policy(&signer.verifier(), &policy, after)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_any_signature_bit_flip_is_untrusted(bit in 0usize..512) {
        let signer = Es256Signer::from_jwk(EC_JWK).unwrap();
        let mut bytes = sign(&test_manifest(), &test_meta(), Some(&signer)).unwrap();

        // the 64-byte signature closes the envelope
        let start = bytes.len() - 64;
        bytes[start + bit / 8] ^= 1 << (bit % 8);

        let signed = SignedManifest::from_cose(&bytes).unwrap();
        let err = signed.verify(&signer.verifier()).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    }
}
