//! Round-trip and cross-format tests for the built-in type-choice variants

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use corim_core::codec::cbor;
use corim_core::values::{
    MaskedRawValue, MinSvn, Oid, PkixBase64Key, Svn, TaggedBytes, TaggedInt, TaggedUuid, Ueid,
};
use corim_core::{CborValue, ErrorKind, TaggedValue, TypeChoice};
use proptest::prelude::*;

fn binary_roundtrip(choice: &TypeChoice) -> TypeChoice {
    let bytes = cbor::to_vec(&choice.to_cbor_value()).unwrap();
    TypeChoice::from_cbor_value(cbor::from_slice(&bytes).unwrap()).unwrap()
}

fn text_roundtrip(choice: &TypeChoice) -> TypeChoice {
    let text = serde_json::to_string(&choice.to_json_value()).unwrap();
    TypeChoice::from_json_value(serde_json::from_str(&text).unwrap()).unwrap()
}

fn assert_both_roundtrips(choice: TypeChoice) {
    assert_eq!(binary_roundtrip(&choice), choice);
    assert_eq!(text_roundtrip(&choice), choice);
}

proptest! {
    #[test]
    fn uuid_roundtrip(bytes in any::<[u8; 16]>()) {
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        assert_both_roundtrips(TypeChoice::new(TaggedUuid::new(uuid)).unwrap());
    }

    #[test]
    fn oid_roundtrip(a in 0u64..=2, b in 0u64..=39, rest in prop::collection::vec(any::<u64>(), 0..6)) {
        let mut arcs = vec![a.to_string(), b.to_string()];
        arcs.extend(rest.iter().map(u64::to_string));
        let oid = Oid::parse(&arcs.join(".")).unwrap();
        prop_assert_eq!(oid.to_string(), arcs.join("."));
        assert_both_roundtrips(TypeChoice::new(oid).unwrap());
    }

    #[test]
    fn bytes_roundtrip(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        assert_both_roundtrips(TypeChoice::new(TaggedBytes::new(bytes)).unwrap());
    }

    #[test]
    fn uint_variants_roundtrip(n in any::<u64>()) {
        assert_both_roundtrips(TypeChoice::new(TaggedInt::new(n)).unwrap());
        assert_both_roundtrips(TypeChoice::new(Svn::new(n)).unwrap());
        assert_both_roundtrips(TypeChoice::new(MinSvn::new(n)).unwrap());
    }

    #[test]
    fn masked_roundtrip(pairs in prop::collection::vec(any::<(u8, u8)>(), 1..32)) {
        let (value, mask): (Vec<u8>, Vec<u8>) = pairs.into_iter().unzip();
        assert_both_roundtrips(TypeChoice::new(MaskedRawValue::new(value, mask)).unwrap());
    }

    #[test]
    fn ueid_rand_roundtrip(len in prop::sample::select(vec![16usize, 24, 32]), fill in any::<u8>()) {
        let mut bytes = vec![0x01];
        bytes.extend(std::iter::repeat(fill).take(len));
        assert_both_roundtrips(TypeChoice::new(Ueid::new(bytes)).unwrap());
    }
}

#[test]
fn test_uuid_wire_format() {
    let choice =
        TypeChoice::new(TaggedUuid::parse("31fb5abf-023e-4992-aa4e-95f9c1503bfa").unwrap())
            .unwrap();
    let bytes = cbor::to_vec(&choice.to_cbor_value()).unwrap();
    assert_eq!(
        hex::encode(bytes),
        "d8255031fb5abf023e4992aa4e95f9c1503bfa"
    );
}

#[test]
fn test_pkix_key_roundtrip() {
    let pem = "-----BEGIN PUBLIC KEY-----\nMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEFn0taoAwR3PmrKkYLtAsD9o05KSM\n6mbgfNCgpuL0g6VpTHkZl73wk5BDxoV7n+Oeee0iIqkW3HMZT3ETiniJdg==\n-----END PUBLIC KEY-----";
    assert_both_roundtrips(TypeChoice::new(PkixBase64Key::new(pem)).unwrap());
}

#[test]
fn test_cross_format_same_value() {
    let choice = TypeChoice::new(TaggedBytes::new(vec![0xde, 0xad, 0xbe, 0xef])).unwrap();
    assert_eq!(
        choice.to_json_value(),
        serde_json::json!({"type": "bytes", "value": "3q2+7w=="})
    );

    let from_text = TypeChoice::from_json_value(choice.to_json_value()).unwrap();
    let from_binary = TypeChoice::from_cbor_value(choice.to_cbor_value()).unwrap();
    assert_eq!(from_text, from_binary);
    assert_eq!(from_text.as_bytes(), Some(vec![0xde, 0xad, 0xbe, 0xef]));
}

#[test]
fn test_invalid_after_decode() {
    // well-formed body, but mask length differs from value length
    let body = cbor::array([CborValue::Bytes(vec![1, 2]), CborValue::Bytes(vec![3])]);
    let err =
        TypeChoice::from_cbor_value(CborValue::Tag(MaskedRawValue::BINARY_TAG, Box::new(body)))
            .unwrap_err();
    assert_matches!(err.kind(), ErrorKind::InvalidValue);

    let err = TypeChoice::from_json_value(serde_json::json!({
        "type": "ueid",
        "value": "AQI="
    }))
    .unwrap_err();
    assert_matches!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_unknown_name() {
    let err = TypeChoice::from_json_value(serde_json::json!({
        "type": "not-registered",
        "value": 1
    }))
    .unwrap_err();
    assert_matches!(err.kind(), ErrorKind::UnknownTypeChoice);
}
