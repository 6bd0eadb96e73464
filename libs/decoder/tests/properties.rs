//! Property-based tests for payload recovery.

use payload_decoder::PayloadDecoder;
use proptest::prelude::*;
use shardtap_api::PayloadLabel;

const TRAILER: usize = 16;

/// Bytes that can never start a codec signature or a JSON object.
fn inert_byte() -> impl Strategy<Value = u8> {
    any::<u8>().prop_filter("signature or brace start", |b| {
        !matches!(*b, 0x28 | 0x1F | 0x5D | 0x04 | b'{')
    })
}

fn inert_bytes(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(inert_byte(), 0..max)
}

fn trailer() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), TRAILER)
}

fn json_object() -> impl Strategy<Value = String> {
    prop::collection::vec(("[a-z]{1,8}", any::<i32>()), 1..6).prop_map(|pairs| {
        let fields: Vec<String> = pairs.iter().map(|(k, v)| format!("\"{k}\":{v}")).collect();
        format!("{{{}}}", fields.join(","))
    })
}

proptest! {
    #[test]
    fn zstd_payload_is_recovered(
        prefix in inert_bytes(32),
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        trailer in trailer(),
    ) {
        let frame = zstd::encode_all(&payload[..], 3).unwrap();
        let buf = [&prefix[..], &frame[..], &trailer[..]].concat();

        let out = PayloadDecoder::default().recover(&buf);
        prop_assert_eq!(out.label, PayloadLabel::Codec("zstd"));
        prop_assert_eq!(out.offset, Some(prefix.len()));
        prop_assert_eq!(out.data, payload);
    }

    #[test]
    fn uncompressed_json_is_sliced_from_first_brace(
        prefix in inert_bytes(32),
        json in json_object(),
        trailer in trailer(),
    ) {
        let buf = [prefix.as_slice(), json.as_bytes(), trailer.as_slice()].concat();

        let out = PayloadDecoder::default().recover(&buf);
        prop_assert_eq!(out.label, PayloadLabel::Uncompressed);
        prop_assert_eq!(out.offset, Some(prefix.len()));
        prop_assert_eq!(&out.data[..], &buf[prefix.len()..buf.len() - TRAILER]);
    }

    #[test]
    fn unrecognizable_buffer_is_unknown(buf in inert_bytes(256)) {
        let out = PayloadDecoder::default().recover(&buf);
        prop_assert_eq!(out.label, PayloadLabel::Unknown);
        prop_assert!(out.data.is_empty());
        prop_assert!(out.failures.is_empty());
    }

    #[test]
    fn recovery_is_deterministic(buf in prop::collection::vec(any::<u8>(), 0..512)) {
        let decoder = PayloadDecoder::default();
        let first = decoder.recover(&buf);
        let second = decoder.recover(&buf);
        prop_assert_eq!(first, second);
    }
}
