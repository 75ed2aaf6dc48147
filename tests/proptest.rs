//! Property-based tests for the BER codec.
//!
//! These validate that every value the encoder can produce decodes back
//! to the same value, and that the decoder never panics on arbitrary
//! input.

use bytes::Bytes;
use proptest::prelude::*;
use rsnmp::ber::{Decoder, EncodeBuf};
use rsnmp::message::Message;
use rsnmp::oid::Oid;
use rsnmp::value::Value;
use rsnmp::varbind::VarBind;

/// OIDs that survive a BER round trip.
///
/// X.690 packs the first two arcs into one subidentifier, so the
/// generated OIDs always have at least two arcs, with arc2 <= 39 when
/// arc1 < 2.
fn arb_oid() -> impl Strategy<Value = Oid> {
    (0u32..=2, prop::collection::vec(any::<u32>(), 1..=16)).prop_map(|(arc1, mut rest)| {
        if arc1 < 2 {
            rest[0] %= 40;
        }
        let mut arcs = vec![arc1];
        arcs.extend(rest);
        Oid::from_slice(&arcs)
    })
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        prop::collection::vec(any::<u8>(), 0..=64)
            .prop_map(|v| Value::OctetString(Bytes::from(v))),
        Just(Value::Null),
        arb_oid().prop_map(Value::ObjectIdentifier),
        any::<[u8; 4]>().prop_map(Value::IpAddress),
        any::<u32>().prop_map(Value::Counter32),
        any::<u32>().prop_map(Value::Gauge32),
        any::<u32>().prop_map(Value::TimeTicks),
        any::<u64>().prop_map(Value::Counter64),
    ]
}

proptest! {
    #[test]
    fn oid_ber_round_trip(oid in arb_oid()) {
        let encoded = oid.to_ber();
        let decoded = Oid::from_ber(&encoded).unwrap();
        prop_assert_eq!(decoded, oid);
    }

    #[test]
    fn oid_string_round_trip(oid in arb_oid()) {
        let text = oid.to_string();
        let parsed = Oid::parse(&text).unwrap();
        prop_assert_eq!(parsed, oid);
    }

    #[test]
    fn integer_round_trip(value in any::<i32>()) {
        let mut buf = EncodeBuf::new();
        buf.push_integer(value);
        let mut decoder = Decoder::new(buf.finish());
        prop_assert_eq!(decoder.read_integer().unwrap(), value);
    }

    #[test]
    fn counter64_round_trip(value in any::<u64>()) {
        let mut buf = EncodeBuf::new();
        buf.push_counter64(value);
        let mut decoder = Decoder::new(buf.finish());
        prop_assert_eq!(decoder.read_counter64().unwrap(), value);
    }

    #[test]
    fn octet_string_round_trip(data in prop::collection::vec(any::<u8>(), 0..=1024)) {
        let mut buf = EncodeBuf::new();
        buf.push_octet_string(&data);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = decoder.read_octet_string().unwrap();
        prop_assert_eq!(decoded.as_ref(), &data[..]);
    }

    #[test]
    fn varbind_round_trip(oid in arb_oid(), value in arb_value()) {
        let vb = VarBind::new(oid, value);
        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = VarBind::decode(&mut decoder).unwrap();
        prop_assert_eq!(decoded, vb);
    }

    /// The decoder must reject or accept arbitrary bytes without
    /// panicking or looping.
    #[test]
    fn message_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..=512)) {
        let _ = Message::decode(Bytes::from(data));
    }
}
