//! Order-preserving tuple encoding.
//!
//! `pack`/`unpack` implement spec.md §6's tuple codec contract: byte-wise
//! comparison of two packed tuples matches semantic comparison of the
//! tuples themselves, for tuples of the same shape. Cross-type comparison
//! (an `Int64` key byte-range vs a `String` key byte-range) is governed by
//! the stable per-type tag byte prefixing every element, matching
//! `fusion_core::FieldValue`'s `type_tag` ordering.
//!
//! Encoding per element: `[tag byte][payload]`.
//!
//! - `Null`: tag only.
//! - `Bool`: tag + one byte (0/1).
//! - `Int64`: tag + 8 bytes big-endian with the sign bit flipped, so two's
//!   complement ordering becomes unsigned big-endian ordering.
//! - `Double`: tag + 8 bytes, IEEE-754 bits transformed so that
//!   lexicographic byte order matches float order (flip all bits for
//!   negatives, flip just the sign bit for non-negatives).
//! - `String`/`Bytes`: tag + NUL-escaped payload (`0x00` -> `0x00 0xFF`)
//!   terminated by `0x00 0x00`, so no encoded string is a byte-prefix of
//!   another.
//! - `Uuid`: tag + 16 raw bytes.
//! - `Date`: tag + 8 bytes, same transform as `Int64` (seconds since epoch,
//!   signed).
//! - `Array`/nested tuple: tag + packed elements terminated by a NUL tuple
//!   terminator (`0x00 0x01`), escaping any literal terminator bytes the
//!   same way strings do.

use fusion_core::field_value::FieldValue;
use uuid::Uuid;

use crate::error::{KvError, KvResult};

const TAG_NULL: u8 = 0;
const TAG_INT64: u8 = 1;
const TAG_DOUBLE: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_BYTES: u8 = 5;
const TAG_UUID: u8 = 6;
const TAG_DATE: u8 = 7;
const TAG_ARRAY: u8 = 8;

const NUL_ESCAPE: [u8; 2] = [0x00, 0xFF];
const NUL_TERMINATOR: [u8; 2] = [0x00, 0x01];

/// Wire-level element type, decoded from packed bytes.
///
/// Identical shape to `FieldValue`; kept as a separate type so the codec
/// doesn't force `fusion-core` to depend on `fusion-kv`.
pub type TupleElement = FieldValue;

/// Pack a sequence of elements into an order-preserving byte string.
pub fn pack(elements: &[TupleElement]) -> Vec<u8> {
    let mut out = Vec::new();
    for e in elements {
        pack_into(e, &mut out);
    }
    out
}

fn pack_into(e: &TupleElement, out: &mut Vec<u8>) {
    match e {
        FieldValue::Null => out.push(TAG_NULL),
        FieldValue::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(if *b { 1 } else { 0 });
        }
        FieldValue::Int64(v) => {
            out.push(TAG_INT64);
            out.extend_from_slice(&encode_i64(*v));
        }
        FieldValue::Double(v) => {
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&encode_f64(*v));
        }
        FieldValue::String(s) => {
            out.push(TAG_STRING);
            escape_and_terminate(s.as_bytes(), out);
        }
        FieldValue::Bytes(b) => {
            out.push(TAG_BYTES);
            escape_and_terminate(b, out);
        }
        FieldValue::Uuid(u) => {
            out.push(TAG_UUID);
            out.extend_from_slice(u.as_bytes());
        }
        FieldValue::Date(d) => {
            out.push(TAG_DATE);
            out.extend_from_slice(&encode_i64(*d));
        }
        FieldValue::Array(items) => {
            out.push(TAG_ARRAY);
            let mut inner = Vec::new();
            for item in items {
                pack_into(item, &mut inner);
            }
            escape_and_terminate(&inner, out);
        }
    }
}

/// Flip the sign bit so two's-complement ordering becomes unsigned
/// big-endian byte ordering: negatives (sign bit 1) become smaller.
fn encode_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1u64 << 63)).to_be_bytes()
}

fn decode_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ (1u64 << 63)) as i64
}

/// Standard order-preserving float transform: for non-negative floats,
/// flipping the sign bit places them after all negatives; for negative
/// floats, flipping every bit reverses their (otherwise backwards) order.
fn encode_f64(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let transformed = if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    };
    transformed.to_be_bytes()
}

fn decode_f64(bytes: [u8; 8]) -> f64 {
    let bits = u64::from_be_bytes(bytes);
    let original = if bits & (1u64 << 63) != 0 {
        bits & !(1u64 << 63)
    } else {
        !bits
    };
    f64::from_bits(original)
}

fn escape_and_terminate(payload: &[u8], out: &mut Vec<u8>) {
    for &b in payload {
        if b == 0x00 {
            out.extend_from_slice(&NUL_ESCAPE);
        } else {
            out.push(b);
        }
    }
    out.extend_from_slice(&NUL_TERMINATOR);
}

/// Unpack a full byte string into its elements.
///
/// # Errors
/// Returns [`KvError::MalformedTuple`] if the bytes don't decode to a
/// well-formed sequence (unknown tag, truncated fixed-width field, or an
/// unterminated escaped payload).
pub fn unpack(bytes: &[u8]) -> KvResult<Vec<TupleElement>> {
    let mut pos = 0;
    let mut out = Vec::new();
    while pos < bytes.len() {
        let (element, next) = unpack_one(bytes, pos)?;
        out.push(element);
        pos = next;
    }
    Ok(out)
}

fn unpack_one(bytes: &[u8], pos: usize) -> KvResult<(TupleElement, usize)> {
    let tag = *bytes
        .get(pos)
        .ok_or_else(|| KvError::MalformedTuple("truncated tag".into()))?;
    let pos = pos + 1;
    match tag {
        TAG_NULL => Ok((FieldValue::Null, pos)),
        TAG_BOOL => {
            let b = *bytes
                .get(pos)
                .ok_or_else(|| KvError::MalformedTuple("truncated bool".into()))?;
            Ok((FieldValue::Bool(b != 0), pos + 1))
        }
        TAG_INT64 => {
            let (arr, next) = take_fixed::<8>(bytes, pos)?;
            Ok((FieldValue::Int64(decode_i64(arr)), next))
        }
        TAG_DOUBLE => {
            let (arr, next) = take_fixed::<8>(bytes, pos)?;
            Ok((FieldValue::Double(decode_f64(arr)), next))
        }
        TAG_DATE => {
            let (arr, next) = take_fixed::<8>(bytes, pos)?;
            Ok((FieldValue::Date(decode_i64(arr)), next))
        }
        TAG_UUID => {
            let (arr, next) = take_fixed::<16>(bytes, pos)?;
            Ok((FieldValue::Uuid(Uuid::from_bytes(arr)), next))
        }
        TAG_STRING => {
            let (payload, next) = take_escaped(bytes, pos)?;
            let s = String::from_utf8(payload)
                .map_err(|e| KvError::MalformedTuple(format!("invalid utf8: {e}")))?;
            Ok((FieldValue::String(s), next))
        }
        TAG_BYTES => {
            let (payload, next) = take_escaped(bytes, pos)?;
            Ok((FieldValue::Bytes(payload), next))
        }
        TAG_ARRAY => {
            let (payload, next) = take_escaped(bytes, pos)?;
            Ok((FieldValue::Array(unpack(&payload)?), next))
        }
        other => Err(KvError::MalformedTuple(format!("unknown tag byte {other}"))),
    }
}

fn take_fixed<const N: usize>(bytes: &[u8], pos: usize) -> KvResult<([u8; N], usize)> {
    let end = pos + N;
    let slice = bytes
        .get(pos..end)
        .ok_or_else(|| KvError::MalformedTuple("truncated fixed-width field".into()))?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(slice);
    Ok((arr, end))
}

fn take_escaped(bytes: &[u8], mut pos: usize) -> KvResult<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    loop {
        match bytes.get(pos) {
            None => return Err(KvError::MalformedTuple("unterminated escaped payload".into())),
            Some(0x00) => match bytes.get(pos + 1) {
                Some(0xFF) => {
                    out.push(0x00);
                    pos += 2;
                }
                Some(0x01) => return Ok((out, pos + 2)),
                _ => return Err(KvError::MalformedTuple("invalid NUL escape".into())),
            },
            Some(&b) => {
                out.push(b);
                pos += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_values() -> Vec<FieldValue> {
        vec![
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Bool(false),
            FieldValue::Int64(i64::MIN),
            FieldValue::Int64(-1),
            FieldValue::Int64(0),
            FieldValue::Int64(i64::MAX),
            FieldValue::Double(-1.5),
            FieldValue::Double(0.0),
            FieldValue::Double(2.5),
            FieldValue::String("hello\u{0}world".into()),
            FieldValue::Bytes(vec![0, 1, 2, 0, 0, 255]),
            FieldValue::Uuid(Uuid::nil()),
            FieldValue::Date(1_700_000_000),
            FieldValue::Array(vec![FieldValue::Int64(1), FieldValue::String("x".into())]),
        ]
    }

    #[test]
    fn round_trips_each_sample() {
        for v in sample_values() {
            let packed = pack(&[v.clone()]);
            let unpacked = unpack(&packed).unwrap();
            assert_eq!(unpacked.len(), 1);
            assert!(unpacked[0].equals(&v), "{v:?} != {:?}", unpacked[0]);
        }
    }

    #[test]
    fn int64_ordering_preserved() {
        let values = [i64::MIN, -1000, -1, 0, 1, 1000, i64::MAX];
        let mut packed: Vec<(Vec<u8>, i64)> =
            values.iter().map(|&v| (pack(&[FieldValue::Int64(v)]), v)).collect();
        packed.sort_by(|a, b| a.0.cmp(&b.0));
        let sorted_values: Vec<i64> = packed.iter().map(|(_, v)| *v).collect();
        let mut expected = values.to_vec();
        expected.sort();
        assert_eq!(sorted_values, expected);
    }

    #[test]
    fn float_ordering_preserved() {
        let values = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1.0, 2.5, f64::INFINITY];
        let mut packed: Vec<(Vec<u8>, f64)> =
            values.iter().map(|&v| (pack(&[FieldValue::Double(v)]), v)).collect();
        packed.sort_by(|a, b| a.0.cmp(&b.0));
        let sorted_values: Vec<f64> = packed.iter().map(|(_, v)| *v).collect();
        assert_eq!(sorted_values, values.to_vec());
    }

    #[test]
    fn string_ordering_preserved() {
        let a = pack(&[FieldValue::String("ab".into())]);
        let b = pack(&[FieldValue::String("abc".into())]);
        assert!(a < b);
    }

    #[test]
    fn tuple_prefix_is_key_prefix() {
        let prefix = pack(&[FieldValue::String("ns".into())]);
        let full = pack(&[FieldValue::String("ns".into()), FieldValue::Int64(5)]);
        assert!(full.starts_with(&prefix));
    }

    proptest! {
        #[test]
        fn prop_round_trip_ints(v in any::<i64>()) {
            let packed = pack(&[FieldValue::Int64(v)]);
            let unpacked = unpack(&packed).unwrap();
            prop_assert!(unpacked[0].equals(&FieldValue::Int64(v)));
        }

        #[test]
        fn prop_round_trip_strings(s in "\\PC*") {
            let packed = pack(&[FieldValue::String(s.clone())]);
            let unpacked = unpack(&packed).unwrap();
            prop_assert!(unpacked[0].equals(&FieldValue::String(s)));
        }

        #[test]
        fn prop_round_trip_bytes(b in proptest::collection::vec(any::<u8>(), 0..32)) {
            let packed = pack(&[FieldValue::Bytes(b.clone())]);
            let unpacked = unpack(&packed).unwrap();
            prop_assert!(unpacked[0].equals(&FieldValue::Bytes(b)));
        }
    }
}
