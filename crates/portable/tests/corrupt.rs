// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Malformed input: every failure is a typed error, never a panic.

use portable::{DecodeMode, Marshaller, PortableError, Value, WireTag};

const SCHEMA_POS: usize = 14;

fn sample(m: &Marshaller) -> Vec<u8> {
    let leaf = m.builder("CorruptLeaf").unwrap();
    leaf.set_field("s", "leaf").unwrap();
    let root = m.builder("CorruptRoot").unwrap();
    root.set_field("a", &leaf).unwrap();
    root.set_field("b", &leaf).unwrap();
    root.set_field("me", &root).unwrap();
    root.set_field("nums", vec![1i64, 2, 3]).unwrap();
    root.set_field(
        "list",
        Value::collection(vec![Value::Builder(leaf.clone()), Value::Int(1)]),
    )
    .unwrap();
    root.build().unwrap().data().to_vec()
}

/// Decode every way the crate offers, touching whatever decoded.
fn exercise(m: &Marshaller, bytes: &[u8]) {
    let _ = m.decode(bytes.to_vec(), DecodeMode::Materialize);
    if let Ok(decoded) = m.decode(bytes.to_vec(), DecodeMode::ForceEncoded) {
        if let Some(obj) = decoded.object() {
            for name in ["a", "b", "me", "nums", "list", "s"] {
                let _ = obj.get_field(name);
            }
            let _ = obj.field_names();
            let _ = obj.materialize_graph();
            let _ = obj.detach();
            let _ = m.builder_from(obj).build();
        }
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

#[test]
fn every_truncation_is_corrupt() {
    let m = Marshaller::default();
    let bytes = sample(&m);
    for len in 0..bytes.len() {
        let prefix = bytes[..len].to_vec();
        for mode in [DecodeMode::Materialize, DecodeMode::ForceEncoded] {
            let err = m.decode(prefix.clone(), mode).unwrap_err();
            assert!(err.is_corrupt(), "len {}: {}", len, err);
        }
        assert!(m.wrap(prefix).unwrap_err().is_corrupt());
    }
}

#[test]
fn random_mutations_never_panic() {
    let m = Marshaller::default();
    let bytes = sample(&m);
    let mut rng = fastrand::Rng::with_seed(42);
    for _ in 0..2000 {
        let mut mutated = bytes.clone();
        for _ in 0..rng.usize(1..4) {
            let at = rng.usize(..mutated.len());
            mutated[at] = rng.u8(..);
        }
        exercise(&m, &mutated);
    }
}

#[test]
fn random_garbage_never_panics() {
    let m = Marshaller::default();
    let mut rng = fastrand::Rng::with_seed(9);
    for _ in 0..2000 {
        let mut garbage: Vec<u8> = (0..rng.usize(0..96)).map(|_| rng.u8(..)).collect();
        if !garbage.is_empty() && rng.bool() {
            garbage[0] = WireTag::Object.as_u8();
        }
        exercise(&m, &garbage);
    }
}

#[test]
fn unknown_tag() {
    let m = Marshaller::default();
    for tag in [0u8, 26, 27, 32, 35, 100, 105, 255] {
        let err = m.decode(vec![tag], DecodeMode::Materialize).unwrap_err();
        assert!(err.is_corrupt(), "tag {}", tag);
    }
}

#[test]
fn handle_without_target() {
    let m = Marshaller::default();
    let mut bytes = vec![WireTag::Handle.as_u8()];
    bytes.extend_from_slice(&1i32.to_le_bytes());
    assert!(m.decode(bytes, DecodeMode::Materialize).unwrap_err().is_corrupt());

    // Zero and negative deltas never point backwards.
    for delta in [0i32, -5] {
        let mut bytes = vec![WireTag::Collection.as_u8()];
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.push(WireTag::Null.as_u8());
        bytes.push(WireTag::Handle.as_u8());
        bytes.extend_from_slice(&delta.to_le_bytes());
        for mode in [DecodeMode::Materialize, DecodeMode::ForceEncoded] {
            assert!(m.decode(bytes.clone(), mode).unwrap_err().is_corrupt());
        }
    }
}

#[test]
fn handle_to_a_non_object() {
    let m = Marshaller::default();
    // [Collection, 2, Int 5, Handle -> the Int tag]
    let mut bytes = vec![WireTag::Collection.as_u8()];
    bytes.extend_from_slice(&2i32.to_le_bytes());
    let int_at = bytes.len();
    bytes.push(WireTag::Int.as_u8());
    bytes.extend_from_slice(&5i32.to_le_bytes());
    let handle_at = bytes.len();
    bytes.push(WireTag::Handle.as_u8());
    bytes.extend_from_slice(&((handle_at - int_at) as i32).to_le_bytes());

    for mode in [DecodeMode::Materialize, DecodeMode::ForceEncoded] {
        assert!(m.decode(bytes.clone(), mode).unwrap_err().is_corrupt());
    }
}

#[test]
fn duplicate_field_ids_in_schema() {
    let m = Marshaller::default();
    let b = m.builder("DupSchema").unwrap();
    b.set_field("x", 1i32).unwrap();
    b.set_field("y", 2i32).unwrap();
    let mut bytes = b.build().unwrap().data().to_vec();

    let schema = read_i32(&bytes, SCHEMA_POS) as usize;
    let first_id = read_i32(&bytes, schema + 4);
    bytes[schema + 12..schema + 16].copy_from_slice(&first_id.to_le_bytes());
    assert!(m.wrap(bytes).unwrap_err().is_corrupt());
}

#[test]
fn field_offset_inside_header() {
    let m = Marshaller::default();
    let b = m.builder("BadOffset").unwrap();
    b.set_field("x", 1i32).unwrap();
    let mut bytes = b.build().unwrap().data().to_vec();

    let schema = read_i32(&bytes, SCHEMA_POS) as usize;
    bytes[schema + 8..schema + 12].copy_from_slice(&2i32.to_le_bytes());
    assert!(m.wrap(bytes.clone()).unwrap_err().is_corrupt());
    assert!(m
        .decode(bytes, DecodeMode::Materialize)
        .unwrap_err()
        .is_corrupt());
}

#[test]
fn length_past_the_buffer() {
    let m = Marshaller::default();
    let mut bytes = m.builder("Short").unwrap().build().unwrap().data().to_vec();
    let len = read_i32(&bytes, 9) + 1;
    bytes[9..13].copy_from_slice(&len.to_le_bytes());
    assert!(m.wrap(bytes).unwrap_err().is_corrupt());
}

#[test]
fn unknown_type_and_field() {
    let m = Marshaller::default();
    let b = m.builder("KnownType").unwrap();
    b.set_field("x", 1i32).unwrap();
    let good = b.build().unwrap().data().to_vec();

    let mut bytes = good.clone();
    bytes[1..5].copy_from_slice(&0x1234_5678i32.to_le_bytes());
    assert!(matches!(
        m.decode(bytes, DecodeMode::Materialize),
        Err(PortableError::UnknownType(0x1234_5678))
    ));

    // A fresh registry has never seen the type or its fields.
    let other = Marshaller::default();
    assert!(matches!(
        other.decode(good.clone(), DecodeMode::Materialize),
        Err(PortableError::UnknownType(_))
    ));
    other.resolve_id("KnownType").unwrap();
    assert!(matches!(
        other.decode(good, DecodeMode::Materialize),
        Err(PortableError::UnknownField { .. })
    ));
}

#[test]
fn trailing_bytes() {
    let m = Marshaller::default();
    let mut bytes = sample(&m);
    bytes.push(WireTag::Null.as_u8());
    assert!(m.wrap(bytes.clone()).unwrap_err().is_corrupt());
    assert!(m
        .decode(bytes, DecodeMode::ForceEncoded)
        .unwrap_err()
        .is_corrupt());
}
