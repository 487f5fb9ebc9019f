//! Failure modes and boundary cases

use std::io::Cursor;
use std::sync::Arc;

use lmc_codec::{Codec, MsgpackCodec};
use lmc_format::constants::{MAGIC, PAYLOAD_ORIGIN};
use lmc_format::{Config, FileHeader, KeyedToc, LmcError, TocChildren, TocNode};
use lmc_io::{
    combine_with_config, FileRef, LazyReader, PathSeg, Packer, ReaderOptions,
};
use rmpv::Value;

fn pack_with(value: &Value, config: &Config) -> Vec<u8> {
    let mut packer = Packer::with_config(Cursor::new(Vec::new()), config.clone()).unwrap();
    packer.write(value).unwrap();
    packer.finish().unwrap().into_inner()
}

fn reader_with(blob: Vec<u8>, config: &Config) -> lmc_format::Result<LazyReader> {
    LazyReader::from_source(
        Cursor::new(blob),
        ReaderOptions {
            config: config.clone(),
            ..ReaderOptions::default()
        },
    )
}

fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::from(k), v))
            .collect(),
    )
}

#[test]
fn streamed_map_with_short_iterator_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = std::fs::File::create(dir.path().join("short.lmc")).unwrap();
    let mut packer = Packer::new(file).unwrap();
    let err = packer
        .write_map_stream(
            3,
            vec![
                ("a".to_string(), Value::from(1)),
                ("b".to_string(), Value::from(2)),
            ],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LmcError::EncodeCountMismatch {
            declared: 3,
            actual: 2
        }
    ));
}

#[test]
fn streamed_map_roundtrips_when_counts_match() {
    let entries: Vec<(String, Value)> = (0..100)
        .map(|i| (format!("key{i:03}"), Value::from(i)))
        .collect();
    let mut packer =
        Packer::with_config(Cursor::new(Vec::new()), Config::default()).unwrap();
    packer.write_map_stream(100, entries.clone()).unwrap();
    let blob = packer.finish().unwrap().into_inner();

    let reader = LazyReader::from_bytes(blob).unwrap();
    for (key, value) in &entries {
        assert!(reader.read_path(key).unwrap() == *value);
    }
}

#[test]
fn truncated_trailer_fails_at_open() {
    let value = map(vec![("a", Value::from(1))]);
    let mut blob = pack_with(&value, &Config::default());
    blob.pop();
    assert!(matches!(
        LazyReader::from_bytes(blob),
        Err(LmcError::CorruptHeader)
    ));
}

#[test]
fn corrupt_payload_fails_lazily() {
    let big_a = "a".repeat(120);
    let big_b = "b".repeat(120);
    let value = map(vec![
        ("a", Value::from(big_a.as_str())),
        ("b", Value::from(big_b.as_str())),
    ]);
    let config = Config::default().with_small_obj_threshold(1);
    let mut blob = pack_with(&value, &config);

    // Zero out the bytes of "b" so its range no longer decodes as one
    // complete value; the header and TOC stay intact.
    let header = FileHeader::decode(&blob[MAGIC.len()..PAYLOAD_ORIGIN as usize]).unwrap();
    let toc_value = MsgpackCodec
        .decode(&blob[header.toc_start as usize..(header.toc_start + header.toc_len) as usize])
        .unwrap();
    let toc = TocNode::decode_root(&toc_value, header.payload_len()).unwrap();
    let b_node = match &toc.children {
        Some(TocChildren::Keyed(keyed)) => Arc::clone(keyed.get("b").unwrap()),
        other => panic!("expected keyed root, got {other:?}"),
    };
    for byte in &mut blob
        [(PAYLOAD_ORIGIN + b_node.start) as usize..(PAYLOAD_ORIGIN + b_node.end) as usize]
    {
        *byte = 0;
    }

    // Open succeeds; the intact sibling resolves; the damaged one fails.
    let reader = reader_with(blob, &config).unwrap();
    assert!(reader.read_path("a").unwrap() == Value::from(big_a.as_str()));
    assert!(matches!(
        reader.read_path("b"),
        Err(LmcError::Decode(_))
    ));
}

#[test]
fn bad_magic_is_rejected() {
    let mut blob = pack_with(&Value::from(1), &Config::default());
    blob[0] ^= 0xFF;
    assert!(matches!(
        LazyReader::from_bytes(blob),
        Err(LmcError::InvalidMagic)
    ));
}

#[test]
fn reads_after_close_fail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("closed.lmc");
    let value = map(vec![("k", Value::from("v"))]);
    std::fs::write(&path, pack_with(&value, &Config::default())).unwrap();

    let reader = LazyReader::open(&path).unwrap();
    assert!(reader.read_path("k").unwrap() == Value::from("v"));
    reader.close();
    assert!(matches!(
        reader.read_path("k"),
        Err(LmcError::SessionClosed)
    ));
}

#[test]
fn combine_rejects_duplicate_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.lmc");
    std::fs::write(&path, pack_with(&Value::from(1), &Config::default())).unwrap();

    let err = combine_with_config(
        dir.path().join("out.lmc"),
        &[FileRef::named(&path, "dup"), FileRef::named(&path, "dup")],
        Config::default(),
    )
    .unwrap_err();
    assert!(matches!(err, LmcError::Encode(_)));
}

#[test]
fn combine_rejects_empty_input_list() {
    let dir = tempfile::tempdir().unwrap();
    let err =
        combine_with_config(dir.path().join("out.lmc"), &[], Config::default()).unwrap_err();
    assert!(matches!(err, LmcError::Encode(_)));
}

#[test]
fn empty_containers_roundtrip() {
    for value in [Value::Map(vec![]), Value::Array(vec![])] {
        for threshold in [1usize, 8192] {
            let config = Config::default().with_small_obj_threshold(threshold);
            let reader = reader_with(pack_with(&value, &config), &config).unwrap();
            assert!(reader.read().unwrap() == value);
        }
    }
}

#[test]
fn threshold_boundary_flips_expansion() {
    let filler = "f".repeat(64);
    let value = map(vec![
        ("one", Value::from(filler.as_str())),
        ("two", Value::from(filler.as_str())),
    ]);

    // Measure the exact encoded size of the container.
    let mut encoded = Vec::new();
    MsgpackCodec.encode(&value, &mut encoded).unwrap();
    let size = encoded.len();

    // Just above the size: stored opaquely. At the size and below: the
    // container meets the threshold and is expanded.
    for (threshold, expanded) in [(size + 1, false), (size, true), (size - 1, true)] {
        let config = Config::default().with_small_obj_threshold(threshold);
        let blob = pack_with(&value, &config);
        let header = FileHeader::decode(&blob[MAGIC.len()..PAYLOAD_ORIGIN as usize]).unwrap();
        let toc_value = MsgpackCodec
            .decode(&blob[header.toc_start as usize..(header.toc_start + header.toc_len) as usize])
            .unwrap();
        let toc = TocNode::decode_root(&toc_value, header.payload_len()).unwrap();
        assert_eq!(
            toc.children.is_some(),
            expanded,
            "threshold {threshold} against size {size}"
        );
    }
}

#[test]
fn trivial_size_boundary_flips_grouping() {
    // fixstr of n characters encodes to n + 1 bytes.
    let config = Config::default()
        .with_small_obj_threshold(48)
        .with_trivial_size(10);

    let at_limit = Value::Array((0..12).map(|_| Value::from("123456789")).collect());
    let blob = pack_with(&at_limit, &config);
    let header = FileHeader::decode(&blob[MAGIC.len()..PAYLOAD_ORIGIN as usize]).unwrap();
    let toc_value = MsgpackCodec
        .decode(&blob[header.toc_start as usize..(header.toc_start + header.toc_len) as usize])
        .unwrap();
    let toc = TocNode::decode_root(&toc_value, header.payload_len()).unwrap();
    assert!(
        matches!(toc.children, Some(TocChildren::Grouped(_))),
        "ten-byte elements should group"
    );

    let over_limit = Value::Array((0..12).map(|_| Value::from("1234567890")).collect());
    let blob = pack_with(&over_limit, &config);
    let header = FileHeader::decode(&blob[MAGIC.len()..PAYLOAD_ORIGIN as usize]).unwrap();
    let toc_value = MsgpackCodec
        .decode(&blob[header.toc_start as usize..(header.toc_start + header.toc_len) as usize])
        .unwrap();
    let toc = TocNode::decode_root(&toc_value, header.payload_len()).unwrap();
    assert!(
        matches!(toc.children, Some(TocChildren::Positional(_))),
        "eleven-byte elements must fall back to positional children"
    );
}

#[test]
fn deeply_nested_values_resolve() {
    let mut value = Value::from("bottom");
    for _ in 0..40 {
        value = Value::Array(vec![value]);
    }
    let config = Config::default().with_small_obj_threshold(1);
    let reader = reader_with(pack_with(&value, &config), &config).unwrap();

    let path: Vec<PathSeg> = (0..40).map(|_| PathSeg::Index(0)).collect();
    assert!(reader.read_segments(path).unwrap() == Value::from("bottom"));
    assert!(reader.to_plain().unwrap() == value);
}

#[test]
fn multibyte_and_slash_keys_resolve() {
    let filler = "v".repeat(64);
    let value = map(vec![
        ("日本語キー", Value::from(filler.as_str())),
        ("a/b", Value::from("slashed")),
        ("plain", Value::from(1)),
    ]);
    let config = Config::default().with_small_obj_threshold(1);
    let reader = reader_with(pack_with(&value, &config), &config).unwrap();

    assert!(reader.read_path("日本語キー").unwrap() == Value::from(filler.as_str()));
    // A key containing the separator is only reachable through the
    // segment form.
    assert!(reader.read_segments([PathSeg::Key("a/b".into())]).unwrap() == Value::from("slashed"));
    assert!(matches!(
        reader.read_path("a/b"),
        Err(LmcError::KeyNotFound(_))
    ));
}

#[test]
fn negative_indices_are_not_supported() {
    let value = Value::Array((0..30).map(Value::from).collect());
    let config = Config::default().with_small_obj_threshold(4);
    let reader = reader_with(pack_with(&value, &config), &config).unwrap();

    assert!(matches!(
        reader.read_path("-1"),
        Err(LmcError::TypeMismatch(_))
    ));
}

#[test]
fn reader_accepts_retained_table_over_leaf_children() {
    // Packers in the wild may keep the child table even when every child
    // is a bare leaf; build such a blob by hand and read it back.
    let codec = MsgpackCodec;
    let mut payload = Vec::new();
    rmp::encode::write_map_len(&mut payload, 2).unwrap();
    let mut keyed = KeyedToc::new();
    for (key, number) in [("x", 1i64), ("y", 2i64)] {
        codec.encode(&Value::from(key), &mut payload).unwrap();
        let start = payload.len() as u64;
        codec.encode(&Value::from(number), &mut payload).unwrap();
        keyed
            .insert(key.into(), Arc::new(TocNode::leaf(start, payload.len() as u64)))
            .unwrap();
    }
    let root = TocNode {
        start: 0,
        end: payload.len() as u64,
        children: Some(TocChildren::Keyed(keyed)),
    };

    let mut blob = MAGIC.to_vec();
    blob.extend_from_slice(&[0u8; 20]);
    blob.extend_from_slice(&payload);
    let toc_start = blob.len() as u64;
    codec.encode(&root.to_value(), &mut blob).unwrap();
    let toc_len = blob.len() as u64 - toc_start;
    blob[MAGIC.len()..PAYLOAD_ORIGIN as usize]
        .copy_from_slice(&FileHeader { toc_start, toc_len }.encode());

    let reader = LazyReader::from_bytes(blob).unwrap();
    assert!(reader.read_path("x").unwrap() == Value::from(1));
    assert!(reader.read_path("y").unwrap() == Value::from(2));
    assert!(reader.to_plain().unwrap() == map(vec![("x", Value::from(1)), ("y", Value::from(2))]));
}
