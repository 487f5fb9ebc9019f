//! Property-based tests for TOC wire encoding

use std::sync::Arc;

use lmc_format::{GroupBlock, KeyedToc, TocChildren, TocNode};
use proptest::prelude::*;

/// Build a positional node whose children partition `[1, 1 + sum)` into
/// the given segment lengths, mirroring how the packer lays out a
/// sequence after its container header byte(s).
fn positional_from_lengths(lengths: &[u64]) -> TocNode {
    let mut cursor = 1u64;
    let mut nodes = Vec::with_capacity(lengths.len());
    for &len in lengths {
        nodes.push(Arc::new(TocNode::leaf(cursor, cursor + len)));
        cursor += len;
    }
    TocNode {
        start: 0,
        end: cursor,
        children: Some(TocChildren::Positional(nodes)),
    }
}

proptest! {
    #[test]
    fn positional_roundtrip(lengths in prop::collection::vec(1u64..64, 1..40)) {
        let node = positional_from_lengths(&lengths);
        let decoded = TocNode::decode_root(&node.to_value(), node.end).unwrap();
        prop_assert_eq!(&*decoded, &node);
    }

    #[test]
    fn keyed_roundtrip(lengths in prop::collection::vec(1u64..64, 1..40)) {
        let mut cursor = 1u64;
        let mut keyed = KeyedToc::new();
        for (i, &len) in lengths.iter().enumerate() {
            keyed.insert(format!("key{i}"), Arc::new(TocNode::leaf(cursor, cursor + len))).unwrap();
            cursor += len;
        }
        let node = TocNode {
            start: 0,
            end: cursor,
            children: Some(TocChildren::Keyed(keyed)),
        };
        let decoded = TocNode::decode_root(&node.to_value(), cursor).unwrap();
        prop_assert_eq!(&*decoded, &node);
    }

    #[test]
    fn grouped_roundtrip(shape in prop::collection::vec((1u64..100, 1u64..256), 1..20)) {
        let mut cursor = 1u64;
        let mut blocks = Vec::with_capacity(shape.len());
        for &(count, len) in &shape {
            blocks.push(GroupBlock { count, start: cursor, end: cursor + len });
            cursor += len;
        }
        let node = TocNode {
            start: 0,
            end: cursor,
            children: Some(TocChildren::Grouped(blocks)),
        };
        let decoded = TocNode::decode_root(&node.to_value(), cursor).unwrap();
        prop_assert_eq!(&*decoded, &node);
    }

    #[test]
    fn shifted_root_is_rejected(shift in 1u64..1000, len in 1u64..1000) {
        // A root that does not start at payload offset zero violates
        // root coverage and must not decode.
        let node = TocNode::leaf(shift, shift + len);
        prop_assert!(TocNode::decode_root(&node.to_value(), shift + len).is_err());
    }
}
