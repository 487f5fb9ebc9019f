//! Table-of-contents model
//!
//! A TOC is a tree of byte-range descriptors running parallel to the
//! packed payload. Each node records where the encoding of its value
//! lives; nodes for expanded containers additionally carry a child table
//! in one of three shapes: keyed (maps), positional (sequences), or
//! grouped (long runs of trivially-sized elements partitioned into
//! blocks).
//!
//! On the wire a node is a MessagePack map with single-letter keys:
//! `"p"` holds the `[start, end]` pair, `"t"` the optional child table.
//! Grouped entries are `[count, start, end]` triples, distinguishable
//! from positional children, which are maps.

use std::collections::HashMap;
use std::sync::Arc;

use rmpv::Value;

use crate::constants::{KEY_POS, KEY_TABLE};
use crate::error::{LmcError, Result};

/// One node of the table of contents.
///
/// `start` and `end` delimit the half-open byte range of this value's
/// encoding, relative to the start of the payload region.
#[derive(Debug, Clone, PartialEq)]
pub struct TocNode {
    /// First byte of the encoded value
    pub start: u64,
    /// One past the last byte of the encoded value
    pub end: u64,
    /// Child table, present only for expanded containers
    pub children: Option<TocChildren>,
}

/// Child table of an expanded container node
#[derive(Debug, Clone, PartialEq)]
pub enum TocChildren {
    /// Ordered string-keyed children of a map
    Keyed(KeyedToc),
    /// Ordered children of a sequence
    Positional(Vec<Arc<TocNode>>),
    /// Block index over a long run of trivially-sized elements
    Grouped(Vec<GroupBlock>),
}

/// One block of a grouped child table: `count` consecutive elements
/// occupying `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupBlock {
    /// Number of elements in the block
    pub count: u64,
    /// First byte of the block
    pub start: u64,
    /// One past the last byte of the block
    pub end: u64,
}

/// Ordered association from child key to child node, with an index for
/// constant-time lookup. Iteration follows payload order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedToc {
    entries: Vec<(String, Arc<TocNode>)>,
    index: HashMap<String, usize>,
}

impl KeyedToc {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child; duplicate keys are an error
    pub fn insert(&mut self, key: String, node: Arc<TocNode>) -> Result<()> {
        if self.index.contains_key(&key) {
            return Err(LmcError::CorruptToc(format!("duplicate key {key:?}")));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, node));
        Ok(())
    }

    /// Look up a child by key
    pub fn get(&self, key: &str) -> Option<&Arc<TocNode>> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Whether the table holds `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in payload order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `(key, node)` pairs in payload order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TocNode>)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }
}

impl TocNode {
    /// A node without a child table
    pub fn leaf(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            children: None,
        }
    }

    /// Encoded length of this value in bytes
    pub fn byte_len(&self) -> u64 {
        self.end - self.start
    }

    /// Encode the node tree to its wire form
    pub fn to_value(&self) -> Value {
        let mut fields = Vec::with_capacity(2);
        fields.push((
            Value::from(KEY_POS),
            Value::Array(vec![Value::from(self.start), Value::from(self.end)]),
        ));
        if let Some(children) = &self.children {
            fields.push((Value::from(KEY_TABLE), children.to_value()));
        }
        Value::Map(fields)
    }

    /// Decode and validate a TOC tree whose root must cover exactly
    /// `[0, payload_len)`
    pub fn decode_root(value: &Value, payload_len: u64) -> Result<Arc<TocNode>> {
        let root = Self::decode_within(value, 0, payload_len)?;
        if root.start != 0 || root.end != payload_len {
            return Err(LmcError::CorruptToc(format!(
                "root covers [{}, {}) instead of [0, {payload_len})",
                root.start, root.end
            )));
        }
        Ok(root)
    }

    /// Decode one node, checking that it sits inside `[lo, hi)`
    fn decode_within(value: &Value, lo: u64, hi: u64) -> Result<Arc<TocNode>> {
        let entries = value
            .as_map()
            .ok_or_else(|| LmcError::CorruptToc("node is not a map".into()))?;

        let mut pos = None;
        let mut table = None;
        for (key, val) in entries {
            match key.as_str() {
                Some(KEY_POS) => pos = Some(val),
                Some(KEY_TABLE) => table = Some(val),
                _ => {}
            }
        }

        let (start, end) =
            decode_pos(pos.ok_or_else(|| LmcError::CorruptToc("node is missing \"p\"".into()))?)?;
        if start < lo || end > hi {
            return Err(LmcError::CorruptToc(format!(
                "child [{start}, {end}) escapes parent [{lo}, {hi})"
            )));
        }

        let children = match table {
            None => None,
            Some(val) => Some(TocChildren::decode(val, start, end)?),
        };

        Ok(Arc::new(TocNode {
            start,
            end,
            children,
        }))
    }
}

impl TocChildren {
    /// Encode the child table to its wire form
    pub fn to_value(&self) -> Value {
        match self {
            TocChildren::Keyed(keyed) => Value::Map(
                keyed
                    .iter()
                    .map(|(key, node)| (Value::from(key), node.to_value()))
                    .collect(),
            ),
            TocChildren::Positional(nodes) => {
                Value::Array(nodes.iter().map(|node| node.to_value()).collect())
            }
            TocChildren::Grouped(blocks) => Value::Array(
                blocks
                    .iter()
                    .map(|block| {
                        Value::Array(vec![
                            Value::from(block.count),
                            Value::from(block.start),
                            Value::from(block.end),
                        ])
                    })
                    .collect(),
            ),
        }
    }

    fn decode(value: &Value, start: u64, end: u64) -> Result<Self> {
        if let Some(entries) = value.as_map() {
            let mut keyed = KeyedToc::new();
            let mut prev_end = start;
            for (key, val) in entries {
                let key = key
                    .as_str()
                    .ok_or_else(|| LmcError::CorruptToc("non-string child key".into()))?;
                let node = TocNode::decode_within(val, start, end)?;
                if node.start < prev_end {
                    return Err(LmcError::CorruptToc(format!(
                        "child {key:?} overlaps its predecessor"
                    )));
                }
                prev_end = node.end;
                keyed.insert(key.to_string(), node)?;
            }
            return Ok(TocChildren::Keyed(keyed));
        }

        let items = value
            .as_array()
            .ok_or_else(|| LmcError::CorruptToc("child table is neither map nor array".into()))?;
        if items.is_empty() {
            return Err(LmcError::CorruptToc("empty child table".into()));
        }

        if items[0].is_map() {
            let mut nodes = Vec::with_capacity(items.len());
            let mut prev_end = start;
            for item in items {
                let node = TocNode::decode_within(item, start, end)?;
                if node.start < prev_end {
                    return Err(LmcError::CorruptToc(
                        "positional child overlaps its predecessor".into(),
                    ));
                }
                prev_end = node.end;
                nodes.push(node);
            }
            return Ok(TocChildren::Positional(nodes));
        }

        let mut blocks = Vec::with_capacity(items.len());
        for item in items {
            blocks.push(decode_block(item)?);
        }
        for pair in blocks.windows(2) {
            if pair[1].start != pair[0].end {
                return Err(LmcError::CorruptToc(
                    "grouped blocks are not contiguous".into(),
                ));
            }
        }
        // The first block starts past the parent's container header; the
        // last must close the parent range exactly.
        let first = &blocks[0];
        let last = &blocks[blocks.len() - 1];
        if first.start < start || first.start > end || last.end != end {
            return Err(LmcError::CorruptToc(
                "grouped blocks do not cover the element region".into(),
            ));
        }
        Ok(TocChildren::Grouped(blocks))
    }
}

fn decode_pos(value: &Value) -> Result<(u64, u64)> {
    let pair = value
        .as_array()
        .ok_or_else(|| LmcError::CorruptToc("\"p\" is not an array".into()))?;
    if pair.len() != 2 {
        return Err(LmcError::CorruptToc("\"p\" is not a pair".into()));
    }
    let start = pair[0]
        .as_u64()
        .ok_or_else(|| LmcError::CorruptToc("negative or non-integer start".into()))?;
    let end = pair[1]
        .as_u64()
        .ok_or_else(|| LmcError::CorruptToc("negative or non-integer end".into()))?;
    if end < start {
        return Err(LmcError::CorruptToc(format!(
            "range end {end} precedes start {start}"
        )));
    }
    Ok((start, end))
}

fn decode_block(value: &Value) -> Result<GroupBlock> {
    let triple = value
        .as_array()
        .ok_or_else(|| LmcError::CorruptToc("grouped entry is not an array".into()))?;
    if triple.len() != 3 {
        return Err(LmcError::CorruptToc("grouped entry is not a triple".into()));
    }
    let count = triple[0]
        .as_u64()
        .ok_or_else(|| LmcError::CorruptToc("non-integer block count".into()))?;
    let (start, end) = (
        triple[1]
            .as_u64()
            .ok_or_else(|| LmcError::CorruptToc("non-integer block start".into()))?,
        triple[2]
            .as_u64()
            .ok_or_else(|| LmcError::CorruptToc("non-integer block end".into()))?,
    );
    if count == 0 || end <= start {
        return Err(LmcError::CorruptToc("degenerate grouped block".into()));
    }
    Ok(GroupBlock { count, start, end })
}
