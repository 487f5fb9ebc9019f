//! Combiner: splice packed blobs into one archive without re-encoding
//!
//! Each input's payload is copied verbatim in chunks; its TOC is grafted
//! into the combined TOC with every position shifted by the payload's
//! relocation offset. No child value is ever decoded or re-encoded.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lmc_codec::{Codec, MsgpackCodec};
use lmc_format::constants::PAYLOAD_ORIGIN;
use lmc_format::{
    Config, GroupBlock, KeyedToc, LmcError, Result, TocChildren, TocNode,
};
use rmpv::Value;
use tracing::debug;

use crate::reader::load_toc;
use crate::source::CachedSource;
use crate::writer::{finish_blob, start_blob, wire_err};

/// One input of a combine operation
#[derive(Debug, Clone)]
pub struct FileRef {
    /// Path of the packed blob
    pub path: PathBuf,
    /// Key of this blob in the combined archive; either all inputs carry
    /// a name (keyed result) or none does (positional result)
    pub name: Option<String>,
}

impl FileRef {
    /// An unnamed input
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    /// A named input
    pub fn named(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: Some(name.into()),
        }
    }
}

/// Combine packed blobs into a new archive using the process-wide
/// configuration
pub fn combine<P: AsRef<Path>>(output: P, inputs: &[FileRef]) -> Result<()> {
    combine_with_config(output, inputs, Config::global())
}

/// Combine packed blobs into a new archive
pub fn combine_with_config<P: AsRef<Path>>(
    output: P,
    inputs: &[FileRef],
    config: Config,
) -> Result<()> {
    if inputs.is_empty() {
        return Err(LmcError::Encode("combine requires at least one input".into()));
    }
    let named = inputs.iter().filter(|input| input.name.is_some()).count();
    let keyed = named == inputs.len();
    if !keyed && named != 0 {
        return Err(LmcError::CombineNameMix);
    }

    let codec = MsgpackCodec;
    let mut sink = start_blob(File::create(output.as_ref())?, config.write_buffer)?;

    let count = u32::try_from(inputs.len())
        .map_err(|_| LmcError::Encode("too many combine inputs".into()))?;
    if keyed {
        rmp::encode::write_map_len(&mut sink, count).map_err(wire_err)?;
    } else {
        rmp::encode::write_array_len(&mut sink, count).map_err(wire_err)?;
    }

    let mut keyed_children = KeyedToc::new();
    let mut positional_children = Vec::with_capacity(inputs.len());

    for input in inputs {
        let mut source = CachedSource::new(File::open(&input.path)?, config.read_buffer)?;
        let (toc, payload_len) = load_toc(&mut source, &codec)?;

        if let Some(name) = &input.name {
            codec.encode(&Value::from(name.as_str()), &mut sink)?;
        }

        let base = sink.pos() - PAYLOAD_ORIGIN;
        source.copy_range_to(PAYLOAD_ORIGIN, payload_len, &mut sink, config.copy_chunk)?;
        let grafted = Arc::new(shift_node(&toc, base)?);

        match &input.name {
            Some(name) => keyed_children
                .insert(name.clone(), grafted)
                .map_err(|_| LmcError::Encode(format!("duplicate combine name {name:?}")))?,
            None => positional_children.push(grafted),
        }
        debug!(path = %input.path.display(), base, payload_len, "grafted input");
    }

    sink.flush()?;
    let total = sink.pos() - PAYLOAD_ORIGIN;
    let root = TocNode {
        start: 0,
        end: total,
        children: Some(if keyed {
            TocChildren::Keyed(keyed_children)
        } else {
            TocChildren::Positional(positional_children)
        }),
    };
    finish_blob(sink, &root, &codec)?;
    Ok(())
}

/// Deep-copy a TOC subtree with every position shifted by `delta`
fn shift_node(node: &TocNode, delta: u64) -> Result<TocNode> {
    let children = match &node.children {
        None => None,
        Some(TocChildren::Keyed(keyed)) => {
            let mut shifted = KeyedToc::new();
            for (key, child) in keyed.iter() {
                shifted.insert(key.to_string(), Arc::new(shift_node(child, delta)?))?;
            }
            Some(TocChildren::Keyed(shifted))
        }
        Some(TocChildren::Positional(nodes)) => Some(TocChildren::Positional(
            nodes
                .iter()
                .map(|child| shift_node(child, delta).map(Arc::new))
                .collect::<Result<_>>()?,
        )),
        Some(TocChildren::Grouped(blocks)) => Some(TocChildren::Grouped(
            blocks
                .iter()
                .map(|block| GroupBlock {
                    count: block.count,
                    start: block.start + delta,
                    end: block.end + delta,
                })
                .collect(),
        )),
    };
    Ok(TocNode {
        start: node.start + delta,
        end: node.end + delta,
        children,
    })
}
