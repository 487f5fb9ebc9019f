//! Packer: single-pass stream encoder that records the table of contents
//!
//! The packer writes the magic and a placeholder header, stream-encodes
//! the root value while building TOC nodes bottom-up, then appends the
//! encoded TOC and seeks back to patch the header. The TOC shape of each
//! container follows its encoded size: small containers stay opaque,
//! long runs of trivially-sized elements collapse into grouped blocks,
//! and everything else gets keyed or positional children.

use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::sync::Arc;

use lmc_codec::{Codec, MsgpackCodec};
use lmc_format::constants::{HEADER_LEN, MAGIC, PAYLOAD_ORIGIN};
use lmc_format::{
    Config, FileHeader, GroupBlock, KeyedToc, LmcError, Result, TocChildren, TocNode,
};
use rmpv::Value;
use tracing::{debug, warn};

/// Write adapter that tracks the absolute byte position
pub(crate) struct CountWrite<W> {
    inner: W,
    pos: u64,
}

impl<W: Write> CountWrite<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    pub(crate) fn pos(&self) -> u64 {
        self.pos
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.pos += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub(crate) fn wire_err<E>(err: E) -> LmcError
where
    E: std::error::Error + Send + Sync + 'static,
{
    LmcError::Io(io::Error::other(err))
}

/// Open a blob for writing: magic plus a zeroed header placeholder
pub(crate) fn start_blob<W: Write + Seek>(
    sink: W,
    write_buffer: usize,
) -> Result<CountWrite<BufWriter<W>>> {
    let mut counted = CountWrite::new(BufWriter::with_capacity(write_buffer, sink));
    counted.write_all(&MAGIC)?;
    counted.write_all(&[0u8; HEADER_LEN])?;
    Ok(counted)
}

/// Append the encoded TOC, patch the header, and flush
pub(crate) fn finish_blob<W: Write + Seek>(
    mut sink: CountWrite<BufWriter<W>>,
    root: &TocNode,
    codec: &dyn Codec,
) -> Result<W> {
    let toc_start = sink.pos();
    codec.encode(&root.to_value(), &mut sink)?;
    let toc_len = sink.pos() - toc_start;

    let header = FileHeader { toc_start, toc_len };
    let mut buffered = sink.into_inner();
    buffered.seek(SeekFrom::Start(MAGIC.len() as u64))?;
    buffered.write_all(&header.encode())?;
    let mut inner = buffered
        .into_inner()
        .map_err(|e| LmcError::Io(e.into_error()))?;
    inner.flush()?;

    debug!(toc_start, toc_len, "blob finished");
    Ok(inner)
}

struct PackEngine<W: Write + Seek> {
    sink: CountWrite<BufWriter<W>>,
    codec: Arc<dyn Codec>,
    config: Config,
}

impl<W: Write + Seek> PackEngine<W> {
    fn payload_pos(&self) -> u64 {
        self.sink.pos() - PAYLOAD_ORIGIN
    }

    fn encode_scalar(&mut self, value: &Value) -> Result<()> {
        let codec = Arc::clone(&self.codec);
        codec.encode(value, &mut self.sink)
    }

    fn pack_value(&mut self, value: &Value) -> Result<TocNode> {
        match value {
            Value::Map(entries) => self.pack_map(entries),
            Value::Array(items) => self.pack_array(items),
            _ => {
                let start = self.payload_pos();
                self.encode_scalar(value)?;
                Ok(TocNode::leaf(start, self.payload_pos()))
            }
        }
    }

    fn pack_map(&mut self, entries: &[(Value, Value)]) -> Result<TocNode> {
        let start = self.payload_pos();
        let len = container_len(entries.len())?;
        rmp::encode::write_map_len(&mut self.sink, len).map_err(wire_err)?;

        let mut toc = KeyedToc::new();
        let mut all_trivial = true;
        for (key, value) in entries {
            let key = key.as_str().ok_or_else(|| {
                LmcError::Encode(format!("map key must be a UTF-8 string, got {key}"))
            })?;
            self.encode_scalar(&Value::from(key))?;
            let child = self.pack_value(value)?;
            all_trivial &= self.is_trivial(&child);
            toc.insert(key.to_string(), Arc::new(child))
                .map_err(|_| LmcError::Encode(format!("duplicate map key {key:?}")))?;
        }

        let end = self.payload_pos();
        if end - start < self.config.small_obj_threshold as u64 || all_trivial {
            return Ok(TocNode::leaf(start, end));
        }
        Ok(TocNode {
            start,
            end,
            children: Some(TocChildren::Keyed(toc)),
        })
    }

    fn pack_array(&mut self, items: &[Value]) -> Result<TocNode> {
        let start = self.payload_pos();
        let len = container_len(items.len())?;
        rmp::encode::write_array_len(&mut self.sink, len).map_err(wire_err)?;

        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            nodes.push(Arc::new(self.pack_value(item)?));
        }

        let end = self.payload_pos();
        if end - start < self.config.small_obj_threshold as u64 {
            return Ok(TocNode::leaf(start, end));
        }

        if !nodes.is_empty() && nodes.iter().all(|node| self.is_trivial(node)) {
            let blocks = group_blocks(&nodes, self.config.small_obj_threshold as u64);
            if blocks.len() > 1 {
                return Ok(TocNode {
                    start,
                    end,
                    children: Some(TocChildren::Grouped(blocks)),
                });
            }
            return Ok(TocNode::leaf(start, end));
        }

        Ok(TocNode {
            start,
            end,
            children: Some(TocChildren::Positional(nodes)),
        })
    }

    fn is_trivial(&self, node: &TocNode) -> bool {
        node.children.is_none() && node.byte_len() <= self.config.trivial_size as u64
    }
}

/// Partition trivially-sized elements into blocks whose cumulative size
/// meets or exceeds the threshold; the last block takes the remainder.
fn group_blocks(nodes: &[Arc<TocNode>], threshold: u64) -> Vec<GroupBlock> {
    let mut blocks = Vec::new();
    let mut count = 0u64;
    let mut block_start = 0u64;
    let mut accumulated = 0u64;

    for node in nodes {
        if count == 0 {
            block_start = node.start;
        }
        count += 1;
        accumulated += node.byte_len();
        if accumulated >= threshold {
            blocks.push(GroupBlock {
                count,
                start: block_start,
                end: node.end,
            });
            count = 0;
            accumulated = 0;
        }
    }
    if count > 0 {
        if let Some(last) = nodes.last() {
            blocks.push(GroupBlock {
                count,
                start: block_start,
                end: last.end,
            });
        }
    }
    blocks
}

fn container_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| LmcError::Encode(format!("container length {len} exceeds format limits")))
}

/// Streaming packer for a single blob.
///
/// Write the root exactly once with [`write`](Packer::write) or
/// [`write_map_stream`](Packer::write_map_stream), then call
/// [`finish`](Packer::finish) to emit the TOC trailer and patch the
/// header.
pub struct Packer<W: Write + Seek> {
    engine: Option<PackEngine<W>>,
    root: Option<Arc<TocNode>>,
    finished: bool,
}

impl<W: Write + Seek> Packer<W> {
    /// Create a packer over `sink` using the process-wide configuration
    pub fn new(sink: W) -> Result<Self> {
        Self::with_config(sink, Config::global())
    }

    /// Create a packer with an explicit configuration
    pub fn with_config(sink: W, config: Config) -> Result<Self> {
        let sink = start_blob(sink, config.write_buffer)?;
        Ok(Self {
            engine: Some(PackEngine {
                sink,
                codec: Arc::new(MsgpackCodec),
                config,
            }),
            root: None,
            finished: false,
        })
    }

    /// Replace the codec back-end
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        if let Some(engine) = self.engine.as_mut() {
            engine.codec = codec;
        }
        self
    }

    fn engine_mut(&mut self) -> Result<&mut PackEngine<W>> {
        self.engine
            .as_mut()
            .ok_or_else(|| LmcError::Internal("packer sink missing".into()))
    }

    fn ensure_unwritten(&self) -> Result<()> {
        if self.root.is_some() {
            return Err(LmcError::Encode("root value already written".into()));
        }
        Ok(())
    }

    /// Encode `value` as the root of the blob
    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.ensure_unwritten()?;
        let node = self.engine_mut()?.pack_value(value)?;
        self.root = Some(Arc::new(node));
        Ok(())
    }

    /// Encode a root map of declared length from streamed entries.
    ///
    /// The declared length is written first and exactly `len` pairs are
    /// then consumed from `entries`; yielding fewer or more pairs fails
    /// with [`LmcError::EncodeCountMismatch`].
    pub fn write_map_stream<I>(&mut self, len: usize, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.ensure_unwritten()?;
        let engine = self.engine_mut()?;

        let start = engine.payload_pos();
        let wire_len = container_len(len)?;
        rmp::encode::write_map_len(&mut engine.sink, wire_len).map_err(wire_err)?;

        let mut toc = KeyedToc::new();
        let mut all_trivial = true;
        let mut yielded = 0usize;
        let mut entries = entries.into_iter();
        while yielded < len {
            let Some((key, value)) = entries.next() else {
                break;
            };
            yielded += 1;
            engine.encode_scalar(&Value::from(key.as_str()))?;
            let child = engine.pack_value(&value)?;
            all_trivial &= engine.is_trivial(&child);
            toc.insert(key, Arc::new(child))
                .map_err(|e| LmcError::Encode(e.to_string()))?;
        }

        if yielded < len {
            return Err(LmcError::EncodeCountMismatch {
                declared: len,
                actual: yielded,
            });
        }
        // Probe a single pair past the declared length; draining the
        // rest could run forever on an unbounded producer.
        if entries.next().is_some() {
            return Err(LmcError::EncodeCountMismatch {
                declared: len,
                actual: len + 1,
            });
        }

        let end = engine.payload_pos();
        let node = if end - start < engine.config.small_obj_threshold as u64 || all_trivial {
            TocNode::leaf(start, end)
        } else {
            TocNode {
                start,
                end,
                children: Some(TocChildren::Keyed(toc)),
            }
        };
        self.root = Some(Arc::new(node));
        Ok(())
    }

    /// Emit the TOC trailer, patch the header, and return the sink
    pub fn finish(mut self) -> Result<W> {
        let root = self
            .root
            .take()
            .ok_or_else(|| LmcError::Encode("no root value was written".into()))?;
        let engine = self
            .engine
            .take()
            .ok_or_else(|| LmcError::Internal("packer sink missing".into()))?;
        self.finished = true;
        finish_blob(engine.sink, &root, engine.codec.as_ref())
    }
}

impl<W: Write + Seek> Drop for Packer<W> {
    fn drop(&mut self) {
        if !self.finished && self.engine.is_some() {
            warn!("packer dropped without finish; the blob is incomplete");
        }
    }
}
