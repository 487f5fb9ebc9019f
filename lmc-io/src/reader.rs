//! Lazy reader session and cursors
//!
//! Opening a blob reads the magic, the header, and the TOC; payload
//! bytes are only fetched when a path resolves into them. Containers
//! with a child table come back as [`LazyMap`]/[`LazySeq`] cursors;
//! everything else is decoded to a plain value on first touch.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rmpv::Value;
use tracing::debug;

use lmc_codec::{Codec, MsgpackCodec};
use lmc_format::constants::{HEADER_LEN, MAGIC, PAYLOAD_ORIGIN};
use lmc_format::{Config, FileHeader, KeyedToc, LmcError, Result, TocChildren, TocNode};

use crate::path::{as_sequence_token, parse_path, PathSeg, SliceSpec};
use crate::source::{CachedSource, SourceStats};

/// Blanket bound for boxed random-access blob storage
trait BlobRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> BlobRead for T {}

/// Read the magic, header, and TOC of a blob through `source`
pub(crate) fn load_toc<R: Read + Seek>(
    source: &mut CachedSource<R>,
    codec: &dyn Codec,
) -> Result<(Arc<TocNode>, u64)> {
    let head = source
        .read(0, MAGIC.len() + HEADER_LEN)
        .map_err(|e| match e {
            LmcError::UnexpectedEof => LmcError::CorruptHeader,
            other => other,
        })?;
    if head[..MAGIC.len()] != MAGIC {
        return Err(LmcError::InvalidMagic);
    }

    let header = FileHeader::decode(&head[MAGIC.len()..])?;
    header.validate(source.len())?;
    let payload_len = header.payload_len();

    let toc_len = usize::try_from(header.toc_len).map_err(|_| LmcError::CorruptHeader)?;
    let toc_bytes = source.read(header.toc_start, toc_len)?;
    let toc_value = codec.decode(&toc_bytes)?;
    let toc = TocNode::decode_root(&toc_value, payload_len)?;
    Ok((toc, payload_len))
}

/// State shared by a session and every cursor derived from it
struct ReaderShared {
    source: Mutex<CachedSource<Box<dyn BlobRead>>>,
    codec: Arc<dyn Codec>,
    config: Config,
    cached: bool,
    closed: AtomicBool,
}

impl ReaderShared {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LmcError::SessionClosed);
        }
        Ok(())
    }

    fn read_payload(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let len = usize::try_from(end - start).map_err(|_| LmcError::UnexpectedEof)?;
        self.source.lock().read(PAYLOAD_ORIGIN + start, len)
    }

    fn decode_range(&self, start: u64, end: u64) -> Result<Value> {
        self.codec.decode(&self.read_payload(start, end)?)
    }
}

/// Options accepted by [`LazyReader`] constructors
pub struct ReaderOptions {
    /// Keep per-cursor caches of resolved values
    pub cached: bool,
    /// Codec back-end for this session
    pub codec: Arc<dyn Codec>,
    /// Configuration snapshot for this session
    pub config: Config,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cached: true,
            codec: Arc::new(MsgpackCodec),
            config: Config::global(),
        }
    }
}

/// A value resolved by the lazy reader: either fully decoded, or a
/// cursor over a container that is still on storage
#[derive(Clone)]
pub enum LazyValue {
    /// Fully decoded value
    Plain(Value),
    /// Cursor over a keyed container
    Map(LazyMap),
    /// Cursor over a positional or grouped container
    Seq(LazySeq),
}

impl LazyValue {
    /// Materialise the full plain tree
    pub fn to_plain(&self) -> Result<Value> {
        match self {
            LazyValue::Plain(value) => Ok(value.clone()),
            LazyValue::Map(map) => map.to_plain(),
            LazyValue::Seq(seq) => seq.to_plain(),
        }
    }

    /// The plain value, if already decoded
    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            LazyValue::Plain(value) => Some(value),
            _ => None,
        }
    }

    /// The map cursor, if this is one
    pub fn as_map(&self) -> Option<&LazyMap> {
        match self {
            LazyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The sequence cursor, if this is one
    pub fn as_seq(&self) -> Option<&LazySeq> {
        match self {
            LazyValue::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Resolve one path segment against this value
    pub fn descend(&self, seg: &PathSeg) -> Result<LazyValue> {
        match self {
            LazyValue::Map(map) => match seg {
                PathSeg::Key(key) => map.get(key),
                PathSeg::Index(index) => map.get(&index.to_string()),
                PathSeg::Slice(_) => {
                    Err(LmcError::TypeMismatch("cannot slice a map".into()))
                }
            },
            LazyValue::Seq(seq) => match sequence_seg(seg)? {
                PathSeg::Index(index) => seq.get(index),
                PathSeg::Slice(spec) => {
                    let mut items = Vec::new();
                    for item in seq.slice(&spec)? {
                        items.push(item?.to_plain()?);
                    }
                    Ok(LazyValue::Plain(Value::Array(items)))
                }
                PathSeg::Key(key) => Err(LmcError::TypeMismatch(format!(
                    "segment {key:?} does not index a sequence"
                ))),
            },
            LazyValue::Plain(value) => descend_plain(value, seg),
        }
    }

    /// Compare against a plain value, materialising lazily as needed
    pub fn eq_value(&self, other: &Value) -> Result<bool> {
        match self {
            LazyValue::Plain(value) => Ok(plain_eq(value, other)),
            LazyValue::Map(map) => map.eq_value(other),
            LazyValue::Seq(seq) => seq.eq_value(other),
        }
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyValue::Plain(value) => write!(f, "{value:?}"),
            LazyValue::Map(map) => map.fmt(f),
            LazyValue::Seq(seq) => seq.fmt(f),
        }
    }
}

impl PartialEq<Value> for LazyValue {
    fn eq(&self, other: &Value) -> bool {
        self.eq_value(other).unwrap_or(false)
    }
}

impl PartialEq<LazyValue> for Value {
    fn eq(&self, other: &LazyValue) -> bool {
        other.eq_value(self).unwrap_or(false)
    }
}

/// Convert a raw string segment into an index or slice for sequence
/// resolution
fn sequence_seg(seg: &PathSeg) -> Result<PathSeg> {
    match seg {
        PathSeg::Key(token) => as_sequence_token(token).ok_or_else(|| {
            LmcError::TypeMismatch(format!("segment {token:?} does not index a sequence"))
        }),
        PathSeg::Index(index) => Ok(PathSeg::Index(*index)),
        PathSeg::Slice(spec) => Ok(PathSeg::Slice(*spec)),
    }
}

/// Structural equality with order-insensitive maps
fn plain_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Map(left), Value::Map(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .iter()
                        .find(|(other_key, _)| other_key == key)
                        .is_some_and(|(_, other)| plain_eq(value, other))
                })
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(value, other)| plain_eq(value, other))
        }
        _ => a == b,
    }
}

fn descend_plain(value: &Value, seg: &PathSeg) -> Result<LazyValue> {
    match value {
        Value::Map(entries) => {
            let key = match seg {
                PathSeg::Key(key) => key.clone(),
                PathSeg::Index(index) => index.to_string(),
                PathSeg::Slice(_) => {
                    return Err(LmcError::TypeMismatch("cannot slice a map".into()))
                }
            };
            entries
                .iter()
                .find(|(entry_key, _)| entry_key.as_str() == Some(key.as_str()))
                .map(|(_, entry)| LazyValue::Plain(entry.clone()))
                .ok_or(LmcError::KeyNotFound(key))
        }
        Value::Array(items) => match sequence_seg(seg)? {
            PathSeg::Index(index) => items
                .get(index)
                .cloned()
                .map(LazyValue::Plain)
                .ok_or(LmcError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                }),
            PathSeg::Slice(spec) => {
                let (start, stop, step) = spec.resolve(items.len())?;
                let sliced: Vec<Value> = (start..stop)
                    .step_by(step)
                    .filter_map(|i| items.get(i).cloned())
                    .collect();
                Ok(LazyValue::Plain(Value::Array(sliced)))
            }
            PathSeg::Key(key) => Err(LmcError::TypeMismatch(format!(
                "segment {key:?} does not index a sequence"
            ))),
        },
        _ => Err(LmcError::TypeMismatch(
            "cannot descend into a primitive".into(),
        )),
    }
}

/// Materialise a TOC node: cursors for expanded containers, plain values
/// for everything stored opaquely
fn materialise(shared: &Arc<ReaderShared>, node: &Arc<TocNode>) -> Result<LazyValue> {
    match &node.children {
        None => Ok(LazyValue::Plain(
            shared.decode_range(node.start, node.end)?,
        )),
        Some(TocChildren::Keyed(_)) => Ok(LazyValue::Map(LazyMap {
            inner: Arc::new(CursorInner::new(Arc::clone(shared), Arc::clone(node))),
        })),
        Some(TocChildren::Positional(_)) | Some(TocChildren::Grouped(_)) => {
            Ok(LazyValue::Seq(LazySeq {
                inner: Arc::new(CursorInner::new(Arc::clone(shared), Arc::clone(node))),
            }))
        }
    }
}

/// Cursor state shared between clones
struct CursorInner<K> {
    shared: Arc<ReaderShared>,
    node: Arc<TocNode>,
    cache: Mutex<HashMap<K, LazyValue>>,
    accessed: AtomicUsize,
    prefix: OnceCell<Vec<u64>>,
    plain: OnceCell<Value>,
}

impl<K> CursorInner<K> {
    fn new(shared: Arc<ReaderShared>, node: Arc<TocNode>) -> Self {
        Self {
            shared,
            node,
            cache: Mutex::new(HashMap::new()),
            accessed: AtomicUsize::new(0),
            prefix: OnceCell::new(),
            plain: OnceCell::new(),
        }
    }

    fn fast_load(&self, len: usize) -> bool {
        let accessed = self.accessed.load(Ordering::Relaxed) as f64;
        self.shared.config.fast_load
            && accessed < self.shared.config.fast_load_threshold * len as f64
    }
}

/// Read-only cursor over a keyed container
#[derive(Clone)]
pub struct LazyMap {
    inner: Arc<CursorInner<String>>,
}

impl LazyMap {
    fn keyed(&self) -> Option<&KeyedToc> {
        match &self.inner.node.children {
            Some(TocChildren::Keyed(keyed)) => Some(keyed),
            _ => None,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.keyed().map_or(0, KeyedToc::len)
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.keyed().is_some_and(|keyed| keyed.contains_key(key))
    }

    /// Keys in stored order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.keyed().into_iter().flat_map(KeyedToc::keys)
    }

    /// Resolve the value under `key`
    pub fn get(&self, key: &str) -> Result<LazyValue> {
        self.inner.shared.ensure_open()?;
        if self.inner.shared.cached {
            if let Some(hit) = self.inner.cache.lock().get(key) {
                return Ok(hit.clone());
            }
        }

        let keyed = self
            .keyed()
            .ok_or_else(|| LmcError::Internal("map cursor over non-keyed node".into()))?;
        let node = keyed
            .get(key)
            .ok_or_else(|| LmcError::KeyNotFound(key.to_string()))?;
        self.inner.accessed.fetch_add(1, Ordering::Relaxed);
        let value = materialise(&self.inner.shared, node)?;
        if self.inner.shared.cached {
            self.inner
                .cache
                .lock()
                .insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    /// `(key, value)` pairs in stored order, resolving lazily
    pub fn iter(&self) -> impl Iterator<Item = (&str, Result<LazyValue>)> + '_ {
        self.keys().map(move |key| (key, self.get(key)))
    }

    /// Values in stored order, resolving lazily
    pub fn values(&self) -> impl Iterator<Item = Result<LazyValue>> + '_ {
        self.keys().map(move |key| self.get(key))
    }

    /// Materialise the whole map as a plain value
    pub fn to_plain(&self) -> Result<Value> {
        self.inner
            .plain
            .get_or_try_init(|| {
                self.inner.shared.ensure_open()?;
                if self.fast_loadable() {
                    let value = self
                        .inner
                        .shared
                        .decode_range(self.inner.node.start, self.inner.node.end)?;
                    if !value.is_map() {
                        return Err(LmcError::Decode("map payload is not a map".into()));
                    }
                    return Ok(value);
                }
                let keyed = self
                    .keyed()
                    .ok_or_else(|| LmcError::Internal("map cursor over non-keyed node".into()))?;
                let mut entries = Vec::with_capacity(keyed.len());
                for key in keyed.keys() {
                    entries.push((Value::from(key), self.get(key)?.to_plain()?));
                }
                Ok(Value::Map(entries))
            })
            .cloned()
    }

    fn fast_loadable(&self) -> bool {
        self.inner.fast_load(self.len())
    }

    /// Compare against a plain value
    pub fn eq_value(&self, other: &Value) -> Result<bool> {
        let Some(entries) = other.as_map() else {
            return Ok(false);
        };
        if entries.len() != self.len() {
            return Ok(false);
        }
        for (key, expected) in entries {
            let Some(key) = key.as_str() else {
                return Ok(false);
            };
            if !self.contains_key(key) {
                return Ok(false);
            }
            if !self.get(key)?.eq_value(expected)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for LazyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LazyMap[{}]", self.len())
    }
}

impl PartialEq<Value> for LazyMap {
    fn eq(&self, other: &Value) -> bool {
        self.eq_value(other).unwrap_or(false)
    }
}

impl PartialEq<LazyMap> for Value {
    fn eq(&self, other: &LazyMap) -> bool {
        other.eq_value(self).unwrap_or(false)
    }
}

/// Read-only cursor over a positional or grouped container
#[derive(Clone)]
pub struct LazySeq {
    inner: Arc<CursorInner<usize>>,
}

impl LazySeq {
    fn children(&self) -> Option<&TocChildren> {
        self.inner.node.children.as_ref()
    }

    /// Cumulative element counts of grouped blocks, memoised per cursor
    fn prefix(&self) -> &[u64] {
        self.inner.prefix.get_or_init(|| match self.children() {
            Some(TocChildren::Grouped(blocks)) => blocks
                .iter()
                .scan(0u64, |total, block| {
                    *total += block.count;
                    Some(*total)
                })
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self.children() {
            Some(TocChildren::Positional(nodes)) => nodes.len(),
            Some(TocChildren::Grouped(_)) => {
                self.prefix().last().copied().unwrap_or(0) as usize
            }
            _ => 0,
        }
    }

    /// Whether the sequence has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the element at `index`
    pub fn get(&self, index: usize) -> Result<LazyValue> {
        self.inner.shared.ensure_open()?;
        if self.inner.shared.cached {
            if let Some(hit) = self.inner.cache.lock().get(&index) {
                return Ok(hit.clone());
            }
        }

        match self.children() {
            Some(TocChildren::Positional(nodes)) => {
                let node = nodes.get(index).ok_or(LmcError::IndexOutOfBounds {
                    index,
                    len: nodes.len(),
                })?;
                self.inner.accessed.fetch_add(1, Ordering::Relaxed);
                let value = materialise(&self.inner.shared, node)?;
                if self.inner.shared.cached {
                    self.inner.cache.lock().insert(index, value.clone());
                }
                Ok(value)
            }
            Some(TocChildren::Grouped(blocks)) => {
                let len = self.len();
                if index >= len {
                    return Err(LmcError::IndexOutOfBounds { index, len });
                }
                let prefix = self.prefix();
                let block_idx = prefix.partition_point(|&total| total <= index as u64);
                let block = blocks
                    .get(block_idx)
                    .ok_or_else(|| LmcError::Internal("grouped prefix out of sync".into()))?;
                let first_index = if block_idx == 0 {
                    0
                } else {
                    prefix[block_idx - 1] as usize
                };

                self.inner.accessed.fetch_add(1, Ordering::Relaxed);
                let bytes = self.inner.shared.read_payload(block.start, block.end)?;
                let values =
                    decode_run(self.inner.shared.codec.as_ref(), &bytes, block.count)?;
                let target = values
                    .get(index - first_index)
                    .cloned()
                    .map(LazyValue::Plain)
                    .ok_or_else(|| LmcError::Internal("grouped block count out of sync".into()))?;
                if self.inner.shared.cached {
                    let mut cache = self.inner.cache.lock();
                    for (i, value) in values.into_iter().enumerate() {
                        cache.insert(first_index + i, LazyValue::Plain(value));
                    }
                }
                Ok(target)
            }
            _ => Err(LmcError::Internal("sequence cursor over leaf node".into())),
        }
    }

    /// Lazily-iterated view over `[start, stop)` with the given step
    pub fn slice(&self, spec: &SliceSpec) -> Result<SeqSlice> {
        let (start, stop, step) = spec.resolve(self.len())?;
        Ok(SeqSlice {
            seq: self.clone(),
            next: start,
            stop,
            step,
        })
    }

    /// Iterate all elements in order
    pub fn iter(&self) -> SeqSlice {
        SeqSlice {
            seq: self.clone(),
            next: 0,
            stop: self.len(),
            step: 1,
        }
    }

    /// Materialise the whole sequence as a plain value
    pub fn to_plain(&self) -> Result<Value> {
        self.inner
            .plain
            .get_or_try_init(|| {
                self.inner.shared.ensure_open()?;
                if self.inner.fast_load(self.len()) {
                    let value = self
                        .inner
                        .shared
                        .decode_range(self.inner.node.start, self.inner.node.end)?;
                    if !value.is_array() {
                        return Err(LmcError::Decode("sequence payload is not an array".into()));
                    }
                    return Ok(value);
                }
                let mut items = Vec::with_capacity(self.len());
                for item in self.iter() {
                    items.push(item?.to_plain()?);
                }
                Ok(Value::Array(items))
            })
            .cloned()
    }

    /// Compare against a plain value
    pub fn eq_value(&self, other: &Value) -> Result<bool> {
        let Some(items) = other.as_array() else {
            return Ok(false);
        };
        if items.len() != self.len() {
            return Ok(false);
        }
        for (index, expected) in items.iter().enumerate() {
            if !self.get(index)?.eq_value(expected)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for LazySeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LazySeq[{}]", self.len())
    }
}

impl PartialEq<Value> for LazySeq {
    fn eq(&self, other: &Value) -> bool {
        self.eq_value(other).unwrap_or(false)
    }
}

impl PartialEq<LazySeq> for Value {
    fn eq(&self, other: &LazySeq) -> bool {
        other.eq_value(self).unwrap_or(false)
    }
}

/// Lazily-iterated view of a [`LazySeq`] range
pub struct SeqSlice {
    seq: LazySeq,
    next: usize,
    stop: usize,
    step: usize,
}

impl Iterator for SeqSlice {
    type Item = Result<LazyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.stop {
            return None;
        }
        let index = self.next;
        self.next += self.step;
        Some(self.seq.get(index))
    }
}

/// Decode `count` consecutive values from one grouped block
fn decode_run(codec: &dyn Codec, bytes: &[u8], count: u64) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(count as usize);
    let mut offset = 0usize;
    while offset < bytes.len() {
        let (value, used) = codec.decode_skipping(&bytes[offset..])?;
        values.push(value);
        offset += used;
    }
    if values.len() as u64 != count {
        return Err(LmcError::Decode(format!(
            "grouped block decoded {} elements, expected {count}",
            values.len()
        )));
    }
    Ok(values)
}

/// Lazy reader session over one packed blob.
///
/// Cursors handed out by [`read`](LazyReader::read) share this session's
/// byte cache and TOC; they are invalidated when the session is closed
/// or dropped. Cross-thread use is possible behind an external lock:
/// resolution calls are internally serialised, but no fairness or
/// lock-free progress is guaranteed.
pub struct LazyReader {
    shared: Arc<ReaderShared>,
    toc: Arc<TocNode>,
    payload_len: u64,
    root: OnceCell<LazyValue>,
}

impl LazyReader {
    /// Open a blob file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(File::open(path)?, ReaderOptions::default())
    }

    /// Open a blob file with explicit options
    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        Self::from_source(File::open(path)?, options)
    }

    /// Open an in-memory blob with default options
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_source(Cursor::new(bytes), ReaderOptions::default())
    }

    /// Open any seekable source with explicit options
    pub fn from_source<R: Read + Seek + Send + 'static>(
        reader: R,
        options: ReaderOptions,
    ) -> Result<Self> {
        let boxed: Box<dyn BlobRead> = Box::new(reader);
        let mut source = CachedSource::new(boxed, options.config.read_buffer)?;
        let (toc, payload_len) = load_toc(&mut source, options.codec.as_ref())?;
        debug!(payload_len, "opened blob");

        Ok(Self {
            shared: Arc::new(ReaderShared {
                source: Mutex::new(source),
                codec: options.codec,
                config: options.config,
                cached: options.cached,
                closed: AtomicBool::new(false),
            }),
            toc,
            payload_len,
            root: OnceCell::new(),
        })
    }

    /// The root value: a cursor for expanded containers, a plain value
    /// otherwise
    pub fn read(&self) -> Result<LazyValue> {
        self.shared.ensure_open()?;
        self.root
            .get_or_try_init(|| materialise(&self.shared, &self.toc))
            .cloned()
    }

    /// Resolve a `/`-separated path from the root
    pub fn read_path(&self, path: &str) -> Result<LazyValue> {
        self.read_segments(parse_path(path))
    }

    /// Resolve explicit path segments from the root
    pub fn read_segments<I>(&self, segments: I) -> Result<LazyValue>
    where
        I: IntoIterator,
        I::Item: Into<PathSeg>,
    {
        let mut current = self.read()?;
        for segment in segments {
            current = current.descend(&segment.into())?;
        }
        Ok(current)
    }

    /// Materialise the whole blob as a plain tree
    pub fn to_plain(&self) -> Result<Value> {
        self.read()?.to_plain()
    }

    /// The decoded table of contents
    pub fn toc(&self) -> &TocNode {
        &self.toc
    }

    /// Payload length in bytes
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// Snapshot of the source traffic counters
    pub fn stats(&self) -> SourceStats {
        self.shared.source.lock().stats()
    }

    /// Close the session; outstanding cursors fail from now on
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// Whether the session has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for LazyReader {
    fn drop(&mut self) {
        self.close();
    }
}
