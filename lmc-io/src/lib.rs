//! lmc I/O - packer, lazy reader, and combiner
//!
//! This crate provides the engines of the lmc container format:
//!
//! - [`Packer`] streams a value tree into a blob while recording its
//!   table of contents
//! - [`LazyReader`] opens a blob and resolves paths by demand-loading
//!   exactly the byte ranges they touch
//! - [`combine`] splices already-packed blobs into one archive without
//!   re-encoding a single payload byte
//!
//! Sessions are scoped resources: dropping a reader invalidates its
//! cursors, dropping an unfinished packer leaves an incomplete file.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod combiner;
pub mod path;
pub mod reader;
pub mod source;
pub mod writer;

// Re-export commonly used types
pub use lmc_codec::{Codec, MsgpackCodec};
pub use lmc_format::{configure, Config, LmcError, Result};

pub use combiner::{combine, combine_with_config, FileRef};
pub use path::{PathSeg, SliceSpec};
pub use reader::{LazyMap, LazyReader, LazySeq, LazyValue, ReaderOptions, SeqSlice};
pub use source::{CachedSource, SourceStats};
pub use writer::Packer;

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use rmpv::Value;

/// Pack `value` into `sink`, returning the sink
pub fn pack<W: Write + Seek>(value: &Value, sink: W) -> Result<W> {
    let mut packer = Packer::new(sink)?;
    packer.write(value)?;
    packer.finish()
}

/// Pack `value` into a fresh in-memory blob
pub fn pack_to_vec(value: &Value) -> Result<Vec<u8>> {
    Ok(pack(value, Cursor::new(Vec::new()))?.into_inner())
}

/// Pack `value` into the file at `path`
pub fn pack_to_path<P: AsRef<Path>>(value: &Value, path: P) -> Result<()> {
    pack(value, File::create(path)?)?;
    Ok(())
}

/// Open the blob at `path` for lazy reading with default options
pub fn open<P: AsRef<Path>>(path: P) -> Result<LazyReader> {
    LazyReader::open(path)
}

/// Materialise any lazy value into a plain tree
pub fn to_plain(value: &LazyValue) -> Result<Value> {
    value.to_plain()
}
