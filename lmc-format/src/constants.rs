//! Constants and magic numbers for the lmc container format

/// File magic bytes: 0x89 "lmc" + version 0x01 + CR LF SUB tripwire
pub const MAGIC: [u8; 8] = [0x89, 0x6C, 0x6D, 0x63, 0x01, 0x0D, 0x0A, 0x1A];

/// Fixed header length in bytes, immediately after the magic
pub const HEADER_LEN: usize = 20;

/// File offset where the payload region begins; TOC positions are
/// relative to this origin
pub const PAYLOAD_ORIGIN: u64 = MAGIC.len() as u64 + HEADER_LEN as u64;

/// TOC wire key holding the `[start, end]` position pair
pub const KEY_POS: &str = "p";

/// TOC wire key holding the child table
pub const KEY_TABLE: &str = "t";

/// The read cache retains up to `read_buffer * CACHE_RETENTION_FACTOR`
/// bytes before evicting whole ranges in insertion order
pub const CACHE_RETENTION_FACTOR: usize = 4;
