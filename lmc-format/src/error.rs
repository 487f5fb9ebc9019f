//! Error types for the lmc container format

use thiserror::Error;

/// lmc error types
#[derive(Debug, Error)]
pub enum LmcError {
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("corrupt header")]
    CorruptHeader,
    #[error("corrupt table of contents: {0}")]
    CorruptToc(String),
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("streamed map declared {declared} entries but yielded {actual}")]
    EncodeCountMismatch { declared: usize, actual: usize },
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("index {index} out of bounds for sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("combine inputs mix named and unnamed entries")]
    CombineNameMix,
    #[error("session closed")]
    SessionClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LmcError>;
