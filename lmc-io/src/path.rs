//! Path segments and `/`-separated path parsing
//!
//! A path addresses a sub-value: string segments key into maps, decimal
//! segments index sequences, and `start:stop` / `start:step:stop` forms
//! slice sequences. The string form has no escape syntax, so keys
//! containing `/` are only addressable through explicit segments.
//! Negative indices are not supported.

use lmc_format::{LmcError, Result};

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    /// Map key, or an unclassified string token from the path form
    Key(String),
    /// Sequence index
    Index(usize),
    /// Sequence slice
    Slice(SliceSpec),
}

/// Bounds of a sequence slice; omitted fields default to the start of
/// the sequence, a step of one, and the end of the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    /// First index included
    pub start: Option<usize>,
    /// Gap between consecutive indices
    pub step: Option<usize>,
    /// First index excluded
    pub stop: Option<usize>,
}

impl SliceSpec {
    /// Resolve the spec against a sequence of length `len`, clamping the
    /// bounds
    pub fn resolve(&self, len: usize) -> Result<(usize, usize, usize)> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(LmcError::TypeMismatch("slice step cannot be zero".into()));
        }
        let start = self.start.unwrap_or(0).min(len);
        let stop = self.stop.unwrap_or(len).min(len);
        Ok((start, stop, step))
    }
}

impl From<&str> for PathSeg {
    fn from(key: &str) -> Self {
        PathSeg::Key(key.to_string())
    }
}

impl From<String> for PathSeg {
    fn from(key: String) -> Self {
        PathSeg::Key(key)
    }
}

impl From<usize> for PathSeg {
    fn from(index: usize) -> Self {
        PathSeg::Index(index)
    }
}

/// Split a `/`-separated path into raw segments. The empty path
/// addresses the root.
pub fn parse_path(path: &str) -> Vec<PathSeg> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/').map(PathSeg::from).collect()
}

/// Interpret a string token as a sequence index or slice, if it reads as
/// one
pub fn as_sequence_token(token: &str) -> Option<PathSeg> {
    if let Ok(index) = token.parse::<usize>() {
        return Some(PathSeg::Index(index));
    }
    parse_slice(token).map(PathSeg::Slice)
}

fn parse_slice(token: &str) -> Option<SliceSpec> {
    if !token.contains(':') {
        return None;
    }
    let parts: Vec<&str> = token.split(':').collect();

    let bound = |part: &str| -> Option<Option<usize>> {
        if part.is_empty() {
            Some(None)
        } else {
            part.parse::<usize>().ok().map(Some)
        }
    };

    match parts.as_slice() {
        [start, stop] => Some(SliceSpec {
            start: bound(start)?,
            step: None,
            stop: bound(stop)?,
        }),
        [start, step, stop] => Some(SliceSpec {
            start: bound(start)?,
            step: bound(step)?,
            stop: bound(stop)?,
        }),
        _ => None,
    }
}
