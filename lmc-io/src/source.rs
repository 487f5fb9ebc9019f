//! Buffered random-access source with a bounded range cache

use std::collections::VecDeque;
use std::io::{Read, Seek, SeekFrom, Write};

use lmc_format::constants::CACHE_RETENTION_FACTOR;
use lmc_format::{LmcError, Result};

/// Counters describing read traffic through a [`CachedSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Logical `read` calls, cache hits included
    pub calls: u64,
    /// Reads that reached the underlying storage
    pub physical_reads: u64,
    /// Bytes fetched from the underlying storage
    pub physical_bytes: u64,
}

impl SourceStats {
    /// Traffic since an earlier snapshot
    pub fn since(&self, earlier: &SourceStats) -> SourceStats {
        SourceStats {
            calls: self.calls - earlier.calls,
            physical_reads: self.physical_reads - earlier.physical_reads,
            physical_bytes: self.physical_bytes - earlier.physical_bytes,
        }
    }
}

/// Seekable reader with a small insertion-ordered cache of recently
/// fetched ranges.
///
/// A read fully contained in a cached range is served from memory; any
/// other read fetches at least `read_buffer` bytes. The cache is purely
/// an optimisation: every call returns the exact on-disk bytes.
pub struct CachedSource<R> {
    inner: R,
    len: u64,
    read_buffer: usize,
    ranges: VecDeque<(u64, Vec<u8>)>,
    cached_bytes: usize,
    stats: SourceStats,
}

impl<R: Read + Seek> CachedSource<R> {
    /// Wrap `inner`, probing its total length once
    pub fn new(mut inner: R, read_buffer: usize) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self {
            inner,
            len,
            read_buffer: read_buffer.max(1),
            ranges: VecDeque::new(),
            cached_bytes: 0,
            stats: SourceStats::default(),
        })
    }

    /// Total length of the underlying storage in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the underlying storage is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Snapshot of the traffic counters
    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    /// Read exactly `len` bytes starting at `offset`
    pub fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.stats.calls += 1;
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = offset
            .checked_add(len as u64)
            .ok_or(LmcError::UnexpectedEof)?;
        if end > self.len {
            return Err(LmcError::UnexpectedEof);
        }

        if let Some(bytes) = self.lookup(offset, len) {
            return Ok(bytes);
        }

        let available = (self.len - offset) as usize;
        let fetch_len = len.max(self.read_buffer).min(available);
        let chunk = self.fetch(offset, fetch_len)?;
        let out = chunk[..len].to_vec();
        self.retain(offset, chunk);
        Ok(out)
    }

    /// Stream `len` bytes starting at `offset` into `out` in chunks of at
    /// most `chunk_size`, bypassing the range cache
    pub fn copy_range_to(
        &mut self,
        offset: u64,
        len: u64,
        out: &mut dyn Write,
        chunk_size: usize,
    ) -> Result<()> {
        self.stats.calls += 1;
        let end = offset.checked_add(len).ok_or(LmcError::UnexpectedEof)?;
        if end > self.len {
            return Err(LmcError::UnexpectedEof);
        }

        let chunk_size = chunk_size.max(1);
        let mut cursor = offset;
        while cursor < end {
            let step = ((end - cursor) as usize).min(chunk_size);
            let chunk = self.fetch(cursor, step)?;
            out.write_all(&chunk)?;
            cursor += step as u64;
        }
        Ok(())
    }

    fn lookup(&self, offset: u64, len: usize) -> Option<Vec<u8>> {
        for (start, bytes) in &self.ranges {
            if offset >= *start && offset + len as u64 <= *start + bytes.len() as u64 {
                let lo = (offset - start) as usize;
                return Some(bytes[lo..lo + len].to_vec());
            }
        }
        None
    }

    fn fetch(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        self.stats.physical_reads += 1;
        self.stats.physical_bytes += len as u64;
        Ok(buf)
    }

    fn retain(&mut self, offset: u64, bytes: Vec<u8>) {
        self.cached_bytes += bytes.len();
        self.ranges.push_back((offset, bytes));
        let limit = self.read_buffer.saturating_mul(CACHE_RETENTION_FACTOR);
        while self.cached_bytes > limit {
            match self.ranges.pop_front() {
                Some((_, evicted)) => self.cached_bytes -= evicted.len(),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source_over(data: Vec<u8>, read_buffer: usize) -> CachedSource<Cursor<Vec<u8>>> {
        CachedSource::new(Cursor::new(data), read_buffer).unwrap()
    }

    #[test]
    fn reads_exact_bytes() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = source_over(data.clone(), 16);
        assert_eq!(source.read(0, 4).unwrap(), &data[..4]);
        assert_eq!(source.read(250, 6).unwrap(), &data[250..]);
        assert_eq!(source.read(100, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn cached_range_serves_contained_reads() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = source_over(data.clone(), 64);

        assert_eq!(source.read(10, 4).unwrap(), &data[10..14]);
        let after_first = source.stats();
        assert_eq!(after_first.physical_reads, 1);
        assert_eq!(after_first.physical_bytes, 64);

        // Fully contained in the 64-byte range fetched above.
        assert_eq!(source.read(40, 30).unwrap(), &data[40..70]);
        let after_second = source.stats();
        assert_eq!(after_second.physical_reads, 1);
        assert_eq!(after_second.calls, 2);
    }

    #[test]
    fn eviction_keeps_reads_correct() {
        let data: Vec<u8> = (0u32..4096).map(|i| (i % 251) as u8).collect();
        let mut source = source_over(data.clone(), 8);

        // Far-apart reads force constant eviction with an 8-byte buffer.
        for round in 0..8 {
            for &offset in &[0u64, 1024, 2048, 3072] {
                let shifted = offset + round;
                let expected = &data[shifted as usize..shifted as usize + 8];
                assert_eq!(source.read(shifted, 8).unwrap(), expected);
            }
        }
    }

    #[test]
    fn out_of_bounds_read_fails() {
        let mut source = source_over(vec![0u8; 16], 8);
        assert!(matches!(
            source.read(10, 7),
            Err(LmcError::UnexpectedEof)
        ));
        assert!(matches!(
            source.read(u64::MAX, 2),
            Err(LmcError::UnexpectedEof)
        ));
    }

    #[test]
    fn copy_range_streams_in_chunks() {
        let data: Vec<u8> = (0..=255).collect();
        let mut source = source_over(data.clone(), 4);
        let mut out = Vec::new();
        source.copy_range_to(3, 200, &mut out, 7).unwrap();
        assert_eq!(out, &data[3..203]);
    }
}
