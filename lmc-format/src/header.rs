//! Fixed-width file header

use crate::constants::{HEADER_LEN, PAYLOAD_ORIGIN};
use crate::error::{LmcError, Result};

/// Fixed 20-byte header recording where the encoded TOC lives.
///
/// Wire form: `toc_start` as a big-endian u64, `toc_len` as a big-endian
/// u64, then four reserved zero bytes. Both offsets are absolute to the
/// start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Absolute byte offset of the encoded TOC
    pub toc_start: u64,
    /// Length of the encoded TOC in bytes
    pub toc_len: u64,
}

impl FileHeader {
    /// Encode the header to its fixed wire form
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..8].copy_from_slice(&self.toc_start.to_be_bytes());
        out[8..16].copy_from_slice(&self.toc_len.to_be_bytes());
        out
    }

    /// Decode a header from its fixed wire form; the reserved bytes must
    /// be zero
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_LEN {
            return Err(LmcError::CorruptHeader);
        }
        if bytes[16..].iter().any(|&b| b != 0) {
            return Err(LmcError::CorruptHeader);
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let toc_start = u64::from_be_bytes(word);
        word.copy_from_slice(&bytes[8..16]);
        let toc_len = u64::from_be_bytes(word);

        Ok(Self { toc_start, toc_len })
    }

    /// Check the recorded TOC range against the actual file length
    pub fn validate(&self, file_len: u64) -> Result<()> {
        if self.toc_start < PAYLOAD_ORIGIN || self.toc_len == 0 {
            return Err(LmcError::CorruptHeader);
        }
        let toc_end = self
            .toc_start
            .checked_add(self.toc_len)
            .ok_or(LmcError::CorruptHeader)?;
        if toc_end > file_len {
            return Err(LmcError::CorruptHeader);
        }
        Ok(())
    }

    /// Payload length implied by the TOC position
    pub fn payload_len(&self) -> u64 {
        self.toc_start.saturating_sub(PAYLOAD_ORIGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = FileHeader {
            toc_start: 12_345,
            toc_len: 678,
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(FileHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn header_rejects_wrong_length() {
        assert!(matches!(
            FileHeader::decode(&[0u8; 19]),
            Err(LmcError::CorruptHeader)
        ));
    }

    #[test]
    fn header_rejects_nonzero_reserved() {
        let mut bytes = FileHeader {
            toc_start: 28,
            toc_len: 1,
        }
        .encode();
        bytes[19] = 1;
        assert!(matches!(
            FileHeader::decode(&bytes),
            Err(LmcError::CorruptHeader)
        ));
    }

    #[test]
    fn validate_checks_bounds() {
        let header = FileHeader {
            toc_start: 100,
            toc_len: 50,
        };
        assert!(header.validate(150).is_ok());
        assert!(header.validate(149).is_err());

        let before_payload = FileHeader {
            toc_start: 10,
            toc_len: 5,
        };
        assert!(before_payload.validate(1_000).is_err());
    }
}
