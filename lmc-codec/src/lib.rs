//! lmc codec - MessagePack value encoding and decoding
//!
//! The container core never touches MessagePack markers directly; it goes
//! through the [`Codec`] capability trait so alternate back-ends can plug
//! in per session. Every back-end must preserve byte-for-byte round-trip
//! of the supported value set, including opaque `ext` values.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::io::{Cursor, Write};

use lmc_format::{LmcError, Result};
use rmpv::Value;

/// Encode/decode capability used by the packer, reader, and combiner.
pub trait Codec: Send + Sync {
    /// Stream-encode `value` into `sink`
    fn encode(&self, value: &Value, sink: &mut dyn Write) -> Result<()>;

    /// Decode a value occupying the whole of `bytes`; trailing bytes are
    /// an error
    fn decode(&self, bytes: &[u8]) -> Result<Value>;

    /// Decode the first value in `bytes`, returning it together with the
    /// number of bytes consumed. Used for boundary discovery inside
    /// grouped blocks.
    fn decode_skipping(&self, bytes: &[u8]) -> Result<(Value, usize)>;
}

/// Default codec backed by `rmpv`
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl Codec for MsgpackCodec {
    fn encode(&self, value: &Value, mut sink: &mut dyn Write) -> Result<()> {
        rmpv::encode::write_value(&mut sink, value)
            .map_err(|e| LmcError::Io(std::io::Error::other(e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let (value, consumed) = self.decode_skipping(bytes)?;
        if consumed != bytes.len() {
            return Err(LmcError::Decode(format!(
                "{} trailing bytes after value",
                bytes.len() - consumed
            )));
        }
        Ok(value)
    }

    fn decode_skipping(&self, bytes: &[u8]) -> Result<(Value, usize)> {
        let mut cursor = Cursor::new(bytes);
        let value =
            rmpv::decode::read_value(&mut cursor).map_err(|e| LmcError::Decode(e.to_string()))?;
        Ok((value, cursor.position() as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value) {
        let codec = MsgpackCodec;
        let mut bytes = Vec::new();
        codec.encode(&value, &mut bytes).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn scalar_roundtrip() {
        roundtrip(Value::Nil);
        roundtrip(Value::Boolean(true));
        roundtrip(Value::from(-42i64));
        roundtrip(Value::from(u64::MAX));
        roundtrip(Value::F64(1.5));
        roundtrip(Value::from("hello"));
        roundtrip(Value::Binary(vec![0, 1, 2, 255]));
    }

    #[test]
    fn container_roundtrip() {
        roundtrip(Value::Array(vec![
            Value::from(1),
            Value::from("two"),
            Value::Array(vec![Value::Nil]),
        ]));
        roundtrip(Value::Map(vec![(
            Value::from("key"),
            Value::Map(vec![(Value::from("nested"), Value::from(3))]),
        )]));
    }

    #[test]
    fn ext_passes_through_opaquely() {
        roundtrip(Value::Ext(7, vec![1, 2, 3, 4]));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let codec = MsgpackCodec;
        let mut bytes = Vec::new();
        codec.encode(&Value::from(1), &mut bytes).unwrap();
        bytes.push(0xC0);
        assert!(matches!(codec.decode(&bytes), Err(LmcError::Decode(_))));
    }

    #[test]
    fn skipping_decode_reports_consumed_length() {
        let codec = MsgpackCodec;
        let mut bytes = Vec::new();
        codec.encode(&Value::from("ab"), &mut bytes).unwrap();
        let first_len = bytes.len();
        codec.encode(&Value::from(300), &mut bytes).unwrap();

        let (first, consumed) = codec.decode_skipping(&bytes).unwrap();
        assert_eq!(first, Value::from("ab"));
        assert_eq!(consumed, first_len);

        let (second, rest) = codec.decode_skipping(&bytes[consumed..]).unwrap();
        assert_eq!(second, Value::from(300));
        assert_eq!(consumed + rest, bytes.len());
    }

    #[test]
    fn truncated_input_fails() {
        let codec = MsgpackCodec;
        let mut bytes = Vec::new();
        codec.encode(&Value::from("truncate me"), &mut bytes).unwrap();
        bytes.pop();
        assert!(codec.decode(&bytes).is_err());
    }
}
