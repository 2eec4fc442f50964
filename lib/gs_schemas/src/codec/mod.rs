//! The bespoke big-endian byte-stream codec used for both the network wire protocol and chunk
//! save files. Every primitive is a fixed-width, big-endian encode/decode pair; there is no
//! self-describing framing beyond what each event/record type adds explicitly.

use std::io::{self, Read, Write};

use thiserror::Error;

pub mod compressed;
pub mod header;

/// Errors produced while decoding a byte stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying reader/writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A bounded integer read came back outside of its declared bounds.
    #[error("Value {value} out of bounds [{min}, {max}]")]
    OutOfBounds {
        /// The value that was read.
        value: i64,
        /// The smallest legal value.
        min: i64,
        /// The largest legal value.
        max: i64,
    },
    /// A floating point read produced NaN or +-infinity where only finite values are allowed.
    #[error("Expected a finite float, got {0}")]
    NonFiniteFloat(f64),
    /// A malformed multi-byte string sequence (invalid continuation byte or an out-of-range code
    /// point).
    #[error("Malformed UTF-8-like string data: {0}")]
    MalformedString(&'static str),
    /// The file/stream header's magic bytes didn't match.
    #[error("Bad file magic")]
    BadMagic,
    /// The file/stream header declared a version this build doesn't understand.
    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u32),
    /// A compressed-stream LZ77 code referenced history outside the sliding window.
    #[error("malformed LZ77 code: {0}")]
    Lz77Format(&'static str),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Reads fixed-width big-endian primitives and bounded/validated values from an underlying byte
/// source. Mirrors the original engine's `stream::Reader` base class.
pub trait ByteStreamReader: Read {
    /// Reads a single byte.
    fn read_u8(&mut self) -> CodecResult<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a signed byte.
    fn read_i8(&mut self) -> CodecResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a big-endian `u16`.
    fn read_u16(&mut self) -> CodecResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Reads a big-endian `i16`.
    fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Reads a big-endian `u32`.
    fn read_u32(&mut self) -> CodecResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Reads a big-endian `i32`.
    fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads a big-endian `u64`.
    fn read_u64(&mut self) -> CodecResult<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a big-endian `i64`.
    fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Reads a bool, encoded as a single byte (`0` = false, anything else = true).
    fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads an IEEE-754 big-endian `f32`.
    fn read_f32(&mut self) -> CodecResult<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    /// Reads an IEEE-754 big-endian `f64`.
    fn read_f64(&mut self) -> CodecResult<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Reads an `f32` and rejects NaN/infinite values.
    fn read_finite_f32(&mut self) -> CodecResult<f32> {
        let v = self.read_f32()?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(CodecError::NonFiniteFloat(v as f64))
        }
    }

    /// Reads an `f64` and rejects NaN/infinite values.
    fn read_finite_f64(&mut self) -> CodecResult<f64> {
        let v = self.read_f64()?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(CodecError::NonFiniteFloat(v))
        }
    }

    /// Reads a `u8` and checks it falls within `[min, max]` inclusive.
    fn read_limited_u8(&mut self, min: u8, max: u8) -> CodecResult<u8> {
        let v = self.read_u8()?;
        if v < min || v > max {
            return Err(CodecError::OutOfBounds {
                value: v as i64,
                min: min as i64,
                max: max as i64,
            });
        }
        Ok(v)
    }

    /// Reads a `u16` and checks it falls within `[min, max]` inclusive.
    fn read_limited_u16(&mut self, min: u16, max: u16) -> CodecResult<u16> {
        let v = self.read_u16()?;
        if v < min || v > max {
            return Err(CodecError::OutOfBounds {
                value: v as i64,
                min: min as i64,
                max: max as i64,
            });
        }
        Ok(v)
    }

    /// Reads a `u32` and checks it falls within `[min, max]` inclusive.
    fn read_limited_u32(&mut self, min: u32, max: u32) -> CodecResult<u32> {
        let v = self.read_u32()?;
        if v < min || v > max {
            return Err(CodecError::OutOfBounds {
                value: v as i64,
                min: min as i64,
                max: max as i64,
            });
        }
        Ok(v)
    }

    /// Reads a length-delimited UTF-8-like string: one or more multi-byte code point sequences
    /// (1-4 continuation bytes in the high bit per byte, matching the original engine's
    /// modified-UTF-8 `readString`) terminated by a single `0x00` byte. Code points `>= 0x110000`
    /// are rejected, matching the Unicode maximum scalar value plus one.
    fn read_string(&mut self) -> CodecResult<String> {
        let mut out = String::new();
        loop {
            let lead = self.read_u8()?;
            if lead == 0 {
                break;
            }
            let (extra_bytes, mut value, min_value) = if lead & 0b1000_0000 == 0 {
                (0u32, (lead & 0x7F) as u32, 0u32)
            } else if lead & 0b1110_0000 == 0b1100_0000 {
                (1, (lead & 0x1F) as u32, 0x80)
            } else if lead & 0b1111_0000 == 0b1110_0000 {
                (2, (lead & 0x0F) as u32, 0x800)
            } else if lead & 0b1111_1000 == 0b1111_0000 {
                (3, (lead & 0x07) as u32, 0x1_0000)
            } else {
                return Err(CodecError::MalformedString("invalid leading byte"));
            };
            for _ in 0..extra_bytes {
                let cont = self.read_u8()?;
                if cont & 0b1100_0000 != 0b1000_0000 {
                    return Err(CodecError::MalformedString("invalid continuation byte"));
                }
                value = (value << 6) | (cont & 0x3F) as u32;
            }
            if value < min_value || value >= 0x0011_0000 {
                return Err(CodecError::MalformedString("code point out of range"));
            }
            let ch = char::from_u32(value).ok_or(CodecError::MalformedString("not a valid scalar value"))?;
            out.push(ch);
        }
        Ok(out)
    }
}

impl<R: Read + ?Sized> ByteStreamReader for R {}

/// Writes fixed-width big-endian primitives to an underlying byte sink. Mirrors the original
/// engine's `stream::Writer` base class.
pub trait ByteStreamWriter: Write {
    /// Writes a single byte.
    fn write_u8(&mut self, v: u8) -> CodecResult<()> {
        self.write_all(&[v])?;
        Ok(())
    }

    /// Writes a signed byte.
    fn write_i8(&mut self, v: i8) -> CodecResult<()> {
        self.write_u8(v as u8)
    }

    /// Writes a big-endian `u16`.
    fn write_u16(&mut self, v: u16) -> CodecResult<()> {
        self.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Writes a big-endian `i16`.
    fn write_i16(&mut self, v: i16) -> CodecResult<()> {
        self.write_u16(v as u16)
    }

    /// Writes a big-endian `u32`.
    fn write_u32(&mut self, v: u32) -> CodecResult<()> {
        self.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Writes a big-endian `i32`.
    fn write_i32(&mut self, v: i32) -> CodecResult<()> {
        self.write_u32(v as u32)
    }

    /// Writes a big-endian `u64`.
    fn write_u64(&mut self, v: u64) -> CodecResult<()> {
        self.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Writes a big-endian `i64`.
    fn write_i64(&mut self, v: i64) -> CodecResult<()> {
        self.write_u64(v as u64)
    }

    /// Writes a bool as a single byte.
    fn write_bool(&mut self, v: bool) -> CodecResult<()> {
        self.write_u8(v as u8)
    }

    /// Writes an IEEE-754 big-endian `f32`.
    fn write_f32(&mut self, v: f32) -> CodecResult<()> {
        self.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Writes an IEEE-754 big-endian `f64`.
    fn write_f64(&mut self, v: f64) -> CodecResult<()> {
        self.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Writes a string using the same multi-byte encoding [`ByteStreamReader::read_string`]
    /// decodes, terminated by a `0x00` byte. Panics (via `debug_assert`) if the string contains a
    /// NUL character, since that would be ambiguous with the terminator.
    fn write_string(&mut self, s: &str) -> CodecResult<()> {
        for ch in s.chars() {
            let value = ch as u32;
            debug_assert_ne!(value, 0, "strings may not contain embedded NUL characters");
            if value < 0x80 {
                self.write_u8(value as u8)?;
            } else if value < 0x800 {
                self.write_u8(0b1100_0000 | (value >> 6) as u8)?;
                self.write_u8(0b1000_0000 | (value & 0x3F) as u8)?;
            } else if value < 0x1_0000 {
                self.write_u8(0b1110_0000 | (value >> 12) as u8)?;
                self.write_u8(0b1000_0000 | ((value >> 6) & 0x3F) as u8)?;
                self.write_u8(0b1000_0000 | (value & 0x3F) as u8)?;
            } else {
                self.write_u8(0b1111_0000 | (value >> 18) as u8)?;
                self.write_u8(0b1000_0000 | ((value >> 12) & 0x3F) as u8)?;
                self.write_u8(0b1000_0000 | ((value >> 6) & 0x3F) as u8)?;
                self.write_u8(0b1000_0000 | (value & 0x3F) as u8)?;
            }
        }
        self.write_u8(0)
    }
}

impl<W: Write + ?Sized> ByteStreamWriter for W {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primitives_roundtrip() {
        let mut buf = Vec::new();
        buf.write_u8(0xAB).unwrap();
        buf.write_i32(-12345).unwrap();
        buf.write_u64(u64::MAX).unwrap();
        buf.write_f64(3.25).unwrap();
        buf.write_bool(true).unwrap();

        let mut cursor = &buf[..];
        assert_eq!(cursor.read_u8().unwrap(), 0xAB);
        assert_eq!(cursor.read_i32().unwrap(), -12345);
        assert_eq!(cursor.read_u64().unwrap(), u64::MAX);
        assert_eq!(cursor.read_f64().unwrap(), 3.25);
        assert!(cursor.read_bool().unwrap());
    }

    #[test]
    fn string_roundtrip_ascii_and_unicode() {
        for s in ["", "hello", "héllo wörld", "日本語", "🧱block🧱"] {
            let mut buf = Vec::new();
            buf.write_string(s).unwrap();
            let mut cursor = &buf[..];
            assert_eq!(cursor.read_string().unwrap(), s);
        }
    }

    #[test]
    fn bounded_read_rejects_out_of_range() {
        let mut buf = Vec::new();
        buf.write_u8(200).unwrap();
        let mut cursor = &buf[..];
        assert!(cursor.read_limited_u8(0, 100).is_err());
    }

    #[test]
    fn non_finite_float_rejected() {
        let mut buf = Vec::new();
        buf.write_f32(f32::NAN).unwrap();
        let mut cursor = &buf[..];
        assert!(cursor.read_finite_f32().is_err());
    }

    #[test]
    fn malformed_continuation_byte_rejected() {
        let buf = [0b1100_0000u8, 0b0000_0000, 0];
        let mut cursor = &buf[..];
        assert!(cursor.read_string().is_err());
    }
}
