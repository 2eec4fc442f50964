//! An LZ77 stream compressor/expander used to shrink chunk save data and large network payloads.
//! Ported from the original engine's `compressed_stream.h`: a 1024-byte sliding window, 6-bit
//! match lengths and a trailing literal byte, packed into a single 16-bit code per token.

use std::collections::VecDeque;
use std::io::{Read, Write};

use thiserror::Error;

use super::{ByteStreamReader, ByteStreamWriter, CodecResult};

const LENGTH_BITS: u32 = 6;
const OFFSET_BITS: u32 = 10;
const MAX_LENGTH: usize = (1 << LENGTH_BITS) - 1;
const MAX_OFFSET: usize = (1 << OFFSET_BITS) - 1;
const WINDOW_SIZE: usize = MAX_OFFSET + 1;

/// A malformed LZ77 code was encountered while expanding a compressed stream.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
#[error("malformed LZ77 code: length {length} exceeds available history")]
pub struct Lz77FormatError {
    length: usize,
}

struct Lz77Code {
    length: usize,
    offset: usize,
    next_byte: u8,
}

impl Lz77Code {
    fn read(r: &mut impl Read) -> CodecResult<Self> {
        let next_byte = r.read_u8()?;
        let packed = r.read_u16()?;
        let length = (packed >> OFFSET_BITS) as usize & MAX_LENGTH;
        let offset = packed as usize & MAX_OFFSET;
        Ok(Self {
            length,
            offset,
            next_byte,
        })
    }

    fn write(&self, w: &mut impl Write) -> CodecResult<()> {
        w.write_u8(self.next_byte)?;
        let packed = ((self.length as u16) << OFFSET_BITS) | self.offset as u16;
        w.write_u16(packed)
    }
}

/// Compresses `input` into `output` using the sliding-window LZ77 format.
pub fn compress(input: &[u8], output: &mut impl Write) -> CodecResult<()> {
    let mut history: VecDeque<u8> = VecDeque::with_capacity(WINDOW_SIZE);
    let mut pos = 0usize;
    while pos < input.len() {
        let (length, offset) = find_longest_match(&history, &input[pos..]);
        let next_byte_idx = pos + length;
        if next_byte_idx >= input.len() {
            // No room for a trailing literal; emit what we matched with a zero literal marker is
            // unsafe (would desync length), so shrink the match by one to guarantee a literal.
            let length = length.saturating_sub(1);
            let next_byte = input[pos + length];
            Lz77Code {
                length,
                offset: if length == 0 { 0 } else { offset },
                next_byte,
            }
            .write(output)?;
            push_history(&mut history, &input[pos..=pos + length]);
            pos += length + 1;
            continue;
        }
        let next_byte = input[next_byte_idx];
        Lz77Code {
            length,
            offset: if length == 0 { 0 } else { offset },
            next_byte,
        }
        .write(output)?;
        push_history(&mut history, &input[pos..=next_byte_idx]);
        pos = next_byte_idx + 1;
    }
    Ok(())
}

fn push_history(history: &mut VecDeque<u8>, bytes: &[u8]) {
    for &b in bytes {
        if history.len() == WINDOW_SIZE {
            history.pop_front();
        }
        history.push_back(b);
    }
}

fn find_longest_match(history: &VecDeque<u8>, remaining: &[u8]) -> (usize, usize) {
    if history.is_empty() {
        return (0, 0);
    }
    let max_len = remaining.len().min(MAX_LENGTH);
    let mut best_len = 0usize;
    let mut best_offset = 0usize;
    for offset in 1..=history.len().min(MAX_OFFSET) {
        let start = history.len() - offset;
        let mut len = 0usize;
        while len < max_len {
            let hist_idx = start + len;
            let hist_byte = if hist_idx < history.len() {
                history[hist_idx]
            } else {
                // Matches that run past the end of recorded history repeat cyclically with
                // period `offset`, mirroring overlapping-copy LZ77 semantics.
                remaining[hist_idx - history.len()]
            };
            if hist_byte != remaining[len] {
                break;
            }
            len += 1;
        }
        if len > best_len {
            best_len = len;
            best_offset = offset;
        }
    }
    (best_len, best_offset)
}

/// Expands a compressed stream previously produced by [`compress`].
pub fn expand(input: &mut impl Read, output: &mut Vec<u8>) -> CodecResult<()> {
    let mut history: VecDeque<u8> = VecDeque::with_capacity(WINDOW_SIZE);
    loop {
        let code = match Lz77Code::read(input) {
            Ok(code) => code,
            Err(super::CodecError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        };
        if code.length > 0 {
            if code.offset == 0 || code.offset > history.len() {
                return Err(super::CodecError::Lz77Format("match offset out of range"));
            }
            let start = history.len() - code.offset;
            for i in 0..code.length {
                let byte = history[start + i];
                output.push(byte);
                push_history(&mut history, &[byte]);
            }
        }
        output.push(code.next_byte);
        push_history(&mut history, &[code.next_byte]);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut compressed = Vec::new();
        compress(data, &mut compressed).unwrap();
        let mut decompressed = Vec::new();
        expand(&mut &compressed[..], &mut decompressed).unwrap();
        assert_eq!(decompressed, data, "roundtrip mismatch for {} bytes", data.len());
    }

    #[test]
    fn roundtrips_empty() {
        roundtrip(b"");
    }

    #[test]
    fn roundtrips_literal_only() {
        roundtrip(b"hello world");
    }

    #[test]
    fn roundtrips_repetitive_data() {
        roundtrip(&vec![0xAAu8; 5000]);
    }

    #[test]
    fn roundtrips_repeating_pattern() {
        let pattern = b"abcabcabcabcabc";
        let mut data = Vec::new();
        for _ in 0..200 {
            data.extend_from_slice(pattern);
        }
        roundtrip(&data);
    }

    #[test]
    fn compresses_repetitive_data_smaller_than_input() {
        let data = vec![0x42u8; 10_000];
        let mut compressed = Vec::new();
        compress(&data, &mut compressed).unwrap();
        assert!(compressed.len() < data.len());
    }
}
