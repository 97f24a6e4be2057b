//! LZ decompression for DX archives.

use crate::{HEADER_SIZE, MIN_MATCH};
use dxarc_core::error::{DxArcError, Result};

/// Parsed stream prefix.
#[derive(Debug, Clone, Copy)]
struct StreamHeader {
    decoded_size: usize,
    stream_size: usize,
    keycode: u8,
}

impl StreamHeader {
    fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < HEADER_SIZE {
            return Err(DxArcError::unexpected_eof(HEADER_SIZE - input.len()));
        }

        let decoded_size = u32::from_le_bytes([input[0], input[1], input[2], input[3]]) as usize;
        let stream_size = u32::from_le_bytes([input[4], input[5], input[6], input[7]]) as usize;

        if stream_size < HEADER_SIZE {
            return Err(DxArcError::corrupted(
                4,
                format!("stream size {stream_size} is smaller than the prefix"),
            ));
        }
        if stream_size > input.len() {
            return Err(DxArcError::unexpected_eof(stream_size - input.len()));
        }

        Ok(Self {
            decoded_size,
            stream_size,
            keycode: input[8],
        })
    }
}

/// Read the decoded size from the stream prefix.
pub fn decoded_len(input: &[u8]) -> Result<usize> {
    Ok(StreamHeader::parse(input)?.decoded_size)
}

/// Decompress an LZ stream produced by [`encode`](crate::encode).
pub fn decode(input: &[u8]) -> Result<Vec<u8>> {
    let header = StreamHeader::parse(input)?;
    let src = &input[..header.stream_size];
    let keycode = header.keycode;
    let limit = header.decoded_size;

    // The declared size is untrusted until the stream has been walked.
    let mut out: Vec<u8> = Vec::with_capacity(limit.min(src.len().saturating_mul(8)));
    let mut pos = HEADER_SIZE;

    while pos < src.len() {
        let byte = src[pos];

        if byte != keycode {
            push_literal(&mut out, byte, limit, pos)?;
            pos += 1;
            continue;
        }

        let code = read_bytes(src, pos + 1, 1)? as u8;
        if code == keycode {
            push_literal(&mut out, keycode, limit, pos)?;
            pos += 2;
            continue;
        }

        let token_start = pos;
        let code = if code > keycode { code - 1 } else { code };
        pos += 2;

        let mut conbo = (code >> 3) as usize;
        if code & 0x04 != 0 {
            conbo |= (read_bytes(src, pos, 1)? as usize) << 5;
            pos += 1;
        }
        let length = conbo + MIN_MATCH;

        let index_bytes = match code & 0x03 {
            0 => 1,
            1 => 2,
            2 => 3,
            _ => {
                return Err(DxArcError::corrupted(
                    token_start as u64,
                    "invalid distance width in back-reference",
                ));
            }
        };
        let distance = read_bytes(src, pos, index_bytes)? as usize + 1;
        pos += index_bytes;

        if distance > out.len() {
            return Err(DxArcError::invalid_distance(distance, out.len()));
        }
        if out.len() + length > limit {
            return Err(DxArcError::corrupted(
                token_start as u64,
                format!(
                    "back-reference of {length} bytes overruns declared size {limit}"
                ),
            ));
        }

        copy_back_reference(&mut out, distance, length);
    }

    if out.len() != limit {
        return Err(DxArcError::corrupted(
            src.len() as u64,
            format!("stream ended after {} of {} bytes", out.len(), limit),
        ));
    }

    Ok(out)
}

#[inline]
fn push_literal(out: &mut Vec<u8>, byte: u8, limit: usize, pos: usize) -> Result<()> {
    if out.len() >= limit {
        return Err(DxArcError::corrupted(
            pos as u64,
            format!("literal past declared size {limit}"),
        ));
    }
    out.push(byte);
    Ok(())
}

/// Read a 1-3 byte little-endian value at `pos`.
#[inline]
fn read_bytes(src: &[u8], pos: usize, count: usize) -> Result<u32> {
    let bytes = src
        .get(pos..pos + count)
        .ok_or_else(|| DxArcError::unexpected_eof(pos + count - src.len()))?;
    Ok(bytes
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// Copy `length` bytes starting `distance` bytes back.
///
/// When the source overlaps the destination the copy proceeds in chunks
/// that double in size, each chunk re-reading the bytes just produced.
fn copy_back_reference(out: &mut Vec<u8>, distance: usize, length: usize) {
    if distance >= length {
        let start = out.len() - distance;
        out.extend_from_within(start..start + length);
        return;
    }

    let mut remaining = length;
    let mut chunk = distance;
    while remaining > chunk {
        let start = out.len() - chunk;
        out.extend_from_within(start..);
        remaining -= chunk;
        chunk *= 2;
    }
    let start = out.len() - chunk;
    out.extend_from_within(start..start + remaining);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    fn stream(decoded: u32, keycode: u8, body: &[u8]) -> Vec<u8> {
        let mut out = decoded.to_le_bytes().to_vec();
        out.extend_from_slice(&((HEADER_SIZE + body.len()) as u32).to_le_bytes());
        out.push(keycode);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_decode_literals_and_escape() {
        let data = stream(4, 0x7E, &[b'a', 0x7E, 0x7E, b'b', b'c']);
        assert_eq!(decode(&data).unwrap(), b"a\x7Ebc");
    }

    #[test]
    fn test_decode_overlapping_reference() {
        // "ab" then 10 bytes at distance 2.
        // conbo 6 -> code 0x30, bumped past keycode 0x00.
        let data = stream(12, 0x00, &[b'a', b'b', 0x00, 0x31, 0x01]);
        assert_eq!(decode(&data).unwrap(), b"abababababab");
    }

    #[test]
    fn test_decode_extra_length_byte() {
        // 1 literal + 100 bytes at distance 1: conbo 96 = 0b11_00000
        // -> code (0 << 3) | 4 = 0x04 (bumped to 0x05), extra byte 3.
        let data = stream(101, 0x00, &[b'z', 0x00, 0x05, 0x03, 0x00]);
        assert_eq!(decode(&data).unwrap(), vec![b'z'; 101]);
    }

    #[test]
    fn test_decoded_len() {
        let data = encode(b"some text, some text").unwrap();
        assert_eq!(decoded_len(&data).unwrap(), 20);
    }

    #[test]
    fn test_short_prefix() {
        assert!(matches!(
            decode(&[1, 0, 0]),
            Err(DxArcError::UnexpectedEof { expected: 6 })
        ));
    }

    #[test]
    fn test_distance_beyond_output() {
        let data = stream(8, 0x00, &[b'a', 0x00, 0x01, 0x04]);
        assert!(matches!(
            decode(&data),
            Err(DxArcError::InvalidDistance {
                distance: 5,
                history_size: 1
            })
        ));
    }

    #[test]
    fn test_overrun_declared_size() {
        let data = stream(3, 0x00, &[b'a', 0x00, 0x01, 0x00]);
        assert!(matches!(decode(&data), Err(DxArcError::CorruptedData { .. })));
    }

    #[test]
    fn test_truncated_token() {
        let data = stream(8, 0x00, &[b'a', 0x00, 0x01]);
        assert!(matches!(decode(&data), Err(DxArcError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_stream_size_beyond_input() {
        let mut data = encode(b"hello hello hello").unwrap();
        data.truncate(data.len() - 2);
        assert!(matches!(
            decode(&data),
            Err(DxArcError::UnexpectedEof { expected: 2 })
        ));
    }

    #[test]
    fn test_short_output() {
        let data = stream(5, 0x00, b"abc");
        assert!(matches!(decode(&data), Err(DxArcError::CorruptedData { .. })));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = encode(b"payload payload payload").unwrap();
        data.extend_from_slice(&[0xAA; 7]);
        assert_eq!(decode(&data).unwrap(), b"payload payload payload");
    }
}
