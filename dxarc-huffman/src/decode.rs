//! Huffman decompression.
//!
//! A 512-entry table maps the next 9 payload bits to the deepest node
//! reachable from the root within those bits, together with the number of
//! bits it consumes. Decoding continues bit by bit from that node until a
//! leaf is reached. The final [`SLOW_TAIL`] output bytes are decoded from
//! the root one bit at a time.

use crate::forest::{Forest, LEAF_COUNT, ROOT};
use crate::header::HuffmanHeader;
use dxarc_core::bitstream::BitReader;
use dxarc_core::error::{DxArcError, Result};

/// Width of the fast lookup table index.
const TABLE_BITS: u8 = 9;

/// Output bytes at the end of a stream decoded without the lookup table.
pub const SLOW_TAIL: usize = 17;

#[derive(Debug, Clone, Copy, Default)]
struct TableEntry {
    node: u16,
    bits: u8,
}

/// Decoder state rebuilt from a header's weights.
#[derive(Debug, Clone)]
struct HuffmanDecoder {
    forest: Forest,
    table: Vec<TableEntry>,
}

impl HuffmanDecoder {
    fn new(weights: &[u16; LEAF_COUNT]) -> Self {
        let forest = Forest::build(&weights.map(u32::from));

        let table = (0..1usize << TABLE_BITS)
            .map(|pattern| {
                let mut node = ROOT;
                let mut bits = 0u8;
                while node >= LEAF_COUNT && bits < TABLE_BITS {
                    node = forest.child(node, ((pattern >> bits) & 1) as u8);
                    bits += 1;
                }
                TableEntry {
                    node: node as u16,
                    bits,
                }
            })
            .collect();

        Self { forest, table }
    }

    fn decode_symbol(&self, reader: &mut BitReader<'_>, use_table: bool) -> Result<u8> {
        let mut node = ROOT;
        if use_table {
            let entry = self.table[reader.peek_bits(TABLE_BITS) as usize];
            reader.consume(entry.bits)?;
            node = entry.node as usize;
        }

        while node >= LEAF_COUNT {
            let bit = reader.read_bit()?;
            node = self.forest.child(node, bit as u8);
        }
        Ok(node as u8)
    }
}

/// Read the decoded length from the header.
pub fn decoded_len(input: &[u8]) -> Result<usize> {
    let header = HuffmanHeader::parse(input)?;
    to_usize(header.original_size)
}

/// A header whose sizes have been checked against the input.
struct Checked<'a> {
    header: HuffmanHeader,
    original: usize,
    payload: &'a [u8],
}

fn check(input: &[u8]) -> Result<Checked<'_>> {
    let header = HuffmanHeader::parse(input)?;
    let original = to_usize(header.original_size)?;
    let payload_len = to_usize(header.payload_size)?;

    let payload_end = header.header_len.saturating_add(payload_len);
    if payload_end > input.len() {
        return Err(DxArcError::unexpected_eof(payload_end - input.len()));
    }
    let payload = &input[header.header_len..payload_end];

    // Every code is at least one bit long.
    if original as u64 > payload.len() as u64 * 8 {
        return Err(DxArcError::corrupted(
            header.header_len as u64,
            format!(
                "{} payload bytes cannot hold {} symbols",
                payload.len(),
                original
            ),
        ));
    }

    Ok(Checked {
        header,
        original,
        payload,
    })
}

fn decode_checked(checked: &Checked<'_>, dest: &mut [u8]) -> Result<usize> {
    let original = checked.original;
    if original == 0 {
        return Ok(0);
    }

    let decoder = HuffmanDecoder::new(&checked.header.weights);
    let mut reader = BitReader::new(checked.payload);
    let fast_end = original.saturating_sub(SLOW_TAIL);

    for (i, out) in dest[..original].iter_mut().enumerate() {
        *out = decoder.decode_symbol(&mut reader, i < fast_end)?;
    }

    Ok(original)
}

/// Decode into `dest`, returning the number of bytes written.
///
/// `dest` may be longer than the decoded data; bytes past the decoded
/// length are left untouched.
pub fn decode_into(input: &[u8], dest: &mut [u8]) -> Result<usize> {
    let checked = check(input)?;
    if dest.len() < checked.original {
        return Err(DxArcError::buffer_too_small(checked.original, dest.len()));
    }
    decode_checked(&checked, dest)
}

/// Decode a complete Huffman stream.
///
/// Sizes are validated against the input before the output is allocated.
pub fn decode(input: &[u8]) -> Result<Vec<u8>> {
    let checked = check(input)?;
    let mut out = vec![0u8; checked.original];
    decode_checked(&checked, &mut out)?;
    Ok(out)
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| DxArcError::size_mismatch("Huffman size", usize::MAX as u64, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;

    #[test]
    fn test_decode_single_symbol() {
        let encoded = encode(b"aaaa");
        assert_eq!(decode(&encoded).unwrap(), b"aaaa");
    }

    #[test]
    fn test_decode_into_larger_buffer() {
        let encoded = encode(b"hello");
        let mut dest = [0xEEu8; 8];
        assert_eq!(decode_into(&encoded, &mut dest).unwrap(), 5);
        assert_eq!(&dest, b"hello\xEE\xEE\xEE");
    }

    #[test]
    fn test_buffer_too_small() {
        let encoded = encode(b"hello world");
        let mut dest = [0u8; 4];
        assert!(matches!(
            decode_into(&encoded, &mut dest),
            Err(DxArcError::BufferTooSmall {
                needed: 11,
                available: 4
            })
        ));
    }

    #[test]
    fn test_table_entries_stop_at_leaves() {
        let mut weights = [0u16; LEAF_COUNT];
        weights[b'x' as usize] = 65535;
        let decoder = HuffmanDecoder::new(&weights);

        // Bit 1 from the root reaches 'x' immediately.
        let entry = decoder.table[0b1_0000_0001];
        assert_eq!(entry.node, b'x' as u16);
        assert_eq!(entry.bits, 1);

        // Zero bits descend the zero-weight subtree to its last leaf.
        let entry = decoder.table[0];
        assert_eq!(entry.node, 255);
        assert_eq!(entry.bits, 8);
    }

    #[test]
    fn test_truncated_payload() {
        let input = b"The quick brown fox jumps over the lazy dog".repeat(4);
        let encoded = encode(&input);
        let result = decode(&encoded[..encoded.len() - 3]);
        assert!(matches!(result, Err(DxArcError::UnexpectedEof { expected: 3 })));
    }

    #[test]
    fn test_implausible_original_size() {
        let header = HuffmanHeader {
            original_size: 1_000_000,
            payload_size: 2,
            weights: [1; LEAF_COUNT],
            header_len: 0,
        };
        let mut input = header.to_bytes();
        input.extend_from_slice(&[0, 0]);
        let mut dest = vec![0u8; 1_000_000];
        assert!(matches!(
            decode_into(&input, &mut dest),
            Err(DxArcError::CorruptedData { .. })
        ));
    }

    #[test]
    fn test_short_stream_uses_slow_path_only() {
        let input = b"0123456789abcdef";
        assert!(input.len() < SLOW_TAIL);
        assert_eq!(decode(&encode(input)).unwrap(), input);
    }
}
