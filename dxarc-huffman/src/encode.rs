//! Huffman compression.

use crate::forest::{Forest, LEAF_COUNT};
use crate::header::HuffmanHeader;
use dxarc_core::bitstream::BitWriter;
use tracing::trace;

/// Scale byte counts to 16-bit weights relative to the input length.
pub fn weights_for(input: &[u8]) -> [u16; LEAF_COUNT] {
    let mut counts = [0u64; LEAF_COUNT];
    for &b in input {
        counts[b as usize] += 1;
    }

    let mut weights = [0u16; LEAF_COUNT];
    if input.is_empty() {
        return weights;
    }

    let len = input.len() as u64;
    for (weight, &count) in weights.iter_mut().zip(&counts) {
        *weight = (count * 0xFFFF / len) as u16;
    }
    weights
}

/// Compress `input` into `header ++ payload`.
///
/// Empty input produces a header with zero sizes and no payload.
pub fn encode(input: &[u8]) -> Vec<u8> {
    let weights = weights_for(input);

    let payload = if input.is_empty() {
        Vec::new()
    } else {
        encode_payload(input, &weights)
    };

    let header = HuffmanHeader {
        original_size: input.len() as u64,
        payload_size: payload.len() as u64,
        weights,
        header_len: 0,
    };

    let mut out = header.to_bytes();
    trace!(
        "Huffman encoded {} -> {} + {} bytes",
        input.len(),
        out.len(),
        payload.len()
    );
    out.extend_from_slice(&payload);
    out
}

fn encode_payload(input: &[u8], weights: &[u16; LEAF_COUNT]) -> Vec<u8> {
    let forest = Forest::build(&weights.map(u32::from));
    let codes = forest.leaf_codes();

    let mut writer = BitWriter::with_capacity(input.len());
    for &b in input {
        for (bits, count) in codes[b as usize].words() {
            writer.write_bits(bits, count);
        }
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_scale() {
        let weights = weights_for(b"aaab");
        assert_eq!(weights[b'a' as usize], 49151);
        assert_eq!(weights[b'b' as usize], 16383);
        assert_eq!(weights[0], 0);
    }

    #[test]
    fn test_single_symbol_stream() {
        // 'a' sits on branch 1 under the root, one bit per byte.
        let out = encode(b"aaaa");
        assert_eq!(&out[..2], &[0x0A, 0x01]);
        assert_eq!(out.len(), 199);
        assert_eq!(out[198], 0x0F);
    }

    #[test]
    fn test_uniform_bytes_are_bit_reversed() {
        let input: Vec<u8> = (0..=255u8).collect();
        let out = encode(&input);
        let header = HuffmanHeader::parse(&out).unwrap();
        assert_eq!(header.payload_size, 256);

        let payload = &out[header.header_len..];
        let expected: Vec<u8> = input.iter().map(|b| b.reverse_bits()).collect();
        assert_eq!(payload, &expected[..]);
    }

    #[test]
    fn test_empty_input() {
        let out = encode(b"");
        let header = HuffmanHeader::parse(&out).unwrap();
        assert_eq!(header.original_size, 0);
        assert_eq!(header.payload_size, 0);
        assert_eq!(header.header_len, out.len());
    }
}
