//! Huffman stream header.
//!
//! ```text
//! 6 bits   width(original size) - 1
//! n bits   original size
//! 6 bits   width(payload size) - 1
//! n bits   payload size
//! 256 x    weight delta from the previous weight (the first from 0):
//!            3 bits  selector s
//!            1 bit   sign (1 = negative)
//!            2(s+1)  magnitude bits
//! ```
//!
//! All fields are MSB-first, padded to a byte boundary.

use crate::forest::LEAF_COUNT;
use dxarc_core::bitstream::{BitStream, bit_width};
use dxarc_core::error::Result;

/// Parsed Huffman stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanHeader {
    /// Length of the decoded data.
    pub original_size: u64,
    /// Length of the coded payload following the header.
    pub payload_size: u64,
    /// Leaf weights the forest is rebuilt from.
    pub weights: [u16; LEAF_COUNT],
    /// Encoded header length in bytes.
    pub header_len: usize,
}

impl HuffmanHeader {
    /// Parse a header from the start of `input`.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut stream = BitStream::from_slice(input);

        let original_size = read_sized(&mut stream)?;
        let payload_size = read_sized(&mut stream)?;

        let mut weights = [0u16; LEAF_COUNT];
        let mut previous = 0u16;
        for weight in weights.iter_mut() {
            let selector = stream.read(3)? as u8;
            let negative = stream.read(1)? == 1;
            let magnitude = stream.read((selector + 1) * 2)? as u16;
            previous = if negative {
                previous.wrapping_sub(magnitude)
            } else {
                previous.wrapping_add(magnitude)
            };
            *weight = previous;
        }

        Ok(Self {
            original_size,
            payload_size,
            weights,
            header_len: stream.byte_len(),
        })
    }

    /// Encode the header. `header_len` is ignored and recomputed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut stream = BitStream::new();
        write_sized(&mut stream, self.original_size);
        write_sized(&mut stream, self.payload_size);

        let mut previous = 0i32;
        for &weight in &self.weights {
            let delta = weight as i32 - previous;
            previous = weight as i32;

            let magnitude = delta.unsigned_abs() as u64;
            let selector = ((bit_width(magnitude) + 1) / 2).saturating_sub(1);
            stream.write(3, selector as u64);
            stream.write(1, (delta < 0) as u64);
            stream.write((selector + 1) * 2, magnitude);
        }

        stream.into_bytes()
    }
}

fn read_sized(stream: &mut BitStream<'_>) -> Result<u64> {
    let width = stream.read(6)? as u8 + 1;
    stream.read(width)
}

fn write_sized(stream: &mut BitStream<'_>, value: u64) {
    let width = bit_width(value);
    stream.write(6, (width - 1) as u64);
    stream.write(width, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxarc_core::error::DxArcError;

    fn single_weight_header() -> HuffmanHeader {
        let mut weights = [0u16; LEAF_COUNT];
        weights[97] = 65535;
        HuffmanHeader {
            original_size: 4,
            payload_size: 1,
            weights,
            header_len: 0,
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = single_weight_header().to_bytes();
        // 000010 100 | 000000 1
        assert_eq!(&bytes[..2], &[0x0A, 0x01]);
        // 16 size bits, 254 zero deltas of 6 bits, two 20-bit deltas.
        assert_eq!(bytes.len(), (16 + 254 * 6 + 2 * 20usize).div_ceil(8));
    }

    #[test]
    fn test_header_parse() {
        let header = single_weight_header();
        let bytes = header.to_bytes();
        let parsed = HuffmanHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.original_size, 4);
        assert_eq!(parsed.payload_size, 1);
        assert_eq!(parsed.weights, header.weights);
        assert_eq!(parsed.header_len, bytes.len());
    }

    #[test]
    fn test_zero_sizes() {
        let header = HuffmanHeader {
            original_size: 0,
            payload_size: 0,
            weights: [0; LEAF_COUNT],
            header_len: 0,
        };
        let bytes = header.to_bytes();
        // Two 7-bit size fields and 256 six-bit deltas.
        assert_eq!(bytes.len(), (14 + 256 * 6usize).div_ceil(8));
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_large_sizes() {
        let header = HuffmanHeader {
            original_size: u64::MAX,
            payload_size: 1 << 40,
            weights: [7; LEAF_COUNT],
            header_len: 0,
        };
        let parsed = HuffmanHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed.original_size, u64::MAX);
        assert_eq!(parsed.payload_size, 1 << 40);
    }

    #[test]
    fn test_weights_wrap() {
        // A negative first delta wraps like the 16-bit decoder state.
        let mut stream = BitStream::new();
        stream.write(6, 0);
        stream.write(1, 1);
        stream.write(6, 0);
        stream.write(1, 1);
        stream.write(3, 0);
        stream.write(1, 1);
        stream.write(2, 1);
        for _ in 1..LEAF_COUNT {
            stream.write(6, 0);
        }
        let parsed = HuffmanHeader::parse(&stream.into_bytes()).unwrap();
        assert_eq!(parsed.weights[0], u16::MAX);
        assert_eq!(parsed.weights[255], u16::MAX);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = single_weight_header().to_bytes();
        let result = HuffmanHeader::parse(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(DxArcError::UnexpectedEof { .. })));
    }
}
