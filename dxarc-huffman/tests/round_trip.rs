//! Integration tests for the DX Huffman codec.

use dxarc_huffman::{HuffmanHeader, decode, decode_into, decoded_len, encode};
use proptest::prelude::*;

fn lcg_bytes(size: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((seed >> 32) as u8);
    }
    data
}

#[test]
fn test_empty_round_trip() {
    let encoded = encode(b"");
    assert_eq!(decoded_len(&encoded).unwrap(), 0);
    assert!(decode(&encoded).unwrap().is_empty());
}

#[test]
fn test_single_byte() {
    let encoded = encode(b"Z");
    assert_eq!(decode(&encoded).unwrap(), b"Z");
}

#[test]
fn test_skewed_text_compresses() {
    let text = b"aaaaaaaaaaaaaaaabbbbbbbbccccdde".repeat(300);
    let encoded = encode(&text);
    assert_eq!(decode(&encoded).unwrap(), text);
    assert!(encoded.len() < text.len() / 2);
}

#[test]
fn test_random_data() {
    let data = lcg_bytes(100_000, 7);
    let encoded = encode(&data);
    assert_eq!(decode(&encoded).unwrap(), data);
}

#[test]
fn test_rare_symbols_get_long_codes() {
    // Symbols whose scaled weight rounds to zero still round trip.
    let mut data = vec![b'x'; 200_000];
    data[1234] = 0x01;
    data[150_000] = 0xFE;
    let encoded = encode(&data);
    assert_eq!(decode(&encoded).unwrap(), data);
}

#[test]
fn test_payload_size_matches_header() {
    let data = b"payload size bookkeeping".repeat(10);
    let encoded = encode(&data);
    let header = HuffmanHeader::parse(&encoded).unwrap();
    assert_eq!(header.original_size, data.len() as u64);
    assert_eq!(
        header.header_len as u64 + header.payload_size,
        encoded.len() as u64
    );
}

#[test]
fn test_two_call_convention() {
    let data = lcg_bytes(5000, 99);
    let encoded = encode(&data);

    let len = decoded_len(&encoded).unwrap();
    let mut dest = vec![0u8; len];
    assert_eq!(decode_into(&encoded, &mut dest).unwrap(), len);
    assert_eq!(dest, data);
}

#[test]
fn test_trailing_data_ignored() {
    let data = b"stream followed by unrelated bytes".to_vec();
    let mut encoded = encode(&data);
    encoded.extend_from_slice(&[0xA5; 32]);
    assert_eq!(decode(&encoded).unwrap(), data);
}

proptest! {
    #[test]
    fn huffman_round_trip(data in prop::collection::vec(any::<u8>(), 1..=10000)) {
        let encoded = encode(&data);
        prop_assert_eq!(decoded_len(&encoded).unwrap(), data.len());
        prop_assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn huffman_round_trip_small_alphabet(data in prop::collection::vec(0u8..3, 1..=2000)) {
        let encoded = encode(&data);
        prop_assert_eq!(decode(&encoded).unwrap(), data);
    }
}
