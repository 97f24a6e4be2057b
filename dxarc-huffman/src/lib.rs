//! # DxArc Huffman
//!
//! Pure Rust implementation of the Huffman codec used inside DX archives.
//!
//! The coder is static: byte counts are scaled to 16-bit weights, the
//! weights are stored delta-coded in the stream header, and both sides
//! rebuild the same tree from them in a fixed 511-slot arena.
//!
//! ```text
//! ┌─────────────────────────────────┬──────────────────────────────────┐
//! │ header (MSB-first, byte padded) │ payload (LSB-first code bits)    │
//! │ sizes + 256 weight deltas       │ one root-to-leaf code per byte   │
//! └─────────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Decoding follows a two-call convention: [`decoded_len`] reads the
//! original size from the header so the caller can size a buffer, then
//! [`decode_into`] fills it. [`decode`] does both.
//!
//! ## Example
//!
//! ```rust
//! use dxarc_huffman::{decode, decoded_len, encode};
//!
//! let original = b"aaaaaaaabbbbccd";
//! let compressed = encode(original);
//! assert_eq!(decoded_len(&compressed).unwrap(), original.len());
//! assert_eq!(decode(&compressed).unwrap(), original);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod decode;
pub mod encode;
pub mod forest;
pub mod header;

// Re-exports
pub use decode::{decode, decode_into, decoded_len};
pub use encode::encode;
pub use forest::{Code, Forest};
pub use header::HuffmanHeader;
