//! # DxArc Core
//!
//! Core components shared by the DX archive crates.
//!
//! - [`bitstream`]: MSB-first [`BitStream`] for the Huffman header and
//!   LSB-first [`BitWriter`]/[`BitReader`] for the Huffman payload
//! - [`crc`]: CRC-32, used to derive the archive XOR keys
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: CLI                                                 │
//! │     dxarc list / extract / create / info               │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Container                                           │
//! │     DX archive header, tables, key derivation          │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     DX LZ (keycode escapes), DX Huffman (511-node)     │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: BitStream (this crate)                              │
//! │     BitStream, BitReader/BitWriter, CRC-32             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use dxarc_core::bitstream::BitStream;
//! use dxarc_core::crc::Crc32;
//!
//! let mut stream = BitStream::new();
//! stream.write(12, 0xABC);
//! assert_eq!(stream.byte_len(), 2);
//!
//! assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod crc;
pub mod error;

// Re-exports for convenience
pub use bitstream::{BitReader, BitStream, BitWriter, bit_width};
pub use crc::Crc32;
pub use error::{DxArcError, ErrorKind, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, BitStream, BitWriter};
    pub use crate::crc::Crc32;
    pub use crate::error::{DxArcError, ErrorKind, Result};
}
