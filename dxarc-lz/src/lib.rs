//! # DxArc LZ
//!
//! Pure Rust implementation of the LZ codec used inside DX archives.
//!
//! ## Stream layout
//!
//! ```text
//! ┌──────────────┬───────────────────┬─────────┬──────────────────────┐
//! │ u32 LE       │ u32 LE            │ u8      │ token stream ...     │
//! │ decoded size │ total stream size │ keycode │                      │
//! └──────────────┴───────────────────┴─────────┴──────────────────────┘
//! ```
//!
//! The total stream size includes the 9-byte prefix. The keycode is the
//! least frequent byte value of the input and acts as an escape marker:
//!
//! - any byte other than the keycode is a literal;
//! - `keycode keycode` is a literal keycode;
//! - `keycode code [extra] index...` is a back-reference.
//!
//! In the code byte, bits `[1:0]` give the width of the stored distance
//! (1, 2 or 3 bytes), bit `[2]` flags an extra length byte, and bits `[7:3]`
//! hold the low 5 bits of `length - 4`. The extra byte carries the upper
//! bits. Codes at or above the keycode are stored incremented by one, so the
//! byte after an escape is never the keycode itself unless it is a literal.
//!
//! ## Example
//!
//! ```rust
//! use dxarc_lz::{decode, encode};
//!
//! let original = b"WOLF RPG WOLF RPG WOLF RPG WOLF RPG";
//! let compressed = encode(original).unwrap();
//! assert!(compressed.len() < original.len());
//!
//! let decompressed = decode(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod decode;
pub mod encode;

// Re-exports
pub use decode::{decode, decoded_len};
pub use encode::{DEFAULT_SEARCH_DEPTH, LzEncoder, encode};

/// Size of the stream prefix (decoded size, stream size, keycode).
pub const HEADER_SIZE: usize = 9;

/// Minimum back-reference length.
pub const MIN_MATCH: usize = 4;

/// Maximum back-reference length (13 length bits plus the minimum).
pub const MAX_MATCH: usize = 0x1FFF + MIN_MATCH;

/// Maximum back-reference distance (24-bit index plus one).
pub const MAX_DISTANCE: usize = 0x100_0000;
