//! DX archive header.
//!
//! The header occupies the first 64 bytes of the archive:
//!
//! ```text
//! offset  size  field
//!      0     2  magic "DX"
//!      2     2  version
//!      4     4  decoded table blob length
//!      8     8  data start (absolute)
//!     16     8  name table start (absolute)
//!     24     8  file table start (relative to the table blob)
//!     32     8  directory table start (relative to the table blob)
//!     40     4  name code page
//!     44     4  flags
//!     48     1  Huffman block size in KiB (0xFF = whole payload)
//!     49    14  reserved
//!     63     1  padding
//! ```

use crate::names::NameEncoding;
use crate::table::{read_u16, read_u32, read_u64};
use dxarc_core::error::{DxArcError, Result};
use std::io::{Read, Write};
use std::ops::RangeInclusive;

/// Encoded header length.
pub const HEADER_SIZE: usize = 64;

/// Magic number, `"DX"` little-endian.
pub const DXA_MAGIC: u16 = 0x5844;

/// Version written by [`DxArchiveWriter`](crate::DxArchiveWriter).
pub const DXA_VERSION: u16 = 8;

/// Payloads and tables are stored without the XOR keystream.
pub const FLAG_NO_KEY: u32 = 0x0000_0001;

/// The table blob is stored without LZ/Huffman compression.
pub const FLAG_NO_HEAD_PRESS: u32 = 0x0000_0002;

const HUFFMAN_WHOLE: u8 = 0xFF;

/// Header layouts this crate understands, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// 64-bit offsets with Huffman block sizes (version 8).
    V8,
}

impl HeaderKind {
    /// Known layouts in detection order.
    pub const ALL: [HeaderKind; 1] = [HeaderKind::V8];

    /// Magic number carried by this layout.
    pub fn magic(self) -> u16 {
        match self {
            HeaderKind::V8 => DXA_MAGIC,
        }
    }

    /// Versions using this layout.
    pub fn versions(self) -> RangeInclusive<u16> {
        match self {
            HeaderKind::V8 => 8..=8,
        }
    }

    /// Find the layout matching a magic/version pair.
    pub fn detect(magic: u16, version: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.magic() == magic && kind.versions().contains(&version))
    }
}

/// How much of a payload is Huffman coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanBlock {
    /// The whole payload is Huffman coded.
    Whole,
    /// Only the first and last `n` KiB are Huffman coded when the payload
    /// is longer than twice that; the middle is stored as is.
    Kb(u8),
}

impl HuffmanBlock {
    /// Decode the header byte.
    pub fn from_byte(value: u8) -> Self {
        if value == HUFFMAN_WHOLE {
            HuffmanBlock::Whole
        } else {
            HuffmanBlock::Kb(value)
        }
    }

    /// Encode as the header byte. `Kb(255)` is indistinguishable from `Whole`.
    pub fn to_byte(self) -> u8 {
        match self {
            HuffmanBlock::Whole => HUFFMAN_WHOLE,
            HuffmanBlock::Kb(kb) => kb,
        }
    }

    /// Length of the head and tail blocks in bytes, if limited.
    pub fn block_len(self) -> Option<usize> {
        match self {
            HuffmanBlock::Whole | HuffmanBlock::Kb(HUFFMAN_WHOLE) => None,
            HuffmanBlock::Kb(kb) => Some(kb as usize * 1024),
        }
    }

    /// Length of the stored middle region for a payload of `len` bytes.
    pub fn middle_len(self, len: usize) -> Option<usize> {
        self.block_len()
            .filter(|&block| len > block * 2)
            .map(|block| len - block * 2)
    }
}

impl Default for HuffmanBlock {
    fn default() -> Self {
        HuffmanBlock::Kb(16)
    }
}

/// Parsed archive header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Detected layout.
    pub kind: HeaderKind,
    /// Format version.
    pub version: u16,
    /// Decoded table blob length.
    pub head_size: u32,
    /// Absolute offset of the first payload.
    pub data_start: u64,
    /// Absolute offset of the (possibly compressed) table blob.
    pub name_table_start: u64,
    /// File table offset inside the table blob.
    pub file_table_start: u64,
    /// Directory table offset inside the table blob.
    pub directory_table_start: u64,
    /// Code page of the names.
    pub char_code_format: u32,
    /// `FLAG_*` bits.
    pub flags: u32,
    /// Huffman block setting.
    pub huffman_block: HuffmanBlock,
    /// Reserved bytes, preserved as read.
    pub reserved: [u8; 14],
}

impl ArchiveHeader {
    /// Recognise a DX archive from its first bytes without validating the rest.
    pub fn probe(bytes: &[u8]) -> Option<HeaderKind> {
        if bytes.len() < 4 {
            return None;
        }
        HeaderKind::detect(read_u16(bytes, 0), read_u16(bytes, 2))
    }

    /// Parse and validate a header.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = read_u16(bytes, 0);
        let version = read_u16(bytes, 2);

        if magic != DXA_MAGIC {
            return Err(DxArcError::invalid_magic(
                DXA_MAGIC.to_le_bytes(),
                magic.to_le_bytes(),
            ));
        }
        let kind = HeaderKind::detect(magic, version).ok_or_else(|| {
            let supported = HeaderKind::ALL
                .iter()
                .flat_map(|kind| [*kind.versions().start(), *kind.versions().end()]);
            let min = supported.clone().min().unwrap_or(DXA_VERSION);
            let max = supported.max().unwrap_or(DXA_VERSION);
            DxArcError::unsupported_version(version, min, max)
        })?;

        let head_size = read_u32(bytes, 4);
        if head_size == 0 {
            return Err(DxArcError::invalid_header("table blob size is zero"));
        }

        let mut reserved = [0u8; 14];
        reserved.copy_from_slice(&bytes[49..63]);

        Ok(Self {
            kind,
            version,
            head_size,
            data_start: read_u64(bytes, 8),
            name_table_start: read_u64(bytes, 16),
            file_table_start: read_u64(bytes, 24),
            directory_table_start: read_u64(bytes, 32),
            char_code_format: read_u32(bytes, 40),
            flags: read_u32(bytes, 44),
            huffman_block: HuffmanBlock::from_byte(bytes[48]),
            reserved,
        })
    }

    /// Read and validate a header from `reader`.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes)?;
        Self::parse(&bytes)
    }

    /// Encode the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.kind.magic().to_le_bytes());
        bytes[2..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.head_size.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.data_start.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.name_table_start.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.file_table_start.to_le_bytes());
        bytes[32..40].copy_from_slice(&self.directory_table_start.to_le_bytes());
        bytes[40..44].copy_from_slice(&self.char_code_format.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.flags.to_le_bytes());
        bytes[48] = self.huffman_block.to_byte();
        bytes[49..63].copy_from_slice(&self.reserved);
        bytes
    }

    /// Write the encoded header.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Whether payloads and tables are XOR encrypted.
    pub fn is_keyed(&self) -> bool {
        self.flags & FLAG_NO_KEY == 0
    }

    /// Whether the table blob is LZ/Huffman compressed.
    pub fn is_header_compressed(&self) -> bool {
        self.flags & FLAG_NO_HEAD_PRESS == 0
    }

    /// Name encoding implied by the code page.
    pub fn name_encoding(&self) -> NameEncoding {
        NameEncoding::from_code_page(self.char_code_format)
    }
}
