//! File and directory records of the table blob.
//!
//! Records are addressed by byte offset into their table, never by index.
//! All integers are little-endian `u64`; `u64::MAX` marks an absent value.

use dxarc_core::error::{DxArcError, Result};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sentinel for "not applicable" offsets and sizes.
pub const SENTINEL: u64 = u64::MAX;

/// Encoded [`FileHeadEntry`] length.
pub const FILE_HEAD_SIZE: usize = 72;

/// Encoded [`DirectoryEntry`] length.
pub const DIRECTORY_SIZE: usize = 32;

/// Attribute bit of directory entries.
pub const ATTRIBUTE_DIRECTORY: u64 = 0x10;

/// Attribute written for regular files.
pub const ATTRIBUTE_ARCHIVE: u64 = 0x20;

/// 100 ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

#[inline]
pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn optional(value: u64) -> Option<u64> {
    (value != SENTINEL).then_some(value)
}

/// Slice `len` bytes at `offset` of a table, or report which table overflowed.
pub(crate) fn record<'a>(
    table: &'a [u8],
    name: &'static str,
    offset: u64,
    len: usize,
) -> Result<&'a [u8]> {
    usize::try_from(offset)
        .ok()
        .and_then(|start| table.get(start..start.checked_add(len)?))
        .ok_or_else(|| DxArcError::table_out_of_bounds(name, offset, table.len()))
}

/// Windows `FILETIME` timestamps of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileTimes {
    /// Creation time.
    pub create: u64,
    /// Last access time.
    pub last_access: u64,
    /// Last write time.
    pub last_write: u64,
}

impl FileTimes {
    /// All three timestamps set to `time`.
    pub fn uniform(time: SystemTime) -> Self {
        let value = Self::filetime_from(time);
        Self {
            create: value,
            last_access: value,
            last_write: value,
        }
    }

    /// Timestamps taken from file metadata. Missing values become zero.
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let convert = |time: std::io::Result<SystemTime>| time.map(Self::filetime_from).unwrap_or(0);
        Self {
            create: convert(metadata.created()),
            last_access: convert(metadata.accessed()),
            last_write: convert(metadata.modified()),
        }
    }

    /// Convert a `SystemTime` to a `FILETIME` value. Times before 1601 clamp to zero.
    pub fn filetime_from(time: SystemTime) -> u64 {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => FILETIME_UNIX_EPOCH.saturating_add(as_intervals(after)),
            Err(before) => FILETIME_UNIX_EPOCH.saturating_sub(as_intervals(before.duration())),
        }
    }

    /// Convert a `FILETIME` value to a `SystemTime`; zero means unset.
    pub fn to_system_time(filetime: u64) -> Option<SystemTime> {
        if filetime == 0 {
            return None;
        }
        let nanos = |intervals: u64| Duration::from_nanos(intervals.saturating_mul(100));
        if filetime >= FILETIME_UNIX_EPOCH {
            UNIX_EPOCH.checked_add(nanos(filetime - FILETIME_UNIX_EPOCH))
        } else {
            UNIX_EPOCH.checked_sub(nanos(FILETIME_UNIX_EPOCH - filetime))
        }
    }

    /// Last write time as a `SystemTime`.
    pub fn modified(&self) -> Option<SystemTime> {
        Self::to_system_time(self.last_write)
    }
}

fn as_intervals(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos() / 100).unwrap_or(u64::MAX)
}

/// One entry of the file table: a file or a directory placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeadEntry {
    /// Offset of the name entry in the name table.
    pub name_offset: u64,
    /// Attribute bits.
    pub attributes: u64,
    /// Timestamps.
    pub times: FileTimes,
    /// Payload offset relative to the data start, or the directory record
    /// offset for directories.
    pub data_offset: u64,
    /// Uncompressed size.
    pub data_size: u64,
    /// LZ stream size, if LZ compressed.
    pub lz_size: Option<u64>,
    /// Huffman stream size, if Huffman compressed.
    pub huffman_size: Option<u64>,
}

impl FileHeadEntry {
    /// Parse the entry at `offset` of the file table.
    pub fn parse(table: &[u8], offset: u64) -> Result<Self> {
        let bytes = record(table, "file", offset, FILE_HEAD_SIZE)?;
        Ok(Self {
            name_offset: read_u64(bytes, 0),
            attributes: read_u64(bytes, 8),
            times: FileTimes {
                create: read_u64(bytes, 16),
                last_access: read_u64(bytes, 24),
                last_write: read_u64(bytes, 32),
            },
            data_offset: read_u64(bytes, 40),
            data_size: read_u64(bytes, 48),
            lz_size: optional(read_u64(bytes, 56)),
            huffman_size: optional(read_u64(bytes, 64)),
        })
    }

    /// Append the encoded entry to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for value in [
            self.name_offset,
            self.attributes,
            self.times.create,
            self.times.last_access,
            self.times.last_write,
            self.data_offset,
            self.data_size,
            self.lz_size.unwrap_or(SENTINEL),
            self.huffman_size.unwrap_or(SENTINEL),
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Whether this entry is a directory placeholder.
    pub fn is_directory(&self) -> bool {
        self.attributes & ATTRIBUTE_DIRECTORY != 0
    }
}

/// One entry of the directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Offset of this directory's own entry in the file table.
    pub self_offset: Option<u64>,
    /// Offset of the parent's record in the directory table.
    pub parent_offset: Option<u64>,
    /// Number of child entries.
    pub child_count: u64,
    /// Offset of the first child entry in the file table.
    pub first_child_offset: u64,
}

impl DirectoryEntry {
    /// Parse the record at `offset` of the directory table.
    pub fn parse(table: &[u8], offset: u64) -> Result<Self> {
        let bytes = record(table, "directory", offset, DIRECTORY_SIZE)?;
        Ok(Self {
            self_offset: optional(read_u64(bytes, 0)),
            parent_offset: optional(read_u64(bytes, 8)),
            child_count: read_u64(bytes, 16),
            first_child_offset: read_u64(bytes, 24),
        })
    }

    /// Append the encoded record to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for value in [
            self.self_offset.unwrap_or(SENTINEL),
            self.parent_offset.unwrap_or(SENTINEL),
            self.child_count,
            self.first_child_offset,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Whether the directory has a name of its own (every directory but the root).
    pub fn is_named(&self) -> bool {
        self.self_offset.is_some() && self.parent_offset.is_some()
    }
}
