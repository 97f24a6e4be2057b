//! Error types for DxArc operations.
//!
//! Every crate in the workspace reports failures through [`DxArcError`].
//! Variants fall into a handful of classes, exposed through
//! [`DxArcError::kind`], so callers can decide whether a failure aborts the
//! whole archive or only the file being extracted.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a [`DxArcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown magic, unsupported version or malformed header/table structure.
    Format,
    /// A declared size or offset disagrees with the data actually present.
    Size,
    /// Failure of the underlying reader or writer.
    Io,
    /// Compressed payload cannot be decoded.
    DecodeCorruption,
    /// The caller asked for something the archive cannot provide.
    Usage,
}

/// The main error type for DxArc operations.
#[derive(Debug, Error)]
pub enum DxArcError {
    /// The underlying stream failed.
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    /// The first header bytes are not a known archive signature.
    #[error("Bad archive signature {found:02x?} (wanted {expected:02x?})")]
    InvalidMagic {
        /// Signature of the supported format.
        expected: Vec<u8>,
        /// Bytes read from the stream.
        found: Vec<u8>,
    },

    /// Archive version outside the supported range.
    #[error("Unsupported archive version {version} (supported {min}..={max})")]
    UnsupportedVersion {
        /// Version found in the header.
        version: u16,
        /// Lowest supported version.
        min: u16,
        /// Highest supported version.
        max: u16,
    },

    /// The header or the tables are malformed.
    #[error("Malformed archive structure: {message}")]
    InvalidHeader {
        /// What is wrong.
        message: String,
    },

    /// A declared size does not match the data.
    #[error("Size mismatch in {context}: declared {declared}, actual {actual}")]
    SizeMismatch {
        /// What was being measured.
        context: String,
        /// Size recorded in the archive.
        declared: u64,
        /// Size actually observed.
        actual: u64,
    },

    /// A record lies outside the table that should contain it.
    #[error("Record at offset {offset} is outside the {table} table ({len} bytes)")]
    TableOutOfBounds {
        /// Table name ("name", "file" or "directory").
        table: &'static str,
        /// Offset of the record inside the table.
        offset: u64,
        /// Length of the table.
        len: u64,
    },

    /// A compressed stream is malformed.
    #[error("Corrupt stream at byte {offset}: {message}")]
    CorruptedData {
        /// Position in the stream.
        offset: u64,
        /// What is wrong.
        message: String,
    },

    /// Input ended early.
    #[error("Stream truncated: {expected} more bytes needed")]
    UnexpectedEof {
        /// Missing byte count.
        expected: usize,
    },

    /// An LZ back-reference points before the start of the output.
    #[error("Back-reference distance {distance} reaches past {history_size} decoded bytes")]
    InvalidDistance {
        /// Distance of the reference.
        distance: usize,
        /// Bytes produced so far.
        history_size: usize,
    },

    /// A destination buffer cannot hold the decoded data.
    #[error("Destination holds {available} bytes but {needed} are required")]
    BufferTooSmall {
        /// Required length.
        needed: usize,
        /// Length provided.
        available: usize,
    },

    /// Path traversal attempt (e.g. a ".." component in an entry name).
    #[error("Archive path escapes the output directory: {path}")]
    PathTraversal {
        /// The suspicious path.
        path: String,
    },

    /// No file with this path exists in the archive.
    #[error("No such file in archive: {name}")]
    EntryNotFound {
        /// Requested path.
        name: String,
    },

    /// The same path was added to an archive twice.
    #[error("Duplicate entry: {name}")]
    DuplicateEntry {
        /// The repeated archive path.
        name: String,
    },

    /// Name could not be converted to or from the archive code page.
    #[error("Name encoding failed: {message}")]
    EncodingError {
        /// Offending name and reason.
        message: String,
    },

    /// An error tied to a specific archive member.
    #[error("{}: {source}", path.display())]
    InFile {
        /// Archive member that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<DxArcError>,
    },
}

/// Result type alias for DxArc operations.
pub type Result<T> = std::result::Result<T, DxArcError>;

impl DxArcError {
    /// Signature mismatch.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Version outside `min..=max`.
    pub fn unsupported_version(version: u16, min: u16, max: u16) -> Self {
        Self::UnsupportedVersion { version, min, max }
    }

    /// Malformed header or table.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Declared and observed sizes differ.
    pub fn size_mismatch(context: impl Into<String>, declared: u64, actual: u64) -> Self {
        Self::SizeMismatch {
            context: context.into(),
            declared,
            actual,
        }
    }

    /// Record outside `table`.
    pub fn table_out_of_bounds(table: &'static str, offset: u64, len: usize) -> Self {
        Self::TableOutOfBounds {
            table,
            offset,
            len: len as u64,
        }
    }

    /// Malformed compressed stream.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Input ended `expected` bytes early.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Back-reference beyond the decoded history.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Destination shorter than the decoded size.
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }

    /// Path that would leave the output root.
    pub fn path_traversal(path: impl Into<String>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Lookup miss.
    pub fn entry_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound { name: name.into() }
    }

    /// Path added twice.
    pub fn duplicate_entry(name: impl Into<String>) -> Self {
        Self::DuplicateEntry { name: name.into() }
    }

    /// Name that cannot be encoded or decoded.
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Attach the archive member path to this error.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidMagic { .. }
            | Self::UnsupportedVersion { .. }
            | Self::InvalidHeader { .. }
            | Self::EncodingError { .. } => ErrorKind::Format,
            Self::SizeMismatch { .. }
            | Self::TableOutOfBounds { .. }
            | Self::BufferTooSmall { .. } => ErrorKind::Size,
            Self::CorruptedData { .. }
            | Self::UnexpectedEof { .. }
            | Self::InvalidDistance { .. } => ErrorKind::DecodeCorruption,
            Self::PathTraversal { .. } | Self::EntryNotFound { .. } | Self::DuplicateEntry { .. } => {
                ErrorKind::Usage
            }
            Self::InFile { source, .. } => source.kind(),
        }
    }
}
