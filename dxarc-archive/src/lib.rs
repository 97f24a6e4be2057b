//! # DxArc Archive
//!
//! Reader and writer for DX archives (`.dxa`, `.wolf`), the container used
//! by DxLib-based games.
//!
//! An archive stores a directory tree of files. Each payload is optionally
//! LZ compressed, optionally Huffman compressed and optionally XOR
//! encrypted with a key derived from the key string and the file's path.
//!
//! ```text
//! ┌──────────────┐ 0
//! │ header (64)  │
//! ├──────────────┤ data_start
//! │ payloads     │
//! ├──────────────┤ name_table_start
//! │ table blob   │ names ++ file table ++ directory table
//! └──────────────┘ (LZ + Huffman compressed, encrypted at position 0)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use dxarc_archive::{DxArchiveReader, DxArchiveWriter, FileTimes, ReadConfig, WriteConfig};
//! use std::io::Cursor;
//!
//! let config = WriteConfig::new().with_key("secret");
//! let mut writer = DxArchiveWriter::new(Cursor::new(Vec::new()), config).unwrap();
//! writer
//!     .add_file("data/readme.txt", b"Hello, DX archive!", FileTimes::default())
//!     .unwrap();
//! let archive = writer.finish().unwrap();
//!
//! let mut reader = DxArchiveReader::open(archive, ReadConfig::new().with_key("secret")).unwrap();
//! let file = reader.find("data/readme.txt").unwrap().clone();
//! assert_eq!(reader.extract(&file).unwrap(), b"Hello, DX archive!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod header;
pub mod key;
pub mod names;
pub mod reader;
pub mod table;
pub mod tree;
pub mod writer;

// Re-exports
pub use config::{ReadConfig, WriteConfig};
pub use header::{ArchiveHeader, HeaderKind, HuffmanBlock};
pub use key::{ArchiveKey, KeyStringBuffer};
pub use names::NameEncoding;
pub use reader::{ArchivedFile, DxArchiveReader, ExtractReport};
pub use table::FileTimes;
pub use writer::{DxArchiveWriter, create_archive, create_archive_with};

use dxarc_core::error::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Open the archive at `path`, resolving output paths against `output_root`.
///
/// `key` of `None` selects the default key string.
pub fn load(
    path: impl AsRef<Path>,
    output_root: impl Into<PathBuf>,
    key: Option<&[u8]>,
) -> Result<DxArchiveReader<BufReader<File>>> {
    let mut config = ReadConfig::new().with_output_root(output_root);
    if let Some(key) = key {
        config = config.with_key(key);
    }
    DxArchiveReader::open_path(path, config)
}
