//! Reader and writer configuration.

use crate::header::HuffmanBlock;
use crate::key::normalize_key_string;
use crate::names::NameEncoding;
use std::path::PathBuf;

/// Options for [`DxArchiveReader`](crate::DxArchiveReader).
#[derive(Debug, Clone, Default)]
pub struct ReadConfig {
    /// Key string; `None` selects the default key string.
    pub key: Option<Vec<u8>>,
    /// Directory that extracted paths are resolved against.
    pub output_root: PathBuf,
    /// Overrides the code page stored in the header.
    pub name_encoding: Option<NameEncoding>,
}

impl ReadConfig {
    /// Default configuration extracting into the current directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key string.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the output root.
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Force a name encoding instead of the header code page.
    pub fn with_name_encoding(mut self, encoding: NameEncoding) -> Self {
        self.name_encoding = Some(encoding);
        self
    }

    /// The truncated key string, or the default one.
    pub fn key_string(&self) -> Vec<u8> {
        normalize_key_string(self.key.as_deref())
    }
}

/// Options for [`DxArchiveWriter`](crate::DxArchiveWriter).
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// Key string; `None` writes an unencrypted archive.
    pub key: Option<Vec<u8>>,
    /// LZ compress payloads.
    pub compression: bool,
    /// Huffman compress payloads.
    pub huffman: bool,
    /// Portion of each payload that is Huffman coded.
    pub huffman_block: HuffmanBlock,
    /// Compress the table blob.
    pub compress_header: bool,
    /// Encoding of stored names.
    pub name_encoding: NameEncoding,
    /// LZ match-finder search depth.
    pub search_depth: usize,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            key: None,
            compression: true,
            huffman: true,
            huffman_block: HuffmanBlock::default(),
            compress_header: true,
            name_encoding: NameEncoding::Utf8,
            search_depth: dxarc_lz::DEFAULT_SEARCH_DEPTH,
        }
    }
}

impl WriteConfig {
    /// Default configuration: unencrypted, LZ + Huffman, 16 KiB blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt with the given key string.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Enable or disable LZ compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Enable or disable Huffman compression.
    pub fn with_huffman(mut self, enabled: bool) -> Self {
        self.huffman = enabled;
        self
    }

    /// Set the Huffman block size.
    pub fn with_huffman_block(mut self, block: HuffmanBlock) -> Self {
        self.huffman_block = block;
        self
    }

    /// Enable or disable table blob compression.
    pub fn with_compress_header(mut self, enabled: bool) -> Self {
        self.compress_header = enabled;
        self
    }

    /// Set the name encoding.
    pub fn with_name_encoding(mut self, encoding: NameEncoding) -> Self {
        self.name_encoding = encoding;
        self
    }

    /// Set the LZ search depth.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Whether payloads and tables are encrypted.
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// The truncated key string, if keyed.
    pub fn key_string(&self) -> Option<Vec<u8>> {
        self.key.as_deref().map(|key| normalize_key_string(Some(key)))
    }
}
