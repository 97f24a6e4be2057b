//! DX archive writer.

use crate::config::WriteConfig;
use crate::header::{
    ArchiveHeader, DXA_VERSION, FLAG_NO_HEAD_PRESS, FLAG_NO_KEY, HEADER_SIZE, HeaderKind,
    HuffmanBlock,
};
use crate::key::{ArchiveKey, apply_keystream};
use crate::table::FileTimes;
use crate::tree::{DirTree, Payload};
use dxarc_core::error::{DxArcError, Result};
use dxarc_lz::LzEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A payload after compression, before encryption.
struct Packed {
    bytes: Vec<u8>,
    lz_size: Option<u64>,
    huffman_size: Option<u64>,
}

/// Writer producing a DX archive.
///
/// Payloads are written as files are added; the tables and the final
/// header follow in [`finish`](Self::finish).
pub struct DxArchiveWriter<W: Write + Seek> {
    writer: W,
    base: u64,
    config: WriteConfig,
    key_string: Option<Vec<u8>>,
    encoder: LzEncoder,
    tree: DirTree,
    data_len: u64,
}

impl<W: Write + Seek> DxArchiveWriter<W> {
    /// Start an archive at the current position of `writer`.
    pub fn new(mut writer: W, config: WriteConfig) -> Result<Self> {
        let base = writer.stream_position()?;
        writer.write_all(&[0u8; HEADER_SIZE])?;

        Ok(Self {
            writer,
            base,
            key_string: config.key_string(),
            encoder: LzEncoder::with_search_depth(config.search_depth),
            tree: DirTree::new(config.name_encoding),
            config,
            data_len: 0,
        })
    }

    /// Add a file with the given contents.
    pub fn add_file(&mut self, archive_path: &str, data: &[u8], times: FileTimes) -> Result<()> {
        let slot = self.tree.add_file(archive_path, times)?;
        let key = self
            .key_string
            .as_deref()
            .map(|key_string| self.tree.key_source(slot, key_string).derive());

        let mut packed = self.pack(data)?;
        apply_keystream(&mut packed.bytes, data.len() as u64, key.as_ref());
        self.writer.write_all(&packed.bytes)?;

        trace!(
            "Added {} ({} -> {} bytes, lz={:?}, huff={:?})",
            archive_path,
            data.len(),
            packed.bytes.len(),
            packed.lz_size,
            packed.huffman_size
        );

        self.tree.set_payload(
            slot,
            Payload {
                data_offset: self.data_len,
                data_size: data.len() as u64,
                lz_size: packed.lz_size,
                huffman_size: packed.huffman_size,
            },
        );
        self.data_len += packed.bytes.len() as u64;
        Ok(())
    }

    /// Add an (possibly empty) directory.
    pub fn add_directory(&mut self, archive_path: &str, times: FileTimes) -> Result<()> {
        let components = self.tree.split_path(archive_path)?;
        self.tree.directory(&components, Some(times))?;
        Ok(())
    }

    /// Add a file or directory tree from disk under `archive_path`.
    ///
    /// Directory entries are added in file name order.
    pub fn add_path(&mut self, fs_path: impl AsRef<Path>, archive_path: &str) -> Result<()> {
        let fs_path = fs_path.as_ref();
        let metadata = fs::metadata(fs_path)?;
        let times = FileTimes::from_metadata(&metadata);

        if metadata.is_dir() {
            if !archive_path.is_empty() {
                self.add_directory(archive_path, times)?;
            }

            let mut children = fs::read_dir(fs_path)?.collect::<std::io::Result<Vec<_>>>()?;
            children.sort_by_key(|entry| entry.file_name());

            for child in children {
                let file_name = child.file_name();
                let name = file_name.to_str().ok_or_else(|| {
                    DxArcError::encoding_error(format!(
                        "{} is not valid Unicode",
                        child.path().display()
                    ))
                })?;
                let child_path = if archive_path.is_empty() {
                    name.to_string()
                } else {
                    format!("{archive_path}/{name}")
                };
                self.add_path(child.path(), &child_path)?;
            }
            Ok(())
        } else {
            debug!("Adding {} as {}", fs_path.display(), archive_path);
            let data = fs::read(fs_path)?;
            self.add_file(archive_path, &data, times)
        }
    }

    /// Number of files added so far.
    pub fn file_count(&self) -> usize {
        self.tree.file_count()
    }

    fn pack(&self, data: &[u8]) -> Result<Packed> {
        if data.is_empty() {
            return Ok(Packed {
                bytes: Vec::new(),
                lz_size: None,
                huffman_size: None,
            });
        }

        let lz = if self.config.compression {
            Some(self.encoder.encode(data)?).filter(|lz| lz.len() < data.len())
        } else {
            None
        };
        let (stage, lz_size) = match lz {
            Some(lz) => {
                let len = lz.len() as u64;
                (lz, Some(len))
            }
            None => (data.to_vec(), None),
        };

        if self.config.huffman {
            let (huffman, huffman_size) = huffman_pack(&stage, self.config.huffman_block);
            if huffman.len() < stage.len() {
                return Ok(Packed {
                    bytes: huffman,
                    lz_size,
                    huffman_size: Some(huffman_size),
                });
            }
        }

        Ok(Packed {
            bytes: stage,
            lz_size,
            huffman_size: None,
        })
    }

    /// Write the tables and the final header, returning the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let blob = self.tree.serialize()?;
        let head_size = u32::try_from(blob.bytes.len()).map_err(|_| {
            DxArcError::size_mismatch("table blob", u32::MAX as u64, blob.bytes.len() as u64)
        })?;

        let mut table = if self.config.compress_header {
            dxarc_huffman::encode(&dxarc_lz::encode(&blob.bytes)?)
        } else {
            blob.bytes
        };
        let archive_key = self.key_string.as_deref().map(ArchiveKey::create);
        apply_keystream(&mut table, 0, archive_key.as_ref());
        self.writer.write_all(&table)?;

        let mut flags = 0;
        if archive_key.is_none() {
            flags |= FLAG_NO_KEY;
        }
        if !self.config.compress_header {
            flags |= FLAG_NO_HEAD_PRESS;
        }

        let header = ArchiveHeader {
            kind: HeaderKind::V8,
            version: DXA_VERSION,
            head_size,
            data_start: HEADER_SIZE as u64,
            name_table_start: HEADER_SIZE as u64 + self.data_len,
            file_table_start: blob.file_table_start,
            directory_table_start: blob.directory_table_start,
            char_code_format: self.config.name_encoding.code_page(),
            flags,
            huffman_block: if self.config.huffman {
                self.config.huffman_block
            } else {
                HuffmanBlock::Kb(0)
            },
            reserved: [0; 14],
        };

        self.writer.seek(SeekFrom::Start(self.base))?;
        header.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        debug!(
            "Wrote DX archive: {} files, {} directories, {} payload bytes, table {} -> {} bytes",
            self.tree.file_count(),
            self.tree.directory_count() - 1,
            self.data_len,
            head_size,
            table.len()
        );

        Ok(self.writer)
    }
}

/// Huffman-code `stage`, returning the packed bytes and the Huffman stream
/// length.
///
/// With a finite block size only the first and last blocks are coded; the
/// middle follows the stream verbatim.
fn huffman_pack(stage: &[u8], block: HuffmanBlock) -> (Vec<u8>, u64) {
    match block.middle_len(stage.len()) {
        Some(middle) => {
            let edge = (stage.len() - middle) / 2;
            let mut edges = Vec::with_capacity(edge * 2);
            edges.extend_from_slice(&stage[..edge]);
            edges.extend_from_slice(&stage[stage.len() - edge..]);

            let mut out = dxarc_huffman::encode(&edges);
            let huffman_size = out.len() as u64;
            out.extend_from_slice(&stage[edge..stage.len() - edge]);
            (out, huffman_size)
        }
        None => {
            let out = dxarc_huffman::encode(stage);
            let huffman_size = out.len() as u64;
            (out, huffman_size)
        }
    }
}

/// Archive `inputs` into `output`, each under its own file name.
///
/// `key` of `None` writes an unencrypted archive.
pub fn create_archive(
    output: impl AsRef<Path>,
    inputs: &[PathBuf],
    key: Option<&[u8]>,
    use_compression: bool,
    use_huffman: bool,
) -> Result<()> {
    let mut config = WriteConfig::new()
        .with_compression(use_compression)
        .with_huffman(use_huffman);
    if let Some(key) = key {
        config = config.with_key(key);
    }

    let named = inputs
        .iter()
        .map(|input| {
            let name = input
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    DxArcError::encoding_error(format!(
                        "{} has no usable file name",
                        input.display()
                    ))
                })?;
            Ok((name.to_string(), input.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    create_archive_with(output, &named, config)
}

/// Archive `(archive path, file system path)` pairs into `output`.
pub fn create_archive_with(
    output: impl AsRef<Path>,
    inputs: &[(String, PathBuf)],
    config: WriteConfig,
) -> Result<()> {
    let output = output.as_ref();
    let build = || -> Result<()> {
        let file = BufWriter::new(File::create(output)?);
        let mut writer = DxArchiveWriter::new(file, config)?;
        for (archive_path, fs_path) in inputs {
            writer
                .add_path(fs_path, archive_path)
                .map_err(|e| e.in_file(fs_path))?;
        }
        writer.finish()?.flush()?;
        Ok(())
    };
    build().map_err(|e| e.in_file(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_backpatched() {
        let mut writer = DxArchiveWriter::new(Cursor::new(Vec::new()), WriteConfig::new()).unwrap();
        writer
            .add_file("hello.txt", b"hello hello hello hello", FileTimes::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let header = ArchiveHeader::parse(bytes[..HEADER_SIZE].try_into().unwrap()).unwrap();
        assert_eq!(header.data_start, 64);
        assert!(!header.is_keyed());
        assert!(header.is_header_compressed());
        assert!(header.name_table_start > header.data_start);
        assert!(header.name_table_start < bytes.len() as u64);
    }

    #[test]
    fn test_empty_file_uses_sentinels() {
        let writer = DxArchiveWriter::new(Cursor::new(Vec::new()), WriteConfig::new()).unwrap();
        let packed = writer.pack(b"").unwrap();
        assert!(packed.bytes.is_empty());
        assert_eq!(packed.lz_size, None);
        assert_eq!(packed.huffman_size, None);
    }

    #[test]
    fn test_incompressible_stored() {
        let mut seed = 0x1234_5678u32;
        let noise: Vec<u8> = (0..512)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                seed as u8
            })
            .collect();
        let writer = DxArchiveWriter::new(Cursor::new(Vec::new()), WriteConfig::new()).unwrap();
        let packed = writer.pack(&noise).unwrap();
        assert_eq!(packed.lz_size, None);
        assert_eq!(packed.huffman_size, None);
        assert_eq!(packed.bytes, noise);
    }

    #[test]
    fn test_split_huffman_layout() {
        let stage: Vec<u8> = b"abcd".iter().cycle().take(5000).copied().collect();
        let (packed, huffman_size) = huffman_pack(&stage, HuffmanBlock::Kb(1));
        let middle = &packed[huffman_size as usize..];
        assert_eq!(middle, &stage[1024..5000 - 1024]);
        assert_eq!(dxarc_huffman::decoded_len(&packed).unwrap(), 2048);
    }

    #[test]
    fn test_duplicate_path() {
        let mut writer = DxArchiveWriter::new(Cursor::new(Vec::new()), WriteConfig::new()).unwrap();
        writer.add_file("a.txt", b"1", FileTimes::default()).unwrap();
        assert!(matches!(
            writer.add_file("A.TXT", b"2", FileTimes::default()),
            Err(DxArcError::DuplicateEntry { .. })
        ));
    }
}
