//! DX archive reader.

use crate::config::ReadConfig;
use crate::header::{ArchiveHeader, HEADER_SIZE, HuffmanBlock};
use crate::key::{ArchiveKey, KeyStringBuffer, apply_keystream};
use crate::names::{NameEncoding, NameEntry};
use crate::table::{DirectoryEntry, FILE_HEAD_SIZE, FileHeadEntry, FileTimes};
use dxarc_core::error::{DxArcError, ErrorKind, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Working buffer size for payloads stored without compression.
pub const DXA_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// A file found while walking the directory tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    /// Output path (output root joined with the archive path).
    pub path: PathBuf,
    /// Path inside the archive, `/` separated.
    pub archive_path: String,
    /// Payload offset from the start of the archive.
    pub data_start: u64,
    /// Uncompressed size.
    pub data_size: u64,
    /// LZ stream size, if LZ compressed.
    pub lz_size: Option<u64>,
    /// Huffman stream size, if Huffman compressed.
    pub huffman_size: Option<u64>,
    /// Bytes the payload occupies in the archive.
    pub stored_size: u64,
    /// Timestamps.
    pub times: FileTimes,
    /// Attribute bits.
    pub attributes: u64,
    /// Per-file key, absent for unkeyed archives.
    pub key: Option<ArchiveKey>,
}

impl ArchivedFile {
    /// Whether the payload is LZ compressed.
    pub fn is_compressed(&self) -> bool {
        self.lz_size.is_some()
    }

    /// Whether the payload is Huffman compressed.
    pub fn is_huffman_compressed(&self) -> bool {
        self.huffman_size.is_some()
    }

    /// Short method label used in listings.
    pub fn method(&self) -> &'static str {
        match (self.is_compressed(), self.is_huffman_compressed()) {
            (true, true) => "lz+huff",
            (true, false) => "lz",
            (false, true) => "huff",
            (false, false) => "stored",
        }
    }
}

/// Outcome of [`DxArchiveReader::extract_all`].
#[derive(Debug, Default)]
pub struct ExtractReport {
    /// Files written.
    pub extracted: Vec<PathBuf>,
    /// Total bytes written.
    pub bytes_written: u64,
    /// Files that could not be decoded, with the reason.
    pub failed: Vec<(PathBuf, DxArcError)>,
}

impl ExtractReport {
    /// Whether every file was extracted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reader over a DX archive.
///
/// Opening parses the header and tables; payloads are read on demand.
pub struct DxArchiveReader<R: Read + Seek> {
    reader: R,
    base: u64,
    archive_len: u64,
    header: ArchiveHeader,
    files: Vec<ArchivedFile>,
    output_root: PathBuf,
}

impl DxArchiveReader<BufReader<File>> {
    /// Open an archive file.
    pub fn open_path(path: impl AsRef<Path>, config: ReadConfig) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(DxArcError::from)
            .and_then(|file| Self::open(BufReader::new(file), config))
            .map_err(|e| e.in_file(path))
    }
}

impl<R: Read + Seek> DxArchiveReader<R> {
    /// Parse the archive starting at the current position of `reader`.
    pub fn open(mut reader: R, config: ReadConfig) -> Result<Self> {
        let base = reader.stream_position()?;
        let header = ArchiveHeader::read(&mut reader)?;
        let archive_len = reader.seek(SeekFrom::End(0))?.saturating_sub(base);

        let key_string = config.key_string();
        let archive_key = header.is_keyed().then(|| ArchiveKey::create(&key_string));
        let blob = read_table_blob(&mut reader, base, archive_len, &header, archive_key.as_ref())?;

        let encoding = config
            .name_encoding
            .unwrap_or_else(|| header.name_encoding());
        let walker = Walker::new(&blob, &header, encoding, &config, &key_string)?;
        let files = walker.walk()?;

        debug!(
            "Opened DX archive v{}: {} files, table blob {} bytes, keyed={}",
            header.version,
            files.len(),
            header.head_size,
            header.is_keyed()
        );

        Ok(Self {
            reader,
            base,
            archive_len,
            header,
            files,
            output_root: config.output_root,
        })
    }

    /// Parsed header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Files in directory-walk order.
    pub fn files(&self) -> &[ArchivedFile] {
        &self.files
    }

    /// Look up a file by archive path, falling back to an ASCII
    /// case-insensitive match.
    pub fn find(&self, archive_path: &str) -> Option<&ArchivedFile> {
        let wanted = archive_path.trim_start_matches('/').replace('\\', "/");
        self.files
            .iter()
            .find(|file| file.archive_path == wanted)
            .or_else(|| {
                self.files
                    .iter()
                    .find(|file| file.archive_path.eq_ignore_ascii_case(&wanted))
            })
    }

    /// Output root the file paths were resolved against.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Extract a file into memory.
    pub fn extract(&mut self, file: &ArchivedFile) -> Result<Vec<u8>> {
        let capacity = usize::try_from(file.data_size)
            .unwrap_or(usize::MAX)
            .min(DXA_BUFFER_SIZE);
        let mut out = Vec::with_capacity(capacity);
        self.extract_to(file, &mut out)?;
        Ok(out)
    }

    /// Extract a file into `writer`, returning the number of bytes written.
    pub fn extract_to<W: Write>(&mut self, file: &ArchivedFile, writer: &mut W) -> Result<u64> {
        self.extract_inner(file, writer)
            .map_err(|e| e.in_file(&file.archive_path))
    }

    fn extract_inner<W: Write>(&mut self, file: &ArchivedFile, writer: &mut W) -> Result<u64> {
        if file.data_size == 0 {
            return Ok(0);
        }

        let end = file.data_start.checked_add(file.stored_size);
        if end.is_none_or(|end| end > self.archive_len) {
            return Err(DxArcError::size_mismatch(
                "payload extent",
                file.data_start.saturating_add(file.stored_size),
                self.archive_len,
            ));
        }

        trace!(
            "Extracting {} ({} -> {} bytes, {})",
            file.archive_path,
            file.stored_size,
            file.data_size,
            file.method()
        );

        let key = file.key.as_ref();
        let data_size = to_usize(file.data_size, "data size")?;

        let stage = match (file.huffman_size, file.lz_size) {
            (Some(huffman_size), lz_size) => {
                let pre_len = to_usize(lz_size.unwrap_or(file.data_size), "pre-Huffman size")?;
                let mut payload =
                    self.read_at(file.data_start, to_usize(huffman_size, "Huffman size")?)?;
                apply_keystream(&mut payload, file.data_size, key);
                let stage = dxarc_huffman::decode(&payload)?;
                self.restore_split(file, huffman_size, pre_len, stage)?
            }
            (None, Some(lz_size)) => {
                let mut payload = self.read_at(file.data_start, to_usize(lz_size, "LZ size")?)?;
                apply_keystream(&mut payload, file.data_size, key);
                payload
            }
            (None, None) => return self.stream_raw(file, writer),
        };

        let mut out = if file.is_compressed() {
            dxarc_lz::decode(&stage)?
        } else {
            stage
        };
        if out.len() < data_size {
            return Err(DxArcError::size_mismatch(
                "decoded payload",
                file.data_size,
                out.len() as u64,
            ));
        }
        out.truncate(data_size);

        writer.write_all(&out)?;
        Ok(file.data_size)
    }

    /// Reassemble a payload whose middle region was stored outside the
    /// Huffman stream.
    fn restore_split(
        &mut self,
        file: &ArchivedFile,
        huffman_size: u64,
        pre_len: usize,
        mut stage: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let Some(middle) = self.header.huffman_block.middle_len(pre_len) else {
            if stage.len() != pre_len {
                return Err(DxArcError::size_mismatch(
                    "Huffman stream",
                    pre_len as u64,
                    stage.len() as u64,
                ));
            }
            return Ok(stage);
        };

        let block = (pre_len - middle) / 2;
        if stage.len() != block * 2 {
            return Err(DxArcError::size_mismatch(
                "split Huffman stream",
                (block * 2) as u64,
                stage.len() as u64,
            ));
        }

        stage.resize(pre_len, 0);
        stage.copy_within(block..block * 2, pre_len - block);

        let mut raw = self.read_at(file.data_start + huffman_size, middle)?;
        apply_keystream(&mut raw, file.data_size + huffman_size, file.key.as_ref());
        stage[block..pre_len - block].copy_from_slice(&raw);
        Ok(stage)
    }

    fn stream_raw<W: Write>(&mut self, file: &ArchivedFile, writer: &mut W) -> Result<u64> {
        self.reader
            .seek(SeekFrom::Start(self.base + file.data_start))?;
        let mut buffer = vec![0u8; to_usize(file.data_size, "data size")?.min(DXA_BUFFER_SIZE)];
        let mut offset = 0u64;

        while offset < file.data_size {
            let chunk = (file.data_size - offset).min(buffer.len() as u64) as usize;
            let buffer = &mut buffer[..chunk];
            self.reader.read_exact(buffer)?;
            apply_keystream(buffer, file.data_size + offset, file.key.as_ref());
            writer.write_all(buffer)?;
            offset += chunk as u64;
        }
        Ok(offset)
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(self.base + offset))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Extract a file beneath the output root, creating parent directories.
    ///
    /// A partially written file is removed when extraction fails.
    pub fn extract_file_to_disk(&mut self, file: &ArchivedFile) -> Result<PathBuf> {
        let target = safe_output_path(&self.output_root, &file.archive_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = BufWriter::new(File::create(&target)?);
        let result = self
            .extract_to(file, &mut out)
            .and_then(|_| out.flush().map_err(DxArcError::from));
        drop(out);

        if let Err(e) = result {
            if let Err(remove) = fs::remove_file(&target) {
                warn!("Could not remove partial file {}: {}", target.display(), remove);
            }
            return Err(e);
        }
        Ok(target)
    }

    /// Extract every file beneath the output root.
    ///
    /// I/O errors abort; any other failure is recorded in the report and the
    /// remaining files are still extracted.
    pub fn extract_all(&mut self) -> Result<ExtractReport> {
        let mut report = ExtractReport::default();
        let files = self.files.clone();

        for file in &files {
            match self.extract_file_to_disk(file) {
                Ok(path) => {
                    report.bytes_written += file.data_size;
                    report.extracted.push(path);
                }
                Err(e) if e.kind() == ErrorKind::Io => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", file.archive_path, e);
                    report.failed.push((file.path.clone(), e));
                }
            }
        }

        debug!(
            "Extracted {} files ({} bytes), {} failed",
            report.extracted.len(),
            report.bytes_written,
            report.failed.len()
        );
        Ok(report)
    }

    /// Consume the reader and return the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn to_usize(value: u64, context: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| DxArcError::size_mismatch(context, value, usize::MAX as u64))
}

/// Join an archive path onto `root`, rejecting components that would
/// escape it.
pub fn safe_output_path(root: &Path, archive_path: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for component in archive_path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => return Err(DxArcError::path_traversal(archive_path)),
            c if c.contains(':') => return Err(DxArcError::path_traversal(archive_path)),
            c => path.push(c),
        }
    }
    if path == root {
        return Err(DxArcError::path_traversal(archive_path));
    }
    Ok(path)
}

fn read_table_blob<R: Read + Seek>(
    reader: &mut R,
    base: u64,
    archive_len: u64,
    header: &ArchiveHeader,
    key: Option<&ArchiveKey>,
) -> Result<Vec<u8>> {
    let start = header.name_table_start;
    if start < HEADER_SIZE as u64 || start > archive_len {
        return Err(DxArcError::size_mismatch(
            "name table start",
            start,
            archive_len,
        ));
    }
    reader.seek(SeekFrom::Start(base + start))?;

    if header.is_header_compressed() {
        let mut packed = vec![0u8; to_usize(archive_len - start, "table blob")?];
        reader.read_exact(&mut packed)?;
        apply_keystream(&mut packed, 0, key);

        let lz = dxarc_huffman::decode(&packed)?;
        let blob = dxarc_lz::decode(&lz)?;
        if blob.len() != header.head_size as usize {
            return Err(DxArcError::size_mismatch(
                "table blob",
                header.head_size as u64,
                blob.len() as u64,
            ));
        }
        trace!(
            "Table blob: {} packed -> {} LZ -> {} bytes",
            packed.len(),
            lz.len(),
            blob.len()
        );
        Ok(blob)
    } else {
        let end = start + header.head_size as u64;
        if end > archive_len {
            return Err(DxArcError::size_mismatch("table blob", end, archive_len));
        }
        let mut blob = vec![0u8; header.head_size as usize];
        reader.read_exact(&mut blob)?;
        apply_keystream(&mut blob, 0, key);
        Ok(blob)
    }
}

/// Walks the directory table, producing one [`ArchivedFile`] per file.
struct Walker<'a> {
    names: &'a [u8],
    file_table: &'a [u8],
    directory_table: &'a [u8],
    encoding: NameEncoding,
    key_string: Option<&'a [u8]>,
    data_start: u64,
    huffman_block: HuffmanBlock,
    output_root: &'a Path,
    visited: HashSet<u64>,
    files: Vec<ArchivedFile>,
}

/// An ancestor directory: decoded name and upper-cased key bytes.
struct Ancestor<'a> {
    name: String,
    upper: &'a [u8],
}

impl<'a> Walker<'a> {
    fn new(
        blob: &'a [u8],
        header: &ArchiveHeader,
        encoding: NameEncoding,
        config: &'a ReadConfig,
        key_string: &'a [u8],
    ) -> Result<Self> {
        let head_size = blob.len() as u64;
        if header.directory_table_start > head_size {
            return Err(DxArcError::size_mismatch(
                "directory table start",
                header.directory_table_start,
                head_size,
            ));
        }
        if header.file_table_start > header.directory_table_start {
            return Err(DxArcError::size_mismatch(
                "file table start",
                header.file_table_start,
                header.directory_table_start,
            ));
        }

        let file_start = header.file_table_start as usize;
        let directory_start = header.directory_table_start as usize;
        Ok(Self {
            names: &blob[..file_start],
            file_table: &blob[file_start..directory_start],
            directory_table: &blob[directory_start..],
            encoding,
            key_string: header.is_keyed().then_some(key_string),
            data_start: header.data_start,
            huffman_block: header.huffman_block,
            output_root: &config.output_root,
            visited: HashSet::new(),
            files: Vec::new(),
        })
    }

    fn walk(mut self) -> Result<Vec<ArchivedFile>> {
        self.visited.insert(0);
        let root = DirectoryEntry::parse(self.directory_table, 0)?;
        let mut chain = Vec::new();
        self.visit(&root, &mut chain)?;
        Ok(self.files)
    }

    fn visit(&mut self, dir: &DirectoryEntry, chain: &mut Vec<Ancestor<'a>>) -> Result<()> {
        for index in 0..dir.child_count {
            let offset = index
                .checked_mul(FILE_HEAD_SIZE as u64)
                .and_then(|o| o.checked_add(dir.first_child_offset))
                .ok_or_else(|| {
                    DxArcError::table_out_of_bounds("file", u64::MAX, self.file_table.len())
                })?;
            let entry = FileHeadEntry::parse(self.file_table, offset)?;
            let name = NameEntry::parse(self.names, entry.name_offset)?;

            if entry.is_directory() {
                if !self.visited.insert(entry.data_offset) {
                    return Err(DxArcError::invalid_header(format!(
                        "directory cycle at directory table offset {}",
                        entry.data_offset
                    )));
                }
                let child = DirectoryEntry::parse(self.directory_table, entry.data_offset)?;
                chain.push(Ancestor {
                    name: name.name(self.encoding),
                    upper: name.upper,
                });
                self.visit(&child, chain)?;
                chain.pop();
            } else {
                let file = self.archived_file(&entry, &name, chain);
                trace!("Found {} ({} bytes)", file.archive_path, file.data_size);
                self.files.push(file);
            }
        }
        Ok(())
    }

    fn archived_file(
        &self,
        entry: &FileHeadEntry,
        name: &NameEntry<'a>,
        chain: &[Ancestor<'a>],
    ) -> ArchivedFile {
        let file_name = name.name(self.encoding);
        let mut path = self.output_root.to_path_buf();
        let mut archive_path = String::new();
        for ancestor in chain {
            path.push(&ancestor.name);
            archive_path.push_str(&ancestor.name);
            archive_path.push('/');
        }
        path.push(&file_name);
        archive_path.push_str(&file_name);

        let key = self.key_string.map(|key_string| {
            let mut source = KeyStringBuffer::new(key_string);
            source.push(name.upper);
            for ancestor in chain.iter().rev() {
                source.push(ancestor.upper);
            }
            source.derive()
        });

        let stored_size = match (entry.huffman_size, entry.lz_size) {
            (Some(huffman_size), lz_size) => {
                let pre_len = lz_size.unwrap_or(entry.data_size);
                let middle = usize::try_from(pre_len)
                    .ok()
                    .and_then(|len| self.huffman_block.middle_len(len))
                    .unwrap_or(0);
                huffman_size.saturating_add(middle as u64)
            }
            (None, Some(lz_size)) => lz_size,
            (None, None) => entry.data_size,
        };

        ArchivedFile {
            path,
            archive_path,
            data_start: self.data_start.saturating_add(entry.data_offset),
            data_size: entry.data_size,
            lz_size: entry.lz_size,
            huffman_size: entry.huffman_size,
            stored_size,
            times: entry.times,
            attributes: entry.attributes,
            key,
        }
    }
}
