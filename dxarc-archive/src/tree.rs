//! In-memory directory tree built while writing an archive.
//!
//! The tree is serialized into the table blob once all payloads are known:
//!
//! ```text
//! name table       one entry per distinct name, first occurrence wins
//! file table       per directory (creation order): sub-directories, then files
//! directory table  one record per directory, root first
//! ```

use crate::key::KeyStringBuffer;
use crate::names::{NameEncoding, write_name_entry};
use crate::table::{
    ATTRIBUTE_ARCHIVE, ATTRIBUTE_DIRECTORY, DIRECTORY_SIZE, DirectoryEntry, FILE_HEAD_SIZE,
    FileHeadEntry, FileTimes,
};
use dxarc_core::error::{DxArcError, Result};
use std::collections::HashMap;

/// Root directory index.
pub const ROOT: usize = 0;

/// Where a file's payload landed and how it was compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Payload {
    /// Offset relative to the archive data start.
    pub data_offset: u64,
    /// Uncompressed size.
    pub data_size: u64,
    /// LZ stream size, if LZ compressed.
    pub lz_size: Option<u64>,
    /// Huffman stream size, if Huffman compressed.
    pub huffman_size: Option<u64>,
}

#[derive(Debug, Clone)]
struct DirNode {
    name: Vec<u8>,
    times: FileTimes,
    parent: Option<usize>,
    subdirs: Vec<usize>,
    files: Vec<usize>,
}

#[derive(Debug, Clone)]
struct FileNode {
    name: Vec<u8>,
    dir: usize,
    times: FileTimes,
    payload: Payload,
}

/// Serialized tables and their offsets inside the blob.
#[derive(Debug, Clone)]
pub struct TableBlob {
    /// Name table, file table and directory table, concatenated.
    pub bytes: Vec<u8>,
    /// File table offset inside `bytes`.
    pub file_table_start: u64,
    /// Directory table offset inside `bytes`.
    pub directory_table_start: u64,
}

/// Directory tree of an archive under construction.
#[derive(Debug, Clone)]
pub struct DirTree {
    encoding: NameEncoding,
    dirs: Vec<DirNode>,
    files: Vec<FileNode>,
}

impl DirTree {
    /// Empty tree holding only the root.
    pub fn new(encoding: NameEncoding) -> Self {
        Self {
            encoding,
            dirs: vec![DirNode {
                name: Vec::new(),
                times: FileTimes::default(),
                parent: None,
                subdirs: Vec::new(),
                files: Vec::new(),
            }],
            files: Vec::new(),
        }
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of directories, root included.
    pub fn directory_count(&self) -> usize {
        self.dirs.len()
    }

    /// Split an archive path into encoded components.
    ///
    /// Both `/` and `\` separate components; empty and `.` components are
    /// dropped and `..` is rejected.
    pub fn split_path(&self, path: &str) -> Result<Vec<Vec<u8>>> {
        let mut components = Vec::new();
        for part in path.split(['/', '\\']) {
            match part {
                "" | "." => {}
                ".." => return Err(DxArcError::path_traversal(path)),
                part => components.push(self.encoding.encode(part)?),
            }
        }
        Ok(components)
    }

    fn find_subdir(&self, dir: usize, upper: &[u8]) -> Option<usize> {
        self.dirs[dir]
            .subdirs
            .iter()
            .copied()
            .find(|&sub| self.encoding.to_upper(&self.dirs[sub].name) == upper)
    }

    fn has_file(&self, dir: usize, upper: &[u8]) -> bool {
        self.dirs[dir]
            .files
            .iter()
            .any(|&file| self.encoding.to_upper(&self.files[file].name) == upper)
    }

    fn display(&self, name: &[u8]) -> String {
        self.encoding.decode(name)
    }

    /// Find or create the directory at `components`, returning its index.
    ///
    /// `times` is applied to the innermost directory when given.
    pub fn directory(&mut self, components: &[Vec<u8>], times: Option<FileTimes>) -> Result<usize> {
        let mut dir = ROOT;
        for component in components {
            let upper = self.encoding.to_upper(component);
            if self.has_file(dir, &upper) {
                return Err(DxArcError::duplicate_entry(self.display(component)));
            }
            dir = match self.find_subdir(dir, &upper) {
                Some(sub) => sub,
                None => {
                    let index = self.dirs.len();
                    self.dirs.push(DirNode {
                        name: component.clone(),
                        times: FileTimes::default(),
                        parent: Some(dir),
                        subdirs: Vec::new(),
                        files: Vec::new(),
                    });
                    self.dirs[dir].subdirs.push(index);
                    index
                }
            };
        }
        if let Some(times) = times {
            self.dirs[dir].times = times;
        }
        Ok(dir)
    }

    /// Register a file at `path`, creating its parent directories.
    ///
    /// Names compare case-insensitively within a directory.
    pub fn add_file(&mut self, path: &str, times: FileTimes) -> Result<usize> {
        let mut components = self.split_path(path)?;
        let name = components.pop().ok_or_else(|| {
            DxArcError::encoding_error(format!("archive path {path:?} has no file name"))
        })?;
        let dir = self.directory(&components, None)?;

        let upper = self.encoding.to_upper(&name);
        if self.has_file(dir, &upper) || self.find_subdir(dir, &upper).is_some() {
            return Err(DxArcError::duplicate_entry(path));
        }

        let index = self.files.len();
        self.files.push(FileNode {
            name,
            dir,
            times,
            payload: Payload::default(),
        });
        self.dirs[dir].files.push(index);
        Ok(index)
    }

    /// Record where the payload of `file` was written.
    pub fn set_payload(&mut self, file: usize, payload: Payload) {
        self.files[file].payload = payload;
    }

    /// Key source for `file`: key string, file name, then each ancestor
    /// below the root, innermost first. All names upper-cased.
    pub fn key_source(&self, file: usize, key_string: &[u8]) -> KeyStringBuffer {
        let node = &self.files[file];
        let mut source = KeyStringBuffer::new(key_string);
        source.push(&self.encoding.to_upper(&node.name));

        let mut dir = node.dir;
        while let Some(parent) = self.dirs[dir].parent {
            source.push(&self.encoding.to_upper(&self.dirs[dir].name));
            dir = parent;
        }
        source
    }

    /// Serialize the name, file and directory tables.
    pub fn serialize(&self) -> Result<TableBlob> {
        let mut block_start = Vec::with_capacity(self.dirs.len());
        let mut cursor = 0u64;
        for dir in &self.dirs {
            block_start.push(cursor);
            cursor += ((dir.subdirs.len() + dir.files.len()) * FILE_HEAD_SIZE) as u64;
        }

        let mut self_offset = vec![None; self.dirs.len()];
        for (index, dir) in self.dirs.iter().enumerate() {
            for (position, &sub) in dir.subdirs.iter().enumerate() {
                self_offset[sub] = Some(block_start[index] + (position * FILE_HEAD_SIZE) as u64);
            }
        }

        let mut names = Vec::new();
        let mut interned: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut name_offset = |name: &[u8], names: &mut Vec<u8>| -> Result<u64> {
            if let Some(&offset) = interned.get(name) {
                return Ok(offset);
            }
            let offset = names.len() as u64;
            write_name_entry(names, name, self.encoding)?;
            interned.insert(name.to_vec(), offset);
            Ok(offset)
        };

        let mut file_table = Vec::with_capacity(cursor as usize);
        for dir in &self.dirs {
            for &sub in &dir.subdirs {
                let node = &self.dirs[sub];
                FileHeadEntry {
                    name_offset: name_offset(&node.name, &mut names)?,
                    attributes: ATTRIBUTE_DIRECTORY,
                    times: node.times,
                    data_offset: (sub * DIRECTORY_SIZE) as u64,
                    data_size: 0,
                    lz_size: None,
                    huffman_size: None,
                }
                .write_to(&mut file_table);
            }
            for &file in &dir.files {
                let node = &self.files[file];
                FileHeadEntry {
                    name_offset: name_offset(&node.name, &mut names)?,
                    attributes: ATTRIBUTE_ARCHIVE,
                    times: node.times,
                    data_offset: node.payload.data_offset,
                    data_size: node.payload.data_size,
                    lz_size: node.payload.lz_size,
                    huffman_size: node.payload.huffman_size,
                }
                .write_to(&mut file_table);
            }
        }

        let mut directory_table = Vec::with_capacity(self.dirs.len() * DIRECTORY_SIZE);
        for (index, dir) in self.dirs.iter().enumerate() {
            DirectoryEntry {
                self_offset: self_offset[index],
                parent_offset: dir.parent.map(|parent| (parent * DIRECTORY_SIZE) as u64),
                child_count: (dir.subdirs.len() + dir.files.len()) as u64,
                first_child_offset: block_start[index],
            }
            .write_to(&mut directory_table);
        }

        let file_table_start = names.len() as u64;
        let directory_table_start = file_table_start + file_table.len() as u64;
        let mut bytes = names;
        bytes.extend_from_slice(&file_table);
        bytes.extend_from_slice(&directory_table);

        Ok(TableBlob {
            bytes,
            file_table_start,
            directory_table_start,
        })
    }
}
