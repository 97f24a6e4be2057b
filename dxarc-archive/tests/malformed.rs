//! Damaged and hand-crafted archives.

use dxarc_archive::header::{DXA_VERSION, FLAG_NO_HEAD_PRESS, FLAG_NO_KEY, HEADER_SIZE};
use dxarc_archive::names::write_name_entry;
use dxarc_archive::table::{ATTRIBUTE_DIRECTORY, DirectoryEntry, FileHeadEntry};
use dxarc_archive::{
    ArchiveHeader, DxArchiveReader, DxArchiveWriter, FileTimes, HeaderKind, HuffmanBlock,
    NameEncoding, ReadConfig, WriteConfig,
};
use dxarc_core::{DxArcError, ErrorKind};
use std::fs;
use std::io::Cursor;

/// Two Huffman-only files, so the first payload starts with a Huffman header.
fn sample_archive() -> Vec<u8> {
    let config = WriteConfig::new().with_compression(false);
    let mut writer = DxArchiveWriter::new(Cursor::new(Vec::new()), config).unwrap();
    writer
        .add_file("broken.txt", &b"this file will be damaged ".repeat(40), FileTimes::default())
        .unwrap();
    writer
        .add_file("fine.txt", &b"this file stays intact ".repeat(40), FileTimes::default())
        .unwrap();
    writer.finish().unwrap().into_inner()
}

/// Unkeyed archive with an uncompressed table blob built by hand.
fn raw_archive(names: &[u8], files: &[u8], dirs: &[u8]) -> Vec<u8> {
    let mut blob = names.to_vec();
    blob.extend_from_slice(files);
    blob.extend_from_slice(dirs);

    let header = ArchiveHeader {
        kind: HeaderKind::V8,
        version: DXA_VERSION,
        head_size: blob.len() as u32,
        data_start: HEADER_SIZE as u64,
        name_table_start: HEADER_SIZE as u64,
        file_table_start: names.len() as u64,
        directory_table_start: (names.len() + files.len()) as u64,
        char_code_format: NameEncoding::Utf8.code_page(),
        flags: FLAG_NO_KEY | FLAG_NO_HEAD_PRESS,
        huffman_block: HuffmanBlock::Kb(0),
        reserved: [0; 14],
    };
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(&blob);
    bytes
}

fn open_err(bytes: Vec<u8>) -> DxArcError {
    DxArchiveReader::open(Cursor::new(bytes), ReadConfig::new())
        .err()
        .expect("archive should be rejected")
}

#[test]
fn test_wrong_magic() {
    let mut bytes = sample_archive();
    bytes[0..2].copy_from_slice(b"PK");
    let err = open_err(bytes);
    assert!(matches!(err, DxArcError::InvalidMagic { .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_unsupported_version() {
    let mut bytes = sample_archive();
    bytes[2] = 6;
    let err = open_err(bytes);
    assert!(matches!(err, DxArcError::UnsupportedVersion { version: 6, .. }));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_name_table_past_end() {
    let mut bytes = sample_archive();
    let len = bytes.len() as u64;
    bytes[16..24].copy_from_slice(&(len + 100).to_le_bytes());
    assert_eq!(open_err(bytes).kind(), ErrorKind::Size);
}

#[test]
fn test_directory_cycle() {
    let mut names = Vec::new();
    write_name_entry(&mut names, b"loop", NameEncoding::Utf8).unwrap();

    let mut files = Vec::new();
    FileHeadEntry {
        name_offset: 0,
        attributes: ATTRIBUTE_DIRECTORY,
        times: FileTimes::default(),
        data_offset: 0,
        data_size: 0,
        lz_size: None,
        huffman_size: None,
    }
    .write_to(&mut files);

    let mut dirs = Vec::new();
    DirectoryEntry {
        self_offset: None,
        parent_offset: None,
        child_count: 1,
        first_child_offset: 0,
    }
    .write_to(&mut dirs);

    let err = open_err(raw_archive(&names, &files, &dirs));
    assert!(matches!(err, DxArcError::InvalidHeader { .. }));
}

#[test]
fn test_child_count_past_file_table() {
    let mut dirs = Vec::new();
    DirectoryEntry {
        self_offset: None,
        parent_offset: None,
        child_count: 3,
        first_child_offset: 0,
    }
    .write_to(&mut dirs);

    let err = open_err(raw_archive(&[], &[], &dirs));
    assert!(matches!(err, DxArcError::TableOutOfBounds { table: "file", .. }));
    assert_eq!(err.kind(), ErrorKind::Size);
}

#[test]
fn test_payload_past_end() {
    let mut names = Vec::new();
    write_name_entry(&mut names, b"ghost.bin", NameEncoding::Utf8).unwrap();
    let mut files = Vec::new();
    FileHeadEntry {
        name_offset: 0,
        attributes: 0x20,
        times: FileTimes::default(),
        data_offset: 10_000,
        data_size: 50,
        lz_size: None,
        huffman_size: None,
    }
    .write_to(&mut files);
    let mut dirs = Vec::new();
    DirectoryEntry {
        self_offset: None,
        parent_offset: None,
        child_count: 1,
        first_child_offset: 0,
    }
    .write_to(&mut dirs);

    let mut reader =
        DxArchiveReader::open(Cursor::new(raw_archive(&names, &files, &dirs)), ReadConfig::new())
            .unwrap();
    let file = reader.files()[0].clone();
    let err = reader.extract(&file).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Size);
}

#[test]
fn test_corrupted_file_isolated() {
    let mut bytes = sample_archive();
    let (start, stored) = {
        let reader = DxArchiveReader::open(Cursor::new(bytes.clone()), ReadConfig::new()).unwrap();
        let broken = reader.find("broken.txt").unwrap();
        assert!(broken.is_huffman_compressed());
        (broken.data_start as usize, broken.stored_size as usize)
    };
    // An all-ones Huffman header declares sizes far beyond the payload.
    bytes[start..start + 16.min(stored)].fill(0xFF);

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("damaged.dxa");
    fs::write(&archive, &bytes).unwrap();

    let out = dir.path().join("out");
    let mut reader =
        DxArchiveReader::open_path(&archive, ReadConfig::new().with_output_root(&out)).unwrap();
    let report = reader.extract_all().unwrap();

    assert_eq!(report.extracted, vec![out.join("fine.txt")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, out.join("broken.txt"));
    assert_eq!(report.failed[0].1.kind(), ErrorKind::DecodeCorruption);
    assert!(!out.join("broken.txt").exists());
    assert_eq!(
        fs::read(out.join("fine.txt")).unwrap(),
        b"this file stays intact ".repeat(40)
    );
}

#[test]
fn test_missing_archive_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.dxa");
    let err = DxArchiveReader::open_path(&missing, ReadConfig::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("nope.dxa"));
}
