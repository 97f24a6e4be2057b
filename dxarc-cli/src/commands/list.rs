//! List command implementation.

use crate::utils::{matches_filters, savings};
use dxarc_archive::{ArchivedFile, DxArchiveReader, ReadConfig};
use serde::Serialize;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// JSON serializable file data for archive listings.
#[derive(Debug, Serialize)]
struct FileJson<'a> {
    path: &'a str,
    size: u64,
    stored_size: u64,
    ratio: f64,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mtime: Option<u64>,
    encrypted: bool,
}

impl<'a> FileJson<'a> {
    fn from_file(file: &'a ArchivedFile) -> Self {
        let mtime = file
            .times
            .modified()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());

        Self {
            path: &file.archive_path,
            size: file.data_size,
            stored_size: file.stored_size,
            ratio: savings(file.data_size, file.stored_size),
            method: file.method(),
            mtime,
            encrypted: file.key.is_some(),
        }
    }
}

/// JSON output for archive listing.
#[derive(Debug, Serialize)]
struct ArchiveListJson<'a> {
    archive: String,
    version: u16,
    code_page: u32,
    encrypted: bool,
    files: Vec<FileJson<'a>>,
}

/// Options for listing archive contents.
pub struct ListOptions<'a> {
    pub json: bool,
    pub verbose: bool,
    pub include: &'a [String],
    pub exclude: &'a [String],
}

pub fn cmd_list(
    archive: &Path,
    config: ReadConfig,
    options: &ListOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = DxArchiveReader::open_path(archive, config)?;
    let files: Vec<&ArchivedFile> = reader
        .files()
        .iter()
        .filter(|f| matches_filters(&f.archive_path, options.include, options.exclude))
        .collect();

    if options.json {
        let header = reader.header();
        let listing = ArchiveListJson {
            archive: archive.display().to_string(),
            version: header.version,
            code_page: header.char_code_format,
            encrypted: header.is_keyed(),
            files: files.iter().map(|f| FileJson::from_file(f)).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!(
        "Archive: {} (DX archive v{})",
        archive.display(),
        reader.header().version
    );
    println!();
    print_files(&files, options.verbose);
    Ok(())
}

/// Print files in a formatted table.
fn print_files(files: &[&ArchivedFile], verbose: bool) {
    if !verbose {
        for file in files {
            println!("{}", file.archive_path);
        }
        return;
    }

    println!(
        "{:>10} {:>10} {:>6} {:>8}  Name",
        "Size", "Stored", "Ratio", "Method",
    );
    println!("{}", "-".repeat(60));

    let mut total_size = 0u64;
    let mut total_stored = 0u64;

    for file in files {
        let ratio = if file.data_size > 0 {
            format!("{:.1}%", savings(file.data_size, file.stored_size))
        } else {
            "-".to_string()
        };
        let lock = if file.key.is_some() { "*" } else { " " };

        println!(
            "{:>10} {:>10} {:>6} {:>8} {}{}",
            file.data_size,
            file.stored_size,
            ratio,
            file.method(),
            lock,
            file.archive_path
        );

        total_size += file.data_size;
        total_stored += file.stored_size;
    }

    println!("{}", "-".repeat(60));
    println!(
        "{:>10} {:>10} {:>5.1}%          {} files",
        total_size,
        total_stored,
        savings(total_size, total_stored),
        files.len()
    );
}
