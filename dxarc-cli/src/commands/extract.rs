//! Extract command implementation.

use crate::utils::{create_progress_bar, is_selected, matches_filters, restore_mtime};
use dxarc_archive::{ArchivedFile, DxArchiveReader, ReadConfig};
use dxarc_core::{DxArcError, ErrorKind};
use std::path::Path;

/// Options for extracting archive contents.
pub struct ExtractOptions<'a> {
    pub files: &'a [String],
    pub include: &'a [String],
    pub exclude: &'a [String],
    pub verbose: bool,
    pub progress: bool,
}

impl ExtractOptions<'_> {
    fn wants(&self, name: &str) -> bool {
        (self.files.is_empty() || self.files.iter().any(|f| is_selected(name, f)))
            && matches_filters(name, self.include, self.exclude)
    }
}

pub fn cmd_extract(
    archive: &Path,
    config: ReadConfig,
    options: &ExtractOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = DxArchiveReader::open_path(archive, config)?;

    for requested in options.files {
        if !reader.files().iter().any(|f| is_selected(&f.archive_path, requested)) {
            return Err(DxArcError::entry_not_found(requested.as_str()).into());
        }
    }

    let selected: Vec<ArchivedFile> = reader
        .files()
        .iter()
        .filter(|f| options.wants(&f.archive_path))
        .cloned()
        .collect();

    println!(
        "Extracting {} to {}",
        archive.display(),
        reader.output_root().display()
    );

    let pb = create_progress_bar(selected.len() as u64, options.progress);
    pb.set_message("files");

    let mut extracted = 0usize;
    let mut bytes = 0u64;
    let mut failed = 0usize;

    for file in &selected {
        match reader.extract_file_to_disk(file) {
            Ok(path) => {
                restore_mtime(&path, &file.times);
                extracted += 1;
                bytes += file.data_size;
                if options.verbose {
                    pb.println(format!("  Extracted: {}", file.archive_path));
                }
            }
            Err(e) if e.kind() == ErrorKind::Io => {
                pb.abandon();
                return Err(e.into());
            }
            Err(e) => {
                pb.println(format!("  Failed: {}: {}", file.archive_path, e));
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Extracted {} files ({} bytes)", extracted, bytes);
    if failed > 0 {
        return Err(format!("{} files could not be extracted", failed).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_combines_selection_and_filters() {
        let files = vec!["MapData".to_string()];
        let exclude = vec!["*.bak".to_string()];
        let options = ExtractOptions {
            files: &files,
            include: &[],
            exclude: &exclude,
            verbose: false,
            progress: false,
        };
        assert!(options.wants("MapData/Map001.mps"));
        assert!(!options.wants("MapData/Map001.bak"));
        assert!(!options.wants("BasicData/Game.dat"));
    }
}
