//! Create command implementation.

use dxarc_archive::{WriteConfig, create_archive_with};
use dxarc_core::DxArcError;
use std::path::{Path, PathBuf};

/// Options for creating an archive.
pub struct CreateOptions {
    pub config: WriteConfig,
    pub verbose: bool,
}

pub fn cmd_create(
    archive: &Path,
    inputs: &[PathBuf],
    options: &CreateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let named = archive_names(inputs)?;

    if options.verbose {
        for (name, path) in &named {
            println!("  Adding: {} as {}", path.display(), name);
        }
    }

    create_archive_with(archive, &named, options.config.clone())?;

    let size = std::fs::metadata(archive)?.len();
    println!(
        "Created {} ({} inputs, {} bytes{})",
        archive.display(),
        named.len(),
        size,
        if options.config.is_keyed() { ", encrypted" } else { "" }
    );
    Ok(())
}

/// Pair each input with the archive name it is stored under: its own file name.
fn archive_names(inputs: &[PathBuf]) -> Result<Vec<(String, PathBuf)>, DxArcError> {
    inputs
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
        .collect()
}
