//! Info command implementation.

use crate::utils::savings;
use dxarc_archive::{DxArchiveReader, HuffmanBlock, ReadConfig};
use std::path::Path;

pub fn cmd_info(archive: &Path, config: ReadConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = std::fs::metadata(archive)?;
    let reader = DxArchiveReader::open_path(archive, config)?;
    let header = reader.header();

    println!("Archive Information");
    println!("===================");
    println!("File: {}", archive.display());
    println!("Format: DX archive v{}", header.version);
    println!("Size: {} bytes", metadata.len());

    println!();
    println!("Header:");
    println!("  Encrypted: {}", if header.is_keyed() { "yes" } else { "no" });
    println!(
        "  Table compressed: {}",
        if header.is_header_compressed() { "yes" } else { "no" }
    );
    println!(
        "  Name encoding: {:?} (code page {})",
        header.name_encoding(),
        header.char_code_format
    );
    match header.huffman_block {
        HuffmanBlock::Whole => println!("  Huffman block: whole payload"),
        HuffmanBlock::Kb(kb) => println!("  Huffman block: {} KB", kb),
    }
    println!("  Table blob: {} bytes", header.head_size);

    let files = reader.files();
    let total_size: u64 = files.iter().map(|f| f.data_size).sum();
    let total_stored: u64 = files.iter().map(|f| f.stored_size).sum();
    let lz = files.iter().filter(|f| f.is_compressed()).count();
    let huffman = files.iter().filter(|f| f.is_huffman_compressed()).count();

    println!();
    println!("Contents:");
    println!("  Files: {}", files.len());
    println!("  LZ compressed: {}", lz);
    println!("  Huffman compressed: {}", huffman);
    println!("  Total size: {} bytes", total_size);
    println!("  Stored size: {} bytes", total_stored);
    if total_size > 0 {
        println!(
            "  Compression ratio: {:.1}%",
            savings(total_size, total_stored)
        );
    }

    Ok(())
}
