//! DxArc CLI - DX archive utility
//!
//! Lists, extracts, creates and inspects DX archives (`.dxa`, `.wolf`).

mod commands;
mod utils;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use commands::{
    CreateOptions, ExtractOptions, ListOptions, cmd_create, cmd_extract, cmd_info, cmd_list,
};
use dxarc_archive::{HuffmanBlock, NameEncoding, ReadConfig, WriteConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dxarc")]
#[command(author, version, about = "DX archive utility - Pure Rust .dxa reader and writer")]
#[command(long_about = "
DxArc reads and writes DX archives, the container format used by DxLib
games (.dxa, .wolf). Archives may be encrypted with a key string.

Examples:
  dxarc list data.wolf
  dxarc list -k secret data.dxa --json
  dxarc extract data.wolf -o out
  dxarc extract -k secret data.dxa BasicData/Map001.mps
  dxarc create data.dxa BasicData MapData -k secret
  dxarc info data.wolf
")]
struct Cli {
    /// Key string used to derive encryption keys (default key when omitted)
    #[arg(short, long, global = true)]
    key: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files in an archive
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,

        /// Include only files matching pattern (glob syntax: *.txt, Data/**/*)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude files matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,
    },

    /// Extract files from an archive
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Files or directories to extract (all if empty)
        files: Vec<String>,

        /// Include only files matching pattern (glob syntax)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude files matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,

        /// Show progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Create a new archive from files and directories
    #[command(alias = "c")]
    Create {
        /// Output archive file
        archive: PathBuf,

        /// Files and directories to add, each stored under its own name
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Store payloads without LZ compression
        #[arg(long)]
        no_compression: bool,

        /// Skip the Huffman stage
        #[arg(long)]
        no_huffman: bool,

        /// Store the table blob without compression
        #[arg(long)]
        no_header_compression: bool,

        /// Huffman block size in KB (1-254), or "whole"
        #[arg(long, default_value = "16", value_parser = parse_block)]
        block_kb: HuffmanBlock,

        /// Encoding of stored file names
        #[arg(long, value_enum, default_value = "utf8")]
        encoding: EncodingArg,
    },

    /// Show information about an archive
    #[command(alias = "i")]
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// File name encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    /// UTF-8 (code page 65001)
    Utf8,
    /// Shift_JIS (code page 932)
    Sjis,
}

impl From<EncodingArg> for NameEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => NameEncoding::Utf8,
            EncodingArg::Sjis => NameEncoding::ShiftJis,
        }
    }
}

fn parse_block(value: &str) -> Result<HuffmanBlock, String> {
    if value.eq_ignore_ascii_case("whole") {
        return Ok(HuffmanBlock::Whole);
    }
    match value.parse::<u8>() {
        Ok(kb @ 1..=254) => Ok(HuffmanBlock::Kb(kb)),
        _ => Err(format!("expected 1-254 or \"whole\", got {value:?}")),
    }
}

fn read_config(key: Option<&str>) -> ReadConfig {
    match key {
        Some(key) => ReadConfig::new().with_key(key),
        None => ReadConfig::new(),
    }
}

fn main() {
    let cli = Cli::parse();
    utils::init_tracing(cli.verbose);
    let key = cli.key.as_deref();

    let result = match cli.command {
        Commands::List {
            archive,
            json,
            include,
            exclude,
        } => cmd_list(
            &archive,
            read_config(key),
            &ListOptions {
                json,
                verbose: cli.verbose > 0,
                include: &include,
                exclude: &exclude,
            },
        ),
        Commands::Extract {
            archive,
            output,
            files,
            include,
            exclude,
            progress,
        } => cmd_extract(
            &archive,
            read_config(key).with_output_root(output),
            &ExtractOptions {
                files: &files,
                include: &include,
                exclude: &exclude,
                verbose: cli.verbose > 0,
                progress,
            },
        ),
        Commands::Create {
            archive,
            inputs,
            no_compression,
            no_huffman,
            no_header_compression,
            block_kb,
            encoding,
        } => {
            let mut config = WriteConfig::new()
                .with_compression(!no_compression)
                .with_huffman(!no_huffman)
                .with_compress_header(!no_header_compression)
                .with_huffman_block(block_kb)
                .with_name_encoding(encoding.into());
            if let Some(key) = key {
                config = config.with_key(key);
            }
            cmd_create(
                &archive,
                &inputs,
                &CreateOptions {
                    config,
                    verbose: cli.verbose > 0,
                },
            )
        }
        Commands::Info { archive } => cmd_info(&archive, read_config(key)),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dxarc", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block() {
        assert_eq!(parse_block("16"), Ok(HuffmanBlock::Kb(16)));
        assert_eq!(parse_block("WHOLE"), Ok(HuffmanBlock::Whole));
        assert!(parse_block("0").is_err());
        assert!(parse_block("255").is_err());
        assert!(parse_block("big").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_key_after_subcommand() {
        let cli = Cli::try_parse_from(["dxarc", "list", "data.wolf", "-k", "secret", "-vv"]).unwrap();
        assert_eq!(cli.key.as_deref(), Some("secret"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::List { .. }));
    }

    #[test]
    fn test_create_flags() {
        let cli = Cli::try_parse_from([
            "dxarc",
            "create",
            "out.dxa",
            "Data",
            "--block-kb",
            "whole",
            "--encoding",
            "sjis",
            "--no-huffman",
        ])
        .unwrap();
        match cli.command {
            Commands::Create {
                block_kb,
                encoding,
                no_huffman,
                no_compression,
                ..
            } => {
                assert_eq!(block_kb, HuffmanBlock::Whole);
                assert_eq!(encoding, EncodingArg::Sjis);
                assert!(no_huffman);
                assert!(!no_compression);
            }
            _ => panic!("expected create"),
        }
    }
}
