//! CLI argument definitions for the `colload` binary.
//!
//! This crate has one job, so there's a single flat `Cli` rather than a
//! `Commands` subcommand enum.

use std::path::PathBuf;

use clap::Parser;

use crate::config::LoaderOptions;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load a delimited file into an in-memory, type-inferred columnar table", long_about = None)]
pub struct Cli {
    /// Input file to load
    pub input: PathBuf,

    /// Treat the file as headerless; columns are named col0, col1, ...
    #[arg(long)]
    pub no_header: bool,

    /// Assume every field is numeric; skips the categorical/text fallback
    #[arg(long)]
    pub number_only: bool,

    /// Read block size, in bytes
    #[arg(long, default_value_t = 32 * 1024)]
    pub block_size: usize,

    /// Number of worker threads (defaults to available parallelism)
    #[arg(long)]
    pub num_threads: Option<usize>,

    /// Disallow newlines inside quoted fields, for a faster single-pass chunker
    #[arg(long)]
    pub no_quoted_newlines: bool,

    /// Maximum characters in a categorical level name before the column is demoted to text
    #[arg(long)]
    pub max_level_name_length: Option<usize>,

    /// Maximum distinct levels in a categorical column before it's demoted to text
    #[arg(long)]
    pub max_levels: Option<usize>,

    /// Read the file in bounded-size groups via repeated load_next calls instead of one pass
    #[arg(long)]
    pub chunked: bool,

    /// Target bytes per load_next group when --chunked is set
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pub file_chunk_size: usize,

    /// Print every level name for categorical columns
    #[arg(long)]
    pub show_levels: bool,
}

impl Cli {
    pub fn to_loader_options(&self) -> LoaderOptions {
        let mut options = LoaderOptions::new();
        options
            .no_header(self.no_header)
            .number_only(self.number_only)
            .block_size(self.block_size)
            .allow_quoted_newlines(!self.no_quoted_newlines)
            .convert_null_to_space(true)
            .chunked_file_reading(self.chunked)
            .file_chunk_size(self.file_chunk_size);
        if let Some(num_threads) = self.num_threads {
            options.num_threads(num_threads);
        }
        if let Some(max_level_name_length) = self.max_level_name_length {
            options.max_level_name_length(max_level_name_length);
        }
        if let Some(max_levels) = self.max_levels {
            options.max_levels(max_levels);
        }
        options
    }
}
