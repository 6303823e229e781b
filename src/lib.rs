//! colload - parallel, type-inferring columnar CSV loader
//!
//! Reads a single delimited text file, splits it into record-aligned byte
//! ranges, parses each range on its own OS thread into per-column
//! accumulators, then merges the per-thread results into one column-oriented
//! table, inferring each column's semantics (numeric, categorical, or free
//! text) from the values actually seen.
//!
//! Modules:
//! - `bytes`: integer/float scanners and the escape-aware string decoder
//! - `numeric`: the widening numeric storage vector
//! - `column`: the per-(worker, column) accumulator and its state machine
//! - `quote_scan` / `chunker`: splitting the file into record-aligned ranges
//! - `header`: header-line parsing
//! - `parse_worker`: the per-chunk byte scanner
//! - `loader`: pipeline coordination and the per-column merge
//! - `populator`: safe readers over a merged column's values

mod bytes;
mod chunker;
mod column;
pub mod cli;
mod config;
mod error;
mod header;
mod loader;
mod numeric;
mod parse_worker;
mod populator;
mod quote_scan;

pub use column::{CatIndexVec, ColumnDescriptor};
pub use config::{LoaderOptions, Semantics};
pub use error::{Error, Result};
pub use loader::{ColumnData, Loader, MergedColumn, Table};
pub use numeric::{NumericType, NumericVec};
pub use populator::{ColumnPopulator, StringVectorPopulator};

use std::sync::OnceLock;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if std::env::var("RUST_LOG").is_err() {
            builder.filter_module("colload", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// Entry point shared by `src/bin/colload.rs`: parse arguments, run the
/// loader to completion, and print a column summary.
pub fn run() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Cli::parse();
    let options = args.to_loader_options();

    let mut loader = Loader::load(&args.input, options).context("failed to start loading file")?;
    loader.load_all().context("failed while loading file")?;
    let table = loader.finalize().context("failed to merge parsed chunks")?;

    println!("{} column(s), {} row(s)", table.num_columns(), table.num_rows());
    for column in &table.columns {
        let values = column.values();
        println!("  {:<24} {:<12?} {:<6} {} row(s)", column.name, column.semantics, values.type_name(), column.len());
        if args.show_levels {
            if let Some(levels) = column.levels() {
                for (i, level) in levels.as_slice().iter().enumerate() {
                    println!("    [{i}] {level}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(all(feature = "mimalloc", not(test)))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
