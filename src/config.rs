//! Loader configuration.

use std::collections::HashMap;

/// A column's inferred (or forced) kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantics {
    Unknown,
    Numeric,
    Categorical,
    Text,
}

/// Top-level loader options. Construct with `LoaderOptions::default()` and
/// adjust with the builder methods.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub no_header: bool,
    pub number_only: bool,
    pub block_size: usize,
    pub num_threads: usize,
    pub allow_quoted_newlines: bool,
    pub max_level_name_length: usize,
    pub max_levels: usize,
    pub convert_null_to_space: bool,
    pub chunked_file_reading: bool,
    pub file_chunk_size: usize,
    forced_semantics: HashMap<String, Semantics>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            no_header: false,
            number_only: false,
            block_size: 32 * 1024,
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            allow_quoted_newlines: true,
            // Uncapped unless the caller opts in.
            max_level_name_length: usize::MAX,
            max_levels: usize::MAX,
            convert_null_to_space: true,
            chunked_file_reading: false,
            file_chunk_size: 64 * 1024 * 1024,
            forced_semantics: HashMap::new(),
        }
    }
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_header(&mut self, value: bool) -> &mut Self {
        self.no_header = value;
        self
    }

    pub fn number_only(&mut self, value: bool) -> &mut Self {
        self.number_only = value;
        self
    }

    pub fn block_size(&mut self, value: usize) -> &mut Self {
        self.block_size = value;
        self
    }

    pub fn num_threads(&mut self, value: usize) -> &mut Self {
        self.num_threads = value.max(1);
        self
    }

    pub fn allow_quoted_newlines(&mut self, value: bool) -> &mut Self {
        self.allow_quoted_newlines = value;
        self
    }

    pub fn max_level_name_length(&mut self, value: usize) -> &mut Self {
        self.max_level_name_length = value;
        self
    }

    pub fn max_levels(&mut self, value: usize) -> &mut Self {
        self.max_levels = value;
        self
    }

    pub fn convert_null_to_space(&mut self, value: bool) -> &mut Self {
        self.convert_null_to_space = value;
        self
    }

    pub fn chunked_file_reading(&mut self, value: bool) -> &mut Self {
        self.chunked_file_reading = value;
        self
    }

    pub fn file_chunk_size(&mut self, value: usize) -> &mut Self {
        self.file_chunk_size = value;
        self
    }

    /// Force a column's semantics by name, overriding type inference.
    pub fn force_semantics(&mut self, column: impl Into<String>, semantics: Semantics) -> &mut Self {
        self.forced_semantics.insert(column.into(), semantics);
        self
    }

    pub fn forced_semantics_for(&self, column: &str) -> Option<Semantics> {
        self.forced_semantics.get(column).copied()
    }
}
