//! Loader.
//!
//! Owns the whole pipeline: header, chunker, one OS thread per finalized
//! chunk for parsing, and a per-column merge pass that decides each
//! column's final semantics and builds its output storage.

use crate::chunker::{self, ChunkRange};
use crate::column::CatIndexVec;
use crate::config::{LoaderOptions, Semantics};
use crate::error::{Error, Result};
use crate::header;
use crate::numeric::{concat_numeric, NumericVec};
use crate::parse_worker::{self, ParseParams, ParseWorkerResult};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One column's final, merged storage.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Numeric(NumericVec),
    Categorical { codes: CatIndexVec, levels: Vec<String> },
    Text(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct MergedColumn {
    pub name: String,
    pub semantics: Semantics,
    pub data: ColumnData,
}

impl MergedColumn {
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every row's value as `f64`: the numbers of a `Numeric` column, or the
    /// dictionary codes of a `Categorical` one. Empty for `Text`.
    pub fn data_as_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            ColumnData::Numeric(v) => (0..v.len()).map(|i| v.get_f64(i)).collect(),
            ColumnData::Categorical { codes, .. } => (0..codes.len()).map(|i| codes.get(i) as f64).collect(),
            ColumnData::Text(_) => Vec::new(),
        }
    }
}

/// The finished, column-oriented table: a snapshot of every chunk parsed so
/// far, merged into one storage vector per column.
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<MergedColumn>,
}

impl Table {
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(MergedColumn::len).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&MergedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Coordinates header parsing, chunking, parse-worker spawning, and the
/// per-column merge. Construct with `Loader::load`; call `load_next`
/// repeatedly when `chunked_file_reading` is on, or `load_all` to drive it
/// to completion in one call.
pub struct Loader {
    path: PathBuf,
    options: LoaderOptions,
    column_names: Vec<String>,
    forced_semantics: Vec<Option<Semantics>>,
    chunks: Vec<ChunkRange>,
    next_chunk_index: usize,
    parsed: Vec<ParseWorkerResult>,
}

impl Loader {
    /// Parses the header, computes the chunk plan, and eagerly parses the
    /// first group of chunks synchronously, regardless of whether
    /// `chunked_file_reading` is on.
    pub fn load(path: impl AsRef<Path>, options: LoaderOptions) -> Result<Loader> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|source| Error::StatFailed {
            path: path.clone(),
            source,
        })?;
        let file_length = metadata.len();

        let header_info = header::parse_header(&path, options.no_header, options.convert_null_to_space, options.block_size)?;
        let forced_semantics: Vec<Option<Semantics>> = header_info
            .column_names
            .iter()
            .map(|name| options.forced_semantics_for(name))
            .collect();

        let start = if header_info.has_header { header_info.end_of_header + 1 } else { 0 };

        let desired_num_chunks = if options.chunked_file_reading {
            let num_file_chunks = std::cmp::max(1, file_length / options.file_chunk_size as u64) as usize;
            options.num_threads * num_file_chunks
        } else {
            options.num_threads
        };

        let chunks = chunker::compute_chunks(&path, start, desired_num_chunks, options.allow_quoted_newlines, options.block_size)?;
        log::debug!("'{}': {} finalized chunk(s) from offset {}", path.display(), chunks.len(), start);

        let mut loader = Loader {
            path,
            options,
            column_names: header_info.column_names,
            forced_semantics,
            chunks,
            next_chunk_index: 0,
            parsed: Vec::new(),
        };
        loader.spawn_batch()?;
        Ok(loader)
    }

    /// Parses the next group of up to `num_threads` chunks, one OS thread
    /// per chunk, each thread owning its own file handle and accumulators
    /// (no shared mutable state between workers). The first error
    /// encountered across the group is re-raised after every thread in the
    /// group has joined.
    fn spawn_batch(&mut self) -> Result<()> {
        let count = std::cmp::min(self.options.num_threads, self.chunks.len() - self.next_chunk_index);
        if count == 0 {
            return Ok(());
        }
        let batch: Vec<(usize, ChunkRange)> = self.chunks[self.next_chunk_index..self.next_chunk_index + count]
            .iter()
            .copied()
            .enumerate()
            .map(|(i, range)| (self.next_chunk_index + i, range))
            .collect();

        let path: &Path = &self.path;
        let column_names: &[String] = &self.column_names;
        let forced: &[Option<Semantics>] = &self.forced_semantics;
        let params = ParseParams {
            number_only: self.options.number_only,
            block_size: self.options.block_size,
            convert_null_to_space: self.options.convert_null_to_space,
        };
        let max_level_name_length = self.options.max_level_name_length;
        let max_levels = self.options.max_levels;

        let results: Vec<Result<ParseWorkerResult>> = std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|&(chunk_index, range)| {
                    let params = &params;
                    scope.spawn(move || {
                        parse_worker::parse_chunk(path, chunk_index, range, column_names, forced, max_level_name_length, max_levels, params)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| Err(Error::Internal("parse worker thread panicked".to_string()))))
                .collect()
        });

        self.next_chunk_index += count;
        for result in results {
            match result {
                Ok(parsed) => self.parsed.push(parsed),
                Err(err) => {
                    log::warn!("'{}': worker failed: {err}", self.path.display());
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Parses the next group of chunks when `chunked_file_reading` is on.
    /// Returns `Ok(false)` once every chunk has been parsed (or immediately,
    /// when `chunked_file_reading` is off, since `load` already parsed
    /// everything there is).
    pub fn load_next(&mut self) -> Result<bool> {
        if !self.options.chunked_file_reading {
            return Ok(false);
        }
        if self.next_chunk_index >= self.chunks.len() {
            return Ok(false);
        }
        self.spawn_batch()?;
        Ok(self.next_chunk_index < self.chunks.len())
    }

    /// Drives `load_next` to completion.
    pub fn load_all(&mut self) -> Result<()> {
        while self.load_next()? {}
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.next_chunk_index >= self.chunks.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn num_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Merges every chunk parsed so far into one `Table`. Safe to call
    /// before `load_all` finishes (a snapshot of partial progress) or after
    /// (the final table); each call recomputes the merge from scratch,
    /// since a column's semantics can only be decided once every worker's
    /// contribution for that column is known.
    pub fn finalize(&self) -> Result<Table> {
        let columns: Vec<MergedColumn> = (0..self.column_names.len())
            .into_par_iter()
            .map(|col_idx| self.merge_column(col_idx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table { columns })
    }

    fn merge_column(&self, col_idx: usize) -> Result<MergedColumn> {
        let name = self.column_names[col_idx].clone();
        let mut accs: Vec<_> = self.parsed.iter().map(|r| r.columns[col_idx].clone()).collect();

        // A column forced to Text always merges as Text, even with zero
        // rows (where every accumulator's state is otherwise indistinguishable
        // from an empty Numeric column).
        if self.forced_semantics[col_idx] == Some(Semantics::Text) {
            for acc in &mut accs {
                acc.force_categorical();
                acc.force_text();
            }
            let mut text = Vec::new();
            for acc in accs {
                text.extend(acc.text_data);
            }
            return Ok(MergedColumn {
                name,
                semantics: Semantics::Text,
                data: ColumnData::Text(text),
            });
        }

        let all_numeric = accs.iter().all(|a| a.len() == 0 || a.semantics() == Semantics::Numeric);
        if all_numeric {
            let parts: Vec<NumericVec> = accs.into_iter().map(|a| a.number_data).collect();
            let merged = concat_numeric(parts);
            return Ok(MergedColumn {
                name,
                semantics: Semantics::Numeric,
                data: ColumnData::Numeric(merged),
            });
        }

        for acc in &mut accs {
            acc.force_categorical();
        }
        let any_text = accs.iter().any(|a| a.len() != 0 && a.semantics() == Semantics::Text);
        if any_text {
            log::debug!("column '{name}' promoted to text during merge");
            for acc in &mut accs {
                acc.force_text();
            }
            let mut text = Vec::new();
            for acc in accs {
                text.extend(acc.text_data);
            }
            return Ok(MergedColumn {
                name,
                semantics: Semantics::Text,
                data: ColumnData::Text(text),
            });
        }

        let mut global_ids: HashMap<String, u32> = HashMap::new();
        let mut global_keys: Vec<String> = Vec::new();
        let mut codes = CatIndexVec::default();
        for acc in &accs {
            for i in 0..acc.cat_data.len() {
                let local_idx = acc.cat_data.get(i) as usize;
                let key = &acc.cat_keys[local_idx];
                let global_idx = match global_ids.get(key) {
                    Some(&g) => g,
                    None => {
                        let g = global_keys.len() as u32;
                        global_keys.push(key.clone());
                        global_ids.insert(key.clone(), g);
                        g
                    }
                };
                codes.push(global_idx as usize);
            }
        }
        log::debug!("column '{name}' merged as categorical with {} level(s)", global_keys.len());
        Ok(MergedColumn {
            name,
            semantics: Semantics::Categorical,
            data: ColumnData::Categorical { codes, levels: global_keys },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn loads_simple_numeric_file() {
        let f = write_temp(b"a,b\n1,2\n3,4\n5,6\n");
        let mut opts = LoaderOptions::default();
        opts.num_threads(2);
        let loader = Loader::load(f.path(), opts).unwrap();
        assert_eq!(loader.column_names(), &["a".to_string(), "b".to_string()]);
        let table = loader.finalize().unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 2);
        match &table.column("a").unwrap().data {
            ColumnData::Numeric(v) => {
                assert_eq!(v.len(), 3);
                assert_eq!(v.get_f64(0), 1.0);
                assert_eq!(v.get_f64(2), 5.0);
            }
            other => panic!("expected numeric, got {other:?}"),
        }
    }

    #[test]
    fn mixed_numeric_and_text_promotes_whole_column_to_categorical() {
        let f = write_temp(b"a\n1\nhello\n2\n");
        let mut opts = LoaderOptions::default();
        opts.num_threads(1);
        let loader = Loader::load(f.path(), opts).unwrap();
        let table = loader.finalize().unwrap();
        match &table.column("a").unwrap().data {
            ColumnData::Categorical { codes, levels } => {
                assert_eq!(codes.len(), 3);
                assert!(levels.contains(&"1".to_string()));
                assert!(levels.contains(&"hello".to_string()));
            }
            other => panic!("expected categorical, got {other:?}"),
        }
    }

    #[test]
    fn dictionaries_unify_across_worker_chunks() {
        let data = b"a\nx\ny\nx\nz\ny\nx\n";
        let f = write_temp(data);
        let mut opts = LoaderOptions::default();
        opts.num_threads(4);
        let loader = Loader::load(f.path(), opts).unwrap();
        let table = loader.finalize().unwrap();
        match &table.column("a").unwrap().data {
            ColumnData::Categorical { codes, levels } => {
                assert_eq!(codes.len(), 6);
                assert_eq!(levels.len(), 3);
            }
            other => panic!("expected categorical, got {other:?}"),
        }
    }

    #[test]
    fn chunked_file_reading_drains_via_load_next() {
        let mut data = Vec::new();
        data.extend_from_slice(b"a\n");
        for i in 0..50 {
            data.extend_from_slice(format!("{i}\n").as_bytes());
        }
        let f = write_temp(&data);
        let mut opts = LoaderOptions::default();
        opts.num_threads(2).chunked_file_reading(true).file_chunk_size(16);
        let mut loader = Loader::load(f.path(), opts).unwrap();
        loader.load_all().unwrap();
        assert!(loader.is_complete());
        let table = loader.finalize().unwrap();
        assert_eq!(table.num_rows(), 50);
    }

    #[test]
    fn forced_text_semantics_is_honored_through_merge() {
        let f = write_temp(b"a\n1\n2\n3\n");
        let mut opts = LoaderOptions::default();
        opts.num_threads(1).force_semantics("a", Semantics::Text);
        let loader = Loader::load(f.path(), opts).unwrap();
        let table = loader.finalize().unwrap();
        assert_eq!(table.column("a").unwrap().semantics, Semantics::Text);
    }

    #[test]
    fn header_only_file_yields_zero_rows() {
        let f = write_temp(b"a,b\n");
        let opts = LoaderOptions::default();
        let loader = Loader::load(f.path(), opts).unwrap();
        let table = loader.finalize().unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 2);
    }
}
