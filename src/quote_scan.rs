//! Quote-scan worker.
//!
//! For one byte range of the file, counts unescaped double-quotes and
//! records the first newline seen inside and outside a quoted region. A
//! backslash unconditionally consumes the following byte, so an escaped
//! quote never counts as an unescaped one.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Default read block size for a single quote-scan worker.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteScanResult {
    pub start: u64,
    pub end: u64,
    pub num_quotes: u64,
    pub first_quoted_newline: Option<u64>,
    pub first_unquoted_newline: Option<u64>,
    /// Quotes seen strictly before `first_unquoted_newline`, needed by the
    /// chunker's reconciliation sweep to split this chunk's quote count at
    /// the chosen terminator.
    pub num_quotes_before_first_unquoted_newline: u64,
    pub num_quotes_before_first_quoted_newline: u64,
    pub ends_with_newline: bool,
}

/// Scans `[start, end)` of `path`, reading `block_size`-sized blocks.
pub fn scan_quotes(path: &std::path::Path, start: u64, end: u64, file_size: u64, block_size: usize) -> Result<QuoteScanResult> {
    let mut file = File::open(path).map_err(|source| Error::IoOpen {
        path: path.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(start)).map_err(|source| Error::IoRead {
        path: path.to_path_buf(),
        chunk: 0,
        source,
    })?;

    let mut buf = vec![0u8; block_size.max(1)];
    let mut current = start;
    let mut in_quote = false;
    let mut escape_pending = false;
    let mut num_quotes = 0u64;
    let mut first_quoted_newline = None;
    let mut first_unquoted_newline = None;
    let mut num_quotes_before_first_unquoted_newline = 0u64;
    let mut num_quotes_before_first_quoted_newline = 0u64;
    let mut last_byte = None;

    while current < end {
        let want = std::cmp::min((end - current) as usize, buf.len());
        let nread = file.read(&mut buf[..want]).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            chunk: 0,
            source,
        })?;
        if nread == 0 {
            break;
        }
        for (i, &b) in buf[..nread].iter().enumerate() {
            let pos = current + i as u64;
            if escape_pending {
                escape_pending = false;
                last_byte = Some(b);
                continue;
            }
            match b {
                b'\\' => {
                    escape_pending = true;
                }
                b'"' => {
                    num_quotes += 1;
                    in_quote = !in_quote;
                }
                b'\n' => {
                    if in_quote {
                        if first_quoted_newline.is_none() {
                            first_quoted_newline = Some(pos);
                            num_quotes_before_first_quoted_newline = num_quotes;
                        }
                    } else if first_unquoted_newline.is_none() {
                        first_unquoted_newline = Some(pos);
                        num_quotes_before_first_unquoted_newline = num_quotes;
                    }
                }
                _ => {}
            }
            last_byte = Some(b);
        }
        current += nread as u64;
    }

    let ends_with_newline = last_byte == Some(b'\n') || current == file_size;

    Ok(QuoteScanResult {
        start,
        end,
        num_quotes,
        first_quoted_newline,
        first_unquoted_newline,
        num_quotes_before_first_unquoted_newline,
        num_quotes_before_first_quoted_newline,
        ends_with_newline,
    })
}
