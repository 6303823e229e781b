//! Header parser.
//!
//! Reads from offset 0 until the first unquoted newline, sharing the
//! quote/escape token-boundary rules of the body parser.

use crate::bytes::parse_unquoted_string;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub struct HeaderInfo {
    pub column_names: Vec<String>,
    pub end_of_header: u64,
    pub has_header: bool,
}

/// Parses the header line of `path`. `no_header` forces synthetic
/// `col0, col1, …` names and an `end_of_header` of 0, so the chunker covers
/// the whole file as data.
pub fn parse_header(path: &Path, no_header: bool, convert_null_to_space: bool, block_size: usize) -> Result<HeaderInfo> {
    let metadata = std::fs::metadata(path).map_err(|source| Error::StatFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let length = metadata.len();
    let mut file = File::open(path).map_err(|source| Error::IoOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut column_names: Vec<String> = Vec::new();
    let mut token: Vec<u8> = Vec::new();
    let mut buf = vec![0u8; block_size.max(1)];
    let mut current: u64 = 0;
    let mut quote_started: u8 = 0;
    let mut escape_jump = 0u8;
    let mut start_of_header_seen = false;
    let mut end_of_header: u64 = 0;
    let mut end_of_header_found = false;

    'outer: while current < length {
        let want = std::cmp::min((length - current) as usize, buf.len());
        let nread = file.read(&mut buf[..want]).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            chunk: 0,
            source,
        })?;
        if nread == 0 {
            break;
        }
        let mut i = 0usize;
        if !start_of_header_seen {
            while i < nread && !start_of_header_seen {
                if buf[i].is_ascii_whitespace() {
                    i += 1;
                } else {
                    start_of_header_seen = true;
                }
            }
        }
        while i < nread {
            if quote_started != 0 {
                while i < nread {
                    if escape_jump > 0 {
                        token.push(buf[i]);
                        escape_jump -= 1;
                    } else if buf[i] == b'\\' {
                        token.push(buf[i]);
                        escape_jump = 1;
                    } else if buf[i] == quote_started {
                        quote_started = 0;
                        i += 1;
                        break;
                    } else {
                        token.push(buf[i]);
                    }
                    i += 1;
                }
            } else {
                while i < nread {
                    if escape_jump > 0 {
                        token.push(buf[i]);
                        escape_jump -= 1;
                    } else if buf[i] == b'\\' {
                        token.push(buf[i]);
                        escape_jump = 1;
                    } else if buf[i] == b'"' || buf[i] == b'\'' {
                        quote_started = buf[i];
                        i += 1;
                        break;
                    } else if buf[i] == b',' {
                        push_column(&mut column_names, &token, convert_null_to_space)?;
                        token.clear();
                    } else if buf[i] == b'\r' {
                        // DOS line endings waste a byte; ignore it.
                    } else if buf[i] == b'\n' {
                        push_column(&mut column_names, &token, convert_null_to_space)?;
                        token.clear();
                        end_of_header = current + i as u64;
                        end_of_header_found = true;
                        current += nread as u64;
                        break 'outer;
                    } else {
                        token.push(buf[i]);
                    }
                    i += 1;
                }
            }
        }
        current += nread as u64;
    }

    if !start_of_header_seen {
        end_of_header = current;
    }
    if !end_of_header_found && start_of_header_seen {
        // File ends without a trailing newline: the whole file is the header line.
        if !token.is_empty() || !column_names.is_empty() {
            push_column(&mut column_names, &token, convert_null_to_space)?;
        }
        end_of_header = current;
    }

    let unique: HashSet<&String> = column_names.iter().collect();
    let has_header = unique.len() == column_names.len() && !no_header && !column_names.is_empty();

    if !has_header {
        let num_columns = column_names.len();
        column_names = (0..num_columns).map(|i| format!("col{i}")).collect();
        end_of_header = 0;
    }

    Ok(HeaderInfo {
        column_names,
        end_of_header,
        has_header,
    })
}

fn push_column(names: &mut Vec<String>, token: &[u8], convert_null_to_space: bool) -> Result<()> {
    names.push(parse_unquoted_string(token, convert_null_to_space)?);
    Ok(())
}
