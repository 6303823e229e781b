//! Parse worker.
//!
//! Scans one finalized chunk byte-by-byte, classifying each field and
//! dispatching it to that column's accumulator.

use crate::bytes::{is_nan_sentinel, parse_float, parse_unquoted_string};
use crate::chunker::ChunkRange;
use crate::column::ColumnAccumulator;
use crate::config::Semantics;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub struct ParseWorkerResult {
    pub columns: Vec<ColumnAccumulator>,
    pub lines_parsed: usize,
}

/// Per-worker parse parameters that don't vary per column.
pub struct ParseParams {
    pub number_only: bool,
    pub block_size: usize,
    pub convert_null_to_space: bool,
}

/// Parses one finalized chunk range into fresh per-column accumulators.
pub fn parse_chunk(
    path: &Path,
    chunk_index: usize,
    range: ChunkRange,
    column_names: &[String],
    forced_semantics: &[Option<Semantics>],
    max_level_name_length: usize,
    max_levels: usize,
    params: &ParseParams,
) -> Result<ParseWorkerResult> {
    let num_columns = forced_semantics.len();
    let mut columns: Vec<ColumnAccumulator> = column_names
        .iter()
        .zip(forced_semantics.iter())
        .map(|(name, f)| ColumnAccumulator::new(name.clone(), *f, max_level_name_length, max_levels))
        .collect();

    if range.start == range.end {
        return Ok(ParseWorkerResult { columns, lines_parsed: 0 });
    }

    let mut file = File::open(path).map_err(|source| Error::IoOpen {
        path: path.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(range.start)).map_err(|source| Error::IoRead {
        path: path.to_path_buf(),
        chunk: chunk_index,
        source,
    })?;

    let mut buf = vec![0u8; params.block_size.max(1)];
    let mut current = range.start;
    let mut column_index = 0usize;
    let mut lines_parsed = 0usize;
    let mut token: Vec<u8> = Vec::new();
    let mut quote_started = false;
    let mut escape_jump = 0u8;
    let mut definitely_string = false;

    // Inclusive end: the chunk's terminator newline belongs to this worker.
    let inclusive_end = range.end;

    while current <= inclusive_end {
        let remaining = inclusive_end - current + 1;
        let want = std::cmp::min(remaining, buf.len() as u64) as usize;
        let nread = file.read(&mut buf[..want]).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            chunk: chunk_index,
            source,
        })?;
        if nread == 0 {
            break;
        }

        if params.number_only {
            let mut i = 0usize;
            while i < nread {
                match buf[i] {
                    b',' => {
                        dispatch_number_only(&mut columns, column_index, &token, num_columns, chunk_index, lines_parsed)?;
                        column_index += 1;
                        token.clear();
                    }
                    b'\n' => {
                        if !token.is_empty() || column_index > 0 {
                            dispatch_number_only(&mut columns, column_index, &token, num_columns, chunk_index, lines_parsed)?;
                            column_index += 1;
                            token.clear();
                        }
                        finish_record(column_index, num_columns, chunk_index, lines_parsed)?;
                        column_index = 0;
                        lines_parsed += 1;
                    }
                    b => token.push(b),
                }
                i += 1;
            }
        } else {
            let mut i = 0usize;
            while i < nread {
                if quote_started {
                    while i < nread {
                        if escape_jump > 0 {
                            token.push(buf[i]);
                            escape_jump -= 1;
                        } else if buf[i] == b'\\' {
                            token.push(buf[i]);
                            escape_jump = 1;
                        } else if buf[i] == b'"' {
                            quote_started = false;
                            i += 1;
                            break;
                        } else {
                            token.push(buf[i]);
                        }
                        i += 1;
                    }
                } else {
                    while i < nread {
                        if buf[i] == b'"' {
                            quote_started = true;
                            definitely_string = true;
                            i += 1;
                            break;
                        } else if buf[i] == b',' {
                            dispatch_token(
                                &mut columns,
                                column_index,
                                &token,
                                definitely_string,
                                num_columns,
                                chunk_index,
                                lines_parsed,
                                params.convert_null_to_space,
                            )?;
                            definitely_string = false;
                            column_index += 1;
                            token.clear();
                        } else if buf[i] == b'\n' {
                            if !token.is_empty() || definitely_string || column_index > 0 {
                                dispatch_token(
                                    &mut columns,
                                    column_index,
                                    &token,
                                    definitely_string,
                                    num_columns,
                                    chunk_index,
                                    lines_parsed,
                                    params.convert_null_to_space,
                                )?;
                                definitely_string = false;
                                column_index += 1;
                                token.clear();
                            }
                            finish_record(column_index, num_columns, chunk_index, lines_parsed)?;
                            column_index = 0;
                            lines_parsed += 1;
                        } else if buf[i] == b'\r' {
                            // DOS line endings: discarded outside quotes.
                        } else {
                            token.push(buf[i]);
                        }
                        i += 1;
                    }
                }
            }
        }
        current += nread as u64;
    }

    if quote_started {
        return Err(Error::UnterminatedQuote);
    }
    if escape_jump > 0 {
        return Err(Error::TrailingEscape);
    }

    // Files without a trailing newline: flush the pending field and record.
    if !token.is_empty() {
        if params.number_only {
            dispatch_number_only(&mut columns, column_index, &token, num_columns, chunk_index, lines_parsed)?;
        } else {
            dispatch_token(
                &mut columns,
                column_index,
                &token,
                definitely_string,
                num_columns,
                chunk_index,
                lines_parsed,
                params.convert_null_to_space,
            )?;
        }
        column_index += 1;
    }
    if column_index > 0 {
        finish_record(column_index, num_columns, chunk_index, lines_parsed)?;
        lines_parsed += 1;
    }

    Ok(ParseWorkerResult { columns, lines_parsed })
}

fn finish_record(column_index: usize, num_columns: usize, chunk: usize, line: usize) -> Result<()> {
    if column_index != num_columns {
        return Err(Error::FieldCountMismatch {
            chunk,
            line: line + 1,
            expected: num_columns,
            found: column_index,
        });
    }
    Ok(())
}

fn check_bounds(column_index: usize, num_columns: usize, chunk: usize, line: usize) -> Result<()> {
    if column_index >= num_columns {
        return Err(Error::FieldCountMismatch {
            chunk,
            line: line + 1,
            expected: num_columns,
            found: column_index + 1,
        });
    }
    Ok(())
}

fn dispatch_number_only(
    columns: &mut [ColumnAccumulator],
    column_index: usize,
    token: &[u8],
    num_columns: usize,
    chunk: usize,
    line: usize,
) -> Result<()> {
    check_bounds(column_index, num_columns, chunk, line)?;
    let mut i = 0;
    while i < token.len() && token[i].is_ascii_whitespace() {
        i += 1;
    }
    if i < token.len() {
        let rest = &token[i..];
        if is_nan_sentinel(rest) {
            columns[column_index].process_float(f64::NAN);
        } else {
            classify_number_only(&mut columns[column_index], token, i);
        }
    } else {
        // Empty token at end of a number-only file/record: treated as 0.
        columns[column_index].process_integer(0);
    }
    Ok(())
}

fn dispatch_token(
    columns: &mut [ColumnAccumulator],
    column_index: usize,
    token: &[u8],
    definitely_string: bool,
    num_columns: usize,
    chunk: usize,
    line: usize,
    convert_null_to_space: bool,
) -> Result<()> {
    check_bounds(column_index, num_columns, chunk, line)?;
    let column = &mut columns[column_index];

    // Forced-Text columns never run the numeric classifier: doing so would
    // round-trip the token through `fast_atoi`/`parse_float` and lose its
    // original formatting (leading zeros, trailing zeros, sign notation).
    if column.forced_semantics == Some(Semantics::Text) {
        let decoded = parse_unquoted_string(token, convert_null_to_space)?;
        column.process_token(decoded.as_bytes())?;
        return Ok(());
    }

    if definitely_string {
        let decoded = parse_unquoted_string(token, convert_null_to_space)?;
        column.process_token(decoded.as_bytes())?;
        return Ok(());
    }

    let mut i = 0;
    while i < token.len() && token[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= token.len() {
        let decoded = parse_unquoted_string(token, convert_null_to_space)?;
        column.process_token(decoded.as_bytes())?;
        return Ok(());
    }
    if is_nan_sentinel(&token[i..]) {
        column.process_float(f64::NAN);
        return Ok(());
    }
    classify_and_dispatch(column, token, i, convert_null_to_space)?;
    Ok(())
}

/// Number-only classification: integer vs. float, with no categorical
/// fallback (a number-only file is assumed well-formed numerically).
fn classify_number_only(column: &mut ColumnAccumulator, token: &[u8], start: usize) {
    let mut i = start;
    if i < token.len() && token[i] == b'-' {
        i += 1;
    }
    while i < token.len() && token[i].is_ascii_digit() {
        i += 1;
    }
    if i < token.len() && matches!(token[i], b'.' | b'E' | b'e') {
        column.process_float(parse_float(token));
    } else {
        column.process_integer(crate::bytes::fast_atoi(token));
    }
}

/// Walks a digit/`.`/exponent state machine classifying the token as
/// integer, float, or neither, and dispatches to the matching accumulator
/// method. `start` skips leading whitespace already stripped by the caller.
fn classify_and_dispatch(column: &mut ColumnAccumulator, token: &[u8], start: usize, convert_null_to_space: bool) -> Result<()> {
    let mut i = start;
    if i < token.len() && token[i] == b'-' {
        i += 1;
    }
    let mut integer_possible = i < token.len() && token[i].is_ascii_digit();
    while i < token.len() && integer_possible {
        integer_possible = token[i].is_ascii_digit();
        i += 1;
    }
    let mut float_possible = false;
    let mut exp_possible = false;
    if integer_possible && i < token.len() {
        integer_possible = false;
        float_possible = token[i] == b'.';
        i += 1;
        while i < token.len() && float_possible {
            float_possible = token[i].is_ascii_digit();
            i += 1;
        }
        if float_possible && i < token.len() {
            float_possible = false;
            exp_possible = token[i] == b'E' || token[i] == b'e';
            i += 1;
            if exp_possible && i < token.len() {
                if token[i] == b'+' || token[i] == b'-' {
                    i += 1;
                    exp_possible = i < token.len() && token[i].is_ascii_digit();
                    i += 1;
                    while i < token.len() && exp_possible {
                        exp_possible = token[i].is_ascii_digit();
                        i += 1;
                    }
                } else if i < token.len() && token[i].is_ascii_digit() {
                    while i < token.len() && exp_possible {
                        exp_possible = token[i].is_ascii_digit();
                        i += 1;
                    }
                } else {
                    exp_possible = false;
                }
            } else {
                exp_possible = false;
            }
        }
    }

    if integer_possible {
        column.process_integer(crate::bytes::fast_atoi(token));
    } else if float_possible || exp_possible {
        column.process_float(parse_float(token));
    } else {
        // Not numeric: stringify the raw token through the same decode path
        // as a quoted field.
        let decoded =
            parse_unquoted_string(token, convert_null_to_space).unwrap_or_else(|_| String::from_utf8_lossy(token).into_owned());
        column.process_token(decoded.as_bytes())?;
    }
    Ok(())
}
