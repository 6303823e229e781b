//! Chunker.
//!
//! Splits a file into byte ranges whose boundaries coincide with record
//! terminators, even across quoted newlines and escape sequences. Starts
//! from a tentative equal-size partition, quote-scans each candidate range,
//! then reconciles boundaries with a prefix-parity sweep so a range that
//! opens inside a quoted field absorbs (or yields) bytes from its
//! neighbor until every boundary falls outside a quote.

use crate::error::{Error, Result};
use crate::quote_scan::{self, QuoteScanResult};
use rayon::prelude::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// A finalized, record-aligned chunk. `end` is the *inclusive* byte offset
/// of this chunk's own terminating newline (or, for a chunk that runs off
/// the end of an unterminated file, one past the last byte); the next
/// chunk's `start` is `end + 1`. The parse worker reads `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Unquoted,
    Quoted,
}

/// Mutable working state for one tentative chunk during reconciliation.
#[derive(Debug, Clone)]
struct Working {
    start: u64,
    end: u64,
    num_quotes: u64,
    first_unquoted_newline: Option<u64>,
    num_quotes_before_unquoted: u64,
    first_quoted_newline: Option<u64>,
    num_quotes_before_quoted: u64,
    eliminated: bool,
}

impl From<QuoteScanResult> for Working {
    fn from(r: QuoteScanResult) -> Self {
        Working {
            start: r.start,
            end: r.end,
            num_quotes: r.num_quotes,
            first_unquoted_newline: r.first_unquoted_newline,
            num_quotes_before_unquoted: r.num_quotes_before_first_unquoted_newline,
            first_quoted_newline: r.first_quoted_newline,
            num_quotes_before_quoted: r.num_quotes_before_first_quoted_newline,
            eliminated: false,
        }
    }
}

impl Working {
    fn newline(&self, mode: Mode) -> Option<u64> {
        match mode {
            Mode::Unquoted => self.first_unquoted_newline,
            Mode::Quoted => self.first_quoted_newline,
        }
    }

    fn before(&self, mode: Mode) -> u64 {
        match mode {
            Mode::Unquoted => self.num_quotes_before_unquoted,
            Mode::Quoted => self.num_quotes_before_quoted,
        }
    }
}

/// Phase 1: tentative equal-size partition of `[start, file_length)` into
/// `num_chunks` pieces, with boundaries pushed past any backslash escape
/// sequence they would otherwise split.
fn tentative_partition(path: &Path, start: u64, file_length: u64, num_chunks: usize) -> Result<Vec<(u64, u64)>> {
    let num_chunks = num_chunks.max(1);
    if start >= file_length {
        return Ok(vec![(start, start)]);
    }
    let chunk_size = (file_length - start) / num_chunks as u64;
    let mut file = File::open(path).map_err(|source| Error::IoOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut ranges = Vec::with_capacity(num_chunks);
    let mut chunk_start = start;
    for worker_id in 0..num_chunks {
        let mut chunk_end = if worker_id + 1 == num_chunks {
            file_length
        } else {
            std::cmp::min(file_length, chunk_start + chunk_size)
        };
        if chunk_end < file_length {
            chunk_end = protect_escape_boundary(&mut file, path, chunk_end, file_length)?;
        }
        ranges.push((chunk_start, chunk_end));
        chunk_start = std::cmp::min(file_length, chunk_end + 1);
    }
    Ok(ranges)
}

/// If the byte immediately before `boundary` is an unescaped backslash, push
/// `boundary` forward across the whole escape sequence it introduces.
fn protect_escape_boundary(file: &mut File, path: &Path, boundary: u64, file_length: u64) -> Result<u64> {
    if boundary == 0 {
        return Ok(boundary);
    }
    let prev = read_byte(file, path, boundary - 1)?;
    let Some(b'\\') = prev else { return Ok(boundary) };

    let escape_char = read_byte(file, path, boundary)?;
    let payload = match escape_char {
        Some(b'x') => 2,
        Some(b'u') => 4,
        Some(b'U') => 8,
        Some(_) => 0,
        None => return Err(Error::TrailingEscape),
    };
    Ok(std::cmp::min(file_length, boundary + 1 + payload))
}

fn read_byte(file: &mut File, path: &Path, offset: u64) -> Result<Option<u8>> {
    file.seek(SeekFrom::Start(offset)).map_err(|source| Error::IoRead {
        path: path.to_path_buf(),
        chunk: 0,
        source,
    })?;
    let mut buf = [0u8; 1];
    let n = file.read(&mut buf).map_err(|source| Error::IoRead {
        path: path.to_path_buf(),
        chunk: 0,
        source,
    })?;
    Ok(if n == 0 { None } else { Some(buf[0]) })
}

/// Phase 3: serial prefix-parity reconciliation over the quote-scanned
/// tentative pieces.
///
/// A tentative piece's own first newline is an *internal* record
/// terminator, not a boundary with its neighbor — `cur` already starts at
/// a record boundary, so the cut point for finalizing `cur`'s region has
/// to come from the *next* piece onward (the partial record straddling the
/// tentative boundary finishes early in it). The last surviving piece has
/// no next piece to consult and always runs to the end of the file.
fn reconcile(scans: Vec<QuoteScanResult>, file_length: u64) -> Result<Vec<ChunkRange>> {
    let mut chunks: Vec<Working> = scans.into_iter().map(Working::from).collect();
    let mut finalized = Vec::new();
    let mut quotes_so_far: u64 = 0;
    let mut cur = 0usize;

    while cur < chunks.len() {
        if chunks[cur].eliminated {
            cur += 1;
            continue;
        }
        let mode = if quotes_so_far % 2 == 0 { Mode::Unquoted } else { Mode::Quoted };

        if cur + 1 >= chunks.len() {
            if mode == Mode::Quoted {
                return Err(Error::UnterminatedQuote);
            }
            finalized.push(ChunkRange {
                start: chunks[cur].start,
                end: chunks[cur].end,
            });
            chunks[cur].eliminated = true;
            cur = chunks.len();
            break;
        }

        let mut absorbed_quotes = chunks[cur].num_quotes;
        let mut scan_idx = cur + 1;
        loop {
            if let Some(terminator) = chunks[scan_idx].newline(mode) {
                let before = chunks[scan_idx].before(mode);
                finalized.push(ChunkRange {
                    start: chunks[cur].start,
                    end: terminator,
                });
                quotes_so_far += absorbed_quotes + before;

                for k in cur..scan_idx {
                    chunks[k].eliminated = true;
                }

                let next_start = std::cmp::min(file_length, terminator + 1);
                let survivor = &mut chunks[scan_idx];
                survivor.start = next_start;
                survivor.num_quotes -= before;
                let (other_mode_newline, other_mode_before) = match mode {
                    Mode::Unquoted => (survivor.first_quoted_newline, survivor.num_quotes_before_quoted),
                    Mode::Quoted => (survivor.first_unquoted_newline, survivor.num_quotes_before_unquoted),
                };
                let other_adjusted = match other_mode_newline {
                    Some(other_nl) if other_nl > terminator => Some(other_mode_before.saturating_sub(before)),
                    _ => None,
                };
                match mode {
                    Mode::Unquoted => {
                        survivor.first_unquoted_newline = None;
                        survivor.num_quotes_before_unquoted = 0;
                        match other_adjusted {
                            Some(v) => survivor.num_quotes_before_quoted = v,
                            None => {
                                survivor.first_quoted_newline = None;
                                survivor.num_quotes_before_quoted = 0;
                            }
                        }
                    }
                    Mode::Quoted => {
                        survivor.first_quoted_newline = None;
                        survivor.num_quotes_before_quoted = 0;
                        match other_adjusted {
                            Some(v) => survivor.num_quotes_before_unquoted = v,
                            None => {
                                survivor.first_unquoted_newline = None;
                                survivor.num_quotes_before_unquoted = 0;
                            }
                        }
                    }
                }
                cur = scan_idx;
                break;
            }

            if scan_idx + 1 >= chunks.len() {
                match mode {
                    Mode::Unquoted => {
                        finalized.push(ChunkRange {
                            start: chunks[cur].start,
                            end: chunks[scan_idx].end,
                        });
                        for k in cur..=scan_idx {
                            chunks[k].eliminated = true;
                        }
                        cur = chunks.len();
                    }
                    Mode::Quoted => return Err(Error::UnterminatedQuote),
                }
                break;
            }

            absorbed_quotes += chunks[scan_idx].num_quotes;
            scan_idx += 1;
        }
    }

    finalized.retain(|r| r.start != r.end);
    Ok(finalized)
}

/// Fast path for `allow_quoted_newlines = false`: a single forward scan per
/// tentative chunk snapping its end to the next `\n`, eliminating any
/// subsequent chunk whose start now falls before that boundary.
fn adjust_unquoted_only(path: &Path, mut ranges: Vec<(u64, u64)>, file_length: u64, block_size: usize) -> Result<Vec<ChunkRange>> {
    let mut file = File::open(path).map_err(|source| Error::IoOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buf = vec![0u8; block_size.max(1)];

    let mut worker_id = 0;
    while worker_id < ranges.len() {
        let (start, end) = ranges[worker_id];
        if start == end {
            worker_id += 1;
            continue;
        }
        file.seek(SeekFrom::Start(end)).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            chunk: worker_id,
            source,
        })?;
        let mut current = end;
        let mut new_end = end;
        'scan: while current < file_length {
            let want = std::cmp::min((file_length - current) as usize, buf.len());
            let nread = file.read(&mut buf[..want]).map_err(|source| Error::IoRead {
                path: path.to_path_buf(),
                chunk: worker_id,
                source,
            })?;
            if nread == 0 {
                break;
            }
            for (i, &b) in buf[..nread].iter().enumerate() {
                if b == b'\n' {
                    new_end = current + i as u64;
                    break 'scan;
                }
            }
            current += nread as u64;
            new_end = current;
        }
        ranges[worker_id].1 = new_end;
        for other in ranges.iter_mut().skip(worker_id + 1) {
            if other.0 < new_end && other.1 < new_end {
                other.0 = new_end;
                other.1 = new_end;
            } else if other.0 < new_end {
                other.0 = std::cmp::min(file_length, new_end + 1);
                other.1 = std::cmp::max(other.1, other.0);
            }
        }
        worker_id += 1;
    }

    Ok(ranges
        .into_iter()
        .filter(|&(start, end)| start != end)
        .map(|(start, end)| ChunkRange { start, end })
        .collect())
}

/// Computes the finalized, record-aligned chunk ranges for a file.
pub fn compute_chunks(
    path: &Path,
    start: u64,
    num_chunks: usize,
    allow_quoted_newlines: bool,
    block_size: usize,
) -> Result<Vec<ChunkRange>> {
    let metadata = std::fs::metadata(path).map_err(|source| Error::StatFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let file_length = metadata.len();
    if start >= file_length {
        return Ok(Vec::new());
    }

    let tentative = tentative_partition(path, start, file_length, num_chunks)?;

    if !allow_quoted_newlines {
        return adjust_unquoted_only(path, tentative, file_length, block_size);
    }

    let scans: Vec<QuoteScanResult> = tentative
        .into_par_iter()
        .map(|(s, e)| quote_scan::scan_quotes(path, s, e, file_length, block_size))
        .collect::<Result<Vec<_>>>()?;

    reconcile(scans, file_length)
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
    fn single_chunk_covers_whole_file() {
        let data = b"a,b\nc,d\n";
        let f = write_temp(data);
        let chunks = compute_chunks(f.path(), 0, 1, true, 4096).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, data.len() as u64);
    }

    #[test]
    fn multiple_chunks_align_to_unquoted_newlines() {
        let data = b"aaaa\nbbbb\ncccc\ndddd\n";
        let f = write_temp(data);
        let chunks = compute_chunks(f.path(), 0, 4, true, 8).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 4);
        assert_eq!(chunks[0].start, 0);
        for w in chunks.windows(2) {
            assert!(w[0].end < w[1].start);
        }
        // The file's last byte is itself a newline, so the final chunk's
        // inclusive end lands on that byte, not one past it.
        assert_eq!(chunks.last().unwrap().end, data.len() as u64 - 1);
    }

    #[test]
    fn quoted_newline_spanning_chunk_boundary_is_preserved() {
        // A long quoted field straddling where a naive equal split would land.
        let data = b"x\n\"aaaaaaaaaa\nbbbbbbbbbb\"\ny\n";
        let f = write_temp(data);
        let chunks = compute_chunks(f.path(), 0, 3, true, 8).unwrap();
        // None of the finalized boundaries may fall inside the quoted region.
        let quote_start = data.iter().position(|&b| b == b'"').unwrap() as u64;
        let quote_end = data.iter().rposition(|&b| b == b'"').unwrap() as u64;
        for c in &chunks {
            assert!(c.end <= quote_start || c.end > quote_end, "boundary {} inside quote", c.end);
        }
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let data = b"a,\"unterminated\n";
        let f = write_temp(data);
        let result = compute_chunks(f.path(), 0, 2, true, 8);
        assert!(result.is_err());
    }

    #[test]
    fn fast_path_ignores_quotes() {
        let data = b"a,\"b\nc\"\nd,e\n";
        let f = write_temp(data);
        let chunks = compute_chunks(f.path(), 0, 2, false, 8).unwrap();
        // The quoted newline is treated as a record terminator in the fast path.
        assert!(chunks.iter().any(|c| c.end == data.iter().position(|&b| b == b'\n').unwrap() as u64));
    }

    #[test]
    fn escape_boundary_is_not_split() {
        let mut data = Vec::new();
        data.extend_from_slice(b"aa\\U0001F600bb\n");
        let f = write_temp(&data);
        // Force a tentative boundary near the escape by asking for many chunks.
        let chunks = compute_chunks(f.path(), 0, 4, true, 8).unwrap();
        assert_eq!(chunks[0].start, 0);
        for w in chunks.windows(2) {
            assert!(w[0].end < w[1].start);
        }
        // The file's last byte is itself a newline, so the final chunk's
        // inclusive end lands on that byte, not one past it.
        assert_eq!(chunks.last().unwrap().end, data.len() as u64 - 1);
    }
}
