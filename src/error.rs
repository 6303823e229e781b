//! Error kinds for the loader.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot stat file '{path}': {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open file '{path}': {source}")]
    IoOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error reading '{path}' at chunk {chunk}: {source}")]
    IoRead {
        path: PathBuf,
        chunk: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("file ends with an open quote")]
    UnterminatedQuote,

    #[error("file ends with a trailing escape")]
    TrailingEscape,

    #[error("invalid escape character at byte offset {offset}")]
    BadEscape { offset: usize },

    #[error(
        "improper number of columns on line number (advisory, chunk {chunk}): {line}. \
         expected {expected}, found {found}"
    )]
    FieldCountMismatch {
        chunk: usize,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("cannot force column '{column}' to numeric semantics: value '{value}' is not numeric")]
    BadNumericForce { column: String, value: String },

    #[error("internal error: {0}")]
    Internal(String),
}
