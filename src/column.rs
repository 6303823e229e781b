//! Column descriptor and per-(worker, column) accumulator.
//!
//! Each accumulator holds exactly one of three payloads at a time
//! (`number_data`, `cat_data`+`cat_keys`, or `text_data`), transitioning
//! numeric -> categorical -> text as incompatible values show up, and
//! demoting straight to text once a categorical column's level count or
//! level-name length crosses its configured cap.

use crate::bytes::{is_nan_sentinel, parse_float};
use crate::config::Semantics;
use crate::error::{Error, Result};
use crate::numeric::NumericVec;

/// A widening unsigned index vector for categorical codes: `u8 < u16 < u32 < u64`.
#[derive(Debug, Clone)]
pub enum CatIndexVec {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl Default for CatIndexVec {
    fn default() -> Self {
        CatIndexVec::U8(Vec::new())
    }
}

impl CatIndexVec {
    pub fn len(&self) -> usize {
        match self {
            CatIndexVec::U8(v) => v.len(),
            CatIndexVec::U16(v) => v.len(),
            CatIndexVec::U32(v) => v.len(),
            CatIndexVec::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> u64 {
        match self {
            CatIndexVec::U8(v) => v[i] as u64,
            CatIndexVec::U16(v) => v[i] as u64,
            CatIndexVec::U32(v) => v[i] as u64,
            CatIndexVec::U64(v) => v[i],
        }
    }

    pub fn clear(&mut self) {
        *self = CatIndexVec::default();
    }

    fn widen_to(&mut self, target_u64: bool, target_u32: bool, target_u16: bool) {
        let taken = std::mem::replace(self, CatIndexVec::U8(Vec::new()));
        *self = match taken {
            CatIndexVec::U8(v) if target_u64 => CatIndexVec::U64(v.into_iter().map(u64::from).collect()),
            CatIndexVec::U8(v) if target_u32 => CatIndexVec::U32(v.into_iter().map(u32::from).collect()),
            CatIndexVec::U8(v) if target_u16 => CatIndexVec::U16(v.into_iter().map(u16::from).collect()),
            CatIndexVec::U16(v) if target_u64 => CatIndexVec::U64(v.into_iter().map(u64::from).collect()),
            CatIndexVec::U16(v) if target_u32 => CatIndexVec::U32(v.into_iter().map(u32::from).collect()),
            CatIndexVec::U32(v) if target_u64 => CatIndexVec::U64(v.into_iter().map(u64::from).collect()),
            other => other,
        };
    }

    pub fn push(&mut self, idx: usize) {
        let fits_u8 = idx <= u8::MAX as usize;
        let fits_u16 = idx <= u16::MAX as usize;
        let fits_u32 = idx <= u32::MAX as usize;
        match self {
            CatIndexVec::U8(v) if fits_u8 => v.push(idx as u8),
            CatIndexVec::U16(v) if fits_u16 => v.push(idx as u16),
            CatIndexVec::U32(v) if fits_u32 => v.push(idx as u32),
            CatIndexVec::U64(v) => v.push(idx as u64),
            _ => {
                self.widen_to(!fits_u32, !fits_u16 && fits_u32, !fits_u8 && fits_u16);
                self.push(idx);
            }
        }
    }
}

/// Smallest unsigned index width that fits a dictionary of `len` entries.
pub fn index_width_for(len: usize) -> &'static str {
    if len <= u8::MAX as usize + 1 {
        "u8"
    } else if len <= u16::MAX as usize + 1 {
        "u16"
    } else if len <= u32::MAX as usize + 1 {
        "u32"
    } else {
        "u64"
    }
}

/// Per-(worker, column) accumulator and its numeric/categorical/text state machine.
#[derive(Debug, Clone, Default)]
pub struct ColumnAccumulator {
    pub name: String,
    pub number_data: NumericVec,
    pub cat_data: CatIndexVec,
    pub cat_ids: std::collections::HashMap<String, usize>,
    pub cat_keys: Vec<String>,
    pub text_data: Vec<String>,
    pub forced_semantics: Option<Semantics>,
    pub max_level_name_length: usize,
    pub max_levels: usize,
}

impl ColumnAccumulator {
    pub fn new(name: impl Into<String>, forced_semantics: Option<Semantics>, max_level_name_length: usize, max_levels: usize) -> Self {
        ColumnAccumulator {
            name: name.into(),
            forced_semantics,
            max_level_name_length,
            max_levels,
            ..Default::default()
        }
    }

    pub fn semantics(&self) -> Semantics {
        if !self.cat_data.is_empty() || !self.cat_keys.is_empty() {
            Semantics::Categorical
        } else if !self.text_data.is_empty() {
            Semantics::Text
        } else if !self.number_data.is_empty() {
            Semantics::Numeric
        } else {
            Semantics::Unknown
        }
    }

    pub fn len(&self) -> usize {
        if !self.text_data.is_empty() {
            self.text_data.len()
        } else if !self.cat_data.is_empty() {
            self.cat_data.len()
        } else {
            self.number_data.len()
        }
    }

    fn already_categorical_or_text(&self) -> bool {
        !self.cat_data.is_empty() || !self.cat_keys.is_empty() || !self.text_data.is_empty()
    }

    pub fn process_integer(&mut self, v: i64) {
        if self.forced_semantics == Some(Semantics::Text) {
            self.text_data.push(v.to_string());
            return;
        }
        if matches!(self.forced_semantics, Some(Semantics::Categorical)) || self.already_categorical_or_text() {
            let s = v.to_string();
            self.promote_and_store(s.as_bytes());
        } else {
            self.number_data.push_int(v);
        }
    }

    pub fn process_float(&mut self, v: f64) {
        if self.forced_semantics == Some(Semantics::Text) {
            self.text_data.push(format_float(v));
            return;
        }
        if matches!(self.forced_semantics, Some(Semantics::Categorical)) || self.already_categorical_or_text() {
            let s = format_float(v);
            self.promote_and_store(s.as_bytes());
        } else {
            self.number_data.push_float(v);
        }
    }

    /// `bytes` is already-decoded text (escapes resolved, quotes stripped)
    /// from a token the scanner could not classify as numeric. Honors
    /// `forced_semantics`: Numeric parses the token or raises
    /// `BadNumericForce`, Text appends it verbatim, anything else runs
    /// ordinary numeric/categorical/text auto-promotion.
    pub fn process_token(&mut self, bytes: &[u8]) -> Result<()> {
        if self.forced_semantics == Some(Semantics::Numeric) {
            return self.force_numeric(bytes);
        }
        if self.forced_semantics == Some(Semantics::Text) {
            self.text_data.push(String::from_utf8_lossy(bytes).into_owned());
            return Ok(());
        }
        self.promote_and_store(bytes);
        Ok(())
    }

    fn force_numeric(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            self.number_data.push_int(0);
            return Ok(());
        }
        if is_nan_sentinel(bytes) {
            self.number_data.push_float(f64::NAN);
            return Ok(());
        }
        let v = parse_float(bytes);
        if v.is_nan() {
            return Err(Error::BadNumericForce {
                column: self.name.clone(),
                value: String::from_utf8_lossy(bytes).into_owned(),
            });
        }
        self.number_data.push_float(v);
        Ok(())
    }

    /// Infallible numeric -> categorical/text auto-promotion: stringifies a
    /// value once the column can no longer stay purely numeric. Shared by
    /// `process_integer`/`process_float`'s promotion path and by
    /// `process_token` for unforced columns.
    fn promote_and_store(&mut self, bytes: &[u8]) {
        if self.text_data.is_empty() && !self.number_data.is_empty() {
            if bytes.is_empty() {
                // Zero-length token policy: preserves row length for an
                // otherwise purely numeric column.
                self.number_data.push_int(0);
                return;
            }
            self.convert_numbers_to_categorical();
        }
        if !self.text_data.is_empty() {
            self.text_data.push(String::from_utf8_lossy(bytes).into_owned());
            return;
        }
        let key = String::from_utf8_lossy(bytes).into_owned();
        self.intern(key);
    }

    fn convert_numbers_to_categorical(&mut self) {
        let taken = std::mem::take(&mut self.number_data);
        for i in 0..taken.len() {
            let s = format_float(taken.get_f64(i));
            self.intern(s);
        }
    }

    fn intern(&mut self, key: String) {
        if key.len() > self.max_level_name_length {
            self.promote_to_text();
            self.text_data.push(key);
            return;
        }
        let idx = if let Some(&idx) = self.cat_ids.get(&key) {
            idx
        } else {
            let idx = self.cat_keys.len();
            self.cat_keys.push(key.clone());
            self.cat_ids.insert(key, idx);
            idx
        };
        self.cat_data.push(idx);
        if self.cat_keys.len() > self.max_levels {
            self.promote_to_text();
        }
    }

    /// Forces this accumulator into Categorical (if it's currently Numeric)
    /// without changing an already-Categorical or already-Text accumulator.
    /// Used by the merge step when a sibling worker's column turned out
    /// non-numeric.
    pub fn force_categorical(&mut self) {
        if self.already_categorical_or_text() {
            return;
        }
        if !self.number_data.is_empty() {
            self.convert_numbers_to_categorical();
        }
    }

    /// Forces this accumulator all the way to Text, materializing any
    /// numeric or categorical data as strings. Used by the merge step when
    /// any sibling worker's column ended up Text.
    pub fn force_text(&mut self) {
        if !self.text_data.is_empty() {
            return;
        }
        if !self.number_data.is_empty() {
            self.convert_numbers_to_categorical();
        }
        if !self.cat_data.is_empty() || !self.cat_keys.is_empty() {
            self.promote_to_text();
        }
    }

    fn promote_to_text(&mut self) {
        let mut text = Vec::with_capacity(self.cat_data.len());
        for i in 0..self.cat_data.len() {
            let idx = self.cat_data.get(i) as usize;
            text.push(self.cat_keys[idx].clone());
        }
        self.text_data = text;
        self.cat_data.clear();
        self.cat_ids.clear();
        self.cat_keys.clear();
    }
}

/// Locale-independent formatting, shared by numeric-to-categorical
/// conversion paths.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v}")
    }
}

/// Column descriptor: name plus semantics, created before parsing and
/// mutated only by the merge step.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantics: Semantics,
    pub forced_semantics: Option<Semantics>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, forced_semantics: Option<Semantics>) -> Self {
        ColumnDescriptor {
            name: name.into(),
            semantics: Semantics::Unknown,
            forced_semantics,
        }
    }
}
