//! Output populators.
//!
//! Safe, allocation-light readers over a merged `Table` column: no
//! `unsafe`/FFI surface, since driving values into a foreign host buffer is
//! out of scope here.

use crate::column::CatIndexVec;
use crate::error::{Error, Result};
use crate::loader::{ColumnData, MergedColumn};
use crate::numeric::NumericType;

/// Reads a column's per-row numeric values: the numbers of a `Numeric`
/// column, or the dictionary codes of a `Categorical` one. Not valid for a
/// `Text` column.
pub struct ColumnPopulator<'a> {
    column: &'a MergedColumn,
}

impl<'a> ColumnPopulator<'a> {
    pub fn new(column: &'a MergedColumn) -> Self {
        ColumnPopulator { column }
    }

    pub fn size(&self) -> usize {
        self.column.len()
    }

    /// The element storage type a caller should expect: the widening
    /// vector's current numeric type for a `Numeric` column, or the
    /// dictionary code width for a `Categorical` one.
    pub fn type_name(&self) -> &'static str {
        match &self.column.data {
            ColumnData::Numeric(v) => match v.current_type() {
                NumericType::U8 => "u8",
                NumericType::I8 => "i8",
                NumericType::I16 => "i16",
                NumericType::I32 => "i32",
                NumericType::I64 => "i64",
                NumericType::F32 => "f32",
                NumericType::F64 => "f64",
            },
            ColumnData::Categorical { codes, .. } => match codes {
                CatIndexVec::U8(_) => "u8",
                CatIndexVec::U16(_) => "u16",
                CatIndexVec::U32(_) => "u32",
                CatIndexVec::U64(_) => "u64",
            },
            ColumnData::Text(_) => "string",
        }
    }

    /// Copies every row's value (as `f64`) into `buffer`, which must be at
    /// least `size()` long.
    pub fn copy_into_buffer(&self, buffer: &mut [f64]) -> Result<()> {
        match &self.column.data {
            ColumnData::Numeric(v) => {
                if buffer.len() < v.len() {
                    return Err(Error::Internal(format!(
                        "buffer of length {} is too short for column '{}' ({} rows)",
                        buffer.len(),
                        self.column.name,
                        v.len()
                    )));
                }
                v.copy_into(buffer);
                Ok(())
            }
            ColumnData::Categorical { codes, .. } => {
                if buffer.len() < codes.len() {
                    return Err(Error::Internal(format!(
                        "buffer of length {} is too short for column '{}' ({} rows)",
                        buffer.len(),
                        self.column.name,
                        codes.len()
                    )));
                }
                for i in 0..codes.len() {
                    buffer[i] = codes.get(i) as f64;
                }
                Ok(())
            }
            ColumnData::Text(_) => Err(Error::Internal(format!(
                "column '{}' holds text, not numeric data",
                self.column.name
            ))),
        }
    }

    /// Streams every row's value through `sink`, in row order.
    pub fn insert(&self, mut sink: impl FnMut(f64)) -> Result<()> {
        match &self.column.data {
            ColumnData::Numeric(v) => {
                for i in 0..v.len() {
                    sink(v.get_f64(i));
                }
                Ok(())
            }
            ColumnData::Categorical { codes, .. } => {
                for i in 0..codes.len() {
                    sink(codes.get(i) as f64);
                }
                Ok(())
            }
            ColumnData::Text(_) => Err(Error::Internal(format!(
                "column '{}' holds text, not numeric data",
                self.column.name
            ))),
        }
    }

    /// Same as `insert`, but consumes the populator. `f64` rows are `Copy`,
    /// so there's no ownership to transfer here beyond what `insert`
    /// already gives the sink; this exists so every populator in the crate
    /// exposes the same `insert`/`insert_and_forget` pair.
    pub fn insert_and_forget(self, sink: impl FnMut(f64)) -> Result<()> {
        self.insert(sink)
    }
}

/// Reads a flat string vector: a `Text` column's row values, or a
/// `Categorical` column's level-name dictionary.
pub struct StringVectorPopulator<'a> {
    values: &'a [String],
}

impl<'a> StringVectorPopulator<'a> {
    pub fn new(values: &'a [String]) -> Self {
        StringVectorPopulator { values }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn insert(&self, mut sink: impl FnMut(&str)) {
        for value in self.values {
            sink(value);
        }
    }

    /// Like `insert`, but hands the sink an owned `String` (cloned out of
    /// the table) instead of a borrow, for callers that need to keep the
    /// value past the table's lifetime.
    pub fn insert_and_forget(&self, mut sink: impl FnMut(String)) {
        for value in self.values {
            sink(value.clone());
        }
    }

    pub fn as_slice(&self) -> &[String] {
        self.values
    }
}

impl MergedColumn {
    /// A populator over this column's per-row numeric values (or
    /// categorical codes). `Err` if the column is `Text`.
    pub fn values(&self) -> ColumnPopulator<'_> {
        ColumnPopulator::new(self)
    }

    /// The level-name dictionary, if this column is `Categorical`.
    pub fn levels(&self) -> Option<StringVectorPopulator<'_>> {
        match &self.data {
            ColumnData::Categorical { levels, .. } => Some(StringVectorPopulator::new(levels)),
            _ => None,
        }
    }

    /// This column's row values as strings, if it is `Text`.
    pub fn text(&self) -> Option<StringVectorPopulator<'_>> {
        match &self.data {
            ColumnData::Text(values) => Some(StringVectorPopulator::new(values)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Semantics;
    use crate::numeric::NumericVec;

    fn numeric_column() -> MergedColumn {
        let mut v = NumericVec::new();
        v.push_int(1);
        v.push_int(2);
        v.push_int(3);
        MergedColumn {
            name: "n".to_string(),
            semantics: Semantics::Numeric,
            data: ColumnData::Numeric(v),
        }
    }

    fn categorical_column() -> MergedColumn {
        let mut codes = CatIndexVec::default();
        codes.push(0);
        codes.push(1);
        codes.push(0);
        MergedColumn {
            name: "c".to_string(),
            semantics: Semantics::Categorical,
            data: ColumnData::Categorical {
                codes,
                levels: vec!["red".to_string(), "blue".to_string()],
            },
        }
    }

    fn text_column() -> MergedColumn {
        MergedColumn {
            name: "t".to_string(),
            semantics: Semantics::Text,
            data: ColumnData::Text(vec!["a".to_string(), "bb".to_string()]),
        }
    }

    #[test]
    fn numeric_populator_copies_values() {
        let col = numeric_column();
        let pop = col.values();
        assert_eq!(pop.size(), 3);
        assert_eq!(pop.type_name(), "u8");
        let mut buf = vec![0.0; 3];
        pop.copy_into_buffer(&mut buf).unwrap();
        assert_eq!(buf, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn categorical_populator_exposes_codes_and_levels() {
        let col = categorical_column();
        let pop = col.values();
        assert_eq!(pop.size(), 3);
        let mut buf = vec![0.0; 3];
        pop.copy_into_buffer(&mut buf).unwrap();
        assert_eq!(buf, vec![0.0, 1.0, 0.0]);
        let levels = col.levels().unwrap();
        assert_eq!(levels.as_slice(), &["red".to_string(), "blue".to_string()]);
    }

    #[test]
    fn text_column_has_no_numeric_populator() {
        let col = text_column();
        assert!(col.values().copy_into_buffer(&mut [0.0; 2]).is_err());
        let text = col.text().unwrap();
        assert_eq!(text.size(), 2);
        let mut seen = Vec::new();
        text.insert(|s| seen.push(s.to_string()));
        assert_eq!(seen, vec!["a".to_string(), "bb".to_string()]);
    }

    #[test]
    fn numeric_insert_and_forget_matches_insert() {
        let col = numeric_column();
        let mut seen = Vec::new();
        col.values().insert_and_forget(|v| seen.push(v)).unwrap();
        assert_eq!(seen, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn string_insert_and_forget_yields_owned_strings() {
        let col = text_column();
        let text = col.text().unwrap();
        let mut seen: Vec<String> = Vec::new();
        text.insert_and_forget(|s| seen.push(s));
        assert_eq!(seen, vec!["a".to_string(), "bb".to_string()]);
    }
}
