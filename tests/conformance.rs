// Integration tests driving the public `Loader` API end to end against
// on-disk fixture files, covering the loader's concrete scenarios and
// boundary behaviors.

use colload::{ColumnData, Loader, LoaderOptions, Semantics};
use std::io::Write;

fn fixture(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents).unwrap();
    f.flush().unwrap();
    f
}

fn load(contents: &[u8], configure: impl FnOnce(&mut LoaderOptions)) -> colload::Table {
    let f = fixture(contents);
    let mut options = LoaderOptions::new();
    configure(&mut options);
    let mut loader = Loader::load(f.path(), options).unwrap();
    loader.load_all().unwrap();
    loader.finalize().unwrap()
}

#[test]
fn scenario_1_all_numeric_columns() {
    let table = load(b"a,b,c\n1,2,3\n4,5,6\n", |_| {});
    assert_eq!(table.num_columns(), 3);
    assert_eq!(table.num_rows(), 2);
    for (name, expected) in [("a", [1.0, 4.0]), ("b", [2.0, 5.0]), ("c", [3.0, 6.0])] {
        let col = table.column(name).unwrap();
        assert_eq!(col.semantics, Semantics::Numeric);
        match &col.data {
            ColumnData::Numeric(v) => {
                assert_eq!(v.current_type(), colload::NumericType::U8);
                assert_eq!(v.get_f64(0), expected[0]);
                assert_eq!(v.get_f64(1), expected[1]);
            }
            other => panic!("expected numeric, got {other:?}"),
        }
    }
}

#[test]
fn scenario_2_mixed_numeric_and_categorical_columns() {
    let table = load(b"x,y\n1,hello\n2,hello\n3,world\n", |_| {});
    let x = table.column("x").unwrap();
    assert_eq!(x.semantics, Semantics::Numeric);
    let y = table.column("y").unwrap();
    assert_eq!(y.semantics, Semantics::Categorical);
    match &y.data {
        ColumnData::Categorical { codes, levels } => {
            assert_eq!(levels, &vec!["hello".to_string(), "world".to_string()]);
            assert_eq!((0..codes.len()).map(|i| codes.get(i)).collect::<Vec<_>>(), vec![0, 0, 1]);
        }
        other => panic!("expected categorical, got {other:?}"),
    }
}

#[test]
fn scenario_3_quoted_newlines_inside_a_field() {
    let table = load(b"q\n\"a,b\"\n\"c\nd\"\ne\n", |opts| {
        opts.allow_quoted_newlines(true);
    });
    let q = table.column("q").unwrap();
    assert_eq!(q.len(), 3);
    match &q.data {
        ColumnData::Categorical { levels, .. } => {
            assert!(levels.contains(&"a,b".to_string()));
            assert!(levels.contains(&"c\nd".to_string()));
            assert!(levels.contains(&"e".to_string()));
        }
        ColumnData::Text(values) => {
            assert_eq!(values, &vec!["a,b".to_string(), "c\nd".to_string(), "e".to_string()]);
        }
        other => panic!("expected categorical or text, got {other:?}"),
    }
}

#[test]
fn scenario_4_nan_sentinels_widen_to_float() {
    let table = load(b"n\n1\n2\n?\nNaN\n", |_| {});
    let n = table.column("n").unwrap();
    match &n.data {
        ColumnData::Numeric(v) => {
            assert!(matches!(v.current_type(), colload::NumericType::F32 | colload::NumericType::F64));
            assert_eq!(v.get_f64(0), 1.0);
            assert_eq!(v.get_f64(1), 2.0);
            assert!(v.get_f64(2).is_nan());
            assert!(v.get_f64(3).is_nan());
        }
        other => panic!("expected numeric, got {other:?}"),
    }
}

#[test]
fn scenario_5_escape_sequences_are_decoded_inside_quotes() {
    let table = load(b"s\n\"a\\n\\x41\"\n", |_| {});
    let s = table.column("s").unwrap();
    match &s.data {
        ColumnData::Categorical { levels, .. } => assert_eq!(levels, &vec!["a\nA".to_string()]),
        ColumnData::Text(values) => assert_eq!(values, &vec!["a\nA".to_string()]),
        other => panic!("expected categorical or text, got {other:?}"),
    }
}

#[test]
fn empty_file_has_zero_columns_and_rows() {
    let table = load(b"", |_| {});
    assert_eq!(table.num_columns(), 0);
    assert_eq!(table.num_rows(), 0);
}

#[test]
fn header_only_file_has_zero_rows() {
    let table = load(b"a,b,c\n", |_| {});
    assert_eq!(table.num_columns(), 3);
    assert_eq!(table.num_rows(), 0);
}

#[test]
fn missing_trailing_newline_still_parses_final_record() {
    let table = load(b"a,b\n1,2\n3,4", |_| {});
    assert_eq!(table.num_rows(), 2);
    let b = table.column("b").unwrap();
    match &b.data {
        ColumnData::Numeric(v) => assert_eq!(v.get_f64(1), 4.0),
        other => panic!("expected numeric, got {other:?}"),
    }
}

#[test]
fn crlf_line_endings_match_lf_output() {
    let lf = load(b"a,b\n1,2\n3,4\n", |_| {});
    let crlf = load(b"a,b\r\n1,2\r\n3,4\r\n", |_| {});
    assert_eq!(lf.num_rows(), crlf.num_rows());
    assert_eq!(lf.column("a").unwrap().data_as_f64_vec(), crlf.column("a").unwrap().data_as_f64_vec());
    assert_eq!(lf.column("b").unwrap().data_as_f64_vec(), crlf.column("b").unwrap().data_as_f64_vec());
}

#[test]
fn no_header_forces_synthetic_column_names() {
    let table = load(b"1,2\n3,4\n", |opts| {
        opts.no_header(true);
    });
    assert_eq!(table.num_rows(), 2);
    assert!(table.column("col0").is_some());
    assert!(table.column("col1").is_some());
}

#[test]
fn number_only_mode_rejects_categorical_fallback_implicitly() {
    let table = load(b"a,b\n1,2\n3,4\n", |opts| {
        opts.number_only(true);
    });
    assert_eq!(table.column("a").unwrap().semantics, Semantics::Numeric);
    assert_eq!(table.column("b").unwrap().semantics, Semantics::Numeric);
}

#[test]
fn forced_text_semantics_overrides_numeric_inference() {
    let table = load(b"zipcode\n02139\n02138\n", |opts| {
        opts.force_semantics("zipcode", Semantics::Text);
    });
    let col = table.column("zipcode").unwrap();
    assert_eq!(col.semantics, Semantics::Text);
    match &col.data {
        ColumnData::Text(values) => assert_eq!(values, &vec!["02139".to_string(), "02138".to_string()]),
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn field_count_mismatch_is_reported_as_an_error() {
    let f = fixture(b"a,b,c\n1,2,3\n4,5\n");
    let options = LoaderOptions::new();
    let result = Loader::load(f.path(), options).and_then(|mut loader| loader.load_all());
    assert!(result.is_err());
}

#[test]
fn unterminated_quote_is_reported_as_an_error() {
    let f = fixture(b"a\n\"unterminated\n");
    let options = LoaderOptions::new();
    let result = Loader::load(f.path(), options);
    assert!(result.is_err());
}
