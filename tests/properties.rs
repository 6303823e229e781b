// Property-based tests over the public Loader API.

use colload::{ColumnData, Loader, LoaderOptions, Semantics};
use proptest::prelude::*;
use std::io::Write;

fn load_csv(contents: &str, configure: impl FnOnce(&mut LoaderOptions)) -> colload::Table {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    let mut options = LoaderOptions::new();
    configure(&mut options);
    let mut loader = Loader::load(f.path(), options).unwrap();
    loader.load_all().unwrap();
    loader.finalize().unwrap()
}

proptest! {
    // A column of pure integers round-trips exactly through the widening
    // numeric vector, regardless of how many worker threads split the file.
    #[test]
    fn numeric_round_trip(values in prop::collection::vec(-1000i64..1000, 1..200), num_threads in 1usize..8) {
        let mut csv = String::from("n\n");
        for v in &values {
            csv.push_str(&v.to_string());
            csv.push('\n');
        }
        let table = load_csv(&csv, |opts| { opts.num_threads(num_threads); });
        let col = table.column("n").unwrap();
        prop_assert_eq!(col.semantics, Semantics::Numeric);
        let got: Vec<f64> = col.data_as_f64_vec();
        let want: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        prop_assert_eq!(got, want);
    }

    // A categorical column's dictionary lookup of each row's merged code
    // always recovers the original string, no matter how the file is split
    // across worker threads.
    #[test]
    fn dictionary_merge_round_trip(values in prop::collection::vec("[a-z]{1,6}", 1..150), num_threads in 1usize..8) {
        let mut csv = String::from("s\n");
        for v in &values {
            csv.push_str(v);
            csv.push('\n');
        }
        let table = load_csv(&csv, |opts| { opts.num_threads(num_threads); });
        let col = table.column("s").unwrap();
        match &col.data {
            ColumnData::Categorical { codes, levels } => {
                prop_assert_eq!(codes.len(), values.len());
                for (i, original) in values.iter().enumerate() {
                    let code = codes.get(i) as usize;
                    prop_assert_eq!(&levels[code], original);
                }
            }
            other => prop_assert!(false, "expected categorical, got {other:?}"),
        }
    }

    // Forcing a column's semantics twice (e.g. a caller re-applying the same
    // override) is the same as forcing it once.
    #[test]
    fn force_semantics_is_idempotent(values in prop::collection::vec(0i64..10_000, 1..50)) {
        let mut csv = String::from("n\n");
        for v in &values {
            csv.push_str(&v.to_string());
            csv.push('\n');
        }
        let once = load_csv(&csv, |opts| { opts.force_semantics("n", Semantics::Text); });
        let twice = load_csv(&csv, |opts| {
            opts.force_semantics("n", Semantics::Text);
            opts.force_semantics("n", Semantics::Text);
        });
        let once_col = once.column("n").unwrap();
        let twice_col = twice.column("n").unwrap();
        prop_assert_eq!(once_col.semantics, twice_col.semantics);
        match (&once_col.data, &twice_col.data) {
            (ColumnData::Text(a), ColumnData::Text(b)) => prop_assert_eq!(a, b),
            _ => prop_assert!(false, "expected both forced to text"),
        }
    }
}
