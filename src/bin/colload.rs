//! Entry point for the colload binary.
//!
//! Delegates to [`colload::run()`] and translates its `Result` into a
//! process exit code: `0` on success, `1` on any error.

fn main() {
    if let Err(err) = colload::run() {
        eprintln!("colload: {err:#}");
        std::process::exit(1);
    }
}
