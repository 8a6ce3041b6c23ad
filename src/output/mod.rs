//! Rendering scan results.
//!
//! - [`text`]: human-readable report grouped by source archive
//! - [`json`]: one JSON document with matches, counters and summary
//! - [`csv`]: one row per (archive entry, target file) match
//!
//! ```no_run
//! use arcdupe::output::JsonOutput;
//! # fn demo(report: &arcdupe::ScanReport) {
//! let output = JsonOutput::new(report);
//! println!("{}", output.to_json_pretty().unwrap());
//! # }
//! ```

pub mod csv;
pub mod json;
pub mod text;

pub use self::csv::CsvOutput;
pub use self::json::JsonOutput;
pub use self::text::TextOutput;
