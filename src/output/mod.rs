//! Output formatting module
//!
//! Provides various output formats for scenario reports.

mod formatter;

pub use formatter::{write_reports_to_file, OutputFormat, ResultFormatter};
