//! Parsers for raw tool output
//!
//! Lines that fail to match an expected pattern are logged and skipped;
//! parsers only error when zero usable lines remain where at least one
//! was required.

pub mod browse;
pub mod diagnostics;
pub mod spans;
pub mod tabs;

pub use browse::parse_browse_line;
pub use diagnostics::{parse_check_lines, CheckMode, ParsedDiagnostics};
pub use spans::parse_span_output;
pub use tabs::{tab_shift_column, tab_shift_point, tab_unshift_column, tab_unshift_point};
