//! Log processing for flog
//!
//! This crate provides line reading, severity classification, filtering,
//! and the printer that ties them together.

mod filter;
mod omitted;
mod parser;
mod printer;
mod reader;
mod timestamp;

pub use filter::LevelFilter;
pub use omitted::{ConsoleSummary, FlushHandle, LevelCounts, Omissions, SummarySink};
pub use parser::{
    BracketMatcher, Classification, Detection, JsonMatcher, KeyValueMatcher, KlogMatcher,
    LogParser, Matcher, PipeMatcher, PrefixMatcher, TokenMatcher, strip_ansi,
};
pub use printer::{PrintStats, Printer, PrinterState};
pub use reader::{LevelReader, LineReader};
pub use timestamp::{Timestamp, parse_timestamp};

// Re-export types used in our public API
pub use flog_types::{Level, LevelParseError, LevelSet, ParsedLine};
