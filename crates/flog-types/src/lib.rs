//! Shared types for flog
//!
//! This crate contains the severity vocabulary used across the flog crates.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

// ============================================================================
// Severity Levels
// ============================================================================

/// Log severity level
///
/// Levels are ordered from least to most severe, which is what threshold
/// comparisons (`--min`, `--max`) use. Sets of levels are expressed with
/// [`LevelSet`] instead, which deliberately has no ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Level {
    /// No level was detected and none could be inherited
    #[default]
    Undefined,
    /// A level-shaped token was found but not recognized
    Unknown,
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
    Fatal,
    Panic,
}

impl Level {
    /// Every level except [`Level::Undefined`], in ascending order
    pub const SINGULAR: [Level; 9] = [
        Self::Unknown,
        Self::Trace,
        Self::Debug,
        Self::Information,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Fatal,
        Self::Panic,
    ];

    /// Every level, in ascending order
    pub const ALL: [Level; 10] = [
        Self::Undefined,
        Self::Unknown,
        Self::Trace,
        Self::Debug,
        Self::Information,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Fatal,
        Self::Panic,
    ];

    /// Parse a severity token found inside a log line.
    ///
    /// Lookup is case-insensitive. Tokens that are not a known spelling
    /// yield [`Level::Unknown`]; this never fails.
    pub fn parse(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "t" | "trc" | "trce" | "trac" | "trace" => Self::Trace,
            "d" | "dbg" | "debu" | "dbug" | "debg" | "debug" => Self::Debug,
            "i" | "inf" | "info" | "information" => Self::Information,
            "w" | "wrn" | "warn" | "warning" => Self::Warning,
            "e" | "err" | "erro" | "error" | "fail" => Self::Error,
            "c" | "crit" | "critical" => Self::Critical,
            "f" | "fata" | "fatal" => Self::Fatal,
            "p" | "panic" => Self::Panic,
            _ => Self::Unknown,
        }
    }

    /// Map a numeric severity (pino/bunyan style) to a level
    pub fn from_numeric(value: u64) -> Self {
        match value {
            0..=10 => Self::Trace,
            11..=20 => Self::Debug,
            21..=30 => Self::Information,
            31..=40 => Self::Warning,
            41..=50 => Self::Error,
            51..=60 => Self::Fatal,
            _ => Self::Panic,
        }
    }

    /// Whether this is an actual severity, i.e. not Unknown or Undefined
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Undefined | Self::Unknown)
    }

    /// Bit used for this level inside a [`LevelSet`]. Undefined has none.
    pub fn bit(&self) -> u16 {
        match self {
            Self::Undefined => 0,
            other => 1 << (*other as u16 - 1),
        }
    }

    /// Canonical display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Unknown => "Unknown",
            Self::Trace => "Trace",
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Critical => "Critical",
            Self::Fatal => "Fatal",
            Self::Panic => "Panic",
        }
    }

    /// Accepted spellings for user input, used in help output
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::Undefined => &["0", "n", "nil", "null", "none", "unde", "undefined"],
            Self::Unknown => &["1", "u", "?", "ukwn", "unkn", "unknown"],
            Self::Trace => &["2", "t", "tra", "trac", "trce", "trace"],
            Self::Debug => &["3", "d", "deb", "dbg", "debu", "debg", "dbug", "debug"],
            Self::Information => &["4", "i", "inf", "info", "information"],
            Self::Warning => &["5", "w", "wrn", "warn", "warning"],
            Self::Error => &["6", "fail", "e", "err", "erro", "errr", "error"],
            Self::Critical => &["7", "c", "crt", "crit", "critical"],
            Self::Fatal => &["8", "f", "fata", "fatl", "fatal"],
            Self::Panic => &["9", "p", "pan", "pnc", "pani", "panic"],
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when user input does not name a severity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity: {0:?}")]
pub struct LevelParseError(pub String);

impl FromStr for Level {
    type Err = LevelParseError;

    /// Strict parsing for configuration values. Unlike [`Level::parse`]
    /// this accepts numeric ranks and rejects unknown spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.synonyms().contains(&lower.as_str()))
            .ok_or_else(|| LevelParseError(s.to_string()))
    }
}

impl TryFrom<String> for Level {
    type Error = LevelParseError;

    fn try_from(value: String) -> Result<Self, LevelParseError> {
        value.parse()
    }
}

// ============================================================================
// Level Sets
// ============================================================================

/// A set of levels stored as a bitmask.
///
/// Used for include/exclude lists. It has no ordering on purpose: a set of
/// several levels is never a threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct LevelSet(u16);

impl LevelSet {
    pub const EMPTY: LevelSet = LevelSet(0);

    pub fn new() -> Self {
        Self::EMPTY
    }

    /// Raw bitmask
    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, level: Level) {
        self.0 |= level.bit();
    }

    /// Whether the level's bit is set. Undefined is never contained.
    pub fn contains(&self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    /// Member levels in ascending order
    pub fn levels(&self) -> impl Iterator<Item = Level> + '_ {
        Level::SINGULAR.into_iter().filter(|l| self.contains(*l))
    }

    /// Format member names joined by `delim`, or "Undefined" when empty
    pub fn to_string_delim(&self, delim: char) -> String {
        let mut out = String::new();
        for level in self.levels() {
            if !out.is_empty() {
                out.push(delim);
            }
            out.push_str(level.as_str());
        }
        if out.is_empty() {
            out.push_str(Level::Undefined.as_str());
        }
        out
    }
}

impl From<Level> for LevelSet {
    fn from(level: Level) -> Self {
        LevelSet(level.bit())
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        let mut set = LevelSet::new();
        for level in iter {
            set.insert(level);
        }
        set
    }
}

impl BitOr for LevelSet {
    type Output = LevelSet;

    fn bitor(self, rhs: LevelSet) -> LevelSet {
        LevelSet(self.0 | rhs.0)
    }
}

impl BitOr<Level> for LevelSet {
    type Output = LevelSet;

    fn bitor(self, rhs: Level) -> LevelSet {
        LevelSet(self.0 | rhs.bit())
    }
}

impl BitOr for Level {
    type Output = LevelSet;

    fn bitor(self, rhs: Level) -> LevelSet {
        LevelSet(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<Level> for LevelSet {
    fn bitor_assign(&mut self, rhs: Level) {
        self.insert(rhs);
    }
}

impl fmt::Display for LevelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_delim('|'))
    }
}

// ============================================================================
// Parsed Lines
// ============================================================================

/// One physical input line after classification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    /// Original line as read, escape sequences included
    pub text: String,

    /// Detected or inherited level
    pub level: Level,

    /// Parsed timestamp (if available)
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl ParsedLine {
    pub fn new(text: String, level: Level, timestamp: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            text,
            level,
            timestamp,
        }
    }
}
