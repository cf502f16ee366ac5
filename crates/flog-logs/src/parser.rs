use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;

use flog_types::Level;

use crate::timestamp::{Timestamp, from_epoch, parse_timestamp};

/// CSI sequences, OSC sequences and two-byte escapes
static ANSI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("valid ansi regex")
});

/// Outcome of running one matcher against a line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Detection {
    /// The line does not have this matcher's shape
    NoMatch,
    /// The shape matched and the severity token was recognized
    Recognized(Level, Option<Timestamp>),
    /// The shape matched but the severity token was missing or unknown
    Unrecognized(Option<Timestamp>),
}

impl Detection {
    /// Build a detection from a severity token found at a matched position
    fn from_token(token: &str, timestamp: Option<Timestamp>) -> Self {
        match Level::parse(token.trim()) {
            Level::Unknown => Self::Unrecognized(timestamp),
            level => Self::Recognized(level, timestamp),
        }
    }
}

/// A single structural pattern for recognizing a log line
pub trait Matcher: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Inspect a line that has already had escape sequences removed
    fn detect(&self, line: &str) -> Detection;
}

/// Result of classifying one line in isolation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub level: Level,
    pub timestamp: Option<Timestamp>,
    /// Name of the matcher that accepted the line, if any
    pub matcher: Option<&'static str>,
}

impl Classification {
    fn unclassified() -> Self {
        Self {
            level: Level::Undefined,
            timestamp: None,
            matcher: None,
        }
    }
}

/// Log parser for extracting a severity and timestamp from raw log lines
///
/// Runs a fixed, ordered chain of matchers; the first one whose shape fits
/// the line decides the result.
pub struct LogParser {
    matchers: Vec<Box<dyn Matcher>>,
}

impl LogParser {
    /// Create a parser with the built-in matcher chain
    pub fn new() -> Self {
        Self {
            matchers: vec![
                Box::new(JsonMatcher),
                Box::new(PipeMatcher),
                Box::new(KeyValueMatcher),
                Box::new(PrefixMatcher),
                Box::new(KlogMatcher),
                Box::new(BracketMatcher),
                Box::new(TokenMatcher),
            ],
        }
    }

    /// Create a parser with a custom matcher chain
    pub fn with_matchers(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Names of the matchers, in the order they are tried
    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Classify a single line
    pub fn classify(&self, raw: &str) -> Classification {
        let stripped = strip_ansi(raw);

        for matcher in &self.matchers {
            match matcher.detect(&stripped) {
                Detection::NoMatch => continue,
                Detection::Recognized(level, timestamp) => {
                    return Classification {
                        level,
                        timestamp,
                        matcher: Some(matcher.name()),
                    };
                }
                Detection::Unrecognized(timestamp) => {
                    return Classification {
                        level: Level::Unknown,
                        timestamp,
                        matcher: Some(matcher.name()),
                    };
                }
            }
        }

        Classification::unclassified()
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove terminal escape sequences, borrowing when there are none
pub fn strip_ansi(raw: &str) -> Cow<'_, str> {
    if raw.contains('\x1b') {
        ANSI_REGEX.replace_all(raw, "")
    } else {
        Cow::Borrowed(raw)
    }
}

// ============================================================================
// Structured records
// ============================================================================

/// JSON object per line (zap, pino, bunyan, serilog compact, ...)
pub struct JsonMatcher;

const JSON_LEVEL_FIELDS: &[&str] = &[
    "level",
    "lvl",
    "severity",
    "log.level",
    "loglevel",
    "log_level",
    "Level",
    "LEVEL",
    "@l",
];

const JSON_TIME_FIELDS: &[&str] = &[
    "timestamp",
    "time",
    "ts",
    "@timestamp",
    "@t",
    "datetime",
    "date",
];

impl JsonMatcher {
    /// Look up a field by exact key, then as a dotted path into nested objects
    fn lookup<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        if let Some(value) = obj.get(key) {
            return Some(value);
        }
        let mut parts = key.split('.');
        let mut current = obj.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    fn extract_level(obj: &Map<String, Value>) -> Level {
        for field in JSON_LEVEL_FIELDS {
            match Self::lookup(obj, field) {
                Some(Value::String(s)) => return Level::parse(s),
                Some(Value::Number(n)) => {
                    if let Some(num) = n.as_u64() {
                        return Level::from_numeric(num);
                    }
                }
                _ => {}
            }
        }
        Level::Unknown
    }

    fn extract_timestamp(obj: &Map<String, Value>) -> Option<Timestamp> {
        for field in JSON_TIME_FIELDS {
            let parsed = match Self::lookup(obj, field) {
                Some(Value::String(s)) => parse_timestamp(s),
                Some(Value::Number(n)) => n.as_f64().and_then(from_epoch),
                _ => None,
            };
            if parsed.is_some() {
                return parsed;
            }
        }
        None
    }
}

impl Matcher for JsonMatcher {
    fn name(&self) -> &'static str {
        "json"
    }

    fn detect(&self, line: &str) -> Detection {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return Detection::NoMatch;
        }

        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) else {
            return Detection::NoMatch;
        };

        let timestamp = Self::extract_timestamp(&obj);
        match Self::extract_level(&obj) {
            Level::Unknown => Detection::Unrecognized(timestamp),
            level => Detection::Recognized(level, timestamp),
        }
    }
}

// ============================================================================
// Delimited fields
// ============================================================================

/// `2021-01-31 17:33:54.3326|TRACE|Program|Sample` (NLog)
pub struct PipeMatcher;

static PIPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<ts>\d[^|]*?)\s*\|\s*(?P<level>[A-Za-z]+)\s*\|").expect("valid pipe regex")
});

impl Matcher for PipeMatcher {
    fn name(&self) -> &'static str {
        "pipe"
    }

    fn detect(&self, line: &str) -> Detection {
        match PIPE_REGEX.captures(line) {
            Some(caps) => Detection::from_token(&caps["level"], parse_timestamp(&caps["ts"])),
            None => Detection::NoMatch,
        }
    }
}

/// `time="2021-01-31T19:04:01+01:00" level=info msg="..."` (logrus, logfmt)
pub struct KeyValueMatcher;

static KV_LEVEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)(?:level|lvl)=(?:"(?P<quoted>[^"]*)"|(?P<bare>[^\s"]+))"#)
        .expect("valid level attribute regex")
});

static KV_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s)(?:time|ts|timestamp)=(?:"(?P<quoted>[^"]*)"|(?P<bare>[^\s"]+))"#)
        .expect("valid time attribute regex")
});

impl KeyValueMatcher {
    fn attribute<'a>(regex: &Regex, line: &'a str) -> Option<&'a str> {
        let caps = regex.captures(line)?;
        caps.name("quoted")
            .or_else(|| caps.name("bare"))
            .map(|m| m.as_str())
    }
}

impl Matcher for KeyValueMatcher {
    fn name(&self) -> &'static str {
        "key-value"
    }

    fn detect(&self, line: &str) -> Detection {
        let Some(level) = Self::attribute(&KV_LEVEL_REGEX, line) else {
            return Detection::NoMatch;
        };
        let timestamp = Self::attribute(&KV_TIME_REGEX, line).and_then(parse_timestamp);
        Detection::from_token(level, timestamp)
    }
}

/// `WARN[0000] ...` (logrus console) and `fail: Program[0]` (.NET console)
pub struct PrefixMatcher;

static PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<level>[A-Za-z]{3,4})(?:\[|:)").expect("valid prefix regex"));

impl Matcher for PrefixMatcher {
    fn name(&self) -> &'static str {
        "prefix"
    }

    fn detect(&self, line: &str) -> Detection {
        match PREFIX_REGEX.captures(line) {
            Some(caps) => Detection::from_token(&caps["level"], None),
            None => Detection::NoMatch,
        }
    }
}

/// `I0204 09:00:44.662471  1 health.go:55] ...` (klog, glog)
pub struct KlogMatcher;

static KLOG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<level>[IWEFDT])(?P<ts>\d{4} \d{2}:\d{2}:\d{2}(?:\.\d+)?)(?:\s|$)")
        .expect("valid klog regex")
});

impl Matcher for KlogMatcher {
    fn name(&self) -> &'static str {
        "klog"
    }

    fn detect(&self, line: &str) -> Detection {
        match KLOG_REGEX.captures(line) {
            Some(caps) => Detection::from_token(&caps["level"], parse_timestamp(&caps["ts"])),
            None => Detection::NoMatch,
        }
    }
}

/// `Jun-18 14:50+0200 [DEBUG | TEST | main.go:23] ...` (wharf-core)
pub struct BracketMatcher;

static BRACKET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<ts>\w[^\[]*?)\s*\[\s*(?P<level>[A-Za-z]+)\s*\|").expect("valid bracket regex")
});

impl Matcher for BracketMatcher {
    fn name(&self) -> &'static str {
        "bracket"
    }

    fn detect(&self, line: &str) -> Detection {
        match BRACKET_REGEX.captures(line) {
            Some(caps) => Detection::from_token(&caps["level"], parse_timestamp(&caps["ts"])),
            None => Detection::NoMatch,
        }
    }
}

// ============================================================================
// Loose tokens
// ============================================================================

/// Last resort: punctuated level tokens anywhere near the start of the line.
///
/// Only reports a match when a token is recognized, so it never overrides
/// the inherited level with Unknown.
pub struct TokenMatcher;

static DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\d{4}-\d\d?-\d\d?(?:[ ·T]\d\d?[:.]\d\d?(?:[:.]\d+(?:\.\d+)?)?(?:Z|[-+ ]\d\d?(?:[:.]\d{1,3})?)?)?",
    )
    .expect("valid datetime regex")
});

static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\(\w+\)|\[\w+\]|'\w+'|"\w+"|\w+[\[(|:]|=\w+"#).expect("valid token regex")
});

const TOKEN_LIMIT: usize = 5;

impl Matcher for TokenMatcher {
    fn name(&self) -> &'static str {
        "token"
    }

    fn detect(&self, line: &str) -> Detection {
        let (timestamp, rest) = match DATETIME_REGEX.find(line) {
            Some(m) => (parse_timestamp(m.as_str()), &line[m.end()..]),
            None => (None, line),
        };

        TOKEN_REGEX
            .find_iter(rest)
            .take(TOKEN_LIMIT)
            .map(|m| Level::parse(m.as_str().trim_matches(|c| "|[]():=\"'".contains(c))))
            .find(|level| *level != Level::Unknown)
            .map_or(Detection::NoMatch, |level| {
                Detection::Recognized(level, timestamp)
            })
    }
}
