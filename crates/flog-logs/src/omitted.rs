use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use flog_types::Level;

/// Counts per log level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    counts: [usize; Level::ALL.len()],
}

impl LevelCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, level: Level) {
        self.counts[level as usize] += 1;
    }

    pub fn get(&self, level: Level) -> usize {
        self.counts[level as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn clear(&mut self) {
        self.counts = Default::default();
    }

    /// Non-zero counts in ascending severity order
    pub fn iter(&self) -> impl Iterator<Item = (Level, usize)> + '_ {
        Level::ALL
            .into_iter()
            .map(|level| (level, self.get(level)))
            .filter(|(_, count)| *count > 0)
    }

    /// Human readable form, e.g. `1 Trace, 3 Debug`
    pub fn summary(&self) -> String {
        self.iter()
            .map(|(level, count)| format!("{count} {level}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Destination for "omitted lines" notices
pub trait SummarySink: Send {
    /// Whether notices are currently shown at all
    fn is_enabled(&self) -> bool;

    /// Show one notice for the stream named `source`
    fn emit(&mut self, source: &str, summary: &str);
}

const SKIPPED_ANSI: &str = "\x1b[90m\x1b[3m"; // gray and italic
const RESET_ANSI: &str = "\x1b[0m";

/// Writes notices as `flog: Omitted 1 Trace, 2 Debug.`
pub struct ConsoleSummary<W> {
    writer: W,
    enabled: bool,
    styled: bool,
}

impl<W: Write + Send> ConsoleSummary<W> {
    pub fn new(writer: W, enabled: bool, styled: bool) -> Self {
        Self {
            writer,
            enabled,
            styled,
        }
    }
}

impl ConsoleSummary<io::Stderr> {
    /// Notices on stderr, styled when stderr is a terminal
    pub fn stderr(enabled: bool) -> Self {
        let stderr = io::stderr();
        let styled = stderr.is_terminal();
        Self::new(stderr, enabled, styled)
    }
}

impl<W: Write + Send> SummarySink for ConsoleSummary<W> {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn emit(&mut self, source: &str, summary: &str) {
        tracing::debug!(source, summary, "omitted lines");

        let (start, end) = if self.styled {
            (SKIPPED_ANSI, RESET_ANSI)
        } else {
            ("", "")
        };
        let result = writeln!(self.writer, "{start}flog: Omitted {summary}.{end}")
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            tracing::warn!(source, error = %e, "failed to write omitted summary");
        }
    }
}

/// Suppressed-line bookkeeping for one input stream
pub struct Omissions {
    source: String,
    counts: LevelCounts,
    sink: Box<dyn SummarySink>,
}

impl Omissions {
    pub fn new(source: impl Into<String>, sink: Box<dyn SummarySink>) -> Self {
        Self {
            source: source.into(),
            counts: LevelCounts::new(),
            sink,
        }
    }

    /// Name of the stream, e.g. a file path or `STDIN`
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn counts(&self) -> &LevelCounts {
        &self.counts
    }

    /// Whether any suppressed line is waiting to be reported
    pub fn is_pending(&self) -> bool {
        !self.counts.is_empty()
    }

    pub fn record(&mut self, level: Level) {
        self.counts.increment(level);
    }

    /// Report and reset the pending counts.
    ///
    /// Returns the summary text when anything was pending, whether or not
    /// the sink is enabled.
    pub fn flush(&mut self) -> Option<String> {
        if !self.is_pending() {
            return None;
        }
        let summary = self.counts.summary();
        self.counts.clear();
        if self.sink.is_enabled() {
            self.sink.emit(&self.source, &summary);
        }
        Some(summary)
    }
}

/// Shared access to a stream's omissions from outside the printer loop,
/// typically an interrupt handler.
#[derive(Clone)]
pub struct FlushHandle {
    omissions: Arc<Mutex<Omissions>>,
}

impl FlushHandle {
    pub(crate) fn new(omissions: Arc<Mutex<Omissions>>) -> Self {
        Self { omissions }
    }

    pub fn source(&self) -> String {
        self.omissions.lock().source().to_string()
    }

    /// Report pending omissions now
    pub fn flush(&self) -> Option<String> {
        self.omissions.lock().flush()
    }

    /// Report pending omissions and end the process while still holding the
    /// lock, so the printer cannot emit anything in between.
    pub fn flush_and_exit(&self, code: i32) -> ! {
        let mut omissions = self.omissions.lock();
        omissions.flush();
        std::process::exit(code)
    }
}
