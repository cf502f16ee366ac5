use std::io::{self, BufRead, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::filter::LevelFilter;
use crate::omitted::{FlushHandle, Omissions, SummarySink};
use crate::reader::LevelReader;

/// Whether suppressed lines are waiting to be summarized
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrinterState {
    Idle,
    Accumulating,
}

/// Line totals for one finished stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrintStats {
    pub lines_read: u64,
    pub lines_printed: u64,
    pub lines_omitted: u64,
}

/// Filters one input stream onto an output writer.
///
/// Passing lines are written verbatim as soon as they are read. Suppressed
/// lines are counted per level and reported as a single notice right
/// before the next passing line, or when the stream ends.
pub struct Printer<R, W> {
    reader: LevelReader<R>,
    filter: LevelFilter,
    omissions: Arc<Mutex<Omissions>>,
    out: W,
    stats: PrintStats,
}

impl<R: BufRead, W: Write> Printer<R, W> {
    /// Create a printer for the stream named `source`
    pub fn new(
        source: impl Into<String>,
        input: R,
        out: W,
        filter: LevelFilter,
        sink: Box<dyn SummarySink>,
    ) -> Self {
        Self {
            reader: LevelReader::new(input),
            filter,
            omissions: Arc::new(Mutex::new(Omissions::new(source, sink))),
            out,
            stats: PrintStats::default(),
        }
    }

    /// Handle for flushing this stream's omissions from another thread
    pub fn flush_handle(&self) -> FlushHandle {
        FlushHandle::new(Arc::clone(&self.omissions))
    }

    pub fn state(&self) -> PrinterState {
        if self.omissions.lock().is_pending() {
            PrinterState::Accumulating
        } else {
            PrinterState::Idle
        }
    }

    pub fn stats(&self) -> PrintStats {
        self.stats
    }

    /// Process one line. Returns `false` once the input is exhausted.
    pub fn next(&mut self) -> io::Result<bool> {
        let Some(line) = self.reader.next_entry()? else {
            return Ok(false);
        };
        self.stats.lines_read += 1;

        let pass = self.filter.should_pass(line.level);
        tracing::trace!(severity = %line.level, pass, text = %line.text, "parsed line");

        let mut omissions = self.omissions.lock();
        if pass {
            omissions.flush();
            writeln!(self.out, "{}", line.text)?;
            self.stats.lines_printed += 1;
        } else {
            omissions.record(line.level);
            self.stats.lines_omitted += 1;
        }
        Ok(true)
    }

    /// Report any pending omissions now
    pub fn print_omitted(&self) -> Option<String> {
        self.omissions.lock().flush()
    }

    /// Process the whole stream, then report what is still pending.
    ///
    /// Pending omissions are reported even when reading or writing fails
    /// part way through.
    pub fn run(&mut self) -> io::Result<PrintStats> {
        let result = self.drain();
        self.print_omitted();
        result?;
        self.out.flush()?;
        Ok(self.stats)
    }

    fn drain(&mut self) -> io::Result<()> {
        while self.next()? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omitted::ConsoleSummary;
    use flog_types::{Level, LevelSet};
    use std::io::Cursor;

    /// Writer whose contents stay readable after being boxed into a sink
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Run {
        stdout: String,
        notices: String,
        stats: PrintStats,
    }

    fn run(input: &str, filter: LevelFilter) -> Run {
        run_with(input, filter, true)
    }

    fn run_with(input: &str, filter: LevelFilter, summaries: bool) -> Run {
        let notices = SharedBuf::default();
        let sink = ConsoleSummary::new(notices.clone(), summaries, false);
        let mut printer = Printer::new(
            "test",
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            filter,
            Box::new(sink),
        );
        let stats = printer.run().unwrap();
        Run {
            stdout: String::from_utf8(printer.out).unwrap(),
            notices: notices.contents(),
            stats,
        }
    }

    fn warnings_and_above() -> LevelFilter {
        LevelFilter::new().with_min(Level::Warning)
    }

    #[test]
    fn test_single_suppressed_line() {
        let result = run(
            "2021-01-31 17:33:54.3326|TRACE|Program|Sample\n",
            warnings_and_above(),
        );
        assert_eq!(result.stdout, "");
        assert_eq!(result.notices, "flog: Omitted 1 Trace.\n");
        assert_eq!(result.stats.lines_omitted, 1);
    }

    #[test]
    fn test_nlog_multiline() {
        let input = "\
2021-01-31 17:33:54.3326|TRACE|Program|Sample
2021-01-31 17:33:54.3327|DEBUG|Program|Sample
2021-01-31 17:33:54.3328|INFO|Program|Sample
2021-01-31 17:33:54.3329|WARN|Program|Sample
    Some
    Multiline
2021-01-31 17:33:54.3330|ERROR|Program|Sample
2021-01-31 17:33:54.3331|FATAL|Program|Sample
";
        let result = run(input, warnings_and_above());
        assert_eq!(
            result.stdout,
            "\
2021-01-31 17:33:54.3329|WARN|Program|Sample
    Some
    Multiline
2021-01-31 17:33:54.3330|ERROR|Program|Sample
2021-01-31 17:33:54.3331|FATAL|Program|Sample
"
        );
        assert_eq!(result.notices, "flog: Omitted 1 Trace, 1 Debug, 1 Information.\n");
        assert_eq!(
            result.stats,
            PrintStats {
                lines_read: 8,
                lines_printed: 5,
                lines_omitted: 3,
            }
        );
    }

    #[test]
    fn test_logrus_ansi_multiline() {
        let input = "\
\x1b[37mTRAC\x1b[0m[0000] A walrus appears   \x1b[37manimal\x1b[0m=walrus
\x1b[37mDEBU\x1b[0m[0000] A walrus appears   \x1b[37manimal\x1b[0m=walrus
\x1b[36mINFO\x1b[0m[0000] A walrus appears   \x1b[36manimal\x1b[0m=walrus
\x1b[33mWARN\x1b[0m[0000] A walrus appears
\tSome
\tMultiline   \x1b[33manimal\x1b[0m=walrus
\x1b[31mERRO\x1b[0m[0000] A walrus appears   \x1b[31manimal\x1b[0m=walrus
";
        let result = run(input, warnings_and_above());
        assert_eq!(
            result.stdout,
            "\
\x1b[33mWARN\x1b[0m[0000] A walrus appears
\tSome
\tMultiline   \x1b[33manimal\x1b[0m=walrus
\x1b[31mERRO\x1b[0m[0000] A walrus appears   \x1b[31manimal\x1b[0m=walrus
"
        );
        assert_eq!(result.notices, "flog: Omitted 1 Trace, 1 Debug, 1 Information.\n");
    }

    #[test]
    fn test_summary_between_passing_runs() {
        let input = "\
fail: Program[0]
dbug: Program[0]
dbug: Program[0]
fail: Program[0]
";
        let result = run(input, LevelFilter::new().with_min(Level::Error));
        assert_eq!(result.stdout, "fail: Program[0]\nfail: Program[0]\n");
        assert_eq!(result.notices, "flog: Omitted 2 Debug.\n");
    }

    #[test]
    fn test_trailing_suppressed_run_flushed_at_end() {
        let input = "fail: Program[0]\ninfo: Program[0]\ninfo: Program[0]\ninfo: Program[0]\n";
        let result = run(input, LevelFilter::new().with_min(Level::Error));
        assert_eq!(result.stdout, "fail: Program[0]\n");
        assert_eq!(result.notices, "flog: Omitted 3 Information.\n");
    }

    #[test]
    fn test_nothing_suppressed_no_summary() {
        let input = "fail: Program[0]\ncrit: Program[0]\n";
        let result = run(input, warnings_and_above());
        assert_eq!(result.stdout, input);
        assert_eq!(result.notices, "");
    }

    #[test]
    fn test_empty_input() {
        let result = run("", warnings_and_above());
        assert_eq!(result.stdout, "");
        assert_eq!(result.notices, "");
        assert_eq!(result.stats, PrintStats::default());
    }

    #[test]
    fn test_quiet_hides_summary() {
        let input = "dbug: Program[0]\nfail: Program[0]\n";
        let result = run_with(input, warnings_and_above(), false);
        assert_eq!(result.stdout, "fail: Program[0]\n");
        assert_eq!(result.notices, "");
    }

    #[test]
    fn test_unclassified_lines_pass_without_filter() {
        let input = "hello\nworld\n";
        let result = run(input, LevelFilter::new());
        assert_eq!(result.stdout, input);
    }

    #[test]
    fn test_exclude_unknown_drops_unclassified() {
        let input = "hello\nfail: Program[0]\n";
        let filter = LevelFilter::new().with_exclude(LevelSet::from(Level::Unknown));
        let result = run(input, filter);
        assert_eq!(result.stdout, "fail: Program[0]\n");
        assert_eq!(result.notices, "flog: Omitted 1 Undefined.\n");
    }

    #[test]
    fn test_include_list() {
        let input = "info: a[0]\nwarn: b[0]\nfail: c[0]\n";
        let filter = LevelFilter::new().with_include(Level::Information | Level::Error);
        let result = run(input, filter);
        assert_eq!(result.stdout, "info: a[0]\nfail: c[0]\n");
        assert_eq!(result.notices, "flog: Omitted 1 Warning.\n");
    }

    #[test]
    fn test_state_and_flush_handle() {
        let notices = SharedBuf::default();
        let sink = ConsoleSummary::new(notices.clone(), true, false);
        let input = "dbug: a[0]\ndbug: b[0]\nfail: c[0]\n";
        let mut printer = Printer::new(
            "STDIN",
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            warnings_and_above(),
            Box::new(sink),
        );
        assert_eq!(printer.state(), PrinterState::Idle);

        assert!(printer.next().unwrap());
        assert!(printer.next().unwrap());
        assert_eq!(printer.state(), PrinterState::Accumulating);

        let handle = printer.flush_handle();
        assert_eq!(handle.source(), "STDIN");
        assert_eq!(handle.flush().as_deref(), Some("2 Debug"));
        assert_eq!(printer.state(), PrinterState::Idle);
        assert_eq!(notices.contents(), "flog: Omitted 2 Debug.\n");

        assert!(printer.next().unwrap());
        assert!(!printer.next().unwrap());
        assert_eq!(notices.contents(), "flog: Omitted 2 Debug.\n");
    }

    /// Reader that fails on every call
    struct DiskGone;

    impl io::Read for DiskGone {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn test_read_error_still_reports_omissions() {
        use std::io::{BufReader, Read};

        let notices = SharedBuf::default();
        let sink = ConsoleSummary::new(notices.clone(), true, false);
        let input = Cursor::new(b"dbug: a[0]\ndbug: b[0]\n".to_vec()).chain(DiskGone);
        let mut printer = Printer::new(
            "app.log",
            BufReader::new(input),
            Vec::new(),
            warnings_and_above(),
            Box::new(sink),
        );

        let err = printer.run().unwrap_err();
        assert_eq!(err.to_string(), "disk gone");
        assert_eq!(notices.contents(), "flog: Omitted 2 Debug.\n");
        assert_eq!(printer.state(), PrinterState::Idle);
        assert_eq!(printer.stats().lines_omitted, 2);
    }
}
