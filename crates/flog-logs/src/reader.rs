use std::io::{self, BufRead};

use flog_types::{Level, ParsedLine};

use crate::parser::LogParser;

/// Splits a byte stream into lines.
///
/// Lines end at `\n`; a trailing `\r` is dropped. There is no limit on
/// line length and invalid UTF-8 is replaced rather than rejected.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Read the next line, or `None` at end of stream
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

/// Classifies lines while carrying the level of the current entry forward.
///
/// Indented lines continue the previous entry. Lines the parser cannot
/// place also inherit, so stack traces and wrapped messages stay with the
/// entry that produced them.
pub struct LevelReader<R> {
    lines: LineReader<R>,
    parser: LogParser,
    last_level: Level,
}

impl<R: BufRead> LevelReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_parser(inner, LogParser::new())
    }

    pub fn with_parser(inner: R, parser: LogParser) -> Self {
        Self {
            lines: LineReader::new(inner),
            parser,
            last_level: Level::Undefined,
        }
    }

    /// Level of the most recent line that started an entry
    pub fn last_level(&self) -> Level {
        self.last_level
    }

    /// Read and classify the next line
    pub fn next_entry(&mut self) -> io::Result<Option<ParsedLine>> {
        let Some(text) = self.lines.next_line()? else {
            return Ok(None);
        };
        Ok(Some(self.resolve(text)))
    }

    fn resolve(&mut self, text: String) -> ParsedLine {
        if text.starts_with(char::is_whitespace) {
            return ParsedLine::new(text, self.last_level, None);
        }

        let classified = self.parser.classify(&text);
        if classified.level.is_recognized() {
            self.last_level = classified.level;
            ParsedLine::new(text, classified.level, classified.timestamp)
        } else {
            ParsedLine::new(text, self.last_level, classified.timestamp)
        }
    }
}

impl<R: BufRead> Iterator for LevelReader<R> {
    type Item = io::Result<ParsedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
