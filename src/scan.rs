//! Tab-table decoding.
//!
//! The extracted blob is newline-separated rows, each tab-separated into
//! `keyword \t path [ \t version ]`. The scanner is a lazy cursor producing
//! borrowed [`Entry`] views; decoding the same blob twice yields two
//! independent, equivalent sequences.

use memchr::memchr;

/// One decoded table row. Fields borrow from the scanned blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub keyword: &'a [u8],
    pub path: &'a [u8],
    pub version: &'a [u8],
}

/// Cursor over the rows of a table blob.
///
/// `entry` is only meaningful after `scan` has returned `true`.
#[derive(Debug)]
pub struct Scanner<'a> {
    rest: &'a [u8],
    exhausted: bool,
    cur: Entry<'a>,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            rest: buf,
            exhausted: buf.is_empty(),
            cur: Entry {
                keyword: &[],
                path: &[],
                version: &[],
            },
        }
    }

    /// Advance to the next well-formed row. Lines without a tab are skipped
    /// as malformed rather than failing the whole decode.
    pub fn scan(&mut self) -> bool {
        while let Some(mut line) = self.next_line() {
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let Some(tab) = memchr(b'\t', line) else {
                continue;
            };
            let keyword = &line[..tab];
            let line = &line[tab + 1..];
            self.cur = match memchr(b'\t', line) {
                None => Entry {
                    keyword,
                    path: line,
                    version: &[],
                },
                Some(tab) => {
                    let path = &line[..tab];
                    let line = &line[tab + 1..];
                    // Anything past a third tab is ignored.
                    let version = match memchr(b'\t', line) {
                        None => line,
                        Some(tab) => &line[..tab],
                    };
                    Entry {
                        keyword,
                        path,
                        version,
                    }
                }
            };
            return true;
        }
        false
    }

    /// The row produced by the last successful `scan`.
    pub fn entry(&self) -> Entry<'a> {
        self.cur
    }

    /// Compare the current row's keyword without allocating.
    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.cur.keyword == keyword.as_bytes()
    }

    /// Next line, tolerating a missing terminator on the final line.
    fn next_line(&mut self) -> Option<&'a [u8]> {
        if self.exhausted {
            return None;
        }
        match memchr(b'\n', self.rest) {
            Some(i) => {
                let line = &self.rest[..i];
                self.rest = &self.rest[i + 1..];
                if self.rest.is_empty() {
                    self.exhausted = true;
                }
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = &[];
                self.exhausted = true;
                Some(line)
            }
        }
    }
}
