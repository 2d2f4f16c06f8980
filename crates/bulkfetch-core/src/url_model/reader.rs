//! Line-oriented URL list reader.

use std::io::BufRead;

use super::is_valid_url;

/// Reads candidate URLs, one per line, yielding only the valid ones.
///
/// Lines are trimmed and blank lines are ignored. Lines that are not valid
/// URLs (or not UTF-8) are logged with their 1-based line number and skipped.
/// An I/O error ends the stream.
pub fn read_urls<R: BufRead>(reader: R) -> UrlLines<R> {
    UrlLines {
        lines: reader.split(b'\n'),
        line_no: 0,
        done: false,
    }
}

/// Iterator returned by [`read_urls`].
pub struct UrlLines<R> {
    lines: std::io::Split<R>,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> Iterator for UrlLines<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!(
                        line = self.line_no + 1,
                        "failed to read URL list: {}",
                        e
                    );
                    self.done = true;
                    return None;
                }
            };
            self.line_no += 1;
            let text = match String::from_utf8(raw) {
                Ok(t) => t,
                Err(_) => {
                    tracing::warn!("line {} is not valid UTF-8", self.line_no);
                    continue;
                }
            };
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            if is_valid_url(line) {
                return Some(line.to_string());
            }
            tracing::warn!("line {} is not a valid URL: '{}'", self.line_no, line);
        }
    }
}
