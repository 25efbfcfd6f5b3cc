//! This module contains the buffered character reader that feeds the lexer.
//! It supports reading by count, reading whole lines, and pushing consumed
//! text back onto the front of the stream for backtracking.

use slog::error;
use std::collections::VecDeque;
use std::io::BufRead;

/// A pull-based character source with unbounded push-back.
///
/// One `Reader` serves exactly one stream and one consumer. Everything the
/// lexer and parser read comes through here; nothing else touches the
/// underlying source.
pub struct Reader<R> {
    source: R,
    buffer: VecDeque<char>,
    eof: bool,
}

impl<R: BufRead> Reader<R> {
    /// Create a new reader over a buffered source.
    pub fn new(source: R) -> Reader<R> {
        Reader {
            source,
            buffer: VecDeque::new(),
            eof: false,
        }
    }

    /// Refill the buffer from the source if it's empty.
    ///
    /// Returns `true` if at least one character is available afterward. An
    /// I/O error mid-stream is logged and treated as end-of-stream; a
    /// malformed entry is recoverable but a broken source is not worth
    /// retrying.
    fn fill(&mut self) -> bool {
        while self.buffer.is_empty() && !self.eof {
            let mut line = String::new();
            match self.source.read_line(&mut line) {
                Ok(0) => self.eof = true,
                Ok(_) => self.buffer.extend(line.chars()),
                Err(e) => {
                    error!(
                        slog_scope::logger(),
                        "Read error; treating as end of stream: {}", e
                    );
                    self.eof = true;
                }
            }
        }

        !self.buffer.is_empty()
    }

    /// Read up to `n` characters. Returns `None` once the stream is
    /// exhausted.
    pub fn read(&mut self, n: usize) -> Option<String> {
        if !self.fill() {
            return None;
        }

        let mut out = String::new();
        for _ in 0..n {
            match self.buffer.pop_front() {
                Some(c) => out.push(c),
                None => break,
            }
        }

        Some(out)
    }

    /// Read a single character.
    pub fn read_char(&mut self) -> Option<char> {
        if !self.fill() {
            return None;
        }
        self.buffer.pop_front()
    }

    /// Look at the next character without consuming it.
    pub fn peek(&mut self) -> Option<char> {
        if !self.fill() {
            return None;
        }
        self.buffer.front().copied()
    }

    /// Read the next newline-delimited line, without the newline. Returns
    /// `None` once the stream is exhausted.
    pub fn read_line(&mut self) -> Option<String> {
        if !self.fill() {
            return None;
        }

        let mut out = String::new();
        loop {
            match self.buffer.pop_front() {
                Some('\n') => break,
                Some(c) => out.push(c),
                None => {
                    if !self.fill() {
                        break;
                    }
                }
            }
        }

        Some(out)
    }

    /// Return previously consumed text to the front of the stream.
    pub fn push(&mut self, text: &str) {
        for c in text.chars().rev() {
            self.buffer.push_front(c);
        }
    }

    /// Return a previously consumed line to the front of the stream,
    /// restoring the line boundary that `read_line` removed.
    pub fn push_line(&mut self, line: &str) {
        self.buffer.push_front('\n');
        self.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(src: &str) -> Reader<Cursor<&str>> {
        Reader::new(Cursor::new(src))
    }

    #[test]
    fn read_by_count() {
        let mut r = reader("abcdef");
        assert_eq!(r.read(4), Some("abcd".to_string()));
        assert_eq!(r.read(4), Some("ef".to_string()));
        assert_eq!(r.read(4), None);
    }

    #[test]
    fn read_lines() {
        let mut r = reader("first line\nsecond line\nno newline");
        assert_eq!(r.read_line(), Some("first line".to_string()));
        assert_eq!(r.read_line(), Some("second line".to_string()));
        assert_eq!(r.read_line(), Some("no newline".to_string()));
        assert_eq!(r.read_line(), None);
    }

    #[test]
    fn push_back_round_trip() {
        let mut r = reader("abcdef");
        let text = r.read(3).unwrap();
        assert_eq!(text, "abc");
        r.push(&text);
        assert_eq!(r.read(6), Some("abcdef".to_string()));
    }

    #[test]
    fn push_line_restores_boundary() {
        let mut r = reader("header\nbody");
        let line = r.read_line().unwrap();
        r.push_line(&line);
        assert_eq!(r.read_line(), Some("header".to_string()));
        assert_eq!(r.read_line(), Some("body".to_string()));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = reader("xy");
        assert_eq!(r.peek(), Some('x'));
        assert_eq!(r.peek(), Some('x'));
        assert_eq!(r.read_char(), Some('x'));
        assert_eq!(r.read_char(), Some('y'));
        assert_eq!(r.peek(), None);
        assert_eq!(r.read_char(), None);
    }

    #[test]
    fn push_past_original_start() {
        let mut r = reader("tail");
        r.push("head ");
        assert_eq!(r.read(9), Some("head tail".to_string()));
    }

    #[test]
    fn empty_source() {
        let mut r = reader("");
        assert_eq!(r.read(1), None);
        assert_eq!(r.read_line(), None);
        assert_eq!(r.peek(), None);
    }
}
