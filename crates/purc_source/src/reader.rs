//! The streaming character reader: UTF-8 decoding with line/column/
//! byte-offset tracking and one-character lookback.

use crate::file_id::FileId;
use std::fmt;

/// A decode error produced by [`Reader::read`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InvalidUtf8 {
    /// The file being read.
    pub file: FileId,
    /// Byte offset of the first malformed byte.
    pub pos: u32,
}

impl fmt::Display for InvalidUtf8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid UTF-8 sequence at byte offset {}", self.pos)
    }
}

impl std::error::Error for InvalidUtf8 {}

/// The current read position: 1-indexed line and column, 0-indexed byte
/// offset of the *next* character to be read.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReaderPos {
    /// 1-indexed line number.
    pub line: u32,
    /// 1-indexed column number.
    pub column: u32,
    /// 0-indexed byte offset.
    pub offset: u32,
}

/// One decoded character plus the position at which it started.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PositionedChar {
    /// The decoded Unicode scalar value.
    pub ch: char,
    /// The position of the first byte of `ch`.
    pub pos: ReaderPos,
}

/// A streaming UTF-8 character reader over an in-memory source buffer.
///
/// Provides `read`/`unread` with a one-character pushback buffer
/// (reconsume is modeled here, never as a tokenizer-side flag),
/// `peek_position`, and a bounded lookback ring for diagnostic snippets.
/// Position always refers to the *next* character to be read; EOF is a
/// sticky sentinel.
pub struct Reader<'a> {
    file: FileId,
    bytes: &'a [u8],
    /// Byte offset of the next character to decode.
    offset: usize,
    line: u32,
    column: u32,
    /// Set after `read()` returns `Some`; holds the character and the
    /// position *before* it was consumed, so `unread` can restore both.
    pending_unread: Option<(PositionedChar, usize)>,
    /// `true` once EOF has been observed; makes EOF sticky.
    eof_reached: bool,
    lookback_cap: usize,
    lookback: std::collections::VecDeque<char>,
}

impl<'a> Reader<'a> {
    /// Creates a reader over `text`, associated with `file` for position
    /// reporting.
    pub fn new(file: FileId, text: &'a str) -> Self {
        Self {
            file,
            bytes: text.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
            pending_unread: None,
            eof_reached: false,
            lookback_cap: 0,
            lookback: std::collections::VecDeque::new(),
        }
    }

    /// Sets the size of the lookback ring used for diagnostic snippets.
    pub fn set_lookback(&mut self, n: usize) {
        self.lookback_cap = n;
        while self.lookback.len() > n {
            self.lookback.pop_front();
        }
    }

    /// Returns the most recently read characters, oldest first, up to the
    /// configured lookback size.
    pub fn lookback_snippet(&self) -> String {
        self.lookback.iter().collect()
    }

    /// Returns the position of the next character to be read.
    pub fn peek_position(&self) -> ReaderPos {
        ReaderPos {
            line: self.line,
            column: self.column,
            offset: self.offset as u32,
        }
    }

    /// Decodes and returns the next character, or `None` at EOF.
    ///
    /// Once `None` is returned, every subsequent call also returns `None`
    /// (EOF is sticky) until a prior `unread()` is honored.
    pub fn read(&mut self) -> Result<Option<char>, InvalidUtf8> {
        if self.eof_reached {
            return Ok(None);
        }
        let start_pos = self.peek_position();
        let start_offset = self.offset;
        if self.offset >= self.bytes.len() {
            self.eof_reached = true;
            return Ok(None);
        }
        let rest = &self.bytes[self.offset..];
        let ch = match std::str::from_utf8(rest) {
            Ok(s) => s.chars().next(),
            Err(e) if e.valid_up_to() > 0 => {
                // SAFETY: `valid_up_to` bytes were already validated by `from_utf8`.
                let valid = unsafe { std::str::from_utf8_unchecked(&rest[..e.valid_up_to()]) };
                valid.chars().next()
            }
            Err(_) => None,
        };
        let ch = match ch {
            Some(c) => c,
            None => {
                return Err(InvalidUtf8 {
                    file: self.file,
                    pos: self.offset as u32,
                })
            }
        };
        let width = ch.len_utf8();
        self.offset += width;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        if self.lookback_cap > 0 {
            if self.lookback.len() == self.lookback_cap {
                self.lookback.pop_front();
            }
            self.lookback.push_back(ch);
        }
        self.pending_unread = Some((
            PositionedChar {
                ch,
                pos: start_pos,
            },
            start_offset,
        ));
        Ok(Some(ch))
    }

    /// Pushes back the character most recently returned by `read`.
    ///
    /// # Panics
    ///
    /// Panics if called twice consecutively without an intervening `read`,
    /// or if no character has been read yet — the contract forbids a
    /// two-character pushback buffer.
    pub fn unread(&mut self) {
        let (positioned, start_offset) = self
            .pending_unread
            .take()
            .expect("unread() called without a preceding read(), or called twice in a row");
        self.offset = start_offset;
        self.line = positioned.pos.line;
        self.column = positioned.pos.column;
        self.eof_reached = false;
        if self.lookback_cap > 0 {
            self.lookback.pop_back();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> Reader<'_> {
        Reader::new(FileId::from_raw(0), text)
    }

    #[test]
    fn reads_ascii_sequentially() {
        let mut r = reader("ab");
        assert_eq!(r.read().unwrap(), Some('a'));
        assert_eq!(r.read().unwrap(), Some('b'));
        assert_eq!(r.read().unwrap(), None);
    }

    #[test]
    fn eof_is_sticky() {
        let mut r = reader("a");
        assert_eq!(r.read().unwrap(), Some('a'));
        assert_eq!(r.read().unwrap(), None);
        assert_eq!(r.read().unwrap(), None);
    }

    #[test]
    fn tracks_line_and_column() {
        let mut r = reader("ab\ncd");
        assert_eq!(r.peek_position(), ReaderPos { line: 1, column: 1, offset: 0 });
        r.read().unwrap();
        assert_eq!(r.peek_position(), ReaderPos { line: 1, column: 2, offset: 1 });
        r.read().unwrap();
        assert_eq!(r.peek_position(), ReaderPos { line: 1, column: 3, offset: 2 });
        r.read().unwrap(); // consumes '\n'
        assert_eq!(r.peek_position(), ReaderPos { line: 2, column: 1, offset: 3 });
    }

    #[test]
    fn unread_rewinds_one_character() {
        let mut r = reader("ab");
        assert_eq!(r.read().unwrap(), Some('a'));
        r.unread();
        assert_eq!(r.peek_position(), ReaderPos { line: 1, column: 1, offset: 0 });
        assert_eq!(r.read().unwrap(), Some('a'));
        assert_eq!(r.read().unwrap(), Some('b'));
    }

    #[test]
    #[should_panic]
    fn double_unread_forbidden() {
        let mut r = reader("ab");
        r.read().unwrap();
        r.unread();
        r.unread();
    }

    #[test]
    fn unread_after_eof_resets_stickiness() {
        let mut r = reader("a");
        assert_eq!(r.read().unwrap(), Some('a'));
        assert_eq!(r.read().unwrap(), None);
        // no intervening read happened after the EOF read returned None,
        // so unread() rewinds the 'a' read, not the EOF.
        r.unread();
        assert_eq!(r.read().unwrap(), Some('a'));
    }

    #[test]
    #[allow(invalid_from_utf8_unchecked)]
    fn invalid_utf8_reports_position() {
        let bytes: &[u8] = &[b'a', 0xFF, b'b'];
        let text = unsafe { std::str::from_utf8_unchecked(bytes) };
        let mut r = reader(text);
        assert_eq!(r.read().unwrap(), Some('a'));
        let err = r.read().unwrap_err();
        assert_eq!(err.pos, 1);
    }

    #[test]
    fn lookback_ring_tracks_recent_chars() {
        let mut r = reader("abcdef");
        r.set_lookback(3);
        for _ in 0..5 {
            r.read().unwrap();
        }
        assert_eq!(r.lookback_snippet(), "cde");
    }

    #[test]
    fn multibyte_characters_advance_by_utf8_len() {
        let mut r = reader("a\u{00e9}b"); // 'a', 'é' (2 bytes), 'b'
        assert_eq!(r.read().unwrap(), Some('a'));
        assert_eq!(r.peek_position().offset, 1);
        assert_eq!(r.read().unwrap(), Some('\u{00e9}'));
        assert_eq!(r.peek_position().offset, 3);
        assert_eq!(r.read().unwrap(), Some('b'));
    }
}
