//! # Cursor
//!
//! Provides byte-by-byte navigation through PL/0C source code with position
//! tracking.
//!
//! PL/0C source is strictly ASCII, so the cursor operates on a byte
//! slice (`&[u8]`) rather than `Vec<char>`. This eliminates the
//! per-source allocation that
//! `.chars().collect()` would require. `pos` serves as both the byte offset
//! and the character index — they are identical for ASCII input.
//!
//! One-character lookahead (`peek`) and two-character lookahead (`peek2`,
//! needed to tell `<<` from `<=` from `<`) are read-only: nothing is
//! consumed until `advance` is called, so a character is always
//! "consumable again" without a dedicated `unget` operation.

/// A cursor for iterating through source code bytes.
///
/// Tracks position in multiple ways:
/// - Byte position (doubles as character index for ASCII)
/// - Line and column numbers (for error messages)
pub struct Cursor<'a> {
    /// Source bytes (ASCII-only)
    bytes: &'a [u8],
    /// Current byte position
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    col: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.bytes.get(self.pos).map(|&b| b as char)
    }

    pub fn peek2(&self) -> Option<char> {
        self.bytes.get(self.pos + 1).map(|&b| b as char)
    }

    /// Advance to the next byte and return it as a `char`.
    ///
    /// Updates line/column tracking:
    /// - '\n' increments line, resets column to 1 (this fires whether the
    ///   newline was inside a block comment or not)
    /// - Other chars increment column
    pub fn advance(&mut self) -> Option<char> {
        if let Some(&b) = self.bytes.get(self.pos) {
            self.pos += 1;
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            Some(b as char)
        } else {
            None
        }
    }

    /// Returns `(line, col)` of the current cursor position.
    pub fn current_pos(&self) -> (usize, usize) {
        (self.line, self.col)
    }
}
