//! # PL/0C Lexer
//!
//! Tokenizes PL/0C source code into a restartable stream of tokens.
//!
//! ## Features
//!
//! - **Keywords**: `const`, `var`, `procedure`, `function`, `begin`, `end`,
//!   `if`, `then`, `else`, `while`, `do`, `repeat`, `until`, `odd`
//! - **Numeric literals**: decimal, non-negative, saturating on overflow
//! - **Identifiers**: `[A-Za-z_][A-Za-z0-9_]*`
//! - **Comments**: `//` to end of line, `/* ... */` block (non-nesting)
//! - **C-style operators**: bitwise, shift, logical, relational, arithmetic
//!
//! ## Restartability
//!
//! `Lexer::get` pulls exactly one token at a time and records it as
//! `current`; `Lexer::set_source` rebinds the cursor to a new source and
//! resets line/column tracking.

pub mod cursor;
pub mod token;

#[cfg(test)]
mod tests;

use crate::error::{CompileError, ErrorKind, Span};
use cursor::Cursor;
use token::{Token, TokenKind};

/// A restartable, single-token-lookahead scanner over PL/0C source text.
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
    current: Token,
    /// Scanner-level diagnostics (currently: numeric overflow). Unknown
    /// characters and unterminated comments are *not* pushed here — they
    /// surface as `Unknown`/`BadComment` tokens instead, and it is the
    /// parser's job to turn those into syntax errors.
    pub errors: Vec<CompileError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
            current: Token { kind: TokenKind::Eof, span: Span::new(1, 1) },
            errors: Vec::new(),
        }
    }

    /// Rebind this lexer to a new source, resetting line and column to 1.
    pub fn set_source(&mut self, source: &'a str) {
        self.cursor = Cursor::new(source);
        self.current = Token { kind: TokenKind::Eof, span: Span::new(1, 1) };
    }

    /// The last token returned by `get`, without consuming anything.
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Consume and return the next token, skipping whitespace and comments
    /// first. Repeatedly calling `get` past end-of-input yields `Eof`
    /// forever.
    pub fn get(&mut self) -> Token {
        let token = self.lex_token();
        tracing::trace!(kind = %token.kind, line = token.span.line, "token");
        self.current = token.clone();
        token
    }

    fn lex_token(&mut self) -> Token {
        loop {
            match self.skip_trivia() {
                Trivia::Eof => return self.make(TokenKind::Eof),
                Trivia::BadComment(line, col) => {
                    return Token { kind: TokenKind::BadComment, span: Span::new(line, col) }
                }
                Trivia::Done => break,
            }
        }

        let (line, col) = self.cursor.current_pos();
        let ch = match self.cursor.peek() {
            Some(c) => c,
            None => return self.make(TokenKind::Eof),
        };

        if ch.is_ascii_digit() {
            return self.lex_number(line, col);
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return self.lex_ident(line, col);
        }

        self.cursor.advance();
        let kind = match ch {
            '=' => self.two_char('=', TokenKind::Equal, TokenKind::Assign),
            '!' => self.two_char('=', TokenKind::NotEqual, TokenKind::Not),
            '<' => {
                if self.cursor.peek() == Some('=') {
                    self.cursor.advance();
                    TokenKind::LessEq
                } else if self.cursor.peek() == Some('<') {
                    self.cursor.advance();
                    TokenKind::Shl
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.cursor.peek() == Some('=') {
                    self.cursor.advance();
                    TokenKind::GreaterEq
                } else if self.cursor.peek() == Some('>') {
                    self.cursor.advance();
                    TokenKind::Shr
                } else {
                    TokenKind::Greater
                }
            }
            '|' => self.two_char('|', TokenKind::Or, TokenKind::BitOr),
            '&' => self.two_char('&', TokenKind::And, TokenKind::BitAnd),
            '~' => TokenKind::Comp,
            '^' => TokenKind::BitXor,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            other => TokenKind::Unknown(other),
        };
        Token { kind, span: Span::new(line, col) }
    }

    /// `=`/`!`/`|`/`&` each produce a two-character token when immediately
    /// followed by `expect`, otherwise fall back to the single-character
    /// token.
    fn two_char(&mut self, expect: char, wide: TokenKind, narrow: TokenKind) -> TokenKind {
        if self.cursor.peek() == Some(expect) {
            self.cursor.advance();
            wide
        } else {
            narrow
        }
    }

    fn lex_number(&mut self, line: usize, col: usize) -> Token {
        let mut digits = String::new();
        while matches!(self.cursor.peek(), Some(c) if c.is_ascii_digit()) {
            digits.push(self.cursor.advance().unwrap());
        }

        let value = match digits.parse::<i64>() {
            Ok(v) if v <= i32::MAX as i64 => v as i32,
            _ => {
                self.errors
                    .push(CompileError::new(ErrorKind::NumericOverflow, Span::new(line, col)));
                i32::MAX
            }
        };

        Token { kind: TokenKind::Number(value), span: Span::new(line, col) }
    }

    fn lex_ident(&mut self, line: usize, col: usize) -> Token {
        let mut word = String::new();
        while matches!(self.cursor.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            word.push(self.cursor.advance().unwrap());
        }

        let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word));
        Token { kind, span: Span::new(line, col) }
    }

    /// Skip whitespace and comments until real token material is reached.
    /// Returns `Trivia::BadComment` immediately if a block comment never
    /// closes (its line is remembered from where it opened) and
    /// `Trivia::Eof` once input is exhausted.
    fn skip_trivia(&mut self) -> Trivia {
        loop {
            match self.cursor.peek() {
                None => return Trivia::Eof,
                Some(c) if c.is_whitespace() => {
                    self.cursor.advance();
                }
                Some('/') if self.cursor.peek2() == Some('/') => {
                    self.cursor.advance();
                    self.cursor.advance();
                    while !matches!(self.cursor.peek(), None | Some('\n')) {
                        self.cursor.advance();
                    }
                }
                Some('/') if self.cursor.peek2() == Some('*') => {
                    let (line, col) = self.cursor.current_pos();
                    self.cursor.advance();
                    self.cursor.advance();
                    loop {
                        match self.cursor.peek() {
                            None => return Trivia::BadComment(line, col),
                            Some('*') if self.cursor.peek2() == Some('/') => {
                                self.cursor.advance();
                                self.cursor.advance();
                                break;
                            }
                            Some(_) => {
                                self.cursor.advance();
                            }
                        }
                    }
                }
                _ => return Trivia::Done,
            }
        }
    }

    fn make(&self, kind: TokenKind) -> Token {
        let (line, col) = self.cursor.current_pos();
        Token { kind, span: Span::new(line, col) }
    }
}

enum Trivia {
    Done,
    Eof,
    BadComment(usize, usize),
}
