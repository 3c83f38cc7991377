//! Shared diagnostic types used across every compiler stage.
//!
//! A single `Span`/`ErrorKind` pair covers lexical, syntactic, and semantic
//! errors so the driver can collect them from the lexer and compiler into
//! one list and print them uniformly: `<program>: <message> [near line
//! <n>]`.

use thiserror::Error;

/// A source location, 1-indexed in both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    // --- Lexical ---
    UnknownCharacter(char),
    UnterminatedComment,
    NumericOverflow,

    // --- Syntactic ---
    ExpectedToken { expected: &'static str, found: String },
    UnexpectedEndOfInput,

    // --- Semantic ---
    UndefinedIdentifier(String),
    DuplicateDeclaration(String),
    AssignToConstant(String),
    AssignToCallable(String),
    CallOfNonCallable(String),
    ArgCountMismatch { name: String, expected: usize, found: usize },
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UnknownCharacter(c) => write!(f, "unknown character '{c}'"),
            ErrorKind::UnterminatedComment => write!(f, "unterminated block comment"),
            ErrorKind::NumericOverflow => write!(f, "numeric literal overflows a 32-bit word"),
            ErrorKind::ExpectedToken { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            ErrorKind::UnexpectedEndOfInput => write!(f, "unexpected end of input"),
            ErrorKind::UndefinedIdentifier(name) => write!(f, "undefined identifier '{name}'"),
            ErrorKind::DuplicateDeclaration(name) => {
                write!(f, "'{name}' is already declared at this level")
            }
            ErrorKind::AssignToConstant(name) => write!(f, "cannot assign to constant '{name}'"),
            ErrorKind::AssignToCallable(name) => {
                write!(f, "cannot assign to procedure/function '{name}'")
            }
            ErrorKind::CallOfNonCallable(name) => {
                write!(f, "'{name}' is not a procedure or function")
            }
            ErrorKind::ArgCountMismatch { name, expected, found } => write!(
                f,
                "'{name}' takes {expected} argument(s), {found} supplied"
            ),
        }
    }
}

/// A single compile-time diagnostic (lexical, syntactic, or semantic).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} [near line {}]", self.kind, self.span.line)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Span,
}

impl CompileError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Failures that can only be detected once the VM is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivideByZero,
    #[error("stack overflow (capacity {capacity} words)")]
    StackOverflow { capacity: usize },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("unknown opcode at pc={pc}")]
    UnknownOpcode { pc: usize },
    #[error("program counter {pc} out of range (code length {len})")]
    PcOutOfRange { pc: i64, len: usize },
}

/// Formats a diagnostic the way the driver prints it to stderr:
/// `<program>: <message> [near line <n>]`.
pub fn format_diagnostic(program: &str, message: impl std::fmt::Display) -> String {
    format!("{program}: {message}")
}
