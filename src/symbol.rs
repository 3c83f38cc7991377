//! # Symbol table
//!
//! A multi-map from identifier to `(kind, level, value)`, keyed by lexical
//! nesting level. Lookup always returns the innermost (greatest `level`)
//! matching entry; a block exit bulk-purges every entry recorded at that
//! block's level.
//!
//! Symbols are stored in an insertion-ordered `Vec` rather than a
//! `HashMap<String, Vec<_>>`: PL/0C programs declare at most a few dozen
//! names per scope, so a linear scan is both simpler and fast enough, and
//! it keeps `purge_level` a single `retain` call.

/// What a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Constant,
    Variable,
    Procedure,
    Function,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub level: u8,
    /// Constant: the literal value. Variable: frame-relative word offset.
    /// Procedure/Function: code address of the prologue (patched in once
    /// the body has been laid out).
    pub value: i32,
    /// Declared parameter count. Only meaningful for `Procedure`/`Function`;
    /// zero otherwise. Used to catch call-site argument-count mismatches.
    pub arity: usize,
}

pub struct SymbolTable {
    entries: Vec<(String, Symbol)>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A fresh table with the bootstrap `main` entry installed, so the
    /// top-level block can be compiled as the body of an implicit
    /// procedure rather than as a special case.
    pub fn new() -> Self {
        let mut table = Self { entries: Vec::new() };
        table.insert(
            "main".to_string(),
            Symbol { kind: SymbolKind::Procedure, level: 0, value: 0, arity: 0 },
        );
        table
    }

    /// Insert a new entry. Does not check for same-level collisions — the
    /// caller (the compiler) checks that before calling.
    pub fn insert(&mut self, name: String, symbol: Symbol) {
        self.entries.push((name, symbol));
    }

    /// The innermost entry for `name`: the one with the greatest `level`.
    /// Since `purge_level` removes every entry above the current nesting
    /// on block exit, every entry present at call time already satisfies
    /// `level <= current`, so "innermost" and "greatest level" coincide.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .max_by_key(|(_, sym)| sym.level)
            .map(|(_, sym)| sym)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.entries
            .iter_mut()
            .filter(|(n, _)| n == name)
            .max_by_key(|(_, sym)| sym.level)
            .map(|(_, sym)| sym)
    }

    /// Is `name` already declared at exactly `level`? Used to reject
    /// redeclaration within the same block.
    pub fn declared_at_level(&self, name: &str, level: u8) -> bool {
        self.entries.iter().any(|(n, sym)| n == name && sym.level == level)
    }

    /// Remove every entry declared at `level` (block exit).
    pub fn purge_level(&mut self, level: u8) {
        self.entries.retain(|(_, sym)| sym.level != level);
    }
}
