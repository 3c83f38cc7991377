//! # Compiler
//!
//! A strictly single-pass recursive-descent compiler. Each grammar
//! production is one method; declarations and control flow emit directly
//! into the growing instruction vector, with forward jumps resolved by
//! recording the emitting index and overwriting its `addr` once the
//! target is known.
//!
//! Errors do not stop compilation: each production that detects a problem
//! records it and recovers by consuming the offending token, so a single
//! pass always reaches end of input and reports every error it found.

use crate::code::{Instruction, Opcode, FRAME_HEADER_SIZE};
use crate::error::{CompileError, ErrorKind, Span};
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::Lexer;
use crate::symbol::{Symbol, SymbolKind, SymbolTable};

/// The output of a (possibly imperfect) compile: whatever code was
/// produced, plus every diagnostic raised along the way. The driver only
/// runs the code when `errors` is empty.
pub struct CompileOutput {
    pub code: Vec<Instruction>,
    pub errors: Vec<CompileError>,
}

pub struct Compiler<'a> {
    lexer: Lexer<'a>,
    current: Token,
    symbols: SymbolTable,
    code: Vec<Instruction>,
    level: u8,
    errors: Vec<CompileError>,
    /// Name of the innermost enclosing `function` (not `procedure`), if
    /// any. An assignment whose target matches this name writes the
    /// running frame's `retVal` slot instead of a declared variable — the
    /// classic Pascal-style "assign to the function's own name to set its
    /// result" convention.
    current_function: Option<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.get();
        let errors = std::mem::take(&mut lexer.errors);
        Self {
            lexer,
            current,
            symbols: SymbolTable::new(),
            code: Vec::new(),
            level: 0,
            errors,
            current_function: None,
        }
    }

    /// Compile the whole program: `block "." `.
    pub fn compile(mut self) -> CompileOutput {
        self.block("main".to_string(), 0, false);
        self.expect(TokenKind::Dot);
        CompileOutput { code: self.code, errors: self.errors }
    }

    // === token plumbing ===

    fn advance(&mut self) -> Token {
        let next = self.lexer.get();
        self.errors.append(&mut self.lexer.errors);
        std::mem::replace(&mut self.current, next)
    }

    fn error(&mut self, kind: ErrorKind) {
        self.errors.push(CompileError::new(kind, self.current.span));
    }

    fn error_at(&mut self, kind: ErrorKind, span: Span) {
        self.errors.push(CompileError::new(kind, span));
    }

    /// Consume the current token if it matches `kind`; otherwise record a
    /// diagnostic and consume it anyway, so a single production never gets
    /// stuck and compilation always reaches end of input.
    fn expect(&mut self, kind: TokenKind) {
        if std::mem::discriminant(&self.current.kind) != std::mem::discriminant(&kind) {
            self.error(ErrorKind::ExpectedToken {
                expected: token_label(&kind),
                found: self.current.kind.to_string(),
            });
        }
        self.advance();
    }

    fn expect_ident(&mut self) -> String {
        match self.current.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            other => {
                self.error(ErrorKind::ExpectedToken { expected: "identifier", found: other.to_string() });
                self.advance();
                String::new()
            }
        }
    }

    fn expect_number(&mut self) -> i32 {
        match self.current.kind {
            TokenKind::Number(n) => {
                self.advance();
                n
            }
            ref other => {
                self.error(ErrorKind::ExpectedToken { expected: "number", found: other.to_string() });
                self.advance();
                0
            }
        }
    }

    // === emission ===

    fn emit(&mut self, op: Opcode, level: u8, addr: i32) -> usize {
        let idx = self.code.len();
        tracing::debug!(idx, op = op.mnemonic(), level, addr, "emit");
        self.code.push(Instruction::new(op, level, addr));
        idx
    }

    fn patch(&mut self, idx: usize, addr: i32) {
        tracing::trace!(idx, addr, "patch");
        self.code[idx].addr = addr;
    }

    fn here(&self) -> i32 {
        self.code.len() as i32
    }

    // === grammar ===

    /// `block = [const decls] [var decls] { procedure/function decls }
    /// statement .`
    ///
    /// `name` is the symbol entry this block's entry address patches into;
    /// `nargs` is its declared parameter count, emitted into the trailing
    /// `Ret`/`Retf nargs`; `is_function` selects `Retf` (push saved return
    /// value) over plain `Ret`.
    fn block(&mut self, name: String, nargs: i32, is_function: bool) {
        let jump_over = self.emit(Opcode::Jump, 0, 0);

        if self.current.kind == TokenKind::Const {
            self.advance();
            loop {
                let cname = self.expect_ident();
                self.expect(TokenKind::Assign);
                let value = self.expect_number();
                if self.symbols.declared_at_level(&cname, self.level) {
                    self.error(ErrorKind::DuplicateDeclaration(cname));
                } else {
                    self.symbols.insert(
                        cname,
                        Symbol { kind: SymbolKind::Constant, level: self.level, value, arity: 0 },
                    );
                }
                if self.current.kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::Semicolon);
        }

        let mut local_offset = FRAME_HEADER_SIZE;
        if self.current.kind == TokenKind::Var {
            self.advance();
            loop {
                let vname = self.expect_ident();
                if self.symbols.declared_at_level(&vname, self.level) {
                    self.error(ErrorKind::DuplicateDeclaration(vname));
                } else {
                    self.symbols.insert(
                        vname,
                        Symbol {
                            kind: SymbolKind::Variable,
                            level: self.level,
                            value: local_offset,
                            arity: 0,
                        },
                    );
                    local_offset += 1;
                }
                if self.current.kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::Semicolon);
        }

        while matches!(self.current.kind, TokenKind::Procedure | TokenKind::Function) {
            let is_func = self.current.kind == TokenKind::Function;
            self.advance();
            let sub_name = self.expect_ident();
            if self.symbols.declared_at_level(&sub_name, self.level) {
                self.error(ErrorKind::DuplicateDeclaration(sub_name.clone()));
            }
            let kind = if is_func { SymbolKind::Function } else { SymbolKind::Procedure };
            self.symbols.insert(
                sub_name.clone(),
                Symbol { kind, level: self.level, value: 0, arity: 0 },
            );

            self.expect(TokenKind::LParen);
            let mut params = Vec::new();
            if self.current.kind != TokenKind::RParen {
                params.push(self.expect_ident());
                while self.current.kind == TokenKind::Comma {
                    self.advance();
                    params.push(self.expect_ident());
                }
            }
            self.expect(TokenKind::RParen);

            let nparams = params.len();
            if let Some(sym) = self.symbols.lookup_mut(&sub_name) {
                sym.arity = nparams;
            }

            self.level += 1;
            for (i, pname) in params.into_iter().enumerate() {
                let offset = -(nparams as i32) + i as i32;
                self.symbols.insert(
                    pname,
                    Symbol { kind: SymbolKind::Variable, level: self.level, value: offset, arity: 0 },
                );
            }
            let saved_function = self.current_function.take();
            if is_func {
                self.current_function = Some(sub_name.clone());
            }
            self.block(sub_name, nparams as i32, is_func);
            self.current_function = saved_function;
            self.level -= 1;

            self.expect(TokenKind::Semicolon);
        }

        let entry = self.here();
        self.patch(jump_over, entry);
        if let Some(sym) = self.symbols.lookup_mut(&name) {
            sym.value = entry;
        }

        self.emit(Opcode::Enter, 0, local_offset);
        self.statement();
        if is_function {
            self.emit(Opcode::Retf, 0, nargs);
        } else {
            self.emit(Opcode::Ret, 0, nargs);
        }

        self.symbols.purge_level(self.level);
    }

    fn statement(&mut self) {
        match self.current.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                if self.current.kind == TokenKind::Assign {
                    self.advance();
                    self.expr();
                    self.emit_assignment(&name);
                } else if self.current.kind == TokenKind::LParen {
                    self.call(&name);
                } else {
                    self.error(ErrorKind::ExpectedToken {
                        expected: "'=' or '('",
                        found: self.current.kind.to_string(),
                    });
                }
            }
            TokenKind::Begin => {
                self.advance();
                self.statement();
                while self.current.kind == TokenKind::Semicolon {
                    self.advance();
                    self.statement();
                }
                self.expect(TokenKind::End);
            }
            TokenKind::If => {
                self.advance();
                self.cond();
                self.expect(TokenKind::Then);
                let jneq = self.emit(Opcode::Jneq, 0, 0);
                self.statement();
                if self.current.kind == TokenKind::Else {
                    let jmp = self.emit(Opcode::Jump, 0, 0);
                    let else_entry = self.here();
                    self.patch(jneq, else_entry);
                    self.advance();
                    self.statement();
                    let after = self.here();
                    self.patch(jmp, after);
                } else {
                    let after = self.here();
                    self.patch(jneq, after);
                }
            }
            TokenKind::While => {
                self.advance();
                let head = self.here();
                self.cond();
                self.expect(TokenKind::Do);
                let jexit = self.emit(Opcode::Jneq, 0, 0);
                self.statement();
                self.emit(Opcode::Jump, 0, head);
                let after = self.here();
                self.patch(jexit, after);
            }
            TokenKind::Repeat => {
                self.advance();
                let head = self.here();
                self.statement();
                self.expect(TokenKind::Until);
                self.cond();
                self.emit(Opcode::Jneq, 0, head);
            }
            _ => {}
        }
    }

    fn emit_assignment(&mut self, name: &str) {
        if self.current_function.as_deref() == Some(name) {
            self.emit(Opcode::PushVar, 0, crate::code::FRAME_RET_VAL);
            self.emit(Opcode::Assign, 0, 0);
            return;
        }
        match self.symbols.lookup(name).cloned() {
            Some(sym) if sym.kind == SymbolKind::Variable => {
                let hops = self.level - sym.level;
                self.emit(Opcode::PushVar, hops, sym.value);
                self.emit(Opcode::Assign, 0, 0);
            }
            Some(sym) if sym.kind == SymbolKind::Constant => {
                self.error(ErrorKind::AssignToConstant(name.to_string()));
            }
            Some(_) => {
                self.error(ErrorKind::AssignToCallable(name.to_string()));
            }
            None => {
                self.error(ErrorKind::UndefinedIdentifier(name.to_string()));
            }
        }
    }

    /// `cond = "odd" expr | expr relop expr .`
    fn cond(&mut self) {
        if self.current.kind == TokenKind::Odd {
            self.advance();
            self.expr();
            self.emit(Opcode::PushConst, 0, 1);
            self.emit(Opcode::BAnd, 0, 0);
            return;
        }

        self.expr();
        let op = match self.current.kind {
            TokenKind::Equal => Opcode::Eq,
            TokenKind::NotEqual => Opcode::Neq,
            TokenKind::Less => Opcode::Lt,
            TokenKind::LessEq => Opcode::Leq,
            TokenKind::Greater => Opcode::Gt,
            TokenKind::GreaterEq => Opcode::Geq,
            ref other => {
                self.error(ErrorKind::ExpectedToken {
                    expected: "relational operator",
                    found: other.to_string(),
                });
                self.advance();
                return;
            }
        };
        self.advance();
        self.expr();
        self.emit(op, 0, 0);
    }

    /// `expr = [ "+"|"-" ] term { ("+"|"-"|"|"|"^"|"||") term } .`
    fn expr(&mut self) {
        match self.current.kind {
            TokenKind::Plus => {
                self.advance();
                self.term();
            }
            TokenKind::Minus => {
                self.advance();
                self.term();
                self.emit(Opcode::Neg, 0, 0);
            }
            _ => self.term(),
        }

        loop {
            let op = match self.current.kind {
                TokenKind::Plus => Opcode::Add,
                TokenKind::Minus => Opcode::Sub,
                TokenKind::BitOr => Opcode::BOr,
                TokenKind::BitXor => Opcode::BXor,
                TokenKind::Or => Opcode::LOr,
                _ => break,
            };
            self.advance();
            self.term();
            self.emit(op, 0, 0);
        }
    }

    /// `term = fact { ("*"|"/"|"%"|"&"|"<<"|">>"|"&&") fact } .`
    fn term(&mut self) {
        self.fact();
        loop {
            let op = match self.current.kind {
                TokenKind::Star => Opcode::Mul,
                TokenKind::Slash => Opcode::Div,
                TokenKind::Percent => Opcode::Mod,
                TokenKind::BitAnd => Opcode::BAnd,
                TokenKind::Shl => Opcode::Shl,
                TokenKind::Shr => Opcode::Shr,
                TokenKind::And => Opcode::LAnd,
                _ => break,
            };
            self.advance();
            self.fact();
            self.emit(op, 0, 0);
        }
    }

    /// `fact = ident ["(" args ")"] | number | "(" expr ")" | "!" fact | "~" fact .`
    fn fact(&mut self) {
        match self.current.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                if self.current.kind == TokenKind::LParen {
                    self.call(&name);
                } else {
                    self.emit_value_read(&name);
                }
            }
            TokenKind::Number(n) => {
                self.advance();
                self.emit(Opcode::PushConst, 0, n);
            }
            TokenKind::LParen => {
                self.advance();
                self.expr();
                self.expect(TokenKind::RParen);
            }
            TokenKind::Not => {
                self.advance();
                self.fact();
                self.emit(Opcode::Not, 0, 0);
            }
            TokenKind::Comp => {
                self.advance();
                self.fact();
                self.emit(Opcode::Comp, 0, 0);
            }
            other => {
                self.error(ErrorKind::ExpectedToken { expected: "expression", found: other.to_string() });
                self.advance();
            }
        }
    }

    fn emit_value_read(&mut self, name: &str) {
        match self.symbols.lookup(name).cloned() {
            Some(sym) if sym.kind == SymbolKind::Constant => {
                self.emit(Opcode::PushConst, 0, sym.value);
            }
            Some(sym) if sym.kind == SymbolKind::Variable => {
                let hops = self.level - sym.level;
                self.emit(Opcode::PushVar, hops, sym.value);
                self.emit(Opcode::Eval, 0, 0);
            }
            Some(_) => {
                self.error(ErrorKind::CallOfNonCallable(name.to_string()));
            }
            None => {
                self.error(ErrorKind::UndefinedIdentifier(name.to_string()));
            }
        }
    }

    /// Shared by procedure-call statements and function-call factors: both
    /// emit the same `Call lvl addr`, and differ only in whether the
    /// callee ends with `Ret` (result discarded) or `Retf` (result pushed
    /// for the caller), which is fixed at the callee's own declaration.
    fn call(&mut self, name: &str) {
        let nargs = self.call_args();
        match self.symbols.lookup(name).cloned() {
            Some(sym) if matches!(sym.kind, SymbolKind::Procedure | SymbolKind::Function) => {
                if sym.arity != nargs {
                    self.error_at(
                        ErrorKind::ArgCountMismatch { name: name.to_string(), expected: sym.arity, found: nargs },
                        self.current.span,
                    );
                }
                let hops = self.level - sym.level;
                self.emit(Opcode::Call, hops, sym.value);
            }
            Some(_) => self.error(ErrorKind::CallOfNonCallable(name.to_string())),
            None => self.error(ErrorKind::UndefinedIdentifier(name.to_string())),
        }
    }

    fn call_args(&mut self) -> usize {
        self.expect(TokenKind::LParen);
        let mut count = 0;
        if self.current.kind != TokenKind::RParen {
            self.expr();
            count += 1;
            while self.current.kind == TokenKind::Comma {
                self.advance();
                self.expr();
                count += 1;
            }
        }
        self.expect(TokenKind::RParen);
        count
    }
}

/// Static label for an expected-but-absent token, used in
/// `ErrorKind::ExpectedToken`. Only covers the fixed-text kinds this
/// compiler ever passes to `expect`; data-carrying kinds go through
/// `expect_ident`/`expect_number` instead.
fn token_label(kind: &TokenKind) -> &'static str {
    use TokenKind::*;
    match kind {
        Const => "'const'",
        Var => "'var'",
        Procedure => "'procedure'",
        Function => "'function'",
        Begin => "'begin'",
        End => "'end'",
        If => "'if'",
        Then => "'then'",
        Else => "'else'",
        While => "'while'",
        Do => "'do'",
        Repeat => "'repeat'",
        Until => "'until'",
        Odd => "'odd'",
        Assign => "'='",
        Equal => "'=='",
        NotEqual => "'!='",
        Less => "'<'",
        LessEq => "'<='",
        Greater => "'>'",
        GreaterEq => "'>='",
        Or => "'||'",
        And => "'&&'",
        Shl => "'<<'",
        Shr => "'>>'",
        Not => "'!'",
        Comp => "'~'",
        BitOr => "'|'",
        BitAnd => "'&'",
        BitXor => "'^'",
        Plus => "'+'",
        Minus => "'-'",
        Star => "'*'",
        Slash => "'/'",
        Percent => "'%'",
        LParen => "'('",
        RParen => "')'",
        Comma => "','",
        Dot => "'.'",
        Semicolon => "';'",
        Ident(_) => "identifier",
        Number(_) => "number",
        Eof => "end of input",
        Unknown(_) => "valid character",
        BadComment => "terminated comment",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Opcode;

    fn compile_ok(src: &str) -> Vec<Instruction> {
        let out = Compiler::new(src).compile();
        assert!(out.errors.is_empty(), "unexpected errors: {:?}", out.errors);
        out.code
    }

    #[test]
    fn simple_assignment_emits_expected_opcodes() {
        let code = compile_ok("var i; i = 1 + 2 * 3 .");
        let ops: Vec<Opcode> = code.iter().map(|i| i.op).collect();
        assert!(ops.contains(&Opcode::PushConst));
        assert!(ops.contains(&Opcode::Add));
        assert!(ops.contains(&Opcode::Mul));
        assert!(ops.contains(&Opcode::Assign));
        assert_eq!(*ops.last().unwrap(), Opcode::Ret);
    }

    #[test]
    fn undefined_identifier_is_reported() {
        let out = Compiler::new("var x; x = y .").compile();
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, ErrorKind::UndefinedIdentifier("y".to_string()));
    }

    #[test]
    fn assigning_to_constant_is_an_error() {
        let out = Compiler::new("const c = 1; c = 2 .").compile();
        assert_eq!(out.errors[0].kind, ErrorKind::AssignToConstant("c".to_string()));
    }

    #[test]
    fn duplicate_declaration_at_same_level_is_an_error() {
        let out = Compiler::new("var x, x; x = 1 .").compile();
        assert!(out
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::DuplicateDeclaration("x".to_string())));
    }

    #[test]
    fn call_with_wrong_argument_count_is_reported() {
        let out = Compiler::new("procedure p(a, b) a = a; p(1) .").compile();
        assert!(out.errors.iter().any(|e| matches!(
            &e.kind,
            ErrorKind::ArgCountMismatch { expected: 2, found: 1, .. }
        )));
    }

    #[test]
    fn procedure_and_function_declarations_compile_cleanly() {
        let code = compile_ok("var x; function sq(a) x = a * a; x = sq(4) .");
        assert!(code.iter().any(|i| i.op == Opcode::Call));
        assert!(code.iter().any(|i| i.op == Opcode::Retf));
    }

    #[test]
    fn if_without_else_patches_jneq_to_fallthrough() {
        let code = compile_ok("var i; if i == 0 then i = 1 .");
        let jneq = code.iter().find(|i| i.op == Opcode::Jneq).unwrap();
        assert_eq!(jneq.addr as usize, code.len() - 1);
    }

    #[test]
    fn while_loop_jumps_back_to_condition() {
        let code = compile_ok("var i; begin i = 0; while i < 3 do i = i + 1 end.");
        let back_jump = code.iter().rev().find(|i| i.op == Opcode::Jump).unwrap();
        assert!(back_jump.addr >= 0);
    }

    #[test]
    fn repeat_until_executes_body_before_checking_condition() {
        let code = compile_ok("var i; begin i = 0; repeat i = i + 1 until i >= 2 end.");
        assert!(code.iter().any(|i| i.op == Opcode::Jneq));
    }

    #[test]
    fn odd_is_synthesised_as_mask_and_band() {
        let code = compile_ok("var i; if odd i then i = 1 .");
        let push_one = code
            .iter()
            .position(|i| i.op == Opcode::PushConst && i.addr == 1)
            .unwrap();
        assert_eq!(code[push_one + 1].op, Opcode::BAnd);
    }

    #[test]
    fn call_of_non_callable_is_reported() {
        let out = Compiler::new("var x; x() .").compile();
        assert!(out.errors.iter().any(|e| matches!(&e.kind, ErrorKind::CallOfNonCallable(n) if n == "x")));
    }

    #[test]
    fn assigning_to_the_enclosing_functions_own_name_targets_retval() {
        let code = compile_ok("var r; function sq(a) sq = a * a; r = sq(4) .");
        let assign_idx = code.iter().position(|i| i.op == Opcode::Assign).unwrap();
        let push_var = code[assign_idx - 1];
        assert_eq!(push_var.op, Opcode::PushVar);
        assert_eq!(push_var.level, 0);
        assert_eq!(push_var.addr, crate::code::FRAME_RET_VAL);
    }

    #[test]
    fn nested_procedure_access_to_outer_variable_uses_one_hop() {
        let code = compile_ok("var x; procedure inc() x = x + 1; inc() .");
        let push_var = code.iter().find(|i| i.op == Opcode::PushVar).unwrap();
        assert_eq!(push_var.level, 1);
    }
}
