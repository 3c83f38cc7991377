use crate::error::ErrorKind;
use crate::lexer::token::TokenKind;
use crate::lexer::Lexer;

fn lex_all(input: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(input);
    let mut kinds = Vec::new();
    loop {
        let tok = lexer.get();
        let done = tok.kind == TokenKind::Eof;
        kinds.push(tok.kind);
        if done {
            break;
        }
    }
    kinds
}

#[test]
fn empty_input() {
    assert_eq!(lex_all(""), vec![TokenKind::Eof]);
}

#[test]
fn keywords_and_identifiers() {
    assert_eq!(
        lex_all("const var foo"),
        vec![
            TokenKind::Const,
            TokenKind::Var,
            TokenKind::Ident("foo".into()),
            TokenKind::Eof
        ]
    );
}

#[test]
fn keyword_prefix_is_still_an_identifier() {
    assert_eq!(
        lex_all("variance"),
        vec![TokenKind::Ident("variance".into()), TokenKind::Eof]
    );
}

#[test]
fn operator_disambiguation() {
    assert_eq!(
        lex_all("= == != < <= << > >= >> | || & && ! ~ ^"),
        vec![
            TokenKind::Assign,
            TokenKind::Equal,
            TokenKind::NotEqual,
            TokenKind::Less,
            TokenKind::LessEq,
            TokenKind::Shl,
            TokenKind::Greater,
            TokenKind::GreaterEq,
            TokenKind::Shr,
            TokenKind::BitOr,
            TokenKind::Or,
            TokenKind::BitAnd,
            TokenKind::And,
            TokenKind::Not,
            TokenKind::Comp,
            TokenKind::BitXor,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn numbers() {
    assert_eq!(
        lex_all("0 42 007"),
        vec![
            TokenKind::Number(0),
            TokenKind::Number(42),
            TokenKind::Number(7),
            TokenKind::Eof
        ]
    );
}

#[test]
fn numeric_overflow_saturates_and_reports() {
    let mut lexer = Lexer::new("99999999999");
    let tok = lexer.get();
    assert_eq!(tok.kind, TokenKind::Number(i32::MAX));
    assert_eq!(lexer.errors.len(), 1);
    assert_eq!(lexer.errors[0].kind, ErrorKind::NumericOverflow);
}

#[test]
fn line_comment_is_skipped() {
    assert_eq!(
        lex_all("var x; // trailing\nvar y;"),
        vec![
            TokenKind::Var,
            TokenKind::Ident("x".into()),
            TokenKind::Semicolon,
            TokenKind::Var,
            TokenKind::Ident("y".into()),
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn block_comment_is_skipped_and_does_not_nest() {
    assert_eq!(
        lex_all("/* a /* b */ c */ var x;"),
        // The inner `/*` is just text; the first `*/` closes the comment,
        // so `c */ var x;` is left to lex normally.
        vec![
            TokenKind::Ident("c".into()),
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Var,
            TokenKind::Ident("x".into()),
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn unterminated_block_comment_yields_bad_comment_token() {
    let mut lexer = Lexer::new("var x; /* never closes");
    assert_eq!(lexer.get().kind, TokenKind::Var);
    assert_eq!(lexer.get().kind, TokenKind::Ident("x".into()));
    assert_eq!(lexer.get().kind, TokenKind::Semicolon);
    let bad = lexer.get();
    assert_eq!(bad.kind, TokenKind::BadComment);
}

#[test]
fn unknown_character_is_a_token_not_an_error() {
    let mut lexer = Lexer::new("@");
    let tok = lexer.get();
    assert_eq!(tok.kind, TokenKind::Unknown('@'));
    assert!(lexer.errors.is_empty());
}

#[test]
fn newline_inside_block_comment_still_increments_line() {
    let mut lexer = Lexer::new("/* line1\nline2 */ x");
    let tok = lexer.get();
    assert_eq!(tok.kind, TokenKind::Ident("x".into()));
    assert_eq!(tok.span.line, 2);
}

#[test]
fn eof_repeats_forever() {
    let mut lexer = Lexer::new("");
    assert_eq!(lexer.get().kind, TokenKind::Eof);
    assert_eq!(lexer.get().kind, TokenKind::Eof);
    assert_eq!(lexer.get().kind, TokenKind::Eof);
}

#[test]
fn current_reflects_last_get_without_consuming() {
    let mut lexer = Lexer::new("var x");
    assert_eq!(lexer.current().kind, TokenKind::Eof);
    lexer.get();
    assert_eq!(lexer.current().kind, TokenKind::Var);
    assert_eq!(lexer.current().kind, TokenKind::Var);
}

#[test]
fn set_source_resets_line_and_column() {
    let mut lexer = Lexer::new("a\nb\nc");
    lexer.get();
    lexer.get();
    lexer.get();
    assert!(lexer.current().span.line >= 2);
    lexer.set_source("x");
    let tok = lexer.get();
    assert_eq!(tok.span.line, 1);
    assert_eq!(tok.span.col, 1);
}
