use crate::{
    error::Error,
    token::{Directive, Token, TokenKind},
};
use i8086::op::Mnemonic;

// ----------------------------------------------------------------------------
// Statement

/// Shape of one source line. Token slices keep their trailing `Eol`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt<'a> {
    Blank,
    Label(String, &'a [Token]),
    Directive(Directive, &'a [Token]),
    Instruction(Mnemonic, &'a [Token]),
    Data(String, Directive, &'a [Token]),
    Equ(String, &'a [Token]),
}

impl<'a> Stmt<'a> {
    pub fn parse(tokens: &'a [Token]) -> Result<Stmt<'a>, Error> {
        let Some(first) = tokens.first() else {
            return Ok(Stmt::Blank);
        };
        let second = tokens.get(1).map(|t| t.kind);

        // .local:
        if first.kind == TokenKind::Dot && second == Some(TokenKind::Label) {
            let name = format!(".{}", strip_colon(&tokens[1].lexeme));
            return Ok(label_or_equ(name, &tokens[2..]));
        }

        // name:
        if first.kind == TokenKind::Label || first.lexeme.ends_with(':') {
            let name = strip_colon(&first.lexeme).to_string();
            return Ok(label_or_equ(name, &tokens[1..]));
        }

        match (first.kind, second) {
            (TokenKind::Eol, _) => Ok(Stmt::Blank),
            (TokenKind::Generic, Some(TokenKind::Colon)) => {
                Ok(label_or_equ(first.lexeme.clone(), &tokens[2..]))
            }
            (TokenKind::Generic, Some(TokenKind::Directive(Directive::EQU))) => {
                Ok(Stmt::Equ(first.lexeme.clone(), &tokens[2..]))
            }
            (TokenKind::Generic, Some(TokenKind::Directive(d))) if d.unit_size().is_some() => {
                Ok(Stmt::Data(first.lexeme.clone(), d, &tokens[2..]))
            }
            (TokenKind::Directive(d), _) => Ok(Stmt::Directive(d, &tokens[1..])),
            (TokenKind::Instr(m), _) => Ok(Stmt::Instruction(m, &tokens[1..])),
            _ => Err(Error::UnknownLineShape(first.lexeme.clone())),
        }
    }
}

fn strip_colon(lexeme: &str) -> &str {
    lexeme.strip_suffix(':').unwrap_or(lexeme)
}

/// `name: EQU value` defines a constant rather than a label.
fn label_or_equ(name: String, rest: &[Token]) -> Stmt<'_> {
    match rest.first().map(|t| t.kind) {
        Some(TokenKind::Directive(Directive::EQU)) => Stmt::Equ(name, &rest[1..]),
        _ => Stmt::Label(name, rest),
    }
}

/// Split on top-level commas, dropping the trailing `Eol`.
pub fn split_args(tokens: &[Token]) -> Vec<&[Token]> {
    let body = match tokens.last() {
        Some(t) if t.kind == TokenKind::Eol => &tokens[..tokens.len() - 1],
        _ => tokens,
    };
    if body.is_empty() {
        return vec![];
    }
    let mut depth = 0i32;
    let mut args = vec![];
    let mut start = 0;
    for (i, tok) in body.iter().enumerate() {
        match tok.kind {
            TokenKind::LBracket | TokenKind::LParen => depth += 1,
            TokenKind::RBracket | TokenKind::RParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                args.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&body[start..]);
    args
}
