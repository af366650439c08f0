use crate::error::Error;
use i8086::{
    op::Mnemonic,
    reg::{Reg16, Reg8, SegReg},
};
use serde::Serialize;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, Display)]
pub enum Directive {
    BITS,
    ORG,
    DB,
    DW,
    DD,
    DQ,
    DT,
    EQU,
    SECTION,
    EXTERN,
    GLOBAL,
    ALIGN,
    TIMES,
}

impl Directive {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().parse::<Self>() {
            Ok(d) => Ok(d),
            Err(_) => Err(format!("Unknown directive: {s}")),
        }
    }

    /// Bytes per value for data directives.
    pub fn unit_size(&self) -> Option<usize> {
        match self {
            Directive::DB => Some(1),
            Directive::DW => Some(2),
            Directive::DD => Some(4),
            Directive::DQ => Some(8),
            Directive::DT => Some(10),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Instr(Mnemonic),
    Generic,
    Directive(Directive),
    Reg8(Reg8),
    Reg16(Reg16),
    SegReg(SegReg),
    Number,
    Str,
    Char,
    Comma,
    Label,
    Dot,
    Colon,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Operator,
    Dollar,
    Eol,
}

impl std::str::FromStr for TokenKind {
    type Err = Error;

    /// Parse a kind string such as `INSTR_MOV`, `REG16_AX` or `COMMA`.
    fn from_str(s: &str) -> Result<Self, Error> {
        let unknown = || Error::UnknownTokenKind(s.to_string());

        if let Some(name) = s.strip_prefix("INSTR_") {
            return match name {
                "GENERIC" => Ok(TokenKind::Generic),
                _ => Mnemonic::parse(name)
                    .map(TokenKind::Instr)
                    .map_err(|_| unknown()),
            };
        }
        if let Some(name) = s.strip_prefix("DIRECTIVE_") {
            return Directive::parse(name)
                .map(TokenKind::Directive)
                .map_err(|_| Error::UnknownDirective(name.to_string()));
        }
        if let Some(name) = s.strip_prefix("REG8_") {
            return Reg8::parse(name).map(TokenKind::Reg8).map_err(|_| unknown());
        }
        if let Some(name) = s.strip_prefix("REG16_") {
            return Reg16::parse(name).map(TokenKind::Reg16).map_err(|_| unknown());
        }
        if let Some(name) = s.strip_prefix("SEGREG_") {
            return SegReg::parse(name).map(TokenKind::SegReg).map_err(|_| unknown());
        }

        match s {
            "NUMBER" => Ok(TokenKind::Number),
            "STRING" => Ok(TokenKind::Str),
            "CHAR" => Ok(TokenKind::Char),
            "COMMA" => Ok(TokenKind::Comma),
            "LABEL" => Ok(TokenKind::Label),
            "DOT" => Ok(TokenKind::Dot),
            "COLON" => Ok(TokenKind::Colon),
            "LBRACKET" => Ok(TokenKind::LBracket),
            "RBRACKET" => Ok(TokenKind::RBracket),
            "LPAREN" => Ok(TokenKind::LParen),
            "RPAREN" => Ok(TokenKind::RParen),
            "OPERATOR" => Ok(TokenKind::Operator),
            "DOLLAR" => Ok(TokenKind::Dollar),
            "EOL" => Ok(TokenKind::Eol),
            _ => Err(unknown()),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Instr(m) => write!(f, "INSTR_{m}"),
            TokenKind::Generic => write!(f, "INSTR_GENERIC"),
            TokenKind::Directive(d) => write!(f, "DIRECTIVE_{d}"),
            TokenKind::Reg8(r) => write!(f, "REG8_{r}"),
            TokenKind::Reg16(r) => write!(f, "REG16_{r}"),
            TokenKind::SegReg(r) => write!(f, "SEGREG_{r}"),
            TokenKind::Number => write!(f, "NUMBER"),
            TokenKind::Str => write!(f, "STRING"),
            TokenKind::Char => write!(f, "CHAR"),
            TokenKind::Comma => write!(f, "COMMA"),
            TokenKind::Label => write!(f, "LABEL"),
            TokenKind::Dot => write!(f, "DOT"),
            TokenKind::Colon => write!(f, "COLON"),
            TokenKind::LBracket => write!(f, "LBRACKET"),
            TokenKind::RBracket => write!(f, "RBRACKET"),
            TokenKind::LParen => write!(f, "LPAREN"),
            TokenKind::RParen => write!(f, "RPAREN"),
            TokenKind::Operator => write!(f, "OPERATOR"),
            TokenKind::Dollar => write!(f, "DOLLAR"),
            TokenKind::Eol => write!(f, "EOL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
        }
    }

    pub fn eol() -> Self {
        Token::new(TokenKind::Eol, "")
    }

    /// Build one line from parallel kind and lexeme sequences.
    ///
    /// The result always ends with `Eol`.
    pub fn from_pairs<K, L>(kinds: &[K], lexemes: &[L]) -> Result<Vec<Token>, Error>
    where
        K: AsRef<str>,
        L: AsRef<str>,
    {
        if kinds.len() != lexemes.len() {
            return Err(Error::TokenCountMismatch(kinds.len(), lexemes.len()));
        }
        let mut tokens = kinds
            .iter()
            .zip(lexemes)
            .map(|(k, l)| Ok(Token::new(k.as_ref().parse()?, l.as_ref())))
            .collect::<Result<Vec<_>, Error>>()?;
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eol) {
            tokens.push(Token::eol());
        }
        Ok(tokens)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Identifier spelled `word`, ignoring case.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Generic && self.lexeme.eq_ignore_ascii_case(word)
    }
}

/// Source text of a token run, without the trailing `Eol`.
pub fn join(tokens: &[Token], sep: &str) -> String {
    tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eol)
        .map(|t| t.lexeme.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Expression text of a token run, one space between tokens so adjacent
/// literals stay separate. A `.` stays attached to the name after it.
pub fn expr_text(tokens: &[Token]) -> String {
    let mut text = String::new();
    let mut prev = None;
    for tok in tokens.iter().filter(|t| t.kind != TokenKind::Eol) {
        if prev.is_some() && prev != Some(TokenKind::Dot) {
            text.push(' ');
        }
        text.push_str(&tok.lexeme);
        prev = Some(tok.kind);
    }
    text
}
