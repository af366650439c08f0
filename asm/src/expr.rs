//! Assembly-time integer expressions.
//!
//! `$$` is replaced by the section base and `$` by the current address
//! before parsing. Precedence, lowest first:
//!
//! | level | operators      |
//! |-------|----------------|
//! | 1     | `+` `-` `\|`   |
//! | 2     | `^`            |
//! | 3     | `&`            |
//! | 4     | `<<` `>>`      |
//! | 5     | `*` `/`        |
//! | 6     | unary `+ - ~`, `( )` |

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("Unexpected trailing characters: `{0}`")]
    Trailing(String),

    #[error("Missing closing parenthesis")]
    MissingParen,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Missing operand")]
    MissingOperand,

    #[error("Invalid number: `{0}`")]
    InvalidNumber(String),

    #[error("Undefined symbol: `{0}`")]
    UndefinedSymbol(String),
}

/// Evaluate an expression with no symbols other than `$` and `$$`.
pub fn evaluate(expr: &str, current: i64, base: i64) -> Result<i64, ExprError> {
    evaluate_with(expr, current, base, |_| None)
}

/// Evaluate an expression, resolving identifiers through `lookup`.
pub fn evaluate_with<F>(expr: &str, current: i64, base: i64, lookup: F) -> Result<i64, ExprError>
where
    F: Fn(&str) -> Option<i64>,
{
    let text = expr
        .replace("$$", &base.to_string())
        .replace('$', &current.to_string());
    let mut parser = Parser {
        src: &text,
        pos: 0,
        lookup: &lookup,
    };
    let value = parser.parse_or()?;
    parser.skip_ws();
    match parser.rest() {
        "" => Ok(value),
        rest => Err(ExprError::Trailing(rest.to_string())),
    }
}

/// Integer literal: `0x`/`0X` hex, otherwise decimal.
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => text.parse::<i64>().ok(),
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Option<i64>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, op: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(op) {
            self.pos += op.len();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<i64, ExprError> {
        let mut lhs = self.parse_xor()?;
        loop {
            if self.eat("+") {
                lhs = lhs.wrapping_add(self.parse_xor()?);
            } else if self.eat("-") {
                lhs = lhs.wrapping_sub(self.parse_xor()?);
            } else if self.eat("|") {
                lhs |= self.parse_xor()?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_xor(&mut self) -> Result<i64, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat("^") {
            lhs ^= self.parse_and()?;
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<i64, ExprError> {
        let mut lhs = self.parse_shift()?;
        while self.eat("&") {
            lhs &= self.parse_shift()?;
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<i64, ExprError> {
        let mut lhs = self.parse_mul()?;
        loop {
            if self.eat("<<") {
                lhs = lhs.wrapping_shl(self.parse_mul()? as u32);
            } else if self.eat(">>") {
                lhs = lhs.wrapping_shr(self.parse_mul()? as u32);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_mul(&mut self) -> Result<i64, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.eat("*") {
                lhs = lhs.wrapping_mul(self.parse_unary()?);
            } else if self.eat("/") {
                let rhs = self.parse_unary()?;
                if rhs == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                lhs = lhs.wrapping_div(rhs);
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<i64, ExprError> {
        if self.eat("+") {
            return self.parse_unary();
        }
        if self.eat("-") {
            return Ok(self.parse_unary()?.wrapping_neg());
        }
        if self.eat("~") {
            return Ok(!self.parse_unary()?);
        }
        if self.eat("(") {
            let value = self.parse_or()?;
            if !self.eat(")") {
                return Err(ExprError::MissingParen);
            }
            return Ok(value);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<i64, ExprError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(ExprError::MissingOperand);
        }
        let word = &rest[..len];
        self.pos += len;

        if word.starts_with(|c: char| c.is_ascii_digit()) {
            parse_number(word).ok_or_else(|| ExprError::InvalidNumber(word.to_string()))
        } else {
            (self.lookup)(word).ok_or_else(|| ExprError::UndefinedSymbol(word.to_string()))
        }
    }
}
