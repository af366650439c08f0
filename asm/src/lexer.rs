use crate::error::Error;
use crate::token::{Directive, Token, TokenKind};
use i8086::{
    op::Mnemonic,
    reg::{Reg16, Reg8, SegReg},
};
use std::iter::Peekable;
use std::str::CharIndices;

/// Splits one source line into `(kind, lexeme)` tokens ending with `Eol`.
pub struct LineLexer<'a> {
    line: &'a str,
    iter: Peekable<CharIndices<'a>>,
}

impl<'a> LineLexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            line,
            iter: line.char_indices().peekable(),
        }
    }

    pub fn parse(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token::eol());
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, Error> {
        // 0. Skip whitespaces
        while self.iter.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}

        // 1. End of line
        let Some((start, c)) = self.iter.next() else {
            return Ok(None);
        };

        // 2. Comment
        if c == ';' {
            while self.iter.next().is_some() {}
            return Ok(None);
        }

        // 3. Quoted string or character
        if c == '"' || c == '\'' {
            let body_start = start + 1;
            for (end, ch) in self.iter.by_ref() {
                if ch == c {
                    let body = &self.line[body_start..end];
                    let kind = match c == '\'' && body.chars().count() == 1 {
                        true => TokenKind::Char,
                        false => TokenKind::Str,
                    };
                    return Ok(Some(Token::new(kind, body)));
                }
            }
            return Err(Error::UnterminatedString(self.line[start..].to_string()));
        }

        // 4. Location counter
        if c == '$' {
            if self.iter.next_if(|(_, ch)| *ch == '$').is_some() {
                return Ok(Some(Token::new(TokenKind::Dollar, "$$")));
            }
            return Ok(Some(Token::new(TokenKind::Dollar, "$")));
        }

        // 5. Double character operator
        if let Some(&(_, c2)) = self.iter.peek() {
            if (c, c2) == ('<', '<') || (c, c2) == ('>', '>') {
                self.iter.next();
                return Ok(Some(Token::new(TokenKind::Operator, &self.line[start..start + 2])));
            }
        }

        // 6. Single character token
        if let Some(kind) = single_char_token(c) {
            return Ok(Some(Token::new(kind, c.to_string())));
        }

        // 7. Identifier, keyword or label
        if c.is_ascii_alphabetic() || c == '_' {
            let end = self.take_word(start, c);
            let word = &self.line[start..end];
            if self.iter.next_if(|(_, ch)| *ch == ':').is_some() {
                return Ok(Some(Token::new(TokenKind::Label, format!("{word}:"))));
            }
            let upper = word.to_ascii_uppercase();
            return Ok(Some(match keyword(&upper) {
                Some(kind) => Token::new(kind, upper),
                None => Token::new(TokenKind::Generic, word),
            }));
        }

        // 8. Number literal
        if c.is_ascii_digit() {
            let end = self.take_word(start, c);
            return Ok(Some(Token::new(TokenKind::Number, &self.line[start..end])));
        }

        // 9. Error
        Err(Error::UnexpectedChar(c))
    }

    fn take_word(&mut self, start: usize, first: char) -> usize {
        let mut end = start + first.len_utf8();
        while let Some((ptr, ch)) = self
            .iter
            .next_if(|(_, ch)| ch.is_ascii_alphanumeric() || *ch == '_')
        {
            end = ptr + ch.len_utf8();
        }
        end
    }
}

fn single_char_token(c: char) -> Option<TokenKind> {
    match c {
        ',' => Some(TokenKind::Comma),
        ':' => Some(TokenKind::Colon),
        '.' => Some(TokenKind::Dot),
        '[' => Some(TokenKind::LBracket),
        ']' => Some(TokenKind::RBracket),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '+' | '-' | '*' | '/' | '&' | '|' | '^' | '~' => Some(TokenKind::Operator),
        _ => None,
    }
}

fn keyword(upper: &str) -> Option<TokenKind> {
    if let Ok(r) = upper.parse::<Reg8>() {
        return Some(TokenKind::Reg8(r));
    }
    if let Ok(r) = upper.parse::<Reg16>() {
        return Some(TokenKind::Reg16(r));
    }
    if let Ok(r) = upper.parse::<SegReg>() {
        return Some(TokenKind::SegReg(r));
    }
    if let Ok(d) = upper.parse::<Directive>() {
        return Some(TokenKind::Directive(d));
    }
    upper.parse::<Mnemonic>().ok().map(TokenKind::Instr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<String> {
        LineLexer::new(line)
            .parse()
            .unwrap()
            .iter()
            .map(|t| t.kind.to_string())
            .collect()
    }

    #[test]
    fn instruction_line() {
        assert_eq!(
            kinds("  mov ax, 0x10 ; load"),
            vec!["INSTR_MOV", "REG16_AX", "COMMA", "NUMBER", "EOL"]
        );
    }

    #[test]
    fn label_keeps_colon() {
        let tokens = LineLexer::new("start: nop").parse().unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Label, "start:"));
        assert_eq!(tokens[1].kind, TokenKind::Instr(Mnemonic::NOP));
    }

    #[test]
    fn local_label() {
        assert_eq!(kinds(".loop:"), vec!["DOT", "LABEL", "EOL"]);
    }

    #[test]
    fn memory_operand() {
        assert_eq!(
            kinds("mov byte [bx+si-2], al"),
            vec![
                "INSTR_MOV",
                "INSTR_GENERIC",
                "LBRACKET",
                "REG16_BX",
                "OPERATOR",
                "REG16_SI",
                "OPERATOR",
                "NUMBER",
                "RBRACKET",
                "COMMA",
                "REG8_AL",
                "EOL"
            ]
        );
    }

    #[test]
    fn data_and_strings() {
        let tokens = LineLexer::new("msg db \"Hi\", 'A', 0").parse().unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::Generic, "msg"));
        assert_eq!(tokens[1].kind, TokenKind::Directive(Directive::DB));
        assert_eq!(tokens[2], Token::new(TokenKind::Str, "Hi"));
        assert_eq!(tokens[4], Token::new(TokenKind::Char, "A"));
    }

    #[test]
    fn dollar_and_shift() {
        assert_eq!(
            kinds("times 510-($-$$) db 0"),
            vec![
                "DIRECTIVE_TIMES",
                "NUMBER",
                "OPERATOR",
                "LPAREN",
                "DOLLAR",
                "OPERATOR",
                "DOLLAR",
                "RPAREN",
                "DIRECTIVE_DB",
                "NUMBER",
                "EOL"
            ]
        );
        let tokens = LineLexer::new("1<<4").parse().unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::Operator, "<<"));
    }

    #[test]
    fn blank_and_comment() {
        assert_eq!(kinds(""), vec!["EOL"]);
        assert_eq!(kinds("   ; only a comment"), vec!["EOL"]);
    }

    #[test]
    fn errors() {
        assert!(matches!(
            LineLexer::new("db \"open").parse(),
            Err(Error::UnterminatedString(_))
        ));
        assert!(matches!(
            LineLexer::new("mov ax, #1").parse(),
            Err(Error::UnexpectedChar('#'))
        ));
    }
}
