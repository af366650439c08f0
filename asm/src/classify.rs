use crate::{
    error::Error,
    state::AssemblerState,
    token::{expr_text, join, Token, TokenKind},
};
use i8086::{
    operand::{MemRef, Operand},
    reg::Reg16,
};

/// Classify the operand starting at `tokens[index]`.
///
/// Returns the operand and the index of the first token after it. Immediate
/// expressions run up to the next `Comma` or `Eol`.
pub fn classify(
    tokens: &[Token],
    index: usize,
    state: &AssemblerState,
) -> Result<(Operand, usize), Error> {
    let token = tokens
        .get(index)
        .ok_or_else(|| Error::UnknownOperand(String::new()))?;

    if let Some((byte, open)) = size_prefix(tokens, index) {
        return memory(tokens, open, byte, state);
    }

    match token.kind {
        TokenKind::Reg8(r) => Ok((Operand::Reg8(r), index + 1)),
        TokenKind::Reg16(r) => Ok((Operand::Reg16(r), index + 1)),
        TokenKind::SegReg(r) => Ok((Operand::SegReg(r), index + 1)),
        TokenKind::Char => match token.lexeme.as_bytes() {
            [c] => Ok((Operand::Char(*c), index + 1)),
            _ => Err(Error::UnknownOperand(token.lexeme.clone())),
        },
        TokenKind::Str => Ok((Operand::String(token.lexeme.as_bytes().to_vec()), index + 1)),
        TokenKind::LBracket => memory(tokens, index, false, state),
        TokenKind::Number
        | TokenKind::Operator
        | TokenKind::LParen
        | TokenKind::Dollar
        | TokenKind::Generic
        | TokenKind::Dot => {
            let end = tokens[index..]
                .iter()
                .position(|t| matches!(t.kind, TokenKind::Comma | TokenKind::Eol))
                .map_or(tokens.len(), |n| index + n);
            let value = state.eval(&expr_text(&tokens[index..end]))?;
            Ok((Operand::immediate(value), end))
        }
        _ => Err(Error::UnknownOperand(token.lexeme.clone())),
    }
}

/// `BYTE [` / `WORD PTR [`: whether the access is a byte, and the index of `[`.
pub fn size_prefix(tokens: &[Token], index: usize) -> Option<(bool, usize)> {
    let byte = match tokens.get(index)? {
        t if t.is_word("BYTE") => true,
        t if t.is_word("WORD") => false,
        _ => return None,
    };
    let mut open = index + 1;
    if tokens.get(open)?.is_word("PTR") {
        open += 1;
    }
    match tokens.get(open)?.kind {
        TokenKind::LBracket => Some((byte, open)),
        _ => None,
    }
}

fn memory(
    tokens: &[Token],
    open: usize,
    byte: bool,
    state: &AssemblerState,
) -> Result<(Operand, usize), Error> {
    let close = tokens[open..]
        .iter()
        .take_while(|t| t.kind != TokenKind::Eol)
        .position(|t| t.kind == TokenKind::RBracket)
        .map(|n| open + n)
        .ok_or(Error::UnmatchedBracket)?;
    let inner = &tokens[open + 1..close];
    let expr = join(inner, "");
    let invalid = || Error::InvalidMemoryOperand(expr.clone());

    // Base/index registers become `0` terms; what is left is the displacement.
    let mut regs = vec![];
    let mut terms = vec![];
    for (i, tok) in inner.iter().enumerate() {
        match tok.kind {
            TokenKind::Reg16(r @ (Reg16::BX | Reg16::BP | Reg16::SI | Reg16::DI)) => {
                let before = i.checked_sub(1).map(|j| &inner[j]);
                let after = inner.get(i + 1);
                let added = before.map_or(true, |t| t.lexeme == "+");
                let sep = after.map_or(true, |t| t.lexeme == "+" || t.lexeme == "-");
                if !added || !sep {
                    return Err(invalid());
                }
                regs.push(r);
                terms.push(Token::new(TokenKind::Number, "0"));
            }
            TokenKind::Reg8(_) | TokenKind::Reg16(_) | TokenKind::SegReg(_) => {
                return Err(invalid())
            }
            _ => terms.push(tok.clone()),
        }
    }

    let disp = match terms.is_empty() {
        true => 0,
        false => state.eval(&expr_text(&terms))?,
    };
    if !(-0x8000..=0xFFFF).contains(&disp) {
        return Err(invalid());
    }

    let mem = match rm_field(&regs) {
        Some(rm) => MemRef::indirect(expr.clone(), rm, disp as u16 as i16 as i32),
        None if regs.is_empty() => MemRef::direct(expr.clone(), disp as u16),
        None => return Err(invalid()),
    };
    let operand = match byte {
        true => Operand::Mem8(mem),
        false => Operand::Mem16(mem),
    };
    Ok((operand, close + 1))
}

fn rm_field(regs: &[Reg16]) -> Option<u8> {
    use Reg16::*;
    match regs {
        [BX, SI] | [SI, BX] => Some(0b000),
        [BX, DI] | [DI, BX] => Some(0b001),
        [BP, SI] | [SI, BP] => Some(0b010),
        [BP, DI] | [DI, BP] => Some(0b011),
        [SI] => Some(0b100),
        [DI] => Some(0b101),
        [BP] => Some(0b110),
        [BX] => Some(0b111),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::ExprError, lexer::LineLexer};
    use i8086::reg::{Reg8, SegReg};

    fn operand(text: &str) -> Operand {
        operand_in(text, &AssemblerState::new())
    }

    fn operand_in(text: &str, state: &AssemblerState) -> Operand {
        let tokens = LineLexer::new(text).parse().unwrap();
        let (op, next) = classify(&tokens, 0, state).unwrap();
        assert_eq!(tokens[next].kind, TokenKind::Eol, "{text}");
        op
    }

    fn error(text: &str) -> Error {
        let tokens = LineLexer::new(text).parse().unwrap();
        classify(&tokens, 0, &AssemblerState::new()).unwrap_err()
    }

    macro_rules! test_operand {
        ($name:ident, $text:expr, $expect:expr) => {
            #[test]
            fn $name() {
                assert_eq!(operand($text), $expect);
            }
        };
    }

    test_operand!(hex_imm8, "0x1F", Operand::Imm8(31));
    test_operand!(dec_imm8, "200", Operand::Imm8(200));
    test_operand!(dec_imm16, "300", Operand::Imm16(300));
    test_operand!(negative, "-1", Operand::Imm8(-1));
    test_operand!(expression, "(3 + 2) * 100", Operand::Imm16(500));
    test_operand!(reg8, "dh", Operand::Reg8(Reg8::DH));
    test_operand!(reg16, "sp", Operand::Reg16(Reg16::SP));
    test_operand!(segreg, "ss", Operand::SegReg(SegReg::SS));
    test_operand!(char, "'A'", Operand::Char(b'A'));
    test_operand!(string, "\"Hi\"", Operand::String(b"Hi".to_vec()));
    test_operand!(
        bp_forced_disp8,
        "[bp]",
        Operand::Mem16(MemRef::indirect("BP", 0b110, 0))
    );
    test_operand!(
        bx_si_disp,
        "[bx+si+4]",
        Operand::Mem16(MemRef::indirect("BX+SI+4", 0b000, 4))
    );
    test_operand!(
        di_bp_negative,
        "[di+bp-2]",
        Operand::Mem16(MemRef::indirect("DI+BP-2", 0b011, -2))
    );
    test_operand!(
        direct,
        "[0x1234]",
        Operand::Mem16(MemRef::direct("0x1234", 0x1234))
    );
    test_operand!(
        byte_ptr,
        "byte ptr [si]",
        Operand::Mem8(MemRef::indirect("SI", 0b100, 0))
    );
    test_operand!(
        word_no_ptr,
        "word [bx]",
        Operand::Mem16(MemRef::indirect("BX", 0b111, 0))
    );

    #[test]
    fn names_resolve_through_state() {
        let mut state = AssemblerState::new();
        state.labels.insert("msg", 0x7C20);
        assert_eq!(operand_in("msg", &state), Operand::Imm16(0x7C20));
        assert_eq!(
            operand_in("[msg+2]", &state),
            Operand::Mem16(MemRef::direct("msg+2", 0x7C22))
        );
    }

    #[test]
    fn stops_at_comma() {
        let tokens = LineLexer::new("1 + 2, ax").parse().unwrap();
        let (op, next) = classify(&tokens, 0, &AssemblerState::new()).unwrap();
        assert_eq!(op, Operand::Imm8(3));
        assert_eq!(tokens[next].kind, TokenKind::Comma);
    }

    #[test]
    fn errors() {
        assert!(matches!(error("[bx+si"), Error::UnmatchedBracket));
        assert!(matches!(error("[ax]"), Error::InvalidMemoryOperand(_)));
        assert!(matches!(error("[bx+bp]"), Error::InvalidMemoryOperand(_)));
        assert!(matches!(error("[si-bx]"), Error::InvalidMemoryOperand(_)));
        assert!(matches!(error("undefined"), Error::UndefinedSymbol(_)));
        assert!(matches!(error(","), Error::UnknownOperand(_)));
        assert!(matches!(
            error("0x10 20"),
            Error::Expression(ExprError::Trailing(rest)) if rest == "20"
        ));
        assert!(matches!(
            error("[bx+1 2]"),
            Error::Expression(ExprError::Trailing(rest)) if rest == "2"
        ));
    }
}
