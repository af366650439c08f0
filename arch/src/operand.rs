use crate::reg::{Reg16, Reg8, SegReg};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Operand signature used as part of an opcode table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum OperandType {
    None,
    Imm8,
    Imm16,
    Reg8,
    Reg16,
    Mem8,
    Mem16,
    SegReg,
    Char,
    String,
}

/// Memory reference from a bracketed expression.
///
/// `direct` marks the `[disp16]` form, which the 8086 encodes as mod=00 rm=110.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemRef {
    pub expr: String,
    pub rm: u8,
    pub disp: i32,
    pub direct: bool,
}

impl MemRef {
    pub fn direct(expr: impl Into<String>, address: u16) -> Self {
        MemRef {
            expr: expr.into(),
            rm: 0b110,
            disp: address as i32,
            direct: true,
        }
    }

    pub fn indirect(expr: impl Into<String>, rm: u8, disp: i32) -> Self {
        MemRef {
            expr: expr.into(),
            rm: rm & 0b111,
            disp,
            direct: false,
        }
    }

    /// The mod field and the number of displacement bytes that follow ModR/M.
    pub fn mode(&self) -> (u8, usize) {
        if self.direct {
            return (0b00, 2);
        }
        match self.disp {
            // mod=00 rm=110 means [disp16], so [BP] needs an explicit disp8 of 0
            0 if self.rm == 0b110 => (0b01, 1),
            0 => (0b00, 0),
            -128..=127 => (0b01, 1),
            _ => (0b10, 2),
        }
    }

    pub fn disp_bytes(&self) -> Vec<u8> {
        let (_, len) = self.mode();
        (self.disp as u16).to_le_bytes()[..len].to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operand {
    None,
    Reg8(Reg8),
    Reg16(Reg16),
    SegReg(SegReg),
    Mem8(MemRef),
    Mem16(MemRef),
    Imm8(i64),
    Imm16(i64),
    Char(u8),
    String(Vec<u8>),
}

impl Operand {
    /// Bare numbers in `-128..=255` are 8-bit, anything else 16-bit.
    pub fn immediate(value: i64) -> Operand {
        if (-128..=255).contains(&value) {
            Operand::Imm8(value)
        } else {
            Operand::Imm16(value)
        }
    }

    pub fn kind(&self) -> OperandType {
        match self {
            Operand::None => OperandType::None,
            Operand::Reg8(_) => OperandType::Reg8,
            Operand::Reg16(_) => OperandType::Reg16,
            Operand::SegReg(_) => OperandType::SegReg,
            Operand::Mem8(_) => OperandType::Mem8,
            Operand::Mem16(_) => OperandType::Mem16,
            Operand::Imm8(_) => OperandType::Imm8,
            Operand::Imm16(_) => OperandType::Imm16,
            Operand::Char(_) => OperandType::Char,
            Operand::String(_) => OperandType::String,
        }
    }

    pub fn is_mem(&self) -> bool {
        matches!(self, Operand::Mem8(_) | Operand::Mem16(_))
    }

    /// Character and string operands carry raw payload bytes.
    pub fn is_raw(&self) -> bool {
        matches!(self, Operand::Char(_) | Operand::String(_))
    }

    pub fn reg_code(&self) -> Option<u8> {
        match self {
            Operand::Reg8(r) => Some(r.code()),
            Operand::Reg16(r) => Some(r.code()),
            Operand::SegReg(r) => Some(r.code()),
            _ => None,
        }
    }

    pub fn imm(&self) -> Option<i64> {
        match self {
            Operand::Imm8(v) | Operand::Imm16(v) => Some(*v),
            Operand::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// Narrow an untyped memory operand to a byte access.
    pub fn into_byte_access(self) -> Operand {
        match self {
            Operand::Mem16(m) => Operand::Mem8(m),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_width_by_range() {
        assert_eq!(Operand::immediate(31), Operand::Imm8(31));
        assert_eq!(Operand::immediate(200), Operand::Imm8(200));
        assert_eq!(Operand::immediate(255), Operand::Imm8(255));
        assert_eq!(Operand::immediate(-128), Operand::Imm8(-128));
        assert_eq!(Operand::immediate(-129), Operand::Imm16(-129));
        assert_eq!(Operand::immediate(256), Operand::Imm16(256));
        assert_eq!(Operand::immediate(300), Operand::Imm16(300));
    }

    #[test]
    fn bp_without_displacement_forces_disp8() {
        let bp = MemRef::indirect("BP", 0b110, 0);
        assert_eq!(bp.mode(), (0b01, 1));
        assert_eq!(bp.disp_bytes(), vec![0x00]);
    }

    #[test]
    fn mode_by_displacement() {
        assert_eq!(MemRef::indirect("BX", 0b111, 0).mode(), (0b00, 0));
        assert_eq!(MemRef::indirect("BX+4", 0b111, 4).mode(), (0b01, 1));
        assert_eq!(MemRef::indirect("SI-2", 0b100, -2).disp_bytes(), vec![0xFE]);
        assert_eq!(MemRef::indirect("DI+0x200", 0b101, 0x200).mode(), (0b10, 2));
        assert_eq!(
            MemRef::indirect("DI+0x200", 0b101, 0x200).disp_bytes(),
            vec![0x00, 0x02]
        );
    }

    #[test]
    fn direct_address_is_mod00_rm110() {
        let m = MemRef::direct("0x1234", 0x1234);
        assert_eq!(m.rm, 0b110);
        assert_eq!(m.mode(), (0b00, 2));
        assert_eq!(m.disp_bytes(), vec![0x34, 0x12]);
    }
}
