use crate::{
    error::EncodeError,
    op::Mnemonic,
    operand::{Operand, OperandType},
};
use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeKey {
    pub mnemonic: Mnemonic,
    pub op1: OperandType,
    pub op2: OperandType,
}

impl OpcodeKey {
    pub fn new(mnemonic: Mnemonic, op1: OperandType, op2: OperandType) -> Self {
        OpcodeKey { mnemonic, op1, op2 }
    }
}

/// Encoding recipe for one table entry.
///
/// `modrm_reg_extension` is the `/digit` of group opcodes. `reg_in_opcode`
/// adds the register code to the opcode byte (`B8+r`, `40+r`, ...).
/// `sign_extended` marks imm8 forms that the CPU widens to 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub primary_opcode: u8,
    pub requires_modrm: bool,
    pub has_immediate: bool,
    pub immediate_size: u8,
    pub modrm_reg_extension: Option<u8>,
    pub reg_in_opcode: bool,
    pub sign_extended: bool,
}

impl OpcodeInfo {
    pub const fn new(primary_opcode: u8) -> Self {
        OpcodeInfo {
            primary_opcode,
            requires_modrm: false,
            has_immediate: false,
            immediate_size: 0,
            modrm_reg_extension: None,
            reg_in_opcode: false,
            sign_extended: false,
        }
    }

    /// `/r`
    pub const fn modrm(mut self) -> Self {
        self.requires_modrm = true;
        self
    }

    /// `/digit`
    pub const fn group(mut self, ext: u8) -> Self {
        self.requires_modrm = true;
        self.modrm_reg_extension = Some(ext & 0b111);
        self
    }

    /// `ib` / `iw`
    pub const fn imm(mut self, size: u8) -> Self {
        self.has_immediate = true;
        self.immediate_size = size;
        self
    }

    /// `+r`
    pub const fn plus_reg(mut self) -> Self {
        self.reg_in_opcode = true;
        self
    }

    pub const fn sext(mut self) -> Self {
        self.sign_extended = true;
        self
    }
}

pub(crate) static TABLE: Lazy<HashMap<OpcodeKey, OpcodeInfo>> = Lazy::new(|| {
    use Mnemonic::*;
    use OperandType as T;

    let mut map = HashMap::new();

    macro_rules! op {
        ($m:ident ( $a:ident, $b:ident ) => $info:expr) => {
            map.insert(OpcodeKey::new($m, T::$a, T::$b), $info);
        };
        ($m:ident ( $a:ident ) => $info:expr) => {
            map.insert(OpcodeKey::new($m, T::$a, T::None), $info);
        };
        ($m:ident => $info:expr) => {
            map.insert(OpcodeKey::new($m, T::None, T::None), $info);
        };
    }

    // MOV
    op!(MOV(Reg8, Reg8) => OpcodeInfo::new(0x88).modrm());
    op!(MOV(Mem8, Reg8) => OpcodeInfo::new(0x88).modrm());
    op!(MOV(Reg16, Reg16) => OpcodeInfo::new(0x89).modrm());
    op!(MOV(Mem16, Reg16) => OpcodeInfo::new(0x89).modrm());
    op!(MOV(Reg8, Mem8) => OpcodeInfo::new(0x8A).modrm());
    op!(MOV(Reg16, Mem16) => OpcodeInfo::new(0x8B).modrm());
    op!(MOV(Reg16, SegReg) => OpcodeInfo::new(0x8C).modrm());
    op!(MOV(Mem16, SegReg) => OpcodeInfo::new(0x8C).modrm());
    op!(MOV(SegReg, Reg16) => OpcodeInfo::new(0x8E).modrm());
    op!(MOV(SegReg, Mem16) => OpcodeInfo::new(0x8E).modrm());
    op!(MOV(Reg8, Imm8) => OpcodeInfo::new(0xB0).plus_reg().imm(1));
    op!(MOV(Reg16, Imm16) => OpcodeInfo::new(0xB8).plus_reg().imm(2));
    op!(MOV(Mem8, Imm8) => OpcodeInfo::new(0xC6).group(0).imm(1));
    op!(MOV(Mem16, Imm16) => OpcodeInfo::new(0xC7).group(0).imm(2));

    // ALU group: the /digit doubles as the row of the 00..3F block
    for (m, ext) in [
        (ADD, 0u8),
        (OR, 1),
        (ADC, 2),
        (SBB, 3),
        (AND, 4),
        (SUB, 5),
        (XOR, 6),
        (CMP, 7),
    ] {
        let base = ext << 3;
        map.insert(OpcodeKey::new(m, T::Reg8, T::Reg8), OpcodeInfo::new(base).modrm());
        map.insert(OpcodeKey::new(m, T::Mem8, T::Reg8), OpcodeInfo::new(base).modrm());
        map.insert(OpcodeKey::new(m, T::Reg16, T::Reg16), OpcodeInfo::new(base + 1).modrm());
        map.insert(OpcodeKey::new(m, T::Mem16, T::Reg16), OpcodeInfo::new(base + 1).modrm());
        map.insert(OpcodeKey::new(m, T::Reg8, T::Mem8), OpcodeInfo::new(base + 2).modrm());
        map.insert(OpcodeKey::new(m, T::Reg16, T::Mem16), OpcodeInfo::new(base + 3).modrm());
        map.insert(OpcodeKey::new(m, T::Reg8, T::Imm8), OpcodeInfo::new(0x80).group(ext).imm(1));
        map.insert(OpcodeKey::new(m, T::Mem8, T::Imm8), OpcodeInfo::new(0x80).group(ext).imm(1));
        map.insert(OpcodeKey::new(m, T::Reg16, T::Imm16), OpcodeInfo::new(0x81).group(ext).imm(2));
        map.insert(OpcodeKey::new(m, T::Mem16, T::Imm16), OpcodeInfo::new(0x81).group(ext).imm(2));
        map.insert(
            OpcodeKey::new(m, T::Reg16, T::Imm8),
            OpcodeInfo::new(0x83).group(ext).imm(1).sext(),
        );
        map.insert(
            OpcodeKey::new(m, T::Mem16, T::Imm8),
            OpcodeInfo::new(0x83).group(ext).imm(1).sext(),
        );
    }

    // TEST / XCHG / LEA
    op!(TEST(Reg8, Reg8) => OpcodeInfo::new(0x84).modrm());
    op!(TEST(Mem8, Reg8) => OpcodeInfo::new(0x84).modrm());
    op!(TEST(Reg16, Reg16) => OpcodeInfo::new(0x85).modrm());
    op!(TEST(Mem16, Reg16) => OpcodeInfo::new(0x85).modrm());
    op!(TEST(Reg8, Imm8) => OpcodeInfo::new(0xF6).group(0).imm(1));
    op!(TEST(Mem8, Imm8) => OpcodeInfo::new(0xF6).group(0).imm(1));
    op!(TEST(Reg16, Imm16) => OpcodeInfo::new(0xF7).group(0).imm(2));
    op!(TEST(Mem16, Imm16) => OpcodeInfo::new(0xF7).group(0).imm(2));
    op!(XCHG(Reg8, Reg8) => OpcodeInfo::new(0x86).modrm());
    op!(XCHG(Mem8, Reg8) => OpcodeInfo::new(0x86).modrm());
    op!(XCHG(Reg8, Mem8) => OpcodeInfo::new(0x86).modrm());
    op!(XCHG(Reg16, Reg16) => OpcodeInfo::new(0x87).modrm());
    op!(XCHG(Mem16, Reg16) => OpcodeInfo::new(0x87).modrm());
    op!(XCHG(Reg16, Mem16) => OpcodeInfo::new(0x87).modrm());
    op!(LEA(Reg16, Mem16) => OpcodeInfo::new(0x8D).modrm());

    // INC / DEC
    op!(INC(Reg16) => OpcodeInfo::new(0x40).plus_reg());
    op!(DEC(Reg16) => OpcodeInfo::new(0x48).plus_reg());
    op!(INC(Reg8) => OpcodeInfo::new(0xFE).group(0));
    op!(INC(Mem8) => OpcodeInfo::new(0xFE).group(0));
    op!(DEC(Reg8) => OpcodeInfo::new(0xFE).group(1));
    op!(DEC(Mem8) => OpcodeInfo::new(0xFE).group(1));
    op!(INC(Mem16) => OpcodeInfo::new(0xFF).group(0));
    op!(DEC(Mem16) => OpcodeInfo::new(0xFF).group(1));

    // Stack
    op!(PUSH(Reg16) => OpcodeInfo::new(0x50).plus_reg());
    op!(POP(Reg16) => OpcodeInfo::new(0x58).plus_reg());
    op!(PUSH(Mem16) => OpcodeInfo::new(0xFF).group(6));
    op!(POP(Mem16) => OpcodeInfo::new(0x8F).group(0));

    // Unary group 3
    for (m, ext) in [(NOT, 2u8), (NEG, 3), (MUL, 4), (IMUL, 5), (DIV, 6), (IDIV, 7)] {
        map.insert(OpcodeKey::new(m, T::Reg8, T::None), OpcodeInfo::new(0xF6).group(ext));
        map.insert(OpcodeKey::new(m, T::Mem8, T::None), OpcodeInfo::new(0xF6).group(ext));
        map.insert(OpcodeKey::new(m, T::Reg16, T::None), OpcodeInfo::new(0xF7).group(ext));
        map.insert(OpcodeKey::new(m, T::Mem16, T::None), OpcodeInfo::new(0xF7).group(ext));
    }

    // Shift / rotate by immediate (group 2, 80186 encoding)
    for (m, ext) in [
        (ROL, 0u8),
        (ROR, 1),
        (RCL, 2),
        (RCR, 3),
        (SHL, 4),
        (SAL, 4),
        (SHR, 5),
        (SAR, 7),
    ] {
        map.insert(OpcodeKey::new(m, T::Reg8, T::Imm8), OpcodeInfo::new(0xC0).group(ext).imm(1));
        map.insert(OpcodeKey::new(m, T::Mem8, T::Imm8), OpcodeInfo::new(0xC0).group(ext).imm(1));
        map.insert(OpcodeKey::new(m, T::Reg16, T::Imm8), OpcodeInfo::new(0xC1).group(ext).imm(1));
        map.insert(OpcodeKey::new(m, T::Mem16, T::Imm8), OpcodeInfo::new(0xC1).group(ext).imm(1));
    }

    // Control transfer
    op!(JMP(Reg16) => OpcodeInfo::new(0xFF).group(4));
    op!(JMP(Mem16) => OpcodeInfo::new(0xFF).group(4));
    op!(CALL(Reg16) => OpcodeInfo::new(0xFF).group(2));
    op!(CALL(Mem16) => OpcodeInfo::new(0xFF).group(2));
    op!(RET => OpcodeInfo::new(0xC3));
    op!(RET(Imm16) => OpcodeInfo::new(0xC2).imm(2));
    op!(INT(Imm8) => OpcodeInfo::new(0xCD).imm(1));

    // Port I/O
    op!(IN(Reg8, Imm8) => OpcodeInfo::new(0xE4).imm(1));
    op!(IN(Reg16, Imm8) => OpcodeInfo::new(0xE5).imm(1));
    op!(OUT(Imm8, Reg8) => OpcodeInfo::new(0xE6).imm(1));
    op!(OUT(Imm8, Reg16) => OpcodeInfo::new(0xE7).imm(1));

    // No operand
    op!(NOP => OpcodeInfo::new(0x90));
    op!(HLT => OpcodeInfo::new(0xF4));
    op!(CLC => OpcodeInfo::new(0xF8));
    op!(STC => OpcodeInfo::new(0xF9));
    op!(CMC => OpcodeInfo::new(0xF5));
    op!(CLD => OpcodeInfo::new(0xFC));
    op!(STD => OpcodeInfo::new(0xFD));
    op!(CLI => OpcodeInfo::new(0xFA));
    op!(STI => OpcodeInfo::new(0xFB));
    op!(PUSHF => OpcodeInfo::new(0x9C));
    op!(POPF => OpcodeInfo::new(0x9D));
    op!(CBW => OpcodeInfo::new(0x98));
    op!(CWD => OpcodeInfo::new(0x99));
    op!(LAHF => OpcodeInfo::new(0x9F));
    op!(SAHF => OpcodeInfo::new(0x9E));
    op!(XLAT => OpcodeInfo::new(0xD7));
    op!(IRET => OpcodeInfo::new(0xCF));
    op!(INT3 => OpcodeInfo::new(0xCC));
    op!(LEAVE => OpcodeInfo::new(0xC9));
    op!(WAIT => OpcodeInfo::new(0x9B));
    op!(LOCK => OpcodeInfo::new(0xF0));
    op!(REP => OpcodeInfo::new(0xF3));
    op!(REPE => OpcodeInfo::new(0xF3));
    op!(REPNE => OpcodeInfo::new(0xF2));
    op!(SALC => OpcodeInfo::new(0xD6));
    op!(MOVSB => OpcodeInfo::new(0xA4));
    op!(MOVSW => OpcodeInfo::new(0xA5));
    op!(CMPSB => OpcodeInfo::new(0xA6));
    op!(CMPSW => OpcodeInfo::new(0xA7));
    op!(STOSB => OpcodeInfo::new(0xAA));
    op!(STOSW => OpcodeInfo::new(0xAB));
    op!(LODSB => OpcodeInfo::new(0xAC));
    op!(LODSW => OpcodeInfo::new(0xAD));
    op!(SCASB => OpcodeInfo::new(0xAE));
    op!(SCASW => OpcodeInfo::new(0xAF));

    map
});

pub fn lookup(mnemonic: Mnemonic, op1: OperandType, op2: OperandType) -> Option<&'static OpcodeInfo> {
    TABLE.get(&OpcodeKey::new(mnemonic, op1, op2))
}

/// Table signature of an operand. A character literal is an 8-bit immediate.
fn signature(op: &Operand) -> OperandType {
    match op.kind() {
        OperandType::Char => OperandType::Imm8,
        other => other,
    }
}

/// Find the entry for concrete operands.
///
/// Tries the exact signature first. An 8-bit immediate falls back to the
/// 16-bit entry when there is no 8-bit form, or when the 8-bit form is
/// sign-extended and the value does not survive the extension.
pub fn resolve(
    mnemonic: Mnemonic,
    op1: &Operand,
    op2: &Operand,
) -> Result<&'static OpcodeInfo, EncodeError> {
    let (t1, t2) = (signature(op1), signature(op2));

    let fits_i8 = |op: &Operand| op.imm().is_some_and(|v| (-128..=127).contains(&v));
    if let Some(info) = lookup(mnemonic, t1, t2) {
        let imm_op = if t1 == OperandType::Imm8 { op1 } else { op2 };
        if !info.sign_extended || fits_i8(imm_op) {
            return Ok(info);
        }
    }

    let widen = |t: OperandType| match t {
        OperandType::Imm8 => OperandType::Imm16,
        other => other,
    };
    let (w1, w2) = (widen(t1), widen(t2));
    if (w1, w2) != (t1, t2) {
        if let Some(info) = lookup(mnemonic, w1, w2) {
            return Ok(info);
        }
    }

    Err(EncodeError::OpcodeNotFound(mnemonic, op1.kind(), op2.kind()))
}
