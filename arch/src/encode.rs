use crate::{
    counter::LocationCounter,
    error::EncodeError,
    op::Mnemonic,
    operand::Operand,
    table::OpcodeInfo,
};
use color_print::cformat;
use serde::Serialize;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum EmitKind {
    Opcode,
    ModRm,
    Displacement,
    Immediate,
    Payload,
    Data,
    Padding,
}

/// One byte placed at `address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Emit {
    pub address: u32,
    pub byte: u8,
    pub kind: EmitKind,
}

impl Emit {
    pub fn cformat(&self) -> String {
        match self.kind {
            EmitKind::Opcode => cformat!("<r,s>{:02X}</>", self.byte),
            EmitKind::ModRm => cformat!("<y>{:02X}</>", self.byte),
            EmitKind::Displacement => cformat!("<c>{:02X}</>", self.byte),
            EmitKind::Immediate => cformat!("<g>{:02X}</>", self.byte),
            EmitKind::Payload | EmitKind::Data => cformat!("<b>{:02X}</>", self.byte),
            EmitKind::Padding => cformat!("<m>{:02X}</>", self.byte),
        }
    }
}

pub fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode << 6) | ((reg & 0b111) << 3) | (rm & 0b111)
}

/// Encode one instruction, appending its bytes at the location counter.
///
/// Every check runs before the first byte is emitted, so a failed encode
/// leaves the counter where it was.
pub fn encode(
    mnemonic: Mnemonic,
    operands: &[Operand; 2],
    info: &OpcodeInfo,
    lc: &mut LocationCounter,
) -> Result<Vec<Emit>, EncodeError> {
    let [op1, op2] = operands;
    let unhandled = || EncodeError::UnhandledEncoding(mnemonic, op1.kind(), op2.kind());

    if op1.is_mem() && op2.is_mem() {
        return Err(EncodeError::UnencodableOperands(mnemonic));
    }

    let opcode = if info.reg_in_opcode {
        let code = op1.reg_code().ok_or_else(unhandled)?;
        info.primary_opcode.wrapping_add(code)
    } else {
        info.primary_opcode
    };

    let modrm = match info.requires_modrm {
        true => Some(modrm_fields(info, op1, op2).ok_or_else(unhandled)?),
        false => None,
    };

    let immediate = match info.has_immediate {
        true => {
            let value = op1
                .imm()
                .or_else(|| op2.imm())
                .ok_or(EncodeError::MissingImmediate(mnemonic))?;
            value.to_le_bytes()[..info.immediate_size as usize].to_vec()
        }
        false => vec![],
    };

    let mut out = vec![lc.emit(opcode, EmitKind::Opcode)];
    if let Some((byte, disp)) = modrm {
        out.push(lc.emit(byte, EmitKind::ModRm));
        for b in disp {
            out.push(lc.emit(b, EmitKind::Displacement));
        }
    }
    for b in immediate {
        out.push(lc.emit(b, EmitKind::Immediate));
    }
    Ok(out)
}

/// Emit character and string operands as they are, with no opcode.
pub fn encode_raw(operands: &[Operand; 2], lc: &mut LocationCounter) -> Vec<Emit> {
    let mut out = vec![];
    for op in operands {
        match op {
            Operand::Char(c) => out.push(lc.emit(*c, EmitKind::Payload)),
            Operand::String(s) => out.extend(s.iter().map(|b| lc.emit(*b, EmitKind::Payload))),
            _ => {}
        }
    }
    out
}

/// ModR/M byte and the displacement bytes that follow it.
fn modrm_fields(info: &OpcodeInfo, op1: &Operand, op2: &Operand) -> Option<(u8, Vec<u8>)> {
    let (rm_op, reg) = match info.modrm_reg_extension {
        Some(ext) => (op1, ext),
        None => match (op1, op2) {
            (Operand::SegReg(s), other) | (other, Operand::SegReg(s)) => (other, s.code()),
            (mem, reg) if mem.is_mem() => (mem, reg.reg_code()?),
            (reg, mem) if mem.is_mem() => (mem, reg.reg_code()?),
            (Operand::Reg8(_), Operand::Reg8(r)) => (op1, r.code()),
            (Operand::Reg16(_), Operand::Reg16(r)) => (op1, r.code()),
            _ => return None,
        },
    };

    match rm_op {
        Operand::Reg8(r) => Some((modrm(0b11, reg, r.code()), vec![])),
        Operand::Reg16(r) => Some((modrm(0b11, reg, r.code()), vec![])),
        Operand::Mem8(m) | Operand::Mem16(m) => {
            let (mode, _) = m.mode();
            Some((modrm(mode, reg, m.rm), m.disp_bytes()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        operand::{MemRef, OperandType},
        reg::{Reg16, Reg8, SegReg},
        table::{resolve, TABLE},
    };

    fn assemble(mnemonic: Mnemonic, op1: Operand, op2: Operand) -> Vec<u8> {
        let mut lc = LocationCounter::new();
        let info = resolve(mnemonic, &op1, &op2).unwrap();
        let emits = encode(mnemonic, &[op1, op2], info, &mut lc).unwrap();
        assert_eq!(lc.current() as usize, emits.len());
        emits.iter().map(|e| e.byte).collect()
    }

    macro_rules! test_encode {
        ($name:ident, $m:ident, $op1:expr, $op2:expr, $expect:expr) => {
            #[test]
            fn $name() {
                assert_eq!(assemble(Mnemonic::$m, $op1, $op2), $expect);
            }
        };
    }

    use Operand as O;

    test_encode!(mov_ax_5, MOV, O::Reg16(Reg16::AX), O::Imm8(5), vec![0xB8, 0x05, 0x00]);
    test_encode!(add_ax_10, ADD, O::Reg16(Reg16::AX), O::Imm8(10), vec![0x83, 0xC0, 0x0A]);
    test_encode!(add_ax_1000, ADD, O::Reg16(Reg16::AX), O::Imm16(1000), vec![0x81, 0xC0, 0xE8, 0x03]);
    test_encode!(sub_bx_neg1, SUB, O::Reg16(Reg16::BX), O::Imm8(-1), vec![0x83, 0xEB, 0xFF]);
    test_encode!(mov_bx_cx, MOV, O::Reg16(Reg16::BX), O::Reg16(Reg16::CX), vec![0x89, 0xCB]);
    test_encode!(mov_al_ah, MOV, O::Reg8(Reg8::AL), O::Reg8(Reg8::AH), vec![0x88, 0xE0]);
    test_encode!(mov_cl_char, MOV, O::Reg8(Reg8::CL), O::Char(b'A'), vec![0xB1, 0x41]);
    test_encode!(push_bp, PUSH, O::Reg16(Reg16::BP), O::None, vec![0x55]);
    test_encode!(inc_di, INC, O::Reg16(Reg16::DI), O::None, vec![0x47]);
    test_encode!(int_21, INT, O::Imm8(0x21), O::None, vec![0xCD, 0x21]);
    test_encode!(nop, NOP, O::None, O::None, vec![0x90]);
    test_encode!(ret_imm, RET, O::Imm8(4), O::None, vec![0xC2, 0x04, 0x00]);
    test_encode!(out_dx, OUT, O::Imm8(0x60), O::Reg8(Reg8::AL), vec![0xE6, 0x60]);
    test_encode!(mov_ds_ax, MOV, O::SegReg(SegReg::DS), O::Reg16(Reg16::AX), vec![0x8E, 0xD8]);
    test_encode!(mov_ax_es, MOV, O::Reg16(Reg16::AX), O::SegReg(SegReg::ES), vec![0x8C, 0xC0]);
    test_encode!(not_word_bx, NOT, O::Mem16(MemRef::indirect("BX", 0b111, 0)), O::None, vec![0xF7, 0x17]);
    test_encode!(shl_ax_4, SHL, O::Reg16(Reg16::AX), O::Imm8(4), vec![0xC1, 0xE0, 0x04]);
    test_encode!(
        mov_ax_direct,
        MOV,
        O::Reg16(Reg16::AX),
        O::Mem16(MemRef::direct("0x1234", 0x1234)),
        vec![0x8B, 0x06, 0x34, 0x12]
    );
    test_encode!(
        mov_bp_disp8_zero,
        MOV,
        O::Mem16(MemRef::indirect("BP", 0b110, 0)),
        O::Reg16(Reg16::AX),
        vec![0x89, 0x46, 0x00]
    );
    test_encode!(
        mov_si_disp16_imm,
        MOV,
        O::Mem16(MemRef::indirect("SI+0x200", 0b100, 0x200)),
        O::Imm16(0x1234),
        vec![0xC7, 0x84, 0x00, 0x02, 0x34, 0x12]
    );
    test_encode!(
        add_byte_bx_si,
        ADD,
        O::Mem8(MemRef::indirect("BX+SI+4", 0b000, 4)),
        O::Imm8(7),
        vec![0x80, 0x40, 0x04, 0x07]
    );
    test_encode!(
        lea_bx_di,
        LEA,
        O::Reg16(Reg16::BX),
        O::Mem16(MemRef::indirect("DI-2", 0b101, -2)),
        vec![0x8D, 0x5D, 0xFE]
    );

    #[test]
    fn byte_count_matches_recipe() {
        let mut lc = LocationCounter::new();
        lc.org(0x100);
        let ops = [O::Mem16(MemRef::indirect("BX+4", 0b111, 4)), O::Imm8(3)];
        let info = resolve(Mnemonic::CMP, &ops[0], &ops[1]).unwrap();
        let emits = encode(Mnemonic::CMP, &ops, info, &mut lc).unwrap();
        let expected = 1 + usize::from(info.requires_modrm) + 1 + info.immediate_size as usize;
        assert_eq!(emits.len(), expected);
        assert_eq!(lc.current(), 0x100 + expected as u32);
        assert_eq!(emits[0].address, 0x100);
        assert_eq!(
            emits.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![
                EmitKind::Opcode,
                EmitKind::ModRm,
                EmitKind::Displacement,
                EmitKind::Immediate
            ]
        );
    }

    /// A representative operand for each table signature. Memory carries a
    /// one-byte displacement.
    fn sample(t: OperandType) -> Operand {
        match t {
            OperandType::None => O::None,
            OperandType::Reg8 => O::Reg8(Reg8::CL),
            OperandType::Reg16 => O::Reg16(Reg16::SI),
            OperandType::SegReg => O::SegReg(SegReg::DS),
            OperandType::Mem8 => O::Mem8(MemRef::indirect("SI+4", 0b100, 4)),
            OperandType::Mem16 => O::Mem16(MemRef::indirect("SI+4", 0b100, 4)),
            OperandType::Imm8 | OperandType::Char => O::Imm8(1),
            OperandType::Imm16 | OperandType::String => O::Imm16(0x1234),
        }
    }

    #[test]
    fn every_entry_emits_its_recipe_length() {
        for (key, info) in TABLE.iter() {
            let ops = [sample(key.op1), sample(key.op2)];
            let disp = match info.requires_modrm {
                true => ops.iter().filter(|op| op.is_mem()).count(),
                false => 0,
            };
            let expected = 1 + usize::from(info.requires_modrm) + disp + info.immediate_size as usize;

            let mut lc = LocationCounter::new();
            let emits = encode(key.mnemonic, &ops, info, &mut lc)
                .unwrap_or_else(|err| panic!("{key:?}: {err}"));
            assert_eq!(emits.len(), expected, "{key:?}");
            assert_eq!(lc.current() as usize, expected, "{key:?}");
        }
    }

    #[test]
    fn imm16_truncated_to_entry_size() {
        let mut lc = LocationCounter::new();
        let info = OpcodeInfo::new(0xCD).imm(1);
        let emits = encode(Mnemonic::INT, &[O::Imm16(0x1234), O::None], &info, &mut lc).unwrap();
        assert_eq!(emits.iter().map(|e| e.byte).collect::<Vec<_>>(), vec![0xCD, 0x34]);
    }

    #[test]
    fn memory_to_memory_is_rejected() {
        let mut lc = LocationCounter::new();
        let m = MemRef::indirect("BX", 0b111, 0);
        let info = OpcodeInfo::new(0x89).modrm();
        let err = encode(Mnemonic::MOV, &[O::Mem16(m.clone()), O::Mem16(m)], &info, &mut lc);
        assert_eq!(err, Err(EncodeError::UnencodableOperands(Mnemonic::MOV)));
        assert_eq!(lc.current(), 0);
    }

    #[test]
    fn missing_immediate() {
        let mut lc = LocationCounter::new();
        let info = OpcodeInfo::new(0xCD).imm(1);
        let err = encode(Mnemonic::INT, &[O::None, O::None], &info, &mut lc);
        assert_eq!(err, Err(EncodeError::MissingImmediate(Mnemonic::INT)));
        assert_eq!(lc.current(), 0);
    }

    #[test]
    fn mixed_width_registers_are_unhandled() {
        let mut lc = LocationCounter::new();
        let info = OpcodeInfo::new(0x89).modrm();
        let err = encode(Mnemonic::MOV, &[O::Reg16(Reg16::AX), O::Reg8(Reg8::AL)], &info, &mut lc);
        assert!(matches!(err, Err(EncodeError::UnhandledEncoding(..))));
    }

    #[test]
    fn raw_payload_skips_opcode() {
        let mut lc = LocationCounter::new();
        let emits = encode_raw(&[O::String(b"AB".to_vec()), O::Char(0)], &mut lc);
        assert_eq!(emits.iter().map(|e| e.byte).collect::<Vec<_>>(), vec![0x41, 0x42, 0x00]);
        assert!(emits.iter().all(|e| e.kind == EmitKind::Payload));
        assert_eq!(lc.current(), 3);
    }
}
