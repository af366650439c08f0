use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// Discriminants are the 3-bit register fields used in ModR/M and `+r` opcodes.

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
pub enum Reg8 {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
pub enum Reg16 {
    AX,
    CX,
    DX,
    BX,
    SP,
    BP,
    SI,
    DI,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
pub enum SegReg {
    ES,
    CS,
    SS,
    DS,
}

macro_rules! impl_reg {
    ($($Type:ident),*) => {
        $(
            impl $Type {
                pub fn parse(s: &str) -> Result<Self, String> {
                    match s.to_ascii_uppercase().parse::<Self>() {
                        Ok(r) => Ok(r),
                        Err(_) => Err(format!("Unknown {} name: {s}", stringify!($Type))),
                    }
                }

                pub fn code(self) -> u8 {
                    self.into()
                }
            }
        )*
    };
}

impl_reg!(Reg8, Reg16, SegReg);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_8086_encoding() {
        assert_eq!(Reg16::AX.code(), 0);
        assert_eq!(Reg16::CX.code(), 1);
        assert_eq!(Reg16::BX.code(), 3);
        assert_eq!(Reg16::BP.code(), 5);
        assert_eq!(Reg16::DI.code(), 7);
        assert_eq!(Reg8::AL.code(), 0);
        assert_eq!(Reg8::AH.code(), 4);
        assert_eq!(Reg8::BH.code(), 7);
        assert_eq!(SegReg::ES.code(), 0);
        assert_eq!(SegReg::DS.code(), 3);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Reg16::parse("si"), Ok(Reg16::SI));
        assert_eq!(Reg8::parse("Dh"), Ok(Reg8::DH));
        assert_eq!(SegReg::parse("cs"), Ok(SegReg::CS));
        assert!(Reg16::parse("eax").is_err());
    }

    #[test]
    fn from_code() {
        assert_eq!(Reg16::try_from(6u8).ok(), Some(Reg16::SI));
        assert!(Reg8::try_from(8u8).is_err());
    }
}
