use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum Mnemonic {
    // Data transfer
    MOV,
    XCHG,
    LEA,
    PUSH,
    POP,
    IN,
    OUT,

    // Arithmetic / logic
    ADD,
    ADC,
    SUB,
    SBB,
    CMP,
    AND,
    OR,
    XOR,
    TEST,
    INC,
    DEC,
    NOT,
    NEG,
    MUL,
    IMUL,
    DIV,
    IDIV,

    // Shift / rotate
    SHL,
    SAL,
    SHR,
    SAR,
    ROL,
    ROR,
    RCL,
    RCR,

    // Control transfer
    JMP,
    CALL,
    RET,
    INT,
    IRET,
    INT3,
    LOOP,
    JE,
    JNE,
    JZ,
    JNZ,
    JG,
    JGE,
    JL,
    JLE,
    JA,
    JAE,
    JB,
    JBE,
    JS,
    JNS,

    // No operand
    NOP,
    HLT,
    CLC,
    STC,
    CMC,
    CLD,
    STD,
    CLI,
    STI,
    PUSHF,
    POPF,
    CBW,
    CWD,
    LAHF,
    SAHF,
    XLAT,
    LEAVE,
    WAIT,
    LOCK,
    REP,
    REPE,
    REPNE,
    SALC,
    MOVSB,
    MOVSW,
    CMPSB,
    CMPSW,
    SCASB,
    SCASW,
    LODSB,
    LODSW,
    STOSB,
    STOSW,
}

impl Mnemonic {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().parse::<Self>() {
            Ok(m) => Ok(m),
            Err(_) => Err(format!("Undefined mnemonic: {s}")),
        }
    }

    /// Operand counts accepted by the mnemonic.
    pub fn arity(&self) -> &'static [usize] {
        use Mnemonic::*;
        match self {
            NOP | HLT | CLC | STC | CMC | CLD | STD | CLI | STI | PUSHF | POPF | CBW | CWD
            | LAHF | SAHF | XLAT | IRET | INT3 | LEAVE | WAIT | LOCK | REP | REPE | REPNE
            | SALC | MOVSB | MOVSW | CMPSB | CMPSW | SCASB | SCASW | LODSB | LODSW | STOSB
            | STOSW => &[0],
            RET => &[0, 1],
            PUSH | POP | INC | DEC | NOT | NEG | MUL | IMUL | DIV | IDIV | INT | JMP | CALL
            | LOOP | JE | JNE | JZ | JNZ | JG | JGE | JL | JLE | JA | JAE | JB | JBE | JS
            | JNS => &[1],
            MOV | XCHG | LEA | IN | OUT | ADD | ADC | SUB | SBB | CMP | AND | OR | XOR | TEST
            | SHL | SAL | SHR | SAR | ROL | ROR | RCL | RCR => &[2],
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        self.arity().contains(&count)
    }
}
