use crate::{expr::ExprError, token::Directive};
use color_print::cprintln;
use i8086::{error::EncodeError, op::Mnemonic};
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Token stream
    #[error("Unknown token kind: `{0}`")]
    UnknownTokenKind(String),

    #[error("Token kinds and lexemes differ in length: {0} vs {1}")]
    TokenCountMismatch(usize, usize),

    #[error("Unexpected character: `{0}`")]
    UnexpectedChar(char),

    #[error("Unterminated string: `{0}`")]
    UnterminatedString(String),

    // Operands
    #[error("Unknown operand: `{0}`")]
    UnknownOperand(String),

    #[error("Unmatched `[` in memory operand")]
    UnmatchedBracket,

    #[error("Invalid memory operand: `[{0}]`")]
    InvalidMemoryOperand(String),

    #[error("Undefined symbol: `{0}`")]
    UndefinedSymbol(String),

    #[error("`{0}` does not take {1} operand(s)")]
    OperandArity(Mnemonic, usize),

    #[error("{0}")]
    Expression(ExprError),

    // Directives
    #[error("Unknown directive: `{0}`")]
    UnknownDirective(String),

    #[error("Malformed `{0}` argument: `{1}`")]
    MalformedDirective(Directive, String),

    #[error("Alignment must be positive")]
    InvalidAlignment,

    #[error("Negative repeat count: {0}")]
    NegativeRepeat(i64),

    // Fatal
    #[error("Cannot parse line starting with `{0}`")]
    UnknownLineShape(String),

    #[error("`EQU` needs a name")]
    EquWithoutName,

    #[error("Division by zero in `{0}` expression")]
    DivisionByZero(Directive),

    #[error("BITS {0} is not supported by the encoder")]
    UnsupportedMode(u8),

    #[error("{0}")]
    Encode(#[from] EncodeError),

    // Files
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to read line")]
    FileRead(#[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),

    #[error("Failed to serialize symbol map")]
    MapSerialize(#[source] serde_yaml::Error),
}

/// Conditions worth reporting that do not stop the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    LabelRedefined { name: String, prev: u32, now: u32 },
    NonNumericEqu { name: String, symbol: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::LabelRedefined { name, prev, now } => write!(
                f,
                "Re-defined label: `{name}` (was 0x{prev:04X}, now 0x{now:04X})"
            ),
            Warning::NonNumericEqu { name, symbol } => {
                write!(f, "`{name}` has no numeric value: `{symbol}` is not defined")
            }
        }
    }
}

impl Warning {
    pub fn note(&self) -> &'static str {
        match self {
            Warning::LabelRedefined { .. } => {
                "The value has been overridden. If this is not intentional, please reorder the source file."
            }
            Warning::NonNumericEqu { .. } => {
                "The text is kept, but the name cannot be used in expressions."
            }
        }
    }
}

impl From<ExprError> for Error {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::UndefinedSymbol(name) => Error::UndefinedSymbol(name),
            other => Error::Expression(other),
        }
    }
}

impl Error {
    /// Fatal errors end the whole run; anything else only skips the line.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::UnknownTokenKind(_)
                | Error::TokenCountMismatch(..)
                | Error::UnexpectedChar(_)
                | Error::UnterminatedString(_)
                | Error::UnknownOperand(_)
                | Error::UnmatchedBracket
                | Error::InvalidMemoryOperand(_)
                | Error::UndefinedSymbol(_)
                | Error::OperandArity(..)
                | Error::Expression(_)
                | Error::UnknownDirective(_)
                | Error::MalformedDirective(..)
                | Error::InvalidAlignment
                | Error::NegativeRepeat(_)
        )
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, files: &IndexMap<String, Vec<String>>, file: &str, line_idx: usize) {
        match self.is_fatal() {
            true => cprintln!("<red,bold>error</>: {}", self),
            false => cprintln!("<yellow,bold>error</>: {}", self),
        }
        print_location(files, file, line_idx);
    }
}

pub fn print_warn(msg: &str, files: &IndexMap<String, Vec<String>>, file: &str, line_idx: usize) {
    cprintln!("<yellow,bold>warning</>: {}", msg);
    print_location(files, file, line_idx);
}

pub fn print_note(msg: &str) {
    cprintln!("      <blue>=</> <bold>note</>: {}", msg);
}

fn print_location(files: &IndexMap<String, Vec<String>>, file: &str, line_idx: usize) {
    // line_idx is 0-based, display as 1-based
    let line_num = line_idx + 1;
    cprintln!("     <blue>--></> <underline>{}:{}</>", file, line_num);
    cprintln!("      <blue>|</>");

    let line_content = files
        .get(file)
        .and_then(|lines| lines.get(line_idx))
        .map(|s| s.as_str())
        .unwrap_or("");

    cprintln!(" <blue>{:>4} |</> {}", line_num, line_content);
    cprintln!("      <blue>|</>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8086::operand::OperandType;

    #[test]
    fn severity() {
        assert!(!Error::UnknownOperand("#".to_string()).is_fatal());
        assert!(!Error::InvalidAlignment.is_fatal());
        assert!(!Error::Expression(ExprError::MissingParen).is_fatal());
        assert!(Error::EquWithoutName.is_fatal());
        assert!(Error::UnknownLineShape("5".to_string()).is_fatal());
        assert!(Error::DivisionByZero(Directive::TIMES).is_fatal());
        assert!(Error::from(EncodeError::OpcodeNotFound(
            Mnemonic::MOV,
            OperandType::Reg8,
            OperandType::Imm16
        ))
        .is_fatal());
    }

    #[test]
    fn undefined_symbol_from_expression() {
        let err = Error::from(ExprError::UndefinedSymbol("foo".to_string()));
        assert!(matches!(err, Error::UndefinedSymbol(name) if name == "foo"));
    }
}
