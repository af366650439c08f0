use crate::{op::Mnemonic, operand::OperandType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("No opcode for `{0}` with operands ({1}, {2})")]
    OpcodeNotFound(Mnemonic, OperandType, OperandType),

    #[error("Cannot encode memory-to-memory operands for `{0}`")]
    UnencodableOperands(Mnemonic),

    #[error("Unhandled ModR/M combination for `{0}`: ({1}, {2})")]
    UnhandledEncoding(Mnemonic, OperandType, OperandType),

    #[error("`{0}` requires an immediate operand")]
    MissingImmediate(Mnemonic),
}
