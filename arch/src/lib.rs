pub mod counter;
pub mod encode;
pub mod error;
pub mod op;
pub mod operand;
pub mod reg;
pub mod table;

pub use counter::LocationCounter;
pub use encode::{encode, encode_raw, Emit, EmitKind};
pub use error::EncodeError;
pub use op::Mnemonic;
pub use operand::{MemRef, Operand, OperandType};
pub use table::{lookup, resolve, OpcodeInfo, OpcodeKey};
