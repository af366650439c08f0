pub mod assembler;
pub mod classify;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod state;
pub mod symbols;
pub mod token;
pub mod util;

pub use assembler::{Assembler, DiagKind, Diagnostic, Output};
pub use error::{Error, Warning};
pub use state::{AssemblerState, BitsMode};
