use crate::{
    expr::{evaluate_with, ExprError},
    symbols::{LabelTable, SymbolTable},
};
use i8086::counter::LocationCounter;
use indexmap::IndexSet;
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitsMode {
    #[default]
    Bits16,
    Bits32,
    Bits64,
}

impl BitsMode {
    pub fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            16 => Some(BitsMode::Bits16),
            32 => Some(BitsMode::Bits32),
            64 => Some(BitsMode::Bits64),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            BitsMode::Bits16 => 16,
            BitsMode::Bits32 => 32,
            BitsMode::Bits64 => 64,
        }
    }
}

/// Everything one assembly unit mutates while lines are dispatched.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AssemblerState {
    pub counter: LocationCounter,
    pub bits: BitsMode,
    pub labels: LabelTable,
    pub symbols: SymbolTable,
    pub section: Option<String>,
    pub externs: IndexSet<String>,
    pub globals: IndexSet<String>,
}

impl AssemblerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric value of a name: an `EQU` constant first, then a label.
    pub fn lookup(&self, name: &str) -> Option<i64> {
        self.symbols
            .get(name)
            .and_then(|sym| sym.numeric())
            .or_else(|| self.labels.get(name).map(i64::from))
    }

    /// Evaluate with `$`, `$$` and every name known so far.
    pub fn eval(&self, expr: &str) -> Result<i64, ExprError> {
        evaluate_with(
            expr,
            self.counter.current() as i64,
            self.counter.base() as i64,
            |name| self.lookup(name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Symbol;

    #[test]
    fn lookup_prefers_constants() {
        let mut state = AssemblerState::new();
        state.labels.insert("start", 0x100);
        state.labels.insert("SIZE", 0x200);
        state.symbols.insert(
            "SIZE",
            Symbol::Equ {
                text: "8".to_string(),
                value: Some(8),
            },
        );
        assert_eq!(state.lookup("start"), Some(0x100));
        assert_eq!(state.lookup("SIZE"), Some(8));
        assert_eq!(state.lookup("none"), None);
    }

    #[test]
    fn eval_uses_counter() {
        let mut state = AssemblerState::new();
        state.counter.org(0x7C00);
        state.counter.advance(0x10);
        assert_eq!(state.eval("$ - $$"), Ok(0x10));
        assert_eq!(state.eval("$$"), Ok(0x7C00));
    }

    #[test]
    fn bits() {
        assert_eq!(BitsMode::from_bits(32), Some(BitsMode::Bits32));
        assert_eq!(BitsMode::from_bits(8), None);
        assert_eq!(BitsMode::default().bits(), 16);
    }
}
