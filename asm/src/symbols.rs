use indexmap::IndexMap;
use serde::Serialize;

/// Label name to the address it was defined at.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LabelTable(IndexMap<String, u32>);

impl LabelTable {
    pub fn new() -> Self {
        LabelTable(IndexMap::new())
    }

    /// Bind `name`, returning the address it had before if redefined.
    pub fn insert(&mut self, name: impl Into<String>, address: u32) -> Option<u32> {
        self.0.insert(name.into(), address)
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u32)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Symbol {
    /// `name EQU value`; `value` is set when the text is numeric.
    Equ { text: String, value: Option<i64> },
    /// `name DB ...`
    Data { address: u32, bytes: Vec<u8> },
}

impl Symbol {
    /// Literal text for constants, space separated hex bytes for data.
    pub fn value(&self) -> String {
        match self {
            Symbol::Equ { text, .. } => text.clone(),
            Symbol::Data { bytes, .. } => bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn numeric(&self) -> Option<i64> {
        match self {
            Symbol::Equ { value, .. } => *value,
            Symbol::Data { .. } => None,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SymbolTable(IndexMap<String, Symbol>);

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable(IndexMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) -> Option<Symbol> {
        self.0.insert(name.into(), symbol)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
