use crate::{
    classify::{classify, size_prefix},
    error::{Error, Warning},
    expr::ExprError,
    lexer::LineLexer,
    parser::{split_args, Stmt},
    state::{AssemblerState, BitsMode},
    symbols::Symbol,
    token::{expr_text, join, Directive, Token, TokenKind},
};
use i8086::{
    counter::align_address,
    encode::{encode, encode_raw, Emit, EmitKind},
    op::Mnemonic,
    operand::Operand,
    table::resolve,
};

/// Filler emitted by `ALIGN` (`NOP`).
const PAD_BYTE: u8 = 0x90;

/// Upper bound for `ALIGN` boundaries and `TIMES` counts (the 1 MiB real-mode space).
const MAX_SPAN: u32 = 0x10_0000;

#[derive(Debug)]
pub enum DiagKind {
    Error(Error),
    Warning(Warning),
}

#[derive(Debug)]
pub struct Diagnostic {
    pub source: String,
    pub line: usize,
    pub kind: DiagKind,
}

/// Bytes produced by one source line.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub line: usize,
    pub address: u32,
    pub emits: Vec<Emit>,
}

#[derive(Debug, Default)]
pub struct Output {
    pub records: Vec<LineRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub aborted: bool,
}

impl Output {
    pub fn emits(&self) -> impl Iterator<Item = &Emit> {
        self.records.iter().flat_map(|r| r.emits.iter())
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.emits().map(|e| e.byte).collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.diagnostics.iter().filter_map(|d| match &d.kind {
            DiagKind::Error(err) => Some(err),
            DiagKind::Warning(_) => None,
        })
    }
}

#[derive(Debug, Default)]
pub struct Assembler {
    pub state: AssemblerState,
    warnings: Vec<Warning>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble `lines` in order, collecting diagnostics.
    ///
    /// Recoverable errors skip the offending line; the first fatal error
    /// stops the run and sets `aborted`.
    pub fn assemble<I, S>(&mut self, source: &str, lines: I) -> Output
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut output = Output::default();
        for (line, text) in lines.into_iter().enumerate() {
            let address = self.state.counter.current();
            let result = self.process_line(text.as_ref());

            for warning in self.warnings.drain(..) {
                output.diagnostics.push(Diagnostic {
                    source: source.to_string(),
                    line,
                    kind: DiagKind::Warning(warning),
                });
            }

            match result {
                Ok(emits) => output.records.push(LineRecord {
                    line,
                    address,
                    emits,
                }),
                Err(err) => {
                    let fatal = err.is_fatal();
                    output.diagnostics.push(Diagnostic {
                        source: source.to_string(),
                        line,
                        kind: DiagKind::Error(err),
                    });
                    if fatal {
                        output.aborted = true;
                        break;
                    }
                }
            }
        }
        output
    }

    /// Lex and dispatch one line of source text.
    pub fn process_line(&mut self, line: &str) -> Result<Vec<Emit>, Error> {
        let tokens = LineLexer::new(line).parse()?;
        self.process(&tokens)
    }

    /// Dispatch one line given as parallel kind and lexeme sequences.
    pub fn process_pairs<K, L>(&mut self, kinds: &[K], lexemes: &[L]) -> Result<Vec<Emit>, Error>
    where
        K: AsRef<str>,
        L: AsRef<str>,
    {
        let tokens = Token::from_pairs(kinds, lexemes)?;
        self.process(&tokens)
    }

    /// Dispatch one tokenized line.
    pub fn process(&mut self, tokens: &[Token]) -> Result<Vec<Emit>, Error> {
        match Stmt::parse(tokens)? {
            Stmt::Blank => Ok(vec![]),
            Stmt::Label(name, rest) => {
                self.define_label(&name);
                self.process(rest)
            }
            Stmt::Directive(directive, args) => self.directive(directive, args),
            Stmt::Instruction(mnemonic, args) => self.instruction(mnemonic, args),
            Stmt::Data(name, directive, args) => self.named_data(&name, directive, args),
            Stmt::Equ(name, args) => self.equ(&name, args),
        }
    }

    /// Drain warnings raised by `process` since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    fn define_label(&mut self, name: &str) {
        let address = self.state.counter.current();
        if let Some(prev) = self.state.labels.insert(name, address) {
            self.warnings.push(Warning::LabelRedefined {
                name: name.to_string(),
                prev,
                now: address,
            });
        }
    }

    // ------------------------------------------------------------------------
    // Instructions

    fn instruction(&mut self, mnemonic: Mnemonic, args: &[Token]) -> Result<Vec<Emit>, Error> {
        let count = split_args(args).len();
        if !mnemonic.accepts(count) {
            return Err(Error::OperandArity(mnemonic, count));
        }

        let mut operands = [Operand::None, Operand::None];
        let mut sized = [false, false];
        let mut index = 0;
        for slot in 0..count {
            sized[slot] = size_prefix(args, index).is_some();
            let (operand, next) = classify(args, index, &self.state)?;
            operands[slot] = operand;
            index = match args.get(next).map(|t| t.kind) {
                Some(TokenKind::Comma) if slot + 1 < count => next + 1,
                Some(TokenKind::Eol) | None if slot + 1 == count => next,
                _ => {
                    let rest = args.get(next).map(|t| t.lexeme.clone()).unwrap_or_default();
                    return Err(Error::UnknownOperand(rest));
                }
            };
        }

        // An unsized memory operand takes the width of an 8-bit register partner.
        let [op1, op2] = operands;
        let narrow1 = op1.is_mem() && !sized[0] && matches!(op2, Operand::Reg8(_));
        let narrow2 = op2.is_mem() && !sized[1] && matches!(op1, Operand::Reg8(_));
        let operands = [
            if narrow1 { op1.into_byte_access() } else { op1 },
            if narrow2 { op2.into_byte_access() } else { op2 },
        ];

        if self.state.bits != BitsMode::Bits16 {
            return Err(Error::UnsupportedMode(self.state.bits.bits()));
        }

        let counter = &mut self.state.counter;
        if operands.iter().all(|op| op.is_raw()) {
            return Ok(encode_raw(&operands, counter));
        }
        let info = resolve(mnemonic, &operands[0], &operands[1])?;
        Ok(encode(mnemonic, &operands, info, counter)?)
    }

    // ------------------------------------------------------------------------
    // Directives

    fn directive(&mut self, directive: Directive, args: &[Token]) -> Result<Vec<Emit>, Error> {
        let malformed = || Error::MalformedDirective(directive, join(args, " "));

        match directive {
            Directive::BITS => {
                let bits = self.state.eval(&expr_text(args)).map_err(|_| malformed())?;
                self.state.bits = BitsMode::from_bits(bits).ok_or_else(malformed)?;
                Ok(vec![])
            }
            Directive::ORG => {
                let addr = self.fatal_eval(directive, args)?;
                let addr = u32::try_from(addr).map_err(|_| malformed())?;
                self.state.counter.org(addr);
                Ok(vec![])
            }
            Directive::DB | Directive::DW | Directive::DD | Directive::DQ | Directive::DT => {
                let bytes = self.data_bytes(directive, args)?;
                Ok(self.emit_all(&bytes, EmitKind::Data))
            }
            Directive::EQU => Err(Error::EquWithoutName),
            Directive::SECTION => {
                let name = join(args, "");
                if name.is_empty() {
                    return Err(malformed());
                }
                self.state.section = Some(name);
                Ok(vec![])
            }
            Directive::EXTERN | Directive::GLOBAL => {
                let names = split_args(args)
                    .into_iter()
                    .map(|arg| match arg {
                        [t] if t.kind == TokenKind::Generic => Ok(t.lexeme.clone()),
                        _ => Err(malformed()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if names.is_empty() {
                    return Err(malformed());
                }
                let set = match directive {
                    Directive::EXTERN => &mut self.state.externs,
                    _ => &mut self.state.globals,
                };
                set.extend(names);
                Ok(vec![])
            }
            Directive::ALIGN => {
                let n = self.state.eval(&expr_text(args))?;
                if n == 0 {
                    return Err(Error::InvalidAlignment);
                }
                let n = u32::try_from(n)
                    .ok()
                    .filter(|n| *n <= MAX_SPAN)
                    .ok_or_else(malformed)?;
                let current = self.state.counter.current();
                let target = align_address(current, n).ok_or_else(malformed)?;
                let padding = vec![PAD_BYTE; (target - current) as usize];
                Ok(self.emit_all(&padding, EmitKind::Padding))
            }
            Directive::TIMES => self.times(args),
        }
    }

    /// Evaluate an argument where division by zero ends the run.
    fn fatal_eval(&self, directive: Directive, args: &[Token]) -> Result<i64, Error> {
        match self.state.eval(&expr_text(args)) {
            Ok(v) => Ok(v),
            Err(ExprError::DivisionByZero) => Err(Error::DivisionByZero(directive)),
            Err(err) => Err(err.into()),
        }
    }

    /// `TIMES count <data directive | instruction>`
    fn times(&mut self, args: &[Token]) -> Result<Vec<Emit>, Error> {
        let malformed = || Error::MalformedDirective(Directive::TIMES, join(args, " "));

        let split = args
            .iter()
            .position(|t| matches!(t.kind, TokenKind::Directive(_) | TokenKind::Instr(_)))
            .ok_or_else(malformed)?;
        let (count, body) = args.split_at(split);
        let count = self.fatal_eval(Directive::TIMES, count)?;
        if count < 0 {
            return Err(Error::NegativeRepeat(count));
        }
        if count > i64::from(MAX_SPAN) {
            return Err(malformed());
        }

        let stmt = Stmt::parse(body)?;
        match &stmt {
            Stmt::Directive(d, _) if d.unit_size().is_some() => {}
            Stmt::Instruction(..) => {}
            _ => return Err(malformed()),
        }

        // A failed iteration discards the whole line, counter included.
        let snapshot = self.state.counter;
        let mut out = vec![];
        for _ in 0..count {
            match self.process(body) {
                Ok(emits) => out.extend(emits),
                Err(err) => {
                    self.state.counter = snapshot;
                    return Err(err);
                }
            }
        }
        Ok(out)
    }

    fn named_data(
        &mut self,
        name: &str,
        directive: Directive,
        args: &[Token],
    ) -> Result<Vec<Emit>, Error> {
        let bytes = self.data_bytes(directive, args)?;
        let address = self.state.counter.current();
        self.define_label(name);
        self.state.symbols.insert(
            name,
            Symbol::Data {
                address,
                bytes: bytes.clone(),
            },
        );
        Ok(self.emit_all(&bytes, EmitKind::Data))
    }

    fn equ(&mut self, name: &str, args: &[Token]) -> Result<Vec<Emit>, Error> {
        let text = join(args, " ");
        if text.is_empty() {
            return Err(Error::MalformedDirective(Directive::EQU, name.to_string()));
        }
        let body: Vec<&Token> = args.iter().filter(|t| t.kind != TokenKind::Eol).collect();
        let value = match body.as_slice() {
            [t] if matches!(t.kind, TokenKind::Str | TokenKind::Char) => None,
            _ => match self.state.eval(&expr_text(args)) {
                Ok(v) => Some(v),
                Err(ExprError::UndefinedSymbol(symbol)) => {
                    self.warnings.push(Warning::NonNumericEqu {
                        name: name.to_string(),
                        symbol,
                    });
                    None
                }
                Err(err) => return Err(err.into()),
            },
        };
        self.state
            .symbols
            .insert(name, Symbol::Equ { text, value });
        Ok(vec![])
    }

    /// Little-endian bytes of a data directive's values.
    ///
    /// Strings contribute one unit per character; every other value is an
    /// expression truncated or sign-extended to the unit size.
    fn data_bytes(&self, directive: Directive, args: &[Token]) -> Result<Vec<u8>, Error> {
        let malformed = || Error::MalformedDirective(directive, join(args, " "));
        let unit = directive.unit_size().ok_or_else(malformed)?;

        let values = split_args(args);
        if values.is_empty() {
            return Err(malformed());
        }

        let mut bytes = vec![];
        for value in values {
            match value {
                [t] if matches!(t.kind, TokenKind::Str | TokenKind::Char) => {
                    for c in t.lexeme.bytes() {
                        bytes.extend(unit_bytes(c as i64, unit));
                    }
                }
                [] => return Err(malformed()),
                expr => {
                    let v = self.state.eval(&expr_text(expr))?;
                    bytes.extend(unit_bytes(v, unit));
                }
            }
        }
        Ok(bytes)
    }

    fn emit_all(&mut self, bytes: &[u8], kind: EmitKind) -> Vec<Emit> {
        bytes
            .iter()
            .map(|b| self.state.counter.emit(*b, kind))
            .collect()
    }
}

fn unit_bytes(value: i64, unit: usize) -> Vec<u8> {
    let fill = if value < 0 { 0xFF } else { 0x00 };
    let mut bytes = value.to_le_bytes().to_vec();
    bytes.resize(unit.max(8), fill);
    bytes.truncate(unit);
    bytes
}
