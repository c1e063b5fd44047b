// Line oriented assembler for the lookahead machine.
//
//     ; comment
//     .stack 0xF0F1 0x0F0F   ; initial stack, top first
//     XOR s0 s1 -> push      ; sN reads slot N
//     AND s1! s2! -> push    ; sN! reads and consumes slot N
//     SHL1 s1 #3 -> push     ; #n is a literal
//     OR #2 #0 -> pc
//     AND s0! s0             ; no destination drops the result
//     .word 0xF000           ; raw program word

use heapless::Vec;
use thiserror_no_std::Error;

use crate::builder::{MachineBuilderError, Op, ProgramBuilder};
use crate::{DEFAULT_STACK_SIZE, Destination, Opcode, Operand, ProgramWord, StackWord};

// `.stack` followed by a value for every slot.
const MAX_TOKENS: usize = 1 + DEFAULT_STACK_SIZE;

#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error("{0}")]
    Kind(AssemblerErrorKind),
    #[error("line {line}: {kind}")]
    WithLine { line: u32, kind: AssemblerErrorKind },
}

impl AssemblerError {
    fn with_line(self, line: u32) -> Self {
        match self {
            AssemblerError::WithLine { .. } => self,
            AssemblerError::Kind(kind) => AssemblerError::WithLine { line, kind },
        }
    }

    pub fn line_number(&self) -> Option<u32> {
        match self {
            Self::Kind(_) => None,
            Self::WithLine { line, .. } => Some(*line),
        }
    }

    pub fn error_kind(&self) -> &AssemblerErrorKind {
        match self {
            Self::Kind(kind) => kind,
            Self::WithLine { kind, .. } => kind,
        }
    }
}

#[derive(Error, Debug)]
pub enum AssemblerErrorKind {
    #[error("too many tokens")]
    TooManyTokens,
    #[error("invalid directive")]
    InvalidDirective,
    #[error("invalid instruction")]
    InvalidInstruction,
    #[error("invalid operand")]
    InvalidOperand,
    #[error("invalid destination")]
    InvalidDestination,
    #[error("invalid number")]
    InvalidNumber,
    #[error("initial stack is too large")]
    InitialStackTooLarge,
    #[error("line number overflow")]
    LineNumberOverflow,
    #[error("{0}")]
    Builder(MachineBuilderError),
}

impl From<MachineBuilderError> for AssemblerError {
    fn from(err: MachineBuilderError) -> Self {
        AssemblerError::Kind(AssemblerErrorKind::Builder(err))
    }
}

impl From<AssemblerErrorKind> for AssemblerError {
    fn from(kind: AssemblerErrorKind) -> Self {
        AssemblerError::Kind(kind)
    }
}

/// What an assembled source produced: the program is the first
/// `length` words of the builder's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly<const INIT_CAP: usize> {
    pub length: usize,
    pub initial_stack: Vec<StackWord, INIT_CAP>,
}

pub struct Assembler<'a, const INIT_CAP: usize> {
    program: ProgramBuilder<'a>,
    initial_stack: Vec<StackWord, INIT_CAP>,
    line_number: u32,
}

impl<'a, const INIT_CAP: usize> Assembler<'a, INIT_CAP> {
    pub fn new(builder: ProgramBuilder<'a>) -> Self {
        Self {
            program: builder,
            initial_stack: Vec::new(),
            line_number: 0,
        }
    }

    pub fn add_source(&mut self, source: &str) -> Result<(), AssemblerError> {
        for line in source.lines() {
            self.add_line(line)?;
        }
        Ok(())
    }

    pub fn add_line(&mut self, line: &str) -> Result<(), AssemblerError> {
        self.line_number = self
            .line_number
            .checked_add(1)
            .ok_or(AssemblerError::Kind(AssemblerErrorKind::LineNumberOverflow))?;
        let line_number = self.line_number;
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }

        let mut tokens: Vec<&str, MAX_TOKENS> = Vec::new();
        for token in line.split_whitespace() {
            tokens.push(token).map_err(|_| {
                AssemblerError::Kind(AssemblerErrorKind::TooManyTokens).with_line(line_number)
            })?;
        }

        let result = match tokens.first() {
            Some(first) if first.starts_with('.') => self.handle_directive(&tokens),
            _ => self.handle_instruction(&tokens),
        };
        result.map_err(|err| {
            log::debug!("assembler rejected line {}: {}", line_number, line);
            err.with_line(line_number)
        })
    }

    pub fn finish(self) -> Assembly<INIT_CAP> {
        let descriptor = self.program.finish_program();
        Assembly {
            length: descriptor.length,
            initial_stack: self.initial_stack,
        }
    }

    fn handle_directive(&mut self, tokens: &[&str]) -> Result<(), AssemblerError> {
        match tokens {
            [".stack", values @ ..] if !values.is_empty() => {
                for value in values {
                    let value = parse_stack_word(value)?;
                    self.initial_stack
                        .push(value)
                        .map_err(|_| AssemblerErrorKind::InitialStackTooLarge)?;
                }
                Ok(())
            }
            [".word", value] => {
                let word = parse_word(value)?;
                self.program.add_word(word)?;
                Ok(())
            }
            _ => Err(AssemblerErrorKind::InvalidDirective.into()),
        }
    }

    fn handle_instruction(&mut self, tokens: &[&str]) -> Result<(), AssemblerError> {
        // Either `OP A B` or `OP A B -> DEST`.
        let (mnemonic, a, b, destination) = match tokens {
            [mnemonic, a, b] => (mnemonic, a, b, Destination::Drop),
            [mnemonic, a, b, "->", destination] => {
                (mnemonic, a, b, parse_destination(destination)?)
            }
            _ => return Err(AssemblerErrorKind::InvalidInstruction.into()),
        };
        let opcode = parse_mnemonic(mnemonic)?;
        let a = parse_operand(a)?;
        let b = parse_operand(b)?;
        self.program.add_op(Op::new(opcode, a, b, destination))?;
        Ok(())
    }
}

/// Canonical mnemonic, the one the disassembler prints.
pub fn mnemonic(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::And => "AND",
        Opcode::Or => "OR",
        Opcode::Xor => "XOR",
        Opcode::ShiftLeftFillOnes => "SHL1",
        Opcode::ShiftLeftFillZeros => "SHL0",
    }
}

const OPCODES: [Opcode; 5] = [
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::ShiftLeftFillOnes,
    Opcode::ShiftLeftFillZeros,
];

fn parse_mnemonic(token: &str) -> Result<Opcode, AssemblerError> {
    OPCODES
        .into_iter()
        .find(|opcode| mnemonic(*opcode).eq_ignore_ascii_case(token))
        .ok_or(AssemblerError::Kind(AssemblerErrorKind::InvalidInstruction))
}

fn parse_destination(token: &str) -> Result<Destination, AssemblerError> {
    [
        ("push", Destination::Push),
        ("pc", Destination::WritePc),
        ("drop", Destination::Drop),
    ]
    .into_iter()
    .find(|(name, _)| name.eq_ignore_ascii_case(token))
    .map(|(_, destination)| destination)
    .ok_or(AssemblerError::Kind(AssemblerErrorKind::InvalidDestination))
}

fn parse_operand(token: &str) -> Result<Operand, AssemblerError> {
    if let Some(literal) = token.strip_prefix('#') {
        return Ok(Operand::immediate(parse_small(literal)?));
    }
    let Some(slot) = token.strip_prefix('s').or_else(|| token.strip_prefix('S')) else {
        return Err(AssemblerErrorKind::InvalidOperand.into());
    };
    match slot.strip_suffix('!') {
        Some(index) => Ok(Operand::consume(parse_small(index)?)),
        None => Ok(Operand::stack(parse_small(slot)?)),
    }
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number(token: &str) -> Result<u32, AssemblerError> {
    let parsed = match token.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => token.parse::<u32>(),
    };
    parsed.map_err(|_| AssemblerError::Kind(AssemblerErrorKind::InvalidNumber))
}

fn parse_small(token: &str) -> Result<u8, AssemblerError> {
    u8::try_from(parse_number(token)?)
        .map_err(|_| AssemblerError::Kind(AssemblerErrorKind::InvalidNumber))
}

fn parse_word(token: &str) -> Result<ProgramWord, AssemblerError> {
    ProgramWord::try_from(parse_number(token)?)
        .map_err(|_| AssemblerError::Kind(AssemblerErrorKind::InvalidNumber))
}

fn parse_stack_word(token: &str) -> Result<StackWord, AssemblerError> {
    parse_number(token)
}

fn strip_comment(line: &str) -> &str {
    match line.split(';').next() {
        Some(part) => part,
        None => line,
    }
}
