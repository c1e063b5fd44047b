use super::*;
use crate::instruction::OPERAND_VALUE_MAX;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineBuilderError {
    #[error("the program buffer is too small")]
    BufferTooSmall,
    #[error("operand value {0} does not fit in a selector")]
    OperandOutOfRange(u8),
}

/// Result of building a program: the program is the first
/// `length` words of the buffer that was handed to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub length: usize,
}

/// One instruction before it is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub opcode: Opcode,
    pub a: Operand,
    pub b: Operand,
    pub destination: Destination,
}

impl Op {
    pub fn new(opcode: Opcode, a: Operand, b: Operand, destination: Destination) -> Self {
        Self {
            opcode,
            a,
            b,
            destination,
        }
    }

    pub fn push(opcode: Opcode, a: Operand, b: Operand) -> Self {
        Self::new(opcode, a, b, Destination::Push)
    }

    pub fn discard(opcode: Opcode, a: Operand, b: Operand) -> Self {
        Self::new(opcode, a, b, Destination::Drop)
    }

    pub fn write_pc(opcode: Opcode, a: Operand, b: Operand) -> Self {
        Self::new(opcode, a, b, Destination::WritePc)
    }

    /// Packs the op, refusing operands that `Instruction::new`
    /// would silently truncate.
    pub fn encode(&self) -> Result<Instruction, MachineBuilderError> {
        for operand in [self.a, self.b] {
            let value = operand.raw_value();
            if value > OPERAND_VALUE_MAX {
                return Err(MachineBuilderError::OperandOutOfRange(value));
            }
        }
        Ok(Instruction::new(self.opcode, self.a, self.b, self.destination))
    }
}

/// Program is a flat run of instruction words starting at 0,
/// which is where the instruction pointer starts.
pub struct ProgramBuilder<'a> {
    buffer: &'a mut [ProgramWord],
    free: usize,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(buffer: &'a mut [ProgramWord]) -> Self {
        Self { buffer, free: 0 }
    }

    pub fn program_free(&self) -> usize {
        self.free
    }

    pub fn add_op(&mut self, op: Op) -> Result<(), MachineBuilderError> {
        let instruction = op.encode()?;
        self.add_word(instruction.word())
    }

    /// Appends a word as is. Nothing checks that it decodes.
    pub fn add_word(&mut self, word: ProgramWord) -> Result<(), MachineBuilderError> {
        let Some(slot) = self.buffer.get_mut(self.free) else {
            return Err(MachineBuilderError::BufferTooSmall);
        };
        *slot = word;
        let Some(free) = self.free.checked_add(1) else {
            return Err(MachineBuilderError::BufferTooSmall);
        };
        self.free = free;
        Ok(())
    }

    pub fn finish_program(self) -> ProgramDescriptor {
        ProgramDescriptor { length: self.free }
    }
}
