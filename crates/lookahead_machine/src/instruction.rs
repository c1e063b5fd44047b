use crate::{MachineError, Opcode, ProgramWord};

/// Instruction word layout, most significant bit first:
/// `
///     [15:12] opcode
///     [11:10] destination
///     [9:5]   operand B selector
///     [4:0]   operand A selector
/// `
/// Each selector is `[immediate][consume][value:3]`. When the
/// immediate flag is set the value is a literal and the consume
/// flag is ignored, otherwise the value is a stack index.
pub const OPCODE_SHIFT: u32 = 12;
pub const OPCODE_MASK: ProgramWord = 0xF;
pub const DESTINATION_SHIFT: u32 = 10;
pub const DESTINATION_MASK: ProgramWord = 0x3;
pub const OPERAND_B_SHIFT: u32 = 5;
pub const OPERAND_A_SHIFT: u32 = 0;
pub const OPERAND_MASK: ProgramWord = 0x1F;

const IMMEDIATE_FLAG: u8 = 0x10;
const CONSUME_FLAG: u8 = 0x08;
const VALUE_MASK: u8 = 0x07;

/// Largest literal or stack index a selector can hold.
pub const OPERAND_VALUE_MAX: u8 = VALUE_MASK;

/// Where an operand value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Immediate(u8),
    Stack { index: u8, consume: bool },
}

impl Operand {
    pub fn immediate(value: u8) -> Self {
        Operand::Immediate(value)
    }

    pub fn stack(index: u8) -> Self {
        Operand::Stack {
            index,
            consume: false,
        }
    }

    pub fn consume(index: u8) -> Self {
        Operand::Stack {
            index,
            consume: true,
        }
    }

    fn decode(bits: u8) -> Self {
        let value = bits & VALUE_MASK;
        if bits & IMMEDIATE_FLAG != 0 {
            Operand::Immediate(value)
        } else {
            Operand::Stack {
                index: value,
                consume: bits & CONSUME_FLAG != 0,
            }
        }
    }

    fn encode(self) -> ProgramWord {
        let bits = match self {
            Operand::Immediate(value) => IMMEDIATE_FLAG | (value & VALUE_MASK),
            Operand::Stack { index, consume } => {
                let consume = if consume { CONSUME_FLAG } else { 0 };
                consume | (index & VALUE_MASK)
            }
        };
        ProgramWord::from(bits)
    }

    /// The literal or index before masking, used to reject
    /// operands that would not survive encoding.
    pub fn raw_value(&self) -> u8 {
        match self {
            Operand::Immediate(value) => *value,
            Operand::Stack { index, .. } => *index,
        }
    }

    /// Stack index this operand removes after the step, if any.
    pub fn consumed_index(&self) -> Option<usize> {
        match self {
            Operand::Stack {
                index,
                consume: true,
            } => Some(usize::from(*index)),
            _ => None,
        }
    }
}

/// Where the result of an instruction goes.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Drop = 0b00,
    Push = 0b01,
    WritePc = 0b10,
}

impl Destination {
    fn decode(bits: ProgramWord) -> Self {
        match bits & DESTINATION_MASK {
            0b01 => Destination::Push,
            0b10 => Destination::WritePc,
            // 0b11 is reserved and behaves like 0b00.
            _ => Destination::Drop,
        }
    }
}

impl From<Destination> for ProgramWord {
    fn from(destination: Destination) -> ProgramWord {
        destination as ProgramWord
    }
}

/// A packed instruction word. Fields are only ever extracted
/// from the word, never stored next to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Instruction(ProgramWord);

impl Instruction {
    /// Packs the fields in to a word. Operand values wider than
    /// three bits are truncated; `builder::Op` rejects them instead.
    pub fn new(opcode: Opcode, a: Operand, b: Operand, destination: Destination) -> Self {
        let word = (ProgramWord::from(opcode) << OPCODE_SHIFT)
            | (ProgramWord::from(destination) << DESTINATION_SHIFT)
            | (b.encode() << OPERAND_B_SHIFT)
            | (a.encode() << OPERAND_A_SHIFT);
        Self(word)
    }

    pub fn word(&self) -> ProgramWord {
        self.0
    }

    pub fn opcode_bits(&self) -> u8 {
        ((self.0 >> OPCODE_SHIFT) & OPCODE_MASK) as u8
    }

    pub fn opcode(&self) -> Result<Opcode, MachineError> {
        Opcode::try_from(ProgramWord::from(self.opcode_bits()))
            .map_err(|_| MachineError::InvalidOp(self.0))
    }

    pub fn operand_a(&self) -> Operand {
        Operand::decode(((self.0 >> OPERAND_A_SHIFT) & OPERAND_MASK) as u8)
    }

    pub fn operand_b(&self) -> Operand {
        Operand::decode(((self.0 >> OPERAND_B_SHIFT) & OPERAND_MASK) as u8)
    }

    pub fn destination(&self) -> Destination {
        Destination::decode(self.0 >> DESTINATION_SHIFT)
    }
}

impl From<ProgramWord> for Instruction {
    fn from(word: ProgramWord) -> Self {
        Self(word)
    }
}

impl From<Instruction> for ProgramWord {
    fn from(instruction: Instruction) -> ProgramWord {
        instruction.0
    }
}
