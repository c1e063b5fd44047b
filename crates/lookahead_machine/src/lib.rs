#![no_std]

#![cfg_attr(
    not(test),
    deny(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing,
        clippy::string_slice,
        clippy::arithmetic_side_effects,
        clippy::panicking_unwrap,
        clippy::out_of_bounds_indexing,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
    )
)]
#![cfg_attr(not(test), warn(clippy::missing_panics_doc))]

use core::mem::transmute;
use heapless::Vec;
use thiserror_no_std::Error;
use variant_count::VariantCount;

pub mod assembler;
pub mod builder;
pub mod instruction;

pub use instruction::{Destination, Instruction, Operand};

/// This module implements the machine that models a pipelined
/// carry-lookahead adder out of bitwise micro operations.
///
/// Every instruction is one packed `ProgramWord`. A step reads two
/// operands, each either a small literal or a slot of the stack,
/// computes one ALU result and routes it to nowhere, the
/// instruction pointer or the top of the stack. Stack operands can
/// be consumed, which removes their slot and shifts the slots below
/// it up by one.
///
/// The machine has no memory besides its fixed size stack. A state
/// is never changed in place: `step` takes the previous state and
/// returns the next one, so a caller can keep every state of a run.
pub type ProgramWord = u16;
pub type StackWord = u32;

/// Number of stack slots a 3 bit selector can reach.
pub const ADDRESSABLE_SLOTS: usize = 8;
pub const DEFAULT_STACK_SIZE: usize = 16;

#[repr(u16)] // Must match ProgramWord
#[derive(VariantCount, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    And,
    Or,
    Xor,
    ShiftLeftFillOnes,
    ShiftLeftFillZeros,
}

impl From<Opcode> for ProgramWord {
    fn from(op: Opcode) -> ProgramWord {
        op as ProgramWord
    }
}

impl TryFrom<ProgramWord> for Opcode {
    type Error = MachineError;
    fn try_from(value: ProgramWord) -> Result<Self, Self::Error> {
        // SAFTY: we require Opcode to be in range of u16
        // with `repr` macro.
        if value >= Opcode::VARIANT_COUNT as u16 {
            return Err(MachineError::InvalidOp(value));
        }

        // SAFTY: We just check that the value is in range.
        let op = unsafe { transmute::<ProgramWord, Self>(value) };
        Ok(op)
    }
}

impl Opcode {
    pub fn apply(self, a: StackWord, b: StackWord) -> StackWord {
        match self {
            Opcode::And => a & b,
            Opcode::Or => a | b,
            Opcode::Xor => a ^ b,
            // (a + 1) << b, minus one, leaves ones in the vacated bits.
            Opcode::ShiftLeftFillOnes => shift_left(a.wrapping_add(1), b).wrapping_sub(1),
            Opcode::ShiftLeftFillZeros => shift_left(a, b),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineError {
    #[error("the instruction {0:#06x} has an invalid opcode")]
    InvalidOp(ProgramWord),
    #[error("attempted opperation would overflow the stack")]
    StackOverflow,
}

/// One snapshot of the machine.
///
/// `stack` always holds exactly `STACK_SIZE` values, index 0 is
/// the top and vacant slots are zero. The operand values and the
/// result are what the step that produced this state saw; nothing
/// reads them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineState<const STACK_SIZE: usize = DEFAULT_STACK_SIZE> {
    instruction_pointer: StackWord,
    stack: Vec<StackWord, STACK_SIZE>,
    operand_value_a: StackWord,
    operand_value_b: StackWord,
    result: StackWord,
}

impl<const STACK_SIZE: usize> MachineState<STACK_SIZE> {
    pub fn new() -> Self {
        const { assert!(STACK_SIZE >= ADDRESSABLE_SLOTS) }
        Self {
            instruction_pointer: 0,
            stack: zeroed_stack(),
            operand_value_a: 0,
            operand_value_b: 0,
            result: 0,
        }
    }

    /// Initial state with `values` preloaded, top of stack first.
    pub fn with_stack(values: &[StackWord]) -> Result<Self, MachineError> {
        let mut state = Self::new();
        if values.len() > STACK_SIZE {
            return Err(MachineError::StackOverflow);
        }
        for (slot, value) in state.stack.iter_mut().zip(values) {
            *slot = *value;
        }
        Ok(state)
    }

    pub const fn capacity(&self) -> usize {
        STACK_SIZE
    }

    pub fn instruction_pointer(&self) -> StackWord {
        self.instruction_pointer
    }

    pub fn stack(&self) -> &[StackWord] {
        self.stack.as_slice()
    }

    pub fn operand_value_a(&self) -> StackWord {
        self.operand_value_a
    }

    pub fn operand_value_b(&self) -> StackWord {
        self.operand_value_b
    }

    pub fn result(&self) -> StackWord {
        self.result
    }

    pub fn step(&self, instruction: Instruction) -> Result<Self, MachineError> {
        step(self, instruction)
    }

    fn read(&self, operand: Operand) -> StackWord {
        match operand {
            Operand::Immediate(value) => StackWord::from(value),
            // Slots past the end are vacant.
            Operand::Stack { index, .. } => self
                .stack
                .get(usize::from(index))
                .copied()
                .unwrap_or(0),
        }
    }
}

impl<const STACK_SIZE: usize> Default for MachineState<STACK_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the state that follows `state` once `instruction` ran.
///
/// Only slots 0..8 can be consumed, but compaction keeps every slot
/// past index 7 too, shifted along with the rest.
pub fn step<const STACK_SIZE: usize>(
    state: &MachineState<STACK_SIZE>,
    instruction: Instruction,
) -> Result<MachineState<STACK_SIZE>, MachineError> {
    let opcode = instruction.opcode()?;
    let a = instruction.operand_a();
    let b = instruction.operand_b();

    let operand_value_a = state.read(a);
    let operand_value_b = state.read(b);
    let result = opcode.apply(operand_value_a, operand_value_b);

    let destination = instruction.destination();
    let instruction_pointer = match destination {
        Destination::WritePc => result,
        _ => state.instruction_pointer.wrapping_add(1),
    };
    let pushed = match destination {
        Destination::Push => Some(result),
        _ => None,
    };
    let stack = rebuild_stack(
        state.stack(),
        pushed,
        [a.consumed_index(), b.consumed_index()],
    )?;

    log::trace!(
        "ip {:x}: {:#06x} {:?} {:x}, {:x} -> {:x} ({:?})",
        state.instruction_pointer,
        instruction.word(),
        opcode,
        operand_value_a,
        operand_value_b,
        result,
        destination,
    );

    Ok(MachineState {
        instruction_pointer,
        stack,
        operand_value_a,
        operand_value_b,
        result,
    })
}

/// Pushed value first, then every old slot that was not consumed,
/// in order, then zero padding up to capacity.
fn rebuild_stack<const STACK_SIZE: usize>(
    old: &[StackWord],
    pushed: Option<StackWord>,
    consumed: [Option<usize>; 2],
) -> Result<Vec<StackWord, STACK_SIZE>, MachineError> {
    let survivors = old
        .iter()
        .enumerate()
        .filter(|(index, _)| !consumed.contains(&Some(*index)))
        .map(|(_, value)| *value);

    let mut stack = Vec::new();
    // Zeros are held back until a live value follows them, so the
    // vacant tail never counts against capacity.
    let mut vacant: usize = 0;
    for value in pushed.into_iter().chain(survivors) {
        if value == 0 {
            vacant = vacant.saturating_add(1);
            continue;
        }
        for _ in 0..vacant {
            push(&mut stack, 0)?;
        }
        vacant = 0;
        push(&mut stack, value)?;
    }
    while !stack.is_full() {
        push(&mut stack, 0)?;
    }
    Ok(stack)
}

fn zeroed_stack<const STACK_SIZE: usize>() -> Vec<StackWord, STACK_SIZE> {
    let mut stack = Vec::new();
    while stack.push(0).is_ok() {}
    stack
}

fn push<const STACK_SIZE: usize>(
    stack: &mut Vec<StackWord, STACK_SIZE>,
    value: StackWord,
) -> Result<(), MachineError> {
    if stack.push(value).is_err() {
        return Err(MachineError::StackOverflow);
    }
    Ok(())
}

/// Logical shift that saturates to zero once every bit is gone.
fn shift_left(value: StackWord, amount: StackWord) -> StackWord {
    value.checked_shl(amount).unwrap_or(0)
}
