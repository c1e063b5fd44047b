use lookahead_machine::assembler::Assembler;
use lookahead_machine::builder::ProgramBuilder;
use lookahead_machine::{Instruction, MachineState, ProgramWord, StackWord};

use crate::TraceError;

/// Longest program the assembler will accept.
pub const MAX_PROGRAM_WORDS: usize = 256;
/// Most `.stack` values one source may declare.
pub const MAX_INITIAL_STACK: usize = 16;

const CARRY_LOOKAHEAD_SOURCE: &str = include_str!("../programs/carry_lookahead.asm");

/// An assembled program together with the stack it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    /// Top of stack first.
    pub initial_stack: Vec<StackWord>,
}

impl Program {
    pub fn assemble(source: &str) -> Result<Self, TraceError> {
        let mut buffer: [ProgramWord; MAX_PROGRAM_WORDS] = [0; MAX_PROGRAM_WORDS];
        let mut assembler: Assembler<MAX_INITIAL_STACK> =
            Assembler::new(ProgramBuilder::new(&mut buffer));
        assembler.add_source(source)?;
        let assembly = assembler.finish();

        let instructions = buffer
            .iter()
            .take(assembly.length)
            .map(|word| Instruction::from(*word))
            .collect::<Vec<_>>();
        log::debug!(
            "assembled {} instructions, {} initial stack values",
            instructions.len(),
            assembly.initial_stack.len()
        );
        Ok(Self {
            instructions,
            initial_stack: assembly.initial_stack.iter().copied().collect(),
        })
    }

    /// The Kogge-Stone adder. Leaves `a + b` on top of the stack.
    pub fn carry_lookahead_adder() -> Result<Self, TraceError> {
        Self::assemble(CARRY_LOOKAHEAD_SOURCE)
    }

    /// Replaces the first two initial stack values, which is where
    /// the adder reads its inputs.
    pub fn with_operands(mut self, a: Option<StackWord>, b: Option<StackWord>) -> Self {
        for (slot, value) in [a, b].into_iter().enumerate() {
            let Some(value) = value else {
                continue;
            };
            while self.initial_stack.len() <= slot {
                self.initial_stack.push(0);
            }
            self.initial_stack[slot] = value;
        }
        self
    }

    pub fn initial_state<const STACK_SIZE: usize>(
        &self,
    ) -> Result<MachineState<STACK_SIZE>, TraceError> {
        MachineState::with_stack(&self.initial_stack).map_err(TraceError::InitialStack)
    }
}
