use lookahead_machine::{Instruction, MachineError, MachineState};

use crate::TraceError;

/// Every state of a run in order, starting with the initial state,
/// together with the instruction that produced each later state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace<const STACK_SIZE: usize> {
    initial: MachineState<STACK_SIZE>,
    later: Vec<MachineState<STACK_SIZE>>,
    executed: Vec<Instruction>,
}

impl<const STACK_SIZE: usize> Trace<STACK_SIZE> {
    pub fn new(initial: MachineState<STACK_SIZE>) -> Self {
        Self {
            initial,
            later: Vec::new(),
            executed: Vec::new(),
        }
    }

    fn record(&mut self, instruction: Instruction, state: MachineState<STACK_SIZE>) {
        self.executed.push(instruction);
        self.later.push(state);
    }

    pub fn states(&self) -> impl Iterator<Item = &MachineState<STACK_SIZE>> {
        std::iter::once(&self.initial).chain(&self.later)
    }

    pub fn executed(&self) -> &[Instruction] {
        &self.executed
    }

    pub fn initial(&self) -> &MachineState<STACK_SIZE> {
        &self.initial
    }

    pub fn last(&self) -> &MachineState<STACK_SIZE> {
        self.later.last().unwrap_or(&self.initial)
    }

    /// Number of steps taken, one less than the number of states.
    pub fn step_count(&self) -> usize {
        self.executed.len()
    }

    /// `(step, instruction, state after it)` for every step taken.
    pub fn steps(&self) -> impl Iterator<Item = (usize, Instruction, &MachineState<STACK_SIZE>)> {
        self.executed
            .iter()
            .zip(&self.later)
            .enumerate()
            .map(|(step, (instruction, state))| (step, *instruction, state))
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Every instruction of the program was fed once, in order.
    Completed,
    /// The instruction pointer left the program.
    EndOfProgram,
    StepLimit,
    Fault { step: usize, error: MachineError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run<const STACK_SIZE: usize> {
    pub trace: Trace<STACK_SIZE>,
    pub halt: Halt,
}

impl<const STACK_SIZE: usize> Run<STACK_SIZE> {
    /// The trace, or the fault that cut it short.
    pub fn into_result(self) -> Result<Trace<STACK_SIZE>, TraceError> {
        match self.halt {
            Halt::Fault { step, error } => Err(TraceError::Fault { step, error }),
            _ => Ok(self.trace),
        }
    }
}

/// Feeds `program` to the machine in order, one step per
/// instruction, ignoring where the instruction pointer points.
/// This is the fixed schedule of the adder pipeline.
pub fn run_sequential<const STACK_SIZE: usize>(
    initial: MachineState<STACK_SIZE>,
    program: &[Instruction],
) -> Run<STACK_SIZE> {
    let mut trace = Trace::new(initial);
    for (step, instruction) in program.iter().enumerate() {
        if let Err(error) = advance(&mut trace, step, *instruction) {
            return Run {
                trace,
                halt: Halt::Fault { step, error },
            };
        }
    }
    log::debug!("ran {} instructions in sequence", trace.step_count());
    Run {
        trace,
        halt: Halt::Completed,
    }
}

/// Fetches `program[instruction_pointer]` before every step, so a
/// result written to the pointer redirects execution.
pub fn run_fetched<const STACK_SIZE: usize>(
    initial: MachineState<STACK_SIZE>,
    program: &[Instruction],
    max_steps: usize,
) -> Run<STACK_SIZE> {
    let mut trace = Trace::new(initial);
    let halt = loop {
        let step = trace.step_count();
        if step >= max_steps {
            log::warn!("step limit of {} reached", max_steps);
            break Halt::StepLimit;
        }
        let pointer = trace.last().instruction_pointer();
        let fetched = usize::try_from(pointer)
            .ok()
            .and_then(|index| program.get(index));
        let Some(instruction) = fetched else {
            log::debug!("instruction pointer {:x} left the program", pointer);
            break Halt::EndOfProgram;
        };
        if let Err(error) = advance(&mut trace, step, *instruction) {
            break Halt::Fault { step, error };
        }
    };
    Run { trace, halt }
}

fn advance<const STACK_SIZE: usize>(
    trace: &mut Trace<STACK_SIZE>,
    step: usize,
    instruction: Instruction,
) -> Result<(), MachineError> {
    match trace.last().step(instruction) {
        Ok(next) => {
            trace.record(instruction, next);
            Ok(())
        }
        Err(error) => {
            log::warn!(
                "step {} ({:#06x}) faulted: {}",
                step,
                instruction.word(),
                error
            );
            Err(error)
        }
    }
}
