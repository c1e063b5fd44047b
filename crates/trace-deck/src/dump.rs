use std::fmt;
use std::io;

use lookahead_machine::assembler::mnemonic;
use lookahead_machine::{Destination, Instruction, MachineState, Operand};

use crate::trace::Trace;

/// One state rendered as a line of lowercase hex:
/// `  1) ip=1 a=f0f1 b=f0f result=fffe stack: {fffe, f0f1, f0f, 0, ...}`
pub struct HexDump<'a, const STACK_SIZE: usize> {
    pub step: usize,
    pub state: &'a MachineState<STACK_SIZE>,
}

impl<const STACK_SIZE: usize> fmt::Display for HexDump<'_, STACK_SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>3}) ip={:x} a={:x} b={:x} result={:x} stack: {{",
            self.step,
            self.state.instruction_pointer(),
            self.state.operand_value_a(),
            self.state.operand_value_b(),
            self.state.result(),
        )?;
        for (index, value) in self.state.stack().iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:x}", value)?;
        }
        f.write_str("}")
    }
}

/// Renders an instruction in the syntax the assembler reads, so
/// the output assembles back to the same word. Words without a
/// valid opcode come out as `.word`.
pub fn disassemble(instruction: Instruction) -> String {
    let Ok(opcode) = instruction.opcode() else {
        return format!(".word {:#06x}", instruction.word());
    };
    let destination = match instruction.destination() {
        Destination::Push => " -> push",
        Destination::WritePc => " -> pc",
        Destination::Drop => "",
    };
    format!(
        "{} {} {}{}",
        mnemonic(opcode),
        operand(instruction.operand_a()),
        operand(instruction.operand_b()),
        destination
    )
}

fn operand(operand: Operand) -> String {
    match operand {
        Operand::Immediate(value) => format!("#{}", value),
        Operand::Stack {
            index,
            consume: true,
        } => format!("s{}!", index),
        Operand::Stack { index, .. } => format!("s{}", index),
    }
}

/// Writes the initial state, then the disassembly of every step
/// followed by the state it produced.
pub fn write_trace<W: io::Write, const STACK_SIZE: usize>(
    out: &mut W,
    trace: &Trace<STACK_SIZE>,
) -> io::Result<()> {
    writeln!(
        out,
        "{}",
        HexDump {
            step: 0,
            state: trace.initial()
        }
    )?;
    for (step, instruction, state) in trace.steps() {
        writeln!(out, "     {}", disassemble(instruction))?;
        writeln!(
            out,
            "{}",
            HexDump {
                step: step + 1,
                state
            }
        )?;
    }
    Ok(())
}
