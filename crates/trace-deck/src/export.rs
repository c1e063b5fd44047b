use std::fs;
use std::path::Path;

use lookahead_machine::{MachineState, ProgramWord, StackWord};
use serde::{Deserialize, Serialize};

use crate::TraceError;
use crate::trace::Trace;

/// A state as it is written to an export file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub step: u32,
    /// The word that produced this state, `None` for the initial one.
    pub instruction: Option<ProgramWord>,
    pub instruction_pointer: StackWord,
    pub operand_value_a: StackWord,
    pub operand_value_b: StackWord,
    pub result: StackWord,
    pub stack: Vec<StackWord>,
}

impl TraceRecord {
    pub fn from_state<const STACK_SIZE: usize>(
        step: u32,
        instruction: Option<ProgramWord>,
        state: &MachineState<STACK_SIZE>,
    ) -> Self {
        Self {
            step,
            instruction,
            instruction_pointer: state.instruction_pointer(),
            operand_value_a: state.operand_value_a(),
            operand_value_b: state.operand_value_b(),
            result: state.result(),
            stack: state.stack().to_vec(),
        }
    }
}

pub fn records<const STACK_SIZE: usize>(trace: &Trace<STACK_SIZE>) -> Vec<TraceRecord> {
    let initial = TraceRecord::from_state(0, None, trace.initial());
    let steps = trace.steps().map(|(step, instruction, state)| {
        let step = u32::try_from(step.saturating_add(1)).unwrap_or(u32::MAX);
        TraceRecord::from_state(step, Some(instruction.word()), state)
    });
    std::iter::once(initial).chain(steps).collect()
}

/// Every record as its own COBS frame, so the stream can be cut at
/// any zero byte.
pub fn encode_trace<const STACK_SIZE: usize>(
    trace: &Trace<STACK_SIZE>,
) -> Result<Vec<u8>, TraceError> {
    let mut out = Vec::new();
    for record in records(trace) {
        out.extend(postcard::to_stdvec_cobs(&record)?);
    }
    Ok(out)
}

pub fn read_records(bytes: &mut [u8]) -> Result<Vec<TraceRecord>, TraceError> {
    let mut out = Vec::new();
    for frame in bytes.split_inclusive_mut(|byte| *byte == 0) {
        // Trailing bytes without a terminator are not a frame.
        if frame.last() != Some(&0) {
            log::warn!("ignoring {} bytes after the last frame", frame.len());
            break;
        }
        out.push(postcard::from_bytes_cobs(frame)?);
    }
    Ok(out)
}

pub fn write_trace_file<const STACK_SIZE: usize>(
    path: &Path,
    trace: &Trace<STACK_SIZE>,
) -> Result<(), TraceError> {
    let bytes = encode_trace(trace)?;
    fs::write(path, &bytes)?;
    log::debug!("wrote {} bytes of trace to {}", bytes.len(), path.display());
    Ok(())
}

pub fn read_trace_file(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let mut bytes = fs::read(path)?;
    read_records(&mut bytes)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::programs::Program;
    use crate::trace::run_sequential;

    fn adder_trace() -> Trace<8> {
        let program = Program::carry_lookahead_adder().unwrap();
        let initial = program.initial_state::<8>().unwrap();
        run_sequential(initial, &program.instructions)
            .into_result()
            .unwrap()
    }

    #[test]
    fn records_follow_the_trace() {
        let trace = adder_trace();
        let records = records(&trace);
        assert_eq!(records.len(), 27);
        assert_eq!(records[0].instruction, None);
        assert_eq!(records[0].stack, vec![0xF0F1, 0x0F0F, 0, 0, 0, 0, 0, 0]);
        assert_eq!(records[1].step, 1);
        assert_eq!(records[1].instruction, Some(trace.executed()[0].word()));
        assert_eq!(records[1].result, 0xFFFE);
        assert_eq!(records[26].stack[0], 0x10000);
    }

    #[test]
    fn encoded_trace_reads_back() {
        let trace = adder_trace();
        let mut bytes = encode_trace(&trace).unwrap();
        assert_eq!(bytes.iter().filter(|byte| **byte == 0).count(), 27);
        let decoded = read_records(&mut bytes).unwrap();
        assert_eq!(decoded, records(&trace));
    }

    #[test]
    fn truncated_frame_is_dropped() {
        let trace = adder_trace();
        let mut bytes = encode_trace(&trace).unwrap();
        bytes.truncate(bytes.len() - 1);
        let decoded = read_records(&mut bytes).unwrap();
        assert_eq!(decoded.len(), 26);
    }

    #[test]
    fn trace_file_round_trips() {
        let trace = adder_trace();
        let path = std::env::temp_dir().join(format!("trace-deck-{}.bin", std::process::id()));
        write_trace_file(&path, &trace).unwrap();
        let decoded = read_trace_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(decoded.last().map(|record| record.stack[0]), Some(0x10000));
    }
}
