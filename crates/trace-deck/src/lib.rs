//! Host side of the lookahead machine: loads a program, threads
//! machine states through `step` and keeps every one of them so the
//! run can be printed or exported afterwards.

pub mod config;
pub mod dump;
pub mod export;
pub mod programs;
pub mod trace;

use lookahead_machine::MachineError;
use lookahead_machine::assembler::AssemblerError;
use thiserror::Error;

pub use config::{Config, Mode};
pub use programs::Program;
pub use trace::{Halt, Run, Trace, run_fetched, run_sequential};

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("machine fault at step {step}: {error}")]
    Fault { step: usize, error: MachineError },
    #[error("initial stack rejected: {0}")]
    InitialStack(MachineError),
    #[error("assembly failed: {0}")]
    Assembly(AssemblerError),
    #[error("unsupported stack size {0}, expected 8 or 16")]
    UnsupportedStackSize(usize),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("trace encoding failed: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("config file is invalid: {0}")]
    Config(#[from] toml::de::Error),
}

impl From<AssemblerError> for TraceError {
    fn from(err: AssemblerError) -> Self {
        TraceError::Assembly(err)
    }
}
