use std::io::{Write, stdout};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;

use lookahead_machine::{MachineState, StackWord};
use trace_deck::dump::write_trace;
use trace_deck::export::write_trace_file;
use trace_deck::{Config, Halt, Mode, Program, run_fetched, run_sequential};

#[derive(Debug, Parser)]
#[clap(name = "trace-deck")]
struct TraceDeckCli {
    /// Assembly source to run, the built-in adder when omitted
    program: Option<PathBuf>,

    /// First operand, replaces the top of the initial stack
    #[clap(long, value_parser = parse_number)]
    a: Option<StackWord>,

    /// Second operand, replaces the second initial stack value
    #[clap(long, value_parser = parse_number)]
    b: Option<StackWord>,

    /// Stack capacity, 8 or 16
    #[clap(long = "stack-size")]
    stack_size: Option<usize>,

    /// Follow the instruction pointer instead of running in order
    #[clap(long)]
    fetch: bool,

    #[clap(long = "max-steps")]
    max_steps: Option<usize>,

    /// Write the trace as COBS framed postcard records
    #[clap(long, value_name = "FILE")]
    export: Option<PathBuf>,

    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl TraceDeckCli {
    fn apply(&self, config: &mut Config) {
        if let Some(stack_size) = self.stack_size {
            config.stack_size = stack_size;
        }
        if self.fetch {
            config.mode = Mode::Fetch;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        if self.a.is_some() {
            config.a = self.a;
        }
        if self.b.is_some() {
            config.b = self.b;
        }
        if self.export.is_some() {
            config.export = self.export.clone();
        }
    }
}

fn parse_number(value: &str) -> Result<StackWord, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => StackWord::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("{value:?} is not a number: {err}"))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = TraceDeckCli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    let program = match &cli.program {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("could not read {}", path.display()))?;
            Program::assemble(&source)
                .with_context(|| format!("could not assemble {}", path.display()))?
        }
        None => Program::carry_lookahead_adder()?,
    };
    let program = program.with_operands(config.a, config.b);

    match config.stack_size {
        8 => run::<8>(&program, &config),
        _ => run::<16>(&program, &config),
    }
}

fn run<const STACK_SIZE: usize>(program: &Program, config: &Config) -> anyhow::Result<()> {
    let initial: MachineState<STACK_SIZE> = program.initial_state()?;
    let run = match config.mode {
        Mode::Sequential => run_sequential(initial, &program.instructions),
        Mode::Fetch => run_fetched(initial, &program.instructions, config.max_steps),
    };

    let mut out = stdout().lock();
    write_trace(&mut out, &run.trace)?;
    if let Some(path) = &config.export {
        write_trace_file(path, &run.trace)
            .with_context(|| format!("could not export to {}", path.display()))?;
    }

    match run.halt {
        Halt::Fault { step, error } => bail!("machine fault at step {}: {}", step, error),
        Halt::StepLimit => writeln!(out, "stopped after {} steps", config.max_steps)?,
        Halt::Completed | Halt::EndOfProgram => writeln!(out, "program finish!")?,
    }
    Ok(())
}
