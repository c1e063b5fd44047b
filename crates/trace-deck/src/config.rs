//! Configuration for trace-deck.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `./trace-deck.toml`, or the file passed with `--config`
//! 3. Environment variables (`TRACE_DECK_STACK_SIZE`,
//!    `TRACE_DECK_MAX_STEPS`, `TRACE_DECK_MODE`)
//! 4. Command line flags, applied by the binary
//!
//! ```toml
//! # trace-deck.toml
//! stack_size = 8
//! mode = "fetch"
//! max_steps = 4096
//! a = 0x1234
//! b = 0x4321
//! export = "adder.trace"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::TraceError;
use lookahead_machine::StackWord;

pub const LOCAL_CONFIG: &str = "trace-deck.toml";

/// How the driver picks the next instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Each instruction once, in program order.
    #[default]
    Sequential,
    /// Whatever the instruction pointer names.
    Fetch,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Mode::Sequential),
            "fetch" => Ok(Mode::Fetch),
            _ => Err(format!("unknown mode {value:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Machine capacity, 8 or 16.
    pub stack_size: usize,
    pub mode: Mode,
    /// Only bounds `Mode::Fetch` runs.
    pub max_steps: usize,
    /// Override the first initial stack value.
    pub a: Option<StackWord>,
    /// Override the second initial stack value.
    pub b: Option<StackWord>,
    pub export: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack_size: lookahead_machine::DEFAULT_STACK_SIZE,
            mode: Mode::Sequential,
            max_steps: 1024,
            a: None,
            b: None,
            export: None,
        }
    }
}

impl Config {
    /// Defaults, then the config file, then the environment.
    ///
    /// A file named explicitly must exist. The local
    /// `trace-deck.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, TraceError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let local = Path::new(LOCAL_CONFIG);
                if local.exists() {
                    Self::load_from_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        log::debug!("loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, TraceError> {
        Ok(toml::from_str(content)?)
    }

    fn load_from_file(path: &Path) -> Result<Self, TraceError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies `TRACE_DECK_*` values found by `lookup`. Values that
    /// do not parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TRACE_DECK_STACK_SIZE") {
            match value.parse() {
                Ok(stack_size) => self.stack_size = stack_size,
                Err(_) => log::warn!("ignoring TRACE_DECK_STACK_SIZE={}", value),
            }
        }
        if let Some(value) = lookup("TRACE_DECK_MAX_STEPS") {
            match value.parse() {
                Ok(max_steps) => self.max_steps = max_steps,
                Err(_) => log::warn!("ignoring TRACE_DECK_MAX_STEPS={}", value),
            }
        }
        if let Some(value) = lookup("TRACE_DECK_MODE") {
            match value.parse() {
                Ok(mode) => self.mode = mode,
                Err(err) => log::warn!("ignoring TRACE_DECK_MODE: {}", err),
            }
        }
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        match self.stack_size {
            8 | 16 => Ok(()),
            other => Err(TraceError::UnsupportedStackSize(other)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.stack_size, 16);
        assert_eq!(config.mode, Mode::Sequential);
        assert_eq!(config.max_steps, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml("stack_size = 8\nmode = \"fetch\"\n").unwrap();
        assert_eq!(config.stack_size, 8);
        assert_eq!(config.mode, Mode::Fetch);
        assert_eq!(config.max_steps, 1024);
        assert_eq!(config.a, None);
    }

    #[test]
    fn full_file() {
        let config = Config::from_toml(
            "stack_size = 16\nmax_steps = 10\na = 0x1234\nb = 5\nexport = \"out.trace\"\n",
        )
        .unwrap();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.a, Some(0x1234));
        assert_eq!(config.b, Some(5));
        assert_eq!(config.export, Some(PathBuf::from("out.trace")));
    }

    #[test]
    fn bad_file_is_an_error() {
        let err = Config::from_toml("mode = \"sideways\"").unwrap_err();
        assert!(matches!(err, TraceError::Config(_)));
    }

    #[test]
    fn environment_beats_file() {
        let mut config = Config::from_toml("stack_size = 16\nmax_steps = 5\n").unwrap();
        let env = HashMap::from([
            ("TRACE_DECK_STACK_SIZE", "8"),
            ("TRACE_DECK_MODE", "Fetch"),
        ]);
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));
        assert_eq!(config.stack_size, 8);
        assert_eq!(config.mode, Mode::Fetch);
        assert_eq!(config.max_steps, 5);
    }

    #[test]
    fn bad_environment_is_ignored() {
        let mut config = Config::default();
        let env = HashMap::from([
            ("TRACE_DECK_STACK_SIZE", "lots"),
            ("TRACE_DECK_MAX_STEPS", "-1"),
            ("TRACE_DECK_MODE", "random"),
        ]);
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn only_two_stack_sizes() {
        for (size, ok) in [(8, true), (16, true), (4, false), (32, false)] {
            let config = Config {
                stack_size: size,
                ..Config::default()
            };
            assert_eq!(config.validate().is_ok(), ok);
        }
        let err = Config {
            stack_size: 12,
            ..Config::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, TraceError::UnsupportedStackSize(12)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/trace-deck.toml"))).unwrap_err();
        assert!(matches!(err, TraceError::Io(_)));
    }
}
