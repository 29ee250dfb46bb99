//! Knobs for the process-wide collector, read from the environment.

use std::env;

use crate::{
  error::{GcError, Result},
  roots::HEURISTIC_STACK_OFFSET,
};

pub const STACK_BOTTOM_VAR: &str = "RCOLLECTOR_STACK_BOTTOM";
pub const HEURISTIC_OFFSET_VAR: &str = "RCOLLECTOR_HEURISTIC_OFFSET";
pub const SCAN_STATICS_VAR: &str = "RCOLLECTOR_SCAN_STATICS";

/// How the stack bottom is established when it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackBottom {
  /// Ask the OS for the recording thread's exact stack bounds.
  Query,
  /// Take the recording frame's address plus `offset` bytes.
  Heuristic { offset: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  pub stack_bottom: StackBottom,
  pub scan_statics: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      stack_bottom: StackBottom::Query,
      scan_statics: true,
    }
  }
}

impl Config {
  /// Reads the `RCOLLECTOR_*` variables; unset ones keep their defaults.
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self> {
    let mut config = Config::default();

    let offset = match lookup(HEURISTIC_OFFSET_VAR) {
      Some(value) => value.trim().parse::<usize>().map_err(|_| GcError::InvalidConfig {
        key: HEURISTIC_OFFSET_VAR,
        value,
      })?,
      None => HEURISTIC_STACK_OFFSET,
    };

    if let Some(value) = lookup(STACK_BOTTOM_VAR) {
      config.stack_bottom = match value.trim().to_ascii_lowercase().as_str() {
        "query" => StackBottom::Query,
        "heuristic" => StackBottom::Heuristic { offset },
        _ => {
          return Err(GcError::InvalidConfig {
            key: STACK_BOTTOM_VAR,
            value,
          });
        }
      };
    }

    if let Some(value) = lookup(SCAN_STATICS_VAR) {
      config.scan_statics = match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" => false,
        _ => {
          return Err(GcError::InvalidConfig {
            key: SCAN_STATICS_VAR,
            value,
          });
        }
      };
    }

    Ok(config)
  }
}
