//! Sizing knobs for a [`Context`](crate::vm::Context).
//!
//! Loaded from a JSON file; any field left out keeps its default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vm::{ADDR_MAX, Addr, MAX_PROGRAM_CELLS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Zeroed heap cells reserved past the program image.
    pub heap_slack: Addr,
    /// Initial operand stack capacity.
    pub stack_capacity: Addr,
    /// Frames reserved for the call stack.
    pub call_stack_capacity: Addr,
    /// Most heap cells that may ever be materialized.
    pub heap_limit: Addr,
    /// Deepest the operand stack may get.
    pub stack_limit: Addr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            heap_slack: 1 << 12,
            stack_capacity: 1 << 12,
            call_stack_capacity: 256,
            heap_limit: ADDR_MAX,
            stack_limit: ADDR_MAX,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed config {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
    #[error("invalid config: `{field}` {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: shown.clone(), source })?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: shown.clone(), source })?;
        config.validate()?;
        debug!(path = %shown, ?config, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });

        if self.stack_capacity == 0 {
            return invalid("stack_capacity", "must be at least 1".into());
        }
        if self.call_stack_capacity == 0 {
            return invalid("call_stack_capacity", "must be at least 1".into());
        }
        if self.stack_capacity > self.stack_limit {
            return invalid(
                "stack_capacity",
                format!("({}) exceeds stack_limit ({})", self.stack_capacity, self.stack_limit),
            );
        }
        if self.heap_slack as usize >= MAX_PROGRAM_CELLS {
            return invalid("heap_slack", format!("must be below {MAX_PROGRAM_CELLS}"));
        }
        if self.heap_slack > self.heap_limit {
            return invalid(
                "heap_slack",
                format!("({}) exceeds heap_limit ({})", self.heap_slack, self.heap_limit),
            );
        }
        Ok(())
    }
}
