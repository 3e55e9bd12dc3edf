//! Pipeline stage definitions and external command configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// States of the compilation state machine, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "stage", content = "pass", rename_all = "snake_case")]
pub enum PipelineStage {
    Resolving,
    Validating,
    SelectingEngine,
    /// Engine pass, 1-based.
    Pass(u8),
    Bibliography,
    Finalizing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Resolving => f.write_str("resolving"),
            PipelineStage::Validating => f.write_str("validating"),
            PipelineStage::SelectingEngine => f.write_str("selecting_engine"),
            PipelineStage::Pass(n) => write!(f, "pass_{n}"),
            PipelineStage::Bibliography => f.write_str("bibliography"),
            PipelineStage::Finalizing => f.write_str("finalizing"),
        }
    }
}

/// One bounded external process invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Human-readable name used in logs and transcripts.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Working directory; inherits the caller's when `None`.
    pub working_dir: Option<PathBuf>,

    /// Timeout in seconds.
    pub timeout_secs: u64,
}

impl StageConfig {
    /// Engine pass in non-interactive mode, so errors are reported instead of
    /// prompted for.
    pub fn engine_pass(
        binary: &str,
        entry_file: &str,
        working_dir: PathBuf,
        timeout_secs: u64,
        halt_on_error: bool,
    ) -> Self {
        let mut command = vec![binary.to_string(), "-interaction=nonstopmode".to_string()];
        if halt_on_error {
            command.push("-halt-on-error".to_string());
        }
        command.push(entry_file.to_string());
        Self {
            name: binary.to_string(),
            command,
            working_dir: Some(working_dir),
            timeout_secs,
        }
    }

    /// Bibliography processor run against the entry's base name.
    pub fn bibliography(
        processor: &str,
        entry_base: &str,
        working_dir: PathBuf,
        timeout_secs: u64,
    ) -> Self {
        Self {
            name: processor.to_string(),
            command: vec![processor.to_string(), entry_base.to_string()],
            working_dir: Some(working_dir),
            timeout_secs,
        }
    }

    /// `<binary> --version` availability check.
    pub fn version_check(binary: &str, timeout_secs: u64) -> Self {
        Self {
            name: format!("{binary} --version"),
            command: vec![binary.to_string(), "--version".to_string()],
            working_dir: None,
            timeout_secs,
        }
    }

    /// Shell-style rendering for transcripts.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}
