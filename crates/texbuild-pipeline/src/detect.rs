//! Engine availability detection via `<binary> --version`.

use crate::config::CompileConfig;
use crate::runner::ProcessRunner;
use crate::stage::StageConfig;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use texbuild_core::EngineChoice;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineAvailability {
    pub engine: EngineChoice,
    pub binary: String,
    pub available: bool,
    /// First line of `--version` output.
    pub version: Option<String>,
}

/// Run `--version` for every configured engine concurrently.
pub async fn detect_engines(config: &CompileConfig) -> Vec<EngineAvailability> {
    let checks = EngineChoice::ALL.into_iter().map(|engine| async move {
        let binary = config.engines.binary(engine).to_string();
        let stage = StageConfig::version_check(&binary, config.version_timeout_secs);
        let output = ProcessRunner::execute(&stage).await;
        let available = output.success();
        let version = if available {
            output
                .stdout
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        } else {
            None
        };
        debug!(engine = %engine, binary = %binary, available, "Checked engine");
        EngineAvailability {
            engine,
            binary,
            available,
            version,
        }
    });
    join_all(checks).await
}

pub fn available_engines(detected: &[EngineAvailability]) -> Vec<EngineChoice> {
    detected
        .iter()
        .filter(|p| p.available)
        .map(|p| p.engine)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineBinaries;

    #[tokio::test]
    async fn test_detect_reports_missing_binaries() {
        let config = CompileConfig {
            engines: EngineBinaries::uniform("texbuild-missing-engine"),
            ..CompileConfig::default()
        };
        let detected = detect_engines(&config).await;
        assert_eq!(detected.len(), 3);
        assert!(detected.iter().all(|p| !p.available && p.version.is_none()));
        assert!(available_engines(&detected).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detect_reads_first_version_line() {
        let config = CompileConfig {
            engines: EngineBinaries::uniform("echo"),
            ..CompileConfig::default()
        };
        let detected = detect_engines(&config).await;
        assert_eq!(
            available_engines(&detected),
            vec![
                EngineChoice::Pdflatex,
                EngineChoice::Xelatex,
                EngineChoice::Lualatex
            ]
        );
        assert!(detected.iter().all(|p| p.version.is_some()));
    }
}
