//! Read-only compilation configuration shared by concurrent requests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use texbuild_core::EngineChoice;

/// Errors loading or validating a [`CompileConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Binary name (or path) per engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineBinaries {
    pub pdflatex: String,
    pub xelatex: String,
    pub lualatex: String,
}

impl Default for EngineBinaries {
    fn default() -> Self {
        Self {
            pdflatex: EngineChoice::Pdflatex.name().to_string(),
            xelatex: EngineChoice::Xelatex.name().to_string(),
            lualatex: EngineChoice::Lualatex.name().to_string(),
        }
    }
}

impl EngineBinaries {
    pub fn binary(&self, engine: EngineChoice) -> &str {
        match engine {
            EngineChoice::Pdflatex => &self.pdflatex,
            EngineChoice::Xelatex => &self.xelatex,
            EngineChoice::Lualatex => &self.lualatex,
        }
    }

    /// Point every engine at the same binary.
    pub fn uniform(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        Self {
            pdflatex: binary.clone(),
            xelatex: binary.clone(),
            lualatex: binary,
        }
    }
}

/// Compilation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompileConfig {
    /// Engine binaries.
    pub engines: EngineBinaries,

    /// Bibliography processors, tried in order until one succeeds.
    pub bibliography_processors: Vec<String>,

    /// Wall-clock bound per engine pass.
    pub pass_timeout_secs: u64,

    /// Wall-clock bound per bibliography processor attempt.
    pub bibliography_timeout_secs: u64,

    /// Wall-clock bound per `--version` check.
    pub version_timeout_secs: u64,

    /// Pass `-halt-on-error` to the engine.
    pub halt_on_error: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            engines: EngineBinaries::default(),
            bibliography_processors: vec!["biber".to_string(), "bibtex".to_string()],
            pass_timeout_secs: 120,
            bibliography_timeout_secs: 30,
            version_timeout_secs: 5,
            halt_on_error: true,
        }
    }
}

impl CompileConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for engine in EngineChoice::ALL {
            if self.engines.binary(engine).trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "binary for {engine} must not be empty"
                )));
            }
        }
        if self.bibliography_processors.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "bibliography processor names must not be empty".to_string(),
            ));
        }
        for (name, secs) in [
            ("pass_timeout_secs", self.pass_timeout_secs),
            ("bibliography_timeout_secs", self.bibliography_timeout_secs),
            ("version_timeout_secs", self.version_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }
}
