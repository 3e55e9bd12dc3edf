//! Conditional bibliography processing between pass 1 and pass 2.
//!
//! The stage never fails the pipeline. It reports whether a processor ran,
//! which gates the third engine pass.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use texbuild_core::decode_lossy;
use tracing::{debug, info, warn};

use crate::config::CompileConfig;
use crate::runner::{ProcessOutput, ProcessRunner};
use crate::stage::StageConfig;

const BIBDATA_MARKER: &str = "\\bibdata";
const CITATION_MARKER: &str = "\\citation";

/// Why the stage did not invoke any processor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No `.bib` file anywhere under the working directory.
    NoBibliographySources,

    /// Pass 1 left no `<entry>.aux`.
    NoAuxFile,

    /// The aux file exists but could not be read.
    AuxUnreadable,

    /// The aux file holds neither `\bibdata` nor `\citation`.
    NoCitations,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SkipReason::NoBibliographySources => "no .bib sources",
            SkipReason::NoAuxFile => "no .aux file",
            SkipReason::AuxUnreadable => "unreadable .aux file",
            SkipReason::NoCitations => "no citations in .aux file",
        })
    }
}

/// One processor invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BibliographyAttempt {
    pub processor: String,
    pub output: ProcessOutput,
}

/// Result of the bibliography stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BibliographyDecision {
    /// Preconditions not met; nothing was run.
    Skipped { reason: SkipReason },

    /// `processor` exited successfully. Earlier failed attempts are kept.
    Ran {
        processor: String,
        attempts: Vec<BibliographyAttempt>,
    },

    /// Every processor was tried and none succeeded.
    Unsuccessful { attempts: Vec<BibliographyAttempt> },
}

impl BibliographyDecision {
    /// Whether a processor ran successfully, scheduling a third pass.
    pub fn ran(&self) -> bool {
        matches!(self, BibliographyDecision::Ran { .. })
    }

    pub fn attempts(&self) -> &[BibliographyAttempt] {
        match self {
            BibliographyDecision::Skipped { .. } => &[],
            BibliographyDecision::Ran { attempts, .. }
            | BibliographyDecision::Unsuccessful { attempts } => attempts.as_slice(),
        }
    }

    /// The processor that succeeded, if any.
    pub fn processor(&self) -> Option<&str> {
        match self {
            BibliographyDecision::Ran { processor, .. } => Some(processor),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            BibliographyDecision::Skipped { reason } => format!("skipped: {reason}"),
            BibliographyDecision::Ran { processor, .. } => format!("ran {processor}"),
            BibliographyDecision::Unsuccessful { .. } => {
                "no bibliography processor succeeded".to_string()
            }
        }
    }

    /// Every attempt's output, in order.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for attempt in self.attempts() {
            out.push_str(&format!(
                "[{}] {}\n",
                attempt.output.command, attempt.output.status
            ));
            out.push_str(&attempt.output.stdout);
            out.push_str(&attempt.output.stderr);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Decides whether and how to run biber/bibtex.
pub struct BibliographyStage<'a> {
    config: &'a CompileConfig,
}

impl<'a> BibliographyStage<'a> {
    pub fn new(config: &'a CompileConfig) -> Self {
        Self { config }
    }

    /// Run the first processor that succeeds, if the pass-1 artifacts call
    /// for one.
    pub async fn maybe_run(&self, working_dir: &Path, entry_base: &str) -> BibliographyDecision {
        if let Some(reason) = skip_reason(working_dir, entry_base) {
            debug!(reason = %reason, "Skipping bibliography processing");
            return BibliographyDecision::Skipped { reason };
        }

        let mut attempts = Vec::new();
        for processor in &self.config.bibliography_processors {
            info!(processor = %processor, "Running bibliography processor");
            let stage = StageConfig::bibliography(
                processor,
                entry_base,
                working_dir.to_path_buf(),
                self.config.bibliography_timeout_secs,
            );
            let output = ProcessRunner::execute(&stage).await;
            let succeeded = output.success();
            attempts.push(BibliographyAttempt {
                processor: processor.clone(),
                output,
            });
            if succeeded {
                info!(processor = %processor, "Bibliography processor completed successfully");
                return BibliographyDecision::Ran {
                    processor: processor.clone(),
                    attempts,
                };
            }
        }

        warn!("Could not run bibliography processor");
        BibliographyDecision::Unsuccessful { attempts }
    }
}

/// First unmet precondition, or `None` when a processor should run.
pub fn skip_reason(working_dir: &Path, entry_base: &str) -> Option<SkipReason> {
    if find_bib_sources(working_dir).is_empty() {
        return Some(SkipReason::NoBibliographySources);
    }

    let aux_path = working_dir.join(format!("{entry_base}.aux"));
    if !aux_path.is_file() {
        return Some(SkipReason::NoAuxFile);
    }
    let aux = match std::fs::read(&aux_path) {
        Ok(bytes) => decode_lossy(&bytes),
        Err(e) => {
            warn!(path = %aux_path.display(), error = %e, "Failed to read aux file");
            return Some(SkipReason::AuxUnreadable);
        }
    };
    if !aux.contains(BIBDATA_MARKER) && !aux.contains(CITATION_MARKER) {
        return Some(SkipReason::NoCitations);
    }
    None
}

/// Every `*.bib` file under `dir`, recursively. Unreadable directories are
/// treated as empty.
pub fn find_bib_sources(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("bib"))
                .unwrap_or(false)
            {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}
