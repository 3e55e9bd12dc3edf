//! Ordered aggregation of every stage's captured output.

use serde::{Deserialize, Serialize};

use crate::bibliography::BibliographyDecision;
use crate::runner::PassOutcome;

/// What produced a transcript section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "pass", rename_all = "snake_case")]
pub enum SectionKind {
    Pass(u8),
    Bibliography,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptSection {
    pub kind: SectionKind,
    pub title: String,
    pub body: String,
}

/// Append-only transcript of a compilation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    sections: Vec<TranscriptSection>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pass(&mut self, outcome: &PassOutcome) {
        self.sections.push(TranscriptSection {
            kind: SectionKind::Pass(outcome.pass),
            title: format!(
                "pass {} ({}, {})",
                outcome.pass, outcome.engine, outcome.output.status
            ),
            body: outcome.transcript(),
        });
    }

    /// Adds a section only when at least one processor was attempted.
    pub fn push_bibliography(&mut self, decision: &BibliographyDecision) {
        if decision.attempts().is_empty() {
            return;
        }
        self.sections.push(TranscriptSection {
            kind: SectionKind::Bibliography,
            title: format!("bibliography ({})", decision.summary()),
            body: decision.transcript(),
        });
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.sections.push(TranscriptSection {
            kind: SectionKind::Warning,
            title: "warning".to_string(),
            body: message,
        });
    }

    pub fn sections(&self) -> &[TranscriptSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Pass indices in the order their sections appear.
    pub fn pass_sections(&self) -> Vec<u8> {
        self.sections
            .iter()
            .filter_map(|s| match s.kind {
                SectionKind::Pass(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    /// Human-readable rendering, one banner per section.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("===== {} =====\n", section.title));
            out.push_str(&section.body);
            if !section.body.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

impl std::fmt::Display for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibliography::SkipReason;
    use crate::runner::{ProcessOutput, ProcessStatus};
    use texbuild_core::EngineChoice;

    fn pass(n: u8, stdout: &str) -> PassOutcome {
        PassOutcome {
            pass: n,
            engine: EngineChoice::Pdflatex,
            timeout_secs: 120,
            output: ProcessOutput {
                name: "pdflatex".to_string(),
                command: "pdflatex main.tex".to_string(),
                status: ProcessStatus::Exited { code: 0 },
                stdout: stdout.to_string(),
                stderr: String::new(),
                duration_ms: 1,
            },
        }
    }

    #[test]
    fn test_sections_keep_order() {
        let mut t = Transcript::new();
        t.push_pass(&pass(1, "first\n"));
        t.push_pass(&pass(2, "second\n"));
        t.push_warning("careful");

        assert_eq!(t.pass_sections(), vec![1, 2]);
        assert_eq!(t.sections()[2].kind, SectionKind::Warning);
        let rendered = t.render();
        let first = rendered.find("first").unwrap();
        let second = rendered.find("second").unwrap();
        assert!(first < second);
        assert!(rendered.contains("===== pass 1 (pdflatex, exited(0)) ====="));
    }

    #[test]
    fn test_skipped_bibliography_adds_no_section() {
        let mut t = Transcript::new();
        t.push_bibliography(&BibliographyDecision::Skipped {
            reason: SkipReason::NoBibliographySources,
        });
        assert!(t.is_empty());
    }

    #[test]
    fn test_render_terminates_bodies() {
        let mut t = Transcript::new();
        t.push_pass(&pass(1, "no newline"));
        assert!(t.render().ends_with("no newline\n"));
    }
}
