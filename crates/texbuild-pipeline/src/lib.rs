//! texbuild pipeline - multi-pass compilation of a materialized project
//!
//! Provides the compilation orchestrator that:
//! - Runs the selected engine as a bounded external process
//! - Runs biber/bibtex between pass 1 and pass 2 when citations are present
//! - Schedules a third pass after a successful bibliography run
//! - Aggregates every stage's output into one transcript

pub mod bibliography;
pub mod config;
pub mod pipeline;
pub mod detect;
pub mod runner;
pub mod stage;
pub mod transcript;

// Re-export key types
pub use bibliography::{
    BibliographyAttempt, BibliographyDecision, BibliographyStage, SkipReason,
};
pub use config::{CompileConfig, ConfigError, EngineBinaries};
pub use pipeline::{Artifact, CompilationResult, CompilePipeline, CompileStatus, FailureKind};
pub use detect::{available_engines, detect_engines, EngineAvailability};
pub use runner::{PassOutcome, PassRunner, ProcessOutput, ProcessRunner, ProcessStatus};
pub use stage::{PipelineStage, StageConfig};
pub use transcript::{SectionKind, Transcript, TranscriptSection};
