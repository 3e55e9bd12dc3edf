//! Compilation pipeline orchestration.
//!
//! `Resolving -> Validating -> SelectingEngine -> Pass(1) -> Bibliography ->
//! Pass(2) -> [Pass(3)] -> Finalizing`, ending in `Success` or `Failed(kind)`.
//! Every request returns one [`CompilationResult`] carrying the transcript of
//! everything that ran.

use crate::bibliography::{BibliographyDecision, BibliographyStage};
use crate::config::CompileConfig;
use crate::runner::{PassOutcome, PassRunner};
use crate::stage::PipelineStage;
use crate::transcript::Transcript;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use texbuild_core::{
    compile_span, emit_bibliography_decided, emit_compile_finished, emit_compile_started,
    emit_pass_finished, materialize, resolve_entry, select_engine, validate_source, CompileError,
    EngineChoice, MaterializedProject, ProjectTree, ResolvedEntry, SkippedDocument,
};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Why a request ended without an artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    NoEntryFile,
    UnsafeContent { construct: String },
    CompileFailed { pass: u8 },
    /// Every pass succeeded but `expected` was not written.
    ArtifactMissing { expected: String },
    Timeout { stage: PipelineStage },
    InternalError { message: String },
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NoEntryFile => f.write_str("no main .tex file found in project"),
            FailureKind::UnsafeContent { construct } => {
                write!(f, "potentially dangerous command detected: {construct}")
            }
            FailureKind::CompileFailed { pass } => {
                write!(f, "LaTeX compilation failed (pass {pass})")
            }
            FailureKind::ArtifactMissing { expected } => write!(f, "{expected} was not generated"),
            FailureKind::Timeout { stage } => write!(f, "compilation timeout during {stage}"),
            FailureKind::InternalError { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Terminal state of a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "failure", rename_all = "snake_case")]
pub enum CompileStatus {
    Success,
    Failed(FailureKind),
}

/// The produced PDF.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    /// Name the caller should present the artifact under.
    pub file_name: String,

    #[serde(skip)]
    pub bytes: Vec<u8>,

    pub size_bytes: u64,

    /// SHA-256 hex of `bytes`.
    pub sha256: String,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self {
            file_name: file_name.into(),
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(hasher.finalize()),
            bytes,
        }
    }
}

/// Everything a caller needs to present or diagnose one request.
#[derive(Debug, Clone, Serialize)]
pub struct CompilationResult {
    pub request_id: Uuid,

    pub status: CompileStatus,

    /// Engine used for every pass, once selected.
    pub engine: Option<EngineChoice>,

    /// Entry document, relative to the working directory.
    pub entry: Option<PathBuf>,

    pub passes: Vec<PassOutcome>,

    pub bibliography: Option<BibliographyDecision>,

    pub transcript: Transcript,

    /// Non-fatal problems: failed pass 3, unsuccessful bibliography.
    pub warnings: Vec<String>,

    /// Documents the materializer left out.
    pub skipped: Vec<SkippedDocument>,

    pub artifact: Option<Artifact>,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        self.status == CompileStatus::Success
    }

    pub fn failure(&self) -> Option<&FailureKind> {
        match &self.status {
            CompileStatus::Success => None,
            CompileStatus::Failed(kind) => Some(kind),
        }
    }
}

/// Per-request state, folded into a [`CompilationResult`] at a terminal state.
struct Compilation {
    request_id: Uuid,
    span: tracing::Span,
    root: PathBuf,
    started_at: DateTime<Utc>,
    start: Instant,
    engine: Option<EngineChoice>,
    entry: Option<PathBuf>,
    passes: Vec<PassOutcome>,
    bibliography: Option<BibliographyDecision>,
    transcript: Transcript,
    warnings: Vec<String>,
    skipped: Vec<SkippedDocument>,
}

impl Compilation {
    fn new(root: &Path) -> Self {
        let request_id = Uuid::new_v4();
        Self {
            span: compile_span(&request_id.to_string()),
            request_id,
            root: root.to_path_buf(),
            started_at: Utc::now(),
            start: Instant::now(),
            engine: None,
            entry: None,
            passes: Vec::new(),
            bibliography: None,
            transcript: Transcript::new(),
            warnings: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn record_pass(&mut self, outcome: PassOutcome) {
        emit_pass_finished(
            &self.request_id.to_string(),
            outcome.pass,
            &outcome.output.status.to_string(),
            outcome.output.duration_ms,
        );
        self.transcript.push_pass(&outcome);
        self.passes.push(outcome);
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn fail(self, kind: FailureKind) -> CompilationResult {
        warn!(failure = %kind, passes = self.passes.len(), "Compilation failed");
        self.finish(CompileStatus::Failed(kind), None)
    }

    fn succeed(self, artifact: Artifact) -> CompilationResult {
        info!(artifact = %artifact.file_name, size_bytes = artifact.size_bytes, "Compilation successful");
        self.finish(CompileStatus::Success, Some(artifact))
    }

    fn finish(self, status: CompileStatus, artifact: Option<Artifact>) -> CompilationResult {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        let label = match &status {
            CompileStatus::Success => "success".to_string(),
            CompileStatus::Failed(kind) => kind.to_string(),
        };
        emit_compile_finished(
            &self.request_id.to_string(),
            &label,
            duration_ms,
            self.passes.len(),
        );
        CompilationResult {
            request_id: self.request_id,
            status,
            engine: self.engine,
            entry: self.entry,
            passes: self.passes,
            bibliography: self.bibliography,
            transcript: self.transcript,
            warnings: self.warnings,
            skipped: self.skipped,
            artifact,
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration_ms,
        }
    }
}

/// Terminal failure for a pass that did not succeed, if any.
fn pass_failure(outcome: &PassOutcome) -> Option<FailureKind> {
    if outcome.success() {
        None
    } else if outcome.timed_out() {
        Some(FailureKind::Timeout {
            stage: PipelineStage::Pass(outcome.pass),
        })
    } else {
        Some(FailureKind::CompileFailed { pass: outcome.pass })
    }
}

/// Compilation pipeline orchestrator.
///
/// Holds only read-only configuration; one instance serves any number of
/// concurrent requests, each in its own working directory.
#[derive(Debug, Clone, Default)]
pub struct CompilePipeline {
    config: CompileConfig,
}

impl CompilePipeline {
    pub fn new(config: CompileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Materialize `tree` into a fresh temporary directory and compile it.
    ///
    /// The directory is removed before this returns, on every path. The
    /// artifact is named after the project when the name is a single plain
    /// path component, else after the entry.
    pub async fn compile_project(
        &self,
        tree: &ProjectTree,
        main_file: Option<&str>,
    ) -> CompilationResult {
        let workdir = match new_workdir() {
            Ok(dir) => dir,
            Err(e) => return internal_error(&e),
        };

        info!(project = %tree.name, "Creating project structure");
        let project = match materialize(tree, workdir.path()) {
            Ok(project) => project,
            Err(e) => return internal_error(&e),
        };

        let mut result = self.compile_in(&project, tree, main_file).await;
        if let Some(artifact) = result.artifact.as_mut() {
            match project_artifact_name(&tree.name) {
                Some(name) => artifact.file_name = name,
                None => warn!(
                    project = %tree.name,
                    "Project name is not a plain file name; keeping the entry stem"
                ),
            }
        }
        result
    }

    /// Compile a single uploaded `.tex` document, written as `main.tex`.
    pub async fn compile_single(&self, file_name: &str, source: &[u8]) -> CompilationResult {
        if !file_name.ends_with(".tex") {
            warn!(file_name = %file_name, "File must have .tex extension");
            return Compilation::new(Path::new("")).fail(FailureKind::NoEntryFile);
        }

        let workdir = match new_workdir() {
            Ok(dir) => dir,
            Err(e) => return internal_error(&e),
        };
        let entry_path = workdir.path().join("main.tex");
        if let Err(e) = tokio::fs::write(&entry_path, source).await {
            return internal_error(&e);
        }

        let run = Compilation::new(workdir.path());
        let span = run.span.clone();
        let mut result = self.run_entry(run, &entry_path).instrument(span).await;
        if let Some(artifact) = result.artifact.as_mut() {
            let stem = Path::new(file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string());
            artifact.file_name = format!("{stem}.pdf");
        }
        result
    }

    /// Compile an already materialized project.
    pub async fn compile_in(
        &self,
        project: &MaterializedProject,
        tree: &ProjectTree,
        main_file: Option<&str>,
    ) -> CompilationResult {
        let mut run = Compilation::new(&project.root);
        run.skipped = project.skipped.clone();
        let span = run.span.clone();

        async move {
            if project.is_empty() {
                warn!(skipped = project.skipped.len(), "No documents were written");
                return run.fail(FailureKind::NoEntryFile);
            }
            let entry_path = match resolve_entry(tree, &project.paths, main_file) {
                Ok(path) => path,
                Err(_) => return run.fail(FailureKind::NoEntryFile),
            };
            info!(entry = %entry_path.display(), "Using main file");
            self.run_entry(run, &entry_path).await
        }
        .instrument(span)
        .await
    }

    async fn run_entry(&self, mut run: Compilation, entry_path: &Path) -> CompilationResult {
        run.entry = Some(
            entry_path
                .strip_prefix(&run.root)
                .unwrap_or(entry_path)
                .to_path_buf(),
        );

        let entry = match ResolvedEntry::load(entry_path) {
            Ok(entry) => entry,
            Err(e) => {
                return run.fail(FailureKind::InternalError {
                    message: e.to_string(),
                })
            }
        };

        match validate_source(entry.content()) {
            Ok(()) => {}
            Err(CompileError::UnsafeContent { construct }) => {
                return run.fail(FailureKind::UnsafeContent { construct })
            }
            Err(e) => {
                return run.fail(FailureKind::InternalError {
                    message: e.to_string(),
                })
            }
        }

        let engine = select_engine(entry.content());
        run.engine = Some(engine);
        emit_compile_started(
            &run.request_id.to_string(),
            &entry.file_name(),
            engine.name(),
        );

        let runner = PassRunner::new(&self.config);
        let working_dir = entry.working_dir();
        let entry_file = entry.file_name();
        let timeout = self.config.pass_timeout();

        info!("Running first compilation pass");
        let first = runner.run(engine, working_dir, &entry_file, 1, timeout).await;
        let failure = pass_failure(&first);
        run.record_pass(first);
        if let Some(kind) = failure {
            return run.fail(kind);
        }

        let decision = BibliographyStage::new(&self.config)
            .maybe_run(working_dir, &entry.stem())
            .await;
        emit_bibliography_decided(
            &run.request_id.to_string(),
            &decision.summary(),
            decision.ran(),
        );
        if let BibliographyDecision::Unsuccessful { .. } = decision {
            run.warn("Could not run bibliography processor; references may be unresolved".into());
        }
        run.transcript.push_bibliography(&decision);
        let bibliography_ran = decision.ran();
        run.bibliography = Some(decision);

        info!("Running second compilation pass");
        let second = runner.run(engine, working_dir, &entry_file, 2, timeout).await;
        let failure = pass_failure(&second);
        run.record_pass(second);
        if let Some(kind) = failure {
            return run.fail(kind);
        }

        if bibliography_ran {
            info!("Running third compilation pass (after bibliography)");
            let third = runner.run(engine, working_dir, &entry_file, 3, timeout).await;
            let status = third.output.status.clone();
            let succeeded = third.success();
            run.record_pass(third);
            if !succeeded {
                let message =
                    format!("Third compilation {status}, but continuing with existing PDF");
                run.transcript.push_warning(message.clone());
                run.warn(message);
            }
        }

        let artifact_path = entry.artifact_path();
        let artifact_name = format!("{}.pdf", entry.stem());
        if !artifact_path.is_file() {
            return run.fail(FailureKind::ArtifactMissing {
                expected: artifact_name,
            });
        }

        match tokio::fs::read(&artifact_path).await {
            Ok(bytes) => run.succeed(Artifact::new(artifact_name, bytes)),
            Err(e) => run.fail(FailureKind::InternalError {
                message: format!("failed to read {}: {e}", artifact_path.display()),
            }),
        }
    }
}

/// `<name>.pdf` when `name` is exactly one normal path component.
fn project_artifact_name(name: &str) -> Option<String> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(stem)), None) => Some(format!("{}.pdf", stem.to_string_lossy())),
        _ => None,
    }
}

fn new_workdir() -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix("texbuild-").tempdir()
}

fn internal_error(e: &dyn std::fmt::Display) -> CompilationResult {
    Compilation::new(Path::new("")).fail(FailureKind::InternalError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ProcessOutput, ProcessStatus};

    fn outcome(pass: u8, status: ProcessStatus) -> PassOutcome {
        PassOutcome {
            pass,
            engine: EngineChoice::Pdflatex,
            timeout_secs: 120,
            output: ProcessOutput {
                name: "pdflatex".to_string(),
                command: "pdflatex -interaction=nonstopmode main.tex".to_string(),
                status,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 5,
            },
        }
    }

    #[test]
    fn test_pass_failure_classification() {
        assert_eq!(pass_failure(&outcome(1, ProcessStatus::Exited { code: 0 })), None);
        assert_eq!(
            pass_failure(&outcome(2, ProcessStatus::Exited { code: 1 })),
            Some(FailureKind::CompileFailed { pass: 2 })
        );
        assert_eq!(
            pass_failure(&outcome(1, ProcessStatus::TimedOut { limit_secs: 120 })),
            Some(FailureKind::Timeout {
                stage: PipelineStage::Pass(1)
            })
        );
        assert_eq!(
            pass_failure(&outcome(
                1,
                ProcessStatus::Failed {
                    reason: "No such file or directory".to_string()
                }
            )),
            Some(FailureKind::CompileFailed { pass: 1 })
        );
    }

    #[test]
    fn test_project_artifact_name_rejects_path_components() {
        assert_eq!(project_artifact_name("paper"), Some("paper.pdf".to_string()));
        assert_eq!(project_artifact_name("My Thesis"), Some("My Thesis.pdf".to_string()));
        assert_eq!(project_artifact_name("../../tmp/evil"), None);
        assert_eq!(project_artifact_name("/etc/evil"), None);
        assert_eq!(project_artifact_name("chapters/paper"), None);
        assert_eq!(project_artifact_name(".."), None);
        assert_eq!(project_artifact_name("."), None);
        assert_eq!(project_artifact_name(""), None);
    }

    #[test]
    fn test_artifact_digest() {
        let artifact = Artifact::new("paper.pdf", b"%PDF-1.5".to_vec());
        assert_eq!(artifact.size_bytes, 8);
        assert_eq!(artifact.sha256.len(), 64);
        assert_eq!(artifact, Artifact::new("paper.pdf", b"%PDF-1.5".to_vec()));
    }

    #[test]
    fn test_status_serde_shape() {
        let json = serde_json::to_value(CompileStatus::Failed(FailureKind::CompileFailed {
            pass: 2,
        }))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "failed", "failure": {"kind": "compile_failed", "pass": 2}})
        );
        let json = serde_json::to_value(CompileStatus::Success).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success"}));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            FailureKind::Timeout {
                stage: PipelineStage::Pass(2)
            }
            .to_string(),
            "compilation timeout during pass_2"
        );
        assert!(FailureKind::ArtifactMissing {
            expected: "main.pdf".to_string()
        }
        .to_string()
        .contains("main.pdf"));
    }

    #[tokio::test]
    async fn test_compile_single_rejects_non_tex_upload() {
        let pipeline = CompilePipeline::default();
        let result = pipeline.compile_single("notes.txt", b"hello").await;
        assert_eq!(result.failure(), Some(&FailureKind::NoEntryFile));
        assert!(result.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_project_with_only_unsafe_names_has_no_entry() {
        let tree = texbuild_core::ProjectTree::root("thesis").with_file(
            texbuild_core::SourceDocument::new("m", "../main.tex", "tex", "\\documentclass{article}"),
        );
        let result = CompilePipeline::default().compile_project(&tree, None).await;
        assert_eq!(result.failure(), Some(&FailureKind::NoEntryFile));
        assert_eq!(result.skipped.len(), 1);
        assert!(result.passes.is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_content_fails_before_any_pass() {
        let pipeline = CompilePipeline::default();
        let result = pipeline
            .compile_single("evil.tex", b"\\immediate\\write18{rm -rf /}")
            .await;
        assert!(matches!(
            result.failure(),
            Some(FailureKind::UnsafeContent { .. })
        ));
        assert!(result.passes.is_empty());
        assert!(result.engine.is_none());
    }
}
