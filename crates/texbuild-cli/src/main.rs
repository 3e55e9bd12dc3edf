//! texbuild - LaTeX project compilation CLI
//!
//! ## Commands
//!
//! - `compile`: Compile a project tree described as JSON
//! - `compile-single`: Compile one standalone `.tex` file
//! - `engines`: List which engines are installed
//! - `info`: Describe supported engines and features

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use texbuild_core::{EngineChoice, LogFormat, ProjectTree};
use texbuild_pipeline::{
    available_engines, detect_engines, CompilationResult, CompileConfig, CompilePipeline,
    FailureKind,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "texbuild")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-pass LaTeX project compilation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "TEXBUILD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the per-pass timeout
    #[arg(long, global = true, env = "TEXBUILD_PASS_TIMEOUT_SECS")]
    pass_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a project from structured folder data (JSON)
    Compile {
        /// Project JSON: a folder tree, or `{"project_data": ..., "main_file": ...}`
        #[arg(short, long)]
        project: PathBuf,

        /// Entry document name, overriding the request's `main_file`
        #[arg(short, long)]
        main: Option<String>,

        /// Where to write the PDF (default: `<project name>.pdf`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full result as JSON on stdout
        #[arg(long)]
        report: bool,
    },

    /// Compile a single .tex file
    CompileSingle {
        /// Source file
        file: PathBuf,

        /// Where to write the PDF (default: `<file stem>.pdf`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full result as JSON on stdout
        #[arg(long)]
        report: bool,
    },

    /// List installed engines
    Engines,

    /// Show supported engines and features
    Info,
}

/// Request body accepted by `compile`, next to a bare folder tree.
#[derive(Debug, Deserialize)]
struct CompileRequest {
    project_data: ProjectTree,
    #[serde(default)]
    main_file: Option<String>,
}

/// Parse a `compile` input into the tree and its optional entry hint.
fn parse_project(raw: &str) -> Result<(ProjectTree, Option<String>)> {
    if let Ok(request) = serde_json::from_str::<CompileRequest>(raw) {
        return Ok((request.project_data, request.main_file));
    }
    let tree = ProjectTree::from_json(raw).context("Project JSON is not a folder tree")?;
    Ok((tree, None))
}

/// JSON payload printed by `--report`.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    result: &'a CompilationResult,

    /// Failure message, absent on success.
    error: Option<String>,

    /// Rendered transcript.
    log: String,

    /// Where the PDF was written.
    output: Option<&'a Path>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    texbuild_core::init_tracing(format, level);

    let config = load_config(cli.config.as_deref(), cli.pass_timeout_secs)?;

    match cli.command {
        Commands::Compile {
            project,
            main,
            output,
            report,
        } => cmd_compile(config, &project, main, output, report).await,
        Commands::CompileSingle {
            file,
            output,
            report,
        } => cmd_compile_single(config, &file, output, report).await,
        Commands::Engines => cmd_engines(&config).await,
        Commands::Info => cmd_info(&config),
    }
}

/// File config (or defaults), then command-line and environment overrides.
fn load_config(path: Option<&Path>, pass_timeout_secs: Option<u64>) -> Result<CompileConfig> {
    let mut config = match path {
        Some(path) => CompileConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CompileConfig::default(),
    };
    if let Some(secs) = pass_timeout_secs {
        config.pass_timeout_secs = secs;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn cmd_compile(
    config: CompileConfig,
    project: &Path,
    main: Option<String>,
    output: Option<PathBuf>,
    report: bool,
) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(project)
        .with_context(|| format!("Failed to read project file {}", project.display()))?;
    let (tree, main_file) = parse_project(&raw)?;
    let main_file = main.or(main_file);

    let result = CompilePipeline::new(config)
        .compile_project(&tree, main_file.as_deref())
        .await;
    respond(&result, output, report)
}

async fn cmd_compile_single(
    config: CompileConfig,
    file: &Path,
    output: Option<PathBuf>,
    report: bool,
) -> Result<ExitCode> {
    let source =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = CompilePipeline::new(config)
        .compile_single(&file_name, &source)
        .await;
    respond(&result, output, report)
}

/// Write the artifact, then report the outcome on stdout or stderr.
fn respond(result: &CompilationResult, output: Option<PathBuf>, report: bool) -> Result<ExitCode> {
    let written = match &result.artifact {
        Some(artifact) => {
            let path = output.unwrap_or_else(|| default_output_path(&artifact.file_name));
            std::fs::write(&path, &artifact.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), size_bytes = artifact.size_bytes, "Wrote PDF");
            Some(path)
        }
        None => None,
    };

    if report {
        let payload = Report {
            result,
            error: result.failure().map(ToString::to_string),
            log: result.transcript.render(),
            output: written.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if let Some(kind) = result.failure() {
        eprintln!("Compilation failed: {kind}");
        if !result.transcript.is_empty() {
            eprintln!("{}", result.transcript);
        }
    } else {
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
        if let Some(path) = &written {
            println!("{}", path.display());
        }
    }

    Ok(ExitCode::from(
        result.failure().map(exit_code).unwrap_or(0),
    ))
}

/// PDF path in the current directory for an artifact name. Directory
/// components are dropped.
fn default_output_path(file_name: &str) -> PathBuf {
    Path::new(file_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output.pdf"))
}

/// Process exit code for a failure kind. Caller errors sort below
/// compilation errors.
fn exit_code(kind: &FailureKind) -> u8 {
    match kind {
        FailureKind::NoEntryFile => 2,
        FailureKind::UnsafeContent { .. } => 3,
        FailureKind::CompileFailed { .. } => 4,
        FailureKind::ArtifactMissing { .. } => 5,
        FailureKind::Timeout { .. } => 6,
        FailureKind::InternalError { .. } => 70,
    }
}

async fn cmd_engines(config: &CompileConfig) -> Result<ExitCode> {
    let detected = detect_engines(config).await;
    let available = available_engines(&detected);

    for engine in &detected {
        let status = if engine.available { "✓" } else { "✗" };
        match &engine.version {
            Some(version) => println!("  {} {} ({})", status, engine.engine, version),
            None => println!("  {} {} ({})", status, engine.engine, engine.binary),
        }
    }
    println!();
    println!(
        "Available: {}/{} engines",
        available.len(),
        EngineChoice::ALL.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_info(config: &CompileConfig) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&service_info(config))?);
    Ok(ExitCode::SUCCESS)
}

fn service_info(config: &CompileConfig) -> serde_json::Value {
    serde_json::json!({
        "service": "texbuild",
        "version": texbuild_core::VERSION,
        "commands": {
            "compile": "Compile a project from structured folder data (JSON)",
            "compile-single": "Compile a single .tex file",
        },
        "engines": EngineChoice::ALL
            .iter()
            .map(|e| serde_json::json!({"engine": e, "binary": config.engines.binary(*e)}))
            .collect::<Vec<_>>(),
        "bibliography_processors": config.bibliography_processors,
        "pass_timeout_secs": config.pass_timeout_secs,
        "features": [
            "Automatic engine detection (pdflatex/xelatex/lualatex)",
            "Bibliography processing (biber/bibtex)",
            "Multi-pass compilation for cross-references",
            "Project folder structure preservation",
            "Security validation",
        ],
    })
}
