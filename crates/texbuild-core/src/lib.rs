//! texbuild Core Library
//!
//! Domain model and the pure decision logic of a texbuild compilation:
//! - `ProjectTree` / `SourceDocument`: the virtual project as received
//! - `materialize`: writes a tree onto a working directory
//! - `entry`: picks the entry document
//! - `validate`: rejects shell-escape and raw file-handle constructs
//! - `engine`: picks pdflatex / xelatex / lualatex from the source text

pub mod domain;
pub mod engine;
pub mod entry;
pub mod error;
pub mod materialize;
pub mod obs;
pub mod telemetry;
pub mod validate;

pub use domain::{decode_lossy, ProjectTree, ResolvedEntry, SourceDocument};
pub use engine::{select_engine, EngineChoice};
pub use entry::{collect_candidates, resolve_entry, CONVENTIONAL_ENTRY_NAMES};
pub use error::{CompileError, Result};
pub use materialize::{is_safe_name, materialize, MaterializedProject, SkippedDocument};
pub use obs::{
    compile_span, emit_bibliography_decided, emit_compile_finished, emit_compile_started,
    emit_pass_finished,
};
pub use telemetry::{init_tracing, LogFormat};
pub use validate::{validate_source, FORBIDDEN_CONSTRUCTS};

/// texbuild version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
