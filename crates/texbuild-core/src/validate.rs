//! Gate on the entry text before any engine runs.

use crate::error::{CompileError, Result};

/// Shell-escape, pipe input and raw file-handle directives.
pub const FORBIDDEN_CONSTRUCTS: [&str; 5] = [
    "\\write18",
    "\\immediate\\write18",
    "\\input{|",
    "\\openin",
    "\\openout",
];

/// Reject `source` if it contains any forbidden construct.
pub fn validate_source(source: &str) -> Result<()> {
    match FORBIDDEN_CONSTRUCTS.iter().find(|c| source.contains(*c)) {
        Some(construct) => Err(CompileError::UnsafeContent {
            construct: (*construct).to_string(),
        }),
        None => Ok(()),
    }
}
