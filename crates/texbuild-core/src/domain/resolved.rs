//! The entry document chosen for a compilation request.

use std::path::{Path, PathBuf};

use crate::domain::decode_lossy;
use crate::error::{CompileError, Result};

/// On-disk entry path plus its text as read at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    path: PathBuf,
    content: String,
}

impl ResolvedEntry {
    /// Read the entry from disk, decoding lossily.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = std::fs::read(&path).map_err(|source| CompileError::ReadEntry {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            content: decode_lossy(&bytes),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Directory the engine runs in.
    pub fn working_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// File name handed to the engine, e.g. `main.tex`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Base name without extension, e.g. `main`.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Where the engine writes the PDF for this entry.
    pub fn artifact_path(&self) -> PathBuf {
        self.working_dir().join(format!("{}.pdf", self.stem()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_reads_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chapters").join("thesis.tex");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\\documentclass{report}\xfe").unwrap();

        let entry = ResolvedEntry::load(&path).unwrap();
        assert!(entry.content().starts_with("\\documentclass{report}"));
        assert_eq!(entry.file_name(), "thesis.tex");
        assert_eq!(entry.stem(), "thesis");
        assert_eq!(entry.working_dir(), dir.path().join("chapters"));
        assert_eq!(
            entry.artifact_path(),
            dir.path().join("chapters").join("thesis.pdf")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = ResolvedEntry::load(dir.path().join("nope.tex")).unwrap_err();
        assert!(matches!(err, CompileError::ReadEntry { .. }));
    }
}
