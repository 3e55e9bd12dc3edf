//! Entry document resolution.
//!
//! Strictly ordered rules, first match wins:
//! 1. explicit hint (exact name match)
//! 2. conventional names, in list order
//! 3. first candidate declaring `\documentclass` within its first 1000 chars
//! 4. first candidate in traversal order

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::domain::{ProjectTree, SourceDocument};
use crate::error::{CompileError, Result};

/// Conventional entry names, matched case-insensitively in this order.
pub const CONVENTIONAL_ENTRY_NAMES: [&str; 4] =
    ["main.tex", "document.tex", "paper.tex", "thesis.tex"];

const DOCUMENT_CLASS_MARKER: &str = "\\documentclass";
const DOCUMENT_CLASS_SCAN_CHARS: usize = 1000;

/// Every materialized `.tex` document paired with its on-disk path, in
/// traversal order (a folder's files before its subfolders).
pub fn collect_candidates<'a>(
    tree: &'a ProjectTree,
    paths: &BTreeMap<String, PathBuf>,
) -> Vec<(&'a SourceDocument, PathBuf)> {
    tree.documents()
        .into_iter()
        .filter(|doc| doc.is_tex_source())
        .filter_map(|doc| paths.get(&doc.id).map(|p| (doc, p.clone())))
        .collect()
}

/// Pick the compilation root of `tree`.
pub fn resolve_entry(
    tree: &ProjectTree,
    paths: &BTreeMap<String, PathBuf>,
    hint: Option<&str>,
) -> Result<PathBuf> {
    let candidates = collect_candidates(tree, paths);
    if candidates.is_empty() {
        return Err(CompileError::NoEntryFile);
    }

    if let Some(hint) = hint {
        if let Some((_, path)) = candidates.iter().find(|(doc, _)| doc.name == hint) {
            debug!(hint = %hint, "Entry resolved by explicit hint");
            return Ok(path.clone());
        }
        warn!(hint = %hint, "Specified main file not found");
    }

    for conventional in CONVENTIONAL_ENTRY_NAMES {
        if let Some((_, path)) = candidates
            .iter()
            .find(|(doc, _)| doc.name.eq_ignore_ascii_case(conventional))
        {
            debug!(name = conventional, "Entry resolved by conventional name");
            return Ok(path.clone());
        }
    }

    if let Some((doc, path)) = candidates
        .iter()
        .find(|(doc, _)| declares_document_class(&doc.content))
    {
        debug!(name = %doc.name, "Entry resolved by \\documentclass marker");
        return Ok(path.clone());
    }

    let (doc, path) = &candidates[0];
    debug!(name = %doc.name, "Entry resolved by traversal order");
    Ok(path.clone())
}

fn declares_document_class(content: &str) -> bool {
    let head: String = content.chars().take(DOCUMENT_CLASS_SCAN_CHARS).collect();
    head.contains(DOCUMENT_CLASS_MARKER)
}
