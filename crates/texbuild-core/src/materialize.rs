//! Writes a `ProjectTree` onto a working directory.
//!
//! Every non-root folder becomes a directory, every document a file. Documents
//! whose name would escape the root, or that cannot be written, are skipped
//! with a warning and left out of the path mapping.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::ProjectTree;
use crate::error::Result;

/// A document that was not written.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedDocument {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// The populated working directory handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MaterializedProject {
    /// Working directory root.
    pub root: PathBuf,

    /// Document id -> on-disk path, for every document that was written.
    pub paths: BTreeMap<String, PathBuf>,

    /// Documents left out, in traversal order.
    pub skipped: Vec<SkippedDocument>,
}

impl MaterializedProject {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Whether `name` resolves to a path strictly inside the project root.
///
/// Rejects empty names, absolute paths and any `..` component.
pub fn is_safe_name(name: &str) -> bool {
    let mut has_normal = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    has_normal
}

/// Materialize `tree` under `root`, which must already exist.
pub fn materialize(tree: &ProjectTree, root: &Path) -> Result<MaterializedProject> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("working directory {} does not exist", root.display()),
        )
        .into());
    }

    let mut project = MaterializedProject {
        root: root.to_path_buf(),
        ..MaterializedProject::default()
    };
    write_folder(tree, root, &mut project);

    info!(
        written = project.paths.len(),
        skipped = project.skipped.len(),
        root = %root.display(),
        "Materialized project"
    );
    Ok(project)
}

fn write_folder(folder: &ProjectTree, parent: &Path, project: &mut MaterializedProject) {
    let dir = if folder.is_root {
        parent.to_path_buf()
    } else {
        if !is_safe_name(&folder.name) {
            warn!(folder = %folder.name, "Skipping unsafe folder name");
            skip_subtree(folder, "unsafe folder name", project);
            return;
        }
        let dir = parent.join(&folder.name);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(folder = %dir.display(), error = %e, "Failed to create folder");
            skip_subtree(folder, "folder could not be created", project);
            return;
        }
        dir
    };

    for doc in &folder.files {
        if !is_safe_name(&doc.name) {
            warn!(name = %doc.name, "Skipping unsafe file path");
            project.skipped.push(SkippedDocument {
                id: doc.id.clone(),
                name: doc.name.clone(),
                reason: "unsafe file path".to_string(),
            });
            continue;
        }

        let path = dir.join(&doc.name);
        let written = path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&path, doc.content.as_bytes()));

        match written {
            Ok(()) => {
                debug!(path = %path.display(), "Created file");
                project.paths.insert(doc.id.clone(), path);
            }
            Err(e) => {
                warn!(name = %doc.name, error = %e, "Error creating file");
                project.skipped.push(SkippedDocument {
                    id: doc.id.clone(),
                    name: doc.name.clone(),
                    reason: format!("write failed: {e}"),
                });
            }
        }
    }

    for sub in &folder.subfolders {
        write_folder(sub, &dir, project);
    }
}

fn skip_subtree(folder: &ProjectTree, reason: &str, project: &mut MaterializedProject) {
    for doc in folder.documents() {
        project.skipped.push(SkippedDocument {
            id: doc.id.clone(),
            name: doc.name.clone(),
            reason: reason.to_string(),
        });
    }
}
