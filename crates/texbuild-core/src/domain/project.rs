//! Virtual project tree as received from a client.

use serde::{Deserialize, Serialize};

/// A single file of a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDocument {
    /// Client-assigned identifier, key of the materialized path mapping.
    pub id: String,

    /// Folder this document belongs to.
    #[serde(default)]
    pub folder_id: String,

    /// Relative path segment, e.g. `main.tex` or `figures/plot.tex`.
    pub name: String,

    /// Declared format (`tex`, `bib`, `png`, ...).
    pub format: String,

    /// Textual content.
    #[serde(default)]
    pub content: String,

    /// Origin URL, if the client has one.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, rename = "projectId")]
    pub project_id: Option<String>,
}

impl SourceDocument {
    /// Create a document with the given id, name and format.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        format: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            folder_id: String::new(),
            name: name.into(),
            format: format.into(),
            content: content.into(),
            url: None,
            project_id: None,
        }
    }

    /// Whether the declared format marks this document as a compilable source.
    pub fn is_tex_source(&self) -> bool {
        self.format.eq_ignore_ascii_case("tex")
    }
}

/// A folder node. Children are owned, so a tree cannot contain cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectTree {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub files: Vec<SourceDocument>,

    /// The root folder maps onto the working directory itself.
    #[serde(default)]
    pub is_root: bool,

    #[serde(default)]
    pub subfolders: Vec<ProjectTree>,
}

impl ProjectTree {
    /// Create an empty root folder.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_root: true,
            ..Self::default()
        }
    }

    /// Create an empty non-root folder.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: append a file.
    pub fn with_file(mut self, doc: SourceDocument) -> Self {
        self.files.push(doc);
        self
    }

    /// Builder: append a subfolder.
    pub fn with_subfolder(mut self, folder: ProjectTree) -> Self {
        self.subfolders.push(folder);
        self
    }

    /// Parse the JSON project shape.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All documents in depth-first order, each folder's files before its subfolders.
    pub fn documents(&self) -> Vec<&SourceDocument> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(folder) = stack.pop() {
            out.extend(folder.files.iter());
            // reversed so the first subfolder is visited first
            stack.extend(folder.subfolders.iter().rev());
        }
        out
    }
}
