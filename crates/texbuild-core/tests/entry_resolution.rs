//! Materialize a project on disk, then resolve and gate its entry document.

use texbuild_core::{
    materialize, resolve_entry, select_engine, validate_source, CompileError, EngineChoice,
    ProjectTree, ResolvedEntry, SourceDocument,
};

fn tex(id: &str, name: &str, content: &str) -> SourceDocument {
    SourceDocument::new(id, name, "tex", content)
}

#[test]
fn test_nested_project_resolves_conventional_entry() {
    let dir = tempfile::tempdir().unwrap();
    let tree = ProjectTree::root("thesis")
        .with_file(tex("pre", "preamble.tex", "\\usepackage{fontspec}"))
        .with_file(SourceDocument::new("bib", "refs.bib", "bib", "@book{k,}"))
        .with_subfolder(
            ProjectTree::folder("src")
                .with_file(tex("t", "Thesis.tex", "\\documentclass{report}\\usepackage{fontspec}")),
        );

    let project = materialize(&tree, dir.path()).unwrap();
    let path = resolve_entry(&tree, &project.paths, None).unwrap();
    assert_eq!(path, dir.path().join("src").join("Thesis.tex"));

    let entry = ResolvedEntry::load(&path).unwrap();
    validate_source(entry.content()).unwrap();
    assert_eq!(select_engine(entry.content()), EngineChoice::Xelatex);
    assert_eq!(entry.artifact_path(), dir.path().join("src").join("Thesis.pdf"));
}

#[test]
fn test_skipped_documents_never_become_entries() {
    let dir = tempfile::tempdir().unwrap();
    let tree = ProjectTree::root("p")
        .with_file(tex("evil", "../main.tex", "\\documentclass{article}"))
        .with_file(tex("ok", "notes.tex", "plain"));

    let project = materialize(&tree, dir.path()).unwrap();
    let path = resolve_entry(&tree, &project.paths, Some("../main.tex")).unwrap();
    assert_eq!(path, dir.path().join("notes.tex"));
}

#[test]
fn test_project_without_tex_sources() {
    let dir = tempfile::tempdir().unwrap();
    let tree = ProjectTree::root("p")
        .with_file(SourceDocument::new("i", "figure.png", "png", "binary"))
        .with_file(SourceDocument::new("b", "refs.bib", "bib", ""));

    let project = materialize(&tree, dir.path()).unwrap();
    assert_eq!(project.paths.len(), 2);
    assert!(matches!(
        resolve_entry(&tree, &project.paths, Some("main.tex")),
        Err(CompileError::NoEntryFile)
    ));
}

#[test]
fn test_resolution_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let tree = ProjectTree::root("p")
        .with_file(tex("a", "a.tex", "no class"))
        .with_subfolder(ProjectTree::folder("x").with_file(tex("b", "b.tex", "none")))
        .with_file(tex("c", "c.tex", "\\documentclass{article}"));

    let project = materialize(&tree, dir.path()).unwrap();
    let first = resolve_entry(&tree, &project.paths, None).unwrap();
    for _ in 0..5 {
        assert_eq!(resolve_entry(&tree, &project.paths, None).unwrap(), first);
    }
    assert_eq!(first, dir.path().join("c.tex"));
}
