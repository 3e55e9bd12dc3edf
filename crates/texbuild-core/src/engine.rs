//! Engine variants and the heuristic that picks one from the entry text.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Typesetting engine variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EngineChoice {
    /// Standard 8-bit engine.
    Pdflatex,

    /// Native Unicode and system font engine.
    Xelatex,

    /// Lua-programmable engine.
    Lualatex,
}

impl EngineChoice {
    pub const ALL: [EngineChoice; 3] = [
        EngineChoice::Pdflatex,
        EngineChoice::Xelatex,
        EngineChoice::Lualatex,
    ];

    /// Conventional binary name.
    pub fn name(&self) -> &'static str {
        match self {
            EngineChoice::Pdflatex => "pdflatex",
            EngineChoice::Xelatex => "xelatex",
            EngineChoice::Lualatex => "lualatex",
        }
    }
}

impl std::fmt::Display for EngineChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for EngineChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EngineChoice::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown engine: {s}"))
    }
}

/// Packages that only work under xelatex.
pub const UNICODE_ENGINE_PACKAGES: [&str; 4] = ["fontspec", "xltxtra", "xunicode", "polyglossia"];

/// Packages that only work under lualatex.
pub const PROGRAMMABLE_ENGINE_PACKAGES: [&str; 3] = ["luacode", "luatextra", "luamplib"];

/// Font selection commands provided by fontspec.
pub const FONT_SELECTION_COMMANDS: [&str; 3] = ["\\setmainfont", "\\setsansfont", "\\setmonofont"];

fn package_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\\(?:usepackage|RequirePackage)\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}")
            .expect("package directive pattern is valid")
    })
}

/// Names of all packages loaded by `\usepackage` / `\RequirePackage`.
pub fn referenced_packages(source: &str) -> BTreeSet<String> {
    package_directive()
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .flat_map(|list| list.as_str().split(','))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Choose the engine for `source`. Package declarations are checked before
/// the character and font heuristics.
pub fn select_engine(source: &str) -> EngineChoice {
    let packages = referenced_packages(source);
    let references_any = |names: &[&str]| names.iter().any(|n| packages.contains(*n));

    if references_any(&UNICODE_ENGINE_PACKAGES) {
        return EngineChoice::Xelatex;
    }
    if references_any(&PROGRAMMABLE_ENGINE_PACKAGES) {
        return EngineChoice::Lualatex;
    }
    if !source.is_ascii() {
        return EngineChoice::Xelatex;
    }
    if FONT_SELECTION_COMMANDS.iter().any(|c| source.contains(c)) {
        return EngineChoice::Xelatex;
    }
    EngineChoice::Pdflatex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_is_pdflatex() {
        let src = "\\documentclass{article}\\usepackage{amsmath}\\begin{document}x\\end{document}";
        assert_eq!(select_engine(src), EngineChoice::Pdflatex);
    }

    #[test]
    fn test_unicode_packages_select_xelatex() {
        for pkg in UNICODE_ENGINE_PACKAGES {
            let src = format!("\\usepackage{{{pkg}}}");
            assert_eq!(select_engine(&src), EngineChoice::Xelatex, "{pkg}");
        }
    }

    #[test]
    fn test_programmable_packages_select_lualatex() {
        for pkg in PROGRAMMABLE_ENGINE_PACKAGES {
            let src = format!("\\usepackage{{{pkg}}}");
            assert_eq!(select_engine(&src), EngineChoice::Lualatex, "{pkg}");
        }
    }

    #[test]
    fn test_programmable_package_beats_non_ascii() {
        let src = "\\usepackage{luacode}\n\\begin{document}Größe\\end{document}";
        assert_eq!(select_engine(src), EngineChoice::Lualatex);
    }

    #[test]
    fn test_unicode_package_beats_programmable_package() {
        let src = "\\usepackage{luacode}\n\\usepackage{fontspec}";
        assert_eq!(select_engine(src), EngineChoice::Xelatex);
    }

    #[test]
    fn test_non_ascii_selects_xelatex() {
        assert_eq!(select_engine("\\section{Résumé}"), EngineChoice::Xelatex);
    }

    #[test]
    fn test_font_command_selects_xelatex() {
        assert_eq!(
            select_engine("\\setmonofont{Fira Code}"),
            EngineChoice::Xelatex
        );
    }

    #[test]
    fn test_options_and_package_lists() {
        let pkgs = referenced_packages("\\usepackage[utf8]{inputenc}\n\\usepackage{amsmath, luamplib}");
        assert!(pkgs.contains("inputenc"));
        assert!(pkgs.contains("amsmath"));
        assert!(pkgs.contains("luamplib"));
        assert_eq!(
            select_engine("\\usepackage[no-math]{ fontspec }"),
            EngineChoice::Xelatex
        );
    }

    #[test]
    fn test_selection_is_deterministic() {
        let src = "\\usepackage{polyglossia}ü";
        assert_eq!(select_engine(src), select_engine(src));
    }

    #[test]
    fn test_engine_from_str_and_display() {
        assert_eq!("XeLaTeX".parse::<EngineChoice>().unwrap(), EngineChoice::Xelatex);
        assert!("context".parse::<EngineChoice>().is_err());
        assert_eq!(EngineChoice::Lualatex.to_string(), "lualatex");
    }
}
