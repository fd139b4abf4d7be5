//! Prompt templates for the generative backend.
//!
//! Built-in templates live in `prompts/` at the crate root and are compiled
//! in; a file with the same name in a runtime `prompts/` directory overrides
//! the built-in text.

use std::path::PathBuf;

use crate::{Error, Result};

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Spelling/jargon correction of a free-text query.
    QueryCorrection,
    /// Staged entity + relationship extraction.
    GraphPrimary,
    /// Entities-only extraction.
    GraphFallback,
}

impl Prompt {
    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::QueryCorrection => "query_correction.md",
            Prompt::GraphPrimary => "graph_primary.md",
            Prompt::GraphFallback => "graph_fallback.md",
        }
    }

    /// Template compiled into the binary.
    pub fn builtin(&self) -> &'static str {
        match self {
            Prompt::QueryCorrection => include_str!("../prompts/query_correction.md"),
            Prompt::GraphPrimary => include_str!("../prompts/graph_primary.md"),
            Prompt::GraphFallback => include_str!("../prompts/graph_fallback.md"),
        }
    }

    /// Load the template, preferring an on-disk override.
    pub fn load(&self) -> String {
        load_prompt(self.filename()).unwrap_or_else(|_| self.builtin().to_string())
    }

    /// Load and substitute `{name}` placeholders.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut text = self.load();
        for (name, value) in vars {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path).map_err(|e| {
        Error::InvalidInput(format!("Failed to load prompt {}: {}", filename, e))
    })
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}

/// All known prompts.
pub fn list_prompts() -> Vec<Prompt> {
    vec![
        Prompt::QueryCorrection,
        Prompt::GraphPrimary,
        Prompt::GraphFallback,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompt_filenames_are_md() {
        for prompt in list_prompts() {
            assert!(
                prompt.filename().ends_with(".md"),
                "Prompt {:?} should have .md extension",
                prompt
            );
        }
    }

    #[test]
    fn test_builtin_templates_carry_placeholders() {
        assert!(Prompt::QueryCorrection.builtin().contains("{query}"));
        assert!(Prompt::GraphPrimary.builtin().contains("{context}"));
        assert!(Prompt::GraphFallback.builtin().contains("{context}"));
    }

    #[test]
    fn test_render_substitutes_values() {
        let text = Prompt::QueryCorrection.render(&[("query", "asprin")]);
        assert!(text.contains("\"asprin\""));
        assert!(!text.contains("{query}"));
    }

    #[test]
    fn test_render_keeps_json_braces() {
        let text = Prompt::GraphPrimary.render(&[("context", "From article pmid:1")]);
        assert!(text.contains("\"nodes\""));
        assert!(text.contains("\"links\""));
        assert!(text.ends_with("From article pmid:1\n"));
    }

    #[test]
    fn test_fallback_prompt_asks_no_pmid() {
        assert!(!Prompt::GraphFallback.builtin().contains("pmid"));
    }

    #[test]
    fn test_load_prompt_nonexistent_file() {
        assert!(load_prompt("nonexistent_file_12345.md").is_err());
    }
}
