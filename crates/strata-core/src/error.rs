//! The engine's error surface.
//!
//! Lexical, syntactic, and cycle errors abort a resolution run
//! immediately; missing placeholders are accumulated and reported once
//! as [`Error::MissingSettings`]. Every variant is meant to be shown to
//! the person configuring an environment, so each carries the file,
//! position, path, or chain it is about.

use crate::path::{PathError, PathSyntaxError};
use crate::placeholder::PlaceholderKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", file.display())]
    Parse {
        file: PathBuf,
        source: strata_lax::ParseError,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    PathSyntax(#[from] PathSyntaxError),

    #[error("circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("extends cycle: {}", chain.join(" -> "))]
    ExtendsCycle { chain: Vec<String> },

    #[error("settings file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("section `{section}` not found in {} or its ancestors", file.display())]
    SectionNotFound { file: PathBuf, section: String },

    #[error("`extends` declared more than once in {} (line {line})", file.display())]
    DuplicateExtends { file: PathBuf, line: u32 },

    #[error("invalid value for `{path}`: {reason}")]
    Validation { path: String, reason: String },

    #[error("{}", missing_summary(.0))]
    MissingSettings(Vec<MissingSetting>),

    #[error("secret placeholder `{path}` must use a generated default, not a literal")]
    SecretDefault { path: String },

    #[error("swap item `{item}` not found in list `{path}`")]
    SwapItemNotFound { path: String, item: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One placeholder left unresolved after every source was consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSetting {
    pub path: String,
    pub kind: PlaceholderKind,
    /// The declared doc string, shown so the aggregate error is actionable.
    pub doc: Option<String>,
    /// For Env placeholders, the environment variable that would satisfy it.
    pub env_var: Option<String>,
}

fn missing_summary(missing: &[MissingSetting]) -> String {
    let mut out = format!(
        "{} setting{} must be set:",
        missing.len(),
        if missing.len() == 1 { "" } else { "s" }
    );
    for entry in missing {
        out.push_str("\n  ");
        out.push_str(&entry.path);
        if let Some(var) = &entry.env_var {
            out.push_str(&format!(" (environment variable {var})"));
        }
        if let Some(doc) = &entry.doc {
            out.push_str(&format!(": {doc}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_lists_every_path() {
        let err = Error::MissingSettings(vec![
            MissingSetting {
                path: "SECRET_KEY".into(),
                kind: PlaceholderKind::Secret,
                doc: Some("session signing key".into()),
                env_var: None,
            },
            MissingSetting {
                path: "DATABASES.default.PASSWORD".into(),
                kind: PlaceholderKind::Local,
                doc: None,
                env_var: None,
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 settings must be set:"));
        assert!(text.contains("SECRET_KEY"));
        assert!(text.contains("session signing key"));
        assert!(text.contains("DATABASES.default.PASSWORD"));
    }

    #[test]
    fn circular_reference_names_the_chain() {
        let err = Error::CircularReference {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "circular reference: A -> B -> A");
    }
}
