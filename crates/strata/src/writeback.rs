//! Write prompted values back into a settings file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Append `entries` as `key = value` lines at the end of `section` (or
/// into the common scope when no section is given), creating the file
/// or the section header as needed.
pub fn append_settings(
    path: &Path,
    section: Option<&str>,
    entries: &[(String, String)],
) -> Result<()> {
    let original = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    } else {
        String::new()
    };
    let updated = insert_entries(&original, section, entries);
    fs::write(path, updated).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn insert_entries(original: &str, section: Option<&str>, entries: &[(String, String)]) -> String {
    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
    let rendered: Vec<String> = entries
        .iter()
        .map(|(key, value)| format!("{key} = {value}"))
        .collect();

    match section {
        Some(name) => {
            let header = format!("[{name}]");
            if let Some(pos) = lines.iter().position(|l| l.trim() == header) {
                let end = lines[pos + 1..]
                    .iter()
                    .position(|l| is_header(l))
                    .map(|offset| pos + 1 + offset)
                    .unwrap_or(lines.len());
                for (i, line) in rendered.into_iter().enumerate() {
                    lines.insert(end + i, line);
                }
            } else {
                if !lines.is_empty() {
                    lines.push(String::new());
                }
                lines.push(header);
                lines.extend(rendered);
            }
        }
        None => {
            // The common scope ends at the first section header.
            let pos = lines.iter().position(|l| is_header(l)).unwrap_or(lines.len());
            for (i, line) in rendered.into_iter().enumerate() {
                lines.insert(pos + i, line);
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn is_header(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('[') && trimmed.ends_with(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn appends_to_the_named_section() {
        let original = "[dev]\nA = 1\n[prod]\nB = 2\n";
        let updated = insert_entries(original, Some("dev"), &entries(&[("C", "3")]));
        assert_eq!(updated, "[dev]\nA = 1\nC = 3\n[prod]\nB = 2\n");
    }

    #[test]
    fn appends_to_the_last_section_at_eof() {
        let original = "[prod]\nB = 2\n";
        let updated = insert_entries(original, Some("prod"), &entries(&[("C", "3")]));
        assert_eq!(updated, "[prod]\nB = 2\nC = 3\n");
    }

    #[test]
    fn creates_a_missing_section() {
        let original = "[dev]\nA = 1\n";
        let updated = insert_entries(original, Some("prod"), &entries(&[("B", "2")]));
        assert_eq!(updated, "[dev]\nA = 1\n\n[prod]\nB = 2\n");
    }

    #[test]
    fn common_scope_lands_before_the_first_header() {
        let original = "A = 1\n[dev]\nB = 2\n";
        let updated = insert_entries(original, None, &entries(&[("C", "3")]));
        assert_eq!(updated, "A = 1\nC = 3\n[dev]\nB = 2\n");
    }

    #[test]
    fn empty_file_gets_header_and_entries() {
        let updated = insert_entries("", Some("prod"), &entries(&[("A", "1")]));
        assert_eq!(updated, "[prod]\nA = 1\n");
    }

    #[test]
    fn roundtrips_through_the_writer_helper() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("local.cfg");
        append_settings(&path, Some("prod"), &entries(&[("A", "1")])).expect("append");
        append_settings(&path, Some("prod"), &entries(&[("B", "\"x\"")])).expect("append");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text, "[prod]\nA = 1\nB = \"x\"\n");
    }
}
