//! Settings-file reading and `extends`-chain composition.
//!
//! A settings file is line-oriented: `;` / `#` / `//` comment lines,
//! `[section]` headers, and `dotted.path = value` assignments whose
//! values use the lax notation and may span multiple lines. Assignments
//! before any header are the file's *common* items and apply to every
//! section. An `extends = "path[#section]"` directive chains files;
//! composition walks the chain base-first and merges each file's items
//! over the accumulated document with overwrite / APPEND / PREPEND /
//! SWAP / DELETE semantics.

use crate::document::Document;
use crate::error::Error;
use crate::path::{Directive, DottedPath, PathError, PathSyntaxError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use strata_lax::{Dialect, Location, ParseError, Value};
use tracing::debug;

/// A settings file plus an optional section, written `path[#section]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub path: PathBuf,
    pub section: Option<String>,
}

impl FileSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSpec {
            path: path.into(),
            section: None,
        }
    }

    pub fn with_section(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        FileSpec {
            path: path.into(),
            section: Some(section.into()),
        }
    }

    /// Parse `local.cfg#prod` style text. A spec with an empty path
    /// (`#prod`) refers to another section of the extending file and is
    /// only meaningful inside `extends`.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once('#') {
            Some((path, section)) if !section.is_empty() => FileSpec {
                path: PathBuf::from(path),
                section: Some(section.to_string()),
            },
            _ => FileSpec::new(text),
        }
    }
}

impl fmt::Display for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "{}#{section}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, Clone)]
struct Assignment {
    key: String,
    value: Value,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    assignments: Vec<Assignment>,
    extends: Option<String>,
}

#[derive(Debug, Clone)]
struct ParsedFile {
    path: PathBuf,
    common: Scope,
    sections: Vec<(String, Scope)>,
}

impl ParsedFile {
    fn first_section_name(&self) -> Option<String> {
        self.sections.first().map(|(name, _)| name.clone())
    }

    fn section(&self, name: &str) -> Option<&Scope> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, scope)| scope)
    }
}

fn parse_settings_file(path: &Path, dialect: Dialect) -> Result<ParsedFile, Error> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let lines: Vec<&str> = text.lines().collect();
    let mut file = ParsedFile {
        path: path.to_path_buf(),
        common: Scope::default(),
        sections: Vec::new(),
    };
    let mut current: Option<String> = None;

    let mut i = 0;
    while i < lines.len() {
        let line_no = (i + 1) as u32;
        let raw = lines[i];
        let trimmed = raw.trim();
        i += 1;

        if trimmed.is_empty()
            || trimmed.starts_with(';')
            || trimmed.starts_with('#')
            || trimmed.starts_with("//")
        {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let name = trimmed[1..trimmed.len() - 1].trim().to_string();
            if file.section(&name).is_none() {
                file.sections.push((name.clone(), Scope::default()));
            }
            current = Some(name);
            continue;
        }

        let Some((key_part, value_part)) = raw.split_once('=') else {
            return Err(Error::Parse {
                file: path.to_path_buf(),
                source: ParseError::Unexpected {
                    location: Location {
                        line: line_no,
                        column: 1,
                        offset: 0,
                    },
                    expected: "a `key = value` assignment, `[section]`, or a comment".into(),
                    found: "a bare line".into(),
                },
            });
        };
        let key = key_part.trim().to_string();

        // Pad the consumed prefix with spaces so error columns line up
        // with the file.
        let mut value_text = " ".repeat(key_part.len() + 1);
        value_text.push_str(value_part);
        let mut extra = 0;
        let value = loop {
            match strata_lax::parse(&value_text, dialect) {
                Ok(value) => break value,
                Err(e) if e.is_eof() && i + extra < lines.len() => {
                    value_text.push('\n');
                    value_text.push_str(lines[i + extra]);
                    extra += 1;
                }
                Err(e) => {
                    return Err(Error::Parse {
                        file: path.to_path_buf(),
                        source: e.add_lines(line_no - 1),
                    });
                }
            }
        };
        i += extra;

        let scope = match &current {
            Some(name) => {
                let entry = file
                    .sections
                    .iter_mut()
                    .find(|(n, _)| n == name)
                    .map(|(_, scope)| scope);
                match entry {
                    Some(scope) => scope,
                    None => &mut file.common,
                }
            }
            None => &mut file.common,
        };

        if key == "extends" {
            if scope.extends.is_some() {
                return Err(Error::DuplicateExtends {
                    file: path.to_path_buf(),
                    line: line_no,
                });
            }
            let Value::Str(target) = value else {
                return Err(Error::Parse {
                    file: path.to_path_buf(),
                    source: ParseError::Unexpected {
                        location: Location {
                            line: line_no,
                            column: 1,
                            offset: 0,
                        },
                        expected: "a quoted file path after `extends =`".into(),
                        found: value.type_name().to_string(),
                    },
                });
            };
            scope.extends = Some(target);
            continue;
        }

        scope.assignments.push(Assignment { key, value });
    }

    Ok(file)
}

/// Compose the extends chain headed by `spec` into a fresh document.
pub fn compose(spec: &FileSpec, dialect: Dialect) -> Result<Document, Error> {
    let mut doc = Document::new();
    compose_into(&mut doc, spec, dialect)?;
    Ok(doc)
}

/// Compose the chain headed by `spec` over an existing document.
pub(crate) fn compose_into(
    doc: &mut Document,
    spec: &FileSpec,
    dialect: Dialect,
) -> Result<(), Error> {
    let abs = std::path::absolute(&spec.path).map_err(|e| Error::Io {
        path: spec.path.clone(),
        source: e,
    })?;
    let mut composer = Composer {
        dialect,
        cache: HashMap::new(),
    };
    let mut state = ChainState {
        visited: Vec::new(),
        section_present: false,
    };
    composer.apply_file(doc, &abs, spec.section.as_deref(), &mut state)?;
    if let Some(section) = &spec.section {
        if !state.section_present {
            return Err(Error::SectionNotFound {
                file: spec.path.clone(),
                section: section.clone(),
            });
        }
    }
    Ok(())
}

struct ChainState {
    visited: Vec<(PathBuf, Option<String>)>,
    section_present: bool,
}

struct Composer {
    dialect: Dialect,
    cache: HashMap<PathBuf, ParsedFile>,
}

impl Composer {
    fn parsed(&mut self, path: &Path) -> Result<&ParsedFile, Error> {
        if !self.cache.contains_key(path) {
            let file = parse_settings_file(path, self.dialect)?;
            self.cache.insert(path.to_path_buf(), file);
        }
        Ok(&self.cache[path])
    }

    fn apply_file(
        &mut self,
        doc: &mut Document,
        path: &Path,
        requested_section: Option<&str>,
        state: &mut ChainState,
    ) -> Result<(), Error> {
        let file = self.parsed(path)?.clone();
        let active = requested_section
            .map(str::to_string)
            .or_else(|| file.first_section_name());

        let node = (path.to_path_buf(), active.clone());
        if state.visited.contains(&node) {
            let mut chain: Vec<String> = state
                .visited
                .iter()
                .map(|(p, s)| display_node(p, s.as_deref()))
                .collect();
            chain.push(display_node(path, active.as_deref()));
            return Err(Error::ExtendsCycle { chain });
        }
        state.visited.push(node);

        let section_scope = active.as_deref().and_then(|name| file.section(name));
        if section_scope.is_some() {
            state.section_present = true;
        }

        // A section-local `extends` beats the file-wide one.
        let extends = section_scope
            .and_then(|scope| scope.extends.clone())
            .or_else(|| file.common.extends.clone());
        if let Some(target) = extends {
            let target_spec = FileSpec::parse(&target);
            let target_path = if target_spec.path.as_os_str().is_empty() {
                // `extends = "#other"`: another section of this file.
                path.to_path_buf()
            } else if target_spec.path.is_absolute() {
                target_spec.path.clone()
            } else {
                path.parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(&target_spec.path)
            };
            // The extended file inherits the active section unless the
            // spec names one.
            let target_section = target_spec.section.clone().or_else(|| active.clone());
            debug!(file = %path.display(), extends = %target, "following extends");
            self.apply_file(doc, &target_path, target_section.as_deref(), state)?;
        }

        debug!(file = %path.display(), section = active.as_deref().unwrap_or("<none>"), "applying settings file");
        self.apply_scope(doc, &file.common)?;
        if let Some(scope) = section_scope {
            self.apply_scope(doc, scope)?;
        }
        Ok(())
    }

    fn apply_scope(&self, doc: &mut Document, scope: &Scope) -> Result<(), Error> {
        for assignment in &scope.assignments {
            self.apply_assignment(doc, assignment)?;
        }
        Ok(())
    }

    fn apply_assignment(&self, doc: &mut Document, assignment: &Assignment) -> Result<(), Error> {
        let path = DottedPath::parse(&assignment.key)?;
        let (directive, rest) = path.split_directive();
        match directive {
            None => {
                doc.set(&path, assignment.value.clone())?;
            }
            Some(directive @ (Directive::Append | Directive::Prepend)) => {
                require_rest(&assignment.key, &rest)?;
                let Value::List(items) = assignment.value.clone() else {
                    return Err(Error::Path(PathError::TypeMismatch {
                        path: rest.to_string(),
                        expected: "a list of elements",
                        found: assignment.value.type_name(),
                    }));
                };
                if directive == Directive::Append {
                    doc.append(&rest, items)?;
                } else {
                    doc.prepend(&rest, items)?;
                }
            }
            Some(Directive::Swap) => {
                require_rest(&assignment.key, &rest)?;
                let Value::Map(swaps) = &assignment.value else {
                    return Err(Error::Path(PathError::TypeMismatch {
                        path: rest.to_string(),
                        expected: "a map of replacements",
                        found: assignment.value.type_name(),
                    }));
                };
                let display = rest.to_string();
                match doc.get_mut(&rest)? {
                    Value::List(items) => {
                        for (old, new) in swaps {
                            let pos = items
                                .iter()
                                .position(|v| v.as_str() == Some(old.as_str()))
                                .ok_or_else(|| Error::SwapItemNotFound {
                                    path: display.clone(),
                                    item: old.clone(),
                                })?;
                            items[pos] = new.clone();
                        }
                    }
                    other => {
                        return Err(Error::Path(PathError::TypeMismatch {
                            path: display,
                            expected: "a list",
                            found: other.type_name(),
                        }));
                    }
                }
            }
            Some(Directive::Delete) => {
                if !rest.is_empty() {
                    return Err(Error::PathSyntax(PathSyntaxError {
                        text: assignment.key.clone(),
                        reason: "DELETE takes a list of dotted paths as its value".into(),
                    }));
                }
                let Value::List(targets) = &assignment.value else {
                    return Err(Error::Path(PathError::TypeMismatch {
                        path: assignment.key.clone(),
                        expected: "a list of dotted paths",
                        found: assignment.value.type_name(),
                    }));
                };
                for target in targets {
                    let Value::Str(target_text) = target else {
                        return Err(Error::PathSyntax(PathSyntaxError {
                            text: strata_lax::encode(target),
                            reason: "DELETE entries must be path strings".into(),
                        }));
                    };
                    doc.delete(&DottedPath::parse(target_text)?)?;
                }
            }
        }
        Ok(())
    }
}

fn require_rest(key: &str, rest: &DottedPath) -> Result<(), Error> {
    if rest.is_empty() {
        return Err(Error::PathSyntax(PathSyntaxError {
            text: key.to_string(),
            reason: "directive needs a target path".into(),
        }));
    }
    Ok(())
}

fn display_node(path: &Path, section: Option<&str>) -> String {
    match section {
        Some(section) => format!("{}#{section}", path.display()),
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write settings file");
        path
    }

    fn get<'a>(doc: &'a Document, path: &str) -> &'a Value {
        doc.get(&DottedPath::parse(path).expect("path")).expect("get")
    }

    #[test]
    fn file_spec_parsing() {
        let spec = FileSpec::parse("local.cfg#prod");
        assert_eq!(spec.path, PathBuf::from("local.cfg"));
        assert_eq!(spec.section.as_deref(), Some("prod"));

        let plain = FileSpec::parse("local.cfg");
        assert_eq!(plain.section, None);

        let section_only = FileSpec::parse("#base");
        assert!(section_only.path.as_os_str().is_empty());
        assert_eq!(section_only.section.as_deref(), Some("base"));
    }

    #[test]
    fn single_file_with_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(
            dir.path(),
            "local.cfg",
            r#"
; ini-style comment
# another comment
// and another
DEBUG = false
[dev]
DEBUG = true
DATABASES.default.NAME = "dev_db"
[prod]
DATABASES.default.NAME = "prod_db"
"#,
        );
        let doc = compose(
            &FileSpec::with_section(&file, "prod"),
            Dialect::Extended,
        )
        .expect("compose");
        assert_eq!(get(&doc, "DEBUG"), &Value::Bool(false));
        assert_eq!(
            get(&doc, "DATABASES.default.NAME"),
            &Value::Str("prod_db".into())
        );
    }

    #[test]
    fn default_section_is_the_first_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(dir.path(), "local.cfg", "[dev]\nA = 1\n[prod]\nA = 2\n");
        let doc = compose(&FileSpec::new(&file), Dialect::Extended).expect("compose");
        assert_eq!(get(&doc, "A"), &Value::Int(1));
    }

    #[test]
    fn multi_line_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(
            dir.path(),
            "local.cfg",
            "ITEMS = [\n    \"a\",\n    \"b\",\n]\nNEXT = 1\n",
        );
        let doc = compose(&FileSpec::new(&file), Dialect::Extended).expect("compose");
        assert_eq!(
            get(&doc, "ITEMS"),
            &Value::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(get(&doc, "NEXT"), &Value::Int(1));
    }

    #[test]
    fn parse_errors_carry_file_and_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(dir.path(), "local.cfg", "GOOD = 1\nBAD = [1, :]\n");
        let err = compose(&FileSpec::new(&file), Dialect::Extended).unwrap_err();
        match err {
            Error::Parse { file: f, source } => {
                assert!(f.ends_with("local.cfg"));
                assert_eq!(source.location().expect("location").line, 2);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn extends_chain_merges_base_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "base.cfg",
            "[prod]\nA = 1\nB = 2\n",
        );
        let leaf = write(
            dir.path(),
            "leaf.cfg",
            "extends = \"base.cfg\"\n[prod]\nB = 3\nC = 4\n",
        );
        let doc = compose(&FileSpec::with_section(&leaf, "prod"), Dialect::Extended)
            .expect("compose");
        assert_eq!(get(&doc, "A"), &Value::Int(1));
        assert_eq!(get(&doc, "B"), &Value::Int(3));
        assert_eq!(get(&doc, "C"), &Value::Int(4));
    }

    #[test]
    fn intra_file_section_extends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(
            dir.path(),
            "local.cfg",
            "[base]\nA = 1\nB = 2\n[prod]\nextends = \"#base\"\nB = 3\n",
        );
        let doc = compose(&FileSpec::with_section(&file, "prod"), Dialect::Extended)
            .expect("compose");
        assert_eq!(get(&doc, "A"), &Value::Int(1));
        assert_eq!(get(&doc, "B"), &Value::Int(3));
    }

    #[test]
    fn extends_cycle_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.cfg", "extends = \"b.cfg\"\nA = 1\n");
        let b = write(dir.path(), "b.cfg", "extends = \"a.cfg\"\nB = 1\n");
        let err = compose(&FileSpec::new(&b), Dialect::Extended).unwrap_err();
        match err {
            Error::ExtendsCycle { chain } => assert!(chain.len() >= 3, "{chain:?}"),
            other => panic!("expected extends cycle, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_extends_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "base.cfg", "A = 1\n");
        let file = write(
            dir.path(),
            "local.cfg",
            "extends = \"base.cfg\"\nextends = \"base.cfg\"\n",
        );
        let err = compose(&FileSpec::new(&file), Dialect::Extended).unwrap_err();
        assert!(matches!(err, Error::DuplicateExtends { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = compose(
            &FileSpec::new("/definitely/not/here.cfg"),
            Dialect::Extended,
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn missing_section_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(dir.path(), "local.cfg", "[dev]\nA = 1\n");
        let err = compose(&FileSpec::with_section(&file, "prod"), Dialect::Extended)
            .unwrap_err();
        assert!(matches!(err, Error::SectionNotFound { section, .. } if section == "prod"));
    }

    #[test]
    fn absent_section_in_descendant_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "base.cfg", "[prod]\nA = 1\n");
        let leaf = write(dir.path(), "leaf.cfg", "extends = \"base.cfg\"\n");
        let doc = compose(&FileSpec::with_section(&leaf, "prod"), Dialect::Extended)
            .expect("compose");
        assert_eq!(get(&doc, "A"), &Value::Int(1));
    }

    #[test]
    fn append_prepend_and_delete_directives() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "base.cfg",
            "MIDDLEWARE = [\"a\", \"b\"]\nREMOVE_ME = 1\nKEEP = 2\n",
        );
        let leaf = write(
            dir.path(),
            "leaf.cfg",
            concat!(
                "extends = \"base.cfg\"\n",
                "APPEND.MIDDLEWARE = [\"c\", \"d\"]\n",
                "PREPEND.MIDDLEWARE = [\"x\", \"y\"]\n",
                "DELETE = [\"REMOVE_ME\"]\n",
            ),
        );
        let doc = compose(&FileSpec::new(&leaf), Dialect::Extended).expect("compose");
        let items: Vec<_> = get(&doc, "MIDDLEWARE")
            .as_list()
            .expect("list")
            .iter()
            .map(|v| v.as_str().expect("str").to_string())
            .collect();
        assert_eq!(items, ["x", "y", "a", "b", "c", "d"]);
        assert!(!doc.contains(&DottedPath::parse("REMOVE_ME").expect("path")));
        assert_eq!(get(&doc, "KEEP"), &Value::Int(2));
    }

    #[test]
    fn append_to_non_list_is_type_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(
            dir.path(),
            "local.cfg",
            "X = 1\nAPPEND.X = [\"a\"]\n",
        );
        let err = compose(&FileSpec::new(&file), Dialect::Extended).unwrap_err();
        assert!(matches!(
            err,
            Error::Path(PathError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn delete_of_missing_path_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(dir.path(), "local.cfg", "DELETE = [\"NEVER_SET\"]\n");
        let err = compose(&FileSpec::new(&file), Dialect::Extended).unwrap_err();
        assert!(matches!(err, Error::Path(PathError::NotFound { .. })));
    }

    #[test]
    fn swap_replaces_list_items() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "base.cfg", "BACKENDS = [\"console\", \"smtp\"]\n");
        let leaf = write(
            dir.path(),
            "leaf.cfg",
            "extends = \"base.cfg\"\nSWAP.BACKENDS = {\"smtp\": \"file\"}\n",
        );
        let doc = compose(&FileSpec::new(&leaf), Dialect::Extended).expect("compose");
        assert_eq!(
            get(&doc, "BACKENDS"),
            &Value::List(vec!["console".into(), "file".into()])
        );
    }

    #[test]
    fn swap_of_missing_item_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(
            dir.path(),
            "local.cfg",
            "BACKENDS = [\"console\"]\nSWAP.BACKENDS = {\"smtp\": \"file\"}\n",
        );
        let err = compose(&FileSpec::new(&file), Dialect::Extended).unwrap_err();
        assert!(matches!(err, Error::SwapItemNotFound { item, .. } if item == "smtp"));
    }

    #[test]
    fn values_keep_reference_nodes_for_later_resolution() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(
            dir.path(),
            "local.cfg",
            "NAME = \"app\"\nUSER = \"{{ NAME }}_user\"\n",
        );
        let doc = compose(&FileSpec::new(&file), Dialect::Extended).expect("compose");
        assert!(matches!(get(&doc, "USER"), Value::Concat(_)));
    }

    #[test]
    fn strict_dialect_applies_to_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write(dir.path(), "local.cfg", "X = [1, 2,]\n");
        assert!(compose(&FileSpec::new(&file), Dialect::Strict).is_err());
        assert!(compose(&FileSpec::new(&file), Dialect::Extended).is_ok());
    }
}
