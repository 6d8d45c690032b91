//! Dotted-path addressing.
//!
//! A path like `DATABASES.default.NAME` addresses a value nested in a
//! [`Document`](crate::Document). Segments are separated by dots; a
//! segment with a literal dot in it is grouped in parentheses
//! (`LOGGING.loggers.(package.module).level`), and a segment may contain
//! `{{ ... }}` groups whose dots are *not* treated as separators. Bare
//! numeric segments address list elements.
//!
//! Parsing is stack-based so `(...)` and `{{ ... }}` groups nest without
//! any lookahead limit.

use std::fmt;
use thiserror::Error;

/// One step of a [`DottedPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Map key. May contain `{{ ... }}` groups for dynamic keys.
    Key(String),
    /// List index, zero-based.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => {
                if k.contains('.') && !k.contains("{{") {
                    write!(f, "({k})")
                } else {
                    write!(f, "{k}")
                }
            }
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// An ordered sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedPath {
    segments: Vec<Segment>,
}

/// The path text itself doesn't parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path `{text}`: {reason}")]
pub struct PathSyntaxError {
    pub text: String,
    pub reason: String,
}

/// Errors from addressing a document. This variant set is closed: an
/// index error is never re-signalled as a lookup error or vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("`{path}` not found")]
    NotFound { path: String },

    #[error("index {index} out of range (len {len}) at `{path}`")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("`{path}` is {found}, expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Structural directives recognised as a leading path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Append,
    Prepend,
    Swap,
    Delete,
}

impl Directive {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "APPEND" => Some(Directive::Append),
            "PREPEND" => Some(Directive::Prepend),
            "SWAP" => Some(Directive::Swap),
            "DELETE" => Some(Directive::Delete),
            _ => None,
        }
    }
}

impl DottedPath {
    pub fn parse(text: &str) -> Result<Self, PathSyntaxError> {
        if text.is_empty() {
            return Err(PathSyntaxError {
                text: text.to_string(),
                reason: "path is empty".to_string(),
            });
        }
        let err = |reason: &str| PathSyntaxError {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let chars: Vec<char> = text.chars().collect();
        let mut stack: Vec<&'static str> = Vec::new();
        let mut collector = String::new();
        let mut segments = Vec::new();
        let mut group = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let d = chars.get(i + 1).copied();
            if c == '.' && stack.is_empty() {
                if collector.is_empty() {
                    return Err(err("empty segment"));
                }
                segments.push(convert_segment(std::mem::take(&mut collector), group));
                group = false;
            } else if c == '(' {
                // Consume everything inside the outer parentheses,
                // including inner parentheses.
                let base = stack.len();
                stack.push("(");
                i += 1;
                while i < chars.len() {
                    let e = chars[i];
                    if e == '(' {
                        stack.push("(");
                    } else if e == ')' {
                        if stack.pop() != Some("(") {
                            return Err(err("unclosed (...) group"));
                        }
                        if stack.len() == base {
                            group = true;
                            break;
                        }
                    }
                    // The closing outer paren is never collected.
                    collector.push(e);
                    i += 1;
                }
            } else if c == '{' && d == Some('{') {
                stack.push("{{");
                collector.push_str("{{");
                i += 1;
            } else if c == '}' && d == Some('}') {
                if stack.pop() != Some("{{") {
                    return Err(err("unbalanced {{ ... }} group"));
                }
                collector.push_str("}}");
                group = true;
                i += 1;
            } else {
                collector.push(c);
            }
            i += 1;
        }

        if let Some(open) = stack.last() {
            let close = if *open == "(" { ")" } else { "}}" };
            return Err(err(&format!("unclosed {open}...{close} group")));
        }
        if !collector.is_empty() {
            segments.push(convert_segment(collector, group));
        }
        if segments.is_empty() {
            return Err(err("path has no segments"));
        }
        Ok(DottedPath { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        DottedPath { segments }
    }

    /// Single-key path, taken verbatim (no parsing).
    pub fn from_key(key: impl Into<String>) -> Self {
        DottedPath {
            segments: vec![Segment::Key(key.into())],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first `n` segments as a new path.
    pub fn prefix(&self, n: usize) -> DottedPath {
        DottedPath {
            segments: self.segments[..n].to_vec(),
        }
    }

    pub fn child(&self, segment: Segment) -> DottedPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        DottedPath { segments }
    }

    /// Whether any key segment still contains a `{{ ... }}` group.
    pub fn has_references(&self) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Key(k) => k.contains("{{"),
            Segment::Index(_) => false,
        })
    }

    /// Split a leading `APPEND` / `PREPEND` / `SWAP` / `DELETE` segment
    /// off the path.
    pub fn split_directive(&self) -> (Option<Directive>, DottedPath) {
        if let Some(Segment::Key(first)) = self.segments.first() {
            if let Some(directive) = Directive::from_key(first) {
                return (
                    Some(directive),
                    DottedPath {
                        segments: self.segments[1..].to_vec(),
                    },
                );
            }
        }
        (None, self.clone())
    }
}

/// Convert resolved dynamic-segment text into a segment, applying the
/// same numeric rules as path parsing.
pub(crate) fn dynamic_segment(text: String) -> Segment {
    convert_segment(text, false)
}

fn convert_segment(text: String, group: bool) -> Segment {
    if !group && is_index(&text) {
        if let Ok(index) = text.parse::<usize>() {
            return Segment::Index(index);
        }
    }
    Segment::Key(text)
}

/// All digits, without a leading zero (a name like `01` stays a map key).
fn is_index(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_digit())
        && !(s.len() > 1 && s.starts_with('0'))
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(path: &DottedPath) -> Vec<String> {
        path.segments()
            .iter()
            .map(|s| match s {
                Segment::Key(k) => k.clone(),
                Segment::Index(i) => format!("#{i}"),
            })
            .collect()
    }

    #[test]
    fn simple_paths() {
        assert_eq!(keys(&DottedPath::parse("WORD").expect("parse")), ["WORD"]);
        assert_eq!(
            keys(&DottedPath::parse("WORD.x").expect("parse")),
            ["WORD", "x"]
        );
        assert_eq!(
            keys(&DottedPath::parse("WORD.a.x.y.z").expect("parse")),
            ["WORD", "a", "x", "y", "z"]
        );
    }

    #[test]
    fn compound_segments() {
        assert_eq!(
            keys(&DottedPath::parse("WORD.(x)").expect("parse")),
            ["WORD", "x"]
        );
        assert_eq!(
            keys(&DottedPath::parse("WORD.(x.y)").expect("parse")),
            ["WORD", "x.y"]
        );
        assert_eq!(
            keys(&DottedPath::parse("WORD.(x.y).z").expect("parse")),
            ["WORD", "x.y", "z"]
        );
        assert_eq!(
            keys(&DottedPath::parse("XYZ.(a).(b.b).c.(d)").expect("parse")),
            ["XYZ", "a", "b.b", "c", "d"]
        );
    }

    #[test]
    fn numeric_segments_become_indices() {
        let path = DottedPath::parse("WORD.0.z").expect("parse");
        assert_eq!(path.segments()[1], Segment::Index(0));
    }

    #[test]
    fn grouped_numbers_stay_keys() {
        let path = DottedPath::parse("WORD.(0).z").expect("parse");
        assert_eq!(path.segments()[1], Segment::Key("0".to_string()));
    }

    #[test]
    fn leading_zero_stays_key() {
        let path = DottedPath::parse("WORD.01").expect("parse");
        assert_eq!(path.segments()[1], Segment::Key("01".to_string()));
    }

    #[test]
    fn interpolation_groups_are_single_segments() {
        assert_eq!(
            keys(&DottedPath::parse("WORD.{{ x }}").expect("parse")),
            ["WORD", "{{ x }}"]
        );
        assert_eq!(
            keys(&DottedPath::parse("WORD.{{ x.y }}").expect("parse")),
            ["WORD", "{{ x.y }}"]
        );
        assert_eq!(
            keys(&DottedPath::parse("WORD.{{ x.y.z }}XYZ").expect("parse")),
            ["WORD", "{{ x.y.z }}XYZ"]
        );
    }

    #[test]
    fn nested_interpolation_group() {
        assert_eq!(
            keys(&DottedPath::parse("A.{{ B.{{ C }} }}").expect("parse")),
            ["A", "{{ B.{{ C }} }}"]
        );
    }

    #[test]
    fn unclosed_groups_error() {
        assert!(DottedPath::parse("WORD.(x").is_err());
        assert!(DottedPath::parse("WORD.{{ x").is_err());
        assert!(DottedPath::parse("WORD.x }}").is_err());
        assert!(DottedPath::parse("").is_err());
        assert!(DottedPath::parse("a..b").is_err());
    }

    #[test]
    fn display_round_trips() {
        for text in ["WORD", "WORD.x.y", "WORD.(x.y).z", "WORD.0.z"] {
            let path = DottedPath::parse(text).expect("parse");
            assert_eq!(path.to_string(), text);
            assert_eq!(DottedPath::parse(&path.to_string()).expect("reparse"), path);
        }
    }

    #[test]
    fn directive_split() {
        let path = DottedPath::parse("APPEND.LIST.x").expect("parse");
        let (directive, rest) = path.split_directive();
        assert_eq!(directive, Some(Directive::Append));
        assert_eq!(keys(&rest), ["LIST", "x"]);

        let plain = DottedPath::parse("LIST.x").expect("parse");
        assert_eq!(plain.split_directive().0, None);
    }

    #[test]
    fn prefix_and_child() {
        let path = DottedPath::parse("A.b.c").expect("parse");
        assert_eq!(path.prefix(2).to_string(), "A.b");
        assert_eq!(
            path.prefix(2).child(Segment::Key("d".into())).to_string(),
            "A.b.d"
        );
    }
}
