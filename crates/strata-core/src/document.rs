//! The mutable, path-addressable settings document.

use crate::path::{DottedPath, PathError, Segment};
use indexmap::IndexMap;
use strata_lax::Value;

/// One environment's composed settings, addressable by [`DottedPath`].
///
/// Built once per resolution run: the composition engine merges settings
/// files into it, the interpolation resolver rewrites references in
/// place, and the reconciler fills in placeholder values. After that the
/// caller treats it as read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn from_map(root: IndexMap<String, Value>) -> Self {
        Document { root }
    }

    pub fn root(&self) -> &IndexMap<String, Value> {
        &self.root
    }

    pub fn into_map(self) -> IndexMap<String, Value> {
        self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.root
    }

    pub fn contains(&self, path: &DottedPath) -> bool {
        self.get(path).is_ok()
    }

    pub fn get(&self, path: &DottedPath) -> Result<&Value, PathError> {
        let mut current: Option<&Value> = None;
        for (depth, segment) in path.segments().iter().enumerate() {
            let at = || path.prefix(depth + 1).to_string();
            current = Some(match (current, segment) {
                (None, Segment::Key(key)) => {
                    self.root.get(key).ok_or_else(|| PathError::NotFound { path: at() })?
                }
                (None, Segment::Index(_)) => {
                    return Err(PathError::TypeMismatch {
                        path: at(),
                        expected: "a list",
                        found: "a map",
                    });
                }
                (Some(Value::Map(entries)), Segment::Key(key)) => entries
                    .get(key)
                    .ok_or_else(|| PathError::NotFound { path: at() })?,
                (Some(Value::List(items)), Segment::Index(index)) => {
                    items.get(*index).ok_or_else(|| PathError::IndexOutOfRange {
                        path: at(),
                        index: *index,
                        len: items.len(),
                    })?
                }
                (Some(other), Segment::Key(_)) => {
                    return Err(PathError::TypeMismatch {
                        path: path.prefix(depth).to_string(),
                        expected: "a map",
                        found: other.type_name(),
                    });
                }
                (Some(other), Segment::Index(_)) => {
                    return Err(PathError::TypeMismatch {
                        path: path.prefix(depth).to_string(),
                        expected: "a list",
                        found: other.type_name(),
                    });
                }
            });
        }
        current.ok_or(PathError::NotFound {
            path: path.to_string(),
        })
    }

    /// Set the value at `path`, creating missing intermediates.
    ///
    /// The container created for a missing segment depends on the *next*
    /// segment: an index means a list, a key means a map. A list may be
    /// extended by exactly one slot (the append position); indices past
    /// that fail with [`PathError::IndexOutOfRange`]. Descending through
    /// an existing non-container value fails with
    /// [`PathError::TypeMismatch`].
    pub fn set(&mut self, path: &DottedPath, value: Value) -> Result<(), PathError> {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return Err(PathError::NotFound {
                path: path.to_string(),
            });
        };

        // Walk to the parent container, creating as we go.
        let mut current: Option<&mut Value> = None;
        for (depth, segment) in parents.iter().enumerate() {
            let next_segment = &segments[depth + 1];
            let at = path.prefix(depth + 1).to_string();
            let above = path.prefix(depth).to_string();
            let container = match current {
                None => {
                    let Segment::Key(key) = segment else {
                        return Err(PathError::TypeMismatch {
                            path: at,
                            expected: "a list",
                            found: "a map",
                        });
                    };
                    self.root
                        .entry(key.clone())
                        .or_insert_with(|| empty_container(next_segment))
                }
                Some(Value::Map(entries)) => {
                    let Segment::Key(key) = segment else {
                        return Err(PathError::TypeMismatch {
                            path: above,
                            expected: "a list",
                            found: "a map",
                        });
                    };
                    entries
                        .entry(key.clone())
                        .or_insert_with(|| empty_container(next_segment))
                }
                Some(Value::List(items)) => {
                    let Segment::Index(index) = segment else {
                        return Err(PathError::TypeMismatch {
                            path: above,
                            expected: "a map",
                            found: "a list",
                        });
                    };
                    if *index == items.len() {
                        items.push(empty_container(next_segment));
                    } else if *index > items.len() {
                        return Err(PathError::IndexOutOfRange {
                            path: at,
                            index: *index,
                            len: items.len(),
                        });
                    }
                    &mut items[*index]
                }
                Some(other) => {
                    return Err(PathError::TypeMismatch {
                        path: above,
                        expected: match segment {
                            Segment::Key(_) => "a map",
                            Segment::Index(_) => "a list",
                        },
                        found: other.type_name(),
                    });
                }
            };
            current = Some(container);
        }

        // Insert at the final segment.
        let parent_path = path.prefix(parents.len()).to_string();
        match (current, last) {
            (None, Segment::Key(key)) => {
                self.root.insert(key.clone(), value);
                Ok(())
            }
            (None, Segment::Index(_)) => Err(PathError::TypeMismatch {
                path: path.to_string(),
                expected: "a list",
                found: "a map",
            }),
            (Some(Value::Map(entries)), Segment::Key(key)) => {
                entries.insert(key.clone(), value);
                Ok(())
            }
            (Some(Value::List(items)), Segment::Index(index)) => {
                if *index < items.len() {
                    items[*index] = value;
                    Ok(())
                } else if *index == items.len() {
                    items.push(value);
                    Ok(())
                } else {
                    Err(PathError::IndexOutOfRange {
                        path: path.to_string(),
                        index: *index,
                        len: items.len(),
                    })
                }
            }
            (Some(other), segment) => Err(PathError::TypeMismatch {
                path: parent_path,
                expected: match segment {
                    Segment::Key(_) => "a map",
                    Segment::Index(_) => "a list",
                },
                found: other.type_name(),
            }),
        }
    }

    /// Remove and return the value at `path`.
    pub fn delete(&mut self, path: &DottedPath) -> Result<Value, PathError> {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return Err(PathError::NotFound {
                path: path.to_string(),
            });
        };
        let full = path.to_string();

        if parents.is_empty() {
            return match last {
                Segment::Key(key) => self
                    .root
                    .shift_remove(key)
                    .ok_or(PathError::NotFound { path: full }),
                Segment::Index(_) => Err(PathError::TypeMismatch {
                    path: full,
                    expected: "a list",
                    found: "a map",
                }),
            };
        }

        let parent_path = path.prefix(parents.len());
        match (self.get_mut(&parent_path)?, last) {
            (Value::Map(entries), Segment::Key(key)) => entries
                .shift_remove(key)
                .ok_or(PathError::NotFound { path: full }),
            (Value::List(items), Segment::Index(index)) => {
                if *index < items.len() {
                    Ok(items.remove(*index))
                } else {
                    Err(PathError::IndexOutOfRange {
                        path: full,
                        index: *index,
                        len: items.len(),
                    })
                }
            }
            (other, Segment::Key(_)) => Err(PathError::TypeMismatch {
                path: parent_path.to_string(),
                expected: "a map",
                found: other.type_name(),
            }),
            (other, Segment::Index(_)) => Err(PathError::TypeMismatch {
                path: parent_path.to_string(),
                expected: "a list",
                found: other.type_name(),
            }),
        }
    }

    /// Append `items` to the list at `path`.
    pub fn append(&mut self, path: &DottedPath, items: Vec<Value>) -> Result<(), PathError> {
        let list = self.require_list_mut(path)?;
        list.extend(items);
        Ok(())
    }

    /// Insert `items` before the existing elements of the list at `path`,
    /// preserving their own order.
    pub fn prepend(&mut self, path: &DottedPath, items: Vec<Value>) -> Result<(), PathError> {
        let list = self.require_list_mut(path)?;
        for (i, item) in items.into_iter().enumerate() {
            list.insert(i, item);
        }
        Ok(())
    }

    fn require_list_mut(&mut self, path: &DottedPath) -> Result<&mut Vec<Value>, PathError> {
        let display = path.to_string();
        match self.get_mut(path)? {
            Value::List(items) => Ok(items),
            other => Err(PathError::TypeMismatch {
                path: display,
                expected: "a list",
                found: other.type_name(),
            }),
        }
    }

    pub(crate) fn get_mut(&mut self, path: &DottedPath) -> Result<&mut Value, PathError> {
        let segments = path.segments();
        let Some((first, rest)) = segments.split_first() else {
            return Err(PathError::NotFound {
                path: path.to_string(),
            });
        };
        // The first segment resolves against the root map; resolving it
        // before the loop keeps `self.root` borrowed exactly once, so the
        // returned reference can escape the loop.
        let mut current: &mut Value = match first {
            Segment::Key(key) => self
                .root
                .get_mut(key)
                .ok_or(PathError::NotFound {
                    path: path.prefix(1).to_string(),
                })?,
            Segment::Index(_) => {
                return Err(PathError::TypeMismatch {
                    path: path.prefix(1).to_string(),
                    expected: "a list",
                    found: "a map",
                });
            }
        };
        for (offset, segment) in rest.iter().enumerate() {
            let depth = offset + 1;
            let at = path.prefix(depth + 1).to_string();
            let above = path.prefix(depth).to_string();
            current = match current {
                Value::Map(entries) => match segment {
                    Segment::Key(key) => entries
                        .get_mut(key)
                        .ok_or(PathError::NotFound { path: at })?,
                    Segment::Index(_) => {
                        return Err(PathError::TypeMismatch {
                            path: above,
                            expected: "a list",
                            found: "a map",
                        });
                    }
                },
                Value::List(items) => match segment {
                    Segment::Index(index) => {
                        let len = items.len();
                        items.get_mut(*index).ok_or(PathError::IndexOutOfRange {
                            path: at,
                            index: *index,
                            len,
                        })?
                    }
                    Segment::Key(_) => {
                        return Err(PathError::TypeMismatch {
                            path: above,
                            expected: "a map",
                            found: "a list",
                        });
                    }
                },
                other => match segment {
                    Segment::Key(_) => {
                        return Err(PathError::TypeMismatch {
                            path: above,
                            expected: "a map",
                            found: other.type_name(),
                        });
                    }
                    Segment::Index(_) => {
                        return Err(PathError::TypeMismatch {
                            path: above,
                            expected: "a list",
                            found: other.type_name(),
                        });
                    }
                },
            };
        }
        Ok(current)
    }

    /// Convert to a `serde_json::Value` for host consumption.
    ///
    /// Dates render as their canonical text; unresolved references (which
    /// only exist before interpolation) render as their `{{ ... }}` text.
    pub fn to_json(&self) -> serde_json::Value {
        let entries = self
            .root
            .iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect();
        serde_json::Value::Object(entries)
    }
}

fn empty_container(next: &Segment) -> Value {
    match next {
        Segment::Key(_) => Value::Map(IndexMap::new()),
        Segment::Index(_) => Value::List(Vec::new()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
        }
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Date(_) | Value::DateTime(_) | Value::Reference(_) | Value::Concat(_) => {
            let text = strata_lax::encode(value);
            serde_json::Value::String(text.trim_matches('"').to_string())
        }
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> DottedPath {
        DottedPath::parse(text).expect("path")
    }

    fn doc_with(entries: &[(&str, &str)]) -> Document {
        let mut doc = Document::new();
        for (p, v) in entries {
            let value = strata_lax::parse(v, strata_lax::Dialect::Extended).expect("value");
            doc.set(&path(p), value).expect("set");
        }
        doc
    }

    #[test]
    fn set_and_get_nested() {
        let doc = doc_with(&[("a.b.c", "\"x\"")]);
        assert_eq!(doc.get(&path("a.b.c")).expect("get"), &Value::Str("x".into()));
        assert!(doc.get(&path("a.b")).expect("get").is_map());
    }

    #[test]
    fn get_missing_is_not_found() {
        let doc = doc_with(&[("a.b", "1")]);
        assert!(matches!(
            doc.get(&path("a.zzz")),
            Err(PathError::NotFound { .. })
        ));
    }

    #[test]
    fn index_segments_address_lists() {
        let doc = doc_with(&[("a.items", "[\"x\", \"y\", \"z\"]")]);
        assert_eq!(
            doc.get(&path("a.items.0")).expect("get"),
            &Value::Str("x".into())
        );
        assert!(matches!(
            doc.get(&path("a.items.9")),
            Err(PathError::IndexOutOfRange { index: 9, len: 3, .. })
        ));
    }

    #[test]
    fn set_creates_lists_for_index_segments() {
        let mut doc = Document::new();
        doc.set(&path("a.0.z"), Value::Int(1)).expect("set");
        let list = doc.get(&path("a")).expect("get").as_list().expect("list");
        assert_eq!(list.len(), 1);
        assert_eq!(doc.get(&path("a.0.z")).expect("get"), &Value::Int(1));
    }

    #[test]
    fn set_may_extend_list_by_one() {
        let mut doc = doc_with(&[("a", "[1]")]);
        doc.set(&path("a.1"), Value::Int(2)).expect("set at append position");
        assert_eq!(
            doc.get(&path("a")).expect("get").as_list().expect("list").len(),
            2
        );
        assert!(matches!(
            doc.set(&path("a.5"), Value::Int(9)),
            Err(PathError::IndexOutOfRange { index: 5, len: 2, .. })
        ));
    }

    #[test]
    fn set_through_scalar_is_type_mismatch() {
        let mut doc = doc_with(&[("a", "1")]);
        assert!(matches!(
            doc.set(&path("a.b"), Value::Int(2)),
            Err(PathError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn delete_twice_fails_the_second_time() {
        let mut doc = doc_with(&[("a.b", "1"), ("a.c", "2")]);
        doc.delete(&path("a.b")).expect("first delete");
        assert!(matches!(
            doc.delete(&path("a.b")),
            Err(PathError::NotFound { .. })
        ));
        // An unrelated delete is unaffected.
        doc.delete(&path("a.c")).expect("independent delete");
    }

    #[test]
    fn append_and_prepend_preserve_order() {
        let mut doc = doc_with(&[("l", "[\"a\", \"b\"]")]);
        doc.append(&path("l"), vec!["c".into(), "d".into()]).expect("append");
        doc.prepend(&path("l"), vec!["x".into(), "y".into()]).expect("prepend");
        let items: Vec<_> = doc
            .get(&path("l"))
            .expect("get")
            .as_list()
            .expect("list")
            .iter()
            .map(|v| v.as_str().expect("str").to_string())
            .collect();
        assert_eq!(items, ["x", "y", "a", "b", "c", "d"]);
    }

    #[test]
    fn append_on_non_list_is_type_mismatch() {
        let mut doc = doc_with(&[("s", "\"text\"")]);
        assert!(matches!(
            doc.append(&path("s"), vec![Value::Int(1)]),
            Err(PathError::TypeMismatch { expected: "a list", .. })
        ));
    }

    #[test]
    fn to_json_conversion() {
        let doc = doc_with(&[("a.b", "1"), ("a.d", "2021-06-23"), ("l", "[true, 1.5]")]);
        let json = doc.to_json();
        assert_eq!(json["a"]["b"], serde_json::json!(1));
        assert_eq!(json["a"]["d"], serde_json::json!("2021-06-23"));
        assert_eq!(json["l"][0], serde_json::json!(true));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let doc = doc_with(&[("z", "1"), ("a", "2"), ("m", "3")]);
        let keys: Vec<_> = doc.root().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
