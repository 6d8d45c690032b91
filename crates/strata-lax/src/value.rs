//! The typed value tree produced by the parser.

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::IndexMap;

/// A parsed settings value.
///
/// Maps preserve insertion order. Order carries no meaning beyond
/// round-trip fidelity and the order in which placeholders are prompted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Bare `YYYY-MM[-DD]` literal.
    Date(NaiveDate),
    /// Bare ISO-8601 date-time literal. Without an explicit offset the
    /// scanner assumes UTC.
    DateTime(DateTime<FixedOffset>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// A bare `{{ expr }}` in value position; holds the trimmed inner
    /// expression. Resolution splices the referenced value wholesale.
    Reference(String),
    /// A quoted string with embedded `{{ expr }}` pieces.
    ///
    /// Parts are only `Str` and `Reference`. Resolution coerces each part
    /// to its canonical string form and concatenates, so a reference in a
    /// quoted string is always textual.
    Concat(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Human-readable kind name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "a bool",
            Value::Int(_) => "an int",
            Value::Float(_) => "a float",
            Value::Str(_) => "a string",
            Value::Date(_) => "a date",
            Value::DateTime(_) => "a date-time",
            Value::List(_) => "a list",
            Value::Map(_) => "a map",
            Value::Reference(_) => "a reference",
            Value::Concat(_) => "an interpolated string",
        }
    }

    /// Whether this value or anything nested in it still contains an
    /// unresolved reference.
    pub fn has_references(&self) -> bool {
        match self {
            Value::Reference(_) | Value::Concat(_) => true,
            Value::Str(s) => s.contains("{{"),
            Value::List(items) => items.iter().any(Value::has_references),
            Value::Map(entries) => entries
                .iter()
                .any(|(k, v)| k.contains("{{") || v.has_references()),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Str("x".into()).as_str(), Some("x"));
        assert!(Value::Null.is_null());
        assert!(Value::List(vec![]).is_list());
        assert!(Value::Map(IndexMap::new()).is_map());
        assert_eq!(Value::Bool(true).as_int(), None);
    }

    #[test]
    fn has_references_sees_nested() {
        let v = Value::List(vec![
            Value::Int(1),
            Value::Map(IndexMap::from([(
                "k".to_string(),
                Value::Reference("A.b".to_string()),
            )])),
        ]);
        assert!(v.has_references());
        assert!(!Value::List(vec![Value::Int(1)]).has_references());
    }

    #[test]
    fn plain_string_with_marker_counts_as_reference() {
        assert!(Value::Str("{{ X }}".into()).has_references());
        assert!(!Value::Str("plain".into()).has_references());
    }
}
