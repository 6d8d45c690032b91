//! Canonical text rendering of values.
//!
//! Used for the string coercion step of interpolation, for writing
//! settings files, and for diagnostics. For reference-free values the
//! output parses back (extended dialect) to a semantically identical
//! tree.

use crate::value::Value;
use chrono::SecondsFormat;
use std::fmt::Write;

pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => write_float(out, *f),
        Value::Str(s) => write_quoted(out, s),
        Value::Date(d) => {
            let _ = write!(out, "{}", d.format("%Y-%m-%d"));
        }
        Value::DateTime(dt) => {
            out.push_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        }
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_quoted(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
        Value::Reference(expr) => {
            let _ = write!(out, "{{{{{expr}}}}}");
        }
        Value::Concat(parts) => {
            // Re-render as the quoted string it came from.
            out.push('"');
            for part in parts {
                match part {
                    Value::Str(s) => escape_into(out, s),
                    Value::Reference(expr) => {
                        let _ = write!(out, "{{{{{expr}}}}}");
                    }
                    other => write_value(out, other),
                }
            }
            out.push('"');
        }
    }
}

fn write_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("nan");
    } else if f.is_infinite() {
        out.push_str(if f < 0.0 { "-inf" } else { "inf" });
    } else if f == f.trunc() && f.abs() < 1e16 {
        let _ = write!(out, "{f:.1}");
    } else {
        let _ = write!(out, "{f}");
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    escape_into(out, s);
    out.push('"');
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::scanner::Dialect;
    use chrono::NaiveDate;
    use indexmap::IndexMap;

    #[test]
    fn scalars() {
        assert_eq!(encode(&Value::Null), "null");
        assert_eq!(encode(&Value::Bool(true)), "true");
        assert_eq!(encode(&Value::Int(-3)), "-3");
        assert_eq!(encode(&Value::Float(1.0)), "1.0");
        assert_eq!(encode(&Value::Float(2.5)), "2.5");
        assert_eq!(encode(&Value::Float(f64::INFINITY)), "inf");
        assert_eq!(encode(&Value::Str("a\"b".into())), r#""a\"b""#);
    }

    #[test]
    fn dates() {
        let d = NaiveDate::from_ymd_opt(2021, 6, 23).expect("date");
        assert_eq!(encode(&Value::Date(d)), "2021-06-23");
    }

    #[test]
    fn structures() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Int(1));
        map.insert("b".to_string(), Value::List(vec![Value::Int(2), Value::Null]));
        assert_eq!(
            encode(&Value::Map(map)),
            r#"{"a": 1, "b": [2, null]}"#
        );
    }

    #[test]
    fn references_render_back() {
        assert_eq!(encode(&Value::Reference("A.b".into())), "{{A.b}}");
        let concat = Value::Concat(vec![
            Value::Reference("NAME".into()),
            Value::Str("_user".into()),
        ]);
        assert_eq!(encode(&concat), r#""{{NAME}}_user""#);
    }

    #[test]
    fn round_trip() {
        let text = r#"{
            "name": "app",
            "port": 5432,
            "ratio": 0.25,
            "debug": false,
            "released": 2021-06-23,
            "built": 2021-06-23T12:00:30Z,
            "tags": ["a", "b", []],
            "nested": {"x": null}
        }"#;
        let value = parse(text, Dialect::Extended).expect("parse");
        let round = parse(&encode(&value), Dialect::Extended).expect("reparse");
        assert_eq!(value, round);
    }
}
