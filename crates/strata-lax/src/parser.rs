//! Recursive-descent parser producing [`Value`] trees from the token
//! stream.
//!
//! Parsing never resolves interpolation: `{{ ... }}` groups become
//! [`Value::Reference`] / [`Value::Concat`] nodes for a later resolution
//! pass.

use crate::error::{Location, ParseError};
use crate::scanner::{Dialect, Scanner, Token, TokenKind};
use crate::value::Value;
use indexmap::IndexMap;
use thiserror::Error;

/// Parse one complete value document.
///
/// Empty (or whitespace-only) input parses to [`Value::Null`]. Anything
/// left over after the value is an error.
pub fn parse(input: &str, dialect: Dialect) -> Result<Value, ParseError> {
    Parser::new(input, dialect).parse_document()
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    peeked: Option<Option<Token>>,
    dialect: Dialect,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, dialect: Dialect) -> Self {
        Parser {
            scanner: Scanner::new(input, dialect),
            peeked: None,
            dialect,
        }
    }

    fn next(&mut self) -> Result<Option<Token>, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => Ok(self.scanner.next_token()?),
        }
    }

    fn peek(&mut self) -> Result<Option<&Token>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.scanner.next_token()?);
        }
        Ok(self.peeked.as_ref().and_then(|t| t.as_ref()))
    }

    fn parse_document(&mut self) -> Result<Value, ParseError> {
        if self.peek()?.is_none() {
            return Ok(Value::Null);
        }
        let value = self.parse_value()?;
        if let Some(extra) = self.next()? {
            return Err(ParseError::Extraneous {
                location: extra.location,
            });
        }
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let Some(token) = self.next()? else {
            return Err(ParseError::UnexpectedEof {
                expected: "a value".into(),
            });
        };
        match token.kind {
            TokenKind::LeftBrace => self.parse_map(),
            TokenKind::LeftBracket => self.parse_list(),
            TokenKind::Str(s) => self.string_value(s, token.location),
            TokenKind::Int(i) => Ok(Value::Int(i)),
            TokenKind::Float(f) => Ok(Value::Float(f)),
            TokenKind::Date(d) => Ok(Value::Date(d)),
            TokenKind::DateTime(dt) => Ok(Value::DateTime(dt)),
            TokenKind::Bool(b) => Ok(Value::Bool(b)),
            TokenKind::Null => Ok(Value::Null),
            TokenKind::Reference(expr) => Ok(Value::Reference(expr)),
            other => Err(ParseError::Unexpected {
                location: token.location,
                expected: "a value".into(),
                found: other.describe(),
            }),
        }
    }

    fn string_value(&self, content: String, location: Location) -> Result<Value, ParseError> {
        if !self.dialect.extras() {
            return Ok(Value::Str(content));
        }
        match split_interpolated(&content) {
            Ok(Some(parts)) => Ok(Value::Concat(parts)),
            Ok(None) => Ok(Value::Str(content)),
            Err(UnbalancedMarkers) => Err(ParseError::UnbalancedReference { location }),
        }
    }

    fn parse_map(&mut self) -> Result<Value, ParseError> {
        let mut entries = IndexMap::new();
        if self.at_close(&TokenKind::RightBrace)? {
            self.next()?;
            return Ok(Value::Map(entries));
        }
        loop {
            let Some(key_token) = self.next()? else {
                return Err(ParseError::UnexpectedEof {
                    expected: "a key".into(),
                });
            };
            let key = match key_token.kind {
                TokenKind::Str(s) => s,
                // The scanner only emits Ident in the extended dialect.
                TokenKind::Ident(word) => word,
                other => {
                    return Err(ParseError::Unexpected {
                        location: key_token.location,
                        expected: "a key".into(),
                        found: other.describe(),
                    });
                }
            };
            self.expect(TokenKind::Colon, "`:`")?;
            let value = self.parse_value()?;
            // Duplicate keys: last one wins, JSON convention.
            entries.insert(key, value);
            if self.close_or_continue(TokenKind::RightBrace, "`}`", "a key")? {
                return Ok(Value::Map(entries));
            }
        }
    }

    fn parse_list(&mut self) -> Result<Value, ParseError> {
        let mut items = Vec::new();
        if self.at_close(&TokenKind::RightBracket)? {
            self.next()?;
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.parse_value()?);
            if self.close_or_continue(TokenKind::RightBracket, "`]`", "a value")? {
                return Ok(Value::List(items));
            }
        }
    }

    fn at_close(&mut self, close: &TokenKind) -> Result<bool, ParseError> {
        Ok(self.peek()?.is_some_and(|t| t.kind == *close))
    }

    fn expect(&mut self, kind: TokenKind, describe: &str) -> Result<(), ParseError> {
        match self.next()? {
            Some(t) if t.kind == kind => Ok(()),
            Some(t) => Err(ParseError::Unexpected {
                location: t.location,
                expected: describe.into(),
                found: t.kind.describe(),
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: describe.into(),
            }),
        }
    }

    /// After an entry: expect `,` (possibly trailing) or the closing
    /// delimiter. Returns true when the structure is complete.
    fn close_or_continue(
        &mut self,
        close: TokenKind,
        close_text: &str,
        entry_text: &str,
    ) -> Result<bool, ParseError> {
        let expected = format!("`,` or {close_text}");
        match self.next()? {
            Some(t) if t.kind == TokenKind::Comma => {
                if self.at_close(&close)? {
                    // One trailing comma before the close.
                    if self.dialect.extras() {
                        self.next()?;
                        return Ok(true);
                    }
                    let location = self.peek()?.map_or(Location::start(), |t| t.location);
                    return Err(ParseError::Unexpected {
                        location,
                        expected: entry_text.into(),
                        found: close_text.into(),
                    });
                }
                Ok(false)
            }
            Some(t) if t.kind == close => Ok(true),
            Some(t) => Err(ParseError::Unexpected {
                location: t.location,
                expected,
                found: t.kind.describe(),
            }),
            None => Err(ParseError::UnexpectedEof { expected }),
        }
    }
}

/// The `{{` / `}}` groups in a string don't balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unbalanced `{{{{ ... }}}}` groups")]
pub struct UnbalancedMarkers;

/// Split string content into literal and `{{ ... }}` reference parts.
///
/// Returns `Ok(None)` when the string contains no reference markers.
/// Nested `{{ ... }}` groups stay inside the enclosing reference's
/// expression text. Used by the parser for quoted strings and by the
/// resolver for strings acquired outside the parser (environment
/// variables, prompt input).
pub fn split_interpolated(s: &str) -> Result<Option<Vec<Value>>, UnbalancedMarkers> {
    // A string with no opening marker is literal text, even if it happens
    // to contain `}}`.
    if !s.contains("{{") {
        return Ok(None);
    }
    let chars: Vec<char> = s.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut reference = String::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let d = chars.get(i + 1).copied();
        if c == '{' && d == Some('{') {
            if depth == 0 {
                if !literal.is_empty() {
                    parts.push(Value::Str(std::mem::take(&mut literal)));
                }
            } else {
                reference.push_str("{{");
            }
            depth += 1;
            i += 2;
            continue;
        }
        if c == '}' && d == Some('}') {
            if depth == 0 {
                return Err(UnbalancedMarkers);
            }
            depth -= 1;
            if depth == 0 {
                parts.push(Value::Reference(reference.trim().to_string()));
                reference.clear();
            } else {
                reference.push_str("}}");
            }
            i += 2;
            continue;
        }
        if depth == 0 {
            literal.push(c);
        } else {
            reference.push(c);
        }
        i += 1;
    }
    if depth != 0 {
        return Err(UnbalancedMarkers);
    }
    if !literal.is_empty() {
        parts.push(Value::Str(literal));
    }
    Ok(Some(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ext(input: &str) -> Value {
        parse(input, Dialect::Extended).expect("parse failed")
    }

    #[test]
    fn scalars() {
        assert_eq!(parse_ext("1"), Value::Int(1));
        assert_eq!(parse_ext("1.5"), Value::Float(1.5));
        assert_eq!(parse_ext("\"x\""), Value::Str("x".into()));
        assert_eq!(parse_ext("true"), Value::Bool(true));
        assert_eq!(parse_ext("null"), Value::Null);
    }

    #[test]
    fn empty_input_is_null() {
        assert_eq!(parse_ext(""), Value::Null);
        assert_eq!(parse_ext("   \n "), Value::Null);
    }

    #[test]
    fn nested_structures() {
        let v = parse_ext(r#"{ "a": [1, 2, { "b": null }], "c": {} }"#);
        let map = v.as_map().expect("map");
        let list = map["a"].as_list().expect("list");
        assert_eq!(list.len(), 3);
        assert!(map["c"].as_map().expect("inner map").is_empty());
    }

    #[test]
    fn bare_identifier_keys() {
        let v = parse_ext("{ host: \"localhost\", port: 5432 }");
        let map = v.as_map().expect("map");
        assert_eq!(map["host"], Value::Str("localhost".into()));
        assert_eq!(map["port"], Value::Int(5432));
    }

    #[test]
    fn trailing_commas_match_plain_form() {
        for (with, without) in [
            ("[1, 2, 3,]", "[1, 2, 3]"),
            ("{\"a\": 1,}", "{\"a\": 1}"),
            ("[[1,],]", "[[1]]"),
            ("{\"a\": {\"b\": [1, 2,],},}", "{\"a\": {\"b\": [1, 2]}}"),
        ] {
            assert_eq!(parse_ext(with), parse_ext(without), "input: {with}");
        }
    }

    #[test]
    fn strict_rejects_trailing_comma() {
        let err = parse("[1, 2,]", Dialect::Strict).unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { .. }), "{err:?}");
        assert!(parse("[1, 2]", Dialect::Strict).is_ok());
    }

    #[test]
    fn multi_line_values() {
        let v = parse_ext("[\n  1,\n  2,\n]");
        assert_eq!(v, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn bare_reference_value() {
        assert_eq!(parse_ext("{{ ITEMS }}"), Value::Reference("ITEMS".into()));
    }

    #[test]
    fn quoted_string_with_reference_becomes_concat() {
        let v = parse_ext(r#""{{ NAME }}_user""#);
        assert_eq!(
            v,
            Value::Concat(vec![
                Value::Reference("NAME".into()),
                Value::Str("_user".into()),
            ])
        );
    }

    #[test]
    fn quoted_string_that_is_only_a_reference_stays_textual() {
        let v = parse_ext(r#""{{ ITEMS }}""#);
        assert_eq!(v, Value::Concat(vec![Value::Reference("ITEMS".into())]));
    }

    #[test]
    fn nested_reference_inside_string() {
        let v = parse_ext(r#""{{ A.{{ B }} }}-x""#);
        assert_eq!(
            v,
            Value::Concat(vec![
                Value::Reference("A.{{ B }}".into()),
                Value::Str("-x".into()),
            ])
        );
    }

    #[test]
    fn unbalanced_reference_in_string() {
        let err = parse(r#""{{ A ""#, Dialect::Extended).unwrap_err();
        assert!(matches!(err, ParseError::UnbalancedReference { .. }));
    }

    #[test]
    fn strict_leaves_reference_markers_alone() {
        let v = parse(r#""{{ A }}""#, Dialect::Strict).expect("parse");
        assert_eq!(v, Value::Str("{{ A }}".into()));
    }

    #[test]
    fn extraneous_data() {
        let err = parse_ext_err("1 2");
        assert!(matches!(err, ParseError::Extraneous { .. }));
    }

    fn parse_ext_err(input: &str) -> ParseError {
        parse(input, Dialect::Extended).unwrap_err()
    }

    #[test]
    fn cut_off_input_is_eof() {
        assert!(parse_ext_err("[1,").is_eof());
        assert!(parse_ext_err("{").is_eof());
        assert!(parse_ext_err("{\"a\":").is_eof());
    }

    #[test]
    fn error_carries_position() {
        let err = parse_ext_err("[1, :]");
        match err {
            ParseError::Unexpected {
                location, found, ..
            } => {
                assert_eq!(location.line, 1);
                assert_eq!(location.column, 5);
                assert_eq!(found, "`:`");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let v = parse_ext(r#"{ "a": 1, "a": 2 }"#);
        assert_eq!(v.as_map().expect("map")["a"], Value::Int(2));
    }

    #[test]
    fn split_plain_string() {
        assert_eq!(split_interpolated("plain"), Ok(None));
    }

    #[test]
    fn split_unbalanced() {
        assert_eq!(split_interpolated("{{ a"), Err(UnbalancedMarkers));
        assert_eq!(split_interpolated("{{ a }} }}"), Err(UnbalancedMarkers));
        // Without an opening marker the text is literal.
        assert_eq!(split_interpolated("a }} b"), Ok(None));
    }
}
