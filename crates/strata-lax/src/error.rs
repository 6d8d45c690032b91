//! Error types for scanning and parsing, with source positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A position in source text (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number in characters, starting at 1.
    pub column: u32,
    /// Byte offset from the start of the input.
    pub offset: usize,
}

impl Location {
    pub fn start() -> Self {
        Location {
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// Shift the line number down by `lines`.
    ///
    /// Used when a value was cut out of a larger file so errors report
    /// positions in the file rather than in the extracted text.
    pub fn add_lines(mut self, lines: u32) -> Self {
        self.line += lines;
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Errors produced by the token scanner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unterminated string at {0}")]
    UnterminatedString(Location),

    #[error("invalid escape `\\{escape}` at {location}")]
    InvalidEscape { location: Location, escape: char },

    #[error("unescaped control character at {0}")]
    ControlCharacter(Location),

    #[error("malformed number `{text}` at {location}")]
    MalformedNumber { location: Location, text: String },

    #[error("malformed date/time `{text}` at {location}")]
    MalformedDate { location: Location, text: String },

    #[error("unterminated `{{{{ ... }}}}` reference at {0}")]
    UnterminatedReference(Location),

    #[error("unknown character `{ch}` at {location}")]
    UnknownChar { location: Location, ch: char },
}

impl LexError {
    pub fn location(&self) -> Location {
        match self {
            LexError::UnterminatedString(loc)
            | LexError::ControlCharacter(loc)
            | LexError::UnterminatedReference(loc) => *loc,
            LexError::InvalidEscape { location, .. }
            | LexError::MalformedNumber { location, .. }
            | LexError::MalformedDate { location, .. }
            | LexError::UnknownChar { location, .. } => *location,
        }
    }

    pub fn add_lines(mut self, lines: u32) -> Self {
        let loc = match &mut self {
            LexError::UnterminatedString(loc)
            | LexError::ControlCharacter(loc)
            | LexError::UnterminatedReference(loc) => loc,
            LexError::InvalidEscape { location, .. }
            | LexError::MalformedNumber { location, .. }
            | LexError::MalformedDate { location, .. }
            | LexError::UnknownChar { location, .. } => location,
        };
        *loc = loc.add_lines(lines);
        self
    }
}

/// Errors produced by the structured-value parser.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, found {found} at {location}")]
    Unexpected {
        location: Location,
        expected: String,
        found: String,
    },

    /// The input ended inside an unfinished value.
    ///
    /// Distinguished from other errors so line-oriented readers can
    /// accumulate continuation lines for multi-line values.
    #[error("unexpected end of input (expected {expected})")]
    UnexpectedEof { expected: String },

    #[error("extraneous data at {location}")]
    Extraneous { location: Location },

    #[error("unbalanced `{{{{ ... }}}}` in string at {location}")]
    UnbalancedReference { location: Location },
}

impl ParseError {
    pub fn location(&self) -> Option<Location> {
        match self {
            ParseError::Lex(e) => Some(e.location()),
            ParseError::Unexpected { location, .. }
            | ParseError::Extraneous { location }
            | ParseError::UnbalancedReference { location } => Some(*location),
            ParseError::UnexpectedEof { .. } => None,
        }
    }

    /// Whether this error means the input was cut off mid-value.
    pub fn is_eof(&self) -> bool {
        matches!(self, ParseError::UnexpectedEof { .. })
    }

    pub fn add_lines(self, lines: u32) -> Self {
        match self {
            ParseError::Lex(e) => ParseError::Lex(e.add_lines(lines)),
            ParseError::Unexpected {
                location,
                expected,
                found,
            } => ParseError::Unexpected {
                location: location.add_lines(lines),
                expected,
                found,
            },
            ParseError::Extraneous { location } => ParseError::Extraneous {
                location: location.add_lines(lines),
            },
            ParseError::UnbalancedReference { location } => ParseError::UnbalancedReference {
                location: location.add_lines(lines),
            },
            eof @ ParseError::UnexpectedEof { .. } => eof,
        }
    }
}
