//! Tolerant JSON-superset value notation for Strata settings files.
//!
//! The notation is JSON plus the extensions settings files want in
//! practice: `//` comments, trailing commas, bare ISO-8601 dates and
//! date-times, extended numeric literals (`1_000`, `0xff`, `+1`, `inf`),
//! bare identifier keys, and `{{ path }}` interpolation references.
//! A strict mode ([`Dialect::Strict`]) shrinks the accepted language to
//! exactly JSON.
//!
//! This crate only scans, parses, and re-encodes values. Reference
//! resolution, dotted-path addressing, and file composition live in
//! `strata-core`.

mod encode;
mod error;
mod parser;
mod scanner;
mod value;

pub use encode::encode;
pub use error::{LexError, Location, ParseError};
pub use parser::{parse, split_interpolated, UnbalancedMarkers};
pub use scanner::{Dialect, Scanner, Token, TokenKind};
pub use value::Value;
