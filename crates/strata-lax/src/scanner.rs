//! Token scanner for the lax notation.
//!
//! Produces a lazy stream of [`Token`]s with source positions. The scanner
//! is restartable per input: create a new [`Scanner`] for each file or
//! value string.

use crate::error::{LexError, Location};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};

/// Which grammar the scanner and parser accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// The full notation: comments, trailing commas, bare dates, extended
    /// numeric literals, bare identifier keys, `{{ ... }}` references.
    #[default]
    Extended,
    /// Strict JSON. Every extension above is rejected.
    Strict,
}

impl Dialect {
    pub fn extras(self) -> bool {
        matches!(self, Dialect::Extended)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Equals,
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Bool(bool),
    Null,
    /// Bare identifier, usable as a map key in the extended dialect.
    Ident(String),
    /// A `{{ ... }}` group, scanned to its matching close with nesting.
    /// Holds the trimmed inner text.
    Reference(String),
}

impl TokenKind {
    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LeftBrace => "`{`".into(),
            TokenKind::RightBrace => "`}`".into(),
            TokenKind::LeftBracket => "`[`".into(),
            TokenKind::RightBracket => "`]`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::Colon => "`:`".into(),
            TokenKind::Equals => "`=`".into(),
            TokenKind::Str(_) => "a string".into(),
            TokenKind::Int(_) | TokenKind::Float(_) => "a number".into(),
            TokenKind::Date(_) | TokenKind::DateTime(_) => "a date".into(),
            TokenKind::Bool(_) => "a boolean".into(),
            TokenKind::Null => "null".into(),
            TokenKind::Ident(word) => format!("`{word}`"),
            TokenKind::Reference(_) => "a reference".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    dialect: Dialect,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str, dialect: Dialect) -> Self {
        Scanner {
            src,
            pos: 0,
            line: 1,
            column: 1,
            dialect,
        }
    }

    pub fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n' | '\u{0b}' | '\u{0c}') => self.bump(),
                Some('/') if self.dialect.extras() && self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Scan the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia();
        let location = self.location();
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let kind = match c {
            '{' if self.dialect.extras() && self.peek2() == Some('{') => self.scan_reference()?,
            '{' => {
                self.bump();
                TokenKind::LeftBrace
            }
            '}' => {
                self.bump();
                TokenKind::RightBrace
            }
            '[' => {
                self.bump();
                TokenKind::LeftBracket
            }
            ']' => {
                self.bump();
                TokenKind::RightBracket
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            ':' => {
                self.bump();
                TokenKind::Colon
            }
            '=' => {
                self.bump();
                TokenKind::Equals
            }
            '"' => self.scan_string()?,
            '0'..='9' => self.scan_number_or_date()?,
            '+' | '-' => self.scan_signed()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_word()?,
            other => return Err(LexError::UnknownChar { location, ch: other }),
        };
        Ok(Some(Token { kind, location }))
    }

    /// Eagerly scan the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn scan_string(&mut self) -> Result<TokenKind, LexError> {
        let start = self.location();
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::UnterminatedString(start));
            };
            match c {
                '"' => {
                    self.bump();
                    break;
                }
                '\n' => return Err(LexError::UnterminatedString(start)),
                '\\' => {
                    self.bump();
                    let escape_loc = self.location();
                    let Some(e) = self.peek() else {
                        return Err(LexError::UnterminatedString(start));
                    };
                    self.bump();
                    match e {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        'b' => out.push('\u{0008}'),
                        'f' => out.push('\u{000c}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => out.push(self.scan_unicode_escape(escape_loc)?),
                        other => {
                            return Err(LexError::InvalidEscape {
                                location: escape_loc,
                                escape: other,
                            });
                        }
                    }
                }
                c if (c as u32) < 0x20 => {
                    return Err(LexError::ControlCharacter(self.location()));
                }
                c => {
                    self.bump();
                    out.push(c);
                }
            }
        }
        Ok(TokenKind::Str(out))
    }

    fn hex4(&mut self, location: Location) -> Result<u32, LexError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or(LexError::InvalidEscape {
                    location,
                    escape: 'u',
                })?;
            self.bump();
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn scan_unicode_escape(&mut self, location: Location) -> Result<char, LexError> {
        let invalid = LexError::InvalidEscape {
            location,
            escape: 'u',
        };
        let high = self.hex4(location)?;
        if (0xD800..=0xDBFF).contains(&high) {
            // Surrogate pair: a second \uXXXX must follow.
            if self.peek() != Some('\\') || self.peek2() != Some('u') {
                return Err(invalid);
            }
            self.bump();
            self.bump();
            let low = self.hex4(location)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(invalid);
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code).ok_or(invalid);
        }
        char::from_u32(high).ok_or(invalid)
    }

    fn scan_reference(&mut self) -> Result<TokenKind, LexError> {
        let start = self.location();
        self.bump();
        self.bump();
        let mut depth = 1usize;
        let mut inner = String::new();
        loop {
            match (self.peek(), self.peek2()) {
                (Some('{'), Some('{')) => {
                    depth += 1;
                    inner.push_str("{{");
                    self.bump();
                    self.bump();
                }
                (Some('}'), Some('}')) => {
                    self.bump();
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    inner.push_str("}}");
                }
                (Some(c), _) => {
                    inner.push(c);
                    self.bump();
                }
                (None, _) => return Err(LexError::UnterminatedReference(start)),
            }
        }
        Ok(TokenKind::Reference(inner.trim().to_string()))
    }

    fn scan_word(&mut self) -> Result<TokenKind, LexError> {
        let location = self.location();
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let extras = self.dialect.extras();
        match word.as_str() {
            "true" => Ok(TokenKind::Bool(true)),
            "false" => Ok(TokenKind::Bool(false)),
            "null" => Ok(TokenKind::Null),
            "inf" | "Infinity" if extras => Ok(TokenKind::Float(f64::INFINITY)),
            "nan" | "NaN" if extras => Ok(TokenKind::Float(f64::NAN)),
            _ if extras => Ok(TokenKind::Ident(word)),
            _ => Err(LexError::UnknownChar {
                location,
                ch: word.chars().next().unwrap_or('?'),
            }),
        }
    }

    fn scan_signed(&mut self) -> Result<TokenKind, LexError> {
        let location = self.location();
        let sign = self.peek().unwrap_or('-');
        if sign == '+' && !self.dialect.extras() {
            return Err(LexError::UnknownChar { location, ch: '+' });
        }
        self.bump();
        let negative = sign == '-';
        match self.peek() {
            Some('0'..='9') => self.scan_number_body(location, negative),
            Some(c) if self.dialect.extras() && c.is_ascii_alphabetic() => {
                match self.scan_word()? {
                    TokenKind::Float(f) if f.is_infinite() => {
                        Ok(TokenKind::Float(if negative { -f } else { f }))
                    }
                    TokenKind::Float(f) if f.is_nan() => Ok(TokenKind::Float(f)),
                    other => Err(LexError::MalformedNumber {
                        location,
                        text: format!("{sign}{}", other.describe()),
                    }),
                }
            }
            _ => Err(LexError::MalformedNumber {
                location,
                text: sign.to_string(),
            }),
        }
    }

    fn scan_number_or_date(&mut self) -> Result<TokenKind, LexError> {
        if self.dialect.extras() {
            if let Some(kind) = self.try_scan_date()? {
                return Ok(kind);
            }
        }
        let location = self.location();
        self.scan_number_body(location, false)
    }

    fn scan_number_body(&mut self, location: Location, negative: bool) -> Result<TokenKind, LexError> {
        let extras = self.dialect.extras();
        if extras && self.peek() == Some('0') {
            if let Some(radix) = match self.peek2() {
                Some('b' | 'B') => Some(2),
                Some('o' | 'O') => Some(8),
                Some('x' | 'X') => Some(16),
                _ => None,
            } {
                return self.scan_radix(location, negative, radix);
            }
        }

        let mut text = String::new();
        self.collect_digits(&mut text, extras);
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.bump();
            self.collect_digits(&mut text, extras);
        }
        if self.exponent_follows() {
            is_float = true;
            text.push('e');
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.bump();
            }
            self.collect_digits(&mut text, extras);
        }

        let malformed = |text: &str| LexError::MalformedNumber {
            location,
            text: text.to_string(),
        };
        if !valid_underscores(&text) {
            return Err(malformed(&text));
        }
        let clean = text.replace('_', "");
        if !extras {
            let int_part = clean.split(['.', 'e']).next().unwrap_or("");
            if int_part.len() > 1 && int_part.starts_with('0') {
                return Err(malformed(&text));
            }
        }
        if is_float {
            let value: f64 = clean.parse().map_err(|_| malformed(&text))?;
            Ok(TokenKind::Float(if negative { -value } else { value }))
        } else {
            let value: i64 = clean.parse().map_err(|_| malformed(&text))?;
            Ok(TokenKind::Int(if negative { -value } else { value }))
        }
    }

    fn collect_digits(&mut self, into: &mut String, underscores: bool) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || (underscores && c == '_') {
                into.push(c);
                self.bump();
            } else {
                break;
            }
        }
    }

    fn exponent_follows(&self) -> bool {
        let mut chars = self.src[self.pos..].chars();
        if !matches!(chars.next(), Some('e' | 'E')) {
            return false;
        }
        match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn scan_radix(&mut self, location: Location, negative: bool, radix: u32) -> Result<TokenKind, LexError> {
        self.bump(); // 0
        self.bump(); // b / o / x
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let malformed = LexError::MalformedNumber {
            location,
            text: text.clone(),
        };
        if text.contains("__") || text.ends_with('_') {
            return Err(malformed);
        }
        let clean = text.replace('_', "");
        if clean.is_empty() {
            return Err(malformed);
        }
        let value = i64::from_str_radix(&clean, radix).map_err(|_| malformed)?;
        Ok(TokenKind::Int(if negative { -value } else { value }))
    }

    fn try_scan_date(&mut self) -> Result<Option<TokenKind>, LexError> {
        let location = self.location();
        let rest = &self.src[self.pos..];
        let Some(len) = date_prefix_len(rest) else {
            return Ok(None);
        };
        // Trailing alphanumerics mean this isn't a clean literal.
        if rest[len..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            let junk_len = rest
                .find(|c: char| c.is_whitespace() || ",]}:".contains(c))
                .unwrap_or(rest.len());
            return Err(LexError::MalformedDate {
                location,
                text: rest[..junk_len].to_string(),
            });
        }
        let text = rest[..len].to_string();
        let kind = parse_date_text(&text).ok_or(LexError::MalformedDate {
            location,
            text: text.clone(),
        })?;
        for _ in 0..len {
            self.bump();
        }
        Ok(Some(kind))
    }
}

/// Length of a leading date/date-time shape in `rest`, if any.
///
/// Matches `YYYY-MM`, `YYYY-MM-DD`, and those followed by
/// `THH:MM[:SS[.f+]][Z|±HH:MM]`. Shape only; range validation happens in
/// [`parse_date_text`].
fn date_prefix_len(rest: &str) -> Option<usize> {
    let b = rest.as_bytes();
    let digit = |i: usize| b.get(i).is_some_and(u8::is_ascii_digit);
    if !(digit(0) && digit(1) && digit(2) && digit(3)) {
        return None;
    }
    if b.get(4) != Some(&b'-') || !(digit(5) && digit(6)) {
        return None;
    }
    let mut i = 7;
    if b.get(i) == Some(&b'-') && digit(i + 1) && digit(i + 2) {
        i += 3;
    }
    if b.get(i) == Some(&b'T') && digit(i + 1) && digit(i + 2) && b.get(i + 3) == Some(&b':') && digit(i + 4) && digit(i + 5) {
        i += 6;
        if b.get(i) == Some(&b':') && digit(i + 1) && digit(i + 2) {
            i += 3;
            if b.get(i) == Some(&b'.') && digit(i + 1) {
                i += 1;
                while digit(i) {
                    i += 1;
                }
            }
        }
        if b.get(i) == Some(&b'Z') {
            i += 1;
        } else if matches!(b.get(i), Some(&b'+' | &b'-'))
            && digit(i + 1)
            && digit(i + 2)
            && b.get(i + 3) == Some(&b':')
            && digit(i + 4)
            && digit(i + 5)
        {
            i += 6;
        }
    }
    Some(i)
}

fn parse_date_text(text: &str) -> Option<TokenKind> {
    let (date_text, time_text) = match text.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };
    let mut parts = date_text.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = match parts.next() {
        Some(d) => d.parse().ok()?,
        None => 1,
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let Some(time_text) = time_text else {
        return Some(TokenKind::Date(date));
    };

    let (time_text, offset_secs) = if let Some(stripped) = time_text.strip_suffix('Z') {
        (stripped, 0)
    } else if let Some(pos) = time_text.rfind(['+', '-']) {
        let (t, off) = time_text.split_at(pos);
        let sign = if off.starts_with('-') { -1 } else { 1 };
        let (hh, mm) = off[1..].split_once(':')?;
        let hh: i32 = hh.parse().ok()?;
        let mm: i32 = mm.parse().ok()?;
        (t, sign * (hh * 3600 + mm * 60))
    } else {
        (time_text, 0)
    };

    let mut pieces = time_text.split(':');
    let hour: u32 = pieces.next()?.parse().ok()?;
    let minute: u32 = pieces.next()?.parse().ok()?;
    let (second, nano) = match pieces.next() {
        Some(sec) => match sec.split_once('.') {
            Some((s, frac)) => {
                let mut frac = frac.to_string();
                if frac.len() > 9 {
                    frac.truncate(9);
                }
                while frac.len() < 9 {
                    frac.push('0');
                }
                (s.parse().ok()?, frac.parse().ok()?)
            }
            None => (sec.parse().ok()?, 0),
        },
        None => (0, 0),
    };
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nano)?;
    let offset = FixedOffset::east_opt(offset_secs)?;
    date.and_time(time)
        .and_local_timezone(offset)
        .single()
        .map(TokenKind::DateTime)
}

/// Every `_` must sit between two digits.
fn valid_underscores(text: &str) -> bool {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let prev_digit = i > 0 && bytes[i - 1].is_ascii_digit();
            let next_digit = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
            if !prev_digit || !next_digit {
                return false;
            }
        }
    }
    true
}
