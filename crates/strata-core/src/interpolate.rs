//! In-place resolution of `{{ ... }}` references.
//!
//! The resolver walks every root key, replacing [`Value::Reference`] and
//! [`Value::Concat`] nodes with the values they point at. Resolved values
//! are written back into the document as they are produced, so shared
//! references resolve once. An explicit stack of in-progress paths
//! detects cycles; re-entering a path on the stack fails with
//! [`Error::CircularReference`] naming the whole chain.
//!
//! A bare reference splices the target value wholesale, lists and maps
//! included. A reference inside a string is textual: the target is
//! coerced to its canonical string form and concatenated. Independent
//! references resolve in document order; no other order is guaranteed.

use crate::document::Document;
use crate::error::Error;
use crate::path::{dynamic_segment, DottedPath, PathSyntaxError, Segment};
use indexmap::IndexMap;
use strata_lax::{split_interpolated, Value};
use tracing::debug;

/// Resolve every reference in the document, then rewrite map keys that
/// contain `{{ ... }}` groups.
pub(crate) fn interpolate(doc: &mut Document) -> Result<(), Error> {
    let keys: Vec<String> = doc.root().keys().cloned().collect();
    let mut stack = Vec::new();
    for key in keys {
        resolve_path(doc, &DottedPath::from_key(key), &mut stack)?;
    }
    rewrite_keys(doc)
}

/// Fully resolve the value at `path`, writing the result back into the
/// document, and return it.
pub(crate) fn resolve_path(
    doc: &mut Document,
    path: &DottedPath,
    stack: &mut Vec<String>,
) -> Result<Value, Error> {
    let path = concretize(doc, path, stack)?;
    let canonical = path.to_string();
    if let Some(pos) = stack.iter().position(|p| p == &canonical) {
        let mut chain = stack[pos..].to_vec();
        chain.push(canonical);
        return Err(Error::CircularReference { chain });
    }
    stack.push(canonical);

    // An ancestor may itself be a reference (`{{ A.b }}` where `A` is
    // `{{ C }}`); resolve such prefixes so the descent below can land.
    for depth in 1..path.len() {
        let prefix = path.prefix(depth);
        if matches!(
            doc.get(&prefix),
            Ok(Value::Reference(_) | Value::Concat(_))
        ) {
            let pending = doc.get(&prefix)?.clone();
            let resolved = resolve_value(doc, pending, stack)?;
            doc.set(&prefix, resolved)?;
        }
    }

    let value = doc.get(&path)?.clone();
    let resolved = resolve_value(doc, value, stack)?;
    doc.set(&path, resolved.clone())?;
    stack.pop();
    Ok(resolved)
}

fn resolve_value(
    doc: &mut Document,
    value: Value,
    stack: &mut Vec<String>,
) -> Result<Value, Error> {
    match value {
        Value::Reference(expr) => {
            debug!(reference = %expr, "resolving reference");
            let target = DottedPath::parse(&expr)?;
            resolve_path(doc, &target, stack)
        }
        Value::Concat(parts) => {
            let mut out = String::new();
            for part in parts {
                let resolved = resolve_value(doc, part, stack)?;
                out.push_str(&coerce_to_string(&resolved));
            }
            Ok(Value::Str(out))
        }
        Value::Str(s) => {
            // Strings acquired outside the parser (environment variables,
            // prompt input, defaults) may still carry markers.
            if !s.contains("{{") {
                return Ok(Value::Str(s));
            }
            match split_interpolated(&s) {
                Ok(Some(parts)) => resolve_value(doc, Value::Concat(parts), stack),
                Ok(None) => Ok(Value::Str(s)),
                Err(e) => Err(Error::PathSyntax(PathSyntaxError {
                    text: s,
                    reason: e.to_string(),
                })),
            }
        }
        Value::List(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_value(doc, item, stack)?);
            }
            Ok(Value::List(resolved))
        }
        Value::Map(entries) => {
            let mut resolved = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                resolved.insert(key, resolve_value(doc, item, stack)?);
            }
            Ok(Value::Map(resolved))
        }
        scalar => Ok(scalar),
    }
}

/// Resolve `{{ ... }}` groups inside the path's own key segments
/// (dynamic keys like `A.{{ B }}.x`).
fn concretize(
    doc: &mut Document,
    path: &DottedPath,
    stack: &mut Vec<String>,
) -> Result<DottedPath, Error> {
    if !path.has_references() {
        return Ok(path.clone());
    }
    let mut segments = Vec::with_capacity(path.len());
    for segment in path.segments() {
        match segment {
            Segment::Key(key) if key.contains("{{") => {
                let text = resolve_embedded(doc, key, stack)?;
                segments.push(dynamic_segment(text));
            }
            other => segments.push(other.clone()),
        }
    }
    Ok(DottedPath::from_segments(segments))
}

/// Resolve the `{{ ... }}` groups in a piece of text to their string
/// forms and splice them in place.
fn resolve_embedded(
    doc: &mut Document,
    text: &str,
    stack: &mut Vec<String>,
) -> Result<String, Error> {
    match split_interpolated(text) {
        Ok(Some(parts)) => {
            let mut out = String::new();
            for part in parts {
                let resolved = resolve_value(doc, part, stack)?;
                out.push_str(&coerce_to_string(&resolved));
            }
            Ok(out)
        }
        Ok(None) => Ok(text.to_string()),
        Err(e) => Err(Error::PathSyntax(PathSyntaxError {
            text: text.to_string(),
            reason: e.to_string(),
        })),
    }
}

/// Canonical string form for textual interpolation: strings splice raw,
/// everything else renders through the encoder.
pub(crate) fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => strata_lax::encode(other),
    }
}

/// Rewrite map keys containing `{{ ... }}` groups, at every level.
///
/// Runs after value resolution, so key references look up already
/// resolved values. Entry order is preserved; a rewritten key that
/// collides with an existing one wins.
fn rewrite_keys(doc: &mut Document) -> Result<(), Error> {
    let mut lookup = doc.clone();
    let root = std::mem::take(doc.root_mut());
    let mut new_root = IndexMap::with_capacity(root.len());
    for (key, mut value) in root {
        rewrite_value_keys(&mut lookup, &mut value)?;
        new_root.insert(resolve_key(&mut lookup, &key)?, value);
    }
    *doc.root_mut() = new_root;
    Ok(())
}

fn rewrite_value_keys(lookup: &mut Document, value: &mut Value) -> Result<(), Error> {
    match value {
        Value::Map(entries) => {
            let old = std::mem::take(entries);
            for (key, mut item) in old {
                rewrite_value_keys(lookup, &mut item)?;
                entries.insert(resolve_key(lookup, &key)?, item);
            }
        }
        Value::List(items) => {
            for item in items {
                rewrite_value_keys(lookup, item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn resolve_key(lookup: &mut Document, key: &str) -> Result<String, Error> {
    if !key.contains("{{") {
        return Ok(key.to_string());
    }
    resolve_embedded(lookup, key, &mut Vec::new())
}
