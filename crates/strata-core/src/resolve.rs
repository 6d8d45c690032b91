//! The resolution entry point.
//!
//! One call composes the settings-file chain over the host's base
//! values, applies environment variables to Env placeholders, resolves
//! interpolation, and reconciles the result against the declared
//! placeholders. Each call builds its own [`Document`]; nothing is
//! shared between runs.

use crate::compose::{compose_into, FileSpec};
use crate::document::Document;
use crate::error::Error;
use crate::interpolate::interpolate;
use crate::placeholder::{Declarations, PlaceholderKind};
use crate::reconcile::{reconcile, Prompt};
use std::collections::HashMap;
use strata_lax::{Dialect, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Value syntax accepted in files, environment variables, and
    /// prompt input. [`Dialect::Strict`] shrinks it to plain JSON.
    pub dialect: Dialect,
    /// Overrides the section named in the file spec.
    pub section: Option<String>,
    /// Cap on prompt attempts per placeholder; `None` keeps asking
    /// until the prompter gives up.
    pub max_prompt_attempts: Option<u32>,
}

/// Resolve settings from every source into one document.
///
/// Steps, in order: check declarations (a bad Secret default fails here,
/// before any file is read), seed the document with the declared base
/// values, compose the file chain, apply environment variables to Env
/// placeholders, resolve `{{ ... }}` interpolation, reconcile against
/// the placeholder declarations. The returned document is fully
/// materialised and ready for host injection (see
/// [`Document::to_json`]).
pub fn resolve(
    declarations: &Declarations,
    file: Option<&FileSpec>,
    env: &HashMap<String, String>,
    prompter: Option<&mut dyn Prompt>,
    options: &Options,
) -> Result<Document, Error> {
    declarations.check()?;
    let mut doc = declarations.base_document();

    if let Some(spec) = file {
        let spec = match &options.section {
            Some(section) => FileSpec::with_section(&spec.path, section.clone()),
            None => spec.clone(),
        };
        debug!(file = %spec, "composing settings file chain");
        compose_into(&mut doc, &spec, options.dialect)?;
    }

    apply_env(&mut doc, declarations, env, options)?;
    interpolate(&mut doc)?;
    reconcile(&mut doc, declarations, prompter, options)?;
    Ok(doc)
}

/// Satisfy Env placeholders from the caller-supplied environment map.
///
/// Env placeholders never take values from files: a file-provided value
/// at an Env path is dropped (with a warning) when the variable is
/// unset, and overwritten when it is set.
fn apply_env(
    doc: &mut Document,
    declarations: &Declarations,
    env: &HashMap<String, String>,
    options: &Options,
) -> Result<(), Error> {
    for (path, placeholder) in declarations.placeholders() {
        if placeholder.kind() != PlaceholderKind::Env {
            continue;
        }
        let Some(var) = placeholder.env_var() else {
            continue;
        };
        match env.get(var) {
            Some(raw) => {
                debug!(path = %path, var, "applying environment variable");
                doc.set(&path, decode_env(raw, options.dialect))?;
            }
            None => {
                if doc.contains(&path) {
                    warn!(path = %path, var, "ignoring file-provided value for env-only setting");
                    let _ = doc.delete(&path);
                }
            }
        }
    }
    Ok(())
}

/// Environment strings decode as lax values where possible and fall
/// back to plain strings (`8000` is an int, `hunter2` is a string).
fn decode_env(raw: &str, dialect: Dialect) -> Value {
    if raw.trim().is_empty() {
        return Value::Str(raw.to_string());
    }
    match strata_lax::parse(raw, dialect) {
        Ok(value) => value,
        Err(_) => Value::Str(raw.to_string()),
    }
}
