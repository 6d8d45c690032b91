//! Reconciliation of the composed document against the host's
//! placeholder declarations.
//!
//! Walks every declared placeholder in declaration order: values found
//! in the document are validated; missing ones are filled from declared
//! defaults or, on an interactive channel, prompted for. Whatever is
//! still unresolved after the full walk fails the run once, with an
//! aggregate [`Error::MissingSettings`] naming every path.

use crate::document::Document;
use crate::error::{Error, MissingSetting};
use crate::interpolate;
use crate::path::{DottedPath, PathError};
use crate::placeholder::{Declarations, Placeholder};
use crate::resolve::Options;
use strata_lax::Value;
use tracing::{debug, warn};

/// The interactive channel supplied by the host.
///
/// This is the engine's only suspension point: `ask` may block on
/// console input for as long as it likes. Returning `None` gives up on
/// the placeholder, which sends it to the aggregate missing-settings
/// error.
pub trait Prompt {
    /// Ask for raw text for the placeholder at `path`. When a previous
    /// attempt failed to decode or validate, `previous_error` carries
    /// the reason so it can be shown.
    fn ask(
        &mut self,
        path: &str,
        placeholder: &Placeholder,
        previous_error: Option<&str>,
    ) -> Option<String>;
}

pub(crate) fn reconcile(
    doc: &mut Document,
    declarations: &Declarations,
    mut prompter: Option<&mut dyn Prompt>,
    options: &Options,
) -> Result<(), Error> {
    let mut missing = Vec::new();
    for (path, placeholder) in declarations.placeholders() {
        let path_str = path.to_string();
        let current = match doc.get(&path) {
            // A null slot is an unfilled placeholder, not a value.
            Ok(Value::Null) => None,
            Ok(value) => Some(value.clone()),
            Err(PathError::NotFound { .. }) => None,
            Err(other) => return Err(Error::Path(other)),
        };

        if let Some(value) = current {
            if let Err(reason) = placeholder.validate(&value) {
                return Err(Error::Validation {
                    path: path_str,
                    reason,
                });
            }
            continue;
        }

        if let Some(default) = placeholder.materialize_default() {
            debug!(path = %path_str, "using declared default");
            set_resolved(doc, &path, default)?;
            continue;
        }

        if placeholder.prompts() {
            if let Some(prompter) = prompter.as_deref_mut() {
                if prompt_loop(doc, &path, placeholder, prompter, options)? {
                    continue;
                }
            }
        }

        missing.push(MissingSetting {
            path: path_str,
            kind: placeholder.kind(),
            doc: placeholder.doc().map(str::to_string),
            env_var: placeholder.env_var().map(str::to_string),
        });
    }

    if !missing.is_empty() {
        return Err(Error::MissingSettings(missing));
    }
    Ok(())
}

/// Keep asking until a value decodes and validates, the prompter gives
/// up, or the attempt cap is hit. Returns whether a value was set.
fn prompt_loop(
    doc: &mut Document,
    path: &DottedPath,
    placeholder: &Placeholder,
    prompter: &mut dyn Prompt,
    options: &Options,
) -> Result<bool, Error> {
    let path_str = path.to_string();
    let mut previous_error: Option<String> = None;
    let mut attempts = 0u32;
    loop {
        if let Some(max) = options.max_prompt_attempts {
            if attempts >= max {
                warn!(path = %path_str, attempts, "giving up on prompt");
                return Ok(false);
            }
        }
        attempts += 1;

        let Some(raw) = prompter.ask(&path_str, placeholder, previous_error.as_deref()) else {
            return Ok(false);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            previous_error = Some("a value is required".to_string());
            continue;
        }
        let value = match strata_lax::parse(raw, options.dialect) {
            Ok(value) => value,
            Err(e) => {
                previous_error = Some(e.to_string());
                continue;
            }
        };
        if let Err(reason) = placeholder.validate(&value) {
            previous_error = Some(reason);
            continue;
        }
        set_resolved(doc, path, value)?;
        return Ok(true);
    }
}

/// Set a late-arriving value (default or prompted) and resolve any
/// references it carries against the already-interpolated document.
fn set_resolved(doc: &mut Document, path: &DottedPath, value: Value) -> Result<(), Error> {
    doc.set(path, value)?;
    interpolate::resolve_path(doc, path, &mut Vec::new())?;
    Ok(())
}
