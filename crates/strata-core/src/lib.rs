//! Layered settings resolution.
//!
//! Strata lets an application keep configuration (including secrets) out
//! of its code. Values come from layered settings files, environment
//! variables, declared defaults, or an interactive prompt, and support
//! `{{ path }}` interpolation across the composed document.
//!
//! The pipeline, in order:
//!
//! 1. **Compose** ([`compose`]): follow the `extends` chain base-first
//!    and merge each file's assignments over the accumulated
//!    [`Document`], with `APPEND` / `PREPEND` / `SWAP` / `DELETE`
//!    directive semantics.
//! 2. **Interpolate**: resolve every `{{ ... }}` reference in place,
//!    with cycle detection.
//! 3. **Reconcile**: match the document against the host's declared
//!    [`Placeholder`]s, applying validators and defaults and prompting
//!    for what's still missing.
//!
//! [`resolve`] runs the whole pipeline; the pieces are public for hosts
//! that need less.
//!
//! The engine is single-threaded and synchronous; the only suspension
//! point is the [`Prompt`] callback. Concurrent resolution runs need no
//! locking as long as each works on its own [`Document`].

mod compose;
mod document;
mod error;
mod interpolate;
mod path;
mod placeholder;
mod reconcile;
mod resolve;

pub use compose::{compose, FileSpec};
pub use document::Document;
pub use error::{Error, MissingSetting};
pub use path::{Directive, DottedPath, PathError, PathSyntaxError, Segment};
pub use placeholder::{
    Declarations, Declared, DefaultValue, Generator, Placeholder, PlaceholderKind, Validator,
};
pub use reconcile::Prompt;
pub use resolve::{resolve, Options};

pub use strata_lax::{Dialect, Value};
