//! Placeholder declarations supplied by the host.
//!
//! A placeholder marks a settings path whose value comes from outside the
//! code: a settings file, an environment variable, or an interactive
//! prompt. The host declares them once per process as a nested mapping
//! ([`Declarations`]); the engine treats them as read-only.

use crate::document::Document;
use crate::error::Error;
use crate::path::{DottedPath, Segment};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use strata_lax::Value;

/// How a placeholder may be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// From a settings file or, when missing, an interactive prompt.
    Local,
    /// Like `Local`, but the value is sensitive: literal defaults are
    /// rejected and the value is excluded from printed representations.
    Secret,
    /// Only from a named environment variable, never from files.
    Env,
}

/// Validates a candidate value; the `Err` string becomes the
/// `ValidationError` reason.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Produces a fresh default value. Secret defaults must be generators so
/// the same secret never ends up in two environments.
pub type Generator = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub enum DefaultValue {
    #[default]
    None,
    Literal(Value),
    Generated(Generator),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::None => f.write_str("None"),
            DefaultValue::Literal(v) => write!(f, "Literal({v:?})"),
            DefaultValue::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// A declared settings placeholder.
#[derive(Clone)]
pub struct Placeholder {
    kind: PlaceholderKind,
    default: DefaultValue,
    validator: Option<Validator>,
    doc: Option<String>,
    env_var: Option<String>,
    prompt: bool,
}

impl Placeholder {
    pub fn local() -> Self {
        Placeholder {
            kind: PlaceholderKind::Local,
            default: DefaultValue::None,
            validator: None,
            doc: None,
            env_var: None,
            prompt: true,
        }
    }

    pub fn secret() -> Self {
        Placeholder {
            kind: PlaceholderKind::Secret,
            ..Placeholder::local()
        }
    }

    /// A placeholder satisfied only by the named environment variable.
    pub fn env(var: impl Into<String>) -> Self {
        Placeholder {
            kind: PlaceholderKind::Env,
            env_var: Some(var.into()),
            prompt: false,
            ..Placeholder::local()
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Literal(value.into());
        self
    }

    pub fn with_generator(
        mut self,
        generator: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        self.default = DefaultValue::Generated(Arc::new(generator));
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Don't prompt for this placeholder even on an interactive channel.
    pub fn no_prompt(mut self) -> Self {
        self.prompt = false;
        self
    }

    pub fn kind(&self) -> PlaceholderKind {
        self.kind
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn env_var(&self) -> Option<&str> {
        self.env_var.as_deref()
    }

    pub fn prompts(&self) -> bool {
        self.prompt && self.kind != PlaceholderKind::Env
    }

    pub fn has_default(&self) -> bool {
        !matches!(self.default, DefaultValue::None)
    }

    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match &self.validator {
            Some(validator) => validator(value),
            None => Ok(()),
        }
    }

    /// Produce the declared default, invoking the generator each time so
    /// secret defaults are fresh per resolution.
    pub(crate) fn materialize_default(&self) -> Option<Value> {
        match &self.default {
            DefaultValue::None => None,
            DefaultValue::Literal(value) => Some(value.clone()),
            DefaultValue::Generated(generator) => Some(generator()),
        }
    }

    /// A Secret placeholder with a literal default is a declaration bug.
    fn check(&self, path: &str) -> Result<(), Error> {
        if self.kind == PlaceholderKind::Secret
            && matches!(self.default, DefaultValue::Literal(_))
        {
            return Err(Error::SecretDefault {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Placeholder");
        s.field("kind", &self.kind);
        if self.kind == PlaceholderKind::Secret {
            // Secrets never show their default in logs or dumps.
            s.field("default", &"<redacted>");
        } else {
            s.field("default", &self.default);
        }
        s.field("doc", &self.doc)
            .field("env_var", &self.env_var)
            .field("prompt", &self.prompt)
            .finish()
    }
}

/// One node of the host's declaration tree.
#[derive(Debug, Clone)]
pub enum Declared {
    /// A plain base value, seeded into the document before composition.
    Value(Value),
    Placeholder(Placeholder),
    Map(IndexMap<String, Declared>),
    List(Vec<Declared>),
}

/// The host's nested mapping of base values and placeholders.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    root: IndexMap<String, Declared>,
}

impl Declarations {
    pub fn new() -> Self {
        Declarations::default()
    }

    /// Declare a placeholder at a dotted path.
    ///
    /// Secret placeholders with literal defaults are rejected here, at
    /// declaration time, before any file is ever read.
    pub fn declare(&mut self, path: &str, placeholder: Placeholder) -> Result<(), Error> {
        placeholder.check(path)?;
        self.insert(path, Declared::Placeholder(placeholder))
    }

    /// Seed a plain base value at a dotted path.
    pub fn value(&mut self, path: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.insert(path, Declared::Value(value.into()))
    }

    fn insert(&mut self, path: &str, node: Declared) -> Result<(), Error> {
        let parsed = DottedPath::parse(path)?;
        let mut current = &mut self.root;
        let segments = parsed.segments();
        for (i, segment) in segments.iter().enumerate() {
            let key = match segment {
                Segment::Key(k) => k.clone(),
                Segment::Index(n) => n.to_string(),
            };
            if i + 1 == segments.len() {
                current.insert(key, node);
                return Ok(());
            }
            let entry = current
                .entry(key)
                .or_insert_with(|| Declared::Map(IndexMap::new()));
            if !matches!(entry, Declared::Map(_)) {
                *entry = Declared::Map(IndexMap::new());
            }
            let Declared::Map(next) = entry else {
                unreachable!("entry was just made a map");
            };
            current = next;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Re-check every placeholder declaration. Run by `resolve` before
    /// any file is read.
    pub fn check(&self) -> Result<(), Error> {
        for (path, placeholder) in self.placeholders() {
            placeholder.check(&path.to_string())?;
        }
        Ok(())
    }

    /// Every declared placeholder with its path, in declaration order.
    pub(crate) fn placeholders(&self) -> Vec<(DottedPath, &Placeholder)> {
        let mut out = Vec::new();
        collect(&self.root, &mut Vec::new(), &mut out);
        return out;

        fn collect<'a>(
            map: &'a IndexMap<String, Declared>,
            prefix: &mut Vec<Segment>,
            out: &mut Vec<(DottedPath, &'a Placeholder)>,
        ) {
            for (key, node) in map {
                prefix.push(Segment::Key(key.clone()));
                visit(node, prefix, out);
                prefix.pop();
            }
        }

        fn visit<'a>(
            node: &'a Declared,
            prefix: &mut Vec<Segment>,
            out: &mut Vec<(DottedPath, &'a Placeholder)>,
        ) {
            match node {
                Declared::Placeholder(p) => {
                    out.push((DottedPath::from_segments(prefix.clone()), p));
                }
                Declared::Map(entries) => collect(entries, prefix, out),
                Declared::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        prefix.push(Segment::Index(i));
                        visit(item, prefix, out);
                        prefix.pop();
                    }
                }
                Declared::Value(_) => {}
            }
        }
    }

    /// Build the base document from the plain values in the tree.
    ///
    /// Placeholder slots inside lists become `null` so the list shape is
    /// kept; reconciliation fills them by index.
    pub(crate) fn base_document(&self) -> Document {
        let mut doc = Document::new();
        *doc.root_mut() = self
            .root
            .iter()
            .filter(|(_, node)| !matches!(node, Declared::Placeholder(_)))
            .map(|(k, node)| (k.clone(), node_value(node)))
            .collect();
        doc
    }
}

fn node_value(node: &Declared) -> Value {
    match node {
        Declared::Value(v) => v.clone(),
        Declared::Placeholder(_) => Value::Null,
        Declared::Map(entries) => Value::Map(
            entries
                .iter()
                .filter(|(_, n)| !matches!(n, Declared::Placeholder(_)))
                .map(|(k, n)| (k.clone(), node_value(n)))
                .collect(),
        ),
        Declared::List(items) => Value::List(items.iter().map(node_value).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_literal_default_rejected_at_declaration() {
        let mut decls = Declarations::new();
        let err = decls
            .declare("SECRET_KEY", Placeholder::secret().with_default("pants"))
            .unwrap_err();
        assert!(matches!(err, Error::SecretDefault { path } if path == "SECRET_KEY"));
    }

    #[test]
    fn secret_generator_default_is_fine() {
        let mut decls = Declarations::new();
        decls
            .declare(
                "SECRET_KEY",
                Placeholder::secret().with_generator(|| Value::Str("fresh".into())),
            )
            .expect("declare");
        decls.check().expect("check");
    }

    #[test]
    fn generator_runs_per_materialization() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let placeholder = Placeholder::secret().with_generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Int(7)
        });
        placeholder.materialize_default();
        placeholder.materialize_default();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn placeholders_walk_in_declaration_order() {
        let mut decls = Declarations::new();
        decls.declare("B", Placeholder::local()).expect("declare");
        decls
            .declare("A.inner", Placeholder::local())
            .expect("declare");
        decls.declare("A.other", Placeholder::local()).expect("declare");
        let paths: Vec<String> = decls
            .placeholders()
            .iter()
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(paths, ["B", "A.inner", "A.other"]);
    }

    #[test]
    fn base_document_holds_plain_values_only() {
        let mut decls = Declarations::new();
        decls.value("DEBUG", Value::Bool(false)).expect("value");
        decls.value("DATABASES.default.NAME", "app").expect("value");
        decls
            .declare("DATABASES.default.PASSWORD", Placeholder::secret())
            .expect("declare");
        let doc = decls.base_document();
        assert!(doc.contains(&DottedPath::parse("DEBUG").expect("path")));
        assert!(doc.contains(&DottedPath::parse("DATABASES.default.NAME").expect("path")));
        assert!(!doc.contains(&DottedPath::parse("DATABASES.default.PASSWORD").expect("path")));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let p = Placeholder::secret().with_generator(|| Value::Str("s3cr3t".into()));
        let debug = format!("{p:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn validator_reason_propagates() {
        let p = Placeholder::local().with_validator(|v| {
            if v.as_int().is_some_and(|i| i > 0) {
                Ok(())
            } else {
                Err("must be a positive int".into())
            }
        });
        assert!(p.validate(&Value::Int(3)).is_ok());
        assert_eq!(
            p.validate(&Value::Int(-1)).unwrap_err(),
            "must be a positive int"
        );
    }
}
