//! Failure message lookup.
//!
//! The runner asks a [`MessageLookup`] for a human-readable message whenever
//! a failure comes back without one. [`Catalog`] is the bundled
//! implementation: a tree of templates keyed by locale, scope and code,
//! usually loaded from YAML.
//!
//! ```yaml
//! en:
//!   errors:
//!     validation_failed: "Validation failed: %{count} problems"
//!     not_found: "Could not find %{name}"
//! ```
//!
//! `%{name}` placeholders are filled from the failure payload when the
//! payload is an object. Placeholders without a matching entry are left as
//! they are.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::outcome::Code;

/// Looks up failure messages.
pub trait MessageLookup {
    /// Returns the message for `code`, or `None` to use the default.
    fn translate(
        &self,
        code: &Code,
        locale: &str,
        scope: &[String],
        args: &Map<String, Value>,
    ) -> Option<String>;
}

/// Errors that can occur when loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The document is not valid YAML or not shaped like a catalog.
    #[error("invalid message catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The catalog file could not be read.
    #[error("failed to read message catalog {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Entry {
    Template(String),
    Nested(BTreeMap<String, Entry>),
}

impl Entry {
    fn get(&self, key: &str) -> Option<&Entry> {
        match self {
            Entry::Nested(children) => children.get(key),
            Entry::Template(_) => None,
        }
    }

    fn merge(&mut self, other: Entry) {
        match (self, other) {
            (Entry::Nested(children), Entry::Nested(incoming)) => {
                for (key, entry) in incoming {
                    match children.get_mut(&key) {
                        Some(existing) => existing.merge(entry),
                        None => {
                            children.insert(key, entry);
                        }
                    }
                }
            }
            (slot, other) => *slot = other,
        }
    }

    fn insert(&mut self, path: &[&str], template: String) {
        let Some((head, rest)) = path.split_first() else {
            *self = Entry::Template(template);
            return;
        };

        if let Entry::Template(_) = self {
            *self = Entry::Nested(BTreeMap::new());
        }
        if let Entry::Nested(children) = self {
            children
                .entry((*head).to_string())
                .or_insert_with(|| Entry::Nested(BTreeMap::new()))
                .insert(rest, template);
        }
    }
}

/// A tree of message templates.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    locales: BTreeMap<String, Entry>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from a YAML document rooted at locale names.
    pub fn from_yaml_str(source: &str) -> Result<Self, CatalogError> {
        if source.trim().is_empty() {
            return Ok(Self::new());
        }
        let locales = serde_yaml::from_str(source)?;
        Ok(Self { locales })
    }

    /// Loads a catalog from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| CatalogError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    /// Merges another catalog into this one. Templates from `other` win.
    pub fn merge(mut self, other: Catalog) -> Self {
        for (locale, entry) in other.locales {
            match self.locales.get_mut(&locale) {
                Some(existing) => existing.merge(entry),
                None => {
                    self.locales.insert(locale, entry);
                }
            }
        }
        self
    }

    /// Adds a template under a dot-separated key, replacing any existing
    /// entry at that key.
    pub fn with_message(
        mut self,
        locale: impl Into<String>,
        key: &str,
        template: impl Into<String>,
    ) -> Self {
        let path: Vec<&str> = key.split('.').filter(|s| !s.is_empty()).collect();
        self.locales
            .entry(locale.into())
            .or_insert_with(|| Entry::Nested(BTreeMap::new()))
            .insert(&path, template.into());
        self
    }

    /// Returns the raw template for `code`, if there is one.
    pub fn template(&self, code: &Code, locale: &str, scope: &[String]) -> Option<&str> {
        let mut entry = self.locales.get(locale)?;
        for segment in scope {
            entry = entry.get(segment)?;
        }
        match entry.get(code.as_str())? {
            Entry::Template(template) => Some(template),
            Entry::Nested(_) => None,
        }
    }
}

impl MessageLookup for Catalog {
    fn translate(
        &self,
        code: &Code,
        locale: &str,
        scope: &[String],
        args: &Map<String, Value>,
    ) -> Option<String> {
        self.template(code, locale, scope)
            .map(|template| interpolate(template, args))
    }
}

/// Fills `%{name}` placeholders from `args`.
///
/// String values are inserted verbatim, anything else in its JSON form.
///
/// ```rust
/// use serde_json::json;
/// use upshot::interpolate;
///
/// let args = json!({ "name": "plan", "count": 2 });
/// let args = args.as_object().unwrap();
/// assert_eq!(interpolate("%{count} x %{name}", args), "2 x plan");
/// assert_eq!(interpolate("%{missing}", args), "%{missing}");
/// ```
pub fn interpolate(template: &str, args: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match args.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(value) => out.push_str(&value.to_string()),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"
en:
  errors:
    validation_failed: "Validation failed: %{count} problems"
    not_found: "Could not find %{name}"
    nested:
      deeper: "too deep"
de:
  errors:
    not_found: "%{name} nicht gefunden"
"#;

    fn scope() -> Vec<String> {
        vec!["errors".to_string()]
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_translate_from_yaml() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let message = catalog.translate(
            &Code::from("not_found"),
            "en",
            &scope(),
            &args(json!({ "name": "plan" })),
        );
        assert_eq!(message.as_deref(), Some("Could not find plan"));
    }

    #[test]
    fn test_translate_other_locale() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let message = catalog.translate(
            &Code::from("not_found"),
            "de",
            &scope(),
            &args(json!({ "name": "Plan" })),
        );
        assert_eq!(message.as_deref(), Some("Plan nicht gefunden"));
    }

    #[test]
    fn test_missing_entries() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let none = Map::new();
        assert!(catalog
            .translate(&Code::from("unknown"), "en", &scope(), &none)
            .is_none());
        assert!(catalog
            .translate(&Code::from("not_found"), "fr", &scope(), &none)
            .is_none());
        assert!(catalog
            .translate(&Code::from("nested"), "en", &scope(), &none)
            .is_none());
    }

    #[test]
    fn test_non_string_args() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let message = catalog.translate(
            &Code::from("validation_failed"),
            "en",
            &scope(),
            &args(json!({ "count": 3 })),
        );
        assert_eq!(message.as_deref(), Some("Validation failed: 3 problems"));
    }

    #[test]
    fn test_with_message_builds_tree() {
        let catalog = Catalog::new()
            .with_message("en", "errors.bang", "Bang")
            .with_message("en", "errors.boom", "Boom");
        assert_eq!(catalog.template(&Code::from("bang"), "en", &scope()), Some("Bang"));
        assert_eq!(catalog.template(&Code::from("boom"), "en", &scope()), Some("Boom"));
    }

    #[test]
    fn test_with_message_replaces_template_with_tree() {
        let catalog = Catalog::new()
            .with_message("en", "errors", "flat")
            .with_message("en", "errors.bang", "Bang");
        assert_eq!(catalog.template(&Code::from("bang"), "en", &scope()), Some("Bang"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en.yml");
        fs::write(&path, CATALOG).unwrap();

        let catalog = Catalog::from_file(&path).unwrap();
        assert_eq!(
            catalog.template(&Code::from("not_found"), "en", &scope()),
            Some("Could not find %{name}")
        );
    }

    #[test]
    fn test_from_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::from_file(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, CatalogError::Load { .. }));
        assert!(err.to_string().contains("missing.yml"));
    }

    #[test]
    fn test_merge_overrides_and_extends() {
        let base = Catalog::from_yaml_str(CATALOG).unwrap();
        let overrides = Catalog::new()
            .with_message("en", "errors.not_found", "Missing %{name}")
            .with_message("en", "errors.quota", "Over quota");

        let catalog = base.merge(overrides);
        let code = |c: &'static str| Code::from(c);
        assert_eq!(
            catalog.template(&code("not_found"), "en", &scope()),
            Some("Missing %{name}")
        );
        assert_eq!(catalog.template(&code("quota"), "en", &scope()), Some("Over quota"));
        assert_eq!(
            catalog.template(&code("validation_failed"), "en", &scope()),
            Some("Validation failed: %{count} problems")
        );
        assert!(catalog.template(&code("not_found"), "de", &scope()).is_some());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = Catalog::from_yaml_str("en: [unclosed").unwrap_err();
        assert!(err.to_string().starts_with("invalid message catalog"));
    }

    #[test]
    fn test_interpolate_edge_cases() {
        let args = args(json!({ "a": "x", "flag": true }));
        assert_eq!(interpolate("no placeholders", &args), "no placeholders");
        assert_eq!(interpolate("%{a}%{a}", &args), "xx");
        assert_eq!(interpolate("%{flag}!", &args), "true!");
        assert_eq!(interpolate("open %{a", &args), "open %{a");
        assert_eq!(interpolate("100%", &args), "100%");
    }
}
