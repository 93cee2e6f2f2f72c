//! Runner configuration.
//!
//! Configuration is plain data with sensible defaults, so an empty document
//! (or no document at all) gives the default runner.
//!
//! ```rust
//! use upshot::RunnerConfig;
//!
//! let config = RunnerConfig::from_yaml_str("locale: de\nscope: [app, errors]\n")?;
//! assert_eq!(config.locale, "de");
//! assert_eq!(config.scope, vec!["app", "errors"]);
//! assert!(config.messages);
//! # Ok::<(), upshot::ConfigError>(())
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

/// How a [`crate::Runner`] describes failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Locale passed to the message lookup.
    pub locale: String,
    /// Key path under the locale where failure messages live.
    pub scope: Vec<String>,
    /// Whether failures without a message get one from the lookup.
    pub messages: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            scope: vec!["errors".to_string()],
            messages: true,
        }
    }
}

impl RunnerConfig {
    /// Parses a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(source)?)
    }

    /// Sets the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Sets the scope.
    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.locale, "en");
        assert_eq!(config.scope, vec!["errors"]);
        assert!(config.messages);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(RunnerConfig::from_yaml_str("").unwrap(), RunnerConfig::default());
        assert_eq!(
            RunnerConfig::from_yaml_str("  \n").unwrap(),
            RunnerConfig::default()
        );
    }

    #[test]
    fn test_partial_document() {
        let config = RunnerConfig::from_yaml_str("messages: false").unwrap();
        assert!(!config.messages);
        assert_eq!(config.locale, "en");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = RunnerConfig::from_yaml_str("locales: en").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid runner configuration"));
    }

    #[test]
    fn test_builders() {
        let config = RunnerConfig::default()
            .with_locale("pt")
            .with_scope(["a", "b"]);
        assert_eq!(config.locale, "pt");
        assert_eq!(config.scope, vec!["a", "b"]);
    }
}
