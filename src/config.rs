//! Client-wide configuration.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Configuration shared by every resource of a [`Registry`](crate::Registry).
///
/// # Example
///
/// ```
/// use resource_kit::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_base_path("/api/")
///     .with_validation_code("USERNAME_ALREADY_EXISTS");
///
/// assert_eq!(config.base_path, "/api/");
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix joined in front of every endpoint path.
    pub base_path: String,

    /// Field-error constants that turn a server error into `Error::Validation`.
    pub validation_codes: BTreeSet<String>,

    /// Cookie holding the same-origin security token.
    pub csrf_cookie: String,

    /// Header carrying the token on mutating requests.
    pub csrf_header: String,

    /// Query parameter injected into GET requests to defeat intermediary caches.
    pub cache_bust_param: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_path: String::new(),
            validation_codes: BTreeSet::new(),
            csrf_cookie: "csrftoken".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            cache_bust_param: "_".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse a configuration document; missing keys keep their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_validation_code(mut self, code: impl Into<String>) -> Self {
        self.validation_codes.insert(code.into());
        self
    }

    pub fn with_csrf(mut self, cookie: impl Into<String>, header: impl Into<String>) -> Self {
        self.csrf_cookie = cookie.into();
        self.csrf_header = header.into();
        self
    }

    pub fn with_cache_bust_param(mut self, param: impl Into<String>) -> Self {
        self.cache_bust_param = param.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_path, "");
        assert_eq!(config.csrf_cookie, "csrftoken");
        assert_eq!(config.csrf_header, "X-CSRFToken");
        assert_eq!(config.cache_bust_param, "_");
    }

    #[test]
    fn test_from_json_keeps_defaults_for_missing_keys() {
        let config = ClientConfig::from_json(
            r#"{ "base_path": "/api", "validation_codes": ["INVALID"] }"#,
        )
        .expect("valid config");

        assert_eq!(config.base_path, "/api");
        assert!(config.validation_codes.contains("INVALID"));
        assert_eq!(config.csrf_header, "X-CSRFToken");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = ClientConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
