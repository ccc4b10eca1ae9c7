//! Compiler configuration (`scenario.toml`).
//!
//! ```toml
//! mode = "lenient"
//! default_version = "2.1.0"
//! cache_dir = ".scenario/cache"
//! log_filter = "scenario_native=debug"
//!
//! [[tags]]
//! name = "ProductCard"
//! children = "none"
//! properties = ["product", "onSelect"]
//! default_style = { borderRadius = 8 }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::{Catalog, CustomTag};
use crate::logging::{init_tracing, parse_filter};
use crate::parse::CompileOptions;
use crate::resolve::ResolutionMode;
use crate::validate::is_valid_version;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub mode: ResolutionMode,
    pub default_version: String,
    /// Incremental cache location; caching is off when unset.
    pub cache_dir: Option<PathBuf>,
    /// `tracing` filter directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Catalog extensions, applied over the built-in tags.
    pub tags: Vec<CustomTag>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            mode: ResolutionMode::Strict,
            default_version: "1.0.0".to_string(),
            cache_dir: None,
            log_filter: "info".to_string(),
            tags: Vec::new(),
        }
    }
}

impl CompilerConfig {
    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `CompilerConfig::default()`.
    /// - Otherwise parses it as TOML and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: CompilerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from("<inline>"),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks:
    /// - `default_version` is `major.minor.patch`
    /// - `log_filter` parses as filter directives
    /// - tag names are non-empty and unique
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_version(&self.default_version) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "default_version '{}' is not of the form major.minor.patch",
                    self.default_version
                ),
            });
        }

        if let Err(e) = parse_filter(&self.log_filter) {
            return Err(ConfigError::ValidationError {
                message: format!("log_filter '{}' is invalid: {}", self.log_filter, e),
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for tag in &self.tags {
            if tag.name.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "Tag names must not be empty".to_string(),
                });
            }
            if !seen.insert(tag.name.as_str()) {
                return Err(ConfigError::ValidationError {
                    message: format!("Tag '{}' is declared more than once", tag.name),
                });
            }
        }

        Ok(())
    }

    /// Installs the stderr subscriber with `log_filter` as its default.
    pub fn init_logging(&self) {
        init_tracing(&self.log_filter);
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::builtin().with_tags(&self.tags)
    }

    pub fn compile_options(&self, key: impl Into<String>) -> CompileOptions {
        CompileOptions {
            key: key.into(),
            version: self.default_version.clone(),
            mode: self.mode,
            file_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ChildPolicy;

    #[test]
    fn test_parses_tags_and_mode() {
        let config = CompilerConfig::from_toml_str(
            r#"
            mode = "lenient"
            default_version = "2.1.0"

            [[tags]]
            name = "ProductCard"
            children = "none"
            properties = ["product"]
            default_style = { borderRadius = 8 }
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, ResolutionMode::Lenient);
        let catalog = config.catalog();
        let entry = catalog.lookup("ProductCard");
        assert_eq!(entry.allowed_children, ChildPolicy::NoChildren);
        assert!(entry.known_properties.contains("product"));
        assert_eq!(config.compile_options("home").version, "2.1.0");
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_rejects_bad_version() {
        let err = CompilerConfig::from_toml_str(r#"default_version = "1.0""#).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_log_filter_is_validated() {
        let config =
            CompilerConfig::from_toml_str(r#"log_filter = "scenario_native=debug,warn""#).unwrap();
        assert_eq!(config.log_filter, "scenario_native=debug,warn");

        let err = CompilerConfig::from_toml_str(r#"log_filter = "scenario_native=loud""#)
            .unwrap_err();
        assert!(err.to_string().contains("log_filter"), "{}", err);
    }

    #[test]
    fn test_init_logging_uses_configured_filter() {
        let config = CompilerConfig {
            log_filter: "scenario_native=trace".to_string(),
            ..Default::default()
        };
        config.init_logging();
        config.init_logging();
        tracing::trace!("logging initialized twice without panicking");
    }

    #[test]
    fn test_rejects_duplicate_tags() {
        let err = CompilerConfig::from_toml_str(
            r#"
            [[tags]]
            name = "Card"
            [[tags]]
            name = "Card"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = CompilerConfig::load("/nonexistent/scenario.toml").unwrap();
        assert_eq!(config.mode, ResolutionMode::Strict);
    }
}
