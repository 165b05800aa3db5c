//! Layered configuration loader.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! presets, files and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, LogFormat, StrataConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "STRATA";

/// Configuration loader with a layered approach.
///
/// Later layers override earlier ones:
/// 1. Defaults or a preset
/// 2. Configuration files (TOML or JSON), merged key by key
/// 3. Environment variables (`PREFIX__SECTION__KEY`)
///
/// # Example
///
/// ```no_run
/// use strata_config::ConfigLoader;
///
/// # fn main() -> Result<(), strata_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_optional_file("strata.toml")?
///     .with_env_prefix("STRATA")
///     .load()?;
///
/// println!("pipeline: {}", config.pipeline.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: StrataConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StrataConfig::default(),
            env_prefix: None,
        }
    }

    /// Reset to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = StrataConfig::default();
        self
    }

    /// Start from the development preset.
    ///
    /// ```
    /// use strata_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = StrataConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = StrataConfig::production();
        self
    }

    /// Merge a configuration file into the current layer.
    ///
    /// The format follows the extension (`.toml` or `.json`). Only keys
    /// present in the file override the current values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed or
    /// contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.with_string(&content, &format)
    }

    /// Merge a configuration file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merge configuration from a string in `"toml"` or `"json"` format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the format is unknown or parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use strata_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [pipeline]
    ///     name = "orders"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.pipeline.name, "orders");
    /// // untouched keys keep the preset's value
    /// assert!(config.pipeline.record_trace);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_lowercase().as_str() {
            "toml" => {
                let table: toml::Table = toml::from_str(content)?;
                serde_json::to_value(table)?
            }
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        let mut merged = serde_json::to_value(&self.config)?;
        merge(&mut merged, layer);
        self.config = serde_json::from_value(merged)
            .map_err(|e| ConfigError::invalid_value("configuration", e.to_string()))?;

        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// Variables use the form `PREFIX__SECTION__KEY`, for example
    /// `STRATA__PIPELINE__MAX_STAGES=64` or
    /// `STRATA__TELEMETRY__LOGGING__FORMAT=pretty`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file from the working directory, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment overrides, validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation
    /// fails.
    pub fn load(mut self) -> Result<StrataConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> StrataConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(&marker))
            .collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let pipeline = &mut self.config.pipeline;
        let telemetry = &mut self.config.telemetry;

        match parts.as_slice() {
            ["PIPELINE", "NAME"] => pipeline.name = value.to_string(),
            ["PIPELINE", "MAX_STAGES"] => pipeline.max_stages = parse_optional(key, value)?,
            ["PIPELINE", "RECORD_TRACE"] => pipeline.record_trace = parse_flag(key, value)?,
            ["PIPELINE", "SLOW_STAGE_THRESHOLD_MS"] => {
                pipeline.slow_stage_threshold_ms = parse_optional(key, value)?;
            }
            ["PIPELINE", "TRUST_INCOMING_REQUEST_ID"] => {
                pipeline.trust_incoming_request_id = parse_flag(key, value)?;
            }
            ["PIPELINE", "DEADLINE_MS"] => pipeline.deadline_ms = parse_optional(key, value)?,
            ["PIPELINE", "EXPOSE_INTERNAL_ERRORS"] => {
                pipeline.expose_internal_errors = parse_flag(key, value)?;
            }

            ["TELEMETRY", "SERVICE_NAME"] => telemetry.service_name = value.to_string(),
            ["TELEMETRY", "ENVIRONMENT"] => telemetry.environment = value.to_string(),

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                telemetry.logging.include_location = parse_flag(key, value)?;
            }

            ["TELEMETRY", "METRICS", "ENABLED"] => {
                telemetry.metrics.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => telemetry.metrics.addr = value.to_string(),

            _ => return Err(ConfigError::env_parse_error(key, "unknown configuration key")),
        }

        Ok(())
    }
}

/// Recursively overlays `layer` onto `base`. Objects merge; anything else replaces.
fn merge(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Empty or `none` clears the value.
fn parse_optional<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>, ConfigError> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer or 'none'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, StrataConfig::default());
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
        assert_eq!(config.telemetry.environment, "production");
    }

    #[test]
    fn test_with_string_json() {
        let json = r#"{"pipeline": {"max_stages": 8, "record_trace": true}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.pipeline.max_stages, Some(8));
        assert!(config.pipeline.record_trace);
        assert_eq!(config.pipeline.name, "strata");
    }

    #[test]
    fn test_with_string_rejects_unknown_field() {
        let toml = r#"
            [pipeline]
            stages = 3
        "#;
        let result = ConfigLoader::new().with_string(toml, "toml");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown field `stages`"));
    }

    #[test]
    fn test_with_string_unsupported_format() {
        let result = ConfigLoader::new().with_string("name: x", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(f)) if f == "yaml"));
    }

    #[test]
    fn test_layers_merge_nested_sections() {
        let first = r#"
            [telemetry]
            service_name = "orders"

            [telemetry.logging]
            level = "warn"
        "#;
        let second = r#"{"telemetry": {"logging": {"format": "pretty"}}}"#;

        let config = ConfigLoader::new()
            .with_string(first, "toml")
            .unwrap()
            .with_string(second, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.telemetry.service_name, "orders");
        assert_eq!(config.telemetry.logging.level, "warn");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_validates() {
        let toml = r#"
            [pipeline]
            max_stages = 0
        "#;
        let result = ConfigLoader::new().with_string(toml, "toml").unwrap().load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/strata.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/strata.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, StrataConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("Off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_apply_env_var_pipeline() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__PIPELINE__NAME", "checkout", "TEST").unwrap();
        loader.apply_env_var("TEST__PIPELINE__MAX_STAGES", "64", "TEST").unwrap();
        loader.apply_env_var("TEST__PIPELINE__DEADLINE_MS", "1500", "TEST").unwrap();
        loader.apply_env_var("TEST__PIPELINE__RECORD_TRACE", "yes", "TEST").unwrap();

        let pipeline = &loader.config.pipeline;
        assert_eq!(pipeline.name, "checkout");
        assert_eq!(pipeline.max_stages, Some(64));
        assert_eq!(pipeline.deadline_ms, Some(1500));
        assert!(pipeline.record_trace);
    }

    #[test]
    fn test_apply_env_var_clears_optional() {
        let mut loader = ConfigLoader::new().with_production();
        assert!(loader.config.pipeline.slow_stage_threshold_ms.is_some());

        loader
            .apply_env_var("TEST__PIPELINE__SLOW_STAGE_THRESHOLD_MS", "none", "TEST")
            .unwrap();
        assert!(loader.config.pipeline.slow_stage_threshold_ms.is_none());
    }

    #[test]
    fn test_apply_env_var_telemetry() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__TELEMETRY__SERVICE_NAME", "orders", "TEST").unwrap();
        loader.apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "Pretty", "TEST").unwrap();
        loader.apply_env_var("TEST__TELEMETRY__METRICS__ENABLED", "true", "TEST").unwrap();

        let telemetry = &loader.config.telemetry;
        assert_eq!(telemetry.service_name, "orders");
        assert_eq!(telemetry.logging.format, LogFormat::Pretty);
        assert!(telemetry.metrics.enabled);
    }

    #[test]
    fn test_apply_env_var_errors() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__PIPELINE__MAX_STAGES", "lots", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__PIPELINE__RECORD_TRACE", "maybe", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__PIPELINE__UNKNOWN", "1", "TEST")
            .is_err());
    }

    #[test]
    fn test_merge_replaces_scalars_and_keeps_siblings() {
        let mut base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": null});
        merge(&mut base, serde_json::json!({"a": {"b": 5}, "d": 7}));
        assert_eq!(base, serde_json::json!({"a": {"b": 5, "c": 2}, "d": 7}));
    }
}
