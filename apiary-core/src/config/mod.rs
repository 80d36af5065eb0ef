mod loader;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use value::{ConfigValue, FromConfigValue};

/// Prefix of environment variables overlaid on the configuration.
pub const ENV_PREFIX: &str = "APIARY_";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from YAML files, `.env` files, and
/// environment variables.
///
/// Keys follow the upper snake case convention of the extension settings
/// (`API_TITLE`, `OPENAPI_VERSION`, ...). Resolution order (lowest to
/// highest priority):
/// 1. `apiary.yaml` (base)
/// 2. `apiary-{profile}.yaml` (profile override)
/// 3. `.env` and `.env.{profile}` (loaded into process environment)
/// 4. Environment variables prefixed with `APIARY_`
///    (`APIARY_API_TITLE` overrides `API_TITLE`)
///
/// Profile is determined by: `APIARY_PROFILE` env var > argument.
#[derive(Debug, Clone)]
pub struct AppConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl AppConfig {
    /// Load configuration for the given profile from the working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var("APIARY_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();

        loader::load_yaml_file(Path::new("apiary.yaml"), &mut values)?;

        let profile_path = format!("apiary-{active_profile}.yaml");
        loader::load_yaml_file(Path::new(&profile_path), &mut values)?;

        // .env files never overwrite variables already set
        let _ = dotenvy::dotenv();
        let profile_env = format!(".env.{active_profile}");
        let _ = dotenvy::from_filename(&profile_env);

        loader::overlay_env(std::env::vars(), &mut values);

        tracing::debug!(profile = %active_profile, keys = values.len(), "configuration loaded");

        Ok(AppConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(AppConfig {
            values,
            profile: "test".to_string(),
        })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        AppConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a typed value for the given key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the key does not exist, or
    /// `ConfigError::TypeMismatch` if the value cannot be converted.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, returning a default if the key is missing.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Get a typed value, `None` when the key is missing or null.
    pub fn get_opt<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        match self.values.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(value) => V::from_config_value(value, key).map(Some),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// A view of this config where every key is looked up with `prefix`.
    pub fn prefixed(&self, prefix: &str) -> PrefixedConfig<'_> {
        PrefixedConfig {
            config: self,
            prefix: normalize_config_prefix(prefix),
        }
    }
}

/// Normalize an API config prefix: upper case with a trailing underscore,
/// or empty.
///
/// ```
/// use apiary_core::config::normalize_config_prefix;
/// assert_eq!(normalize_config_prefix("v1"), "V1_");
/// assert_eq!(normalize_config_prefix("V2_"), "V2_");
/// assert_eq!(normalize_config_prefix(""), "");
/// ```
pub fn normalize_config_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut normalized = trimmed.to_uppercase();
    if !normalized.ends_with('_') {
        normalized.push('_');
    }
    normalized
}

/// Config lookups scoped to one API instance.
///
/// With prefix `V1_`, `get("API_TITLE")` reads `V1_API_TITLE`.
#[derive(Debug, Clone)]
pub struct PrefixedConfig<'a> {
    config: &'a AppConfig,
    prefix: String,
}

impl PrefixedConfig<'_> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full key as stored in the underlying config.
    pub fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        self.config.get(&self.key(key))
    }

    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.config.get_or(&self.key(key), default)
    }

    pub fn get_opt<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        self.config.get_opt(&self.key(key))
    }
}
