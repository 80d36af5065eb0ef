use apiary_core::config::{AppConfig, ConfigError};
use apiary_core::error::DeclarationError;
use serde_json::{Map, Value};

/// Default path of the JSON document under `OPENAPI_URL_PREFIX`.
pub const DEFAULT_JSON_PATH: &str = "openapi.json";

/// Same as axum's `DefaultBodyLimit`.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Errors raised while initializing an [`Api`](crate::Api) or registering
/// blueprints on it.
#[derive(Debug)]
pub enum ApiInitError {
    /// `API_TITLE`, `API_VERSION` or `OPENAPI_VERSION` is missing.
    MissingParameter(String),
    InvalidOpenApiVersion(String),
    Config(ConfigError),
    Declaration(DeclarationError),
    /// A blueprint with this name is already registered.
    DuplicateBlueprint(String),
    /// Two endpoints answer the same method on the same path.
    RouteConflict { path: String, method: String },
}

impl std::fmt::Display for ApiInitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiInitError::MissingParameter(message) => write!(f, "{message}"),
            ApiInitError::InvalidOpenApiVersion(version) => {
                write!(f, "Invalid OpenAPI version \"{version}\": expected 2.x or 3.x")
            }
            ApiInitError::Config(e) => write!(f, "Configuration error: {e}"),
            ApiInitError::Declaration(e) => write!(f, "{e}"),
            ApiInitError::DuplicateBlueprint(name) => {
                write!(f, "A blueprint named \"{name}\" is already registered")
            }
            ApiInitError::RouteConflict { path, method } => {
                write!(f, "{method} {path} is already routed to another endpoint")
            }
        }
    }
}

impl std::error::Error for ApiInitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiInitError::Config(e) => Some(e),
            ApiInitError::Declaration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for ApiInitError {
    fn from(err: ConfigError) -> Self {
        ApiInitError::Config(err)
    }
}

impl From<DeclarationError> for ApiInitError {
    fn from(err: DeclarationError) -> Self {
        ApiInitError::Declaration(err)
    }
}

/// Settings of one API, read from [`AppConfig`] through its config prefix.
///
/// | Key | Default |
/// |---|---|
/// | `API_TITLE` | required |
/// | `API_VERSION` | required |
/// | `OPENAPI_VERSION` | required |
/// | `ETAG_DISABLED` | `false` |
/// | `OPENAPI_URL_PREFIX` | unset, no JSON route |
/// | `OPENAPI_JSON_PATH` | `openapi.json` |
/// | `API_SPEC_OPTIONS` | `{}` |
/// | `MAX_BODY_SIZE` | 2 MiB |
#[derive(Debug, Clone, Default)]
pub struct ApiSettings {
    pub config_prefix: String,
    pub title: Option<String>,
    pub version: Option<String>,
    pub openapi_version: Option<String>,
    pub etag_disabled: bool,
    pub openapi_url_prefix: Option<String>,
    pub openapi_json_path: Option<String>,
    /// Merged over the document root.
    pub spec_options: Map<String, Value>,
    /// Largest request body read, in bytes.
    pub max_body_size: Option<usize>,
}

impl ApiSettings {
    pub fn from_config(config: &AppConfig, prefix: &str) -> Result<Self, ApiInitError> {
        let keys = config.prefixed(prefix);
        let spec_options = match keys.get_opt::<Value>("API_SPEC_OPTIONS")? {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(ConfigError::TypeMismatch {
                    key: keys.key("API_SPEC_OPTIONS"),
                    expected: "mapping",
                }
                .into())
            }
        };
        Ok(Self {
            config_prefix: keys.prefix().to_string(),
            title: keys.get_opt("API_TITLE")?,
            version: keys.get_opt("API_VERSION")?,
            openapi_version: keys.get_opt("OPENAPI_VERSION")?,
            etag_disabled: keys.get_opt("ETAG_DISABLED")?.unwrap_or(false),
            openapi_url_prefix: keys.get_opt("OPENAPI_URL_PREFIX")?,
            openapi_json_path: keys.get_opt("OPENAPI_JSON_PATH")?,
            spec_options,
            max_body_size: keys.get_opt("MAX_BODY_SIZE")?,
        })
    }

    /// Title used when the config has none.
    pub fn or_title(mut self, title: impl Into<String>) -> Self {
        self.title.get_or_insert_with(|| title.into());
        self
    }

    pub fn or_version(mut self, version: impl Into<String>) -> Self {
        self.version.get_or_insert_with(|| version.into());
        self
    }

    pub fn or_openapi_version(mut self, openapi_version: impl Into<String>) -> Self {
        self.openapi_version
            .get_or_insert_with(|| openapi_version.into());
        self
    }

    /// Title, version and OpenAPI version, or the first one missing.
    pub(crate) fn required(&self) -> Result<(String, String, String), ApiInitError> {
        let missing = |what: &str, key: &str, setting: &str| {
            ApiInitError::MissingParameter(format!(
                "{what} must be specified either as \"{}{key}\" config key or as \"{setting}\" setting.",
                self.config_prefix
            ))
        };
        let title = self
            .title
            .clone()
            .ok_or_else(|| missing("API title", "API_TITLE", "title"))?;
        let version = self
            .version
            .clone()
            .ok_or_else(|| missing("API version", "API_VERSION", "version"))?;
        let openapi_version = self
            .openapi_version
            .clone()
            .ok_or_else(|| missing("OpenAPI version", "OPENAPI_VERSION", "openapi_version"))?;
        Ok((title, version, openapi_version))
    }

    /// Request body limit. Larger bodies are answered with `413`.
    pub fn body_limit(&self) -> usize {
        self.max_body_size.unwrap_or(DEFAULT_BODY_LIMIT)
    }

    /// Route of the JSON document, when `OPENAPI_URL_PREFIX` is set.
    pub fn json_route(&self) -> Option<String> {
        let prefix = self.openapi_url_prefix.as_deref()?;
        let path = self.openapi_json_path.as_deref().unwrap_or(DEFAULT_JSON_PATH);
        let prefix = prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        Some(if prefix.is_empty() {
            format!("/{path}")
        } else {
            format!("/{prefix}/{path}")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_prefixed_keys() {
        let config = AppConfig::empty()
            .with("V1_API_TITLE", "Pets")
            .with("V1_API_VERSION", "v1")
            .with("V1_OPENAPI_VERSION", "3.0.2")
            .with("V1_ETAG_DISABLED", true)
            .with("API_TITLE", "Other");
        let settings = ApiSettings::from_config(&config, "v1").unwrap();
        assert_eq!(settings.config_prefix, "V1_");
        assert_eq!(settings.title.as_deref(), Some("Pets"));
        assert!(settings.etag_disabled);
        assert!(settings.required().is_ok());
        assert_eq!(settings.body_limit(), DEFAULT_BODY_LIMIT);

        let config = config.with("V1_MAX_BODY_SIZE", 1024i64);
        let settings = ApiSettings::from_config(&config, "v1").unwrap();
        assert_eq!(settings.body_limit(), 1024);
    }

    #[test]
    fn missing_title_names_the_prefixed_key() {
        let config = AppConfig::empty().with("V1_API_VERSION", "1");
        let err = ApiSettings::from_config(&config, "V1")
            .unwrap()
            .required()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "API title must be specified either as \"V1_API_TITLE\" config key or as \"title\" setting."
        );
    }

    #[test]
    fn config_wins_over_fallbacks() {
        let config = AppConfig::empty().with("API_TITLE", "From config");
        let settings = ApiSettings::from_config(&config, "")
            .unwrap()
            .or_title("Fallback")
            .or_version("1");
        assert_eq!(settings.title.as_deref(), Some("From config"));
        assert_eq!(settings.version.as_deref(), Some("1"));
    }

    #[test]
    fn spec_options_must_be_a_mapping() {
        let config = AppConfig::empty().with("API_SPEC_OPTIONS", "nope");
        assert!(matches!(
            ApiSettings::from_config(&config, ""),
            Err(ApiInitError::Config(ConfigError::TypeMismatch { .. }))
        ));
        let config = AppConfig::empty().with(
            "API_SPEC_OPTIONS",
            apiary_core::ConfigValue::from_json(&json!({"x-internal-id": "2"})),
        );
        let settings = ApiSettings::from_config(&config, "").unwrap();
        assert_eq!(settings.spec_options["x-internal-id"], "2");
    }

    #[test]
    fn json_route() {
        let mut settings = ApiSettings::default();
        assert_eq!(settings.json_route(), None);
        settings.openapi_url_prefix = Some("/docs/".into());
        assert_eq!(settings.json_route().as_deref(), Some("/docs/openapi.json"));
        settings.openapi_url_prefix = Some("/".into());
        settings.openapi_json_path = Some("/spec.json".into());
        assert_eq!(settings.json_route().as_deref(), Some("/spec.json"));
    }
}
