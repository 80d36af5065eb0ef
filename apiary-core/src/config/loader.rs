use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::{ConfigError, ENV_PREFIX};

/// Load and parse a YAML file, flattening it into the values map.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    if path.exists() {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        load_yaml_str(&content, values)?;
    }
    Ok(())
}

/// Parse a YAML string and flatten it into the values map.
pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys.
///
/// Mappings and sequences below the root are also stored whole under their
/// own key, so `API_SPEC_OPTIONS` can be read back as a single object.
pub(crate) fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut HashMap<String, ConfigValue>,
) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), ConfigValue::from_yaml(value));
            }
            for (k, v) in map {
                let key_str = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => format!("{other:?}"),
                };
                let full_key = if prefix.is_empty() {
                    key_str
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            if !prefix.is_empty() {
                out.insert(
                    prefix.to_string(),
                    ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect()),
                );
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
            }
        }
    }
}

/// Overlay `APIARY_`-prefixed environment variables.
///
/// `APIARY_API_TITLE=Pets` sets `API_TITLE`. Values that parse as JSON
/// objects or arrays are stored structured.
pub(crate) fn overlay_env(
    vars: impl IntoIterator<Item = (String, String)>,
    values: &mut HashMap<String, ConfigValue>,
) {
    for (env_key, env_val) in vars {
        let Some(config_key) = env_key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if config_key.is_empty() || config_key == "PROFILE" {
            continue;
        }
        let value = match serde_json::from_str::<serde_json::Value>(&env_val) {
            Ok(json @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                ConfigValue::from_json(&json)
            }
            _ => ConfigValue::String(env_val),
        };
        values.insert(config_key.to_string(), value);
    }
}
