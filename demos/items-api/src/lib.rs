//! Items API demo: one blueprint documented twice, as OpenAPI 3 at the root
//! and as Swagger 2.0 under `/v2` (config prefix `V2`).

pub mod items;

use std::sync::Arc;

use apiary::apiary_openapi::{ApiInitError, ApiSettings};
use apiary::prelude::*;

use crate::items::ItemStore;

/// Settings read from `config` under `prefix`, with demo defaults for
/// whatever the config leaves unset.
fn settings(config: &AppConfig, prefix: &str, openapi_version: &str, docs_prefix: &str) -> Result<ApiSettings, ApiInitError> {
    let mut settings = ApiSettings::from_config(config, prefix)?
        .or_title("Items API")
        .or_version("1.0.0")
        .or_openapi_version(openapi_version);
    settings
        .openapi_url_prefix
        .get_or_insert_with(|| docs_prefix.to_string());
    Ok(settings)
}

/// The OpenAPI 3 API serving `/items`.
pub fn api(config: &AppConfig, store: &Arc<ItemStore>) -> Result<Api, ApiInitError> {
    let mut api = Api::from_settings(settings(config, "", "3.0.2", "/")?)?;
    api.register_blueprint(&items::blueprint(store)?, BlueprintRegistration::new())?;
    Ok(api)
}

/// The same blueprint documented as Swagger 2.0 under `/v2/items`.
pub fn api_v2(config: &AppConfig, store: &Arc<ItemStore>) -> Result<Api, ApiInitError> {
    let mut api = Api::from_settings(settings(config, "V2", "2.0", "/v2")?)?;
    api.register_blueprint(
        &items::blueprint(store)?,
        BlueprintRegistration::new().url_prefix("/v2/items"),
    )?;
    Ok(api)
}

/// Both APIs, sharing one store.
pub fn registry(config: &AppConfig) -> Result<ApiRegistry, ApiInitError> {
    let store = ItemStore::new();
    Ok(ApiRegistry::new()
        .with(api(config, &store)?)
        .with(api_v2(config, &store)?))
}
