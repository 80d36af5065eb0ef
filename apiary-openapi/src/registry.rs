use std::collections::HashMap;

use apiary_core::config::normalize_config_prefix;
use axum::Router;

use crate::api::{with_defaults, Api};
use crate::settings::ApiInitError;

/// The APIs of an application, keyed by config prefix.
///
/// The `openapi` commands look APIs up here.
#[derive(Debug, Default)]
pub struct ApiRegistry {
    apis: Vec<Api>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `api`, replacing the one with the same config prefix.
    pub fn insert(&mut self, api: Api) -> Option<Api> {
        match self
            .apis
            .iter_mut()
            .find(|existing| existing.config_prefix() == api.config_prefix())
        {
            Some(existing) => Some(std::mem::replace(existing, api)),
            None => {
                self.apis.push(api);
                None
            }
        }
    }

    pub fn with(mut self, api: Api) -> Self {
        self.insert(api);
        self
    }

    /// The API of `prefix`. `v1`, `V1` and `V1_` name the same API.
    pub fn get(&self, prefix: &str) -> Option<&Api> {
        let prefix = normalize_config_prefix(prefix);
        self.apis.iter().find(|api| api.config_prefix() == prefix)
    }

    /// Config prefixes, in registration order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.apis.iter().map(Api::config_prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Api> {
        self.apis.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }

    /// One router serving every API.
    pub fn router(&self) -> Result<Router, ApiInitError> {
        let mut served: HashMap<String, String> = HashMap::new();
        let mut methods = std::collections::HashSet::new();
        let mut router = Router::new();
        for api in &self.apis {
            for (shape, path, method) in api.served() {
                let conflict = served.get(&shape).is_some_and(|existing| *existing != path)
                    || !methods.insert((shape.clone(), method.clone()));
                if conflict {
                    return Err(ApiInitError::RouteConflict {
                        path,
                        method: method.to_string(),
                    });
                }
                served.insert(shape, path);
            }
            router = router.merge(api.routes());
        }
        Ok(with_defaults(router))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ApiSettings;

    fn api(prefix: &str) -> Api {
        Api::from_settings(ApiSettings {
            config_prefix: normalize_config_prefix(prefix),
            title: Some(format!("API {prefix}")),
            version: Some("1".into()),
            openapi_version: Some("3.0.2".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn lookup_normalizes_prefix() {
        let registry = ApiRegistry::new().with(api("")).with(api("v1"));
        assert_eq!(registry.prefixes().collect::<Vec<_>>(), ["", "V1_"]);
        assert_eq!(registry.get("v1").unwrap().spec().title(), "API v1");
        assert_eq!(registry.get("V1_").unwrap().spec().title(), "API v1");
        assert!(registry.get("v2").is_none());
    }

    #[test]
    fn insert_replaces_same_prefix() {
        let mut registry = ApiRegistry::new();
        assert!(registry.insert(api("v1")).is_none());
        assert!(registry.insert(api("V1")).is_some());
        assert_eq!(registry.iter().count(), 1);
    }
}
