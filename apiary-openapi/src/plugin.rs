use apiary_core::doc::{deep_update_map, DocInfo};
use apiary_core::view::View;
use serde_json::{json, Map, Value};

use crate::spec::Spec;

/// Extension of the generated documentation.
///
/// Plugins run after the built-in callbacks of every operation and can
/// register top-level objects when added to an API.
pub trait DocPlugin: Send + Sync + 'static {
    /// Amend the operation of one view. `doc` holds what the view's
    /// decorators recorded, including [`DocInfo::extensions`].
    fn register_method_docs(&self, operation: &mut Map<String, Value>, doc: &DocInfo, spec: &mut Spec);

    /// Register top-level objects, e.g. security schemes.
    fn visit_api(&self, spec: &mut Spec);
}

/// API key authentication.
///
/// ```ignore
/// let security = ApiKeySecurityPlugin::new("api_key", "X-API-Key");
/// let view = security.secure(View::new(list_pets), ["api_key"]);
/// api.register_plugin(security);
/// ```
#[derive(Debug, Clone)]
pub struct ApiKeySecurityPlugin {
    scheme_name: String,
    parameter_name: String,
    location: String,
}

impl ApiKeySecurityPlugin {
    pub const EXTENSION: &'static str = "security";

    /// Key passed in the `parameter_name` header.
    pub fn new(scheme_name: impl Into<String>, parameter_name: impl Into<String>) -> Self {
        Self {
            scheme_name: scheme_name.into(),
            parameter_name: parameter_name.into(),
            location: "header".into(),
        }
    }

    /// Where the key is passed: `header`, `query` or `cookie`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Document `view` as requiring all of `keys`.
    pub fn secure<I, S>(&self, view: View, keys: I) -> View
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requirement: Map<String, Value> = keys
            .into_iter()
            .map(|key| (key.into(), json!([])))
            .collect();
        view.with_doc_extension(Self::EXTENSION, json!([requirement]))
    }
}

impl DocPlugin for ApiKeySecurityPlugin {
    fn register_method_docs(&self, operation: &mut Map<String, Value>, doc: &DocInfo, _spec: &mut Spec) {
        if let Some(security) = doc.extensions.get(Self::EXTENSION) {
            let mut update = Map::new();
            update.insert(Self::EXTENSION.into(), security.clone());
            deep_update_map(operation, update);
        }
    }

    fn visit_api(&self, spec: &mut Spec) {
        spec.security_scheme(
            &self.scheme_name,
            json!({"type": "apiKey", "in": self.location, "name": self.parameter_name}),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_core::call::Call;
    use apiary_core::error::ApiError;

    async fn noop(_call: Call) -> Result<Value, ApiError> {
        Ok(json!({}))
    }

    #[test]
    fn documents_security_requirement() {
        let plugin = ApiKeySecurityPlugin::new("api_key", "X-API-Key");
        let view = plugin.secure(View::new(noop), ["api_key"]);
        let mut spec = Spec::new("T", "1", "3.0.2", Map::new()).unwrap();
        let mut operation = Map::new();
        plugin.register_method_docs(&mut operation, view.doc_info(), &mut spec);
        assert_eq!(Value::Object(operation), json!({"security": [{"api_key": []}]}));

        plugin.visit_api(&mut spec);
        assert_eq!(
            spec.to_value()["components"]["securitySchemes"]["api_key"],
            json!({"type": "apiKey", "in": "header", "name": "X-API-Key"})
        );
    }

    #[test]
    fn views_without_requirement_are_untouched() {
        let plugin = ApiKeySecurityPlugin::new("api_key", "key").location("query");
        let view = View::new(noop);
        let mut spec = Spec::new("T", "1", "2.0", Map::new()).unwrap();
        let mut operation = Map::new();
        plugin.register_method_docs(&mut operation, view.doc_info(), &mut spec);
        assert!(operation.is_empty());
        plugin.visit_api(&mut spec);
        assert_eq!(
            spec.to_value()["securityDefinitions"]["api_key"]["in"],
            "query"
        );
    }
}
