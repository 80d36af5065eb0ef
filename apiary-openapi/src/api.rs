//! The API object: mounts blueprints, documents them and serves the JSON
//! document.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use apiary_core::blueprint::Blueprint;
use apiary_core::call::{Call, RouteSettings};
use apiary_core::config::AppConfig;
use apiary_core::error::ApiError;
use apiary_core::layers::{catch_panic_layer, default_trace};
use apiary_core::rule::Rule;
use apiary_core::view::View;
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, on, MethodFilter, MethodRouter};
use axum::Router;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use http_body_util::LengthLimitError;
use serde_json::{json, Value};

use crate::finalize::{register_default_components, Finalizer};
use crate::plugin::DocPlugin;
use crate::settings::{ApiInitError, ApiSettings};
use crate::spec::Spec;

/// Options of [`Api::register_blueprint`].
#[derive(Debug, Clone, Default)]
pub struct BlueprintRegistration {
    /// Registration name, defaults to the blueprint name.
    pub name: Option<String>,
    /// Overrides the blueprint URL prefix.
    pub url_prefix: Option<String>,
    /// Parameter objects added to every path of the blueprint, e.g. for
    /// arguments in the URL prefix.
    pub parameters: Vec<Value>,
}

impl BlueprintRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn url_prefix(mut self, url_prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(url_prefix.into());
        self
    }

    pub fn parameter(mut self, parameter: Value) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// What one mounted (path, method) pair runs.
struct RouteTarget {
    rule: Rule,
    endpoint: Arc<str>,
    view: View,
    settings: Arc<RouteSettings>,
    body_limit: usize,
}

/// A REST API made of blueprints, documented as an OpenAPI document.
///
/// ```ignore
/// let config = AppConfig::load("dev")?;
/// let mut api = Api::new(&config)?;
/// api.register_blueprint(&pets::blueprint()?, BlueprintRegistration::new())?;
/// let app = api.router();
/// ```
pub struct Api {
    settings: ApiSettings,
    spec: Spec,
    plugins: Vec<Arc<dyn DocPlugin>>,
    blueprints: Vec<String>,
    method_routers: Vec<(String, MethodRouter)>,
    // path with argument names erased -> path as registered
    path_shapes: HashMap<String, String>,
    taken: HashSet<(String, Method)>,
}

impl Api {
    /// API configured from the unprefixed keys of `config`.
    pub fn new(config: &AppConfig) -> Result<Self, ApiInitError> {
        Self::with_prefix(config, "")
    }

    /// API configured from the keys of `config` starting with `prefix`
    /// (normalized to end with `_`).
    pub fn with_prefix(config: &AppConfig, prefix: &str) -> Result<Self, ApiInitError> {
        Self::from_settings(ApiSettings::from_config(config, prefix)?)
    }

    pub fn from_settings(settings: ApiSettings) -> Result<Self, ApiInitError> {
        let (title, version, openapi_version) = settings.required()?;
        let mut spec = Spec::new(title, version, openapi_version, settings.spec_options.clone())?;
        register_default_components(&mut spec);
        tracing::info!(
            title = %spec.title(),
            openapi_version = %spec.openapi_version(),
            config_prefix = %settings.config_prefix,
            "api initialized"
        );
        Ok(Self {
            settings,
            spec,
            plugins: Vec::new(),
            blueprints: Vec::new(),
            method_routers: Vec::new(),
            path_shapes: HashMap::new(),
            taken: HashSet::new(),
        })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    pub fn config_prefix(&self) -> &str {
        &self.settings.config_prefix
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Register components or tags by hand.
    pub fn spec_mut(&mut self) -> &mut Spec {
        &mut self.spec
    }

    /// Document path arguments using a custom converter as `type_`.
    pub fn register_converter(&mut self, converter: &str, type_: &str, format: Option<&str>) {
        self.spec.register_converter(converter, type_, format);
    }

    /// Document custom fields named `field` as `type_`.
    pub fn register_field(&mut self, field: &str, type_: &str, format: Option<&str>) {
        self.spec.register_field(field, type_, format);
    }

    /// Add a documentation plugin. It only applies to blueprints registered
    /// afterwards.
    pub fn register_plugin(&mut self, plugin: impl DocPlugin) {
        let plugin: Arc<dyn DocPlugin> = Arc::new(plugin);
        plugin.visit_api(&mut self.spec);
        self.plugins.push(plugin);
    }

    /// Mount the routes of `blueprint` and document its endpoints.
    ///
    /// Nothing is mounted when the registration fails.
    pub fn register_blueprint(
        &mut self,
        blueprint: &Blueprint,
        registration: BlueprintRegistration,
    ) -> Result<&mut Self, ApiInitError> {
        let name = registration
            .name
            .unwrap_or_else(|| blueprint.name().to_string());
        if self.blueprints.contains(&name) {
            return Err(ApiInitError::DuplicateBlueprint(name));
        }
        let url_prefix = registration
            .url_prefix
            .or_else(|| blueprint.url_prefix().map(str::to_string))
            .unwrap_or_default();

        let mut mounted: Vec<(String, Method, RouteTarget)> = Vec::new();
        let mut shapes = self.path_shapes.clone();
        let mut taken = self.taken.clone();
        for route in blueprint.routes() {
            let rule = route.rule.prefixed(&url_prefix)?;
            let path = rule.axum_path().to_string();
            let shape = path_shape(&path);
            if let Some(existing) = shapes.get(&shape) {
                if *existing != path {
                    return Err(ApiInitError::RouteConflict {
                        path,
                        method: "*".into(),
                    });
                }
            }
            shapes.insert(shape.clone(), path.clone());

            let settings = Arc::new(RouteSettings {
                etag_enabled: !self.settings.etag_disabled,
                response_envelope: route
                    .response_envelope
                    .clone()
                    .or_else(|| blueprint.envelope().map(str::to_string)),
            });
            let endpoint: Arc<str> = format!("{name}.{}", route.endpoint).into();
            for (method, view) in &route.views {
                if !taken.insert((shape.clone(), method.clone())) {
                    return Err(ApiInitError::RouteConflict {
                        path,
                        method: method.to_string(),
                    });
                }
                mounted.push((
                    path.clone(),
                    method.clone(),
                    RouteTarget {
                        rule: rule.clone(),
                        endpoint: endpoint.clone(),
                        view: view.clone(),
                        settings: settings.clone(),
                        body_limit: self.settings.body_limit(),
                    },
                ));
            }
        }

        let mut finalizer = Finalizer {
            spec: &mut self.spec,
            plugins: &self.plugins,
            etag_disabled: self.settings.etag_disabled,
        };
        finalizer.register_views_in_doc(blueprint, &name, &url_prefix, &registration.parameters)?;
        self.spec.tag(json!({
            "name": name,
            "description": blueprint.tag_description().unwrap_or(""),
        }));

        let route_count = mounted.len();
        for (path, method, target) in mounted {
            self.mount(path, method, target);
        }
        self.path_shapes = shapes;
        self.taken = taken;
        self.blueprints.push(name.clone());
        tracing::info!(blueprint = %name, url_prefix = %url_prefix, routes = route_count, "blueprint registered");
        Ok(self)
    }

    fn mount(&mut self, path: String, method: Method, target: RouteTarget) {
        let Ok(filter) = MethodFilter::try_from(method.clone()) else {
            tracing::warn!(%method, %path, "method cannot be routed");
            return;
        };
        let target = Arc::new(target);
        let method_router: MethodRouter = on(filter, move |request: Request| {
            let target = target.clone();
            async move { dispatch(&target, request).await }
        });
        match self.method_routers.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => {
                let merged = std::mem::replace(existing, MethodRouter::new()).merge(method_router);
                *existing = merged;
            }
            None => self.method_routers.push((path, method_router)),
        }
    }

    /// Routes of the registered blueprints and, when `OPENAPI_URL_PREFIX`
    /// is set, of the JSON document. The document is rendered once, here.
    pub fn routes(&self) -> Router {
        let mut router = Router::new();
        for (path, method_router) in &self.method_routers {
            router = router.route(path, method_router.clone());
        }
        if let Some(json_route) = self.settings.json_route() {
            let document = match self.spec.to_json_string() {
                Ok(document) => document,
                Err(e) => {
                    tracing::error!(error = %e, "failed to render the OpenAPI document");
                    "{}".to_string()
                }
            };
            let document: Arc<str> = document.into();
            router = router.route(
                &json_route,
                get(move || {
                    let document = document.clone();
                    async move { ([(CONTENT_TYPE, "application/json")], document.to_string()).into_response() }
                }),
            );
        }
        router
    }

    /// The application router: [`routes`](Self::routes) with JSON error
    /// fallbacks, panic recovery and request tracing.
    pub fn router(&self) -> Router {
        with_defaults(self.routes())
    }

    /// (path shape, method) pairs served by [`routes`](Self::routes).
    pub(crate) fn served(&self) -> Vec<(String, String, Method)> {
        let mut served: Vec<(String, String, Method)> = self
            .taken
            .iter()
            .map(|(shape, method)| {
                let path = self.path_shapes.get(shape).cloned().unwrap_or_else(|| shape.clone());
                (shape.clone(), path, method.clone())
            })
            .collect();
        if let Some(json_route) = self.settings.json_route() {
            served.push((path_shape(&json_route), json_route, Method::GET));
        }
        served
    }
}

pub(crate) fn with_defaults(router: Router) -> Router {
    router
        .fallback(|| async { ApiError::not_found().into_response() })
        .method_not_allowed_fallback(|| async {
            ApiError::new(StatusCode::METHOD_NOT_ALLOWED).into_response()
        })
        .layer(catch_panic_layer())
        .layer(default_trace())
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("config_prefix", &self.settings.config_prefix)
            .field("title", &self.spec.title())
            .field("blueprints", &self.blueprints)
            .finish()
    }
}

async fn dispatch(target: &RouteTarget, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let path_params: HashMap<String, String> =
        match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        };
    if !target.rule.matches(&path_params) {
        return ApiError::not_found().into_response();
    }
    let body = match axum::body::to_bytes(body, target.body_limit).await {
        Ok(body) => body,
        Err(e) => {
            let e = e.into_inner();
            if e.is::<LengthLimitError>() {
                return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE).into_response();
            }
            return ApiError::bad_request(e.to_string()).into_response();
        }
    };
    let call = Call::new(
        parts,
        body,
        path_params,
        target.endpoint.clone(),
        target.settings.clone(),
    );
    match target.view.call(call).await {
        Ok(reply) => reply.into_response(),
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(endpoint = %target.endpoint, error = %err, "request failed");
            }
            err.into_response()
        }
    }
}

/// `/items/{item_id}` and `/items/{id}` collide in the router.
pub(crate) fn path_shape(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut in_argument = false;
    for c in path.chars() {
        match c {
            '{' => {
                in_argument = true;
                shape.push_str("{}");
            }
            '}' => in_argument = false,
            _ if in_argument => {}
            _ => shape.push(c),
        }
    }
    shape
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_shapes() {
        assert_eq!(path_shape("/items/{item_id}"), "/items/{}");
        assert_eq!(path_shape("/a/{x}/b/{y}"), "/a/{}/b/{}");
        assert_eq!(path_shape("/items"), "/items");
    }
}
