//! Resource groups.
//!
//! A [`Blueprint`] collects routes under a name and URL prefix and stores
//! the documentation of every endpoint. Registering it on an API mounts
//! the routes and turns the stored documentation into OpenAPI operations.

use http::Method;
use serde_json::Value;

use crate::doc::{Docstring, EndpointDocs, MethodDocInfo};
use crate::error::DeclarationError;
use crate::rule::Rule;
use crate::view::{View, ViewKind};

/// Options of [`Blueprint::route`].
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub endpoint: Option<String>,
    /// Parameter objects documented on the path.
    pub parameters: Vec<Value>,
    /// Operation tags. Defaults to the blueprint name.
    pub tags: Option<Vec<String>>,
    /// Restrict the methods of a [`MethodView`](crate::view::MethodView),
    /// or set those of a single view.
    pub methods: Option<Vec<Method>>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn parameter(mut self, parameter: Value) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }
}

impl From<&str> for RouteOptions {
    fn from(endpoint: &str) -> Self {
        Self::new().endpoint(endpoint)
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Rule relative to the blueprint prefix.
    pub rule: Rule,
    pub endpoint: String,
    pub views: Vec<(Method, View)>,
    /// Envelope of a nested blueprint's route. `None` inherits the
    /// registering blueprint's.
    pub response_envelope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Blueprint {
    name: String,
    url_prefix: Option<String>,
    description: Option<String>,
    response_envelope: Option<String>,
    routes: Vec<Route>,
    docs: Vec<(String, EndpointDocs)>,
    endpoints: Vec<String>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        let url_prefix: String = url_prefix.into();
        Self {
            name: name.into(),
            url_prefix: (!url_prefix.is_empty()).then_some(url_prefix),
            description: None,
            response_envelope: None,
            routes: Vec::new(),
            docs: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    /// Description of the blueprint tag.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Nest response payloads under `key`.
    pub fn response_envelope(mut self, key: impl Into<String>) -> Self {
        self.response_envelope = Some(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    pub fn tag_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn envelope(&self) -> Option<&str> {
        self.response_envelope.as_deref()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Stored documentation, in registration order.
    pub fn docs(&self) -> &[(String, EndpointDocs)] {
        &self.docs
    }

    pub fn endpoint_docs(&self, endpoint: &str) -> Option<&EndpointDocs> {
        self.docs
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, docs)| docs)
    }

    pub fn route_of(&self, endpoint: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.endpoint == endpoint)
    }

    /// Register `view` for `rule` and store its documentation.
    ///
    /// The endpoint name defaults to one derived from the rule. A name
    /// already in use gets a `_N` suffix, N being the number of endpoints
    /// registered so far.
    pub fn add_url_rule(
        &mut self,
        rule: &str,
        options: RouteOptions,
        view: impl Into<ViewKind>,
    ) -> Result<&mut Self, DeclarationError> {
        let rule = Rule::parse(rule)?;
        let mut kind = view.into();
        if let (ViewKind::Single { methods, .. }, Some(filter)) = (&mut kind, &options.methods) {
            *methods = filter.clone();
        }
        let proposed = match options.endpoint {
            Some(ref endpoint) => endpoint.clone(),
            None => endpoint_from_rule(&rule)?,
        };
        let endpoint = if self.endpoints.contains(&proposed) {
            format!("{proposed}_{}", self.endpoints.len())
        } else {
            proposed
        };

        let views = kind.resolve(options.methods.as_deref());
        let mut docs = EndpointDocs {
            parameters: options.parameters.clone(),
            methods: Vec::new(),
        };
        for (method, view) in &views {
            let method_name = method.as_str().to_lowercase();
            if view.doc_info().arguments.iter().filter(|a| a.location.is_body()).count() > 1 {
                return Err(DeclarationError::MultipleBodyLocations {
                    endpoint,
                    method: method.to_string(),
                });
            }
            if docs.method(&method_name).is_some() {
                return Err(DeclarationError::DuplicateMethodDoc {
                    endpoint,
                    method: method_name,
                });
            }
            docs.methods.push((
                method_name,
                MethodDocInfo {
                    docstring: view.docstring_text().map(Docstring::parse).unwrap_or_default(),
                    tags: options.tags.clone(),
                    doc: view.doc_info().clone(),
                },
            ));
        }
        self.store_docs(endpoint.clone(), docs)?;

        tracing::debug!(
            blueprint = %self.name,
            endpoint = %endpoint,
            rule = %rule.as_str(),
            methods = ?views.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>(),
            "route registered"
        );
        self.endpoints.push(endpoint.clone());
        self.routes.push(Route {
            rule,
            endpoint,
            views,
            response_envelope: None,
        });
        Ok(self)
    }

    /// Shorthand for [`add_url_rule`](Self::add_url_rule).
    pub fn route(
        &mut self,
        rule: &str,
        options: impl Into<RouteOptions>,
        view: impl Into<ViewKind>,
    ) -> Result<&mut Self, DeclarationError> {
        self.add_url_rule(rule, options.into(), view)
    }

    fn store_docs(&mut self, endpoint: String, docs: EndpointDocs) -> Result<(), DeclarationError> {
        match self.docs.iter_mut().find(|(e, _)| *e == endpoint) {
            Some((_, existing)) => {
                if let Some((method, _)) = docs
                    .methods
                    .iter()
                    .find(|(method, _)| existing.method(method).is_some())
                {
                    return Err(DeclarationError::DuplicateMethodDoc {
                        endpoint,
                        method: method.clone(),
                    });
                }
                existing.methods.extend(docs.methods);
                existing.parameters.extend(docs.parameters);
            }
            None => self.docs.push((endpoint, docs)),
        }
        Ok(())
    }

    /// Nest `child` under this blueprint.
    ///
    /// Its routes are mounted under `url_prefix` (or the child's own
    /// prefix) and its endpoints renamed `child.endpoint`. Nothing is
    /// added when one of the renamed endpoints already exists.
    pub fn register_blueprint(
        &mut self,
        child: &Blueprint,
        url_prefix: Option<&str>,
    ) -> Result<&mut Self, DeclarationError> {
        let prefix = url_prefix.or(child.url_prefix()).unwrap_or("");
        let mut routes = Vec::with_capacity(child.routes.len());
        for route in &child.routes {
            let endpoint = format!("{}.{}", child.name, route.endpoint);
            if self.endpoints.contains(&endpoint) {
                return Err(DeclarationError::DuplicateEndpoint { endpoint });
            }
            routes.push(Route {
                rule: route.rule.prefixed(prefix)?,
                endpoint,
                views: route.views.clone(),
                response_envelope: route
                    .response_envelope
                    .clone()
                    .or_else(|| child.response_envelope.clone()),
            });
        }
        let docs: Vec<(String, EndpointDocs)> = child
            .docs
            .iter()
            .map(|(endpoint, docs)| (format!("{}.{endpoint}", child.name), docs.clone()))
            .collect();
        if let Some((endpoint, _)) = docs.iter().find(|(e, _)| self.endpoint_docs(e).is_some()) {
            return Err(DeclarationError::DuplicateEndpoint {
                endpoint: endpoint.clone(),
            });
        }

        for route in routes {
            self.endpoints.push(route.endpoint.clone());
            self.routes.push(route);
        }
        self.docs.extend(docs);
        Ok(self)
    }
}

fn endpoint_from_rule(rule: &Rule) -> Result<String, DeclarationError> {
    let mut name = String::new();
    for c in rule.as_str().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_').to_string();
    // converter names are not part of the endpoint
    let name = rule.arguments().iter().fold(name, |acc, arg| {
        acc.replace(&format!("{}_{}", arg.converter, arg.name), &arg.name)
    });
    if name.is_empty() {
        return Err(DeclarationError::MissingEndpoint {
            rule: rule.as_str().to_string(),
        });
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::ArgOptions;
    use crate::call::Call;
    use crate::error::ApiError;
    use crate::schema::{Field, Fields};
    use crate::view::MethodView;
    use serde_json::json;

    async fn noop(_call: Call) -> Result<Value, ApiError> {
        Ok(json!({}))
    }

    #[test]
    fn endpoint_names_are_unique() {
        let mut blp = Blueprint::new("items", "/items");
        blp.route("/", "items", View::new(noop)).unwrap();
        blp.route("/other", "items", View::new(noop)).unwrap();
        blp.route("/<int:item_id>", RouteOptions::new(), View::new(noop)).unwrap();
        let endpoints: Vec<&str> = blp.routes().iter().map(|r| r.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["items", "items_1", "item_id"]);
        assert!(matches!(
            blp.route("/", RouteOptions::new(), View::new(noop)),
            Err(DeclarationError::MissingEndpoint { .. })
        ));
    }

    #[test]
    fn stores_docs_per_method() {
        let mut blp = Blueprint::new("pets", "/pets");
        let view = MethodView::new()
            .get(View::new(noop).docstring("List pets\n\nAll of them."))
            .post(View::new(noop))
            .delete(View::new(noop));
        blp.route(
            "/",
            RouteOptions::new()
                .endpoint("pets")
                .tags(["animals"])
                .methods([Method::GET, Method::POST])
                .parameter(json!({"in": "header", "name": "X-Trace"})),
            view,
        )
        .unwrap();
        let docs = blp.endpoint_docs("pets").unwrap();
        let methods: Vec<&str> = docs.methods.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(methods, vec!["get", "post"]);
        let get = docs.method("get").unwrap();
        assert_eq!(get.docstring.summary.as_deref(), Some("List pets"));
        assert_eq!(get.tags, Some(vec!["animals".to_string()]));
        assert_eq!(docs.parameters.len(), 1);
    }

    #[test]
    fn one_body_location_per_method() {
        let mut blp = Blueprint::new("pets", "/pets");
        let schema = Fields::new().field("name", Field::string());
        let view = View::new(noop)
            .arguments(schema.clone(), ArgOptions::json())
            .arguments(schema, ArgOptions::form());
        let err = blp
            .route("/", RouteOptions::new().endpoint("pets").methods([Method::POST]), view)
            .unwrap_err();
        assert!(matches!(err, DeclarationError::MultipleBodyLocations { .. }));
    }

    #[test]
    fn nested_blueprints() {
        let mut child = Blueprint::new("toys", "/toys");
        child.route("/<int:toy_id>", "toy", View::new(noop)).unwrap();
        let mut parent = Blueprint::new("pets", "/pets");
        parent.register_blueprint(&child, None).unwrap();
        let route = parent.route_of("toys.toy").unwrap();
        assert_eq!(route.rule.openapi_path(), "/toys/{toy_id}");
        assert!(parent.endpoint_docs("toys.toy").is_some());
    }

    #[test]
    fn failed_nesting_leaves_the_parent_untouched() {
        let mut child = Blueprint::new("toys", "/toys");
        child.route("/<int:toy_id>", "toy", View::new(noop)).unwrap();
        let mut parent = Blueprint::new("pets", "/pets");
        parent.register_blueprint(&child, None).unwrap();

        let err = parent.register_blueprint(&child, Some("/other")).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::DuplicateEndpoint {
                endpoint: "toys.toy".into()
            }
        );
        let routes: Vec<String> = parent
            .routes()
            .iter()
            .map(|r| format!("{} {}", r.endpoint, r.rule.openapi_path()))
            .collect();
        assert_eq!(routes, vec!["toys.toy /toys/{toy_id}"]);
        assert_eq!(parent.docs().len(), 1);
        assert_eq!(parent.endpoint_docs("toys.toy").unwrap().methods.len(), 1);
    }
}
