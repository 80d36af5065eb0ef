use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::arguments::{Location, UploadedFile};
use crate::context::RequestContext;
use crate::error::{ApiError, Diagnostic};
use crate::etag;
use crate::pagination::PaginationParameters;
use crate::schema::SchemaRef;

/// Settings of the route a request was dispatched to.
#[derive(Debug, Clone, Default)]
pub struct RouteSettings {
    pub etag_enabled: bool,
    /// Key the response payload is nested under, if any.
    pub response_envelope: Option<String>,
}

/// A request as seen by a view.
///
/// Cloning is cheap: the request head, body and settings are shared.
#[derive(Clone)]
pub struct Call {
    parts: Arc<Parts>,
    body: Bytes,
    path_params: Arc<HashMap<String, String>>,
    args: Vec<(Location, Value)>,
    files: Vec<UploadedFile>,
    ctx: RequestContext,
    endpoint: Arc<str>,
    settings: Arc<RouteSettings>,
}

impl Call {
    pub fn new(
        parts: Parts,
        body: Bytes,
        path_params: HashMap<String, String>,
        endpoint: impl Into<Arc<str>>,
        settings: Arc<RouteSettings>,
    ) -> Self {
        Self {
            parts: Arc::new(parts),
            body,
            path_params: Arc::new(path_params),
            args: Vec::new(),
            files: Vec::new(),
            ctx: RequestContext::new(),
            endpoint: endpoint.into(),
            settings,
        }
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn settings(&self) -> &RouteSettings {
        &self.settings
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    /// Raw value of a path argument.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Path argument parsed into `T`. A value that does not parse is a 404.
    pub fn path_as<T: std::str::FromStr>(&self, name: &str) -> Result<T, ApiError> {
        self.path_param(name)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(ApiError::not_found)
    }

    pub(crate) fn push_arg(&mut self, location: Location, value: Value, files: Vec<UploadedFile>) {
        self.args.push((location, value));
        self.files.extend(files);
    }

    /// Loaded argument of a location. With several decorations on the same
    /// location, the outermost comes first.
    pub fn arg(&self, location: Location) -> Option<&Value> {
        self.args
            .iter()
            .find(|(l, _)| *l == location)
            .map(|(_, value)| value)
    }

    /// All loaded arguments, outermost decoration first.
    pub fn args(&self) -> &[(Location, Value)] {
        &self.args
    }

    /// Loaded argument deserialized into `T`.
    pub fn arg_as<T: DeserializeOwned>(&self, location: Location) -> Result<T, ApiError> {
        let value = self
            .arg(location)
            .cloned()
            .ok_or_else(|| ApiError::internal(format!("no {location} argument declared")))?;
        serde_json::from_value(value).map_err(ApiError::internal)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        self.arg_as(Location::Json)
    }

    pub fn query<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        self.arg_as(Location::Query)
    }

    /// Uploaded files of a `files` argument.
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.name == name)
    }

    // ── Pagination ──

    /// Pagination of a paginated view.
    pub fn pagination(&self) -> Result<PaginationParameters, ApiError> {
        self.ctx
            .pagination()
            .ok_or_else(|| ApiError::internal("view is not paginated"))
    }

    /// Report the total number of items of a paginated view.
    pub fn set_item_count(&self, count: u64) {
        if let Some(ref mut params) = self.ctx.state().pagination_parameters {
            params.item_count = Some(count);
        }
    }

    // ── ETag ──

    /// Compare `If-Match` with the ETag of `data`. `412` on mismatch.
    pub fn check_etag(&self, data: &Value, schema: Option<&SchemaRef>) -> Result<Option<Diagnostic>, ApiError> {
        etag::check_etag(
            &self.ctx,
            self.method(),
            self.headers(),
            data,
            schema,
            self.settings.etag_enabled,
        )
    }

    /// Set the response ETag from `data`. `304` when it matches
    /// `If-None-Match` on GET or HEAD.
    pub fn set_etag(&self, data: &Value, schema: Option<&SchemaRef>) -> Result<Option<Diagnostic>, ApiError> {
        etag::set_etag(
            &self.ctx,
            self.method(),
            self.headers(),
            data,
            schema,
            self.settings.etag_enabled,
        )
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("method", self.method())
            .field("uri", &self.parts.uri)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
