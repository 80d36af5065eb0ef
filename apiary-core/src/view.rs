//! Views and their decorators.
//!
//! A [`View`] is an async handler plus the documentation its decorators
//! accumulated. Every decorator consumes the view and returns a new one
//! whose handler wraps the previous one, so the first decorator applied
//! runs innermost:
//!
//! ```ignore
//! View::new(list_items)
//!     .paginate(Pagination::new(PaginateOptions::default()).with_pager(Page))
//!     .response(ResponseOptions::new(StatusCode::OK).schema(item_schema().many()))
//!     .etag()
//! ```

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::header::{HeaderName, HeaderValue, ETAG};
use http::{Method, StatusCode};
use serde_json::Value;

use crate::arguments::{load_argument, read_location, ArgOptions, Location};
use crate::call::Call;
use crate::doc::{deep_update, deep_update_map, ArgumentDoc, DocInfo, ResponseEntry};
use crate::error::{ApiError, Diagnostic};
use crate::etag;
use crate::pagination::{Pagination, PaginationMetadata};
use crate::reply::{IntoReply, Reply, ReplyBody};
use crate::response::{finish_reply, AltResponse, ResponseOptions};
use crate::schema::SchemaRef;

/// Type-erased view handler.
pub type Handler = Arc<dyn Fn(Call) -> BoxFuture<'static, Result<Reply, ApiError>> + Send + Sync>;

/// HTTP methods in documentation order.
pub fn http_methods() -> [Method; 7] {
    [
        Method::OPTIONS,
        Method::HEAD,
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ]
}

#[derive(Clone)]
pub struct View {
    handler: Handler,
    doc: DocInfo,
    docstring: Option<String>,
}

impl View {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Call) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
        R: IntoReply,
    {
        let handler: Handler = Arc::new(move |call: Call| {
            let fut = f(call);
            async move { fut.await?.into_reply() }.boxed()
        });
        Self {
            handler,
            doc: DocInfo::default(),
            docstring: None,
        }
    }

    pub fn doc_info(&self) -> &DocInfo {
        &self.doc
    }

    pub fn docstring_text(&self) -> Option<&str> {
        self.docstring.as_deref()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Run the view.
    pub fn call(&self, call: Call) -> BoxFuture<'static, Result<Reply, ApiError>> {
        (self.handler)(call)
    }

    fn wrap(self, doc: DocInfo, wrap: impl FnOnce(Handler) -> Handler) -> Self {
        Self {
            handler: wrap(self.handler),
            doc,
            docstring: self.docstring,
        }
    }

    /// Summary and description text. Lines after `---` are ignored.
    pub fn docstring(mut self, text: impl Into<String>) -> Self {
        self.docstring = Some(text.into());
        self
    }

    /// Load an argument and hand it to the view through [`Call::arg`].
    pub fn arguments(self, schema: impl Into<SchemaRef>, options: ArgOptions) -> Self {
        let schema = schema.into();
        let mut doc = self.doc.clone();
        doc.arguments.push(ArgumentDoc {
            location: options.location,
            schema: schema.clone(),
            required: options.required,
            content_type: options.content_type.clone(),
            description: options.description.clone(),
            example: options.example.clone(),
            examples: options.examples.clone(),
        });
        let status = StatusCode::UNPROCESSABLE_ENTITY.as_u16().to_string();
        if !doc.argument_responses.iter().any(|(s, _)| *s == status) {
            doc.argument_responses
                .push((status, ResponseEntry::for_status(StatusCode::UNPROCESSABLE_ENTITY)));
        }

        let options = Arc::new(options);
        self.wrap(doc, move |inner: Handler| -> Handler {
            Arc::new(move |mut call: Call| {
                let inner = inner.clone();
                let schema = schema.clone();
                let options = options.clone();
                async move {
                    let (value, files) = load_argument(
                        &schema,
                        &options,
                        call.parts(),
                        call.body(),
                        call.path_params(),
                    )
                    .await?;
                    call.push_arg(options.location, value, files);
                    inner(call).await
                }
                .boxed()
            })
        })
    }

    /// Serialize the returned data through the response schema.
    pub fn response(self, options: impl Into<ResponseOptions>) -> Self {
        let options = options.into();
        let mut doc = self.doc.clone();
        let status = options.status.as_u16().to_string();
        doc.set_response(status.clone(), ResponseEntry::Inline(options.to_doc()));
        doc.add_success_status(status);

        let options = Arc::new(options);
        self.wrap(doc, move |inner: Handler| -> Handler {
            Arc::new(move |call: Call| {
                let inner = inner.clone();
                let options = options.clone();
                async move {
                    let ctx = call.context().clone();
                    let envelope = call.settings().response_envelope.clone();
                    let reply = inner(call).await?;
                    finish_reply(reply, &options, &ctx, envelope.as_deref())
                }
                .boxed()
            })
        })
    }

    /// Document another response of the view.
    pub fn alt_response(mut self, alt: AltResponse) -> Self {
        let mut doc = self.doc.clone();
        let status = alt.status.as_u16().to_string();
        if alt.success {
            doc.add_success_status(status.clone());
        }
        doc.set_response(status, alt.entry);
        self.doc = doc;
        self
    }

    /// Paginate the view.
    pub fn paginate(self, pagination: Pagination) -> Self {
        let mut doc = self.doc.clone();
        doc.pagination = Some(pagination.options);

        let pagination = Arc::new(pagination);
        self.wrap(doc, move |inner: Handler| -> Handler {
            Arc::new(move |call: Call| {
                let inner = inner.clone();
                let pagination = pagination.clone();
                async move {
                    let query = read_location(
                        Location::Query,
                        call.parts(),
                        call.body(),
                        call.path_params(),
                        &Value::Null,
                    )
                    .await?;
                    let params = pagination.load_parameters(query.data)?;
                    let ctx = call.context().clone();
                    let endpoint = call.endpoint().to_string();
                    ctx.state().pagination_parameters = Some(params);

                    let mut reply = inner(call).await?;

                    if let Some(ref pager) = pagination.pager {
                        if let ReplyBody::Data(ref mut value) = reply.body {
                            let mut params = ctx
                                .pagination()
                                .ok_or_else(|| ApiError::internal("pagination parameters lost"))?;
                            *value = pager.paginate(value.take(), &mut params)?;
                            ctx.state().pagination_parameters = Some(params);
                        }
                    }

                    let params = ctx.pagination();
                    match params.as_ref().and_then(|p| p.item_count.map(|count| (p, count))) {
                        Some((params, count)) => {
                            let meta = PaginationMetadata::compute(params.page, params.page_size, count);
                            let header = HeaderValue::try_from(meta.header_value()?)
                                .map_err(ApiError::internal)?;
                            reply
                                .headers
                                .insert(HeaderName::from_static("x-pagination"), header);
                        }
                        None => Diagnostic::ItemCountNotSet { endpoint }.emit(),
                    }
                    Ok(reply)
                }
                .boxed()
            })
        })
    }

    /// Conditional requests with the ETag computed from the response payload.
    pub fn etag(self) -> Self {
        self.etag_inner(None)
    }

    /// Conditional requests with the ETag computed from the data dumped
    /// through `schema`.
    pub fn etag_with(self, schema: impl Into<SchemaRef>) -> Self {
        self.etag_inner(Some(schema.into()))
    }

    fn etag_inner(self, schema: Option<SchemaRef>) -> Self {
        let mut doc = self.doc.clone();
        doc.etag = true;

        self.wrap(doc, move |inner: Handler| -> Handler {
            Arc::new(move |call: Call| {
                let inner = inner.clone();
                let schema = schema.clone();
                async move {
                    let enabled = call.settings().etag_enabled;
                    let method = call.method().clone();
                    let request_headers = call.headers().clone();
                    let endpoint = call.endpoint().to_string();
                    let ctx = call.context().clone();
                    if enabled {
                        etag::check_precondition(&method, &request_headers)?;
                    }
                    ctx.state().etag_schema = schema;

                    let mut reply = inner(call).await?;

                    if enabled {
                        etag::verify_check_etag(&ctx, &method, &endpoint);
                        if let Some(tag) =
                            etag::response_etag(&ctx, &method, &request_headers, &reply.headers)?
                        {
                            reply.headers.insert(ETAG, etag::etag_header(&tag)?);
                        }
                    }
                    Ok(reply)
                }
                .boxed()
            })
        })
    }

    /// Merge a fragment over the generated operation.
    ///
    /// Called several times, the fragments merge recursively.
    pub fn doc(mut self, fragment: Value) -> Self {
        let mut doc = self.doc.clone();
        match fragment {
            Value::Object(map) => deep_update_map(&mut doc.manual_doc, map),
            other => tracing::warn!(fragment = %other, "ignoring non-object doc fragment"),
        }
        self.doc = doc;
        self
    }

    /// Attach a plugin fragment, e.g. `security`.
    pub fn with_doc_extension(mut self, key: &str, fragment: Value) -> Self {
        let mut doc = self.doc.clone();
        match doc.extensions.get_mut(key) {
            Some(existing) => deep_update(existing, fragment),
            None => {
                doc.extensions.insert(key.to_string(), fragment);
            }
        }
        self.doc = doc;
        self
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("doc", &self.doc)
            .field("docstring", &self.docstring)
            .finish()
    }
}

/// One view per HTTP method.
///
/// Decorators applied to the `MethodView` apply to every method it holds.
#[derive(Clone, Default, Debug)]
pub struct MethodView {
    views: Vec<(Method, View)>,
}

impl MethodView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method, view: View) -> Self {
        self.views.retain(|(m, _)| *m != method);
        self.views.push((method, view));
        self
    }

    pub fn get(self, view: View) -> Self {
        self.method(Method::GET, view)
    }

    pub fn post(self, view: View) -> Self {
        self.method(Method::POST, view)
    }

    pub fn put(self, view: View) -> Self {
        self.method(Method::PUT, view)
    }

    pub fn patch(self, view: View) -> Self {
        self.method(Method::PATCH, view)
    }

    pub fn delete(self, view: View) -> Self {
        self.method(Method::DELETE, view)
    }

    pub fn head(self, view: View) -> Self {
        self.method(Method::HEAD, view)
    }

    pub fn options(self, view: View) -> Self {
        self.method(Method::OPTIONS, view)
    }

    /// Apply `decorate` to the view of every method.
    pub fn decorate(self, decorate: impl Fn(View) -> View) -> Self {
        Self {
            views: self
                .views
                .into_iter()
                .map(|(method, view)| (method, decorate(view)))
                .collect(),
        }
    }

    pub fn arguments(self, schema: impl Into<SchemaRef>, options: ArgOptions) -> Self {
        let schema = schema.into();
        self.decorate(|view| view.arguments(schema.clone(), options.clone()))
    }

    pub fn response(self, options: impl Into<ResponseOptions>) -> Self {
        let options = options.into();
        self.decorate(|view| view.response(options.clone()))
    }

    pub fn alt_response(self, alt: AltResponse) -> Self {
        self.decorate(|view| view.alt_response(alt.clone()))
    }

    pub fn paginate(self, pagination: Pagination) -> Self {
        self.decorate(|view| view.paginate(pagination.clone()))
    }

    pub fn etag(self) -> Self {
        self.decorate(View::etag)
    }

    pub fn doc(self, fragment: Value) -> Self {
        self.decorate(|view| view.doc(fragment.clone()))
    }

    pub fn with_doc_extension(self, key: &str, fragment: Value) -> Self {
        self.decorate(|view| view.with_doc_extension(key, fragment.clone()))
    }

    pub fn view(&self, method: &Method) -> Option<&View> {
        self.views.iter().find(|(m, _)| m == method).map(|(_, v)| v)
    }

    /// Implemented methods in documentation order.
    pub fn implemented(&self) -> Vec<Method> {
        http_methods()
            .into_iter()
            .filter(|m| self.view(m).is_some())
            .collect()
    }
}

/// What a route dispatches to.
#[derive(Debug, Clone)]
pub enum ViewKind {
    /// One view answering the listed methods.
    Single { view: View, methods: Vec<Method> },
    Multi(MethodView),
}

impl ViewKind {
    pub fn single(view: View, methods: impl IntoIterator<Item = Method>) -> Self {
        ViewKind::Single {
            view,
            methods: methods.into_iter().collect(),
        }
    }

    /// `(method, view)` pairs served by the route, in documentation order,
    /// restricted to `filter` when given.
    pub fn resolve(&self, filter: Option<&[Method]>) -> Vec<(Method, View)> {
        let allowed = |m: &Method| filter.map_or(true, |f| f.contains(m));
        match self {
            ViewKind::Single { view, methods } => http_methods()
                .into_iter()
                .filter(|m| methods.contains(m) && allowed(m))
                .map(|m| (m, view.clone()))
                .collect(),
            ViewKind::Multi(multi) => multi
                .implemented()
                .into_iter()
                .filter(|m| allowed(m))
                .filter_map(|m| multi.view(&m).map(|v| (m.clone(), v.clone())))
                .collect(),
        }
    }
}

impl From<View> for ViewKind {
    fn from(view: View) -> Self {
        ViewKind::single(view, [Method::GET])
    }
}

impl From<MethodView> for ViewKind {
    fn from(view: MethodView) -> Self {
        ViewKind::Multi(view)
    }
}
