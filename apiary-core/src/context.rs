use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::pagination::PaginationParameters;
use crate::schema::SchemaRef;

/// State shared by the pipeline stages of one request.
#[derive(Debug, Default)]
pub struct ContextState {
    /// Value returned by the view, before serialization.
    pub result_raw: Option<Value>,
    /// Serialized response payload.
    pub result_dump: Option<Value>,
    /// ETag set explicitly by the view.
    pub etag: Option<String>,
    /// Whether the view verified `If-Match` itself.
    pub etag_checked: bool,
    pub etag_schema: Option<SchemaRef>,
    pub pagination_parameters: Option<PaginationParameters>,
}

/// Per-request context.
///
/// The dispatcher creates one for every request and hands it to the view
/// inside the [`Call`](crate::call::Call). Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    inner: Arc<Mutex<ContextState>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state. A poisoned lock is recovered since the state holds
    /// plain data.
    pub fn state(&self) -> MutexGuard<'_, ContextState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pagination(&self) -> Option<PaginationParameters> {
        self.state().pagination_parameters.clone()
    }

    pub fn result_dump(&self) -> Option<Value> {
        self.state().result_dump.clone()
    }

    pub fn etag(&self) -> Option<String> {
        self.state().etag.clone()
    }

    pub fn etag_checked(&self) -> bool {
        self.state().etag_checked
    }
}
