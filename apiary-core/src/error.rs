use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde_json::{Map, Value};

use crate::validation::ValidationErrors;

/// Upper snake case name of a status code, e.g. `UNPROCESSABLE_ENTITY`.
///
/// Used as the name of the reusable response documenting that status.
pub fn status_name(status: StatusCode) -> String {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let mut name = String::with_capacity(reason.len());
    for c in reason.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
        } else if c == ' ' || c == '-' {
            name.push('_');
        }
    }
    name
}

/// Error returned by views and pipeline stages.
///
/// Rendered as `{code, status, message?, errors?}` with optional extra
/// headers. A `304 Not Modified` renders with an empty body.
pub struct ApiError {
    status: StatusCode,
    message: Option<String>,
    errors: Option<Value>,
    headers: HeaderMap,
}

impl ApiError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            errors: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_errors(mut self, errors: impl Into<Value>) -> Self {
        self.errors = Some(errors.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST).with_message(message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT).with_message(message)
    }

    /// 422 carrying field-level errors keyed by argument location.
    pub fn unprocessable(location: &str, errors: ValidationErrors) -> Self {
        let mut by_location = Map::new();
        by_location.insert(location.to_string(), errors.into_value());
        Self::new(StatusCode::UNPROCESSABLE_ENTITY).with_errors(Value::Object(by_location))
    }

    pub fn not_modified() -> Self {
        Self::new(StatusCode::NOT_MODIFIED)
    }

    pub fn precondition_failed() -> Self {
        Self::new(StatusCode::PRECONDITION_FAILED)
    }

    pub fn precondition_required() -> Self {
        Self::new(StatusCode::PRECONDITION_REQUIRED)
    }

    /// Internal error. The cause is logged and never sent to the client.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn errors(&self) -> Option<&Value> {
        self.errors.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The JSON payload sent to the client.
    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("code".into(), Value::from(self.status.as_u16()));
        payload.insert(
            "status".into(),
            Value::from(self.status.canonical_reason().unwrap_or("Unknown")),
        );
        if let Some(ref message) = self.message {
            payload.insert("message".into(), Value::from(message.clone()));
        }
        if let Some(ref errors) = self.errors {
            payload.insert("errors".into(), errors.clone());
        }
        Value::Object(payload)
    }
}

/// Shorthand for `ApiError::new(status)`.
pub fn abort(status: StatusCode) -> ApiError {
    ApiError::new(status)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = if self.status == StatusCode::NOT_MODIFIED {
            self.status.into_response()
        } else {
            (self.status, Json(self.payload())).into_response()
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message {
            Some(ref message) => write!(f, "{}: {message}", self.status),
            None => write!(f, "{}", self.status),
        }
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ApiError {}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal(err)
    }
}

impl From<crate::schema::SchemaError> for ApiError {
    fn from(err: crate::schema::SchemaError) -> Self {
        ApiError::internal(err)
    }
}

/// Generate `From<E> for ApiError` implementations mapping error types to
/// a status code.
///
/// # Example
///
/// ```ignore
/// apiary_core::map_error! {
///     std::io::Error => INTERNAL_SERVER_ERROR,
///     std::num::ParseIntError => BAD_REQUEST,
/// }
/// ```
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $status:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::ApiError {
                fn from(err: $err_ty) -> Self {
                    let status = $crate::http::StatusCode::$status;
                    if status.is_server_error() {
                        $crate::ApiError::internal(err)
                    } else {
                        $crate::ApiError::new(status).with_message(err.to_string())
                    }
                }
            }
        )*
    };
}

/// Errors raised while declaring views and routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    /// The same HTTP method was documented twice for one endpoint.
    DuplicateMethodDoc { endpoint: String, method: String },
    /// More than one body location (json, form, files) on a single method.
    MultipleBodyLocations { endpoint: String, method: String },
    /// The URL rule could not be parsed.
    InvalidRule { rule: String, reason: String },
    /// No endpoint name was given and none could be derived.
    MissingEndpoint { rule: String },
    /// A nested blueprint brings an endpoint name that is already taken.
    DuplicateEndpoint { endpoint: String },
}

impl std::fmt::Display for DeclarationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclarationError::DuplicateMethodDoc { endpoint, method } => write!(
                f,
                "Method {method} is already documented for endpoint \"{endpoint}\""
            ),
            DeclarationError::MultipleBodyLocations { endpoint, method } => write!(
                f,
                "Only one body argument (json, form or files) allowed for {method} on \"{endpoint}\""
            ),
            DeclarationError::InvalidRule { rule, reason } => {
                write!(f, "Invalid URL rule \"{rule}\": {reason}")
            }
            DeclarationError::MissingEndpoint { rule } => {
                write!(f, "No endpoint name given for rule \"{rule}\"")
            }
            DeclarationError::DuplicateEndpoint { endpoint } => {
                write!(f, "Endpoint \"{endpoint}\" is already registered")
            }
        }
    }
}

impl std::error::Error for DeclarationError {}

/// Developer-contract violation detected at request time.
///
/// These never reach the client. [`Diagnostic::emit`] logs them at warn
/// level; the helpers that detect them also return them for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// PUT, PATCH or DELETE on an ETag view that never called `check_etag`.
    EtagNotChecked { endpoint: String, method: String },
    EtagCannotBeChecked { method: String },
    EtagCannotBeSet { method: String },
    /// A paginated view did not report its item count.
    ItemCountNotSet { endpoint: String },
}

impl Diagnostic {
    pub fn emit(&self) {
        tracing::warn!("{self}");
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::EtagNotChecked { endpoint, method } => {
                write!(f, "ETag not checked in endpoint {endpoint} on {method} request.")
            }
            Diagnostic::EtagCannotBeChecked { method } => {
                write!(f, "ETag cannot be checked on {method} request.")
            }
            Diagnostic::EtagCannotBeSet { method } => {
                write!(f, "ETag cannot be set on {method} request.")
            }
            Diagnostic::ItemCountNotSet { endpoint } => {
                write!(f, "item_count not set in endpoint {endpoint}.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names() {
        assert_eq!(status_name(StatusCode::UNPROCESSABLE_ENTITY), "UNPROCESSABLE_ENTITY");
        assert_eq!(status_name(StatusCode::NOT_MODIFIED), "NOT_MODIFIED");
        assert_eq!(status_name(StatusCode::IM_A_TEAPOT), "IM_A_TEAPOT");
        assert_eq!(status_name(StatusCode::MULTI_STATUS), "MULTI_STATUS");
    }

    #[test]
    fn payload_omits_empty_fields() {
        let payload = ApiError::not_found().payload();
        assert_eq!(payload, serde_json::json!({"code": 404, "status": "Not Found"}));
    }
}
