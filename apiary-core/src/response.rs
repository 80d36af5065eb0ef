use http::StatusCode;
use serde_json::{Map, Value};

use crate::context::RequestContext;
use crate::doc::{ResponseDoc, ResponseEntry};
use crate::error::ApiError;
use crate::reply::{Reply, ReplyBody};
use crate::schema::SchemaRef;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Options of a `response` decoration.
#[derive(Debug, Clone)]
pub struct ResponseOptions {
    pub status: StatusCode,
    pub schema: Option<SchemaRef>,
    pub description: Option<String>,
    pub example: Option<Value>,
    pub examples: Option<Value>,
    pub headers: Option<Map<String, Value>>,
    pub content_type: Option<String>,
}

impl ResponseOptions {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            schema: None,
            description: None,
            example: None,
            examples: None,
            headers: None,
            content_type: None,
        }
    }

    pub fn schema(mut self, schema: impl Into<SchemaRef>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn examples(mut self, examples: Value) -> Self {
        self.examples = Some(examples);
        self
    }

    /// Documented response headers, keyed by header name.
    pub fn headers(mut self, headers: Map<String, Value>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Documentation entry. The description defaults to the reason phrase.
    pub fn to_doc(&self) -> ResponseDoc {
        ResponseDoc {
            schema: self.schema.clone(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| self.status.canonical_reason().unwrap_or("").to_string()),
            example: self.example.clone(),
            examples: self.examples.clone(),
            headers: self.headers.clone(),
            content_type: self
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        }
    }
}

impl From<StatusCode> for ResponseOptions {
    fn from(status: StatusCode) -> Self {
        Self::new(status)
    }
}

/// An additional documented response.
#[derive(Debug, Clone)]
pub struct AltResponse {
    pub(crate) status: StatusCode,
    pub(crate) entry: ResponseEntry,
    pub(crate) success: bool,
}

impl AltResponse {
    /// Reference to a named reusable response.
    pub fn reference(status: StatusCode, name: impl Into<String>) -> Self {
        Self {
            status,
            entry: ResponseEntry::Reference(name.into()),
            success: false,
        }
    }

    /// Reference to the default response of `status`, e.g. `NOT_FOUND`.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            entry: ResponseEntry::for_status(status),
            success: false,
        }
    }

    /// Inline response described by `options` (its status is ignored).
    pub fn inline(status: StatusCode, options: ResponseOptions) -> Self {
        Self {
            status,
            entry: ResponseEntry::Inline(options.to_doc()),
            success: false,
        }
    }

    /// Document the response as a success: ETag and pagination headers are
    /// documented on it.
    pub fn success(mut self) -> Self {
        self.success = true;
        self
    }
}

/// Wrap the dumped payload under `key`.
pub fn envelope(key: Option<&str>, payload: Value) -> Value {
    match key {
        Some(key) => {
            let mut map = Map::new();
            map.insert(key.to_string(), payload);
            Value::Object(map)
        }
        None => payload,
    }
}

/// Serialize a view reply.
///
/// Native responses pass through. Data is dumped through the schema, stored
/// in the request context, wrapped in the envelope and given the default
/// status when the view set none.
pub fn finish_reply(
    reply: Reply,
    options: &ResponseOptions,
    ctx: &RequestContext,
    envelope_key: Option<&str>,
) -> Result<Reply, ApiError> {
    let Reply {
        body,
        status,
        headers,
    } = reply;
    let value = match body {
        ReplyBody::Native(response) => {
            return Ok(Reply {
                body: ReplyBody::Native(response),
                status,
                headers,
            })
        }
        ReplyBody::Data(value) => value,
    };
    let dump = match options.schema {
        Some(ref schema) => schema.dump(&value)?,
        None => value.clone(),
    };
    {
        let mut state = ctx.state();
        state.result_raw = Some(value);
        state.result_dump = Some(dump.clone());
    }
    Ok(Reply {
        body: ReplyBody::Data(envelope(envelope_key, dump)),
        status: Some(status.unwrap_or(options.status)),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::IntoReply;
    use crate::schema::{Field, Fields};
    use serde_json::json;

    fn options() -> ResponseOptions {
        ResponseOptions::new(StatusCode::CREATED).schema(
            Fields::new()
                .field("field", Field::integer())
                .field("item_id", Field::integer().dump_only()),
        )
    }

    #[test]
    fn dumps_and_defaults_status() {
        let ctx = RequestContext::new();
        let reply = json!({"field": 0, "item_id": 1, "secret": "x"}).into_reply().unwrap();
        let reply = finish_reply(reply, &options(), &ctx, None).unwrap();
        assert_eq!(reply.status, Some(StatusCode::CREATED));
        assert_eq!(reply.value(), Some(&json!({"field": 0, "item_id": 1})));
        assert_eq!(ctx.result_dump(), Some(json!({"field": 0, "item_id": 1})));
        assert_eq!(ctx.state().result_raw.as_ref().unwrap()["secret"], "x");
    }

    #[test]
    fn view_status_wins_and_envelope_wraps() {
        let ctx = RequestContext::new();
        let reply = (json!({"field": 2}), StatusCode::OK).into_reply().unwrap();
        let reply = finish_reply(reply, &options(), &ctx, Some("data")).unwrap();
        assert_eq!(reply.status, Some(StatusCode::OK));
        assert_eq!(reply.value(), Some(&json!({"data": {"field": 2}})));
        assert_eq!(ctx.result_dump(), Some(json!({"field": 2})));
    }

    #[test]
    fn native_responses_pass_through() {
        let ctx = RequestContext::new();
        let native = axum::response::Response::new(axum::body::Body::from("raw"));
        let reply = finish_reply(native.into_reply().unwrap(), &options(), &ctx, None).unwrap();
        assert!(reply.is_native());
        assert_eq!(reply.status, None);
        assert!(ctx.result_dump().is_none());
    }

    #[test]
    fn description_defaults_to_reason() {
        let doc = ResponseOptions::new(StatusCode::NOT_FOUND).to_doc();
        assert_eq!(doc.description, "Not Found");
        assert_eq!(doc.content_type, "application/json");
    }
}
