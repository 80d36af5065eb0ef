//! Values returned by views.
//!
//! A view returns anything implementing [`IntoReply`]: a JSON value, a
//! framework [`Response`], or a tuple adding a status code and/or headers.
//! The tuple shapes are fixed by the implementations below, so a tuple of
//! any other shape is rejected at compile time.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug)]
pub enum ReplyBody {
    /// Data still to be serialized by the response stage.
    Data(Value),
    /// A finished response. Only status and header overrides apply.
    Native(Response),
}

#[derive(Debug)]
pub struct Reply {
    pub body: ReplyBody,
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
}

impl Reply {
    pub fn data(value: Value) -> Self {
        Self {
            body: ReplyBody::Data(value),
            status: None,
            headers: HeaderMap::new(),
        }
    }

    /// Reply with any serializable value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        Ok(Self::data(serde_json::to_value(value)?))
    }

    pub fn native(response: Response) -> Self {
        Self {
            body: ReplyBody::Native(response),
            status: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, ReplyBody::Native(_))
    }

    /// The data payload, if this is not a native response.
    pub fn value(&self) -> Option<&Value> {
        match self.body {
            ReplyBody::Data(ref value) => Some(value),
            ReplyBody::Native(_) => None,
        }
    }

    /// Render the reply. Data is encoded as JSON with `200` unless a status
    /// was set. A null payload with `204` renders an empty body.
    pub fn into_response(self) -> Response {
        let mut response = match self.body {
            ReplyBody::Native(response) => response,
            ReplyBody::Data(Value::Null) if self.status == Some(StatusCode::NO_CONTENT) => {
                Response::new(Body::empty())
            }
            ReplyBody::Data(value) => Json(value).into_response(),
        };
        if let Some(status) = self.status {
            *response.status_mut() = status;
        }
        for (name, value) in self.headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

/// Conversion of a view's return value into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, ApiError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(self)
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(Reply::data(self))
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(Reply::data(Value::Null))
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Ok(Reply::native(self))
    }
}

impl<T: Serialize> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, ApiError> {
        Reply::json(&self.0)
    }
}

/// Second or third element of a reply tuple.
pub trait ReplyPart {
    fn apply(self, reply: &mut Reply) -> Result<(), ApiError>;
}

impl ReplyPart for StatusCode {
    fn apply(self, reply: &mut Reply) -> Result<(), ApiError> {
        reply.status = Some(self);
        Ok(())
    }
}

impl ReplyPart for u16 {
    fn apply(self, reply: &mut Reply) -> Result<(), ApiError> {
        let status = StatusCode::from_u16(self).map_err(ApiError::internal)?;
        reply.status = Some(status);
        Ok(())
    }
}

impl ReplyPart for HeaderMap {
    fn apply(self, reply: &mut Reply) -> Result<(), ApiError> {
        for (name, value) in self.iter() {
            reply.headers.append(name.clone(), value.clone());
        }
        Ok(())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> ReplyPart for Vec<(K, V)> {
    fn apply(self, reply: &mut Reply) -> Result<(), ApiError> {
        for (name, value) in self {
            let name = HeaderName::try_from(name.as_ref()).map_err(ApiError::internal)?;
            let value = HeaderValue::try_from(value.as_ref()).map_err(ApiError::internal)?;
            reply.headers.append(name, value);
        }
        Ok(())
    }
}

impl<B: IntoReply, P: ReplyPart> IntoReply for (B, P) {
    fn into_reply(self) -> Result<Reply, ApiError> {
        let mut reply = self.0.into_reply()?;
        self.1.apply(&mut reply)?;
        Ok(reply)
    }
}

impl<B, H> IntoReply for (B, StatusCode, H)
where
    B: IntoReply,
    H: ReplyPart,
{
    fn into_reply(self) -> Result<Reply, ApiError> {
        let mut reply = self.0.into_reply()?;
        reply.status = Some(self.1);
        self.2.apply(&mut reply)?;
        Ok(reply)
    }
}

impl<B, H> IntoReply for (B, u16, H)
where
    B: IntoReply,
    H: ReplyPart,
{
    fn into_reply(self) -> Result<Reply, ApiError> {
        let mut reply = self.0.into_reply()?;
        self.1.apply(&mut reply)?;
        self.2.apply(&mut reply)?;
        Ok(reply)
    }
}
