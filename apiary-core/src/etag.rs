//! Conditional requests.
//!
//! The ETag of a response is the SHA-1 of the canonical JSON of its dumped
//! payload, combined with the headers listed in [`INCLUDE_HEADERS`].
//! `If-Match` is compared strongly, `If-None-Match` weakly.

use http::header::{HeaderMap, HeaderValue, ETAG, IF_MATCH, IF_NONE_MATCH};
use http::Method;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use crate::context::RequestContext;
use crate::error::{ApiError, Diagnostic};
use crate::pagination::PAGINATION_HEADER;
use crate::schema::SchemaRef;

/// Response headers that take part in the ETag digest.
pub const INCLUDE_HEADERS: &[&str] = &[PAGINATION_HEADER];

/// Methods answering `304 Not Modified` to a matching `If-None-Match`.
pub fn checks_not_modified(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Methods requiring `If-Match`.
pub fn needs_check(method: &Method) -> bool {
    *method == Method::PUT || *method == Method::PATCH || *method == Method::DELETE
}

/// Methods whose responses carry an ETag.
pub fn allows_set(method: &Method) -> bool {
    checks_not_modified(method)
        || *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
}

// ── Digest ─────────────────────────────────────────────────

/// Copy of `value` with every object's keys sorted.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with sorted keys.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Hex SHA-1 of `data`, or of `[data, extra]` when extra headers are given.
///
/// ```
/// use serde_json::json;
/// use apiary_core::etag::generate_etag;
///
/// let a = generate_etag(&json!({"a": 1, "b": {"c": 2, "d": 3}}), &[]);
/// let b = generate_etag(&json!({"b": {"d": 3, "c": 2}, "a": 1}), &[]);
/// assert_eq!(a, b);
/// ```
pub fn generate_etag(data: &Value, extra: &[(String, String)]) -> String {
    let payload = if extra.is_empty() {
        canonical_json(data)
    } else {
        let extra: Vec<Value> = extra
            .iter()
            .map(|(name, value)| Value::Array(vec![name.clone().into(), value.clone().into()]))
            .collect();
        canonical_json(&Value::Array(vec![data.clone(), Value::Array(extra)]))
    };
    hex::encode(Sha1::digest(payload.as_bytes()))
}

/// ETag of `data`, dumped through `schema` first when one is given.
pub fn compute_etag(
    data: &Value,
    schema: Option<&SchemaRef>,
    extra: &[(String, String)],
) -> Result<String, ApiError> {
    match schema {
        Some(schema) => Ok(generate_etag(&schema.dump(data)?, extra)),
        None => Ok(generate_etag(data, extra)),
    }
}

/// The `(name, value)` pairs of [`INCLUDE_HEADERS`] present in `headers`.
pub fn included_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    INCLUDE_HEADERS
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

// ── Validator lists ────────────────────────────────────────

/// Parsed `If-Match` / `If-None-Match` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtagList {
    Any,
    Tags(Vec<(bool, String)>),
}

impl EtagList {
    pub fn parse(header: &str) -> Self {
        let mut tags = Vec::new();
        for item in header.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if item == "*" {
                return EtagList::Any;
            }
            let (weak, rest) = match item.strip_prefix("W/").or_else(|| item.strip_prefix("w/")) {
                Some(rest) => (true, rest),
                None => (false, item),
            };
            tags.push((weak, rest.trim_matches('"').to_string()));
        }
        EtagList::Tags(tags)
    }

    fn from_headers(headers: &HeaderMap, name: &http::HeaderName) -> Option<Self> {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(EtagList::parse(&values.join(",")))
        }
    }

    /// Strong comparison: weak tags never match.
    pub fn contains(&self, etag: &str) -> bool {
        match self {
            EtagList::Any => true,
            EtagList::Tags(tags) => tags.iter().any(|(weak, tag)| !weak && tag == etag),
        }
    }

    /// Weak comparison.
    pub fn contains_weak(&self, etag: &str) -> bool {
        match self {
            EtagList::Any => true,
            EtagList::Tags(tags) => tags.iter().any(|(_, tag)| tag == etag),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EtagList::Tags(tags) if tags.is_empty())
    }
}

fn if_match(headers: &HeaderMap) -> Option<EtagList> {
    EtagList::from_headers(headers, &IF_MATCH).filter(|list| !list.is_empty())
}

fn if_none_match(headers: &HeaderMap) -> Option<EtagList> {
    EtagList::from_headers(headers, &IF_NONE_MATCH)
}

/// `ETag` header value for a digest.
pub fn etag_header(etag: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::try_from(format!("\"{etag}\"")).map_err(ApiError::internal)
}

// ── Pipeline helpers ───────────────────────────────────────

/// Require `If-Match` on PUT, PATCH and DELETE.
pub fn check_precondition(method: &Method, headers: &HeaderMap) -> Result<(), ApiError> {
    if needs_check(method) && if_match(headers).is_none() {
        return Err(ApiError::precondition_required());
    }
    Ok(())
}

/// `304` when `etag` matches `If-None-Match` on GET or HEAD.
pub fn check_not_modified(method: &Method, headers: &HeaderMap, etag: &str) -> Result<(), ApiError> {
    if checks_not_modified(method)
        && if_none_match(headers).is_some_and(|list| list.contains_weak(etag))
    {
        return Err(ApiError::not_modified().with_header(ETAG, etag_header(etag)?));
    }
    Ok(())
}

/// Compare `If-Match` with the ETag of `data`.
///
/// Fails with `412` on mismatch. Returns a diagnostic when called on a
/// method other than PUT, PATCH or DELETE.
pub fn check_etag(
    ctx: &RequestContext,
    method: &Method,
    headers: &HeaderMap,
    data: &Value,
    schema: Option<&SchemaRef>,
    enabled: bool,
) -> Result<Option<Diagnostic>, ApiError> {
    let diagnostic = (!needs_check(method)).then(|| Diagnostic::EtagCannotBeChecked {
        method: method.to_string(),
    });
    if let Some(ref d) = diagnostic {
        d.emit();
    }
    if enabled {
        let schema = schema.cloned().or_else(|| ctx.state().etag_schema.clone());
        let etag = compute_etag(data, schema.as_ref(), &[])?;
        ctx.state().etag_checked = true;
        if !if_match(headers).is_some_and(|list| list.contains(&etag)) {
            return Err(ApiError::precondition_failed());
        }
    }
    Ok(diagnostic)
}

/// Set the ETag of the response from `data` instead of the payload.
///
/// Fails with `304` when it matches `If-None-Match` on GET or HEAD.
pub fn set_etag(
    ctx: &RequestContext,
    method: &Method,
    headers: &HeaderMap,
    data: &Value,
    schema: Option<&SchemaRef>,
    enabled: bool,
) -> Result<Option<Diagnostic>, ApiError> {
    let diagnostic = (!allows_set(method)).then(|| Diagnostic::EtagCannotBeSet {
        method: method.to_string(),
    });
    if let Some(ref d) = diagnostic {
        d.emit();
    }
    if enabled {
        let schema = schema.cloned().or_else(|| ctx.state().etag_schema.clone());
        let etag = compute_etag(data, schema.as_ref(), &[])?;
        check_not_modified(method, headers, &etag)?;
        ctx.state().etag = Some(etag);
    }
    Ok(diagnostic)
}

/// Warn when a PUT, PATCH or DELETE view never called `check_etag`.
pub fn verify_check_etag(ctx: &RequestContext, method: &Method, endpoint: &str) -> Option<Diagnostic> {
    if needs_check(method) && !ctx.etag_checked() {
        let diagnostic = Diagnostic::EtagNotChecked {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        };
        diagnostic.emit();
        return Some(diagnostic);
    }
    None
}

/// ETag for the finished response.
///
/// Uses the ETag set by the view, or computes one from the payload and the
/// included response headers. `None` for methods that carry no ETag.
pub fn response_etag(
    ctx: &RequestContext,
    method: &Method,
    request_headers: &HeaderMap,
    response_headers: &HeaderMap,
) -> Result<Option<String>, ApiError> {
    if !allows_set(method) {
        return Ok(None);
    }
    if let Some(etag) = ctx.etag() {
        return Ok(Some(etag));
    }
    let (data, schema) = {
        let state = ctx.state();
        match state.etag_schema {
            Some(ref schema) => (state.result_raw.clone(), Some(schema.clone())),
            None => (state.result_dump.clone(), None),
        }
    };
    let data = data.unwrap_or(Value::Null);
    let etag = compute_etag(&data, schema.as_ref(), &included_headers(response_headers))?;
    check_not_modified(method, request_headers, &etag)?;
    Ok(Some(etag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(name: http::HeaderName, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn digest_is_order_independent() {
        let a = json!({"x": [1, {"b": 1, "a": 2}], "y": null});
        let b = json!({"y": null, "x": [1, {"a": 2, "b": 1}]});
        assert_eq!(generate_etag(&a, &[]), generate_etag(&b, &[]));
        assert_eq!(canonical_json(&b), r#"{"x":[1,{"a":2,"b":1}],"y":null}"#);
    }

    #[test]
    fn extra_headers_change_digest() {
        let data = json!([1, 2]);
        let extra = vec![("X-Pagination".to_string(), r#"{"total":2}"#.to_string())];
        assert_ne!(generate_etag(&data, &[]), generate_etag(&data, &extra));
        assert_eq!(generate_etag(&data, &[]).len(), 40);
    }

    #[test]
    fn parse_validator_lists() {
        assert_eq!(EtagList::parse("*"), EtagList::Any);
        let list = EtagList::parse(r#""abc", W/"def""#);
        assert!(list.contains("abc"));
        assert!(!list.contains("def"));
        assert!(list.contains_weak("def"));
        assert!(!list.contains_weak("ghi"));
    }

    #[test]
    fn precondition_requires_if_match() {
        let err = check_precondition(&Method::PUT, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::PRECONDITION_REQUIRED);
        assert!(check_precondition(&Method::PUT, &headers(IF_MATCH, "\"a\"")).is_ok());
        assert!(check_precondition(&Method::GET, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn check_etag_compares_if_match() {
        let ctx = RequestContext::new();
        let data = json!({"id": 1});
        let etag = generate_etag(&data, &[]);

        let stale = headers(IF_MATCH, "\"stale\"");
        let err = check_etag(&ctx, &Method::PUT, &stale, &data, None, true).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::PRECONDITION_FAILED);
        assert!(ctx.etag_checked());

        let fresh = headers(IF_MATCH, &format!("\"{etag}\""));
        assert_eq!(check_etag(&ctx, &Method::PUT, &fresh, &data, None, true).unwrap(), None);

        let diagnostic = check_etag(&ctx, &Method::GET, &fresh, &data, None, true).unwrap();
        assert_eq!(
            diagnostic,
            Some(Diagnostic::EtagCannotBeChecked { method: "GET".into() })
        );
    }

    #[test]
    fn set_etag_short_circuits_on_match() {
        let ctx = RequestContext::new();
        let data = json!({"id": 1});
        let etag = generate_etag(&data, &[]);
        let request = headers(IF_NONE_MATCH, &format!("\"{etag}\""));
        let err = set_etag(&ctx, &Method::GET, &request, &data, None, true).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::NOT_MODIFIED);
        assert_eq!(err.headers()[ETAG].to_str().unwrap(), format!("\"{etag}\""));

        set_etag(&ctx, &Method::POST, &request, &data, None, true).unwrap();
        assert_eq!(ctx.etag(), Some(etag));

        let diagnostic = set_etag(&ctx, &Method::DELETE, &request, &data, None, false).unwrap();
        assert!(matches!(diagnostic, Some(Diagnostic::EtagCannotBeSet { .. })));
    }

    #[test]
    fn disabled_etag_only_warns() {
        let ctx = RequestContext::new();
        check_etag(&ctx, &Method::PUT, &HeaderMap::new(), &json!(1), None, false).unwrap();
        assert!(!ctx.etag_checked());
        assert_eq!(
            verify_check_etag(&ctx, &Method::DELETE, "items.item"),
            Some(Diagnostic::EtagNotChecked {
                endpoint: "items.item".into(),
                method: "DELETE".into()
            })
        );
        assert_eq!(verify_check_etag(&ctx, &Method::GET, "items.item"), None);
    }
}
