use std::collections::HashMap;
use std::sync::Arc;

use apiary_core::call::RouteSettings;
use apiary_core::prelude::*;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, ETAG, IF_MATCH};
use http::Request;
use http_body_util::BodyExt;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn call(method: Method, uri: &str, headers: &[(&str, &str)], body: &str, settings: RouteSettings) -> Call {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    Call::new(
        parts,
        Bytes::from(body.to_string()),
        HashMap::new(),
        "users.user",
        Arc::new(settings),
    )
}

fn etag_on() -> RouteSettings {
    RouteSettings {
        etag_enabled: true,
        response_envelope: None,
    }
}

fn user_schema() -> Fields {
    Fields::new()
        .named("User")
        .field("user_id", Field::integer().dump_only())
        .field("name", Field::string().required())
        .field("password", Field::string().load_only())
}

async fn send(view: &View, call: Call) -> (StatusCode, http::HeaderMap, Value) {
    let response = match view.call(call).await {
        Ok(reply) => reply.into_response(),
        Err(err) => axum::response::IntoResponse::into_response(err),
    };
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, headers, value)
}

async fn create_user(call: Call) -> Result<(Value, StatusCode), ApiError> {
    let mut user: Value = call.json()?;
    user["user_id"] = json!(7);
    Ok((user, StatusCode::ACCEPTED))
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_then_dump_through_the_schemas() {
    let view = View::new(create_user)
        .arguments(user_schema(), ArgOptions::json())
        .response(ResponseOptions::new(StatusCode::CREATED).schema(user_schema()));
    let call = call(
        Method::POST,
        "/users",
        &[("content-type", "application/json")],
        r#"{"name": "Ann", "password": "secret"}"#,
        RouteSettings::default(),
    );
    let (status, _, body) = send(&view, call).await;
    // the status returned by the view wins over the documented one
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"user_id": 7, "name": "Ann"}));
}

#[tokio::test]
async fn missing_required_field() {
    let view = View::new(create_user)
        .arguments(user_schema(), ArgOptions::json())
        .response(StatusCode::CREATED);
    let call = call(
        Method::POST,
        "/users",
        &[("content-type", "application/json")],
        r#"{"password": "secret"}"#,
        RouteSettings::default(),
    );
    let (status, _, body) = send(&view, call).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["json"]["name"][0], "Missing data for required field.");
}

#[tokio::test]
async fn envelope_wraps_the_payload() {
    async fn get_user(_call: Call) -> Result<Value, ApiError> {
        Ok(json!({"user_id": 1, "name": "Ann", "password": "secret"}))
    }
    let view = View::new(get_user).response(ResponseOptions::new(StatusCode::OK).schema(user_schema()));
    let settings = RouteSettings {
        etag_enabled: false,
        response_envelope: Some("data".into()),
    };
    let (status, _, body) = send(&view, call(Method::GET, "/users/1", &[], "", settings)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"user_id": 1, "name": "Ann"}}));
}

#[tokio::test]
async fn native_responses_pass_through() {
    async fn raw(_call: Call) -> Result<axum::response::Response, ApiError> {
        Ok(axum::response::IntoResponse::into_response((
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain")],
            "pong",
        )))
    }
    let view = View::new(raw).response(ResponseOptions::new(StatusCode::OK).schema(user_schema()));
    let response = view
        .call(call(Method::GET, "/ping", &[], "", RouteSettings::default()))
        .await
        .unwrap()
        .into_response();
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"pong");
}

#[tokio::test]
async fn empty_no_content() {
    async fn delete(_call: Call) -> Result<(), ApiError> {
        Ok(())
    }
    let view = View::new(delete).response(StatusCode::NO_CONTENT);
    let (status, _, body) = send(&view, call(Method::DELETE, "/users/1", &[], "", RouteSettings::default())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn query_and_json_arguments_together() {
    async fn both(call: Call) -> Result<Value, ApiError> {
        Ok(json!({
            "query": call.arg(Location::Query).cloned(),
            "json": call.arg(Location::Json).cloned(),
        }))
    }
    let query = Fields::new().field("dry_run", Field::boolean().load_default(false));
    let view = View::new(both)
        .arguments(query, ArgOptions::query())
        .arguments(user_schema(), ArgOptions::json())
        .response(StatusCode::OK);
    let call = call(
        Method::POST,
        "/users?dry_run=true",
        &[("content-type", "application/json")],
        r#"{"name": "Ann"}"#,
        RouteSettings::default(),
    );
    let (_, _, body) = send(&view, call).await;
    assert_eq!(body, json!({"query": {"dry_run": true}, "json": {"name": "Ann"}}));
}

#[tokio::test]
async fn etag_preconditions() {
    async fn update(call: Call) -> Result<Value, ApiError> {
        let current = json!({"user_id": 1, "name": "Ann"});
        call.check_etag(&current, None)?;
        Ok(current)
    }
    let view = View::new(update).response(StatusCode::OK).etag();

    let (status, _, _) = send(&view, call(Method::PUT, "/users/1", &[], "", etag_on())).await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);

    let (status, _, _) = send(&view, call(Method::PUT, "/users/1", &[("if-match", "\"nope\"")], "", etag_on())).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let tag = apiary_core::etag::generate_etag(&json!({"name": "Ann", "user_id": 1}), &[]);
    let if_match = format!("\"{tag}\"");
    let (status, headers, _) = send(
        &view,
        call(Method::PUT, "/users/1", &[(IF_MATCH.as_str(), if_match.as_str())], "", etag_on()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[ETAG], if_match.as_str());

    // weak validators never satisfy If-Match
    let weak = format!("W/{if_match}");
    let (status, _, _) = send(&view, call(Method::PUT, "/users/1", &[("if-match", weak.as_str())], "", etag_on())).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    // disabled: no precondition and no tag
    let (status, headers, _) = send(&view, call(Method::PUT, "/users/1", &[], "", RouteSettings::default())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(ETAG).is_none());
}

#[tokio::test]
async fn view_sliced_pagination() {
    async fn numbers(call: Call) -> Result<Value, ApiError> {
        let params = call.pagination()?;
        call.set_item_count(95);
        let first = params.first_item();
        Ok(json!((first..first + params.page_size).collect::<Vec<u64>>()))
    }
    let view = View::new(numbers)
        .paginate(Pagination::new(PaginateOptions::default().page_size(20)))
        .response(StatusCode::OK);
    let (status, headers, body) = send(
        &view,
        call(Method::GET, "/numbers?page=5", &[], "", RouteSettings::default()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 20);
    assert_eq!(body[0], 80);
    let meta: Value = serde_json::from_str(headers["x-pagination"].to_str().unwrap()).unwrap();
    assert_eq!(
        meta,
        json!({"total": 95, "total_pages": 5, "first_page": 1, "last_page": 5, "page": 5, "previous_page": 4})
    );
}
