use apiary::prelude::*;
use apiary_test::TestApp;
use items_api::items::ItemStore;

fn app() -> TestApp {
    let registry = items_api::registry(&AppConfig::empty()).unwrap();
    TestApp::new(registry.router().unwrap())
}

async fn create(app: &TestApp, field: i64) -> String {
    let resp = app
        .post("/items")
        .json(&json!({"field": field}))
        .send()
        .await
        .assert_created();
    resp.etag().unwrap().to_string()
}

#[tokio::test]
async fn create_then_conditional_get() {
    let app = app();
    let resp = app
        .post("/items")
        .json(&json!({"field": 0}))
        .send()
        .await
        .assert_created()
        .assert_json_path("field", 0)
        .assert_json_path("item_id", 1);
    let etag = resp.etag().expect("ETag on created item").to_string();

    let resp = app
        .get("/items/1")
        .send()
        .await
        .assert_ok()
        .assert_json_path("item_id", 1);
    assert_eq!(resp.etag(), Some(etag.as_str()));

    let resp = app
        .get("/items/1")
        .if_none_match(&etag)
        .send()
        .await
        .assert_not_modified();
    assert!(resp.is_empty());
    assert_eq!(resp.etag(), Some(etag.as_str()));
}

#[tokio::test]
async fn weak_validator_matches_if_none_match() {
    let app = app();
    let etag = create(&app, 3).await;
    app.get("/items/1")
        .if_none_match(&format!("W/{etag}"))
        .send()
        .await
        .assert_not_modified();
}

#[tokio::test]
async fn update_requires_matching_if_match() {
    let app = app();
    let etag = create(&app, 1).await;

    app.put("/items/1")
        .json(&json!({"field": 2}))
        .send()
        .await
        .assert_precondition_required();
    app.put("/items/1")
        .if_match("\"0000\"")
        .json(&json!({"field": 2}))
        .send()
        .await
        .assert_precondition_failed();

    let resp = app
        .put("/items/1")
        .if_match(&etag)
        .json(&json!({"field": 2}))
        .send()
        .await
        .assert_ok()
        .assert_json_path("field", 2);
    let new_etag = resp.etag().unwrap();
    assert_ne!(new_etag, etag);

    // the old validator is stale now
    app.delete("/items/1")
        .if_match(&etag)
        .send()
        .await
        .assert_precondition_failed();
    let resp = app
        .delete("/items/1")
        .if_match(new_etag)
        .send()
        .await
        .assert_no_content();
    assert!(resp.is_empty());
    app.get("/items/1").send().await.assert_not_found();
}

#[tokio::test]
async fn invalid_body_is_rejected() {
    let app = app();
    app.post("/items")
        .json(&json!({"field": "zero"}))
        .send()
        .await
        .assert_unprocessable()
        .assert_json_path("code", 422)
        .assert_json_path("errors.json.field[0]", "Not a valid integer.");
    app.post("/items")
        .json(&json!({"field": 1, "color": "red"}))
        .send()
        .await
        .assert_unprocessable()
        .assert_json_path("errors.json.color[0]", "Unknown field.");
}

#[tokio::test]
async fn path_converter_rejects_non_integers() {
    let app = app();
    app.get("/items/abc").send().await.assert_not_found().assert_json_path("code", 404);
}

#[tokio::test]
async fn list_is_paginated() {
    let app = app();
    for field in 0..25 {
        create(&app, field).await;
    }

    let resp = app
        .get("/items")
        .query("page", 2)
        .send()
        .await
        .assert_ok();
    let items: Vec<Value> = resp.json();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["item_id"], 11);
    assert_eq!(
        resp.pagination().unwrap(),
        json!({
            "total": 25,
            "total_pages": 3,
            "first_page": 1,
            "last_page": 3,
            "page": 2,
            "previous_page": 1,
            "next_page": 3,
        })
    );

    let resp = app
        .get("/items")
        .query("page", 3)
        .query("page_size", 20)
        .send()
        .await
        .assert_ok();
    assert_eq!(resp.json::<Vec<Value>>(), Vec::<Value>::new());
    assert_eq!(resp.pagination().unwrap()["page"], Value::Null);
}

#[tokio::test]
async fn list_filter_and_pagination_share_the_query() {
    let app = app();
    for field in [1, 2, 1] {
        create(&app, field).await;
    }
    let resp = app
        .get("/items")
        .query("field", 1)
        .query("page_size", 1)
        .send()
        .await
        .assert_ok();
    assert_eq!(resp.json::<Vec<Value>>().len(), 1);
    assert_eq!(resp.pagination().unwrap()["total"], 2);
}

#[tokio::test]
async fn pagination_bounds_are_validated() {
    let app = app();
    app.get("/items")
        .query("page_size", 101)
        .send()
        .await
        .assert_unprocessable()
        .assert_json_path(
            "errors.query.page_size[0]",
            "Must be greater than or equal to 1 and less than or equal to 100.",
        );
    app.get("/items")
        .query("page", 0)
        .send()
        .await
        .assert_unprocessable()
        .assert_json_path("errors.query.page[0]", "Must be greater than or equal to 1.");
}

#[tokio::test]
async fn pagination_header_is_part_of_the_etag() {
    let app = app();
    create(&app, 1).await;
    let first = app.get("/items").send().await.assert_ok();
    let first_etag = first.etag().unwrap().to_string();

    // same page content, different total
    create(&app, 2).await;
    let second = app
        .get("/items")
        .query("page_size", 1)
        .send()
        .await
        .assert_ok();
    assert_eq!(first.json::<Value>(), second.json::<Value>());
    assert_ne!(second.etag().unwrap(), first_etag);

    app.get("/items")
        .query("page_size", 1)
        .if_none_match(second.etag().unwrap())
        .send()
        .await
        .assert_not_modified();
}

#[tokio::test]
async fn attachment_upload() {
    let app = app();
    create(&app, 1).await;
    app.post("/items/1/attachment")
        .multipart(&[("file", "notes.txt", &b"hello"[..])])
        .send()
        .await
        .assert_created()
        .assert_json_path("file_name", "notes.txt")
        .assert_json_path("size", 5);
    app.post("/items/9/attachment")
        .multipart(&[("file", "notes.txt", &b"hello"[..])])
        .send()
        .await
        .assert_not_found();
}

#[tokio::test]
async fn unknown_route_and_method() {
    let app = app();
    app.get("/nowhere").send().await.assert_not_found();
    app.patch("/items/1")
        .send()
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_json_path("status", "Method Not Allowed");
}

#[tokio::test]
async fn both_apis_share_the_store() {
    let app = app();
    create(&app, 7).await;
    app.get("/v2/items/1")
        .send()
        .await
        .assert_ok()
        .assert_json_path("field", 7);
}

#[tokio::test]
async fn json_documents_are_served() {
    let app = app();
    let resp = app.get("/openapi.json").send().await.assert_ok();
    assert_eq!(resp.header("content-type"), Some("application/json"));
    let doc: Value = resp.json();
    assert_eq!(doc["openapi"], "3.0.2");
    assert_eq!(doc["info"]["title"], "Items API");
    assert!(doc["paths"]["/items/{item_id}"]["put"].is_object());
    assert!(doc["components"]["schemas"]["Item"].is_object());

    let doc: Value = app.get("/v2/openapi.json").send().await.assert_ok().json();
    assert_eq!(doc["swagger"], "2.0");
    assert!(doc["paths"]["/v2/items"]["get"].is_object());
    assert!(doc["definitions"]["Item"].is_object());
}

#[test]
fn stores_number_items_from_one() {
    let store = ItemStore::new();
    let first = store.create(json!({"field": 1})).unwrap();
    let second = store.create(json!({"field": 2})).unwrap();
    assert_eq!(first["item_id"], 1);
    assert_eq!(second["item_id"], 2);
    store.delete(2).unwrap();
    assert_eq!(store.create(json!({"field": 3})).unwrap()["item_id"], 2);
}
