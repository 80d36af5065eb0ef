//! In-process test client for Apiary applications.
//!
//! ```ignore
//! let app = TestApp::from_api(&api);
//! let created = app.post("/items").json(&json!({"field": 0})).send().await.assert_created();
//! let etag = created.etag().unwrap().to_string();
//! app.get("/items/1").if_none_match(&etag).send().await.assert_not_modified();
//! ```

mod app;

pub use app::{resolve_path, TestApp, TestRequest, TestResponse};
