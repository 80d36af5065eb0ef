//! Everything a resource module needs, with a single `use`.
//!
//! ```ignore
//! use apiary_core::prelude::*;
//!
//! async fn get_item(call: Call) -> Result<Value, ApiError> {
//!     let item_id: u64 = call.path_as("item_id")?;
//!     Ok(json!({"item_id": item_id}))
//! }
//!
//! let mut blp = Blueprint::new("items", "/items");
//! blp.route(
//!     "/<int:item_id>",
//!     "item",
//!     View::new(get_item).response(StatusCode::OK).etag(),
//! )?;
//! ```

// Views and blueprints
pub use crate::blueprint::{Blueprint, RouteOptions};
pub use crate::call::Call;
pub use crate::view::{MethodView, View, ViewKind};

// Decorator options
pub use crate::arguments::{ArgOptions, Location, UploadedFile};
pub use crate::pagination::{Page, Pager, PaginateOptions, Pagination, PaginationParameters};
pub use crate::response::{AltResponse, ResponseOptions};

// Schemas
pub use crate::schema::{Field, Fields, Schema, SchemaOf, SchemaRef, Unknown};
pub use crate::validation::{Validate, ValidationErrors};

// Replies and errors
pub use crate::error::{abort, ApiError, DeclarationError};
pub use crate::map_error;
pub use crate::reply::{IntoReply, Reply};

// Config
pub use crate::config::AppConfig;

// Re-exports
pub use axum::Json;
pub use http::{HeaderMap, Method, StatusCode};
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};
