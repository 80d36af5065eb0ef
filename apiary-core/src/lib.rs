pub mod arguments;
pub mod blueprint;
pub mod call;
pub mod config;
pub mod context;
pub mod doc;
pub mod error;
pub mod etag;
pub mod layers;
pub mod pagination;
pub mod prelude;
pub mod reply;
pub mod response;
pub mod rule;
pub mod schema;
pub mod validation;
pub mod view;

pub use arguments::{ArgOptions, Location, UploadedFile};
pub use blueprint::{Blueprint, Route, RouteOptions};
pub use call::{Call, RouteSettings};
pub use config::{normalize_config_prefix, AppConfig, ConfigError, ConfigValue, FromConfigValue};
pub use context::RequestContext;
pub use error::{abort, ApiError, DeclarationError, Diagnostic};
pub use layers::{catch_panic_layer, default_trace, init_json_tracing, init_tracing};
pub use pagination::{Page, Pager, PaginateOptions, Pagination, PaginationParameters};
pub use reply::{IntoReply, Reply};
pub use response::{AltResponse, ResponseOptions};
pub use schema::{Field, Fields, Schema, SchemaOf, SchemaRef, Unknown};
pub use validation::ValidationErrors;
pub use view::{MethodView, View, ViewKind};

pub use http;
pub use schemars;
