//! OpenAPI documentation for Apiary blueprints.
//!
//! An [`Api`] mounts blueprints on an axum router and turns the
//! documentation their views accumulated into an OpenAPI 2 or 3 document,
//! served as JSON and available to the `openapi` [`cli`] commands.

mod api;
pub mod cli;
pub mod finalize;
pub mod plugin;
mod registry;
mod settings;
pub mod spec;

pub use api::{Api, BlueprintRegistration};
pub use cli::{OpenApiCli, OpenApiCommand};
pub use plugin::{ApiKeySecurityPlugin, DocPlugin};
pub use registry::ApiRegistry;
pub use settings::{ApiInitError, ApiSettings, DEFAULT_BODY_LIMIT, DEFAULT_JSON_PATH};
pub use spec::{ComponentKind, Spec};
