//! Apiary: blueprint-based REST APIs over Axum.
//!
//! This facade crate re-exports the Apiary sub-crates through a single
//! dependency. Import everything you need with:
//!
//! ```ignore
//! use apiary::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature   | Default | Crate            |
//! |-----------|---------|------------------|
//! | `openapi` | **yes** | `apiary-openapi` |

pub extern crate apiary_core;

// Everything from apiary-core at the top level.
pub use apiary_core::*;

#[cfg(feature = "openapi")]
pub use apiary_openapi;

#[cfg(feature = "openapi")]
pub use apiary_openapi::{Api, ApiRegistry, ApiSettings, BlueprintRegistration};

/// Unified prelude, `use apiary::prelude::*`.
pub mod prelude {
    pub use apiary_core::prelude::*;

    #[cfg(feature = "openapi")]
    pub use apiary_openapi::{Api, ApiKeySecurityPlugin, ApiRegistry, BlueprintRegistration, OpenApiCommand};
}
