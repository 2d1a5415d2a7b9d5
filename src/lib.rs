//! # Switchyard
//!
//! Declarative controller routing for axum.
//!
//! A controller is a type that declares a base path, shared middleware,
//! and a set of verb/path bindings through an explicit builder. At
//! startup, a registry materializes each controller into its own
//! `axum::Router` and mounts the sub-routers onto a parent router; at
//! request time the server dispatches into the chains built here.
//!
//! ## Features
//!
//! - **Controller-based routing**: routes, parameter preloaders, and
//!   middleware declared per controller, materialized in declaration order
//! - **Path canonicalization**: duplicate/trailing separators cleaned up,
//!   `:id`-style parameters digit-constrained automatically
//! - **Request shaping**: content-type gating and JSON Schema payload
//!   validation as composable handler wrappers
//! - **Failure forwarding**: any stage that fails, synchronously or
//!   mid-await, resolves to an error response instead of unwinding
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use switchyard::prelude::*;
//!
//! struct UserController;
//!
//! impl Controller for UserController {
//!     fn basepath() -> &'static str {
//!         "/users"
//!     }
//!
//!     fn configure(def: &mut ControllerDef) -> switchyard::Result<()> {
//!         def.get("/", handler(list))?.post(
//!             "/",
//!             guard::content_type(
//!                 "application/json",
//!                 pipe::validate(
//!                     Schema::fields([("name", json!({ "type": "string" }))]),
//!                     handler(create),
//!                 )?,
//!             ),
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! async fn list(_request: Request) -> Result<Response, HandlerError> {
//!     Ok(Json(json!([])).into_response())
//! }
//!
//! async fn create(_request: Request) -> Result<Response, HandlerError> {
//!     Ok(StatusCode::CREATED.into_response())
//! }
//!
//! fn main() -> switchyard::Result<()> {
//!     let registry = Registry::new();
//!     registry.register::<UserController>()?;
//!
//!     let app = registry.mount(Router::new(), &[ControllerKey::of::<UserController>()])?;
//!     // hand `app` to axum::serve as usual
//!     # let _ = app;
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod error;
pub mod guard;
pub mod handler;
pub mod path;
pub mod pipe;
pub mod registry;

// Re-export core types
pub use controller::{
    Controller, ControllerDef, MountedController, ParamDescriptor, RouteDescriptor, RouteMethod,
    materialize,
};
pub use error::{Result, SwitchyardError};
pub use handler::{
    BoxError, HandlerError, HandlerFuture, Middleware, Next, ParamPreloader, RouteHandler, handler,
    middleware, preloader,
};
pub use path::{NormalizeOptions, normalize};
pub use pipe::Schema;
pub use registry::{ControllerKey, Registry};

// Re-export commonly used types from dependencies
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::controller::{
        Controller, ControllerDef, MountedController, RouteMethod, materialize,
    };
    pub use crate::error::SwitchyardError;
    pub use crate::handler::{
        HandlerError, Middleware, Next, ParamPreloader, RouteHandler, handler, middleware,
        preloader,
    };
    pub use crate::path::{NormalizeOptions, normalize};
    pub use crate::pipe::Schema;
    pub use crate::registry::{ControllerKey, Registry};
    pub use crate::{guard, pipe};
    pub use axum::{
        Json, Router,
        extract::Request,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
