//! Binds API operations and their request contexts onto an HTTP router.
//!
//! Handlers are written once against the router-independent [`Context`]
//! trait. A router binding, an implementation of [`Adapter`], registers each
//! [`Operation`] as a route and, on every matching request, hands the handler
//! a context that forwards to the router's own request and response objects.
//!
//! # Core Types
//!
//! - [`Api`]: an API instance holding a [`Config`], an adapter and the
//!   registered operations
//! - [`Operation`]: method, path and descriptive metadata of one endpoint
//! - [`Context`]: the per-request capability set handlers use
//! - [`RequestCancellation`]: cancellation signal shared between router and
//!   handler
//! - [`MultipartForm`]: a parsed `multipart/form-data` body
//! - [`web::AxumAdapter`]: the binding for [`axum::Router`]
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//!
//! use apibind::{web, Config, Operation};
//! use axum::body::Body;
//! use axum::http::{Method, Request, StatusCode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut api = web::new(axum::Router::new(), Config::new("Items", "1.0.0"));
//!
//! api.register(Operation::new(Method::POST, "/items/{id}"), |ctx| {
//!     Box::pin(async move {
//!         let id = ctx.param("id").to_string();
//!         ctx.set_header("location", &format!("/items/{id}"));
//!         ctx.set_status(201);
//!         let _ = write!(ctx.body_writer(), "created {id}");
//!     })
//! });
//!
//! let request = Request::post("/items/7").body(Body::empty()).unwrap();
//! let response = api.serve(request).await;
//!
//! assert_eq!(response.status(), StatusCode::CREATED);
//! assert_eq!(response.headers()["location"], "/items/7");
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod cancellation;
mod config;
mod context;
mod error;
mod form;
mod logging;
mod operation;

pub mod web;

pub use api::{Adapter, Api, BoxFuture, Handler};
pub use cancellation::RequestCancellation;
pub use config::Config;
pub use context::Context;
pub use error::Error;
pub use form::{FilePart, MultipartForm, MULTIPART_MEMORY_LIMIT, MULTIPART_VALUE_ALLOWANCE};
pub use operation::{generate_operation_id, Operation};
