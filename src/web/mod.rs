//! axum integration.
//!
//! [`new`] wraps an existing [`axum::Router`] in an [`Api`]. Operations
//! registered on the API become routes on that router, and their handlers
//! see each request through an [`AxumContext`].
//!
//! Operation paths use `{name}` placeholders, which are translated to axum
//! captures by [`route_path`]. To serve the API under a prefix, register on
//! a fresh router and [`nest`](axum::Router::nest) the result.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Write;
//!
//! use apibind::{web, Config, Operation};
//! use axum::http::Method;
//!
//! # async fn run() -> std::io::Result<()> {
//! let mut api = web::new(axum::Router::new(), Config::new("Items", "1.0.0"));
//! api.register(Operation::new(Method::GET, "/items/{id}"), |ctx| {
//!     Box::pin(async move {
//!         let id = ctx.param("id").to_string();
//!         ctx.set_header("content-type", "text/plain");
//!         let _ = write!(ctx.body_writer(), "item {id}");
//!     })
//! });
//!
//! let router = api.into_adapter().into_router();
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, router).await
//! # }
//! ```

mod adapter;
mod body;
mod context;
mod exchange;
mod multipart;
mod path;

use axum::Router;

use crate::api::Api;
use crate::config::Config;

pub use adapter::AxumAdapter;
pub use context::AxumContext;
pub use path::route_path;

/// Creates an API bound to `router`.
pub fn new(router: Router, config: Config) -> Api<AxumAdapter> {
    Api::new(config, AxumAdapter::new(router))
}
