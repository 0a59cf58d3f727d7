//! The API instance and the seams a router binding plugs into.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;

use crate::config::Config;
use crate::context::Context;
use crate::operation::{generate_operation_id, Operation};

/// Boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An operation handler.
///
/// The context borrow and the returned future share the lifetime `'a`, so a
/// handler cannot keep the context past its own completion.
///
/// Implemented for every `Fn(&mut dyn Context) -> BoxFuture<'_, ()>` closure.
pub trait Handler: Send + Sync + 'static {
    /// Handles one request.
    fn call<'a>(&'a self, ctx: &'a mut dyn Context) -> BoxFuture<'a, ()>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut dyn Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut dyn Context) -> BoxFuture<'a, ()> {
        (self)(ctx)
    }
}

/// The router capability set an [`Api`] needs: route registration and
/// dispatch of whole HTTP exchanges.
pub trait Adapter: Send + Sync {
    /// Registers `handler` for every future request matching the operation's
    /// method and path.
    ///
    /// # Panics
    ///
    /// Implementations panic on route specifications the router cannot
    /// accept. Registration happens at startup, so this is treated as fatal.
    fn handle(&mut self, op: Arc<Operation>, handler: Arc<dyn Handler>);

    /// Dispatches one HTTP exchange through the router.
    fn serve(&self, request: Request) -> BoxFuture<'static, Response>;
}

/// An API instance: a configuration, a router binding, and the operations
/// registered on it.
///
/// # Examples
///
/// ```
/// use std::io::Write;
///
/// use apibind::{web, Config, Operation};
/// use axum::http::Method;
///
/// let mut api = web::new(axum::Router::new(), Config::new("Items", "1.0.0"));
///
/// api.register(Operation::new(Method::GET, "/items/{id}"), |ctx| {
///     Box::pin(async move {
///         let id = ctx.param("id").to_string();
///         ctx.set_status(200);
///         let _ = ctx.body_writer().write_all(id.as_bytes());
///     })
/// });
///
/// assert_eq!(api.operations().len(), 1);
/// ```
pub struct Api<A> {
    config: Config,
    adapter: A,
    operations: Vec<Arc<Operation>>,
}

impl<A: Adapter> Api<A> {
    /// Creates an API over `adapter`.
    pub fn new(config: Config, adapter: A) -> Self {
        tracing::debug!(title = %config.title, version = %config.version, "api created");
        Self {
            config,
            adapter,
            operations: Vec::new(),
        }
    }

    /// Registers an operation and its handler closure on the router.
    ///
    /// An empty operation id is replaced by a generated one.
    ///
    /// # Panics
    ///
    /// Panics if the router rejects the route, see [`Adapter::handle`].
    pub fn register<F>(&mut self, op: Operation, handler: F)
    where
        F: for<'a> Fn(&'a mut dyn Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.register_handler(op, handler);
    }

    /// Registers an operation served by any [`Handler`] implementation.
    ///
    /// Same as [`register`](Self::register), for handler types that are not
    /// plain closures.
    pub fn register_handler<H: Handler>(&mut self, mut op: Operation, handler: H) {
        if op.operation_id.is_empty() {
            op.operation_id = generate_operation_id(&op.method, &op.path);
        }

        tracing::debug!(
            operation_id = %op.operation_id,
            method = %op.method,
            path = %op.path,
            "registering operation"
        );

        let op = Arc::new(op);
        self.adapter.handle(Arc::clone(&op), Arc::new(handler));
        self.operations.push(op);
    }

    /// Operations registered so far, in registration order.
    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    /// The API configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The router binding.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Dispatches one HTTP exchange through the router binding.
    pub fn serve(&self, request: Request) -> BoxFuture<'static, Response> {
        self.adapter.serve(request)
    }

    /// Consumes the API and returns the router binding.
    pub fn into_adapter(self) -> A {
        self.adapter
    }
}
