//! Router binding for axum.

use std::mem;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Router;
use tower::ServiceExt;
use tracing::Instrument;

use crate::api::{Adapter, BoxFuture, Handler};
use crate::cancellation::RequestCancellation;
use crate::operation::Operation;

use super::body::{GuardedBody, ResponseWriter};
use super::context::AxumContext;
use super::exchange::Exchange;
use super::path::route_path;

/// Binds an API onto an [`axum::Router`].
///
/// Each registered operation becomes a route on the wrapped router. When
/// the route matches, the handler runs against an [`AxumContext`] over that
/// request, and whatever it wrote becomes the response.
///
/// Routes registered directly on the router before it was wrapped keep
/// working alongside the API's operations.
#[derive(Debug, Clone, Default)]
pub struct AxumAdapter {
    router: Router,
}

impl AxumAdapter {
    /// Wraps `router`.
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// The router with every registered operation.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Consumes the adapter and returns the router, ready to be served.
    pub fn into_router(self) -> Router {
        self.router
    }
}

impl Adapter for AxumAdapter {
    fn handle(&mut self, op: Arc<Operation>, handler: Arc<dyn Handler>) {
        let filter = method_filter(&op.method);
        let path = route_path(&op.path);

        tracing::debug!(
            operation_id = %op.operation_id,
            method = %op.method,
            route = %path,
            "binding operation to router"
        );

        let route = on(filter, move |request: Request| {
            dispatch(Arc::clone(&op), Arc::clone(&handler), request)
        });
        self.router = mem::take(&mut self.router).route(&path, route);
    }

    fn serve(&self, request: Request) -> BoxFuture<'static, Response> {
        let router = self.router.clone();
        Box::pin(async move {
            match router.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
    }
}

fn method_filter(method: &Method) -> MethodFilter {
    MethodFilter::try_from(method.clone())
        .unwrap_or_else(|_| panic!("router cannot route HTTP method {method}"))
}

async fn dispatch(op: Arc<Operation>, handler: Arc<dyn Handler>, request: Request) -> Response {
    let span = tracing::debug_span!(
        "exchange",
        operation_id = %op.operation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    // A signal attached by outer middleware belongs to it and is never cancelled here.
    let (cancellation, guard) = match request.extensions().get::<RequestCancellation>() {
        Some(upstream) => (upstream.clone(), None),
        None => {
            let own = RequestCancellation::new();
            let guard = own.drop_guard();
            (own, Some(guard))
        }
    };

    let (writer, head) = ResponseWriter::channel();
    tokio::spawn(
        async move {
            let mut exchange = Exchange::from_request(request, cancellation, writer).await;
            handler
                .call(&mut AxumContext::new(&op, &mut exchange))
                .await;
            exchange.finish();
            tracing::debug!("handler returned");
        }
        .instrument(span.clone()),
    );

    match head.await {
        Ok(response) => {
            tracing::debug!(parent: &span, status = response.status().as_u16(), "response committed");
            match guard {
                Some(guard) => response.map(|body| GuardedBody::wrap(body, guard)),
                None => response,
            }
        }
        Err(_) => {
            tracing::error!(parent: &span, "handler ended without a response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
