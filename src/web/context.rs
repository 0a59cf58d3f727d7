//! [`Context`] implemented over an axum exchange.

use std::io;
use std::time::Instant;

use async_trait::async_trait;
use axum::extract::OriginalUri;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderName, HeaderValue, StatusCode, Uri};
use futures::io::AsyncRead;
use futures::TryStreamExt;

use crate::cancellation::RequestCancellation;
use crate::context::Context;
use crate::error::Error;
use crate::form::MultipartForm;
use crate::logging::ExchangeLog;
use crate::operation::Operation;

use super::exchange::Exchange;
use super::multipart::parse_form;

/// The request context handed to handlers registered through
/// [`AxumAdapter`](super::AxumAdapter).
///
/// Every call reads from or writes to the underlying exchange; nothing is
/// copied up front. Response status and headers follow the usual HTTP/1
/// server rules: they are committed by the first status write or the first
/// body write or flush, and later changes are ignored. Body writes are
/// forwarded to the client as they happen.
pub struct AxumContext<'a> {
    op: &'a Operation,
    exchange: &'a mut Exchange,
}

impl<'a> AxumContext<'a> {
    pub(crate) fn new(op: &'a Operation, exchange: &'a mut Exchange) -> Self {
        Self { op, exchange }
    }

    fn log(&self) -> ExchangeLog<'_> {
        ExchangeLog::new(&self.op.operation_id, self.exchange.parts.method.as_str())
    }

    fn write_header(&mut self, name: &str, value: &str, append: bool) {
        if self.exchange.response.is_committed() {
            self.log().debug(format_args!(
                "response already committed, ignoring header {name}"
            ));
            return;
        }

        let parsed = HeaderName::from_bytes(name.as_bytes())
            .ok()
            .zip(HeaderValue::from_str(value).ok());
        let Some((name, value)) = parsed else {
            self.log()
                .warn(format_args!("ignoring invalid response header {name:?}"));
            return;
        };

        let headers = self.exchange.response.headers_mut();
        if append {
            headers.append(name, value);
        } else {
            headers.insert(name, value);
        }
    }
}

#[async_trait]
impl<'a> Context for AxumContext<'a> {
    fn operation(&self) -> &Operation {
        self.op
    }

    fn cancellation(&self) -> RequestCancellation {
        self.exchange.cancellation.clone()
    }

    fn method(&self) -> &str {
        self.exchange.parts.method.as_str()
    }

    fn host(&self) -> &str {
        let parts = &self.exchange.parts;
        parts
            .uri
            .authority()
            .map(|authority| authority.as_str())
            .or_else(|| parts.headers.get(HOST).and_then(|v| v.to_str().ok()))
            .unwrap_or("")
    }

    fn url(&self) -> Uri {
        // Nested routers strip their prefix from the URI they pass on.
        match self.exchange.parts.extensions.get::<OriginalUri>() {
            Some(OriginalUri(uri)) => uri.clone(),
            None => self.exchange.parts.uri.clone(),
        }
    }

    fn param(&self, name: &str) -> &str {
        self.exchange
            .params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    fn query(&self, name: &str) -> String {
        self.exchange
            .parts
            .uri
            .query()
            .and_then(|query| {
                form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default()
    }

    fn header(&self, name: &str) -> &str {
        self.exchange
            .parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    fn each_header(&self, f: &mut dyn FnMut(&str, &str)) {
        for (name, value) in &self.exchange.parts.headers {
            f(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }
    }

    fn body_reader(&mut self) -> Box<dyn AsyncRead + Send + Unpin> {
        match self.exchange.body.take() {
            Some(body) => Box::new(body.into_async_read()),
            None => Box::new(futures::io::empty()),
        }
    }

    async fn multipart_form(&mut self) -> Result<&MultipartForm, Error> {
        let form = match self.exchange.form.take() {
            Some(form) => form,
            None => {
                let body = self.exchange.body.take().ok_or(Error::BodyConsumed)?;
                let content_type = self
                    .exchange
                    .parts
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                parse_form(&content_type, body).await?
            }
        };
        Ok(&*self.exchange.form.insert(form))
    }

    fn set_read_deadline(&mut self, deadline: Instant) -> Result<(), Error> {
        self.exchange
            .deadline
            .send(Some(deadline))
            .map_err(|_| Error::ReadDeadlineUnsupported)
    }

    fn set_status(&mut self, code: u16) {
        if self.exchange.response.is_committed() {
            self.log()
                .warn(format_args!("superfluous status {code}, response already committed"));
            return;
        }

        match StatusCode::from_u16(code) {
            Ok(status) => self.exchange.response.write_status(status),
            Err(_) => self
                .log()
                .warn(format_args!("ignoring invalid status code {code}")),
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.write_header(name, value, false);
    }

    fn append_header(&mut self, name: &str, value: &str) {
        self.write_header(name, value, true);
    }

    fn body_writer(&mut self) -> &mut (dyn io::Write + Send) {
        &mut self.exchange.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::body::ResponseWriter;
    use axum::body::{to_bytes, Body};
    use axum::extract::Request;
    use axum::http::Method;
    use axum::response::Response;
    use futures::AsyncReadExt;
    use std::io::Write;
    use tokio::sync::oneshot;

    async fn exchange(request: Request) -> (Exchange, oneshot::Receiver<Response>) {
        let (writer, head) = ResponseWriter::channel();
        let exchange = Exchange::from_request(request, RequestCancellation::new(), writer).await;
        (exchange, head)
    }

    async fn respond(exchange: Exchange, head: oneshot::Receiver<Response>) -> Response {
        exchange.finish();
        head.await.unwrap()
    }

    fn op() -> Operation {
        Operation::new(Method::GET, "/items")
    }

    #[tokio::test]
    async fn reads_request_head() {
        let request = Request::builder()
            .method(Method::PATCH)
            .uri("/items?tag=a&tag=b&empty=")
            .header("host", "example.test")
            .header("x-multi", "one")
            .header("x-multi", "two")
            .body(Body::empty())
            .unwrap();
        let (mut exchange, _head) = exchange(request).await;
        let op = op();
        let ctx = AxumContext::new(&op, &mut exchange);

        assert_eq!(ctx.method(), "PATCH");
        assert_eq!(ctx.host(), "example.test");
        assert_eq!(ctx.url().path(), "/items");
        assert_eq!(ctx.query("tag"), "a");
        assert_eq!(ctx.query("empty"), "");
        assert_eq!(ctx.query("missing"), "");
        assert_eq!(ctx.header("X-Multi"), "one");
        assert_eq!(ctx.header("missing"), "");
        assert_eq!(ctx.param("id"), "");

        let mut seen = Vec::new();
        ctx.each_header(&mut |name, value| seen.push(format!("{name}={value}")));
        assert_eq!(seen, vec!["host=example.test", "x-multi=one", "x-multi=two"]);
    }

    #[tokio::test]
    async fn body_reader_consumes_body_once() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/items")
            .body(Body::from("payload"))
            .unwrap();
        let (mut exchange, _head) = exchange(request).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        let mut first = String::new();
        ctx.body_reader().read_to_string(&mut first).await.unwrap();
        assert_eq!(first, "payload");

        let mut second = String::new();
        ctx.body_reader().read_to_string(&mut second).await.unwrap();
        assert_eq!(second, "");
        assert!(matches!(
            ctx.multipart_form().await,
            Err(Error::BodyConsumed)
        ));
    }

    #[tokio::test]
    async fn first_status_wins() {
        let (mut exchange, head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        ctx.set_status(201);
        ctx.set_status(500);
        ctx.set_header("x-late", "1");

        let response = respond(exchange, head).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get("x-late").is_none());
    }

    #[tokio::test]
    async fn invalid_status_is_ignored() {
        let (mut exchange, head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        ctx.set_status(42);
        ctx.set_status(204);

        assert_eq!(respond(exchange, head).await.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn body_write_commits_implicit_ok() {
        let (mut exchange, head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        ctx.body_writer().write_all(b"hi").unwrap();
        ctx.set_status(404);

        let response = respond(exchange, head).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hi");
    }

    #[tokio::test]
    async fn zero_length_write_commits() {
        let (mut exchange, head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        assert_eq!(ctx.body_writer().write(b"").unwrap(), 0);
        ctx.set_status(500);
        ctx.set_header("x-late", "1");

        let response = respond(exchange, head).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-late").is_none());
    }

    #[tokio::test]
    async fn set_and_append_headers() {
        let (mut exchange, head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        ctx.set_header("x-a", "1");
        ctx.set_header("x-a", "2");
        ctx.append_header("x-b", "1");
        ctx.append_header("x-b", "2");
        ctx.set_header("bad header", "v");
        ctx.set_header("x-c", "bad\nvalue");

        let response = respond(exchange, head).await;
        let headers = response.headers();
        let a: Vec<_> = headers.get_all("x-a").iter().collect();
        let b: Vec<_> = headers.get_all("x-b").iter().collect();
        assert_eq!(a, vec!["2"]);
        assert_eq!(b, vec!["1", "2"]);
        assert!(headers.get("x-c").is_none());
    }

    #[tokio::test]
    async fn read_deadline_needs_body() {
        let (mut exchange, _head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let mut ctx = AxumContext::new(&op, &mut exchange);

        assert!(ctx.set_read_deadline(Instant::now()).is_ok());

        drop(ctx.body_reader());
        assert!(matches!(
            ctx.set_read_deadline(Instant::now()),
            Err(Error::ReadDeadlineUnsupported)
        ));
    }

    #[tokio::test]
    async fn cancellation_shares_exchange_signal() {
        let (mut exchange, _head) = exchange(Request::new(Body::empty())).await;
        let op = op();
        let ctx = AxumContext::new(&op, &mut exchange);

        assert_eq!(ctx.operation().operation_id, "get-items");
        let token = ctx.cancellation();
        assert!(token.same_signal(&exchange.cancellation));
    }
}
