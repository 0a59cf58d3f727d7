use std::io;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::Uri;
use futures::io::AsyncRead;

use crate::cancellation::RequestCancellation;
use crate::error::Error;
use crate::form::MultipartForm;
use crate::operation::Operation;

/// The per-request capability set a handler works against.
///
/// A `Context` is a view over one in-flight HTTP exchange. Handlers read the
/// request and write the response exclusively through it, which keeps them
/// independent of the router that actually carries the request. Router
/// bindings implement this trait by forwarding each call to their native
/// request and response objects.
///
/// Handlers receive a `&mut dyn Context` that is only valid for the duration
/// of the handler's future; it cannot be stored beyond that.
///
/// # Failure semantics
///
/// Only [`multipart_form`](Self::multipart_form) and
/// [`set_read_deadline`](Self::set_read_deadline) can fail. Lookups for data
/// that is not present return an empty string.
///
/// # Examples
///
/// ```
/// use std::io::Write;
///
/// use apibind::{BoxFuture, Context};
///
/// fn greet<'a>(ctx: &'a mut dyn Context) -> BoxFuture<'a, ()> {
///     Box::pin(async move {
///         let name = ctx.query("name");
///         ctx.set_header("content-type", "text/plain");
///         ctx.set_status(200);
///         let _ = write!(ctx.body_writer(), "hello {name}");
///     })
/// }
/// ```
#[async_trait]
pub trait Context: Send {
    /// The operation matched for this request.
    fn operation(&self) -> &Operation;

    /// The request's cancellation signal.
    ///
    /// The returned value shares state with the signal the router holds for
    /// this request, so cancellation on either side is visible on both.
    fn cancellation(&self) -> RequestCancellation;

    /// The HTTP method, unmodified.
    fn method(&self) -> &str;

    /// The host (URI authority or `Host` header) as seen by the router.
    fn host(&self) -> &str;

    /// A copy of the request URI.
    fn url(&self) -> Uri;

    /// The named path parameter, or `""` if the route has none by that name.
    fn param(&self, name: &str) -> &str;

    /// The first query-string value for `name`, or `""`.
    fn query(&self, name: &str) -> String;

    /// The first value of the named header, or `""`.
    fn header(&self, name: &str) -> &str;

    /// Calls `f` once for every header value, repeated headers included.
    fn each_header(&self, f: &mut dyn FnMut(&str, &str));

    /// A reader over the unconsumed request body.
    ///
    /// Reading consumes the body; it cannot be read twice.
    fn body_reader(&mut self) -> Box<dyn AsyncRead + Send + Unpin>;

    /// Parses the request body as `multipart/form-data`.
    ///
    /// File parts beyond an 8 KiB in-memory budget are spilled to temporary
    /// files. The parsed form is kept for the rest of the request, so repeated
    /// calls return the same value.
    async fn multipart_form(&mut self) -> Result<&MultipartForm, Error>;

    /// Sets a deadline for further reads of the request body.
    fn set_read_deadline(&mut self, deadline: Instant) -> Result<(), Error>;

    /// Writes the response status code.
    ///
    /// Must be called at most once, before any body bytes are written.
    fn set_status(&mut self, code: u16);

    /// Sets a response header, replacing existing values.
    fn set_header(&mut self, name: &str, value: &str);

    /// Appends a value to a response header.
    fn append_header(&mut self, name: &str, value: &str);

    /// The response body writer.
    ///
    /// Any write or flush commits the status and headers. Written bytes are
    /// forwarded to the client right away; writes fail with
    /// `ErrorKind::BrokenPipe` once the client is gone.
    fn body_writer(&mut self) -> &mut (dyn io::Write + Send);
}
