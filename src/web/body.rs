//! Request and response body plumbing for the axum exchange.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use axum::body::{Body, BodyDataStream};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::cancellation::CancelOnDrop;

/// Receiving side of an exchange's read deadline.
pub(crate) type DeadlineReceiver = watch::Receiver<Option<Instant>>;

/// The request body as a byte stream that honors the exchange's read
/// deadline.
///
/// A deadline change is picked up on the next poll. Once the deadline has
/// passed every poll yields a `TimedOut` error.
pub(crate) struct DeadlineStream {
    inner: BodyDataStream,
    deadline: DeadlineReceiver,
    expires_at: Option<Instant>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl DeadlineStream {
    pub(crate) fn new(body: Body, deadline: DeadlineReceiver) -> Self {
        Self {
            inner: body.into_data_stream(),
            deadline,
            expires_at: None,
            timer: None,
        }
    }
}

impl Stream for DeadlineStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if this.deadline.has_changed().unwrap_or(false) {
            this.expires_at = *this.deadline.borrow_and_update();
            this.timer = this
                .expires_at
                .map(|at| Box::pin(tokio::time::sleep_until(at.into())));
        }

        if let (Some(at), Some(timer)) = (this.expires_at, this.timer.as_mut()) {
            // The timer only wakes a pending read; expiry is decided by the clock.
            if Instant::now() >= at || timer.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "request body read deadline exceeded",
                ))));
            }
        }

        Pin::new(&mut this.inner)
            .poll_next(cx)
            .map(|item| item.map(|chunk| chunk.map_err(io::Error::other)))
    }
}

/// The response as the handler writes it.
///
/// Nothing reaches the client before the response is committed, which
/// happens on an explicit status, on any write or flush, or when the handler
/// returns. Committing sends status and headers as the response head; every
/// later write is forwarded to the client as its own body frame.
pub(crate) struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    state: WriterState,
}

enum WriterState {
    Pending(oneshot::Sender<Response>),
    Streaming(mpsc::UnboundedSender<Bytes>),
    Closed,
}

impl ResponseWriter {
    /// Creates a writer and the receiver its response head is sent to.
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (head, head_rx) = oneshot::channel();
        let writer = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            state: WriterState::Pending(head),
        };
        (writer, head_rx)
    }

    /// Returns `true` once the response head has left the writer.
    pub(crate) fn is_committed(&self) -> bool {
        !matches!(self.state, WriterState::Pending(_))
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets the status and commits.
    pub(crate) fn write_status(&mut self, status: StatusCode) {
        self.status = status;
        self.commit();
    }

    /// Sends the response head, if it has not been sent yet.
    pub(crate) fn commit(&mut self) {
        if self.is_committed() {
            return;
        }
        let WriterState::Pending(head) = mem::replace(&mut self.state, WriterState::Closed) else {
            return;
        };

        let (frames, frames_rx) = mpsc::unbounded_channel();
        let body = Body::from_stream(UnboundedReceiverStream::new(frames_rx).map(Ok::<_, Infallible>));
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = mem::take(&mut self.headers);

        // A dropped receiver means nobody is waiting for the response anymore.
        if head.send(response).is_ok() {
            self.state = WriterState::Streaming(frames);
        }
    }
}

fn response_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response receiver dropped")
}

impl io::Write for ResponseWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.commit();
        let WriterState::Streaming(frames) = &self.state else {
            return Err(response_gone());
        };
        if !data.is_empty() {
            frames
                .send(Bytes::copy_from_slice(data))
                .map_err(|_| response_gone())?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        match self.state {
            WriterState::Streaming(_) => Ok(()),
            _ => Err(response_gone()),
        }
    }
}

/// A response body that keeps a [`CancelOnDrop`] guard alive until the body
/// is fully sent or dropped.
pub(crate) struct GuardedBody {
    inner: BodyDataStream,
    _guard: CancelOnDrop,
}

impl GuardedBody {
    pub(crate) fn wrap(body: Body, guard: CancelOnDrop) -> Body {
        Body::from_stream(Self {
            inner: body.into_data_stream(),
            _guard: guard,
        })
    }
}

impl Stream for GuardedBody {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{AsyncReadExt, StreamExt, TryStreamExt};
    use std::io::Write;
    use std::time::Duration;

    #[tokio::test]
    async fn stream_yields_body_bytes() {
        let (_tx, rx) = watch::channel(None);
        let stream = DeadlineStream::new(Body::from("hello world"), rx);

        let mut reader = stream.into_async_read();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();

        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn past_deadline_times_out() {
        let (tx, rx) = watch::channel(None);
        let mut stream = DeadlineStream::new(Body::from("late"), rx);

        tx.send(Some(Instant::now() - Duration::from_millis(1))).unwrap();

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn future_deadline_allows_reads() {
        let (tx, rx) = watch::channel(None);
        let mut stream = DeadlineStream::new(Body::from("on time"), rx);

        tx.send(Some(Instant::now() + Duration::from_secs(60))).unwrap();

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from_static(b"on time"));
    }

    #[tokio::test]
    async fn clearing_deadline_disarms_timer() {
        let (tx, rx) = watch::channel(None);
        let mut stream = DeadlineStream::new(Body::from("data"), rx);

        tx.send(Some(Instant::now() - Duration::from_millis(1))).unwrap();
        tx.send(None).unwrap();

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from_static(b"data"));
    }

    #[tokio::test]
    async fn commit_sends_head_once() {
        let (mut writer, head) = ResponseWriter::channel();
        writer.headers_mut().insert("x-a", "1".parse().unwrap());
        assert!(!writer.is_committed());

        writer.write_status(StatusCode::ACCEPTED);
        writer.commit();
        assert!(writer.is_committed());

        let response = head.await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-a"], "1");
    }

    #[tokio::test]
    async fn empty_write_commits_default_status() {
        let (mut writer, head) = ResponseWriter::channel();

        assert_eq!(writer.write(b"").unwrap(), 0);
        assert!(writer.is_committed());
        drop(writer);

        let response = head.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let mut frames = response.into_body().into_data_stream();
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn writes_are_forwarded_as_frames() {
        let (mut writer, head) = ResponseWriter::channel();

        writer.write_all(b"abc").unwrap();
        let mut frames = head.await.unwrap().into_body().into_data_stream();
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from_static(b"abc"));

        writer.write_all(b"def").unwrap();
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from_static(b"def"));

        drop(writer);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn writes_fail_once_response_is_dropped() {
        let (mut writer, head) = ResponseWriter::channel();
        drop(head);

        let err = writer.write_all(b"lost").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(writer.flush().is_err());
    }

    #[tokio::test]
    async fn guarded_body_cancels_when_dropped() {
        let token = crate::RequestCancellation::new();
        let body = GuardedBody::wrap(Body::from("done"), token.drop_guard());

        let mut frames = body.into_data_stream();
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from_static(b"done"));
        assert!(!token.is_cancelled());

        drop(frames);
        assert!(token.is_cancelled());
    }
}
