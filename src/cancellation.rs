use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Cancellation signal for a single in-flight request.
///
/// Every clone shares the same underlying state: cancelling any clone is
/// observed by all of them.
///
/// Middleware may attach one to the request extensions; the route callback
/// then hands that same value to the handler and leaves cancelling it to
/// the middleware. Otherwise the callback creates one and cancels it once
/// the response is fully sent, or as soon as the response is dropped after
/// a client disconnect.
///
/// # Examples
///
/// ```
/// use apibind::RequestCancellation;
///
/// let token = RequestCancellation::new();
/// let seen_by_handler = token.clone();
///
/// assert!(token.cancel());
/// assert!(seen_by_handler.is_cancelled());
/// assert!(!token.cancel()); // already cancelled
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestCancellation {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    flag: AtomicBool,
    notify: Notify,
}

impl RequestCancellation {
    /// Creates a signal in the "not cancelled" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Marks the request as cancelled and wakes all waiters.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn cancel(&self) -> bool {
        let first = self
            .inner
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Completes when the request is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let mut notified = pin!(self.inner.notify.notified());
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Returns `true` if both values share the same underlying signal.
    pub fn same_signal(&self, other: &RequestCancellation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: self.clone(),
        }
    }
}

/// Cancels the wrapped signal when dropped.
#[derive(Debug)]
pub(crate) struct CancelOnDrop {
    token: RequestCancellation,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
