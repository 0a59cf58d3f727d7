//! The router-native per-request object.

use std::time::Instant;

use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::request::Parts;
use tokio::sync::watch;

use crate::cancellation::RequestCancellation;
use crate::form::MultipartForm;

use super::body::{DeadlineStream, ResponseWriter};

/// One HTTP exchange as axum hands it to a route: the request head, the
/// captured path parameters, the unconsumed body, and the response being
/// written.
pub(crate) struct Exchange {
    pub(crate) parts: Parts,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) body: Option<DeadlineStream>,
    pub(crate) deadline: watch::Sender<Option<Instant>>,
    pub(crate) form: Option<MultipartForm>,
    pub(crate) cancellation: RequestCancellation,
    pub(crate) response: ResponseWriter,
}

impl Exchange {
    pub(crate) async fn from_request(
        request: Request,
        cancellation: RequestCancellation,
        response: ResponseWriter,
    ) -> Self {
        let (mut parts, body) = request.into_parts();

        // Routes without captures, or captures that are not valid UTF-8, yield none.
        let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => Vec::new(),
        };

        let (deadline, deadline_rx) = watch::channel(None);

        Self {
            parts,
            params,
            body: Some(DeadlineStream::new(body, deadline_rx)),
            deadline,
            form: None,
            cancellation,
            response,
        }
    }

    /// Ends the exchange: commits the response if the handler never did and
    /// closes the response body.
    pub(crate) fn finish(mut self) {
        self.response.commit();
    }
}
