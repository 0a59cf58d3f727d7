use std::io;

/// Errors surfaced by the fallible [`Context`](crate::Context) operations.
///
/// Only multipart retrieval and read-deadline configuration can fail; every
/// other accessor is infallible. Errors from the multipart decoder are passed
/// through untouched so the caller can map them to an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The multipart decoder rejected the body (malformed data, missing or
    /// non-multipart content type, stream read failure).
    #[error("multipart: {0}")]
    Multipart(#[from] multer::Error),

    /// Non-file form values exceeded the total size limit.
    #[error("multipart: form values exceed {limit} bytes")]
    FormTooLarge {
        /// Maximum number of bytes accepted for form values
        limit: u64,
    },

    /// The request body was already handed out through the body reader.
    #[error("multipart: request body already consumed")]
    BodyConsumed,

    /// A large file part could not be written to temporary storage.
    #[error("multipart: failed to spill file part to disk: {0}")]
    Spill(#[from] io::Error),

    /// The request body is no longer attached to the exchange, so a read
    /// deadline has nothing to apply to.
    #[error("read deadline unsupported: request body is no longer attached")]
    ReadDeadlineUnsupported,
}
