use std::fmt;

/// Structured logging bound to one HTTP exchange.
///
/// Every event carries the operation id and the request method so log lines
/// from concurrent requests can be told apart. Borrowed from the context that
/// created it and cannot outlive it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExchangeLog<'a> {
    operation_id: &'a str,
    method: &'a str,
}

impl<'a> ExchangeLog<'a> {
    pub(crate) fn new(operation_id: &'a str, method: &'a str) -> Self {
        Self {
            operation_id,
            method,
        }
    }

    /// Logs a warning-level message for this exchange.
    ///
    /// Use with `format_args!`:
    /// ```ignore
    /// log.warn(format_args!("ignoring status {}", code));
    /// ```
    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(
            operation_id = %self.operation_id,
            method = %self.method,
            "{}",
            args
        );
    }

    /// Logs a debug-level message for this exchange.
    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(
            operation_id = %self.operation_id,
            method = %self.method,
            "{}",
            args
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_methods_do_not_panic_without_subscriber() {
        let log = ExchangeLog::new("get-items", "GET");
        log.warn(format_args!("superfluous status {}", 201));
        log.debug(format_args!("header {} ignored", "x-a"));
    }
}
