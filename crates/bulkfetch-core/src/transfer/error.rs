//! Categorized transfer failures.

use thiserror::Error;

/// Why a single GET did not produce a complete body.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Final response status was not 2xx. No body bytes reached the sink.
    #[error("HTTP {status}")]
    HttpStatus { status: u32 },
    /// No connection or no response within the connect/first-byte timeout.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Connection, DNS, TLS, protocol or unsupported-scheme failure.
    #[error("transport: {0}")]
    Transport(#[source] curl::Error),
    /// Writing to the local sink failed (disk full, permission denied, ...).
    #[error("write failed: {0}")]
    Sink(#[source] std::io::Error),
}

impl TransferError {
    /// Map a libcurl error to a category. `watchdog_fired` is set when our own
    /// first-byte watchdog aborted the transfer from the progress callback.
    pub(crate) fn from_curl(e: curl::Error, watchdog_fired: bool) -> Self {
        if watchdog_fired && e.is_aborted_by_callback() {
            return TransferError::Timeout("no response before first-byte deadline".to_string());
        }
        if e.is_operation_timedout() {
            return TransferError::Timeout(e.to_string());
        }
        TransferError::Transport(e)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransferError::Timeout(_))
    }
}
