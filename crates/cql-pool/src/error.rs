//! Pool error taxonomy.
//!
//! Recoverable conditions (write failure, unprepared statement, queue
//! timeout) are resolved inside the pool and never reach the caller as
//! errors; they surface to the owner as [`RetryReason`]s instead.

use thiserror::Error;

use cql_protocol::{ErrorBody, ProtocolError};

use crate::request::RequestHandler;

/// Errors returned by pool operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The pool is draining and admits no new work.
    #[error("pool is closing")]
    Closing,

    /// The pending request queue is at its backpressure limit.
    #[error("pending request queue is full (limit {limit})")]
    QueueFull {
        /// Configured `max_pending_requests`.
        limit: usize,
    },

    /// The named connection is not in the pool's registry.
    #[error("connection is not available for dispatch")]
    ConnectionUnavailable,

    /// The transport refused to accept the dispatch.
    #[error("transport rejected the dispatch")]
    DispatchRejected,

    /// The pool configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(&'static str),
}

/// A request the pool refused, handed back to the caller intact.
pub struct RejectedRequest {
    /// The request handler, returned so the caller can retry elsewhere.
    pub handler: Box<dyn RequestHandler>,
    /// Why the pool refused it.
    pub error: PoolError,
}

impl std::fmt::Debug for RejectedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RejectedRequest")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Transport-level failure for an in-flight request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be written to the socket.
    ///
    /// The request was never durably sent, so it is safe to retry on a
    /// different host without surfacing an error to the caller.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The connection dropped while the request was outstanding.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Any other transport i/o failure.
    #[error("i/o error: {0}")]
    Io(String),
}

impl TransportError {
    /// Whether this failure means the request was never sent.
    #[must_use]
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailed(_))
    }
}

/// Caller-visible failure of a single request attempt.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The server answered with an ERROR frame.
    #[error("server error {}: {}", .0.code, .0.message)]
    Server(ErrorBody),

    /// The transport failed in a non-recoverable way.
    #[error(transparent)]
    Transport(TransportError),

    /// The server's response could not be interpreted.
    #[error(transparent)]
    Protocol(ProtocolError),
}

/// Why a request is being handed back for retry against a different host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The write to this host's socket failed before the request was sent.
    WriteFailure,
    /// The request timed out waiting in the pending queue.
    Timeout,
    /// A connection refused the dispatch at hand-off time.
    DispatchFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_display() {
        assert_eq!(PoolError::Closing.to_string(), "pool is closing");
        assert_eq!(
            PoolError::QueueFull { limit: 128 }.to_string(),
            "pending request queue is full (limit 128)"
        );
    }

    #[test]
    fn test_write_failure_classification() {
        assert!(TransportError::WriteFailed("broken pipe".into()).is_write_failure());
        assert!(!TransportError::ConnectionLost("reset".into()).is_write_failure());
        assert!(!TransportError::Io("timeout".into()).is_write_failure());
    }

    #[test]
    fn test_request_error_display() {
        let err = RequestError::Server(ErrorBody {
            code: 0x2200,
            message: "unknown table".into(),
        });
        assert_eq!(err.to_string(), "server error 8704: unknown table");
    }
}
