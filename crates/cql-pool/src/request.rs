//! Request handler collaborator contract.

use cql_protocol::{Request, Response};

use crate::error::RequestError;

/// Token identifying a request while it sits in the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// A caller-supplied request and its completion callbacks.
///
/// The handler is owned by exactly one place at a time: the pending queue
/// while waiting for a connection, then the in-flight response router, then
/// (on transparent retry) the router of the re-issued request. Exactly one
/// of `on_result`, `on_error`, or `on_timeout` fires per attempt that is
/// surfaced to the caller; attempts resolved inside the pool (write
/// failure, re-prepare) surface nothing.
pub trait RequestHandler: Send {
    /// The outbound request payload.
    fn request(&self) -> Request;

    /// The PREPARE payload for this request's statement, if the handler
    /// knows the statement's origin.
    ///
    /// Returning `None` disables transparent re-prepare for this request;
    /// an UNPREPARED server error is then forwarded to
    /// [`on_error`](Self::on_error).
    fn prepare_request(&self) -> Option<Request> {
        None
    }

    /// A successful result arrived.
    fn on_result(&mut self, response: Response);

    /// The request failed with a caller-visible error.
    fn on_error(&mut self, error: RequestError);

    /// The request timed out at the transport level.
    fn on_timeout(&mut self);
}
