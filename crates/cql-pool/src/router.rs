//! Per-request response routing and protocol-aware retry.

use cql_protocol::{Opcode, Request, Response};

use crate::connection::ConnectionId;
use crate::error::{RequestError, RetryReason};
use crate::event::TransportOutcome;
use crate::pool::Pool;
use crate::request::RequestHandler;

/// Which leg of the request the router is currently waiting on.
enum Phase {
    /// The caller's own request is in flight.
    Execute,
    /// A transparent PREPARE is in flight; the payload is kept so the
    /// connection can fetch it via [`ResponseRouter::request`].
    Prepare(Request),
}

/// Per-request state holder bound to one connection for one attempt.
///
/// Created at dispatch time, handed to the connection, and returned to the
/// pool inside [`PoolEvent::RequestComplete`] when the transport resolves
/// the request. The router owns the caller's [`RequestHandler`] and is the
/// only place protocol-level retry decisions are made.
///
/// [`PoolEvent::RequestComplete`]: crate::event::PoolEvent::RequestComplete
pub struct ResponseRouter {
    connection: ConnectionId,
    phase: Phase,
    handler: Box<dyn RequestHandler>,
}

impl ResponseRouter {
    pub(crate) fn new(connection: ConnectionId, handler: Box<dyn RequestHandler>) -> Self {
        Self {
            connection,
            phase: Phase::Execute,
            handler,
        }
    }

    /// The connection this request is bound to.
    #[must_use]
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// The outbound payload for the current phase.
    #[must_use]
    pub fn request(&self) -> Request {
        match &self.phase {
            Phase::Execute => self.handler.request(),
            Phase::Prepare(request) => request.clone(),
        }
    }

    pub(crate) fn into_handler(self) -> Box<dyn RequestHandler> {
        self.handler
    }

    /// Resolve the transport outcome into exactly one terminal action.
    pub(crate) fn resolve(self, pool: &mut Pool, outcome: TransportOutcome) {
        let Self {
            connection,
            phase,
            mut handler,
        } = self;

        match outcome {
            TransportOutcome::Response(response) => {
                Self::route_response(pool, connection, phase, handler, response);
            }
            TransportOutcome::Error(error) if error.is_write_failure() => {
                // Never durably sent, so the caller sees nothing; the owner
                // retries on a different host.
                tracing::debug!(
                    connection = %connection,
                    %error,
                    "write failed, retrying request on next host"
                );
                pool.notify_retry(handler, RetryReason::WriteFailure);
            }
            TransportOutcome::Error(error) => {
                handler.on_error(RequestError::Transport(error));
            }
            TransportOutcome::Timeout => {
                handler.on_timeout();
            }
        }

        // A connection freed by completion immediately considers the queue
        // head, keeping dispatch FIFO without starvation.
        pool.finish_request(connection);
    }

    fn route_response(
        pool: &mut Pool,
        connection: ConnectionId,
        phase: Phase,
        mut handler: Box<dyn RequestHandler>,
        response: Response,
    ) {
        match (phase, response.opcode) {
            (Phase::Execute, Opcode::Result) => handler.on_result(response),
            (Phase::Execute, Opcode::Error) => match response.error_body() {
                Ok(body) if body.is_unprepared() => match handler.prepare_request() {
                    Some(prepare) => {
                        tracing::debug!(
                            connection = %connection,
                            "statement not prepared, re-preparing on the same connection"
                        );
                        let router = Self {
                            connection,
                            phase: Phase::Prepare(prepare),
                            handler,
                        };
                        pool.redispatch(router);
                    }
                    None => handler.on_error(RequestError::Server(body)),
                },
                Ok(body) => handler.on_error(RequestError::Server(body)),
                Err(error) => handler.on_error(RequestError::Protocol(error)),
            },
            (Phase::Prepare(_), Opcode::Result) => {
                tracing::debug!(
                    connection = %connection,
                    "re-prepare succeeded, re-issuing original request"
                );
                let router = Self {
                    connection,
                    phase: Phase::Execute,
                    handler,
                };
                pool.redispatch(router);
            }
            (Phase::Prepare(_), Opcode::Error) => match response.error_body() {
                Ok(body) => handler.on_error(RequestError::Server(body)),
                Err(error) => handler.on_error(RequestError::Protocol(error)),
            },
            (_, opcode) => {
                // Protocol violation. The response is still surfaced on the
                // caller's success path, and the connection is retired.
                tracing::warn!(
                    connection = %connection,
                    %opcode,
                    "unexpected response opcode, marking connection defunct"
                );
                handler.on_result(response);
                pool.mark_connection_defunct(connection);
            }
        }
    }
}

impl std::fmt::Debug for ResponseRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Execute => "execute",
            Phase::Prepare(_) => "prepare",
        };
        f.debug_struct("ResponseRouter")
            .field("connection", &self.connection)
            .field("phase", &phase)
            .finish_non_exhaustive()
    }
}
