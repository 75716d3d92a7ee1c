//! Events delivered to the pool state machine.
//!
//! All asynchronous completions flow through one channel into the single
//! state-owning [`Pool`](crate::pool::Pool). Connections and timer tasks
//! only ever send events; they never call back into the pool directly, so
//! reentrant chains (close completion triggering further closes) are
//! serialized by the channel instead of recursing.

use cql_protocol::Response;

use crate::connection::ConnectionId;
use crate::error::TransportError;
use crate::request::RequestToken;
use crate::router::ResponseRouter;

/// Transport-level resolution of an in-flight request.
#[derive(Debug)]
pub enum TransportOutcome {
    /// A response frame arrived for the request's stream.
    Response(Response),
    /// The transport failed the request.
    Error(TransportError),
    /// The transport gave up waiting for a response.
    Timeout,
}

/// An asynchronous completion to feed into [`Pool::process`].
///
/// [`Pool::process`]: crate::pool::Pool::process
#[derive(Debug)]
pub enum PoolEvent {
    /// A connection's connect sequence resolved.
    ConnectFinished(ConnectionId),
    /// A connection's close completed; its registry entry can be dropped.
    ConnectionClosed(ConnectionId),
    /// A queued request's deadline elapsed.
    RequestTimeout(RequestToken),
    /// A dispatched request resolved; the router is returned for routing.
    RequestComplete {
        /// The router that was handed to the connection at dispatch time.
        router: ResponseRouter,
        /// How the transport resolved the request.
        outcome: TransportOutcome,
    },
}
