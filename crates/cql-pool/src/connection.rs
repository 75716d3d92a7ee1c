//! Connection collaborator contracts and identity types.
//!
//! The pool does not implement the socket layer. It drives connections
//! through the [`PoolConnection`] trait and creates them through a
//! [`ConnectionFactory`], so transports (plain TCP, TLS, in-memory test
//! doubles) plug in behind the same seam.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::event::PoolEvent;
use crate::router::ResponseRouter;

/// Identity of the remote endpoint a pool serves.
///
/// Immutable for the pool's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    address: SocketAddr,
}

impl Host {
    /// Create a host identity from a socket address.
    #[must_use]
    pub fn new(address: SocketAddr) -> Self {
        Self { address }
    }

    /// The host's socket address.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

impl From<SocketAddr> for Host {
    fn from(address: SocketAddr) -> Self {
        Self::new(address)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.address.fmt(f)
    }
}

/// TLS context threaded through to the connection factory.
///
/// The pool never touches TLS state itself; it only hands the context to
/// each connection it creates.
pub type TlsContext = Arc<rustls::ClientConfig>;

/// Registry key for a connection owned by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value, for logging.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A single socket to the host, multiplexing requests over numbered streams.
///
/// Implementations report their asynchronous transitions by sending
/// [`PoolEvent`]s on the sender handed to them at creation:
///
/// - [`PoolEvent::ConnectFinished`] once the connect sequence resolves
///   (successfully or not; the pool checks [`is_ready`](Self::is_ready)),
/// - [`PoolEvent::ConnectionClosed`] once a close completes,
/// - [`PoolEvent::RequestComplete`] when a dispatched request resolves,
///   returning the router together with the transport outcome.
pub trait PoolConnection: Send {
    /// Initiate the connect sequence.
    fn connect(&mut self);

    /// Initiate a graceful close.
    fn close(&mut self);

    /// Mark the connection unusable and begin closing it.
    ///
    /// A connection closed this way reports [`is_defunct`](Self::is_defunct)
    /// at close completion, which escalates to a pool-wide drain.
    fn mark_defunct(&mut self);

    /// Whether the connection is established and accepting requests.
    fn is_ready(&self) -> bool;

    /// Whether a close is already in progress.
    fn is_closing(&self) -> bool;

    /// Whether the connection has suffered an unrecoverable failure.
    fn is_defunct(&self) -> bool;

    /// Number of free request streams.
    fn available_streams(&self) -> usize;

    /// Hand an in-flight request to the transport.
    ///
    /// Returns the router back if the transport cannot accept the dispatch,
    /// so the request handler is never lost.
    fn dispatch(&mut self, router: ResponseRouter) -> Result<(), ResponseRouter>;
}

/// Creates connections bound to a pool's event channel.
pub trait ConnectionFactory: Send {
    /// Create a connection to `host` under the given registry id.
    ///
    /// The pool calls [`PoolConnection::connect`] on the returned object;
    /// the factory only constructs it.
    fn create(
        &mut self,
        id: ConnectionId,
        host: &Host,
        tls: Option<&TlsContext>,
        events: mpsc::UnboundedSender<PoolEvent>,
    ) -> Box<dyn PoolConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_display() {
        let host = Host::new("10.0.0.7:9042".parse().unwrap());
        assert_eq!(host.to_string(), "10.0.0.7:9042");
        assert_eq!(host.address().port(), 9042);
    }

    #[test]
    fn test_connection_id_ordering() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(2);
        assert!(a < b);
        assert_eq!(a.raw(), 1);
    }
}
