//! Per-host connection pool state machine.
//!
//! One `Pool` owns every socket to a single host. All state lives behind
//! `&mut Pool` and is mutated either by the owner calling pool operations
//! or by the owner feeding [`PoolEvent`]s into [`Pool::process`]; there is
//! no shared mutability and no locking. Connections and timers communicate
//! with the pool exclusively through the event channel handed out at
//! construction, so completion chains that would otherwise recurse are
//! serialized.

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::config::PoolConfig;
use crate::connection::{ConnectionFactory, ConnectionId, Host, PoolConnection, TlsContext};
use crate::error::{PoolError, RejectedRequest, RetryReason};
use crate::event::PoolEvent;
use crate::request::{RequestHandler, RequestToken};
use crate::router::ResponseRouter;

/// Callbacks the pool fires on its owning session layer.
pub trait PoolListener: Send {
    /// A connection to `host` finished establishing successfully.
    fn connection_up(&mut self, host: &Host);

    /// The pool has fully drained. Fires exactly once per pool.
    fn pool_closed(&mut self, host: &Host);

    /// A request must be retried against a different host.
    fn retry(&mut self, handler: Box<dyn RequestHandler>, reason: RetryReason);
}

/// Pool lifecycle state. Transitions only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Open,
    Closing,
}

/// Registry entry for a connection the pool owns.
struct Slot {
    conn: Box<dyn PoolConnection>,
    connecting: bool,
}

/// A request waiting for a connection, guarded by its deadline timer.
struct PendingRequest {
    token: RequestToken,
    handler: Box<dyn RequestHandler>,
    timer: AbortHandle,
}

/// The set of live sockets to one remote host.
///
/// See the crate documentation for the ownership and event-flow model.
pub struct Pool {
    host: Host,
    config: PoolConfig,
    tls: Option<TlsContext>,
    factory: Box<dyn ConnectionFactory>,
    listener: Box<dyn PoolListener>,
    connections: HashMap<ConnectionId, Slot>,
    pending: VecDeque<PendingRequest>,
    state: PoolState,
    closed_notified: bool,
    next_connection_id: u64,
    next_request_token: u64,
    events_tx: mpsc::UnboundedSender<PoolEvent>,
}

impl Pool {
    /// Create a pool and open its core connections.
    ///
    /// Returns the pool together with the receiving end of its event
    /// channel; the owning task must drain the receiver and feed every
    /// event back into [`Pool::process`].
    pub fn new(
        host: Host,
        config: PoolConfig,
        tls: Option<TlsContext>,
        factory: Box<dyn ConnectionFactory>,
        listener: Box<dyn PoolListener>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PoolEvent>), PoolError> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut pool = Self {
            host,
            config,
            tls,
            factory,
            listener,
            connections: HashMap::new(),
            pending: VecDeque::new(),
            state: PoolState::Open,
            closed_notified: false,
            next_connection_id: 0,
            next_request_token: 0,
            events_tx,
        };

        tracing::info!(
            host = %pool.host,
            core = pool.config.core_connections_per_host,
            max = pool.config.max_connections_per_host,
            "opening connection pool"
        );
        for _ in 0..pool.config.core_connections_per_host {
            pool.spawn_connection();
        }

        Ok((pool, events_rx))
    }

    /// The host this pool serves.
    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Whether the pool has started draining.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.state == PoolState::Closing
    }

    /// Whether the pool has fully drained and fired its close notification.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed_notified
    }

    /// Total connections in the registry (ready + connecting).
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections that have completed their connect sequence.
    #[must_use]
    pub fn ready_connection_count(&self) -> usize {
        self.connections.len() - self.connecting_count()
    }

    /// Connections still in their connect sequence.
    #[must_use]
    pub fn connecting_count(&self) -> usize {
        self.connections.values().filter(|s| s.connecting).count()
    }

    /// Requests waiting in the pending queue.
    #[must_use]
    pub fn pending_request_count(&self) -> usize {
        self.pending.len()
    }

    /// Pick a connection for a new request.
    ///
    /// Returns `None` when the pool is closing or no ready connection has
    /// spare capacity; the caller should queue the request with
    /// [`wait_for_connection`](Self::wait_for_connection) instead. An empty
    /// ready set triggers opportunistic growth back toward the core size.
    pub fn borrow_connection(&mut self) -> Option<ConnectionId> {
        if self.state == PoolState::Closing {
            return None;
        }

        if self.ready_connection_count() == 0 {
            for _ in 0..self.config.core_connections_per_host {
                self.maybe_spawn_connection();
            }
            return None;
        }

        self.maybe_spawn_connection();
        self.find_least_busy()
    }

    /// Dispatch a request on a borrowed connection.
    ///
    /// On rejection the handler is returned inside the error so the caller
    /// can retry it elsewhere.
    pub fn execute(
        &mut self,
        connection: ConnectionId,
        handler: Box<dyn RequestHandler>,
    ) -> Result<(), RejectedRequest> {
        if !self.connections.contains_key(&connection) {
            return Err(RejectedRequest {
                handler,
                error: PoolError::ConnectionUnavailable,
            });
        }

        let router = ResponseRouter::new(connection, handler);
        match self.dispatch_on(connection, router) {
            Ok(()) => Ok(()),
            Err(router) => Err(RejectedRequest {
                handler: router.into_handler(),
                error: PoolError::DispatchRejected,
            }),
        }
    }

    /// Queue a request until a connection has capacity for it.
    ///
    /// Admission is refused while the pool is closing or once the queue
    /// holds `max_pending_requests` entries. An admitted request is guarded
    /// by a `connect_timeout` timer; on expiry it is handed back to the
    /// owner with [`RetryReason::Timeout`].
    ///
    /// Must be called from within a tokio runtime (the deadline timer is a
    /// spawned task).
    pub fn wait_for_connection(
        &mut self,
        handler: Box<dyn RequestHandler>,
    ) -> Result<RequestToken, RejectedRequest> {
        if self.state == PoolState::Closing {
            return Err(RejectedRequest {
                handler,
                error: PoolError::Closing,
            });
        }
        if self.pending.len() >= self.config.max_pending_requests {
            tracing::debug!(
                host = %self.host,
                limit = self.config.max_pending_requests,
                "pending request queue full, rejecting request"
            );
            return Err(RejectedRequest {
                handler,
                error: PoolError::QueueFull {
                    limit: self.config.max_pending_requests,
                },
            });
        }

        let token = RequestToken::new(self.next_request_token);
        self.next_request_token += 1;
        let timer = self.start_queue_timer(token);
        self.pending.push_back(PendingRequest {
            token,
            handler,
            timer,
        });
        Ok(token)
    }

    /// Begin draining the pool.
    ///
    /// Safe to call more than once; the close notification still fires
    /// exactly once, after the last connection and queued request are gone.
    pub fn close(&mut self) {
        if self.state == PoolState::Open {
            tracing::info!(host = %self.host, "closing connection pool");
            self.state = PoolState::Closing;
        }
        self.maybe_close();
    }

    /// Feed one asynchronous completion into the state machine.
    pub fn process(&mut self, event: PoolEvent) {
        match event {
            PoolEvent::ConnectFinished(id) => self.on_connection_connect(id),
            PoolEvent::ConnectionClosed(id) => self.on_connection_close(id),
            PoolEvent::RequestTimeout(token) => self.on_queue_timeout(token),
            PoolEvent::RequestComplete { router, outcome } => router.resolve(self, outcome),
        }
    }

    fn spawn_connection(&mut self) {
        if self.state == PoolState::Closing {
            return;
        }

        let id = ConnectionId::new(self.next_connection_id);
        self.next_connection_id += 1;

        let mut conn =
            self.factory
                .create(id, &self.host, self.tls.as_ref(), self.events_tx.clone());
        conn.connect();
        tracing::debug!(host = %self.host, connection = %id, "opening connection");
        self.connections.insert(
            id,
            Slot {
                conn,
                connecting: true,
            },
        );
    }

    fn maybe_spawn_connection(&mut self) {
        if self.connecting_count() >= self.config.max_simultaneous_creation {
            return;
        }
        if self.connections.len() >= self.config.max_connections_per_host {
            return;
        }
        self.spawn_connection();
    }

    /// Ready connection with the most spare streams, if any has capacity.
    fn find_least_busy(&self) -> Option<ConnectionId> {
        let (id, slot) = self
            .connections
            .iter()
            .filter(|(_, slot)| !slot.connecting && slot.conn.is_ready())
            .max_by_key(|(_, slot)| slot.conn.available_streams())?;

        if slot.conn.available_streams() > 0 {
            Some(*id)
        } else {
            None
        }
    }

    fn on_connection_connect(&mut self, id: ConnectionId) {
        let Some(slot) = self.connections.get_mut(&id) else {
            return;
        };
        slot.connecting = false;

        if !slot.conn.is_ready() {
            tracing::warn!(
                host = %self.host,
                connection = %id,
                "connection failed before becoming ready"
            );
            self.connections.remove(&id);
            self.maybe_close();
            return;
        }

        tracing::debug!(host = %self.host, connection = %id, "connection ready");
        self.listener.connection_up(&self.host);

        if self.state == PoolState::Closing {
            // Announced, but too late to admit; drain it with the rest.
            slot.conn.close();
            return;
        }

        self.execute_pending_request(id);
    }

    fn on_connection_close(&mut self, id: ConnectionId) {
        let Some(slot) = self.connections.remove(&id) else {
            return;
        };
        let defunct = slot.conn.is_defunct();
        drop(slot);

        tracing::debug!(
            host = %self.host,
            connection = %id,
            defunct,
            "connection closed"
        );

        if defunct && self.state == PoolState::Open {
            // Conviction policy: one unrecoverable socket drains the whole
            // host pool; the owner rebuilds it from scratch.
            tracing::warn!(
                host = %self.host,
                connection = %id,
                "defunct connection, draining pool"
            );
            self.state = PoolState::Closing;
        }

        self.maybe_close();
    }

    /// Drive the draining state: close stragglers, then notify once done.
    fn maybe_close(&mut self) {
        if self.state != PoolState::Closing {
            return;
        }

        for slot in self.connections.values_mut() {
            if !slot.connecting && !slot.conn.is_closing() {
                slot.conn.close();
            }
        }

        if self.connections.is_empty() && self.pending.is_empty() && !self.closed_notified {
            self.closed_notified = true;
            tracing::info!(host = %self.host, "connection pool drained");
            self.listener.pool_closed(&self.host);
        }
    }

    fn on_queue_timeout(&mut self, token: RequestToken) {
        // The request may already have been dispatched; its timer was
        // aborted then, but an expiry event can still be in flight.
        let Some(pos) = self.pending.iter().position(|p| p.token == token) else {
            return;
        };
        let Some(entry) = self.pending.remove(pos) else {
            return;
        };
        entry.timer.abort();

        tracing::debug!(host = %self.host, "queued request timed out");
        self.notify_retry(entry.handler, RetryReason::Timeout);

        // A timeout may be the last thing keeping the pool from draining.
        self.maybe_close();
    }

    /// Pop the queue head and dispatch it on `connection`.
    ///
    /// The timer is always disarmed before the hand-off. A transport
    /// rejection sends the request to a different host rather than back
    /// into this queue; it already consumed its chance here.
    fn execute_pending_request(&mut self, connection: ConnectionId) {
        let Some(entry) = self.pending.pop_front() else {
            return;
        };
        entry.timer.abort();

        let router = ResponseRouter::new(connection, entry.handler);
        if let Err(router) = self.dispatch_on(connection, router) {
            self.notify_retry(router.into_handler(), RetryReason::DispatchFailure);
        }
    }

    pub(crate) fn dispatch_on(
        &mut self,
        connection: ConnectionId,
        router: ResponseRouter,
    ) -> Result<(), ResponseRouter> {
        match self.connections.get_mut(&connection) {
            Some(slot) if !slot.connecting => slot.conn.dispatch(router),
            _ => Err(router),
        }
    }

    /// Dispatch a router created during retry handling; a rejection here
    /// falls back to retry-on-next-host.
    pub(crate) fn redispatch(&mut self, router: ResponseRouter) {
        let connection = router.connection();
        if let Err(router) = self.dispatch_on(connection, router) {
            self.notify_retry(router.into_handler(), RetryReason::DispatchFailure);
        }
    }

    pub(crate) fn notify_retry(
        &mut self,
        handler: Box<dyn RequestHandler>,
        reason: RetryReason,
    ) {
        tracing::debug!(host = %self.host, ?reason, "handing request back for retry");
        self.listener.retry(handler, reason);
    }

    pub(crate) fn mark_connection_defunct(&mut self, connection: ConnectionId) {
        if let Some(slot) = self.connections.get_mut(&connection) {
            slot.conn.mark_defunct();
        }
    }

    /// Reuse a connection freed by a completed request.
    pub(crate) fn finish_request(&mut self, connection: ConnectionId) {
        let usable = self
            .connections
            .get(&connection)
            .is_some_and(|slot| !slot.connecting && slot.conn.is_ready());
        if usable {
            self.execute_pending_request(connection);
        }
    }

    fn start_queue_timer(&self, token: RequestToken) -> AbortHandle {
        let events = self.events_tx.clone();
        let timeout = self.config.connect_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(PoolEvent::RequestTimeout(token));
        });
        task.abort_handle()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        for entry in &self.pending {
            entry.timer.abort();
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("host", &self.host)
            .field("state", &self.state)
            .field("connections", &self.connections.len())
            .field("connecting", &self.connecting_count())
            .field("pending_requests", &self.pending.len())
            .finish_non_exhaustive()
    }
}
