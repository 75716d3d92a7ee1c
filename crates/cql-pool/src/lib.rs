//! # cql-driver-pool
//!
//! Per-host connection pool with protocol-aware retry for a CQL driver.
//!
//! A [`Pool`] owns the set of live sockets to one remote host. It
//! load-balances outstanding requests across them (least-busy selection),
//! queues requests under backpressure when no connection has capacity, and
//! applies protocol-level retry policy transparently: a stale "not
//! prepared" error triggers a re-prepare on the same connection, and a
//! transport write failure hands the request back for retry on a different
//! host, in both cases without the caller seeing an error.
//!
//! ## Ownership and event flow
//!
//! All pool state is owned by a single `Pool` value and mutated only
//! through `&mut` access, so no locks are involved. Asynchronous
//! completions (connect finished, close finished, request resolved, queue
//! deadline elapsed) arrive as [`PoolEvent`]s on the channel returned by
//! [`Pool::new`]; the owning task drains the receiver and feeds each event
//! into [`Pool::process`]. Connections and request handlers are plugged in
//! behind the [`PoolConnection`], [`ConnectionFactory`], and
//! [`RequestHandler`] traits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cql_driver_pool::{Pool, PoolConfig, PoolEvent};
//!
//! let config = PoolConfig::new()
//!     .core_connections_per_host(2)
//!     .max_connections_per_host(8);
//!
//! let (mut pool, mut events) = Pool::new(host, config, None, factory, listener)?;
//!
//! // The owning task drives the pool:
//! while let Some(event) = events.recv().await {
//!     pool.process(event);
//!     if pool.is_closed() {
//!         break;
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod pool;
pub mod request;
pub mod router;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::{PoolError, RejectedRequest, RequestError, RetryReason, TransportError};

// Collaborator contracts
pub use connection::{ConnectionFactory, ConnectionId, Host, PoolConnection, TlsContext};
pub use request::{RequestHandler, RequestToken};

// Pool types
pub use event::{PoolEvent, TransportOutcome};
pub use pool::{Pool, PoolListener};
pub use router::ResponseRouter;
