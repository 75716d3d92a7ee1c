//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Configuration for a per-host connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections opened at construction and restored toward
    /// when the ready set is empty.
    pub core_connections_per_host: usize,

    /// Hard ceiling on connections (ready + connecting) to the host.
    pub max_connections_per_host: usize,

    /// Ceiling on concurrently connecting sockets during opportunistic
    /// growth. Initial population is exempt and always opens exactly
    /// `core_connections_per_host`.
    pub max_simultaneous_creation: usize,

    /// Backpressure limit on the pending request queue.
    pub max_pending_requests: usize,

    /// Deadline for a queued request to be matched with a connection.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_connections_per_host: 2,
            max_connections_per_host: 8,
            max_simultaneous_creation: 1,
            max_pending_requests: 128,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the core connection count.
    #[must_use]
    pub fn core_connections_per_host(mut self, count: usize) -> Self {
        self.core_connections_per_host = count;
        self
    }

    /// Set the maximum connection count.
    #[must_use]
    pub fn max_connections_per_host(mut self, count: usize) -> Self {
        self.max_connections_per_host = count;
        self
    }

    /// Set the concurrent-connect throttle.
    #[must_use]
    pub fn max_simultaneous_creation(mut self, count: usize) -> Self {
        self.max_simultaneous_creation = count;
        self
    }

    /// Set the pending-queue backpressure limit.
    #[must_use]
    pub fn max_pending_requests(mut self, count: usize) -> Self {
        self.max_pending_requests = count;
        self
    }

    /// Set the queued-request deadline.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_connections_per_host == 0 {
            return Err(PoolError::Config("max_connections_per_host must be > 0"));
        }
        if self.core_connections_per_host > self.max_connections_per_host {
            return Err(PoolError::Config(
                "core_connections_per_host exceeds max_connections_per_host",
            ));
        }
        if self.max_simultaneous_creation == 0 {
            return Err(PoolError::Config("max_simultaneous_creation must be > 0"));
        }
        if self.connect_timeout.is_zero() {
            return Err(PoolError::Config("connect_timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.core_connections_per_host, 2);
        assert_eq!(config.max_connections_per_host, 8);
        assert_eq!(config.max_simultaneous_creation, 1);
        assert_eq!(config.max_pending_requests, 128);
    }

    #[test]
    fn test_builder_fluent() {
        let config = PoolConfig::new()
            .core_connections_per_host(4)
            .max_connections_per_host(16)
            .max_simultaneous_creation(2)
            .max_pending_requests(256)
            .connect_timeout(Duration::from_millis(750));

        assert!(config.validate().is_ok());
        assert_eq!(config.core_connections_per_host, 4);
        assert_eq!(config.max_connections_per_host, 16);
        assert_eq!(config.connect_timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_validate_rejects_core_above_max() {
        let config = PoolConfig::new()
            .core_connections_per_host(9)
            .max_connections_per_host(8);
        assert!(matches!(config.validate(), Err(PoolError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        assert!(
            PoolConfig::new()
                .max_connections_per_host(0)
                .validate()
                .is_err()
        );
        assert!(
            PoolConfig::new()
                .max_simultaneous_creation(0)
                .validate()
                .is_err()
        );
        assert!(
            PoolConfig::new()
                .connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
