use std::time::Duration;

use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 9042;
const DEFAULT_POOL_SIZE: usize = 2;

/// Configuration for node connection pools. By default, every node gets 2 connections on port
/// 9042, there is no connect timeout and no keyspace gets selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionPoolConfig {
    port: u16,
    pool_size: usize,
    connect_timeout: Option<Duration>,
    keyspace: Option<String>,
    verbose_logging: bool,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        ConnectionPoolConfig {
            port: DEFAULT_PORT,
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout: None,
            keyspace: None,
            verbose_logging: false,
        }
    }
}

impl ConnectionPoolConfig {
    /// Port used for nodes which don't announce their own.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Target number of connections per node.
    #[inline]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Upper bound for a single connection attempt.
    #[inline]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Keyspace initially selected on new connections.
    #[inline]
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Whether failures which are expected during node outages (refused connections, timeouts)
    /// should be logged.
    #[inline]
    pub fn verbose_logging(&self) -> bool {
        self.verbose_logging
    }
}

/// Builder structure that helps to configure connection pools.
#[derive(Default)]
pub struct ConnectionPoolConfigBuilder {
    config: ConnectionPoolConfig,
}

impl ConnectionPoolConfigBuilder {
    pub fn new() -> ConnectionPoolConfigBuilder {
        Default::default()
    }

    /// Sets the default node port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the number of connections per node.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    /// Sets the timeout for a single connection attempt.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.connect_timeout = Some(connect_timeout);
        self
    }

    /// Sets the keyspace selected on new connections.
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.config.keyspace = Some(keyspace.into());
        self
    }

    /// Enables logging of expected dial failures.
    pub fn with_verbose_logging(mut self, verbose_logging: bool) -> Self {
        self.config.verbose_logging = verbose_logging;
        self
    }

    /// Finalizes building process
    pub fn build(self) -> Result<ConnectionPoolConfig> {
        if self.config.pool_size == 0 {
            return Err(Error::General(
                "Connection pool size must be greater than 0!".into(),
            ));
        }

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::cluster::ConnectionPoolConfigBuilder;

    #[test]
    fn should_build_default_config() {
        let config = ConnectionPoolConfigBuilder::new().build().unwrap();
        assert_eq!(config.port(), 9042);
        assert_eq!(config.pool_size(), 2);
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.keyspace(), None);
        assert!(!config.verbose_logging());
    }

    #[test]
    fn should_apply_builder_settings() {
        let config = ConnectionPoolConfigBuilder::new()
            .with_port(19042)
            .with_pool_size(8)
            .with_connect_timeout(Duration::from_secs(5))
            .with_keyspace("ks")
            .with_verbose_logging(true)
            .build()
            .unwrap();

        assert_eq!(config.port(), 19042);
        assert_eq!(config.pool_size(), 8);
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.keyspace(), Some("ks"));
        assert!(config.verbose_logging());
    }

    #[test]
    fn should_reject_empty_pool() {
        assert!(ConnectionPoolConfigBuilder::new()
            .with_pool_size(0)
            .build()
            .is_err());
    }
}
