use prometheus::core::Collector;
use prometheus::{IntCounter, IntGauge, Opts, Registry};
use std::net::IpAddr;
use tracing::*;

use crate::error::Result;

const HOST_LABEL: &str = "host";

fn register(registry: Option<&Registry>, collectors: Vec<Box<dyn Collector>>) {
    if let Some(registry) = registry {
        for collector in collectors {
            if let Err(error) = registry.register(collector) {
                // metrics are not essential for the pool to work
                warn!(%error, "Error registering connection pool metric.");
            }
        }
    }
}

fn unregister(registry: Option<&Registry>, collectors: Vec<Box<dyn Collector>>) {
    if let Some(registry) = registry {
        for collector in collectors {
            if let Err(error) = registry.unregister(collector) {
                debug!(%error, "Error unregistering connection pool metric.");
            }
        }
    }
}

/// Instrumentation of a single host pool. Every metric carries the node address as the `host`
/// label.
pub(crate) struct HostPoolMetrics {
    registry: Option<Registry>,
    connections: IntGauge,
    connection_attempts: IntCounter,
    connection_failures: IntCounter,
    connection_drops: IntCounter,
}

impl HostPoolMetrics {
    pub(crate) fn new(registry: Option<Registry>, address: IpAddr) -> Result<Self> {
        let host = address.to_string();

        let metrics = HostPoolMetrics {
            connections: IntGauge::with_opts(
                Opts::new(
                    "cdrs_connection_pool_connections",
                    "Number of connections in the pool for given host",
                )
                .const_label(HOST_LABEL, host.clone()),
            )?,
            connection_attempts: IntCounter::with_opts(
                Opts::new(
                    "cdrs_connection_pool_connection_attempts_total",
                    "Number of connection attempts for given host",
                )
                .const_label(HOST_LABEL, host.clone()),
            )?,
            connection_failures: IntCounter::with_opts(
                Opts::new(
                    "cdrs_connection_pool_connection_failures_total",
                    "Number of connection failures for given host",
                )
                .const_label(HOST_LABEL, host.clone()),
            )?,
            connection_drops: IntCounter::with_opts(
                Opts::new(
                    "cdrs_connection_pool_connection_drops_total",
                    "Number of connection drops for given host",
                )
                .const_label(HOST_LABEL, host),
            )?,
            registry,
        };

        register(metrics.registry.as_ref(), metrics.collectors());
        Ok(metrics)
    }

    pub(crate) fn deregister(&self) {
        unregister(self.registry.as_ref(), self.collectors());
    }

    #[inline]
    pub(crate) fn set_connections(&self, count: usize) {
        self.connections.set(count as i64);
    }

    #[inline]
    pub(crate) fn connection_attempted(&self) {
        self.connection_attempts.inc();
    }

    #[inline]
    pub(crate) fn connection_failed(&self) {
        self.connection_failures.inc();
    }

    #[inline]
    pub(crate) fn connection_dropped(&self) {
        self.connection_drops.inc();
    }

    #[cfg(test)]
    pub(crate) fn connection_attempts(&self) -> u64 {
        self.connection_attempts.get()
    }

    #[cfg(test)]
    pub(crate) fn connection_failures(&self) -> u64 {
        self.connection_failures.get()
    }

    #[cfg(test)]
    pub(crate) fn connection_drops(&self) -> u64 {
        self.connection_drops.get()
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.connections.clone()),
            Box::new(self.connection_attempts.clone()),
            Box::new(self.connection_failures.clone()),
            Box::new(self.connection_drops.clone()),
        ]
    }
}

/// Instrumentation of the whole cluster pool.
pub(crate) struct ClusterPoolMetrics {
    registry: Option<Registry>,
    hosts: IntGauge,
}

impl ClusterPoolMetrics {
    pub(crate) fn new(registry: Option<Registry>) -> Result<Self> {
        let metrics = ClusterPoolMetrics {
            hosts: IntGauge::with_opts(Opts::new(
                "cdrs_connection_pool_hosts",
                "Current number of hosts in the connection pool",
            ))?,
            registry,
        };

        register(
            metrics.registry.as_ref(),
            vec![Box::new(metrics.hosts.clone())],
        );

        Ok(metrics)
    }

    pub(crate) fn deregister(&self) {
        unregister(self.registry.as_ref(), vec![Box::new(self.hosts.clone())]);
    }

    #[inline]
    pub(crate) fn set_hosts(&self, count: usize) {
        self.hosts.set(count as i64);
    }

    #[cfg(test)]
    pub(crate) fn hosts(&self) -> i64 {
        self.hosts.get()
    }
}
