//! **cdrs-tokio-pool** manages the live set of connections an async Cassandra driver keeps open
//! to the nodes of a cluster.
//!
//! ## Getting started
//!
//! The pool is generic over the transport ([`CdrsTransport`](crate::transport::CdrsTransport))
//! and the component which dials new connections
//! ([`ConnectionManager`](crate::cluster::ConnectionManager)). Both are supplied by the driver.
//!
//! ```no_run
//! # use cdrs_tokio_pool::cluster::{ClusterConnectionPool, ConnectionManager, ConnectionPoolConfigBuilder, HostInfo};
//! # use cdrs_tokio_pool::retry::{ConstantReconnectionPolicy, SimpleConvictionPolicy};
//! # use cdrs_tokio_pool::transport::CdrsTransport;
//! # use std::sync::Arc;
//! # async fn run<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static>(
//! #     connection_manager: CM,
//! #     hosts: Vec<HostInfo>,
//! # ) -> cdrs_tokio_pool::Result<()> {
//! let config = ConnectionPoolConfigBuilder::new()
//!     .with_pool_size(4)
//!     .with_keyspace("test_ks")
//!     .build()?;
//!
//! let pool: Arc<ClusterConnectionPool<T, CM>> = ClusterConnectionPool::new(
//!     config,
//!     connection_manager,
//!     Arc::new(ConstantReconnectionPolicy::default()),
//!     Arc::new(SimpleConvictionPolicy),
//!     vec!["127.0.0.1:9042".into()],
//!     None,
//! )?;
//!
//! pool.reconcile(&hosts).await;
//!
//! if let Some(host_pool) = pool.get_pool(&hosts[0]).await {
//!     let _connection = host_pool.pick();
//! }
//!
//! pool.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pools
//!
//! A [`ClusterConnectionPool`](crate::cluster::ClusterConnectionPool) owns one
//! [`HostConnectionPool`](crate::cluster::HostConnectionPool) per node which is up. Host pools
//! fill themselves up to the configured size in the background, pick the least busy connection
//! for each request and replace connections which break.

pub mod cluster;
pub mod error;
pub mod future;
pub mod retry;
pub mod transport;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
