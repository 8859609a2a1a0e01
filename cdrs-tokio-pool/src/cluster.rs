pub use crate::cluster::cluster_connection_pool::ClusterConnectionPool;
pub use crate::cluster::config::{ConnectionPoolConfig, ConnectionPoolConfigBuilder};
pub use crate::cluster::connection_manager::ConnectionManager;
pub use crate::cluster::connection_pool::HostConnectionPool;
pub use crate::cluster::host_info::HostInfo;
pub use crate::cluster::keyspace_holder::KeyspaceHolder;
pub use crate::cluster::node_address::NodeAddress;
pub use crate::cluster::node_state::NodeState;

mod cluster_connection_pool;
mod config;
mod connection_manager;
mod connection_pool;
mod host_info;
mod keyspace_holder;
mod node_address;
mod node_state;
mod pool_metrics;
#[cfg(test)]
pub(crate) mod testing;
