use futures::future::join_all;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use prometheus::Registry;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, RwLock};
use tracing::*;

use crate::cluster::connection_pool::{ConnectionPoolFactory, HostConnectionPool};
use crate::cluster::pool_metrics::ClusterPoolMetrics;
use crate::cluster::{
    ConnectionManager, ConnectionPoolConfig, HostInfo, KeyspaceHolder, NodeAddress,
};
use crate::error::Result;
use crate::retry::{ConvictionPolicy, ReconnectionPolicy};
use crate::transport::CdrsTransport;

type HostPools<T, CM> = FxHashMap<IpAddr, Arc<HostConnectionPool<T, CM>>>;

/// Keeps a connection pool for every node of the cluster which is up.
///
/// The set of pools follows membership updates pushed by the topology component through
/// [`Self::reconcile`], [`Self::host_up`] and [`Self::host_down`]. The request path looks up pools
/// with [`Self::get_pool`]. Pools are closed only after being removed from the map, so lookups
/// never observe a pool which is being closed.
pub struct ClusterConnectionPool<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> {
    factory: Arc<ConnectionPoolFactory<T, CM>>,
    host_pools: RwLock<HostPools<T, CM>>,
    endpoints: Vec<NodeAddress>,
    metrics: ClusterPoolMetrics,
}

impl<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> Debug
    for ClusterConnectionPool<T, CM>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConnectionPool")
            .field("endpoints", &self.endpoints)
            .field("config", self.factory.config())
            .finish()
    }
}

impl<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> ClusterConnectionPool<T, CM> {
    /// Creates an empty pool. Needs to be called in the context of a tokio runtime, since nodes
    /// convicted by `conviction_policy` are removed by a background task. Metrics are registered
    /// in `registry`, if given.
    pub fn new(
        config: ConnectionPoolConfig,
        connection_manager: CM,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
        conviction_policy: Arc<dyn ConvictionPolicy + Send + Sync>,
        endpoints: Vec<NodeAddress>,
        registry: Option<Registry>,
    ) -> Result<Arc<Self>> {
        let (node_down_sender, node_down_receiver) = mpsc::unbounded_channel();

        let metrics = ClusterPoolMetrics::new(registry.clone())?;
        let factory = Arc::new(ConnectionPoolFactory::new(
            config,
            connection_manager,
            reconnection_policy,
            conviction_policy,
            registry,
            node_down_sender,
        ));

        let pool = Arc::new(ClusterConnectionPool {
            factory,
            host_pools: Default::default(),
            endpoints,
            metrics,
        });

        Self::monitor_node_down_events(node_down_receiver, Arc::downgrade(&pool));

        Ok(pool)
    }

    fn monitor_node_down_events(
        mut receiver: mpsc::UnboundedReceiver<IpAddr>,
        pool: Weak<ClusterConnectionPool<T, CM>>,
    ) {
        tokio::spawn(async move {
            while let Some(address) = receiver.recv().await {
                match pool.upgrade() {
                    Some(pool) => pool.host_down(address).await,
                    None => break,
                }
            }

            debug!("Node down monitoring stopped.");
        });
    }

    /// Seed endpoints given at creation.
    #[inline]
    pub fn endpoints(&self) -> &[NodeAddress] {
        &self.endpoints
    }

    #[inline]
    pub fn config(&self) -> &ConnectionPoolConfig {
        self.factory.config()
    }

    /// Holder of the keyspace selected on new connections. Updating it affects only connections
    /// established afterwards.
    #[inline]
    pub fn keyspace_holder(&self) -> &Arc<KeyspaceHolder> {
        self.factory.keyspace_holder()
    }

    #[inline]
    pub fn connection_manager(&self) -> &CM {
        self.factory.connection_manager()
    }

    /// Brings the set of pools in line with the current cluster membership. New pools for hosts
    /// which are up get created and filled concurrently, and are kept only if at least one
    /// connection could be established. Pools of hosts which are down or gone are closed.
    pub async fn reconcile(&self, hosts: &[HostInfo]) {
        let (discarded, removed) = {
            let mut host_pools = self.host_pools.write().await;

            let mut to_remove: FxHashSet<IpAddr> = host_pools.keys().copied().collect();
            let mut creations = vec![];

            for host in hosts
                .iter()
                .filter(|host| host.is_up())
                .unique_by(|host| host.connect_address())
            {
                let address = host.connect_address();
                if host_pools.contains_key(&address) {
                    to_remove.remove(&address);
                    continue;
                }

                match self.factory.create(host.clone()) {
                    Ok(pool) => creations.push(async move {
                        pool.fill().await;
                        pool
                    }),
                    Err(error) => {
                        error!(%address, %error, "Error creating connection pool.");
                    }
                }
            }

            let mut discarded = vec![];
            for pool in join_all(creations).await {
                if pool.size() > 0 {
                    host_pools.insert(pool.host().connect_address(), pool);
                } else {
                    debug!(addr = %pool.address(), "Discarding empty connection pool.");
                    pool.deregister_metrics();
                    discarded.push(pool);
                }
            }

            let removed = to_remove
                .into_iter()
                .filter_map(|address| host_pools.remove(&address))
                .collect_vec();

            for pool in &removed {
                debug!(addr = %pool.address(), "Removing connection pool.");
                pool.deregister_metrics();
            }

            self.metrics.set_hosts(host_pools.len());

            (discarded, removed)
        };

        Self::close_pools(discarded.into_iter().chain(removed).collect());
    }

    /// Makes sure a pool for given host exists and tries to fill it up.
    pub async fn add_host(&self, host: &HostInfo) -> Result<()> {
        let pool = {
            let mut host_pools = self.host_pools.write().await;

            match host_pools.get(&host.connect_address()) {
                Some(pool) => pool.clone(),
                None => {
                    let pool = self.factory.create(host.clone())?;
                    host_pools.insert(host.connect_address(), pool.clone());
                    self.metrics.set_hosts(host_pools.len());
                    pool
                }
            }
        };

        pool.fill().await;
        Ok(())
    }

    /// Removes and closes the pool for given address, if present.
    pub async fn remove_host(&self, address: IpAddr) {
        let pool = {
            let mut host_pools = self.host_pools.write().await;

            let pool = host_pools.remove(&address.to_canonical());
            if pool.is_some() {
                self.metrics.set_hosts(host_pools.len());
            }

            pool
        };

        if let Some(pool) = pool {
            debug!(addr = %pool.address(), "Removing connection pool.");
            pool.deregister_metrics();
            Self::close_pools(vec![pool]);
        }
    }

    /// Reacts to a node being reported up.
    pub async fn host_up(&self, host: &HostInfo) -> Result<()> {
        self.factory.conviction_policy().reset(host);
        self.add_host(host).await
    }

    /// Reacts to a node being reported down.
    pub async fn host_down(&self, address: IpAddr) {
        self.remove_host(address).await;
    }

    /// Total number of connections in all pools. Pools change concurrently, so this is only an
    /// estimate.
    pub async fn size(&self) -> usize {
        self.host_pools
            .read()
            .await
            .values()
            .map(|pool| pool.size())
            .sum()
    }

    /// Number of nodes with a pool.
    pub async fn host_count(&self) -> usize {
        self.host_pools.read().await.len()
    }

    /// Returns the pool for given host, if one exists.
    pub async fn get_pool(&self, host: &HostInfo) -> Option<Arc<HostConnectionPool<T, CM>>> {
        self.host_pools
            .read()
            .await
            .get(&host.connect_address())
            .cloned()
    }

    /// Closes all pools.
    pub async fn close(&self) {
        self.metrics.deregister();

        let mut host_pools = self.host_pools.write().await;
        for (_, pool) in mem::take(&mut *host_pools) {
            pool.deregister_metrics();
            pool.close();
        }

        self.metrics.set_hosts(0);
    }

    fn close_pools(pools: Vec<Arc<HostConnectionPool<T, CM>>>) {
        if pools.is_empty() {
            return;
        }

        tokio::spawn(async move {
            for pool in pools {
                pool.close();
            }
        });
    }
}
