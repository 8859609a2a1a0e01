use futures::future::join_all;
use parking_lot::RwLock;
use prometheus::Registry;
use rand::{rng, Rng};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::mem;
use std::net::{IpAddr, SocketAddr};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::*;

use crate::cluster::pool_metrics::HostPoolMetrics;
use crate::cluster::{ConnectionManager, ConnectionPoolConfig, HostInfo, KeyspaceHolder};
use crate::error::{Error, Result as CdrsResult};
use crate::retry::{ConvictionPolicy, ReconnectionPolicy};
use crate::transport::{CdrsTransport, ConnectionErrorHandler};

// bounds of the random pause after a failed fill, in milliseconds
const FILL_BACKOFF_MIN: u64 = 31;
const FILL_BACKOFF_MAX: u64 = 131;

async fn new_connection<T: CdrsTransport, CM: ConnectionManager<T>>(
    connection_manager: &CM,
    addr: SocketAddr,
    timeout: Option<Duration>,
    error_handler: Arc<dyn ConnectionErrorHandler<T>>,
) -> CdrsResult<T> {
    if let Some(timeout) = timeout {
        tokio::time::timeout(timeout, connection_manager.connection(error_handler, addr))
            .await
            .map_err(|_| Error::Timeout(format!("Timeout waiting for connection to: {addr}")))
            .and_then(|result| result)
    } else {
        connection_manager.connection(error_handler, addr).await
    }
}

/// Creates host pools sharing the configuration and policies of a cluster pool.
pub(crate) struct ConnectionPoolFactory<
    T: CdrsTransport + 'static,
    CM: ConnectionManager<T> + 'static,
> {
    config: ConnectionPoolConfig,
    connection_manager: CM,
    keyspace_holder: Arc<KeyspaceHolder>,
    reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
    conviction_policy: Arc<dyn ConvictionPolicy + Send + Sync>,
    registry: Option<Registry>,
    node_down_sender: mpsc::UnboundedSender<IpAddr>,
    _transport: PhantomData<T>,
}

impl<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> ConnectionPoolFactory<T, CM> {
    pub(crate) fn new(
        config: ConnectionPoolConfig,
        connection_manager: CM,
        reconnection_policy: Arc<dyn ReconnectionPolicy + Send + Sync>,
        conviction_policy: Arc<dyn ConvictionPolicy + Send + Sync>,
        registry: Option<Registry>,
        node_down_sender: mpsc::UnboundedSender<IpAddr>,
    ) -> Self {
        let keyspace_holder = Arc::new(KeyspaceHolder::new(
            config.keyspace().map(|keyspace| keyspace.to_string()),
        ));

        ConnectionPoolFactory {
            config,
            connection_manager,
            keyspace_holder,
            reconnection_policy,
            conviction_policy,
            registry,
            node_down_sender,
            _transport: Default::default(),
        }
    }

    #[inline]
    pub(crate) fn config(&self) -> &ConnectionPoolConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn connection_manager(&self) -> &CM {
        &self.connection_manager
    }

    #[inline]
    pub(crate) fn keyspace_holder(&self) -> &Arc<KeyspaceHolder> {
        &self.keyspace_holder
    }

    #[inline]
    pub(crate) fn conviction_policy(&self) -> &(dyn ConvictionPolicy + Send + Sync) {
        self.conviction_policy.as_ref()
    }

    /// Creates a new, empty pool for given host. The pool needs to be filled before use.
    pub(crate) fn create(
        self: &Arc<Self>,
        host: HostInfo,
    ) -> CdrsResult<Arc<HostConnectionPool<T, CM>>> {
        let metrics = HostPoolMetrics::new(self.registry.clone(), host.connect_address())?;
        let addr = host.socket_address(self.config.port());

        debug!(%addr, "Creating connection pool.");

        Ok(Arc::new(HostConnectionPool {
            factory: self.clone(),
            host,
            addr,
            size: self.config.pool_size(),
            state: RwLock::new(PoolState {
                connections: Vec::with_capacity(self.config.pool_size()),
                closed: false,
                filling: false,
            }),
            position: AtomicUsize::new(0),
            metrics,
        }))
    }
}

struct PoolState<T> {
    connections: Vec<Arc<T>>,
    closed: bool,
    filling: bool,
}

/// Forwards connection errors to the owning pool, as long as it exists.
struct PoolErrorHandler<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> {
    pool: Weak<HostConnectionPool<T, CM>>,
}

impl<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> ConnectionErrorHandler<T>
    for PoolErrorHandler<T, CM>
{
    fn handle_error(&self, connection: &T, error: Error, closed: bool) {
        if let Some(pool) = self.pool.upgrade() {
            pool.handle_error(connection, error, closed);
        }
    }
}

/// A pool of connections to a single node.
///
/// The pool grows towards its target size in the background and shrinks when connections break,
/// which in turn triggers refilling. Once closed, a pool stays empty forever.
pub struct HostConnectionPool<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> {
    factory: Arc<ConnectionPoolFactory<T, CM>>,
    host: HostInfo,
    addr: SocketAddr,
    size: usize,
    state: RwLock<PoolState<T>>,
    position: AtomicUsize,
    metrics: HostPoolMetrics,
}

impl<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> Debug
    for HostConnectionPool<T, CM>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("HostConnectionPool")
            .field("filling", &state.filling)
            .field("closed", &state.closed)
            .field("connections", &state.connections.len())
            .field("size", &self.size)
            .field("host", &self.host)
            .finish()
    }
}

impl<T: CdrsTransport + 'static, CM: ConnectionManager<T> + 'static> HostConnectionPool<T, CM> {
    /// The node this pool connects to.
    #[inline]
    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    /// Socket address connections are established to.
    #[inline]
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Desired number of connections.
    #[inline]
    pub fn target_size(&self) -> usize {
        self.size
    }

    /// Number of connections currently in the pool.
    pub fn size(&self) -> usize {
        self.state.read().connections.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Picks a connection for a single request, or `None` if there's none available right now.
    ///
    /// Scanning starts at a rotating position, so concurrent callers spread over all connections,
    /// and returns the connection with the most free streams. Stream counts change while
    /// scanning, so the result is only an approximation of the least busy connection. A pool
    /// below its target size starts filling in the background.
    pub fn pick(self: &Arc<Self>) -> Option<Arc<T>> {
        let state = self.state.read();
        if state.closed {
            return None;
        }

        let size = state.connections.len();
        if size < self.size {
            self.spawn_fill();

            if size == 0 {
                return None;
            }
        }

        let start = self.position.fetch_add(1, Ordering::Relaxed) % size;

        let mut least_busy_connection = None;
        let mut streams_available = 0;

        for i in 0..size {
            let connection = &state.connections[(start + i) % size];
            let streams = connection.available_streams();
            if streams > streams_available {
                least_busy_connection = Some(connection);
                streams_available = streams;
            }
        }

        least_busy_connection.cloned()
    }

    /// Establishes missing connections. Only one fill runs at a time, so concurrent calls return
    /// immediately. The first connection of an empty pool is established before returning, the
    /// rest are established in the background.
    pub async fn fill(self: &Arc<Self>) {
        {
            let state = self.state.read();
            if state.closed || state.filling || state.connections.len() >= self.size {
                return;
            }
        }

        let (start_count, mut fill_count) = {
            let mut state = self.state.write();

            // someone might have started filling after the read lock was released
            let start_count = state.connections.len();
            if state.closed || state.filling || start_count >= self.size {
                return;
            }

            state.filling = true;
            (start_count, self.size - start_count)
        };

        if start_count == 0 {
            let result = self.connect().await;
            self.log_connect_error(&result);

            if let Err(error) = result {
                // probably unreachable node
                self.filling_stopped(true).await;

                if self
                    .factory
                    .conviction_policy
                    .add_failure(&error, &self.host)
                {
                    warn!(addr = %self.addr, %error, "Node convicted after connection failure.");
                    let _ = self
                        .factory
                        .node_down_sender
                        .send(self.host.connect_address());
                }

                return;
            }

            fill_count -= 1;
        }

        let pool = self.clone();
        tokio::spawn(async move {
            let result = pool.connect_many(fill_count).await;
            pool.filling_stopped(result.is_err()).await;
        });
    }

    /// Closes the pool and all its connections. Connections are closed after releasing the lock,
    /// since closing can report errors back through [`Self::handle_error`].
    pub fn close(&self) {
        let connections = {
            let mut state = self.state.write();
            if state.closed {
                return;
            }

            state.closed = true;
            mem::take(&mut state.connections)
        };

        self.metrics.set_connections(0);
        debug!(addr = %self.addr, "Closing connection pool.");

        for connection in connections {
            self.close_connection(&connection);
        }
    }

    /// Handles an error reported by one of the pool's connections. A connection which got closed
    /// is removed and the pool starts refilling.
    pub fn handle_error(self: &Arc<Self>, connection: &T, error: Error, closed: bool) {
        if !closed {
            // still an open connection, so continue using it
            debug!(addr = %self.addr, %error, "Recoverable connection error.");
            return;
        }

        {
            let mut state = self.state.write();
            if state.closed {
                return;
            }

            let index = state
                .connections
                .iter()
                .position(|candidate| ptr::eq(candidate.as_ref(), connection));

            match index {
                // order doesn't matter, since picking scans from a rotating position
                Some(index) => {
                    state.connections.swap_remove(index);
                    self.metrics.set_connections(state.connections.len());
                }
                // never pooled, e.g. closed after failing to select the keyspace
                None => return,
            }
        }

        warn!(addr = %self.addr, %error, "Connection dropped.");
        self.metrics.connection_dropped();

        self.spawn_fill();
    }

    pub(crate) fn deregister_metrics(&self) {
        self.metrics.deregister();
    }

    fn spawn_fill(self: &Arc<Self>) {
        let pool = self.clone();
        tokio::spawn(async move { pool.fill().await });
    }

    async fn filling_stopped(self: &Arc<Self>, had_error: bool) {
        if had_error {
            // give the node some time to recover before the next fill
            let delay =
                Duration::from_millis(rng().random_range(FILL_BACKOFF_MIN..FILL_BACKOFF_MAX));
            sleep(delay).await;
        }

        let refill = {
            let mut state = self.state.write();
            state.filling = false;
            !had_error && !state.closed && state.connections.len() < self.size
        };

        // connections dropped while filling didn't get a refill of their own
        if refill {
            self.spawn_fill();
        }
    }

    async fn connect_many(self: &Arc<Self>, count: usize) -> CdrsResult<()> {
        let pool = self;
        let results = join_all((0..count).map(move |_| async move {
            let result = pool.connect().await;
            pool.log_connect_error(&result);
            result
        }))
        .await;

        results
            .into_iter()
            .filter_map(Result::err)
            .last()
            .map_or(Ok(()), Err)
    }

    async fn connect(self: &Arc<Self>) -> CdrsResult<()> {
        self.metrics.connection_attempted();

        let result = self.establish_connection().await;
        if result.is_err() {
            self.metrics.connection_failed();
        }

        result
    }

    async fn establish_connection(self: &Arc<Self>) -> CdrsResult<()> {
        let reconnection_policy = self.factory.reconnection_policy.as_ref();
        let max_attempts = reconnection_policy.max_retries().max(1);
        let mut attempt = 0;

        let connection = loop {
            let error_handler: Arc<dyn ConnectionErrorHandler<T>> = Arc::new(PoolErrorHandler {
                pool: Arc::downgrade(self),
            });

            let result = new_connection(
                &self.factory.connection_manager,
                self.addr,
                self.factory.config.connect_timeout(),
                error_handler,
            )
            .await;

            match result {
                Ok(connection) => break connection,
                // errors like an unreachable network won't go away by retrying
                Err(error) if error.is_network_error() && !error.is_temporary() => {
                    return Err(error)
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(error);
                    }

                    let delay = reconnection_policy.interval(attempt - 1);
                    if self.factory.config.verbose_logging() {
                        debug!(addr = %self.addr, %error, attempt, ?delay, "Connection attempt failed.");
                    }

                    sleep(delay).await;
                }
            }
        };

        if let Some(keyspace) = self.factory.keyspace_holder.current_keyspace() {
            if let Err(error) = connection.use_keyspace(keyspace.as_str()).await {
                self.close_connection(&connection);
                return Err(error);
            }
        }

        let connection = Arc::new(connection);
        let closed = {
            let mut state = self.state.write();
            if !state.closed {
                state.connections.push(connection.clone());
                self.metrics.set_connections(state.connections.len());
            }

            state.closed
        };

        if closed {
            debug!(addr = %self.addr, "Pool closed while connecting - discarding connection.");
            self.close_connection(&connection);
        }

        Ok(())
    }

    fn close_connection(&self, connection: &T) {
        if let Err(error) = connection.close() {
            debug!(addr = %self.addr, %error, "Error closing connection.");
        }
    }

    fn log_connect_error(&self, result: &CdrsResult<()>) {
        if let Err(error) = result {
            if error.is_network_error() {
                // these are typical during a node outage, so avoid log spam
                if self.factory.config.verbose_logging() {
                    debug!(addr = %self.addr, %error, "Unable to dial.");
                }
            } else {
                error!(addr = %self.addr, %error, "Failed to connect.");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn connections(&self) -> Vec<Arc<T>> {
        self.state.read().connections.clone()
    }

    #[cfg(test)]
    pub(crate) fn is_filling(&self) -> bool {
        self.state.read().filling
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &HostPoolMetrics {
        &self.metrics
    }
}
