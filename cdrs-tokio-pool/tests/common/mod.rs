use cdrs_tokio_pool::cluster::ConnectionManager;
use cdrs_tokio_pool::future::BoxFuture;
use cdrs_tokio_pool::transport::{CdrsTransport, ConnectionErrorHandler};
use cdrs_tokio_pool::{Error, Result};
use futures::FutureExt;
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

/// Connection living only in memory.
pub struct MemoryConnection {
    addr: SocketAddr,
    closed: AtomicBool,
    keyspace: Mutex<Option<String>>,
    error_handler: Arc<dyn ConnectionErrorHandler<MemoryConnection>>,
}

impl MemoryConnection {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn keyspace(&self) -> Option<String> {
        self.keyspace.lock().clone()
    }

    /// Simulates the peer resetting the connection.
    pub fn fail(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.error_handler.handle_error(
            self,
            Error::Io(io::Error::from(io::ErrorKind::ConnectionReset)),
            true,
        );
    }
}

impl CdrsTransport for MemoryConnection {
    fn available_streams(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            32
        }
    }

    fn use_keyspace<'a>(&'a self, keyspace: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            *self.keyspace.lock() = Some(keyspace.to_string());
            Ok(())
        }
        .boxed()
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // the peer sees the shutdown as an aborted connection
            self.error_handler.handle_error(
                self,
                Error::Io(io::Error::from(io::ErrorKind::ConnectionAborted)),
                true,
            );
        }

        Ok(())
    }

    fn address(&self) -> SocketAddr {
        self.addr
    }
}

#[derive(Default)]
struct ClusterState {
    down: Mutex<FxHashSet<IpAddr>>,
    dials: AtomicUsize,
}

/// Simulated cluster in which nodes can be taken down and brought back.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn take_down(&self, address: IpAddr) {
        self.state.down.lock().insert(address);
    }

    pub fn bring_up(&self, address: IpAddr) {
        self.state.down.lock().remove(&address);
    }

    pub fn dials(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }
}

impl ConnectionManager<MemoryConnection> for MemoryCluster {
    fn connection(
        &self,
        error_handler: Arc<dyn ConnectionErrorHandler<MemoryConnection>>,
        addr: SocketAddr,
    ) -> BoxFuture<'_, Result<MemoryConnection>> {
        async move {
            self.state.dials.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.state.down.lock().contains(&addr.ip()) {
                return Err(Error::Io(io::Error::from(
                    io::ErrorKind::ConnectionRefused,
                )));
            }

            Ok(MemoryConnection {
                addr,
                closed: AtomicBool::new(false),
                keyspace: Mutex::new(None),
                error_handler,
            })
        }
        .boxed()
    }
}

/// Polls `condition` until it holds or about five seconds pass.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return true;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    condition().await
}
