use fxhash::FxHashSet;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cluster::ConnectionManager;
use crate::error::{Error, Result};
use crate::future::BoxFuture;
use crate::transport::{CdrsTransport, ConnectionErrorHandler};

pub(crate) const DEFAULT_STREAMS: usize = 128;

/// In-memory connection which can be broken on demand.
pub(crate) struct FakeTransport {
    addr: SocketAddr,
    available_streams: AtomicUsize,
    closed: AtomicBool,
    fail_keyspace: bool,
    report_close: bool,
    keyspace: Mutex<Option<String>>,
    error_handler: Arc<dyn ConnectionErrorHandler<FakeTransport>>,
}

impl FakeTransport {
    pub(crate) fn set_available_streams(&self, streams: usize) {
        self.available_streams.store(streams, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn keyspace(&self) -> Option<String> {
        self.keyspace.lock().clone()
    }

    /// Simulates a transport failure which kills the connection.
    pub(crate) fn break_connection(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.error_handler.handle_error(
            self,
            Error::Io(io::Error::from(io::ErrorKind::ConnectionReset)),
            true,
        );
    }

    /// Simulates a request level failure which leaves the connection usable.
    pub(crate) fn report_recoverable_error(&self) {
        self.error_handler
            .handle_error(self, Error::General("stream error".into()), false);
    }
}

impl CdrsTransport for FakeTransport {
    fn available_streams(&self) -> usize {
        self.available_streams.load(Ordering::SeqCst)
    }

    fn use_keyspace<'a>(&'a self, keyspace: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            if self.fail_keyspace {
                return Err(Error::Server {
                    addr: self.addr,
                    message: format!("Keyspace '{keyspace}' does not exist"),
                });
            }

            *self.keyspace.lock() = Some(keyspace.to_string());
            Ok(())
        }
        .boxed()
    }

    fn close(&self) -> Result<()> {
        let was_closed = self.closed.swap(true, Ordering::SeqCst);
        if self.report_close && !was_closed {
            // reports back into the owning pool while it's closing
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
struct FakeState {
    attempts: AtomicUsize,
    failures: Mutex<VecDeque<io::ErrorKind>>,
    unreachable: Mutex<FxHashSet<IpAddr>>,
    fail_keyspace: AtomicBool,
    report_close: AtomicBool,
    dial_delay: Mutex<Option<Duration>>,
}

/// Connection manager with scriptable failures. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct FakeConnectionManager {
    state: Arc<FakeState>,
}

impl FakeConnectionManager {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    /// Makes the next dials fail with given errors, in order.
    pub(crate) fn fail_next(&self, kinds: impl IntoIterator<Item = io::ErrorKind>) {
        self.state.failures.lock().extend(kinds);
    }

    /// Makes every dial to given address fail with a refused connection.
    pub(crate) fn set_unreachable(&self, address: IpAddr, unreachable: bool) {
        let mut addresses = self.state.unreachable.lock();
        if unreachable {
            addresses.insert(address);
        } else {
            addresses.remove(&address);
        }
    }

    pub(crate) fn fail_keyspace(&self) {
        self.state.fail_keyspace.store(true, Ordering::SeqCst);
    }

    /// Makes closing connections report a transport error to their error handler, as a real
    /// connection does when its socket fails during shutdown.
    pub(crate) fn report_errors_on_close(&self) {
        self.state.report_close.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_dial_delay(&self, delay: Duration) {
        *self.state.dial_delay.lock() = Some(delay);
    }

    pub(crate) fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }
}

impl ConnectionManager<FakeTransport> for FakeConnectionManager {
    fn connection(
        &self,
        error_handler: Arc<dyn ConnectionErrorHandler<FakeTransport>>,
        addr: SocketAddr,
    ) -> BoxFuture<'_, Result<FakeTransport>> {
        async move {
            self.state.attempts.fetch_add(1, Ordering::SeqCst);

            let dial_delay = *self.state.dial_delay.lock();
            match dial_delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }

            if self.state.unreachable.lock().contains(&addr.ip()) {
                return Err(Error::Io(io::Error::from(io::ErrorKind::ConnectionRefused)));
            }

            let failure = self.state.failures.lock().pop_front();
            if let Some(kind) = failure {
                return Err(Error::Io(io::Error::from(kind)));
            }

            Ok(FakeTransport {
                addr,
                available_streams: AtomicUsize::new(DEFAULT_STREAMS),
                closed: AtomicBool::new(false),
                fail_keyspace: self.state.fail_keyspace.load(Ordering::SeqCst),
                report_close: self.state.report_close.load(Ordering::SeqCst),
                keyspace: Mutex::new(None),
                error_handler,
            })
        }
        .boxed()
    }
}

/// Polls `condition` until it holds or a generous deadline passes.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    condition()
}
