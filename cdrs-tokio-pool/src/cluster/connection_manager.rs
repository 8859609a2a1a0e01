use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;
use crate::future::BoxFuture;
use crate::transport::{CdrsTransport, ConnectionErrorHandler};

/// Manages establishing connections to nodes.
pub trait ConnectionManager<T: CdrsTransport>: Send + Sync {
    /// Tries to establish a new, ready to use connection to `addr`. Runtime errors of the
    /// connection need to be reported to `error_handler`. Called concurrently by the pools.
    fn connection(
        &self,
        error_handler: Arc<dyn ConnectionErrorHandler<T>>,
        addr: SocketAddr,
    ) -> BoxFuture<'_, Result<T>>;
}
