//! This module contains the contracts a connection has to fulfill in order to be pooled.
//!
//! The pool never talks the wire protocol itself. A driver provides a [`CdrsTransport`]
//! implementation for its established, authenticated connections and reports runtime transport
//! failures back through the [`ConnectionErrorHandler`] it was given when the connection was
//! created.
use std::net::SocketAddr;

use crate::future::BoxFuture;
use crate::Error;
use crate::Result;

/// An established connection to a single node.
pub trait CdrsTransport: Send + Sync {
    /// Returns the number of request streams which are currently free on this connection.
    fn available_streams(&self) -> usize;

    /// Makes the given keyspace current for this connection.
    fn use_keyspace<'a>(&'a self, keyspace: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Closes the connection. When closing hits a transport error, the connection reports it to
    /// its error handler, which can call back into the owning pool.
    fn close(&self) -> Result<()>;

    /// Returns associated node address
    fn address(&self) -> SocketAddr;
}

/// Receives errors from established connections. A pool hands one to every connection it creates.
pub trait ConnectionErrorHandler<T>: Send + Sync {
    /// Called when `connection` hit `error`. `closed` tells if the connection is no longer usable.
    fn handle_error(&self, connection: &T, error: Error, closed: bool);
}
