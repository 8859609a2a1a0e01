use std::io;
use std::net::SocketAddr;
use std::result;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Pool error type. Errors come either from establishing a connection (dialing or setting it up)
/// or from the pool's own instrumentation. Operations on a closed pool are never errors.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Transport level IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// General error
    #[error("General error: {0}")]
    General(String),
    /// Timed out waiting for an operation to complete.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Error returned by a node, e.g. when selecting a keyspace.
    #[error("Server {addr} error: {message}")]
    Server { addr: SocketAddr, message: String },
    /// Instrumentation error.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Checks if the error happened on the network level, while dialing or talking to a node.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout(_))
    }

    /// Checks if the error is a transient network condition, which might go away when trying
    /// again. Errors which are not network errors are never temporary.
    pub fn is_temporary(&self) -> bool {
        match self {
            Error::Io(error) => matches!(
                error.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            Error::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}
