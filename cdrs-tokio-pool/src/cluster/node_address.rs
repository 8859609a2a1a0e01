use derive_more::Display;
use std::net::SocketAddr;
use tokio::net::lookup_host;

use crate::error::Result;

/// Representation of a seed endpoint. Can be a direct socket address or a hostname. In the latter
/// case, the host can be resolved to multiple addresses.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeAddress {
    Direct(SocketAddr),
    Hostname(String),
}

impl NodeAddress {
    /// Resolves the endpoint to all socket addresses it stands for.
    pub async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        match self {
            NodeAddress::Direct(addr) => Ok(vec![*addr]),
            NodeAddress::Hostname(hostname) => lookup_host(hostname.as_str())
                .await
                .map(|addrs| addrs.collect())
                .map_err(Into::into),
        }
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        NodeAddress::Direct(addr)
    }
}

impl From<String> for NodeAddress {
    fn from(value: String) -> Self {
        NodeAddress::Hostname(value)
    }
}

impl From<&str> for NodeAddress {
    fn from(value: &str) -> Self {
        NodeAddress::Hostname(value.to_string())
    }
}
