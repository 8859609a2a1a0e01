use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

use crate::cluster::NodeState;

/// Membership information about a single node, as pushed by the topology source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostInfo {
    connect_address: IpAddr,
    port: u16,
    state: NodeState,
    host_id: Option<Uuid>,
    datacenter: String,
    rack: String,
}

impl HostInfo {
    /// Creates info about a node with unknown id and location. A port of 0 means the default port
    /// of the cluster pool should be used.
    pub fn new(connect_address: IpAddr, port: u16, state: NodeState) -> Self {
        HostInfo {
            connect_address,
            port,
            state,
            host_id: None,
            datacenter: Default::default(),
            rack: Default::default(),
        }
    }

    pub fn with_host_id(mut self, host_id: Uuid) -> Self {
        self.host_id = Some(host_id);
        self
    }

    pub fn with_location(mut self, datacenter: String, rack: String) -> Self {
        self.datacenter = datacenter;
        self.rack = rack;
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    /// The normalized address used to connect to the node. IPv4-mapped IPv6 addresses are
    /// converted to plain IPv4, so both forms identify the same node.
    #[inline]
    pub fn connect_address(&self) -> IpAddr {
        self.connect_address.to_canonical()
    }

    /// The node's port, or 0 if the default should be used.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Socket address to connect to, falling back to `default_port` when the node has none.
    #[inline]
    pub fn socket_address(&self, default_port: u16) -> SocketAddr {
        let port = if self.port == 0 {
            default_port
        } else {
            self.port
        };

        SocketAddr::new(self.connect_address(), port)
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.state == NodeState::Up
    }

    /// The host ID that is assigned to this node by Cassandra, if known.
    #[inline]
    pub fn host_id(&self) -> Option<Uuid> {
        self.host_id
    }

    #[inline]
    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    #[inline]
    pub fn rack(&self) -> &str {
        &self.rack
    }
}
