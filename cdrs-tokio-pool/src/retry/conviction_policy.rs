#[cfg(test)]
use mockall::automock;

use crate::cluster::HostInfo;
use crate::error::Error;

/// Decides if a node should be considered down after failing to establish a connection to it.
#[cfg_attr(test, automock)]
pub trait ConvictionPolicy {
    /// Called when connecting to `host` failed with `error`. Returns `true` if the node should be
    /// marked as down.
    fn add_failure(&self, error: &Error, host: &HostInfo) -> bool;

    /// Called when a node is known to be up again.
    fn reset(&self, host: &HostInfo);
}

/// Convicts a node on the first failure.
#[derive(Default, Copy, Clone, Debug, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct SimpleConvictionPolicy;

impl ConvictionPolicy for SimpleConvictionPolicy {
    fn add_failure(&self, _error: &Error, _host: &HostInfo) -> bool {
        true
    }

    fn reset(&self, _host: &HostInfo) {}
}

/// Never convicts nodes, leaving up/down decisions to topology events.
#[derive(Default, Copy, Clone, Debug, PartialEq, Ord, PartialOrd, Eq, Hash)]
pub struct NeverConvictionPolicy;

impl ConvictionPolicy for NeverConvictionPolicy {
    fn add_failure(&self, _error: &Error, _host: &HostInfo) -> bool {
        false
    }

    fn reset(&self, _host: &HostInfo) {}
}
