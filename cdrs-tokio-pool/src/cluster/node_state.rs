use derive_more::Display;

/// The state of a node, as reported by the membership source.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Default)]
pub enum NodeState {
    /// No status information has been received about the node yet. Such nodes are not given a
    /// connection pool during reconciliation.
    #[default]
    Unknown,
    /// The node is considered reachable and should have a connection pool.
    Up,
    /// The node is considered unreachable. Its connection pool, if any, is closed.
    Down,
}
