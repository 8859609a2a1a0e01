mod conviction_policy;
mod reconnection_policy;

pub use conviction_policy::*;
pub use reconnection_policy::*;
