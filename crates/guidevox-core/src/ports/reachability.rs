//! Reachability port — "is the network currently usable".

/// Boolean network-usability signal, consulted only by prefetching to skip
/// attempts that cannot succeed. Implementations should answer cheaply from
/// cached platform state, not probe the network.
pub trait ReachabilityPort: Send + Sync {
    /// Whether the network is currently usable.
    fn is_reachable(&self) -> bool;
}

/// Reachability that always answers "online"; useful where no platform
/// signal exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl ReachabilityPort for AlwaysReachable {
    fn is_reachable(&self) -> bool {
        true
    }
}
