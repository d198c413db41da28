//! Grain and RPC identifiers.

/// A 64-bit id naming a remotely addressable object (a "grain").
///
/// Two values are reserved and never allocated to user code: [`GrainId::SUBJECT_HOST`]
/// and [`GrainId::HEARTBEAT`]. User-allocated ids start at `SUBJECT_HOST + 1` and
/// increment monotonically per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrainId(pub u64);

impl GrainId {
    /// The id of the built-in servant that lets a peer instantiate further servants.
    pub const SUBJECT_HOST: GrainId = GrainId(u64::MAX);
    /// The id of the built-in heartbeat servant.
    pub const HEARTBEAT: GrainId = GrainId(u64::MAX - 1);

    /// The first id available for user allocation.
    pub const FIRST_USER_ID: GrainId = GrainId(u64::MAX - 2);

    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::SUBJECT_HOST.0 || self.0 == Self::HEARTBEAT.0
    }
}

impl std::fmt::Display for GrainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "grain#{}", self.0)
    }
}

/// Monotonically increasing per-endpoint identifier for one outstanding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RpcId(pub i64);

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rpc#{}", self.0)
    }
}

/// Per-endpoint allocator handing out strictly increasing [`GrainId`]s and [`RpcId`]s.
///
/// Grain ids count *down* from [`GrainId::FIRST_USER_ID`] so that the reserved high ids
/// never collide with user allocations regardless of how many grains an endpoint creates
/// in its lifetime; rpc ids count up from zero, matching the wire contract ("monotonic
/// per-endpoint", not "globally unique").
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_grain: std::sync::atomic::AtomicU64,
    next_rpc: std::sync::atomic::AtomicI64,
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_grain: std::sync::atomic::AtomicU64::new(GrainId::FIRST_USER_ID.0),
            next_rpc: std::sync::atomic::AtomicI64::new(0),
        }
    }

    pub fn next_grain_id(&self) -> GrainId {
        use std::sync::atomic::Ordering;
        GrainId(self.next_grain.fetch_sub(1, Ordering::Relaxed))
    }

    pub fn next_rpc_id(&self) -> RpcId {
        use std::sync::atomic::Ordering;
        RpcId(self.next_rpc.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ids_are_not_user_allocatable() {
        assert!(GrainId::SUBJECT_HOST.is_reserved());
        assert!(GrainId::HEARTBEAT.is_reserved());
        assert!(!GrainId::FIRST_USER_ID.is_reserved());
    }

    #[test]
    fn rpc_ids_are_strictly_increasing() {
        let alloc = IdAllocator::new();
        let ids: Vec<_> = (0..100).map(|_| alloc.next_rpc_id().0).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted, "ids must be emitted in increasing order");
        assert_eq!(ids.iter().collect::<std::collections::HashSet<_>>().len(), 100);
    }

    #[test]
    fn grain_ids_never_collide_with_reserved_ids() {
        let alloc = IdAllocator::new();
        for _ in 0..1000 {
            let id = alloc.next_grain_id();
            assert!(!id.is_reserved());
        }
    }
}
