//! Interface fingerprints.
//!
//! The runtime never inspects an interface's member list itself (runtime
//! code generation of proxy/servant stubs is out of scope, per spec.md §1) —
//! it only needs a cheap value to flag an obviously mismatched interface
//! between a proxy and the servant it is forwarding to. A fingerprint is
//! whatever the stub-generation layer (or, today, the caller) says it is;
//! we provide a convenience hash of the interface name as the common case.

use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceFingerprint(pub u64);

impl InterfaceFingerprint {
    /// A stable fingerprint derived from an interface name alone. Two
    /// independently-compiled stubs for the same interface name therefore
    /// agree without coordinating further, at the cost of not catching a
    /// member-list change under the same name — acceptable here since
    /// catching that is the stub generator's job, not the registry's.
    #[must_use]
    pub fn of_name(interface_name: &str) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        interface_name.hash(&mut hasher);
        Self(hasher.finish())
    }
}
