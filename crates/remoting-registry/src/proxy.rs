//! Proxies: remote-facing handles that forward calls as RPCs (spec §3, §9).

use std::sync::Weak;

use remoting_wire::GrainId;

use crate::fingerprint::InterfaceFingerprint;

/// A weak back-reference from a [`Proxy`] to the endpoint that created it.
///
/// Modelled as a handle-and-lookup trait (spec.md §9 Design Notes), not a
/// raw pointer, so a proxy that outlives its endpoint observes that fact
/// cleanly instead of dereferencing stale state.
pub trait EndpointHandle: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Remote-facing handle for one grain. Inert without a live endpoint.
pub struct Proxy {
    grain_id: GrainId,
    interface_fingerprint: InterfaceFingerprint,
    endpoint: Weak<dyn EndpointHandle>,
}

impl Proxy {
    pub(crate) fn new(
        grain_id: GrainId,
        interface_fingerprint: InterfaceFingerprint,
        endpoint: Weak<dyn EndpointHandle>,
    ) -> Self {
        Self { grain_id, interface_fingerprint, endpoint }
    }

    #[must_use]
    pub fn grain_id(&self) -> GrainId {
        self.grain_id
    }

    #[must_use]
    pub fn interface_fingerprint(&self) -> InterfaceFingerprint {
        self.interface_fingerprint
    }

    /// `false` once the owning endpoint has been dropped or has disconnected.
    /// Callers invoking through a disconnected proxy must fail with
    /// `NotConnected` rather than attempt to dereference anything further.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.endpoint.upgrade().is_some_and(|e| e.is_connected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysConnected;
    impl EndpointHandle for AlwaysConnected {
        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn proxy_reports_disconnected_once_endpoint_is_dropped() {
        let endpoint = std::sync::Arc::new(AlwaysConnected);
        let weak: Weak<dyn EndpointHandle> = std::sync::Arc::downgrade(&endpoint) as Weak<dyn EndpointHandle>;
        let proxy = Proxy::new(GrainId(1), InterfaceFingerprint::of_name("ITest"), weak);
        assert!(proxy.is_connected());

        drop(endpoint);
        assert!(!proxy.is_connected());
    }
}
