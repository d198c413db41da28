//! The object registry: proxy and servant tables keyed by grain id (spec §4.4).

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use remoting_wire::{GrainId, IdAllocator};

use crate::error::RegistryError;
use crate::fingerprint::InterfaceFingerprint;
use crate::proxy::{EndpointHandle, Proxy};
use crate::servant::{Servant, Subject};
use crate::subject_host::SubjectHost;

/// Outcome of [`ObjectRegistry::get_or_create_proxy`]: when a servant for
/// `id` already lives on *this* endpoint, calling code should dispatch to it
/// directly rather than allocate a wire proxy that would just call back into
/// the same process (spec §4.4).
pub enum ProxyOrLocal {
    Proxy(Arc<Proxy>),
    LocalServant(Arc<Servant>),
}

struct Inner {
    servants: HashMap<GrainId, Arc<Servant>>,
    proxies: HashMap<GrainId, Arc<Proxy>>,
    /// Reverse index from a subject's pointer identity to its grain id, so
    /// `get_or_create_servant` can dedup by reference identity rather than
    /// value equality (spec §4.4).
    servant_identity: HashMap<usize, GrainId>,
}

/// Two maps guarded by a single read-write lock (spec §4.4, §5): `servants`
/// and `proxies`. A grain id never appears in both at once.
pub struct ObjectRegistry {
    ids: IdAllocator,
    inner: RwLock<Inner>,
    subject_host: Arc<SubjectHost>,
}

impl ObjectRegistry {
    /// Construct a registry with its [`SubjectHost`] already registered at
    /// the reserved [`GrainId::SUBJECT_HOST`] id.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(Self {
            ids: IdAllocator::new(),
            inner: RwLock::new(Inner {
                servants: HashMap::new(),
                proxies: HashMap::new(),
                servant_identity: HashMap::new(),
            }),
            subject_host: SubjectHost::new(),
        });

        registry.subject_host.attach(Arc::downgrade(&registry));
        let host_subject: Arc<dyn Subject> = registry.subject_host.clone() as Arc<dyn Subject>;
        registry
            .create_servant(
                GrainId::SUBJECT_HOST,
                InterfaceFingerprint::of_name("ISubjectHost"),
                host_subject,
            )
            .expect("subject host registers exactly once at construction");

        registry
    }

    #[must_use]
    pub fn subject_host(&self) -> &Arc<SubjectHost> {
        &self.subject_host
    }

    pub fn create_servant(
        &self,
        grain_id: GrainId,
        interface_fingerprint: InterfaceFingerprint,
        subject: Arc<dyn Subject>,
    ) -> Result<Arc<Servant>, RegistryError> {
        let mut inner = self.inner.write();
        if inner.servants.contains_key(&grain_id) || inner.proxies.contains_key(&grain_id) {
            return Err(RegistryError::DuplicateId(grain_id));
        }
        let servant = Arc::new(Servant::new(grain_id, interface_fingerprint, subject));
        inner.servant_identity.insert(servant.subject_identity(), grain_id);
        inner.servants.insert(grain_id, servant.clone());
        tracing::debug!(%grain_id, "servant registered");
        Ok(servant)
    }

    pub fn create_proxy(
        self: &Arc<Self>,
        grain_id: GrainId,
        interface_fingerprint: InterfaceFingerprint,
        endpoint: Weak<dyn EndpointHandle>,
    ) -> Result<Arc<Proxy>, RegistryError> {
        let mut inner = self.inner.write();
        if inner.servants.contains_key(&grain_id) || inner.proxies.contains_key(&grain_id) {
            return Err(RegistryError::DuplicateId(grain_id));
        }
        let proxy = Arc::new(Proxy::new(grain_id, interface_fingerprint, endpoint));
        inner.proxies.insert(grain_id, proxy.clone());
        tracing::debug!(%grain_id, "proxy registered");
        Ok(proxy)
    }

    /// Returns the existing proxy for `grain_id` if one exists; otherwise
    /// creates one. If a servant is already registered for `grain_id` on
    /// this endpoint, returns a servant-local pass-through handle instead of
    /// allocating a wire proxy (spec §4.4: "does not allocate a wire proxy").
    pub fn get_or_create_proxy(
        self: &Arc<Self>,
        grain_id: GrainId,
        interface_fingerprint: InterfaceFingerprint,
        endpoint: Weak<dyn EndpointHandle>,
    ) -> ProxyOrLocal {
        {
            let inner = self.inner.read();
            if let Some(servant) = inner.servants.get(&grain_id) {
                return ProxyOrLocal::LocalServant(servant.clone());
            }
            if let Some(proxy) = inner.proxies.get(&grain_id) {
                return ProxyOrLocal::Proxy(proxy.clone());
            }
        }

        let mut inner = self.inner.write();
        // Re-check under the write lock: another thread may have raced us.
        if let Some(servant) = inner.servants.get(&grain_id) {
            return ProxyOrLocal::LocalServant(servant.clone());
        }
        if let Some(proxy) = inner.proxies.get(&grain_id) {
            return ProxyOrLocal::Proxy(proxy.clone());
        }
        let proxy = Arc::new(Proxy::new(grain_id, interface_fingerprint, endpoint));
        inner.proxies.insert(grain_id, proxy.clone());
        ProxyOrLocal::Proxy(proxy)
    }

    /// Returns the existing servant for `subject` (keyed by reference
    /// identity) if one exists; otherwise allocates a fresh grain id and
    /// registers a new one.
    pub fn get_or_create_servant(
        &self,
        subject: Arc<dyn Subject>,
        interface_fingerprint: InterfaceFingerprint,
    ) -> Arc<Servant> {
        let identity = Arc::as_ptr(&subject).cast::<()>() as usize;
        {
            let inner = self.inner.read();
            if let Some(&grain_id) = inner.servant_identity.get(&identity) {
                return inner.servants[&grain_id].clone();
            }
        }

        let mut inner = self.inner.write();
        if let Some(&grain_id) = inner.servant_identity.get(&identity) {
            return inner.servants[&grain_id].clone();
        }
        let grain_id = self.ids.next_grain_id();
        let servant = Arc::new(Servant::new(grain_id, interface_fingerprint, subject));
        inner.servant_identity.insert(identity, grain_id);
        inner.servants.insert(grain_id, servant.clone());
        servant
    }

    /// Returns the raw subject for local use, crossing a by-reference
    /// boundary on decode when `ByReferenceHint::RetrieveSubject` applies.
    pub fn retrieve_subject(&self, grain_id: GrainId) -> Result<Arc<dyn Subject>, RegistryError> {
        let inner = self.inner.read();
        inner
            .servants
            .get(&grain_id)
            .map(|s| s.subject().clone())
            .ok_or(RegistryError::NoSuchServant(grain_id))
    }

    /// For incoming call dispatch.
    pub fn lookup_servant(&self, grain_id: GrainId) -> Result<Arc<Servant>, RegistryError> {
        let inner = self.inner.read();
        inner.servants.get(&grain_id).cloned().ok_or(RegistryError::NoSuchServant(grain_id))
    }

    /// Explicit deregistration. The grain id is removed from the table
    /// before the servant (and its subject) are dropped, satisfying "a
    /// servant is destroyed only after its grain id is removed from the
    /// table" — any dispatch that already holds its own `Arc<Servant>` clone
    /// completes normally, but no *new* lookup will find this id again.
    pub fn remove_servant(&self, grain_id: GrainId) -> Option<Arc<Servant>> {
        let mut inner = self.inner.write();
        let servant = inner.servants.remove(&grain_id)?;
        inner.servant_identity.remove(&servant.subject_identity());
        tracing::debug!(%grain_id, "servant deregistered");
        Some(servant)
    }

    pub fn remove_proxy(&self, grain_id: GrainId) -> Option<Arc<Proxy>> {
        self.inner.write().proxies.remove(&grain_id)
    }

    /// Test/diagnostic hook: true if `grain_id` names neither a servant nor
    /// a proxy. Used by the registry-uniqueness property test (spec §8).
    #[must_use]
    pub fn is_free(&self, grain_id: GrainId) -> bool {
        let inner = self.inner.read();
        !inner.servants.contains_key(&grain_id) && !inner.proxies.contains_key(&grain_id)
    }
}
