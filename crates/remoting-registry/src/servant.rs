//! Servants: the local side of a grain (spec §3, §4.4).

use remoting_wire::{GrainId, PayloadReader, PayloadWriter, ValueSerializer};

use crate::fingerprint::InterfaceFingerprint;

/// Failure dispatching a single method call against a [`Subject`].
#[derive(Debug)]
pub enum InvokeError {
    /// The interface declares no such method.
    NoSuchMethod(String),
    /// The method ran but raised a user exception the serializer *can*
    /// marshal back to the caller (spec §7 `RemoteException`).
    Remote(Box<dyn std::error::Error + Send + Sync>),
    /// The method raised a user exception the serializer could not marshal
    /// (spec §7 `UnserializableException`). The descriptor fields are
    /// filled in by the caller, since only the endpoint's exception
    /// marshaller knows what "could not marshal" means for a given type.
    Unserializable(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeError::NoSuchMethod(m) => write!(f, "no such method: {m}"),
            InvokeError::Remote(e) => write!(f, "remote exception: {e}"),
            InvokeError::Unserializable(e) => write!(f, "unserializable exception: {e}"),
        }
    }
}

impl std::error::Error for InvokeError {}

/// The user-supplied object a [`Servant`] wraps and exclusively owns for the
/// lifetime of its registration.
///
/// This is the narrow interpreter contract from spec.md §9 Design Notes,
/// option (b): rather than generating per-interface proxy/servant stubs at
/// compile time, a user (or a future derive macro) implements `invoke` by
/// hand, matching on `method_name` and reading/writing arguments through the
/// shared [`ValueSerializer`].
pub trait Subject: Send + Sync {
    fn invoke(
        &self,
        method_name: &str,
        serializer: &dyn ValueSerializer,
        reader: &mut PayloadReader<'_>,
        writer: &mut PayloadWriter,
    ) -> Result<(), InvokeError>;
}

/// Local side of a grain: owns the subject, exposes dispatch through
/// [`Servant::invoke`].
pub struct Servant {
    grain_id: GrainId,
    interface_fingerprint: InterfaceFingerprint,
    subject: std::sync::Arc<dyn Subject>,
}

impl Servant {
    pub(crate) fn new(
        grain_id: GrainId,
        interface_fingerprint: InterfaceFingerprint,
        subject: std::sync::Arc<dyn Subject>,
    ) -> Self {
        Self { grain_id, interface_fingerprint, subject }
    }

    #[must_use]
    pub fn grain_id(&self) -> GrainId {
        self.grain_id
    }

    #[must_use]
    pub fn interface_fingerprint(&self) -> InterfaceFingerprint {
        self.interface_fingerprint
    }

    #[must_use]
    pub fn subject(&self) -> &std::sync::Arc<dyn Subject> {
        &self.subject
    }

    /// The pointer identity of the wrapped subject, used by
    /// [`crate::registry::ObjectRegistry::get_or_create_servant`] to key on
    /// reference identity rather than value equality.
    pub(crate) fn subject_identity(&self) -> usize {
        std::sync::Arc::as_ptr(&self.subject).cast::<()>() as usize
    }

    pub fn invoke(
        &self,
        method_name: &str,
        serializer: &dyn ValueSerializer,
        reader: &mut PayloadReader<'_>,
        writer: &mut PayloadWriter,
    ) -> Result<(), InvokeError> {
        self.subject.invoke(method_name, serializer, reader, writer)
    }
}
