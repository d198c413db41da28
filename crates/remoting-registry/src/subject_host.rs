//! The `SubjectHost`: a servant registered at the reserved grain id that lets
//! a peer instantiate further servants by type name (spec §3, §4.4).

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use remoting_wire::{PayloadReader, PayloadWriter, ValueSerializer};

use crate::error::RegistryError;
use crate::fingerprint::InterfaceFingerprint;
use crate::registry::ObjectRegistry;
use crate::servant::{InvokeError, Subject};

type Factory = Box<dyn Fn() -> Arc<dyn Subject> + Send + Sync>;

/// Exposes one remote operation, `InstantiateByTypeName`, which looks up a
/// locally-registered factory by name, constructs a fresh subject, and
/// returns it to the caller as a new servant's grain id.
///
/// Real interface reflection (instantiating by an arbitrary implementation
/// type discovered at runtime) is out of scope here — the original relies on
/// managed-runtime reflection over assembly-qualified type names, which has
/// no idiomatic Rust equivalent. Callers register the type names they want
/// remotely constructible ahead of time via [`SubjectHost::register_factory`].
pub struct SubjectHost {
    factories: RwLock<HashMap<String, Factory>>,
    registry: RwLock<Option<Weak<ObjectRegistry>>>,
}

impl SubjectHost {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self { factories: RwLock::new(HashMap::new()), registry: RwLock::new(None) })
    }

    pub(crate) fn attach(&self, registry: Weak<ObjectRegistry>) {
        *self.registry.write() = Some(registry);
    }

    pub fn register_factory<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Subject> + Send + Sync + 'static,
    {
        self.factories.write().insert(type_name.into(), Box::new(factory));
    }

    pub fn create_instance(&self, type_name: &str) -> Result<Arc<dyn Subject>, RegistryError> {
        let factories = self.factories.read();
        let factory = factories
            .get(type_name)
            .ok_or_else(|| RegistryError::NoSuchSubjectType(type_name.to_owned()))?;
        Ok(factory())
    }
}

impl Subject for SubjectHost {
    fn invoke(
        &self,
        method_name: &str,
        serializer: &dyn ValueSerializer,
        reader: &mut PayloadReader<'_>,
        writer: &mut PayloadWriter,
    ) -> Result<(), InvokeError> {
        match method_name {
            "InstantiateByTypeName" => {
                let type_name = serializer
                    .read_string(reader)
                    .map_err(|e| InvokeError::Remote(Box::new(e)))?
                    .ok_or_else(|| {
                        InvokeError::Remote(Box::new(RegistryError::NoSuchSubjectType(String::new())))
                    })?;

                let subject = self
                    .create_instance(&type_name)
                    .map_err(|e| InvokeError::Remote(Box::new(e)))?;

                let registry = self
                    .registry
                    .read()
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .expect("subject host is always attached to its owning registry before use");

                let fingerprint = InterfaceFingerprint::of_name(&type_name);
                let servant = registry.get_or_create_servant(subject, fingerprint);

                serializer.write_u64(writer, servant.grain_id().0);
                serializer.write_u64(writer, fingerprint.0);
                Ok(())
            }
            other => Err(InvokeError::NoSuchMethod(other.to_owned())),
        }
    }
}
