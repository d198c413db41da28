//! Registry-level error kinds (spec §4.4, §7).

use remoting_wire::GrainId;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("grain id {0} is already registered")]
    DuplicateId(GrainId),

    #[error("no servant is registered for grain id {0}")]
    NoSuchServant(GrainId),

    #[error("no subject factory named {0:?} is registered on the subject host")]
    NoSuchSubjectType(String),
}
