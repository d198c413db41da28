//! The bidirectional proxy/servant object registry (spec §3, §4.4).

pub mod error;
pub mod fingerprint;
pub mod proxy;
pub mod registry;
pub mod servant;
pub mod subject_host;

pub use error::RegistryError;
pub use fingerprint::InterfaceFingerprint;
pub use proxy::{EndpointHandle, Proxy};
pub use registry::{ObjectRegistry, ProxyOrLocal};
pub use servant::{InvokeError, Servant, Subject};
pub use subject_host::SubjectHost;
