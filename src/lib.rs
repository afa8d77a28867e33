//! Lifecycle management for short-lived test machines.
//!
//! The crate provisions machines through a pluggable
//! [`ProvisioningBackend`], polls them with a [`ReachabilityProbe`] under a
//! bounded [`RetryPolicy`], and tracks every handle in a
//! [`MachineRegistry`] until the caller releases it (create → wait for
//! reachability → destroy).

pub mod backend;
pub mod config;
pub mod lifecycle;
pub mod machine;
pub mod probe;
pub mod provider;
pub mod registry;
pub mod retry;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;

pub use backend::{
    DescriptorError, MachineDescriptor, MachineDescriptorBuilder, ProvisionedNode,
    ProvisioningBackend,
};
pub use config::{ConfigError, LifecycleConfig};
pub use lifecycle::{LifecycleError, LifecycleManager, ManagerConfig, ReleaseSummary};
pub use machine::{MachineHandle, MachineStatus};
pub use probe::{ProbeError, ReachabilityProbe, TcpProbe};
pub use provider::SupportedProviders;
pub use registry::{MachineRegistry, RegistryError};
pub use retry::{Backoff, Clock, RetryPolicy, Sleeper, WaitOutcome};
