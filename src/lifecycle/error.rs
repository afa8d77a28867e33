//! Error types for the lifecycle manager.

use std::time::Duration;

use thiserror::Error;

use crate::probe::ProbeError;
use crate::registry::RegistryError;

/// Errors surfaced by [`crate::LifecycleManager`].
///
/// Messages name the operation, machine id and provider. Credential
/// references never appear.
#[derive(Debug, Error)]
pub enum LifecycleError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised at construction when the provider is not in the supported set.
    #[error("provider {provider} is not supported; supported providers: {}", .supported.join(", "))]
    UnsupportedProvider {
        /// Requested provider identifier.
        provider: String,
        /// Identifiers the caller declared as supported.
        supported: Vec<String>,
    },
    /// Raised when the backend fails to create a node.
    #[error("failed to create machine with provider {provider}: {source}")]
    Provisioning {
        /// Provider identifier.
        provider: String,
        /// Backend diagnostic.
        #[source]
        source: BackendError,
    },
    /// Raised when the backend does not finish creating a node in time.
    #[error("provider {provider} did not create a machine within {timeout:?}")]
    CreationTimedOut {
        /// Provider identifier.
        provider: String,
        /// Configured creation timeout.
        timeout: Duration,
    },
    /// Raised when opening inbound ports fails. The machine stays registered.
    #[error("failed to authorize inbound ports on machine {id}: {source}")]
    PortAuthorization {
        /// Machine identifier.
        id: String,
        /// Backend diagnostic.
        #[source]
        source: BackendError,
    },
    /// Raised when the registry rejects an operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Raised when the reachability probe cannot check the machine.
    #[error("reachability probe failed for machine {id}: {source}")]
    Probe {
        /// Machine identifier.
        id: String,
        /// Probe diagnostic.
        #[source]
        source: ProbeError,
    },
    /// Raised when the reachability wait was cancelled. The machine stays
    /// registered as unreachable.
    #[error("reachability wait for machine {id} was cancelled after {attempts} attempts")]
    Cancelled {
        /// Machine identifier.
        id: String,
        /// Probe attempts completed before cancellation.
        attempts: u32,
    },
    /// Raised when the backend fails to destroy a node. The machine stays
    /// registered so release can be retried.
    #[error("failed to destroy machine {id} with provider {provider}: {source}")]
    Destroy {
        /// Machine identifier.
        id: String,
        /// Provider identifier.
        provider: String,
        /// Backend diagnostic.
        #[source]
        source: BackendError,
    },
}
