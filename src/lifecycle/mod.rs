//! Machine lifecycle orchestration.
//!
//! [`LifecycleManager`] drives a [`ProvisioningBackend`] and a
//! [`ReachabilityProbe`], keeping every machine it creates in a
//! [`MachineRegistry`] until the caller releases it:
//!
//! - `acquire` creates a node, registers it as `Provisioning`, runs the
//!   port-authorisation hook, then polls reachability under the configured
//!   [`RetryPolicy`]. Exhausting the budget is not an error: the handle is
//!   returned as `Unreachable` and stays registered.
//! - `acquire_or_reuse` returns a registered machine untouched, or falls
//!   back to `acquire`. The fallback keeps the backend-assigned id, so id
//!   affinity is best effort only.
//! - `release` destroys then unregisters. Unknown ids are a no-op; a failed
//!   destroy keeps the handle so the release can be retried.
//!
//! Two concurrent `acquire_or_reuse` calls for the same absent id both
//! provision. The manager adds no single-flight coordination.

use std::time::{Duration, SystemTime};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{MachineDescriptor, ProvisionedNode, ProvisioningBackend};
use crate::machine::{MachineHandle, MachineStatus};
use crate::probe::ReachabilityProbe;
use crate::provider::SupportedProviders;
use crate::registry::MachineRegistry;
use crate::retry::{RetryPolicy, WaitOutcome};

mod error;

pub use error::LifecycleError;

/// Login user assumed when the backend does not report one.
pub const DEFAULT_USER: &str = "root";
/// Port probed for reachability.
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Upper bound for a single backend create call.
pub const DEFAULT_CREATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Construction-time settings for a [`LifecycleManager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    descriptor: MachineDescriptor,
    retry_policy: RetryPolicy,
    default_user: String,
    ssh_port: u16,
    creation_timeout: Duration,
}

impl ManagerConfig {
    /// Creates a configuration with default timings for `descriptor`.
    #[must_use]
    pub fn new(descriptor: MachineDescriptor) -> Self {
        Self {
            descriptor,
            retry_policy: RetryPolicy::default(),
            default_user: DEFAULT_USER.to_owned(),
            ssh_port: DEFAULT_SSH_PORT,
            creation_timeout: DEFAULT_CREATION_TIMEOUT,
        }
    }

    /// Overrides the reachability retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Overrides the fallback login user.
    #[must_use]
    pub fn with_default_user(mut self, user: impl Into<String>) -> Self {
        self.default_user = user.into();
        self
    }

    /// Overrides the port probed for reachability.
    #[must_use]
    pub const fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Overrides the create timeout.
    #[must_use]
    pub const fn with_creation_timeout(mut self, creation_timeout: Duration) -> Self {
        self.creation_timeout = creation_timeout;
        self
    }

    /// Descriptor used for every create.
    #[must_use]
    pub const fn descriptor(&self) -> &MachineDescriptor {
        &self.descriptor
    }

    /// Reachability retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Fallback login user.
    #[must_use]
    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    /// Port probed for reachability.
    #[must_use]
    pub const fn ssh_port(&self) -> u16 {
        self.ssh_port
    }

    /// Create timeout.
    #[must_use]
    pub const fn creation_timeout(&self) -> Duration {
        self.creation_timeout
    }
}

/// Result of [`LifecycleManager::release_all`].
#[derive(Debug)]
pub struct ReleaseSummary<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Ids destroyed and unregistered.
    pub released: Vec<String>,
    /// Releases that failed; those machines remain registered.
    pub failures: Vec<LifecycleError<BackendError>>,
}

impl<BackendError> ReleaseSummary<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Returns `true` when every release succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Provisions, tracks and releases machines through injected collaborators.
#[derive(Debug)]
pub struct LifecycleManager<B, P> {
    config: ManagerConfig,
    backend: B,
    probe: P,
    registry: MachineRegistry,
    cancel: CancellationToken,
}

impl<B, P> LifecycleManager<B, P>
where
    B: ProvisioningBackend,
    P: ReachabilityProbe,
{
    /// Creates a manager for the descriptor's provider.
    ///
    /// No backend call is made here.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnsupportedProvider`] when the descriptor's
    /// provider is not in `supported`.
    pub fn new(
        config: ManagerConfig,
        supported: &SupportedProviders,
        backend: B,
        probe: P,
    ) -> Result<Self, LifecycleError<B::Error>> {
        let provider = &config.descriptor.provider;
        if !supported.contains(provider) {
            return Err(LifecycleError::UnsupportedProvider {
                provider: provider.clone(),
                supported: supported.to_vec(),
            });
        }
        info!(
            provider = %provider,
            group = %config.descriptor.group,
            "lifecycle manager created"
        );
        Ok(Self {
            config,
            backend,
            probe,
            registry: MachineRegistry::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the token that cancels reachability waits.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels reachability waits. Cancellation is terminal: every
    /// later wait ends immediately.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels in-flight and future reachability waits.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Construction-time settings.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Descriptor used for every create.
    #[must_use]
    pub const fn descriptor(&self) -> &MachineDescriptor {
        &self.config.descriptor
    }

    /// Registry of machines created by this manager.
    #[must_use]
    pub const fn registry(&self) -> &MachineRegistry {
        &self.registry
    }

    /// Returns the registered handle for `id`, if any.
    #[must_use]
    pub fn machine(&self, id: &str) -> Option<MachineHandle> {
        self.registry.get(id).ok()
    }

    /// Every registered handle, ordered by id.
    #[must_use]
    pub fn machines(&self) -> Vec<MachineHandle> {
        self.registry.snapshot()
    }

    /// Provisions a new machine and waits for it to become reachable.
    ///
    /// The returned handle is `Ready`, or `Unreachable` when the retry
    /// budget ran out. Either way it is registered, unless a concurrent
    /// [`Self::release`] removed it during the wait; the handle is then
    /// returned marked `Destroyed`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Provisioning`] or
    /// [`LifecycleError::CreationTimedOut`] when the backend does not produce
    /// a node, [`LifecycleError::Registry`] when the backend id is already
    /// registered, [`LifecycleError::PortAuthorization`] when the hook fails,
    /// and [`LifecycleError::Probe`] or [`LifecycleError::Cancelled`] when
    /// the wait ends abnormally.
    pub async fn acquire(&self) -> Result<MachineHandle, LifecycleError<B::Error>> {
        let descriptor = &self.config.descriptor;
        info!(
            provider = %descriptor.provider,
            group = %descriptor.group,
            "provisioning machine"
        );

        let node = self.create_node().await?;
        info!(
            id = %node.id,
            public_address = %node.public_address,
            private_address = ?node.private_address,
            "machine created"
        );

        let handle = MachineHandle::provisioning(
            node,
            &self.config.default_user,
            self.config.ssh_port,
            SystemTime::now(),
        );
        self.registry.put(handle.clone())?;

        self.backend
            .authorize_ports(&handle, &descriptor.inbound_ports)
            .await
            .map_err(|source| LifecycleError::PortAuthorization {
                id: handle.id.clone(),
                source,
            })?;

        self.await_reachable(&handle).await
    }

    /// Returns the machine registered under `id`, or provisions a new one.
    ///
    /// A registered machine is returned as-is, without a reachability check.
    /// A new machine keeps the id the backend assigns, which generally
    /// differs from `id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::acquire`] when provisioning.
    pub async fn acquire_or_reuse(
        &self,
        id: &str,
    ) -> Result<MachineHandle, LifecycleError<B::Error>> {
        if let Ok(handle) = self.registry.get(id) {
            debug!(id, status = %handle.status, "reusing registered machine");
            return Ok(handle);
        }
        info!(id, "machine not registered; provisioning a replacement");
        self.acquire().await
    }

    /// Destroys and unregisters the machine. Unknown ids are a no-op.
    ///
    /// Returns the removed handle marked `Destroyed`, or `None` when nothing
    /// was registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Destroy`] when the backend fails; the
    /// handle then remains registered.
    pub async fn release(
        &self,
        id: &str,
    ) -> Result<Option<MachineHandle>, LifecycleError<B::Error>> {
        if !self.registry.contains(id) {
            debug!(id, "release of unregistered machine ignored");
            return Ok(None);
        }

        let provider = &self.config.descriptor.provider;
        if let Err(source) = self.backend.destroy(id).await {
            warn!(id, provider = %provider, error = %source, "destroy failed; machine kept");
            return Err(LifecycleError::Destroy {
                id: id.to_owned(),
                provider: provider.clone(),
                source,
            });
        }

        let Ok(mut handle) = self.registry.remove(id) else {
            debug!(id, "machine already unregistered by a concurrent release");
            return Ok(None);
        };
        handle.status = MachineStatus::Destroyed;
        info!(id, provider = %provider, "machine released");
        Ok(Some(handle))
    }

    /// Releases every registered machine, continuing past failures.
    pub async fn release_all(&self) -> ReleaseSummary<B::Error> {
        let mut summary = ReleaseSummary {
            released: Vec::new(),
            failures: Vec::new(),
        };
        for id in self.registry.ids() {
            match self.release(&id).await {
                Ok(Some(_)) => summary.released.push(id),
                Ok(None) => {}
                Err(err) => summary.failures.push(err),
            }
        }
        summary
    }

    async fn create_node(&self) -> Result<ProvisionedNode, LifecycleError<B::Error>> {
        let descriptor = &self.config.descriptor;
        let creation_timeout = self.config.creation_timeout;
        match timeout(creation_timeout, self.backend.create(descriptor)).await {
            Ok(Ok(node)) => Ok(node),
            Ok(Err(source)) => Err(LifecycleError::Provisioning {
                provider: descriptor.provider.clone(),
                source,
            }),
            Err(_) => Err(LifecycleError::CreationTimedOut {
                provider: descriptor.provider.clone(),
                timeout: creation_timeout,
            }),
        }
    }

    async fn await_reachable(
        &self,
        handle: &MachineHandle,
    ) -> Result<MachineHandle, LifecycleError<B::Error>> {
        let probe = &self.probe;
        let outcome = self
            .config
            .retry_policy
            .wait(&self.cancel, || probe.check(handle))
            .await;

        match outcome {
            Ok(WaitOutcome::Success { attempts }) => {
                info!(id = %handle.id, attempts, "machine reachable");
                Ok(self.record_status(handle, MachineStatus::Ready))
            }
            Ok(WaitOutcome::TimedOut { attempts, elapsed }) => {
                warn!(
                    id = %handle.id,
                    attempts,
                    elapsed = ?elapsed,
                    "machine not reachable within retry budget"
                );
                Ok(self.record_status(handle, MachineStatus::Unreachable))
            }
            Ok(WaitOutcome::Cancelled { attempts }) => {
                warn!(id = %handle.id, attempts, "reachability wait cancelled");
                self.record_status(handle, MachineStatus::Unreachable);
                Err(LifecycleError::Cancelled {
                    id: handle.id.clone(),
                    attempts,
                })
            }
            Err(source) => {
                warn!(id = %handle.id, error = %source, "reachability probe failed");
                self.record_status(handle, MachineStatus::Unreachable);
                Err(LifecycleError::Probe {
                    id: handle.id.clone(),
                    source,
                })
            }
        }
    }

    /// Stores the wait's verdict. A handle released mid-wait comes back
    /// marked `Destroyed`.
    fn record_status(&self, handle: &MachineHandle, status: MachineStatus) -> MachineHandle {
        self.registry
            .set_status(&handle.id, status)
            .unwrap_or_else(|err| {
                debug!(id = %handle.id, error = %err, "machine released before wait finished");
                MachineHandle {
                    status: MachineStatus::Destroyed,
                    ..handle.clone()
                }
            })
    }
}
