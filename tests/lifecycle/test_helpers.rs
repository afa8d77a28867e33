//! Shared fixtures for lifecycle BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use berth::test_support::{ManualClock, ScriptedBackend, ScriptedProbe, descriptor};
use berth::{LifecycleManager, MachineHandle, ManagerConfig, RetryPolicy, SupportedProviders};
use rstest::fixture;
use tokio_util::sync::CancellationToken;

use crate::test_constants::{SUPPORTED_PROVIDERS, TEST_PROVIDER};

pub type Manager = LifecycleManager<ScriptedBackend, ScriptedProbe>;

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub backend: ScriptedBackend,
    pub probe: ScriptedProbe,
    pub provider: String,
    pub cancel: CancellationToken,
    pub manager: Option<Arc<Manager>>,
    pub acquired: Option<AcquireResult>,
    pub last_release: Option<ReleaseResult>,
}

#[derive(Clone, Debug)]
pub enum AcquireResult {
    Success(MachineHandle),
    Failure(String),
}

#[derive(Clone, Debug)]
pub enum ReleaseResult {
    Released(Option<MachineHandle>),
    Failure(String),
}

impl LifecycleContext {
    /// Builds the manager on first use so earlier steps can reshape the
    /// doubles and provider.
    pub fn manager(&mut self) -> Result<Arc<Manager>, String> {
        if let Some(manager) = &self.manager {
            return Ok(Arc::clone(manager));
        }
        let config =
            ManagerConfig::new(descriptor(&self.provider)).with_retry_policy(instant_policy());
        let manager = LifecycleManager::new(
            config,
            &SupportedProviders::new(SUPPORTED_PROVIDERS),
            self.backend.clone(),
            self.probe.clone(),
        )
        .map_err(|err| err.to_string())?
        .with_cancellation(self.cancel.clone());
        let manager = Arc::new(manager);
        self.manager = Some(Arc::clone(&manager));
        Ok(manager)
    }
}

#[fixture]
pub fn lifecycle_context() -> LifecycleContext {
    LifecycleContext {
        backend: ScriptedBackend::new(),
        probe: ScriptedProbe::always(true),
        provider: TEST_PROVIDER.to_owned(),
        cancel: CancellationToken::new(),
        manager: None,
        acquired: None,
        last_release: None,
    }
}

/// 50 ms ceiling, 10 ms interval, driven by a manual clock.
fn instant_policy() -> RetryPolicy {
    let clock = Arc::new(ManualClock::new());
    RetryPolicy::new(Duration::from_millis(50), Duration::from_millis(10))
        .with_clock(clock.clone())
        .with_sleeper(clock)
}
