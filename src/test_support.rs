//! Test doubles shared across unit and integration tests.
//!
//! [`ScriptedBackend`] and [`ScriptedProbe`] record every call and replay
//! pre-seeded outcomes; [`ManualClock`] is both a [`Clock`] and a
//! [`Sleeper`] whose sleeps advance time instantly.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::{BackendFuture, MachineDescriptor, ProvisionedNode, ProvisioningBackend};
use crate::machine::MachineHandle;
use crate::probe::{ProbeError, ProbeFuture, ReachabilityProbe};
use crate::retry::{Clock, SleepFuture, Sleeper};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a valid descriptor for `provider` without going through the
/// builder.
#[must_use]
pub fn descriptor(provider: &str) -> MachineDescriptor {
    MachineDescriptor {
        provider: provider.to_owned(),
        image: String::from("ubuntu-24.04"),
        credential_ref: String::from("TEST_CREDENTIAL"),
        inbound_ports: vec![22, 8080],
        group: String::from("berth-test"),
    }
}

/// Errors produced by [`ScriptedBackend`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedBackendError {
    /// Scripted create failure.
    #[error("create failure")]
    Create,
    /// Scripted destroy failure.
    #[error("destroy failure")]
    Destroy,
    /// Scripted port authorisation failure.
    #[error("authorize failure")]
    Authorize,
}

#[derive(Debug, Default)]
struct BackendState {
    next_ids: VecDeque<String>,
    public_address: Option<IpAddr>,
    create_delay: Option<Duration>,
    fail_on_create: bool,
    fail_on_destroy: bool,
    fail_on_authorize: bool,
    create_calls: u32,
    destroyed: Vec<String>,
    authorized: Vec<(String, Vec<u16>)>,
}

/// Backend double that records calls and fails on demand.
#[derive(Clone, Debug, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    /// Creates a backend that succeeds at everything and assigns random ids.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues ids handed out by subsequent creates, in order.
    pub fn push_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.state)
            .next_ids
            .extend(ids.into_iter().map(Into::into));
    }

    /// Reports `address` as the public address of created nodes.
    pub fn set_public_address(&self, address: IpAddr) {
        lock(&self.state).public_address = Some(address);
    }

    /// Delays every create by `delay`.
    pub fn set_create_delay(&self, delay: Duration) {
        lock(&self.state).create_delay = Some(delay);
    }

    /// Makes creates fail.
    pub fn fail_on_create(&self) {
        lock(&self.state).fail_on_create = true;
    }

    /// Makes destroys fail until [`Self::heal_destroy`] is called.
    pub fn fail_on_destroy(&self) {
        lock(&self.state).fail_on_destroy = true;
    }

    /// Lets destroys succeed again.
    pub fn heal_destroy(&self) {
        lock(&self.state).fail_on_destroy = false;
    }

    /// Makes port authorisation fail.
    pub fn fail_on_authorize(&self) {
        lock(&self.state).fail_on_authorize = true;
    }

    /// Number of create calls made so far.
    #[must_use]
    pub fn create_calls(&self) -> u32 {
        lock(&self.state).create_calls
    }

    /// Ids passed to successful destroys, in order.
    #[must_use]
    pub fn destroyed(&self) -> Vec<String> {
        lock(&self.state).destroyed.clone()
    }

    /// Machine ids and port lists passed to port authorisation.
    #[must_use]
    pub fn authorized(&self) -> Vec<(String, Vec<u16>)> {
        lock(&self.state).authorized.clone()
    }
}

impl ProvisioningBackend for ScriptedBackend {
    type Error = ScriptedBackendError;

    fn create<'a>(
        &'a self,
        _descriptor: &'a MachineDescriptor,
    ) -> BackendFuture<'a, ProvisionedNode, Self::Error> {
        Box::pin(async move {
            let delay = {
                let mut state = lock(&self.state);
                state.create_calls = state.create_calls.saturating_add(1);
                state.create_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = lock(&self.state);
            if state.fail_on_create {
                return Err(ScriptedBackendError::Create);
            }
            let id = state
                .next_ids
                .pop_front()
                .unwrap_or_else(|| format!("node-{}", Uuid::new_v4()));
            Ok(ProvisionedNode {
                id,
                user: None,
                public_address: state
                    .public_address
                    .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                private_address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            })
        })
    }

    fn destroy<'a>(&'a self, id: &'a str) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if state.fail_on_destroy {
                return Err(ScriptedBackendError::Destroy);
            }
            state.destroyed.push(id.to_owned());
            Ok(())
        })
    }

    fn authorize_ports<'a>(
        &'a self,
        handle: &'a MachineHandle,
        ports: &'a [u16],
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if state.fail_on_authorize {
                return Err(ScriptedBackendError::Authorize);
            }
            state.authorized.push((handle.id.clone(), ports.to_vec()));
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    responses: VecDeque<Result<bool, ProbeError>>,
    fallback: bool,
    calls: u32,
    delay: Duration,
    cancel_on_call: Option<(u32, CancellationToken)>,
}

/// Probe double that replays queued answers, then a fallback answer.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ScriptedProbe {
    /// Creates a probe that always reports `reachable` once its queue is
    /// empty.
    #[must_use]
    pub fn always(reachable: bool) -> Self {
        let probe = Self::default();
        lock(&probe.state).fallback = reachable;
        probe
    }

    /// Queues answers consumed before the fallback applies.
    pub fn push_answers(&self, answers: impl IntoIterator<Item = bool>) {
        lock(&self.state)
            .responses
            .extend(answers.into_iter().map(Ok));
    }

    /// Queues a probe error.
    pub fn push_error(&self, error: ProbeError) {
        lock(&self.state).responses.push_back(Err(error));
    }

    /// Makes every check sleep for `delay` (real time) before answering.
    pub fn set_delay(&self, delay: Duration) {
        lock(&self.state).delay = delay;
    }

    /// Cancels `token` during the `call`-th check (1-based).
    pub fn cancel_on_call(&self, call: u32, token: CancellationToken) {
        lock(&self.state).cancel_on_call = Some((call, token));
    }

    /// Number of checks made so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        lock(&self.state).calls
    }
}

impl ReachabilityProbe for ScriptedProbe {
    fn check<'a>(&'a self, _handle: &'a MachineHandle) -> ProbeFuture<'a> {
        Box::pin(async move {
            let (answer, delay) = {
                let mut state = lock(&self.state);
                state.calls = state.calls.saturating_add(1);
                if let Some((call, token)) = &state.cancel_on_call {
                    if *call == state.calls {
                        token.cancel();
                    }
                }
                let fallback = state.fallback;
                let answer = state.responses.pop_front().unwrap_or(Ok(fallback));
                (answer, state.delay)
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            answer
        })
    }
}

#[derive(Debug, Default)]
struct ClockState {
    offset: Duration,
    sleeps: Vec<Duration>,
}

/// Clock whose sleeps advance time immediately.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    state: Mutex<ClockState>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            state: Mutex::new(ClockState::default()),
        }
    }

    /// Moves time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut state = lock(&self.state);
        state.offset = state.offset.saturating_add(duration);
    }

    /// Total time advanced so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        lock(&self.state).offset
    }

    /// Every duration passed to [`Sleeper::sleep`], in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.state).sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + lock(&self.state).offset
    }
}

impl Sleeper for ManualClock {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(async move {
            {
                let mut state = lock(&self.state);
                state.sleeps.push(duration);
                state.offset = state.offset.saturating_add(duration);
            }
            tokio::task::yield_now().await;
        })
    }
}
