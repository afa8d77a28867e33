//! BDD step definitions for the machine lifecycle.

use std::iter;

use berth::MachineHandle;
use berth::test_support::ScriptedProbe;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{AcquireResult, LifecycleContext, ReleaseResult};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a lifecycle manager for provider \"{provider}\"")]
fn manager_for_provider(
    mut lifecycle_context: LifecycleContext,
    provider: String,
) -> LifecycleContext {
    lifecycle_context.provider = provider;
    lifecycle_context
}

#[given("the backend assigns id \"{id}\"")]
fn backend_assigns_id(lifecycle_context: LifecycleContext, id: String) -> LifecycleContext {
    lifecycle_context.backend.push_ids([id]);
    lifecycle_context
}

#[given("the machine never becomes reachable")]
fn never_reachable(mut lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.probe = ScriptedProbe::always(false);
    lifecycle_context
}

#[given("the probe fails \"{count}\" times before succeeding")]
fn probe_fails_first(lifecycle_context: LifecycleContext, count: usize) -> LifecycleContext {
    lifecycle_context
        .probe
        .push_answers(iter::repeat_n(false, count));
    lifecycle_context
}

#[given("the wait is cancelled during probe \"{call}\"")]
fn cancelled_during_probe(lifecycle_context: LifecycleContext, call: u32) -> LifecycleContext {
    lifecycle_context
        .probe
        .cancel_on_call(call, lifecycle_context.cancel.clone());
    lifecycle_context
}

#[given("the backend fails during teardown")]
fn backend_fails_teardown(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.backend.fail_on_destroy();
    lifecycle_context
}

#[when("I acquire a machine")]
fn acquire_machine(
    mut lifecycle_context: LifecycleContext,
) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let outcome = match lifecycle_context.manager() {
        Ok(manager) => match runtime.block_on(async move { manager.acquire().await }) {
            Ok(handle) => AcquireResult::Success(handle),
            Err(err) => AcquireResult::Failure(err.to_string()),
        },
        Err(message) => AcquireResult::Failure(message),
    };
    lifecycle_context.acquired = Some(outcome);
    Ok(lifecycle_context)
}

#[when("I reuse machine \"{id}\"")]
fn reuse_machine(
    mut lifecycle_context: LifecycleContext,
    id: String,
) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let manager = lifecycle_context.manager().map_err(StepError::Assertion)?;
    let outcome = match runtime.block_on(async move { manager.acquire_or_reuse(&id).await }) {
        Ok(handle) => AcquireResult::Success(handle),
        Err(err) => AcquireResult::Failure(err.to_string()),
    };
    lifecycle_context.acquired = Some(outcome);
    Ok(lifecycle_context)
}

#[when("I release machine \"{id}\"")]
fn release_machine(
    mut lifecycle_context: LifecycleContext,
    id: String,
) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let manager = lifecycle_context.manager().map_err(StepError::Assertion)?;
    let outcome = match runtime.block_on(async move { manager.release(&id).await }) {
        Ok(released) => ReleaseResult::Released(released),
        Err(err) => ReleaseResult::Failure(err.to_string()),
    };
    lifecycle_context.last_release = Some(outcome);
    Ok(lifecycle_context)
}

fn acquired_handle(
    lifecycle_context: &LifecycleContext,
) -> Result<&MachineHandle, StepError> {
    match &lifecycle_context.acquired {
        Some(AcquireResult::Success(handle)) => Ok(handle),
        Some(AcquireResult::Failure(message)) => Err(StepError::Assertion(format!(
            "acquire failed unexpectedly: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing acquire outcome"))),
    }
}

#[then("the acquired machine status is \"{status}\"")]
fn acquired_status(lifecycle_context: &LifecycleContext, status: String) -> Result<(), StepError> {
    let handle = acquired_handle(lifecycle_context)?;
    if handle.status.as_str() == status {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected status {status}, got {}",
            handle.status
        )))
    }
}

#[then("the acquired machine id is \"{id}\"")]
fn acquired_id(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    let handle = acquired_handle(lifecycle_context)?;
    if handle.id == id {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected machine {id}, got {}",
            handle.id
        )))
    }
}

#[then("the acquire fails with \"{text}\"")]
fn acquire_fails(lifecycle_context: &LifecycleContext, text: String) -> Result<(), StepError> {
    match &lifecycle_context.acquired {
        Some(AcquireResult::Failure(message)) if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure mentioning '{text}', got {other:?}"
        ))),
    }
}

fn is_registered(lifecycle_context: &LifecycleContext, id: &str) -> bool {
    lifecycle_context
        .manager
        .as_ref()
        .is_some_and(|manager| manager.registry().contains(id))
}

#[then("machine \"{id}\" is registered")]
fn machine_registered(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    if is_registered(lifecycle_context, &id) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("machine {id} should be registered")))
    }
}

#[then("machine \"{id}\" is not registered")]
fn machine_not_registered(
    lifecycle_context: &LifecycleContext,
    id: String,
) -> Result<(), StepError> {
    if is_registered(lifecycle_context, &id) {
        Err(StepError::Assertion(format!(
            "machine {id} should not be registered"
        )))
    } else {
        Ok(())
    }
}

#[then("the probe was called \"{count}\" times")]
fn probe_calls(lifecycle_context: &LifecycleContext, count: u32) -> Result<(), StepError> {
    let calls = lifecycle_context.probe.calls();
    if calls == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} probe calls, got {calls}"
        )))
    }
}

#[then("the backend created \"{count}\" machines")]
fn backend_creates(lifecycle_context: &LifecycleContext, count: u32) -> Result<(), StepError> {
    let calls = lifecycle_context.backend.create_calls();
    if calls == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} create calls, got {calls}"
        )))
    }
}

#[then("the backend destroyed \"{id}\" once")]
fn destroyed_once(lifecycle_context: &LifecycleContext, id: String) -> Result<(), StepError> {
    let destroyed = lifecycle_context.backend.destroyed();
    if destroyed == [id.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected a single destroy of {id}, got {destroyed:?}"
        )))
    }
}

#[then("the last release reported no machine")]
fn release_reported_nothing(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.last_release {
        Some(ReleaseResult::Released(None)) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a no-op release, got {other:?}"
        ))),
    }
}

#[then("the last release fails with \"{text}\"")]
fn release_fails(lifecycle_context: &LifecycleContext, text: String) -> Result<(), StepError> {
    match &lifecycle_context.last_release {
        Some(ReleaseResult::Failure(message)) if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected release failure mentioning '{text}', got {other:?}"
        ))),
    }
}
