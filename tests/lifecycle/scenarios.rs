//! BDD scenarios for the machine lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, lifecycle_context};

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Register a reachable machine"
)]
fn scenario_register_reachable(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Report an unreachable machine once the budget runs out"
)]
fn scenario_report_unreachable(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Become ready after failed probes"
)]
fn scenario_ready_after_failures(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Release the same machine twice"
)]
fn scenario_release_twice(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Reuse a registered machine without provisioning"
)]
fn scenario_reuse_registered(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Provision a replacement for an unknown machine"
)]
fn scenario_reuse_unknown(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Reject an unsupported provider before touching the backend"
)]
fn scenario_reject_unsupported(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Distinguish cancellation from timeout"
)]
fn scenario_cancellation(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Keep a machine whose teardown fails"
)]
fn scenario_failed_teardown(lifecycle_context: LifecycleContext) {
    let _ = lifecycle_context;
}
