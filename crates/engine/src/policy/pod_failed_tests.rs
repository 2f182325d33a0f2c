// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use k8s_openapi::api::core::v1::Pod;
use reaper_core::test_support::{pod, with_phase, with_status_reason};
use reaper_core::{AgentRecordBuilder, FakeClock, PodAction};

const GRACE: Duration = Duration::from_secs(300);

fn evaluate(policy: &PodFailedPolicy<FakeClock>, action: PodAction, pod: &Pod) -> Option<Termination> {
    let agent = AgentRecordBuilder::default().pod(PodRef::new("foo", "node-1")).build();
    let pod_ref = agent.pod.clone();
    policy.evaluate(&PolicyInput { action, agent: &agent, pod_ref: &pod_ref, pod })
}

fn base() -> Pod {
    pod("foo", "node-1")
}

#[yare::parameterized(
    evicted = { Some("Evicted"), "Evicted" },
    deadline = { Some("DeadlineExceeded"), "DeadlineExceeded" },
    no_reason = { None, "Failed" },
)]
fn failed_phase_terminates(status_reason: Option<&str>, expected: &str) {
    let policy = PodFailedPolicy::new(FakeClock::new(), GRACE);
    let mut pod = with_phase(base(), "Failed");
    if let Some(reason) = status_reason {
        pod = with_status_reason(pod, reason);
    }
    let termination = evaluate(&policy, PodAction::Modified, &pod).unwrap();
    assert_eq!(termination.reason, expected);
    assert!(matches!(termination.cause, OfflineCause::PodFailed { ref phase, .. } if phase == "Failed"));
}

#[test]
fn running_pod_is_healthy() {
    let policy = PodFailedPolicy::new(FakeClock::new(), GRACE);
    assert_eq!(evaluate(&policy, PodAction::Modified, &base()), None);
}

#[test]
fn deleted_events_are_ignored() {
    let policy = PodFailedPolicy::new(FakeClock::new(), GRACE);
    assert_eq!(evaluate(&policy, PodAction::Deleted, &with_phase(base(), "Failed")), None);
}

#[test]
fn unknown_phase_waits_for_grace_window() {
    let clock = FakeClock::new();
    let policy = PodFailedPolicy::new(clock.clone(), GRACE);
    let unknown = with_phase(base(), "Unknown");

    assert_eq!(evaluate(&policy, PodAction::Modified, &unknown), None);
    clock.advance(Duration::from_secs(299));
    assert_eq!(evaluate(&policy, PodAction::Modified, &unknown), None);
    clock.advance(Duration::from_secs(1));

    let termination = evaluate(&policy, PodAction::Modified, &unknown).unwrap();
    assert_eq!(termination.reason, "Unknown");
}

#[test]
fn recovery_restarts_the_grace_window() {
    let clock = FakeClock::new();
    let policy = PodFailedPolicy::new(clock.clone(), GRACE);
    let unknown = with_phase(base(), "Unknown");

    evaluate(&policy, PodAction::Modified, &unknown);
    clock.advance(Duration::from_secs(200));
    evaluate(&policy, PodAction::Modified, &base());
    clock.advance(Duration::from_secs(200));

    assert_eq!(evaluate(&policy, PodAction::Modified, &unknown), None);
}

#[test]
fn forget_drops_unknown_tracking() {
    let clock = FakeClock::new();
    let policy = PodFailedPolicy::new(clock.clone(), GRACE);
    let unknown = with_phase(base(), "Unknown");

    evaluate(&policy, PodAction::Modified, &unknown);
    clock.advance(GRACE);
    policy.forget(&PodRef::new("foo", "node-1"));

    assert_eq!(evaluate(&policy, PodAction::Modified, &unknown), None);
}
