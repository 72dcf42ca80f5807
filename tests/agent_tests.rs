//! Integration tests for the agent loop
//!
//! These tests drive the controller end to end against a fake device and a
//! scripted model backend. Time is paused so settle and cool-down pauses
//! complete instantly.

mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use common::{decision, decision_with_audit, DeviceCall, FakeDevice, ScriptedBackend, Transcript};
use ghostbot::agent::{
    AgentConfig, AgentController, AgentError, AgentEvent, AgentState, SessionRecorder, Termination,
};
use ghostbot::brain::{Brain, BrainError, RetryPolicy};

type TestController = AgentController<FakeDevice, Vec<AgentEvent>>;

fn controller(
    dir: &Path,
    device: FakeDevice,
    replies: Vec<Result<String, BrainError>>,
    max_steps: u32,
) -> (TestController, Arc<Mutex<Transcript>>) {
    let (backend, transcript) = ScriptedBackend::new(replies);
    let brain = Brain::with_backend(Box::new(backend), RetryPolicy::default());
    let recorder = SessionRecorder::new(dir.join("reports"), Some("agent test")).unwrap();
    let config = AgentConfig {
        max_steps,
        screenshot_path: dir.join("screen.png"),
        ..AgentConfig::default()
    };
    let agent = AgentController::with_sink(device, brain, recorder, config, Vec::new());
    (agent, transcript)
}

fn never() -> std::future::Pending<()> {
    std::future::pending()
}

/// Test that a tap followed by goal reached ends the session successfully
#[tokio::test(start_paused = true)]
async fn test_tap_then_goal_achieved() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, transcript) = controller(
        dir.path(),
        FakeDevice::new(),
        vec![
            Ok(decision(json!({"type": "tap", "value": "Login"}), false)),
            Ok(decision(json!({"type": "done"}), true)),
        ],
        50,
    );

    let result = agent.run_until("Log in", never()).await.unwrap();

    assert_eq!(result.termination, Termination::GoalAchieved);
    assert!(result.success());
    assert_eq!(result.steps, 2);
    assert_eq!(result.recorded_steps, 2);
    assert_eq!(agent.state(), AgentState::Completed { success: true });
    assert_eq!(
        agent.device().calls,
        vec![
            DeviceCall::Capture,
            DeviceCall::Hierarchy,
            DeviceCall::Tap("Login".to_string()),
            DeviceCall::Capture,
            DeviceCall::Hierarchy,
        ]
    );

    let transcript = transcript.lock().unwrap();
    let prompts = &transcript.prompts;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Log in"));
    assert!(prompts[0].contains("<node text=\"Login\"/>"));

    let report = std::fs::read_to_string(&result.report).unwrap();
    assert!(result.report.file_name().unwrap().to_str().unwrap().ends_with("_agent_test.md"));
    assert!(report.contains("**Goal:** Log in"));
    assert!(report.contains("## Step 1\n\n**Action:** Tapped 'Login'"));
    assert!(report.contains("## Step 2\n\n**Action:** Goal achieved - session complete"));
    assert!(report.contains("**Status:** PASSED"));
    assert!(report.contains("**Total Steps:** 2"));
    assert!(report.contains("Session ended after 2 steps."));

    assert!(!dir.path().join("screen.png").exists());
}

/// Test that the session stops at the step budget
#[tokio::test(start_paused = true)]
async fn test_step_budget_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    // no scripted replies: every step answers `wait`
    let (mut agent, transcript) = controller(dir.path(), FakeDevice::new(), vec![], 3);

    let result = agent.run_until("Find the settings", never()).await.unwrap();

    assert_eq!(result.termination, Termination::StepLimit);
    assert!(!result.success());
    assert_eq!(result.steps, 3);
    assert_eq!(result.recorded_steps, 3);
    assert_eq!(transcript.lock().unwrap().attempts, 3);
    assert!(agent.device().actions().is_empty());

    let report = std::fs::read_to_string(&result.report).unwrap();
    assert!(report.contains("**Status:** INCOMPLETE"));
    assert!(report.contains("**Total Steps:** 3"));
    assert!(report.contains("Step limit of 3 reached"));
    assert!(!report.contains("## Step 4"));
    assert!(!dir.path().join("screen.png").exists());
}

/// Test that no action runs once the goal is reached
#[tokio::test(start_paused = true)]
async fn test_goal_achieved_on_first_step_runs_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, _) = controller(
        dir.path(),
        FakeDevice::new(),
        vec![Ok(decision(json!({"type": "tap", "value": "Logout"}), true))],
        50,
    );

    let result = agent.run_until("Already logged in", never()).await.unwrap();

    assert_eq!(result.termination, Termination::GoalAchieved);
    assert_eq!(result.steps, 1);
    assert!(agent.device().actions().is_empty());
    assert!(!agent
        .sink()
        .iter()
        .any(|e| matches!(e, AgentEvent::ActionExecuted { .. })));
}

/// Test that a slow screen is flagged in the next prompt and the report
#[tokio::test(start_paused = true)]
async fn test_high_latency_injected_into_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let device = FakeDevice {
        slow_capture: Some((2, Duration::from_secs(6))),
        ..FakeDevice::new()
    };
    let (mut agent, transcript) = controller(
        dir.path(),
        device,
        vec![
            Ok(decision(json!({"type": "tap", "value": "Next"}), false)),
            Ok(decision(json!({"type": "done"}), true)),
        ],
        50,
    );

    let result = agent.run_until("Go to the next page", never()).await.unwrap();
    assert_eq!(result.termination, Termination::GoalAchieved);

    let transcript = transcript.lock().unwrap();
    let prompts = &transcript.prompts;
    assert!(!prompts[0].contains("HIGH LATENCY DETECTED"));
    assert!(prompts[1].contains("HIGH LATENCY DETECTED: "));
    assert!(prompts[1].contains("ms since last action. The app may be slow or unresponsive."));

    assert!(agent
        .sink()
        .iter()
        .any(|e| matches!(e, AgentEvent::HighLatency { step: 2, latency_ms } if *latency_ms >= 6000)));

    let report = std::fs::read_to_string(&result.report).unwrap();
    assert!(report.contains("(High latency detected)"));
}

/// Test that a malformed reply skips the step without a cool-down
#[tokio::test(start_paused = true)]
async fn test_malformed_reply_consumes_a_step_without_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, _) = controller(
        dir.path(),
        FakeDevice::new(),
        vec![
            Ok("I think you should tap Login".to_string()),
            Ok(decision(json!({"type": "done"}), true)),
        ],
        50,
    );

    let start = tokio::time::Instant::now();
    let result = agent.run_until("Log in", never()).await.unwrap();

    assert_eq!(result.termination, Termination::GoalAchieved);
    assert_eq!(result.steps, 2);
    assert_eq!(result.recorded_steps, 1);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(agent.sink().iter().any(|e| matches!(
        e,
        AgentEvent::DecisionFailed { step: 1, malformed: true, .. }
    )));
    assert_eq!(
        agent.brain().last_raw(),
        Some(decision(json!({"type": "done"}), true).as_str())
    );

    let report = std::fs::read_to_string(&result.report).unwrap();
    assert!(report.contains("## Step 1\n\n**Action:** Goal achieved"));
}

/// Test that a provider error pauses before the next step
#[tokio::test(start_paused = true)]
async fn test_provider_error_cools_down() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, transcript) = controller(
        dir.path(),
        FakeDevice::new(),
        vec![
            Err(BrainError::Authentication("invalid key".to_string())),
            Ok(decision(json!({"type": "done"}), true)),
        ],
        50,
    );

    let start = tokio::time::Instant::now();
    let result = agent.run_until("Log in", never()).await.unwrap();

    assert_eq!(result.termination, Termination::GoalAchieved);
    assert_eq!(result.recorded_steps, 1);
    // authentication failures are not retried inside the brain
    assert_eq!(transcript.lock().unwrap().attempts, 2);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(agent.sink().iter().any(|e| matches!(
        e,
        AgentEvent::DecisionFailed { step: 1, malformed: false, .. }
    )));
}

/// Test that a failed capture is retried on the next step
#[tokio::test(start_paused = true)]
async fn test_capture_failure_retries_next_step() {
    let dir = tempfile::tempdir().unwrap();
    let device = FakeDevice {
        failing_captures: 1,
        ..FakeDevice::new()
    };
    let (mut agent, transcript) = controller(
        dir.path(),
        device,
        vec![Ok(decision(json!({"type": "done"}), true))],
        50,
    );

    let result = agent.run_until("Log in", never()).await.unwrap();

    assert_eq!(result.steps, 2);
    assert_eq!(result.recorded_steps, 1);
    assert_eq!(transcript.lock().unwrap().attempts, 1);
    assert!(agent.sink().contains(&AgentEvent::CaptureFailed {
        step: 1,
        error: "device offline".to_string(),
    }));
}

/// Test that a failed action does not end the session
#[tokio::test(start_paused = true)]
async fn test_failed_action_does_not_stop_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let device = FakeDevice {
        action_fails: true,
        ..FakeDevice::new()
    };
    let (mut agent, _) = controller(
        dir.path(),
        device,
        vec![
            Ok(decision(json!({"type": "tap", "value": "Missing"}), false)),
            Ok(decision(json!({"type": "done"}), true)),
        ],
        50,
    );

    let result = agent.run_until("Log in", never()).await.unwrap();

    assert_eq!(result.termination, Termination::GoalAchieved);
    assert!(agent.sink().iter().any(|e| matches!(
        e,
        AgentEvent::ActionExecuted { step: 1, success: false, .. }
    )));
}

/// Test that an interrupt still closes the report
#[tokio::test(start_paused = true)]
async fn test_interrupt_closes_report() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, _) = controller(
        dir.path(),
        FakeDevice::new(),
        vec![
            Ok(decision(json!({"type": "tap", "value": "A"}), false)),
            Ok(decision(json!({"type": "tap", "value": "B"}), false)),
            Ok(decision(json!({"type": "tap", "value": "C"}), false)),
        ],
        50,
    );

    // first settle ends at 2s, the second would end at 4s
    let result = agent
        .run_until("Explore", tokio::time::sleep(Duration::from_secs(3)))
        .await
        .unwrap();

    assert_eq!(result.termination, Termination::Interrupted);
    assert_eq!(agent.state(), AgentState::Completed { success: false });
    assert_eq!(
        agent.device().actions(),
        vec![DeviceCall::Tap("A".to_string()), DeviceCall::Tap("B".to_string())]
    );

    let report = std::fs::read_to_string(&result.report).unwrap();
    assert!(report.contains("**Status:** INCOMPLETE"));
    assert!(report.contains("Session interrupted by user."));
    assert!(!dir.path().join("screen.png").exists());
}

/// Test that UX issues are collected in the report summary
#[tokio::test(start_paused = true)]
async fn test_ux_issues_summarized() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, _) = controller(
        dir.path(),
        FakeDevice::new(),
        vec![
            Ok(decision_with_audit(
                json!({"type": "tap", "value": "Sign in"}),
                json!({"status": "WARN", "issue": "Button text is truncated"}),
                false,
            )),
            Ok(decision_with_audit(
                json!({"type": "done"}),
                json!({"status": "FAIL", "issue": null}),
                true,
            )),
        ],
        50,
    );

    let result = agent.run_until("Log in", never()).await.unwrap();

    let report = std::fs::read_to_string(&result.report).unwrap();
    assert!(report.contains("**UX Status:** WARNING - Button text is truncated"));
    assert!(report.contains("**UX Status:** FAIL  \n"));
    assert!(report.contains("### UX Issues Found (2)"));
    assert!(report.contains("- **Step 1** (Warning): Button text is truncated"));
    assert!(report.contains("- **Step 2** (Error): No description"));
}

/// Test that an empty goal is rejected before anything runs
#[tokio::test]
async fn test_empty_goal_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut agent, transcript) = controller(dir.path(), FakeDevice::new(), vec![], 50);

    let err = agent.run_until("   ", never()).await.unwrap_err();

    assert!(matches!(err, AgentError::EmptyGoal));
    assert_eq!(agent.state(), AgentState::Idle);
    assert!(agent.device().calls.is_empty());
    assert_eq!(transcript.lock().unwrap().attempts, 0);
}
