//! Events emitted by the agent loop
//!
//! The controller never prints. It hands [`AgentEvent`]s to an [`EventSink`];
//! [`ConsoleSink`] turns them into log records and operator-facing lines.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::brain::{Action, Decision, Provider, UxStatus};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    GoalAchieved,
    StepLimit,
    Interrupted,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::GoalAchieved => "goal_achieved",
            Termination::StepLimit => "step_limit",
            Termination::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    SessionStarted {
        goal: String,
        provider: Provider,
        model: String,
        trace_id: String,
    },
    StepStarted {
        step: u32,
    },
    CaptureFailed {
        step: u32,
        error: String,
    },
    EncodeFailed {
        step: u32,
        error: String,
    },
    HierarchyUnavailable {
        step: u32,
    },
    HighLatency {
        step: u32,
        latency_ms: u64,
    },
    DecisionReceived {
        step: u32,
        decision: Decision,
    },
    DecisionFailed {
        step: u32,
        error: String,
        malformed: bool,
    },
    ActionExecuted {
        step: u32,
        action: Action,
        success: bool,
    },
    RecordFailed {
        step: u32,
        error: String,
    },
    SessionFinished {
        termination: Termination,
        steps: u32,
        report: PathBuf,
    },
}

/// Receives loop events in order
pub trait EventSink: Send {
    fn emit(&mut self, event: &AgentEvent);
}

/// Keeps every event; handy for inspecting a run after the fact
impl EventSink for Vec<AgentEvent> {
    fn emit(&mut self, event: &AgentEvent) {
        self.push(event.clone());
    }
}

/// Default sink: structured logs plus short console lines for the operator
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::SessionStarted {
                goal,
                provider,
                model,
                trace_id,
            } => {
                info!(trace_id = %trace_id, provider = %provider, model = %model, goal = %goal, "Starting QA session");
                println!("[AGENT] Trace ID: {}", trace_id);
                println!("[AGENT] Model: {} ({})", model, provider.display_name());
                println!("[AGENT] Goal: {}", goal);
            }
            AgentEvent::StepStarted { step } => {
                debug!(step, "Step started");
                println!("──────────────── Step {} ────────────────", step);
            }
            AgentEvent::CaptureFailed { step, error } => {
                warn!(step, error = %error, "Screen capture failed");
                println!("[AGENT] Failed to capture screenshot ({}). Retrying...", error);
            }
            AgentEvent::EncodeFailed { step, error } => {
                warn!(step, error = %error, "Screenshot encoding failed");
                println!("[AGENT] Failed to encode image: {}", error);
            }
            AgentEvent::HierarchyUnavailable { step } => {
                debug!(step, "No UI hierarchy available");
            }
            AgentEvent::HighLatency { step, latency_ms } => {
                warn!(step, latency_ms, "High latency detected");
                println!("[AGENT] ⚠️ High latency detected ({}ms)", latency_ms);
            }
            AgentEvent::DecisionReceived { step, decision } => {
                let audit = &decision.ux_audit;
                info!(
                    step,
                    action = %decision.action,
                    ux_status = %audit.status,
                    goal_achieved = decision.goal_achieved,
                    "Decision received"
                );
                if audit.status != UxStatus::Pass {
                    warn!(step, ux_status = %audit.status, issue = ?audit.issue, "UX issue reported");
                }
                println!("[AGENT] Reasoning: {}", decision.reasoning);
                println!("[AGENT] Action: {}", decision.action);
                match &audit.issue {
                    Some(issue) if audit.status != UxStatus::Pass => {
                        println!("[AGENT] UX Status: {} - {}", audit.status, issue)
                    }
                    _ => println!("[AGENT] UX Status: {}", audit.status),
                }
            }
            AgentEvent::DecisionFailed {
                step,
                error,
                malformed,
            } => {
                warn!(step, error = %error, malformed, "Decision failed");
                if *malformed {
                    println!("[AGENT] ❌ Model returned an invalid response: {}. Retrying...", error);
                } else {
                    println!("[AGENT] ❌ Model API error: {}. Retrying after cool-down...", error);
                }
            }
            AgentEvent::ActionExecuted {
                step,
                action,
                success,
            } => {
                if *success {
                    info!(step, action = action.kind(), "Action executed");
                } else {
                    warn!(step, action = action.kind(), "Action may have failed, continuing");
                    println!("[AGENT] Action may have failed, continuing...");
                }
            }
            AgentEvent::RecordFailed { step, error } => {
                warn!(step, error = %error, "Failed to write report entry");
            }
            AgentEvent::SessionFinished {
                termination,
                steps,
                report,
            } => {
                info!(termination = termination.as_str(), steps, report = %report.display(), "Session finished");
                match termination {
                    Termination::GoalAchieved => println!("[AGENT] ✅ Test complete - goal achieved"),
                    Termination::StepLimit => {
                        println!("[AGENT] Test stopped after {} steps (limit reached)", steps)
                    }
                    Termination::Interrupted => println!("[AGENT] Session interrupted by user"),
                }
                println!("[AGENT] Report saved: {}", report.display());
            }
        }
    }
}
