//! Agent Controller - the observe / decide / act loop
//!
//! Each iteration captures the screen, asks the [`Brain`] for the next
//! action, records the decision and executes it on the device. The loop ends
//! when the model reports the goal achieved, the step budget runs out, or the
//! interrupt future resolves.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::events::{AgentEvent, ConsoleSink, EventSink, Termination};
use super::recorder::SessionRecorder;
use crate::brain::Brain;
use crate::device::{ActionExecutor, DeviceTransport};
use crate::imaging::ScreenCodec;
use crate::metrics::{ACTIONS, DECISIONS, SCREEN_LATENCY, SESSIONS, STEPS, STEP_FAILURES};

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Step budget; every iteration counts, failed ones included
    pub max_steps: u32,
    /// Pause after each executed action
    pub settle_time: Duration,
    /// Pause after a failed screen capture
    pub capture_retry_delay: Duration,
    /// Pause after a provider error that survived the brain's own retries
    pub provider_cooldown: Duration,
    /// Time since the last action above which the model is told the app is slow
    pub high_latency_threshold: Duration,
    /// Duration of a `wait` action
    pub wait_duration: Duration,
    /// Where the screenshot is written each step; removed when the run ends
    pub screenshot_path: PathBuf,
    pub codec: ScreenCodec,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            settle_time: Duration::from_secs(2),
            capture_retry_delay: Duration::from_secs(1),
            provider_cooldown: Duration::from_secs(5),
            high_latency_threshold: Duration::from_millis(5000),
            wait_duration: Duration::from_secs(2),
            screenshot_path: PathBuf::from("temp_screenshot.png"),
            codec: ScreenCodec::default(),
        }
    }
}

/// Where the controller is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    /// `step` is the iteration in progress (1-based)
    Running { step: u32 },
    Completed { success: bool },
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub trace_id: String,
    pub termination: Termination,
    /// Loop iterations started
    pub steps: u32,
    /// Decisions written to the report
    pub recorded_steps: u32,
    pub report: PathBuf,
}

impl AgentResult {
    pub fn success(&self) -> bool {
        self.termination == Termination::GoalAchieved
    }
}

/// Error type for agent operations
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Goal must not be empty")]
    EmptyGoal,

    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

/// Outcome of one iteration
enum StepOutcome {
    Continue,
    GoalAchieved,
}

/// Removes the screenshot file when dropped
struct ScreenshotGuard<'a>(&'a Path);

impl Drop for ScreenshotGuard<'_> {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(self.0) {
                warn!(path = %self.0.display(), error = %e, "Failed to remove screenshot");
            }
        }
    }
}

/// Text handed to the model when the app has been slow to respond
pub fn latency_context(elapsed: Duration, threshold: Duration) -> Option<String> {
    (elapsed > threshold).then(|| {
        format!(
            "HIGH LATENCY DETECTED: {}ms since last action. The app may be slow or unresponsive.",
            elapsed.as_millis()
        )
    })
}

/// Agent Controller driving one device with one brain
pub struct AgentController<D, S = ConsoleSink> {
    device: D,
    brain: Brain,
    recorder: SessionRecorder,
    executor: ActionExecutor,
    config: AgentConfig,
    sink: S,
    state: AgentState,
}

impl<D: DeviceTransport> AgentController<D, ConsoleSink> {
    /// Create a controller reporting to the console
    ///
    /// # Arguments
    /// * `device` - Transport for the device under test
    /// * `brain` - Decision provider
    /// * `recorder` - Report writer for this session
    /// * `config` - Loop timings and budget
    pub fn new(device: D, brain: Brain, recorder: SessionRecorder, config: AgentConfig) -> Self {
        Self::with_sink(device, brain, recorder, config, ConsoleSink)
    }
}

impl<D: DeviceTransport, S: EventSink> AgentController<D, S> {
    pub fn with_sink(
        device: D,
        brain: Brain,
        recorder: SessionRecorder,
        config: AgentConfig,
        sink: S,
    ) -> Self {
        Self {
            device,
            brain,
            recorder,
            executor: ActionExecutor::new(config.wait_duration),
            config,
            sink,
            state: AgentState::Idle,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Run until the goal is reached, the budget is spent or Ctrl-C
    pub async fn run(&mut self, goal: &str) -> Result<AgentResult, AgentError> {
        self.run_until(goal, async {
            if tokio::signal::ctrl_c().await.is_err() {
                // no signal handler; never interrupt
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until the goal is reached, the budget is spent or `interrupt`
    /// resolves. An interrupt drops the in-flight step.
    pub async fn run_until<F>(&mut self, goal: &str, interrupt: F) -> Result<AgentResult, AgentError>
    where
        F: Future<Output = ()>,
    {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(AgentError::EmptyGoal);
        }

        let trace_id = Uuid::now_v7().to_string();
        let root_span = info_span!(
            "qa_session",
            trace_id = %trace_id,
            goal = %goal,
            provider = %self.brain.provider(),
            model = %self.brain.model(),
            otel.name = "qa_session"
        );

        async {
            let screenshot_path = self.config.screenshot_path.clone();
            let _guard = ScreenshotGuard(&screenshot_path);

            self.sink.emit(&AgentEvent::SessionStarted {
                goal: goal.to_string(),
                provider: self.brain.provider(),
                model: self.brain.model().to_string(),
                trace_id: trace_id.clone(),
            });
            self.recorder.open(goal)?;
            self.state = AgentState::Running { step: 0 };

            let termination = tokio::select! {
                termination = self.drive(goal, &trace_id) => termination,
                _ = interrupt => Termination::Interrupted,
            };

            let steps = match self.state {
                AgentState::Running { step } => step,
                _ => 0,
            };
            let notes = match termination {
                Termination::GoalAchieved => format!("Session ended after {} steps.", steps),
                Termination::StepLimit => format!(
                    "Session ended after {} steps. Step limit of {} reached.",
                    steps, self.config.max_steps
                ),
                Termination::Interrupted => "Session interrupted by user.".to_string(),
            };

            let success = termination == Termination::GoalAchieved;
            let report = self.recorder.close(success, Some(&notes))?;
            self.state = AgentState::Completed { success };
            SESSIONS.with_label_values(&[termination.as_str()]).inc();

            self.sink.emit(&AgentEvent::SessionFinished {
                termination,
                steps,
                report: report.clone(),
            });

            Ok::<_, AgentError>(AgentResult {
                trace_id: trace_id.clone(),
                termination,
                steps,
                recorded_steps: self.recorder.step_count(),
                report,
            })
        }
        .instrument(root_span)
        .await
    }

    async fn drive(&mut self, goal: &str, trace_id: &str) -> Termination {
        let mut last_action = Instant::now();
        let mut step = 0;

        loop {
            step += 1;
            if step > self.config.max_steps {
                warn!(trace_id = %trace_id, max_steps = self.config.max_steps, "Step limit reached");
                return Termination::StepLimit;
            }
            self.state = AgentState::Running { step };
            STEPS.inc();

            let step_span = info_span!(
                "agent_step",
                trace_id = %trace_id,
                step,
                otel.name = "agent_step"
            );
            let outcome = self
                .step(step, goal, &mut last_action)
                .instrument(step_span)
                .await;

            if let StepOutcome::GoalAchieved = outcome {
                return Termination::GoalAchieved;
            }
        }
    }

    async fn step(&mut self, step: u32, goal: &str, last_action: &mut Instant) -> StepOutcome {
        self.sink.emit(&AgentEvent::StepStarted { step });

        let screenshot_path = self.config.screenshot_path.clone();
        if !self.device.capture(&screenshot_path).await {
            let error = self
                .device
                .last_error()
                .unwrap_or("unknown error")
                .to_string();
            STEP_FAILURES.with_label_values(&["capture"]).inc();
            self.sink.emit(&AgentEvent::CaptureFailed { step, error });
            tokio::time::sleep(self.config.capture_retry_delay).await;
            return StepOutcome::Continue;
        }

        let image_b64 = match self.config.codec.encode(&screenshot_path) {
            Ok(b64) => b64,
            Err(e) => {
                STEP_FAILURES.with_label_values(&["encode"]).inc();
                self.sink.emit(&AgentEvent::EncodeFailed {
                    step,
                    error: e.to_string(),
                });
                return StepOutcome::Continue;
            }
        };

        let hierarchy = self.device.hierarchy().await;
        if hierarchy.is_none() {
            self.sink.emit(&AgentEvent::HierarchyUnavailable { step });
        }

        let elapsed = last_action.elapsed();
        let latency_ms = elapsed.as_millis() as u64;
        SCREEN_LATENCY.observe(elapsed.as_secs_f64());
        let context = latency_context(elapsed, self.config.high_latency_threshold);
        if context.is_some() {
            self.sink.emit(&AgentEvent::HighLatency { step, latency_ms });
        }

        let decision = match self
            .brain
            .decide(&image_b64, goal, hierarchy.as_deref(), context.as_deref())
            .await
        {
            Ok(decision) => decision,
            Err(e) if e.is_malformed() => {
                STEP_FAILURES.with_label_values(&["malformed_response"]).inc();
                self.sink.emit(&AgentEvent::DecisionFailed {
                    step,
                    error: e.to_string(),
                    malformed: true,
                });
                return StepOutcome::Continue;
            }
            Err(e) => {
                STEP_FAILURES.with_label_values(&["provider"]).inc();
                self.sink.emit(&AgentEvent::DecisionFailed {
                    step,
                    error: e.to_string(),
                    malformed: false,
                });
                tokio::time::sleep(self.config.provider_cooldown).await;
                return StepOutcome::Continue;
            }
        };

        DECISIONS
            .with_label_values(&[decision.ux_audit.status.as_str()])
            .inc();
        self.sink.emit(&AgentEvent::DecisionReceived {
            step,
            decision: decision.clone(),
        });

        if let Err(e) = self.recorder.record_step(
            &decision.action,
            &decision.reasoning,
            &decision.ux_audit,
            Some(latency_ms),
        ) {
            self.sink.emit(&AgentEvent::RecordFailed {
                step,
                error: e.to_string(),
            });
        }

        if !decision.goal_achieved {
            let success = self.executor.execute(&mut self.device, &decision.action).await;
            ACTIONS
                .with_label_values(&[decision.action.kind(), if success { "ok" } else { "failed" }])
                .inc();
            self.sink.emit(&AgentEvent::ActionExecuted {
                step,
                action: decision.action.clone(),
                success,
            });
            debug!(settle_ms = self.config.settle_time.as_millis() as u64, "Waiting for UI to settle");
            tokio::time::sleep(self.config.settle_time).await;
        }

        *last_action = Instant::now();

        if decision.goal_achieved {
            StepOutcome::GoalAchieved
        } else {
            StepOutcome::Continue
        }
    }
}
