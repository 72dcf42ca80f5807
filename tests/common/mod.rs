//! Test doubles shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::{json, Value};

use ghostbot::brain::{BrainError, Provider, VisionBackend, VisionRequest};
use ghostbot::device::{DeviceTransport, SwipeDirection};

/// One call observed by [`FakeDevice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Capture,
    Hierarchy,
    Tap(String),
    TapPoint(i64, i64),
    Input(String),
    Back,
    Swipe(SwipeDirection),
    Launch(String),
}

impl DeviceCall {
    pub fn is_action(&self) -> bool {
        !matches!(self, DeviceCall::Capture | DeviceCall::Hierarchy)
    }
}

/// In-memory device that writes a small PNG on capture
#[derive(Debug, Default)]
pub struct FakeDevice {
    pub calls: Vec<DeviceCall>,
    /// Number of leading captures that fail
    pub failing_captures: u32,
    /// Delay applied to the Nth capture (1-based)
    pub slow_capture: Option<(u32, Duration)>,
    pub hierarchy: Option<String>,
    /// Result reported for every action
    pub action_fails: bool,
    pub captures: u32,
    pub last_error: Option<String>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            hierarchy: Some("<hierarchy><node text=\"Login\"/></hierarchy>".to_string()),
            ..Self::default()
        }
    }

    pub fn actions(&self) -> Vec<DeviceCall> {
        self.calls.iter().filter(|c| c.is_action()).cloned().collect()
    }

    fn act(&mut self, call: DeviceCall) -> bool {
        self.calls.push(call);
        if self.action_fails {
            self.last_error = Some("action failed".to_string());
            false
        } else {
            self.last_error = None;
            true
        }
    }
}

#[async_trait]
impl DeviceTransport for FakeDevice {
    async fn capture(&mut self, path: &Path) -> bool {
        self.calls.push(DeviceCall::Capture);
        self.captures += 1;

        if let Some((n, delay)) = self.slow_capture {
            if n == self.captures {
                tokio::time::sleep(delay).await;
            }
        }
        if self.captures <= self.failing_captures {
            self.last_error = Some("device offline".to_string());
            return false;
        }

        RgbImage::from_pixel(64, 128, Rgb([240, 240, 240]))
            .save(path)
            .expect("write screenshot");
        self.last_error = None;
        true
    }

    async fn hierarchy(&mut self) -> Option<String> {
        self.calls.push(DeviceCall::Hierarchy);
        self.hierarchy.clone()
    }

    async fn tap(&mut self, text: &str) -> bool {
        self.act(DeviceCall::Tap(text.to_string()))
    }

    async fn tap_point(&mut self, x: i64, y: i64) -> bool {
        self.act(DeviceCall::TapPoint(x, y))
    }

    async fn input(&mut self, text: &str) -> bool {
        self.act(DeviceCall::Input(text.to_string()))
    }

    async fn back(&mut self) -> bool {
        self.act(DeviceCall::Back)
    }

    async fn swipe(&mut self, direction: SwipeDirection) -> bool {
        self.act(DeviceCall::Swipe(direction))
    }

    async fn launch(&mut self, package: &str) -> bool {
        self.act(DeviceCall::Launch(package.to_string()))
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// What the scripted backend saw, shared with the test after the brain is moved
#[derive(Debug, Default)]
pub struct Transcript {
    pub prompts: Vec<String>,
    pub attempts: u32,
}

/// Backend that replays queued replies, then falls back to a `wait` decision
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, BrainError>>>,
    transcript: Arc<Mutex<Transcript>>,
}

impl ScriptedBackend {
    pub fn new(
        replies: Vec<Result<String, BrainError>>,
    ) -> (Self, Arc<Mutex<Transcript>>) {
        let transcript = Arc::new(Mutex::new(Transcript::default()));
        let backend = Self {
            replies: Mutex::new(replies.into()),
            transcript: Arc::clone(&transcript),
        };
        (backend, transcript)
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String, BrainError> {
        {
            let mut transcript = self.transcript.lock().unwrap();
            transcript.prompts.push(request.prompt.to_string());
            transcript.attempts += 1;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(decision(json!({"type": "wait"}), false)))
    }
}

/// Serialized decision with a PASS audit
pub fn decision(action: Value, goal_achieved: bool) -> String {
    decision_with_audit(action, json!({"status": "PASS", "issue": null}), goal_achieved)
}

pub fn decision_with_audit(action: Value, ux_audit: Value, goal_achieved: bool) -> String {
    json!({
        "reasoning": "Scripted reasoning",
        "action": action,
        "ux_audit": ux_audit,
        "goal_achieved": goal_achieved
    })
    .to_string()
}
