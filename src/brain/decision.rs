//! Structured decision returned by the vision model for a single step

use std::fmt;

use serde_json::Value;

/// Fallback reasoning when the model omits or mistypes the field
pub const NO_REASONING: &str = "No reasoning provided";

/// The model's verdict for one step of the session
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Free-text explanation of what the model saw and why it chose the action
    pub reasoning: String,
    /// The next device action
    pub action: Action,
    /// UX audit of the current screen
    pub ux_audit: UxAudit,
    /// Whether the model considers the goal reached
    pub goal_achieved: bool,
}

impl Decision {
    /// Build a decision from an already-validated top-level object.
    ///
    /// Nested fields are read leniently: anything missing or of the wrong
    /// shape falls back to `wait` / PASS / `false`.
    pub(crate) fn from_object(value: &Value) -> Self {
        let reasoning = value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or(NO_REASONING)
            .to_string();

        let action = match value.get("action") {
            Some(obj @ Value::Object(_)) => Action::from_value(obj),
            _ => Action::Wait,
        };

        let ux_audit = value
            .get("ux_audit")
            .map(UxAudit::from_value)
            .unwrap_or_default();

        let goal_achieved = value
            .get("goal_achieved")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            reasoning,
            action,
            ux_audit,
            goal_achieved,
        }
    }
}

/// A device action chosen by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Tap an element by its visible text
    Tap { text: String },
    /// Tap absolute screen coordinates
    TapPoint { x: i64, y: i64 },
    /// Type into the focused field
    Input { text: String },
    /// Press the system back button
    Back,
    /// Swipe in a direction; validated by the executor, not the parser
    Swipe { direction: String },
    /// Let the UI settle
    Wait,
    /// Goal reached, nothing to do
    Done,
    /// Any type tag outside the vocabulary, kept for logging
    Unrecognized { kind: String, value: Option<String> },
}

impl Action {
    /// Read an action object such as `{"type": "tap", "value": "Login"}`
    pub fn from_value(value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        let text = value.get("value").and_then(Value::as_str);

        match kind.as_str() {
            "tap" => Action::Tap {
                text: text.unwrap_or_default().to_string(),
            },
            "tap_point" => match (coordinate(value.get("x")), coordinate(value.get("y"))) {
                (Some(x), Some(y)) => Action::TapPoint { x, y },
                _ => Action::Unrecognized {
                    kind,
                    value: Some(value.to_string()),
                },
            },
            "input" => Action::Input {
                text: text.unwrap_or_default().to_string(),
            },
            "back" => Action::Back,
            "swipe" => Action::Swipe {
                direction: text.unwrap_or_default().to_string(),
            },
            "wait" => Action::Wait,
            "done" => Action::Done,
            _ => Action::Unrecognized {
                kind,
                value: value.get("value").map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            },
        }
    }

    /// Short tag used in logs and metric labels
    pub fn kind(&self) -> &str {
        match self {
            Action::Tap { .. } => "tap",
            Action::TapPoint { .. } => "tap_point",
            Action::Input { .. } => "input",
            Action::Back => "back",
            Action::Swipe { .. } => "swipe",
            Action::Wait => "wait",
            Action::Done => "done",
            Action::Unrecognized { .. } => "unrecognized",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tap { text } => write!(f, "tap '{}'", text),
            Action::TapPoint { x, y } => write!(f, "tap_point ({}, {})", x, y),
            Action::Input { text } => write!(f, "input '{}'", text),
            Action::Back => write!(f, "back"),
            Action::Swipe { direction } => write!(f, "swipe {}", direction),
            Action::Wait => write!(f, "wait"),
            Action::Done => write!(f, "done"),
            Action::Unrecognized { kind, value } => {
                write!(f, "unrecognized '{}' ({})", kind, value.as_deref().unwrap_or(""))
            }
        }
    }
}

/// Whole-number coordinate given as an integer, an integral float or a numeric string
fn coordinate(value: Option<&Value>) -> Option<i64> {
    let integral = |f: f64| (f.is_finite() && f.fract() == 0.0).then_some(f as i64);
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

/// Severity of the UX audit for a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UxStatus {
    #[default]
    Pass,
    Warn,
    Fail,
}

impl UxStatus {
    /// Anything that is not PASS or WARN is treated as a failure
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("PASS") {
            UxStatus::Pass
        } else if s.eq_ignore_ascii_case("WARN") || s.eq_ignore_ascii_case("WARNING") {
            UxStatus::Warn
        } else {
            UxStatus::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UxStatus::Pass => "PASS",
            UxStatus::Warn => "WARN",
            UxStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for UxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UX audit attached to each decision
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UxAudit {
    pub status: UxStatus,
    /// Expected for WARN/FAIL but not enforced
    pub issue: Option<String>,
}

impl UxAudit {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn new(status: UxStatus, issue: Option<String>) -> Self {
        Self { status, issue }
    }

    fn from_value(value: &Value) -> Self {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .map(UxStatus::parse)
            .unwrap_or_default();
        let issue = value
            .get("issue")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self { status, issue }
    }
}
