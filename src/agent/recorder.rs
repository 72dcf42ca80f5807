//! Markdown session reports
//!
//! One report file per run. The header is written by [`SessionRecorder::open`],
//! every decision is appended by [`SessionRecorder::record_step`] and the
//! summary by [`SessionRecorder::close`]. Nothing already written is ever
//! rewritten.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::brain::{Action, UxAudit, UxStatus};

/// Latency above which a step entry is flagged
pub const HIGH_LATENCY_MS: u64 = 5000;

/// Longest session-name fragment kept in the file name
const MAX_NAME_LEN: usize = 50;

/// A WARN or FAIL audit, kept for the summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UxIssue {
    pub step: u32,
    pub status: UxStatus,
    pub issue: Option<String>,
}

/// State of the running session
#[derive(Debug, Clone)]
pub struct Session {
    pub goal: String,
    /// Number of recorded steps; the first recorded step is 1
    pub step_count: u32,
    pub started_at: DateTime<Local>,
    pub ux_issues: Vec<UxIssue>,
    started: Instant,
}

impl Session {
    fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            step_count: 0,
            started_at: Local::now(),
            ux_issues: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Writes the human-readable audit trail of a session
pub struct SessionRecorder {
    path: PathBuf,
    session: Session,
}

impl SessionRecorder {
    /// Create the output directory and pick a timestamped report path
    ///
    /// # Arguments
    /// * `output_dir` - Directory for reports, created if missing
    /// * `session_name` - Optional name folded into the file name
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<&str>) -> io::Result<Self> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = match session_name.map(sanitize_name).filter(|n| !n.is_empty()) {
            Some(name) => format!("{}_{}.md", timestamp, name),
            None => format!("{}_test_report.md", timestamp),
        };

        Ok(Self {
            path: output_dir.join(filename),
            session: Session::new(""),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn step_count(&self) -> u32 {
        self.session.step_count
    }

    /// Start the session and write the report header.
    ///
    /// Must be called once, before any step; a second call truncates the report.
    pub fn open(&mut self, goal: &str) -> io::Result<()> {
        self.session = Session::new(goal);
        let header = format!(
            "# GhostBot Test Report\n\n**Date:** {}\n**Goal:** {}\n\n---\n\n",
            self.session.started_at.format("%Y-%m-%d %H:%M:%S"),
            goal
        );
        fs::write(&self.path, header)
    }

    /// Append one step entry and return its step number
    pub fn record_step(
        &mut self,
        action: &Action,
        reasoning: &str,
        ux_audit: &UxAudit,
        latency_ms: Option<u64>,
    ) -> io::Result<u32> {
        self.session.step_count += 1;
        let step = self.session.step_count;

        if ux_audit.status != UxStatus::Pass {
            self.session.ux_issues.push(UxIssue {
                step,
                status: ux_audit.status,
                issue: ux_audit.issue.clone(),
            });
        }

        let mut entry = format!(
            "## Step {}\n\n**Action:** {}\n**Reasoning:** {}\n**UX Status:** {}",
            step,
            describe_action(action),
            reasoning,
            describe_ux(ux_audit)
        );

        if let Some(ms) = latency_ms {
            entry.push_str(&format!("  \n**Latency:** {}ms", ms));
            if ms > HIGH_LATENCY_MS {
                entry.push_str(" (High latency detected)");
            }
        }
        entry.push_str("\n\n---\n\n");

        self.append(&entry)?;
        Ok(step)
    }

    /// Append the summary and return the report path
    pub fn close(&mut self, success: bool, notes: Option<&str>) -> io::Result<PathBuf> {
        let mut summary = format!(
            "## Session Summary\n\n**Status:** {}\n**Total Steps:** {}\n**Duration:** {}\n",
            if success { "PASSED" } else { "INCOMPLETE" },
            self.session.step_count,
            format_duration(self.session.elapsed())
        );

        if !self.session.ux_issues.is_empty() {
            summary.push_str(&format!(
                "\n### UX Issues Found ({})\n\n",
                self.session.ux_issues.len()
            ));
            for issue in &self.session.ux_issues {
                let label = match issue.status {
                    UxStatus::Warn => "Warning",
                    _ => "Error",
                };
                summary.push_str(&format!(
                    "- **Step {}** ({}): {}\n",
                    issue.step,
                    label,
                    issue.issue.as_deref().unwrap_or("No description")
                ));
            }
        }

        if let Some(notes) = notes.filter(|n| !n.is_empty()) {
            summary.push_str(&format!("\n### Notes\n\n{}\n", notes));
        }
        summary.push_str("\n---\n*Report generated by GhostBot*\n");

        self.append(&summary)?;
        Ok(self.path.clone())
    }

    fn append(&self, content: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(content.as_bytes())
    }
}

/// Human-readable description of an action for the report
pub fn describe_action(action: &Action) -> String {
    match action {
        Action::Tap { text } => format!("Tapped '{}'", text),
        Action::TapPoint { x, y } => format!("Tapped point ({}, {})", x, y),
        Action::Input { text } => format!("Entered text: '{}'", text),
        Action::Swipe { direction } => format!("Swiped {}", direction),
        Action::Back => "Pressed Back button".to_string(),
        Action::Wait => "Waited for UI to settle".to_string(),
        Action::Done => "Goal achieved - session complete".to_string(),
        Action::Unrecognized { kind, value } => {
            let kind = if kind.is_empty() { "unknown" } else { kind.as_str() };
            format!("{}: {}", kind, value.as_deref().unwrap_or(""))
        }
    }
}

/// UX line for the report; a missing issue leaves just the label
pub fn describe_ux(audit: &UxAudit) -> String {
    let label = match audit.status {
        UxStatus::Pass => return "PASS".to_string(),
        UxStatus::Warn => "WARNING",
        UxStatus::Fail => "FAIL",
    };
    match audit.issue.as_deref().filter(|i| !i.is_empty()) {
        Some(issue) => format!("{} - {}", label, issue),
        None => label.to_string(),
    }
}

/// `H:MM:SS`, sub-second part dropped
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Keep ASCII alphanumerics, `-` and `_`; everything else becomes `_`
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_NAME_LEN)
        .collect()
}
