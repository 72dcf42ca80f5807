//! Prometheus metrics for QA sessions
//!
//! All metrics live in the default registry. [`render`] produces the text
//! exposition format, which the CLI can write out when a session ends.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Session & Step Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished sessions by outcome.
    ///
    /// Labels:
    /// - outcome: "goal_achieved", "step_limit" or "interrupted"
    pub static ref SESSIONS: CounterVec = register_counter_vec!(
        "ghostbot_sessions_total",
        "QA sessions finished, by outcome",
        &["outcome"]
    ).expect("failed to register SESSIONS metric");

    /// Loop iterations started (including ones that failed before recording)
    pub static ref STEPS: Counter = register_counter!(
        "ghostbot_steps_total",
        "Agent loop iterations started"
    ).expect("failed to register STEPS metric");

    /// Iterations abandoned before a decision was recorded.
    ///
    /// Labels:
    /// - stage: "capture", "encode", "malformed_response" or "provider"
    pub static ref STEP_FAILURES: CounterVec = register_counter_vec!(
        "ghostbot_step_failures_total",
        "Agent loop iterations abandoned, by failing stage",
        &["stage"]
    ).expect("failed to register STEP_FAILURES metric");

    /// Seconds between the previous action and the next screen capture
    pub static ref SCREEN_LATENCY: Histogram = register_histogram!(
        "ghostbot_screen_latency_seconds",
        "Time from the previous action to the next decision request",
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register SCREEN_LATENCY metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Decision & Action Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Recorded decisions by UX audit status.
    ///
    /// Labels:
    /// - ux_status: "PASS", "WARN" or "FAIL"
    pub static ref DECISIONS: CounterVec = register_counter_vec!(
        "ghostbot_decisions_total",
        "Decisions recorded, by UX audit status",
        &["ux_status"]
    ).expect("failed to register DECISIONS metric");

    /// Executed device actions.
    ///
    /// Labels:
    /// - action: action kind (tap, swipe, ...)
    /// - result: "ok" or "failed"
    pub static ref ACTIONS: CounterVec = register_counter_vec!(
        "ghostbot_actions_total",
        "Device actions executed, by kind and result",
        &["action", "result"]
    ).expect("failed to register ACTIONS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Model Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Wall time of a full decide() call, retries included.
    ///
    /// Labels:
    /// - provider: "openai" or "anthropic"
    /// - model: model name
    pub static ref MODEL_CALL_TIME: HistogramVec = register_histogram_vec!(
        "ghostbot_model_call_seconds",
        "Vision model decision latency including retries",
        &["provider", "model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]
    ).expect("failed to register MODEL_CALL_TIME metric");

    /// Retries triggered by transient transport failures.
    ///
    /// Labels:
    /// - provider: "openai" or "anthropic"
    pub static ref MODEL_RETRIES: CounterVec = register_counter_vec!(
        "ghostbot_model_retries_total",
        "Vision model requests retried after a transient failure",
        &["provider"]
    ).expect("failed to register MODEL_RETRIES metric");
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
