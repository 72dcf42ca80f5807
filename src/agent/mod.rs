//! Agent module for autonomous QA sessions
//!
//! This module provides the loop that ties the device, the vision model and
//! the report together:
//!
//! # Architecture
//!
//! ```text
//! Goal → AgentController ─┬→ DeviceTransport.capture() → ScreenCodec.encode()
//!                         ├→ DeviceTransport.hierarchy()
//!                         ├→ Brain.decide() → vision model (OpenAI / Anthropic)
//!                         ├→ SessionRecorder.record_step()
//!                         └→ ActionExecutor.execute() → settle → loop
//!                  ↓
//!           SessionRecorder.close() → Markdown report
//! ```

pub mod controller;
pub mod events;
pub mod recorder;

pub use controller::{
    latency_context, AgentConfig, AgentController, AgentError, AgentResult, AgentState,
};
pub use events::{AgentEvent, ConsoleSink, EventSink, Termination};
pub use recorder::{Session, SessionRecorder, UxIssue};
