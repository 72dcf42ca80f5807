//! GhostBot - autonomous mobile QA agent with a vision-model brain
//!
//! A session starts from one natural-language goal. Each step captures the
//! device screen, asks a vision model for the next action plus a UX audit,
//! records the decision in a Markdown report and executes the action.
//!
//! # Modules
//!
//! - `agent` - the observe / decide / act loop, events and report writer
//! - `brain` - vision-model providers, prompts, reply normalization, retries
//! - `device` - device transport, adb driver, action executor, setup checks
//! - `imaging` - screenshot resize and JPEG encoding
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - log subscriber with optional OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use ghostbot::{AdbDriver, AgentConfig, AgentController, Brain, BrainConfig, Provider, SessionRecorder};
//!
//! let brain = Brain::new(BrainConfig::new(Provider::OpenAi, api_key))?;
//! let recorder = SessionRecorder::new("reports", None)?;
//! let mut agent = AgentController::new(AdbDriver::new(), brain, recorder, AgentConfig::default());
//! let result = agent.run("Log in with the demo account").await?;
//! ```

pub mod agent;
pub mod brain;
pub mod device;
pub mod imaging;
pub mod metrics;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentController, AgentResult, SessionRecorder, Termination};
pub use brain::{Action, Brain, BrainConfig, BrainError, Decision, Provider};
pub use device::{ActionExecutor, AdbDriver, DeviceTransport, SwipeDirection};
pub use imaging::ScreenCodec;
