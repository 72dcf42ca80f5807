//! Vision-model decision layer
//!
//! A [`Brain`] turns a screenshot plus the session goal into a [`Decision`].
//! The HTTP wire format lives behind the [`VisionBackend`] trait, with one
//! implementation per provider:
//!
//! ```text
//! screenshot + goal ──► prompts ──► VisionBackend (OpenAI | Anthropic)
//!                                        │  RetryPolicy (transient only)
//!                                        ▼
//!                                   raw reply text ──► normalizer ──► Decision
//! ```

pub mod anthropic;
pub mod client;
pub mod decision;
pub mod normalizer;
pub mod openai;
pub mod prompts;
pub mod retry;

use std::fmt;
use std::io;
use std::str::FromStr;

use async_trait::async_trait;

pub use anthropic::AnthropicBackend;
pub use client::{Brain, BrainConfig};
pub use decision::{Action, Decision, UxAudit, UxStatus};
pub use normalizer::normalize;
pub use openai::OpenAiBackend;
pub use retry::RetryPolicy;

/// Errors raised while asking the model for a decision
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    /// Timeouts and connection failures; the only retried class
    #[error("Transient transport failure: {0}")]
    Transient(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request error: {0}")]
    Request(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unsupported AI provider: '{0}' (supported: openai, anthropic)")]
    UnsupportedProvider(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),
}

impl BrainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BrainError::Transient(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, BrainError::MalformedResponse(_))
    }

    /// Map a non-success HTTP status to an error
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => BrainError::Authentication(body),
            429 => BrainError::RateLimited(body),
            code => BrainError::Api { status: code, body },
        }
    }
}

impl From<reqwest::Error> for BrainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || is_dropped_connection(&e) {
            BrainError::Transient(e.to_string())
        } else if e.is_decode() {
            BrainError::MalformedResponse(e.to_string())
        } else {
            BrainError::Request(e.to_string())
        }
    }
}

/// Connection closed or reset by the peer after it was accepted
fn is_dropped_connection(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(h) = err.downcast_ref::<hyper::Error>() {
            if h.is_incomplete_message() || h.is_closed() || h.is_canceled() {
                return true;
            }
        }
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Which vision API family to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o",
            Provider::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic (Claude)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl FromStr for Provider {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            _ => Err(BrainError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a backend needs for one request
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    /// Base64-encoded JPEG
    pub image_b64: &'a str,
}

/// Wire-format adapter for one vision API
#[async_trait]
pub trait VisionBackend: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    /// Send the request and return the reply's text payload
    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String, BrainError>;
}
