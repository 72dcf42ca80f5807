//! The decision provider used by the agent loop

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::{
    normalizer, prompts, AnthropicBackend, BrainError, Decision, OpenAiBackend, Provider,
    RetryPolicy, VisionBackend, VisionRequest,
};
use crate::metrics::{MODEL_CALL_TIME, MODEL_RETRIES};

/// Configuration for building a [`Brain`]
#[derive(Debug, Clone)]
pub struct BrainConfig {
    pub provider: Provider,
    pub api_key: String,
    /// Falls back to [`Provider::default_model`]
    pub model: Option<String>,
    /// Falls back to [`Provider::default_base_url`]
    pub base_url: Option<String>,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl BrainConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            base_url: None,
            request_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Asks a vision model for the next step and keeps the last reply around
/// for inspection.
pub struct Brain {
    backend: Box<dyn VisionBackend>,
    retry: RetryPolicy,
    last_parsed: Option<Value>,
    last_raw: Option<String>,
}

impl Brain {
    /// Build the backend selected by `config.provider`
    pub fn new(config: BrainConfig) -> Result<Self, BrainError> {
        if config.api_key.trim().is_empty() {
            return Err(BrainError::MissingCredential(
                config.provider.api_key_env().to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BrainError::Request(e.to_string()))?;

        let provider = config.provider;
        let model = config
            .model
            .unwrap_or_else(|| provider.default_model().to_string());
        let base_url = config
            .base_url
            .unwrap_or_else(|| provider.default_base_url().to_string());

        let backend: Box<dyn VisionBackend> = match provider {
            Provider::OpenAi => Box::new(OpenAiBackend::new(base_url, config.api_key, model, client)),
            Provider::Anthropic => {
                Box::new(AnthropicBackend::new(base_url, config.api_key, model, client))
            }
        };

        Ok(Self::with_backend(backend, config.retry))
    }

    /// Wrap an existing backend
    pub fn with_backend(backend: Box<dyn VisionBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            last_parsed: None,
            last_raw: None,
        }
    }

    pub fn provider(&self) -> Provider {
        self.backend.provider()
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Last reply that parsed as JSON
    pub fn last_parsed(&self) -> Option<&Value> {
        self.last_parsed.as_ref()
    }

    /// Last reply text, parsed or not
    pub fn last_raw(&self) -> Option<&str> {
        self.last_raw.as_deref()
    }

    /// Analyze the current screen and decide on the next action
    ///
    /// # Arguments
    /// * `image_b64` - Base64 JPEG of the screen
    /// * `goal` - The session goal
    /// * `hierarchy` - UI hierarchy dump, if one could be fetched
    /// * `context` - Extra situational notes such as a latency warning
    pub async fn decide(
        &mut self,
        image_b64: &str,
        goal: &str,
        hierarchy: Option<&str>,
        context: Option<&str>,
    ) -> Result<Decision, BrainError> {
        let prompt = prompts::build_user_prompt(goal, hierarchy, context);
        let request = VisionRequest {
            system: prompts::SYSTEM_PROMPT,
            prompt: &prompt,
            image_b64,
        };

        let provider = self.backend.provider();
        let backend = &self.backend;
        let timer = MODEL_CALL_TIME
            .with_label_values(&[provider.as_str(), backend.model()])
            .start_timer();

        let raw = self
            .retry
            .run(
                |attempt| {
                    if attempt > 1 {
                        MODEL_RETRIES.with_label_values(&[provider.as_str()]).inc();
                    }
                    debug!(provider = %provider, attempt, "Requesting decision");
                    backend.complete(&request)
                },
                BrainError::is_transient,
            )
            .await;
        timer.observe_duration();

        self.accept(raw?)
    }

    /// Normalize a reply, recording the diagnostics on the way
    fn accept(&mut self, raw: String) -> Result<Decision, BrainError> {
        let parsed = normalizer::parse_object(&raw);
        self.last_raw = Some(raw);
        let parsed = parsed.map_err(|e| {
            warn!(error = %e, raw = self.last_raw.as_deref().unwrap_or(""), "Unparseable model reply");
            e
        })?;
        let decision = normalizer::validate(&parsed);
        self.last_parsed = Some(parsed);
        decision
    }
}
