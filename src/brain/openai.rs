//! OpenAI chat-completions backend (GPT-4o and compatible servers)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{BrainError, Provider, VisionBackend, VisionRequest};

/// Response envelope from /chat/completions
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Backend for the OpenAI chat-completions API
#[derive(Clone)]
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend
    ///
    /// # Arguments
    /// * `base_url` - API root including the version, e.g. "https://api.openai.com/v1"
    /// * `api_key` - Bearer token
    /// * `model` - Model name, e.g. "gpt-4o"
    /// * `client` - Shared HTTP client carrying the request timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    fn payload(&self, request: &VisionRequest<'_>) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/jpeg;base64,{}", request.image_b64),
                                "detail": "high"
                            }
                        },
                        { "type": "text", "text": request.prompt }
                    ]
                }
            ],
            "response_format": { "type": "json_object" },
            "max_tokens": 1024,
            "temperature": 0.1
        })
    }
}

#[async_trait]
impl VisionBackend for OpenAiBackend {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String, BrainError> {
        let endpoint = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrainError::from_status(status, body));
        }

        let text = response.text().await?;
        let envelope: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| BrainError::MalformedResponse(format!("Unreadable envelope: {}", e)))?;

        // An empty content string is handed on and rejected by the normalizer
        Ok(envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
