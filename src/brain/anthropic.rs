//! Anthropic messages backend (Claude vision models)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{BrainError, Provider, VisionBackend, VisionRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Response envelope from /v1/messages
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// One typed block of the reply; only `text` blocks carry the answer
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Backend for the Anthropic messages API
#[derive(Clone)]
pub struct AnthropicBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicBackend {
    /// Create a backend
    ///
    /// # Arguments
    /// * `base_url` - API root without the version, e.g. "https://api.anthropic.com"
    /// * `api_key` - Sent as `x-api-key`
    /// * `model` - Model name
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
            "system": request.system,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/jpeg",
                            "data": request.image_b64
                        }
                    },
                    { "type": "text", "text": request.prompt }
                ]
            }],
            "max_tokens": 1024,
            "temperature": 0.1
        })
    }
}

#[async_trait]
impl VisionBackend for AnthropicBackend {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String, BrainError> {
        let endpoint = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.payload(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrainError::from_status(status, body));
        }

        let text = response.text().await?;
        let envelope: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| BrainError::MalformedResponse(format!("Unreadable envelope: {}", e)))?;

        Ok(envelope
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .unwrap_or_default())
    }
}
