//! Client for OpenAI-compatible chat completion endpoints (Groq, vLLM, OpenAI itself).

use super::{Completion, InferenceBackend};
use crate::config::InferenceConfig;
use crate::conversation::RoleMessage;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
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

#[derive(Debug, Deserialize)]
struct Usage {
    /// Groq extension: seconds spent server-side
    #[serde(default)]
    total_time: Option<f64>,
}

pub struct OpenAiCompatibleBackend {
    client: Client,
    completions_url: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatibleBackend {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::MissingCredential {
                credential: "inference backend API key".to_string(),
            })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build inference HTTP client: {e}"))?;

        // Don't add /v1/ here - the configured url already includes the version prefix
        let completions_url = format!("{}/chat/completions", config.url.as_str().trim_end_matches('/'));

        Ok(Self {
            client,
            completions_url,
            model: config.model.clone(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl InferenceBackend for OpenAiCompatibleBackend {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: &[RoleMessage]) -> Result<Completion> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.as_openai_role(),
                    content: &message.content,
                })
                .collect(),
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Backend {
                status: None,
                message: if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| Error::Backend {
            status: Some(status.as_u16()),
            message: format!("HTTP {} - Failed to read response body: {e}", status.as_u16()),
        })?;

        if !status.is_success() {
            return Err(Error::Backend {
                status: Some(status.as_u16()),
                message: format!("HTTP {} - {}", status.as_u16(), body_text),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body_text).map_err(|e| Error::Backend {
            status: Some(status.as_u16()),
            message: format!("Failed to parse response as JSON: {e}. Response body: {body_text}"),
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| Error::Backend {
            status: Some(status.as_u16()),
            message: "response contained no choices".to_string(),
        })?;

        let completion = Completion {
            content: choice.message.content.unwrap_or_default(),
            reported_total_time: parsed.usage.and_then(|usage| usage.total_time),
        };
        debug!(chars = completion.content.len(), reported_total_time = ?completion.reported_total_time, "Completion received");
        Ok(completion)
    }
}
