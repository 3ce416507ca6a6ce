//! OpenAI-compatible `/chat/completions` generator

use super::{build_prompt, parse_generated_values, ValueGenerator};
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::values::FieldValueMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Generates values with a JSON-mode chat completion
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Generation {
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Generation {
                reason: format!(
                    "Generation timed out after {}s",
                    self.config.timeout.as_secs()
                ),
            }
        } else {
            Error::Generation {
                reason: format!("Generation request failed: {}", e),
            }
        }
    }
}

#[async_trait]
impl ValueGenerator for OpenAiGenerator {
    async fn generate(&self, field_names: &[String]) -> Result<FieldValueMap> {
        if field_names.is_empty() {
            return Ok(FieldValueMap::new());
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Generation {
                reason: "OPENAI_API_KEY is not configured".to_string(),
            })?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(field_names),
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Generation {
                reason: format!("Generation service returned status {}", status.as_u16()),
            });
        }

        let text = response.text().await.map_err(|e| self.request_error(e))?;
        let chat: ChatResponse =
            serde_json::from_str(&text).map_err(|e| Error::MalformedGeneration {
                reason: format!("unexpected response body: {}", e),
            })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::MalformedGeneration {
                reason: "response has no message content".to_string(),
            })?;

        let values = parse_generated_values(&content, field_names)?;
        tracing::info!(
            model = %self.config.model,
            requested = field_names.len(),
            returned = values.len(),
            "generated form values"
        );
        Ok(values)
    }
}
