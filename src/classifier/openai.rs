// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Client for OpenAI-compatible chat completion endpoints
//!
//! Ollama serves the same API under `/v1`, so one client covers both
//! providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{Completion, VisionModel, VisionRequest};
use crate::config::{Detail, Provider, ProviderConfig, Settings};
use crate::{Result, ShotsortError};

/// Chat completions client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    provider: Provider,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    response_format: ResponseFormat,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: Detail,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    finish_reason: Option<String>,
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(provider: Provider, config: &ProviderConfig, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            provider,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.provider, &settings.provider_config, &settings.api_key)
    }

    /// List models the endpoint serves
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ShotsortError::Provider(format!("Cannot connect to {}: {}", self.base_url, e))
            })?;

        if !response.status().is_success() {
            return Err(ShotsortError::Provider(format!(
                "{} returned status {}",
                self.provider,
                response.status()
            )));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Check if the configured model is available
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| {
            m.starts_with(&self.model) || m == &format!("{}:latest", self.model)
        }))
    }
}

fn chat_request<'a>(model: &'a str, request: &'a VisionRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        response_format: ResponseFormat { kind: "json_object" },
        messages: vec![Message {
            role: "user",
            content: vec![
                ContentPart::Text { text: &request.prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: &request.image_url,
                        detail: request.detail,
                    },
                },
            ],
        }],
        max_tokens: request.max_tokens,
    }
}

fn first_choice(response: ChatResponse) -> Result<Completion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ShotsortError::Provider("Response has no choices".to_string()))?;

    Ok(Completion {
        finish_reason: choice.finish_reason,
        content: choice.message.and_then(|m| m.content),
    })
}

#[async_trait]
impl VisionModel for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        self.provider.as_str()
    }

    async fn complete(&self, request: &VisionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Sending vision request to {}: model={}", self.provider, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&chat_request(&self.model, request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ShotsortError::Provider(format!(
                "{} returned status {}",
                self.provider,
                response.status()
            )));
        }

        first_choice(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = VisionRequest {
            prompt: "name it".to_string(),
            image_url: "data:image/png;base64,AAAA".to_string(),
            detail: Detail::Low,
            max_tokens: 30,
        };

        let body = serde_json::to_value(chat_request("llava", &request)).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "llava",
                "response_format": { "type": "json_object" },
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "name it" },
                        {
                            "type": "image_url",
                            "image_url": { "url": "data:image/png;base64,AAAA", "detail": "low" }
                        }
                    ]
                }],
                "max_tokens": 30
            })
        );
    }

    #[test]
    fn test_first_choice_parsing() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": "{\"filename\": \"x\"}" }
            }]
        }))
        .unwrap();

        let completion = first_choice(response).unwrap();
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.content.as_deref(), Some("{\"filename\": \"x\"}"));
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let response: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(first_choice(response), Err(ShotsortError::Provider(_))));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let config = crate::AppConfig::default().ollama;
        let client = OpenAiClient::new(Provider::Ollama, &config, "ollama").unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert_eq!(client.model(), "llava");
        assert_eq!(client.provider(), "ollama");
    }
}
