use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::llm::{ChatMessage, LlmProvider};
use crate::core::settings::LlmEndpoint;

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

/// Any endpoint speaking the OpenAI chat-completions dialect.
pub struct OpenAiCompatibleProvider {
    endpoint: LlmEndpoint,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(endpoint: LlmEndpoint) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_seconds))
            .build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn model(&self) -> &str {
        &self.endpoint.model
    }

    async fn generate(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_text)];
        let req = OpenAiRequest {
            model: &self.endpoint.model,
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            temperature: 0.2,
        };
        let res = self
            .client
            .post(format!("{}/chat/completions", self.endpoint.base_url))
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&req)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            return Err(anyhow!(
                "LLM API Error ({}): {}",
                status,
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: OpenAiResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("LLM response missing choices[0].message.content"))
    }
}
