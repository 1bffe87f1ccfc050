pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::core::settings::LlmSettings;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model(&self) -> &str;

    // One system prompt plus one user turn, returns the raw assistant text
    async fn generate(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}

/// Build the configured provider, or `None` when `[llm]` is incomplete.
pub fn load_provider(settings: &LlmSettings) -> Result<Option<Arc<dyn LlmProvider>>> {
    let Some(endpoint) = settings.endpoint() else {
        return Ok(None);
    };
    info!(
        "Registered LLM provider: {} ({})",
        endpoint.base_url, endpoint.model
    );
    let provider = providers::OpenAiCompatibleProvider::new(endpoint)?;
    Ok(Some(Arc::new(provider)))
}
