mod prompt;
pub mod schema;

pub use schema::{Card, RouterDecision, ToolCall};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::error::{ErrorKind, ToolError, ToolResult};
use crate::core::llm::LlmProvider;
use prompt::{ROUTER_SYSTEM_PROMPT, build_repair_prompt};

pub const DEFAULT_MAX_RETRIES: usize = 2;

/// Turns free text into a validated decision.
#[async_trait]
pub trait DecisionRouter: Send + Sync {
    async fn route(&self, text: &str) -> ToolResult<RouterDecision>;
}

/// Language-model backed router with a bounded self-repair loop.
pub struct RouterClient {
    provider: Option<Arc<dyn LlmProvider>>,
    max_retries: usize,
}

impl RouterClient {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            provider,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn generate(&self, provider: &dyn LlmProvider, input: &str) -> ToolResult<String> {
        provider
            .generate(ROUTER_SYSTEM_PROMPT, input)
            .await
            .map_err(|e| match e.downcast::<ToolError>() {
                Ok(tool_err) => tool_err,
                Err(e) => ToolError::new(ErrorKind::LlmError, "LLM request failed")
                    .with_details(serde_json::json!({ "error": e.to_string() })),
            })
    }
}

#[async_trait]
impl DecisionRouter for RouterClient {
    async fn route(&self, text: &str) -> ToolResult<RouterDecision> {
        let Some(provider) = self.provider.as_deref() else {
            return Err(ToolError::new(
                ErrorKind::LlmUnavailable,
                "LLM provider not configured",
            ));
        };

        let mut input = text.to_string();
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let output = self.generate(provider, &input).await?;
            match schema::parse_decision(&output) {
                Ok(decision) => {
                    info!(
                        "Router decided intent={} tool_calls={} (attempt {})",
                        decision.intent,
                        decision.tool_calls.len(),
                        attempt + 1
                    );
                    return Ok(decision);
                }
                Err(e) if e.kind.is_repairable() => {
                    warn!("Router attempt {} invalid: {}", attempt + 1, e);
                    if attempt < self.max_retries {
                        input = build_repair_prompt(text, &output, &e);
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            ToolError::new(ErrorKind::RouterInvalidJson, "Router output is not valid JSON")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Replays canned outputs and records every input it saw.
    struct ScriptedProvider {
        outputs: Mutex<Vec<anyhow::Result<String>>>,
        inputs: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(outputs: Vec<anyhow::Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                inputs: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.inputs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _system: &str, user: &str) -> anyhow::Result<String> {
            self.inputs.lock().unwrap().push(user.to_string());
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("not json".to_string()))
        }
    }

    const VALID: &str = r#"{"intent":"expense","confidence":0.9,"need_clarification":false,"tool_calls":[{"name":"create_expense","arguments":{"amount":30}}]}"#;

    #[tokio::test]
    async fn no_provider_is_unavailable() {
        let router = RouterClient::new(None);
        let err = router.route("hi").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LlmUnavailable);
    }

    #[tokio::test]
    async fn always_invalid_json_stops_at_retry_ceiling() {
        let provider = ScriptedProvider::new(vec![]);
        let router = RouterClient::new(Some(provider.clone())).with_max_retries(2);
        let err = router.route("午饭30").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RouterInvalidJson);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn repair_prompt_follows_invalid_output() {
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"intent":"x"}"#.to_string()),
            Ok(VALID.to_string()),
        ]);
        let router = RouterClient::new(Some(provider.clone()));
        let decision = router.route("午饭30").await.unwrap();
        assert_eq!(decision.intent, "expense");

        let inputs = provider.inputs.lock().unwrap();
        assert_eq!(inputs[0], "午饭30");
        assert!(inputs[1].contains("Original user input: 午饭30"));
        assert!(inputs[1].contains("router_invalid_schema"));
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let provider = ScriptedProvider::new(vec![Err(anyhow!("connection refused"))]);
        let router = RouterClient::new(Some(provider.clone()));
        let err = router.route("x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LlmError);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn provider_tool_error_keeps_its_kind() {
        let provider = ScriptedProvider::new(vec![Err(ToolError::new(
            ErrorKind::LlmUnavailable,
            "quota exhausted",
        )
        .into())]);
        let router = RouterClient::new(Some(provider.clone()));
        let err = router.route("x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LlmUnavailable);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let provider = ScriptedProvider::new(vec![]);
        let router = RouterClient::new(Some(provider.clone())).with_max_retries(0);
        assert!(router.route("x").await.is_err());
        assert_eq!(provider.calls(), 1);
    }
}
