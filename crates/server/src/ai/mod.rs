//! Completion gateway
//!
//! Forwards a conversation plus the instruction for the selected mode to the
//! language model and hands back the reply text. Every failure, including a
//! timeout, surfaces as [`Error::Service`]; nothing is persisted here.

mod genai_client;
mod mode;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::conversations::ChatMessage;
use crate::core::error::{Error, Result};

pub use genai_client::GenAiCompletionClient;
pub use mode::Mode;

/// Completion gateway configuration
#[derive(Clone, Debug)]
pub struct AiConfig {
    /// Model to use
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }
}

/// A single request to the language model
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the assistant's reply text, or the upstream error message
    async fn complete(&self, request: CompletionRequest<'_>) -> anyhow::Result<String>;
}

pub struct CompletionGateway {
    config: AiConfig,
    client: Arc<dyn CompletionClient>,
}

impl CompletionGateway {
    pub fn new(config: AiConfig, client: Arc<dyn CompletionClient>) -> Self {
        info!("[AI] Using model: {}", config.model);
        Self { config, client }
    }

    /// Ask the model for the next assistant turn.
    ///
    /// `history` must already end with the new user turn.
    pub async fn reply(&self, mode: Mode, history: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            system: mode.system_prompt(),
            messages: history,
            max_tokens: self.config.max_tokens,
        };

        info!("[AI] Calling {} in {} mode", self.config.model, mode);

        let outcome = tokio::time::timeout(self.config.timeout, self.client.complete(request)).await;

        let text = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("[AI] Completion failed: {:#}", e);
                return Err(Error::Service(format!("AI service error: {}", e)));
            }
            Err(_) => {
                warn!("[AI] Completion timed out after {:?}", self.config.timeout);
                return Err(Error::Service(format!(
                    "AI service error: no reply within {}s",
                    self.config.timeout.as_secs()
                )));
            }
        };

        if text.trim().is_empty() {
            return Err(Error::Service(
                "AI service error: empty response".to_string(),
            ));
        }

        Ok(text)
    }
}
