use anyhow::anyhow;
use async_trait::async_trait;
use genai::chat::{ChatMessage as GenAiMessage, ChatOptions, ChatRequest};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client as GenAIClient, ModelIden};

use super::{CompletionClient, CompletionRequest};
use crate::conversations::{ChatMessage, Role};

/// Production completion client backed by `genai`.
///
/// The model name selects the provider adapter (`claude-*` goes to Anthropic).
pub struct GenAiCompletionClient {
    client: GenAIClient,
}

impl GenAiCompletionClient {
    /// Without an explicit key genai falls back to the provider's usual
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Self {
        let client = match api_key {
            Some(key) => {
                let resolver = AuthResolver::from_resolver_fn(
                    move |_model: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                        Ok(Some(AuthData::from_single(key.clone())))
                    },
                );
                GenAIClient::builder().with_auth_resolver(resolver).build()
            }
            None => GenAIClient::default(),
        };

        Self { client }
    }
}

fn to_genai(message: &ChatMessage) -> GenAiMessage {
    match message.role {
        Role::User => GenAiMessage::user(message.content.as_str()),
        Role::Assistant => GenAiMessage::assistant(message.content.as_str()),
    }
}

#[async_trait]
impl CompletionClient for GenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> anyhow::Result<String> {
        let chat_req = ChatRequest::new(request.messages.iter().map(to_genai).collect())
            .with_system(request.system);
        let options = ChatOptions::default().with_max_tokens(request.max_tokens);

        let response = self
            .client
            .exec_chat(request.model, chat_req, Some(&options))
            .await
            .map_err(|e| anyhow!("GenAI error: {}", e))?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No response generated"))
    }
}
