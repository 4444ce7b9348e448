pub mod groq;
pub mod ollama;
pub mod router;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion backend. Implementations are asked for JSON-only replies.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// System prompt first, then the conversation, in the OpenAI-style shape both
/// backends accept.
pub(crate) fn chat_messages(system_prompt: &str, messages: &[Message]) -> Vec<Value> {
    std::iter::once(json!({ "role": "system", "content": system_prompt }))
        .chain(messages.iter().map(|m| json!({ "role": m.role, "content": m.content })))
        .collect()
}
