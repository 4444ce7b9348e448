use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{chat_messages, http_client, LlmProvider, Message};

/// A local Ollama server. Requests are non-streaming with `format: json`.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            model,
            client: http_client(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[derive(Deserialize)]
struct ChatReply {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, messages),
            "stream": false,
            "format": "json",
        });
        tracing::debug!(model = %self.model, url = %self.base_url, "sending Ollama chat request");

        let reply: ChatReply = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama at {}", self.base_url))?
            .error_for_status()
            .context("Ollama rejected chat request")?
            .json()
            .await
            .context("unexpected Ollama response body")?;

        reply
            .message
            .map(|m| m.content)
            .ok_or_else(|| anyhow::anyhow!("Ollama reply had no message"))
    }
}
