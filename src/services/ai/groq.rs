use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{chat_messages, http_client, LlmProvider, Message};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Groq's OpenAI-compatible chat endpoint, in JSON mode at a low temperature.
pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: http_client(),
        }
    }
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn completion_content(completion: Completion) -> anyhow::Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("Groq returned no completion content"))
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": chat_messages(system_prompt, messages),
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });
        tracing::debug!(model = %self.model, "sending Groq chat request");

        let resp = self
            .client
            .post(GROQ_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to reach Groq")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("Groq rejected chat request ({status}): {detail}");
        }

        let completion: Completion = resp
            .json()
            .await
            .context("unexpected Groq response body")?;
        completion_content(completion)
    }
}
