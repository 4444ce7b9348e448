use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::WorkerSummary;
use crate::services::ai::{LlmProvider, Message};

const SYSTEM_PROMPT: &str = r#"You are the dispatch assistant for a household services marketplace (cleaning, gardening, tank cleaning and similar jobs). Given a service request, pick the single best worker to send.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "worker_id": "id of the chosen worker",
  "estimated_arrival_time": "e.g. 25 minutes, or unknown"
}

Rules:
- Prefer workers whose skills match the requested service.
- Use the customer location to judge travel time as best you can.
- If candidate workers are listed, choose only from them.
- If you cannot estimate arrival, use "unknown".
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub service_type: String,
    pub customer_location: String,
    pub requested_time: String,
    #[serde(default)]
    pub worker_skills: Vec<String>,
    #[serde(default)]
    pub candidates: Vec<WorkerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSuggestion {
    pub worker_id: String,
    pub estimated_arrival_time: Option<String>,
}

/// Advisory worker suggestion. Never consulted by the booking lifecycle.
#[async_trait]
pub trait SmartRouter: Send + Sync {
    async fn route(&self, request: &RouteRequest) -> anyhow::Result<RouteSuggestion>;
}

pub struct LlmSmartRouter {
    llm: Box<dyn LlmProvider>,
}

impl LlmSmartRouter {
    pub fn new(llm: Box<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SmartRouter for LlmSmartRouter {
    async fn route(&self, request: &RouteRequest) -> anyhow::Result<RouteSuggestion> {
        let response = self
            .llm
            .chat(SYSTEM_PROMPT, &[Message::user(describe(request))])
            .await?;

        let suggestion = parse_route_response(&response)?;
        if !request.candidates.is_empty()
            && !request
                .candidates
                .iter()
                .any(|c| c.worker_id == suggestion.worker_id)
        {
            tracing::warn!(
                worker_id = %suggestion.worker_id,
                "smart router suggested a worker outside the candidate list"
            );
        }
        Ok(suggestion)
    }
}

fn describe(request: &RouteRequest) -> String {
    let mut lines = vec![
        format!("Service: {}", request.service_type),
        format!("Customer location: {}", request.customer_location),
        format!("Requested time: {}", request.requested_time),
    ];
    if !request.worker_skills.is_empty() {
        lines.push(format!("Required skills: {}", request.worker_skills.join(", ")));
    }
    if !request.candidates.is_empty() {
        lines.push("Candidate workers:".to_string());
        for c in &request.candidates {
            lines.push(format!("- {} ({})", c.worker_id, c.display_name));
        }
    }
    lines.join("\n")
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(alias = "workerId")]
    worker_id: String,
    #[serde(default, alias = "estimatedArrivalTime")]
    estimated_arrival_time: Option<String>,
}

fn parse_route_response(response: &str) -> anyhow::Result<RouteSuggestion> {
    let cleaned = response.trim();
    let cleaned = cleaned
        .strip_prefix("```json")
        .or_else(|| cleaned.strip_prefix("```"))
        .unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    let raw = serde_json::from_str::<RawSuggestion>(cleaned).ok().or_else(|| {
        let start = cleaned.find('{')?;
        let end = cleaned.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str::<RawSuggestion>(&cleaned[start..=end]).ok()
    });

    let raw = raw.ok_or_else(|| anyhow::anyhow!("smart router returned unparseable response"))?;
    let worker_id = raw.worker_id.trim().to_string();
    if worker_id.is_empty() {
        anyhow::bail!("smart router returned no worker");
    }

    let estimated_arrival_time = raw
        .estimated_arrival_time
        .map(|eta| eta.trim().to_string())
        .filter(|eta| !eta.is_empty() && !eta.eq_ignore_ascii_case("unknown"));

    Ok(RouteSuggestion {
        worker_id,
        estimated_arrival_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedLlm(&'static str);

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn chat(&self, _system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
            assert!(messages[0].content.contains("Service: gardening"));
            Ok(self.0.to_string())
        }
    }

    fn request() -> RouteRequest {
        RouteRequest {
            service_type: "gardening".to_string(),
            customer_location: "12 Elm Street".to_string(),
            requested_time: "2025-06-16 10:00 AM".to_string(),
            worker_skills: vec!["gardening".to_string()],
            candidates: vec![],
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let s = parse_route_response(r#"{"worker_id":"w1","estimated_arrival_time":"20 minutes"}"#).unwrap();
        assert_eq!(s.worker_id, "w1");
        assert_eq!(s.estimated_arrival_time.as_deref(), Some("20 minutes"));
    }

    #[test]
    fn test_parse_fenced_camel_case() {
        let s = parse_route_response("```json\n{\"workerId\":\"w2\",\"estimatedArrivalTime\":\"1 hour\"}\n```").unwrap();
        assert_eq!(s.worker_id, "w2");
        assert_eq!(s.estimated_arrival_time.as_deref(), Some("1 hour"));
    }

    #[test]
    fn test_unknown_eta_is_none() {
        let s = parse_route_response(r#"Sure! {"worker_id":"w3","estimated_arrival_time":"Unknown"} hope that helps"#).unwrap();
        assert_eq!(s.worker_id, "w3");
        assert_eq!(s.estimated_arrival_time, None);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_route_response("I would send Bob").is_err());
        assert!(parse_route_response(r#"{"worker_id":"  "}"#).is_err());
    }

    #[tokio::test]
    async fn test_llm_router_round_trip() {
        let router = LlmSmartRouter::new(Box::new(CannedLlm(
            r#"{"worker_id":"w9","estimated_arrival_time":"unknown"}"#,
        )));
        let suggestion = router.route(&request()).await.unwrap();
        assert_eq!(
            suggestion,
            RouteSuggestion {
                worker_id: "w9".to_string(),
                estimated_arrival_time: None,
            }
        );
    }
}
