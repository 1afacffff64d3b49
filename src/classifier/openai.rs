//! OpenAI classification backend
//!
//! Chat Completions with `response_format: json_object`; the schema itself is
//! carried in the system prompt, and the reply is validated on our side.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{parse_verdict, verdict_schema, Classifier, Verdict};
use crate::triage;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI backend for topic classification
pub struct OpenAiClassifier {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    /// Create a new OpenAI classifier
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn build_request(&self, history: &str) -> OpenAiRequest {
        let system = format!(
            "{}\n\nThe JSON object must match this schema:\n{}",
            triage::system_prompt(),
            verdict_schema()
        );

        OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system,
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: triage::classification_input(history),
                },
            ],
            temperature: 0.0,
            response_format: json!({ "type": "json_object" }),
        }
    }

    async fn make_request(&self, request: &OpenAiRequest) -> Result<OpenAiResponse> {
        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error: {} - {}", status, body);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, history: &str) -> Result<Verdict> {
        let request = self.build_request(history);
        let response = self.make_request(&request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            anyhow::bail!("OpenAI returned an empty response");
        }

        parse_verdict(&content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}
