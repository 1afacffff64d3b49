//! Gemini classification backend
//!
//! Uses the generateContent API with a JSON response schema so the model is
//! forced to emit the verdict shape directly; no free-form text to scrape.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{parse_verdict, verdict_schema, Classifier, Verdict};
use crate::triage;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Gemini backend for topic classification
pub struct GeminiClassifier {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClassifier {
    /// Create a new Gemini classifier
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: HttpClient::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| anyhow::anyhow!("LLM_API_KEY not set"))?;
        Ok(Self::new(api_key, std::env::var("LLM_MODEL").ok()))
    }

    fn build_request(&self, history: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiTextPart {
                    text: triage::classification_input(history),
                }],
            }],
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiTextPart {
                    text: triage::system_prompt(),
                }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Some(verdict_schema()),
                temperature: 0.0,
            }),
        }
    }

    async fn make_request(&self, request: &GeminiRequest) -> Result<GeminiResponse> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error: {} - {}", status, body);
        }

        let api_response: GeminiResponse = response.json().await?;

        if let Some(error) = &api_response.error {
            anyhow::bail!("Gemini error: {}", error.message);
        }

        Ok(api_response)
    }

    /// Concatenated text of the first candidate.
    fn response_text(response: GeminiResponse) -> String {
        let mut text = String::new();
        if let Some(candidates) = response.candidates {
            if let Some(candidate) = candidates.into_iter().next() {
                for part in candidate.content.parts {
                    if let Some(t) = part.text {
                        text.push_str(&t);
                    }
                }
            }
        }
        text
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, history: &str) -> Result<Verdict> {
        let request = self.build_request(history);
        let response = self.make_request(&request).await?;
        let text = Self::response_text(response);

        if text.is_empty() {
            anyhow::bail!("Gemini returned an empty response");
        }

        parse_verdict(&text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiTextPart>,
}

#[derive(Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
}
