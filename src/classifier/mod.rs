//! Topic classification backends
//!
//! One provider is active per process, selected by configuration. A provider
//! takes the rendered conversation and returns the structured verdict for the
//! turn; there is no failover and no retry.

mod gemini;
mod openai;

pub use gemini::GeminiClassifier;
pub use openai::OpenAiClassifier;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Fixed topic labels for a conversation turn.
///
/// `Error` is never produced by a classifier; it exists only for the API
/// boundary when an exchange fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "LAB")]
    Lab,
    #[serde(rename = "TWIN_APPOINTMENT")]
    TwinAppointment,
    #[serde(rename = "OTHERS")]
    Others,
    #[serde(rename = "ERROR")]
    Error,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Lab => "LAB",
            Topic::TwinAppointment => "TWIN_APPOINTMENT",
            Topic::Others => "OTHERS",
            Topic::Error => "ERROR",
        }
    }
}

/// Outcome of a classified turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Classified and answered directly.
    #[serde(rename = "ok")]
    Ok,
    /// Handed to a human; a holding reply is still sent.
    #[serde(rename = "escalate")]
    Escalate,
    /// Generic acknowledgement; nothing is shown to the member.
    #[serde(rename = "no_response")]
    NoResponse,
    /// Exchange failed; API boundary only.
    #[serde(rename = "error")]
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Escalate => "escalate",
            Status::NoResponse => "no_response",
            Status::Error => "error",
        }
    }
}

/// Structured output the model must return for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub topic: Topic,
    pub status: Status,
    /// Reply shown to the member; empty when status is `no_response`.
    pub response_message: String,
    /// Model self-estimate in [0.0, 1.0].
    pub confidence: f64,
    /// One-sentence rationale, kept for the audit log.
    pub justification: String,
}

/// Unified interface over the classification backends.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one rendered conversation into a [`Verdict`].
    async fn classify(&self, history: &str) -> Result<Verdict>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// JSON Schema for [`Verdict`], inlined into provider requests.
pub(crate) fn verdict_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "topic": {
                "type": "string",
                "enum": ["LAB", "TWIN_APPOINTMENT", "OTHERS"]
            },
            "status": {
                "type": "string",
                "enum": ["ok", "escalate", "no_response"]
            },
            "response_message": { "type": "string" },
            "confidence": { "type": "number" },
            "justification": { "type": "string" }
        },
        "required": ["topic", "status", "response_message", "confidence", "justification"]
    })
}

/// Parse and validate the raw model output against the verdict schema.
pub(crate) fn parse_verdict(raw: &str) -> Result<Verdict> {
    let verdict: Verdict = serde_json::from_str(raw.trim())
        .with_context(|| format!("model returned invalid classification JSON: {}", raw))?;

    // ERROR/error are reserved for the API boundary; a model emitting them
    // slipped past the schema and cannot be trusted.
    if verdict.topic == Topic::Error || verdict.status == Status::Error {
        anyhow::bail!("model returned reserved label: {}", raw);
    }

    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parses_from_model_json() {
        let raw = r#"{
            "topic": "TWIN_APPOINTMENT",
            "status": "ok",
            "response_message": "Your coach call is tomorrow at 10am.",
            "confidence": 0.92,
            "justification": "Member asked about a coach appointment."
        }"#;
        let verdict = parse_verdict(raw).unwrap();
        assert_eq!(verdict.topic, Topic::TwinAppointment);
        assert_eq!(verdict.status, Status::Ok);
        assert!(!verdict.response_message.is_empty());
    }

    #[test]
    fn unknown_topic_is_rejected() {
        let raw = r#"{
            "topic": "BILLING",
            "status": "ok",
            "response_message": "",
            "confidence": 0.5,
            "justification": ""
        }"#;
        assert!(parse_verdict(raw).is_err());
    }

    #[test]
    fn preamble_text_is_rejected() {
        assert!(parse_verdict("Here is the JSON: {}").is_err());
    }

    #[test]
    fn reserved_labels_are_rejected() {
        let raw = r#"{
            "topic": "ERROR",
            "status": "ok",
            "response_message": "",
            "confidence": 0.5,
            "justification": ""
        }"#;
        assert!(parse_verdict(raw).is_err());
    }

    #[test]
    fn topic_and_status_round_trip() {
        for topic in [Topic::Lab, Topic::TwinAppointment, Topic::Others, Topic::Error] {
            let json = serde_json::to_string(&topic).unwrap();
            assert_eq!(json, format!("\"{}\"", topic.as_str()));
        }
        for status in [Status::Ok, Status::Escalate, Status::NoResponse, Status::Error] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn schema_constrains_classifier_topics() {
        let schema = verdict_schema();
        let topics = schema["properties"]["topic"]["enum"].as_array().unwrap();
        // ERROR is an API-boundary label, never a model output.
        assert_eq!(topics.len(), 3);
        assert!(!topics.iter().any(|t| t == "ERROR"));
    }
}
