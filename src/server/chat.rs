// src/server/chat.rs
// The classification exchange: one user message in, one verdict out.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::classifier::{Status, Topic};
use crate::session::ConversationStore;
use crate::triage;

/// Chat request from the browser client
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Exchange result returned to the caller. `response` is omitted when the
/// status is `no_response`; the client must not render a reply then.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub topic: Topic,
    pub status: Status,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub session_id: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

// ============================================================================
// Session tokens
// ============================================================================

/// Issue a fresh server-side session token: `session_<unix-millis>_<suffix>`.
pub fn new_session_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", millis, &random[..8])
}

/// Validate a client-presented token against the issued shape. Tokens are
/// server-issued; anything else is rejected before touching storage.
pub(crate) fn is_valid_session_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("session_") else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('_') else {
        return false;
    };

    let millis_ok = (10..=17).contains(&millis.len())
        && millis.bytes().all(|b| b.is_ascii_digit());
    let suffix_ok = (4..=16).contains(&suffix.len())
        && suffix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

    millis_ok && suffix_ok
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let session_id = match request.session_id {
        Some(id) if is_valid_session_id(&id) => id,
        Some(_) => return Err(ApiError::bad_request("invalid session token")),
        None => new_session_id(),
    };

    let store = ConversationStore::new(state.db.clone());

    // A bare acknowledgement opening a session never reaches the classifier
    // and never gets a visible reply.
    let is_first_message = store
        .message_count(&session_id)
        .await
        .map_err(ApiError::storage)?
        == 0;
    if is_first_message && triage::is_generic_ack(message) {
        store
            .append(
                &session_id,
                "user",
                message,
                Some(Topic::Others.as_str()),
                Some(Status::NoResponse.as_str()),
            )
            .await
            .map_err(ApiError::storage)?;
        store
            .record_classification(
                &session_id,
                Topic::Others.as_str(),
                Status::NoResponse.as_str(),
                "NO_RESPONSE_ACK",
                None,
                None,
            )
            .await
            .map_err(ApiError::storage)?;

        info!(session = %session_id, "generic acknowledgement, suppressing reply");
        return Ok(Json(ChatResponse {
            topic: Topic::Others,
            status: Status::NoResponse,
            session_id,
            response: None,
        }));
    }

    // Save the user message before classification so the rendered history
    // includes the new turn.
    store
        .append(&session_id, "user", message, None, None)
        .await
        .map_err(ApiError::storage)?;

    let history = store.history(&session_id).await.map_err(ApiError::storage)?;
    let rendered = triage::render_history(
        history.iter().map(|m| (m.role.as_str(), m.content.as_str())),
    );

    let verdict = state
        .classifier
        .classify(&rendered)
        .await
        .map_err(ApiError::upstream)?;

    info!(
        session = %session_id,
        topic = verdict.topic.as_str(),
        status = verdict.status.as_str(),
        confidence = verdict.confidence,
        "classified"
    );

    let response = match verdict.status {
        Status::NoResponse => None,
        _ if verdict.response_message.is_empty() => None,
        _ => {
            store
                .append(
                    &session_id,
                    "assistant",
                    &verdict.response_message,
                    Some(verdict.topic.as_str()),
                    Some(verdict.status.as_str()),
                )
                .await
                .map_err(ApiError::storage)?;
            Some(verdict.response_message.clone())
        }
    };

    store
        .record_classification(
            &session_id,
            verdict.topic.as_str(),
            verdict.status.as_str(),
            &verdict.response_message,
            Some(verdict.confidence),
            Some(&verdict.justification),
        )
        .await
        .map_err(ApiError::storage)?;

    Ok(Json(ChatResponse {
        topic: verdict.topic,
        status: verdict.status,
        session_id,
        response,
    }))
}

pub async fn messages_handler(
    State(state): State<AppState>,
    Query(params): Query<MessagesQuery>,
) -> ApiResult<Json<Value>> {
    if !is_valid_session_id(&params.session_id) {
        return Err(ApiError::bad_request("invalid session token"));
    }

    let store = ConversationStore::new(state.db.clone());
    let messages = store
        .recent(&params.session_id, params.limit.clamp(1, 200))
        .await
        .map_err(ApiError::storage)?;

    Ok(Json(json!({ "messages": messages })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        for _ in 0..10 {
            let id = new_session_id();
            assert!(is_valid_session_id(&id), "rejected own token {}", id);
        }
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for id in [
            "",
            "session_",
            "session_123",
            "session__abcd",
            "sess_1712000000000_abcd",
            "session_17120000000aa_abcd",
            "session_1712000000000_ABCD",
            "session_1712000000000_ab",
            "session_1712000000000_",
            "1712000000000_abcd",
        ] {
            assert!(!is_valid_session_id(id), "accepted {}", id);
        }
    }

    #[test]
    fn legacy_client_shape_still_validates() {
        // The documented wire shape: unix millis plus a base36 suffix.
        assert!(is_valid_session_id("session_1712000000000_k3j9x0"));
    }
}
