//! HTTP server for the care-line chat
//!
//! Endpoints consumed by the embedded browser client:
//! - GET  /             - chat page
//! - GET  /api/status   - health check
//! - POST /api/session  - issue a session token
//! - POST /api/chat     - classification exchange
//! - GET  /api/messages - per-session message history

mod chat;
pub mod error;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::classifier::Classifier;

pub use chat::{new_session_id, ChatRequest, ChatResponse};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub classifier: Arc<dyn Classifier>,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/api/session", post(session_handler))
        // Both forms: the browser client posts to the trailing-slash path.
        .route("/api/chat", post(chat::chat_handler))
        .route("/api/chat/", post(chat::chat_handler))
        .route("/api/messages", get(chat::messages_handler))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(port: u16, state: AppState) -> Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();

    let body = Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
    }));

    if db_ok {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

async fn session_handler() -> Json<serde_json::Value> {
    Json(json!({ "session_id": new_session_id() }))
}
