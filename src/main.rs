//! Careline - care-line SMS triage assistant
//!
//! A thin web wrapper around an LLM classifier: one HTTP exchange per member
//! message, SQLite persistence, Gemini or OpenAI as the backend.

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use careline::classifier::{Classifier, GeminiClassifier, OpenAiClassifier};
use careline::config::Config;
use careline::db;
use careline::server::{self, AppState};

#[derive(Parser)]
#[command(name = "careline")]
#[command(about = "Care-line SMS triage assistant")]
struct Args {
    /// HTTP server port
    #[arg(long)]
    port: Option<u16>,

    /// Database path (sqlite URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Classification backend: gemini or openai
    #[arg(long, env = "LLM_PROVIDER")]
    llm_provider: Option<String>,

    /// API key for the classification backend
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Model name override
    #[arg(long, env = "LLM_MODEL")]
    llm_model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    let config = Config::load();

    let provider = args
        .llm_provider
        .or(config.llm_provider)
        .unwrap_or_else(|| "gemini".to_string());

    let api_key = args.llm_api_key
        .or(config.llm_api_key)
        .expect("LLM_API_KEY required (set via --llm-api-key, env var, or ~/.careline/config.toml)");

    let model = args.llm_model.or(config.llm_model);

    let database_url = args
        .database_url
        .or(config.database_url)
        .unwrap_or_else(|| "sqlite://careline.db?mode=rwc".to_string());

    let port = args.port.or(config.port).unwrap_or(8000);

    // Connect to database
    let db_url = if database_url.starts_with("sqlite") {
        database_url
    } else {
        format!("sqlite:{}", database_url)
    };

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;
    db::run_migrations(&db).await?;

    let classifier: Arc<dyn Classifier> = match provider.to_lowercase().as_str() {
        "gemini" => Arc::new(GeminiClassifier::new(api_key, model)),
        "openai" => Arc::new(OpenAiClassifier::new(api_key, model)),
        other => anyhow::bail!("unsupported LLM provider '{}'", other),
    };

    tracing::info!(provider = classifier.name(), "classification backend ready");

    server::run(port, AppState { db, classifier }).await
}
