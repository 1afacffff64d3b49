// src/db.rs
//! SQLite migrations: conversation, message and classification-log tables.
//! Run this at startup to guarantee schema compatibility (idempotent).
use anyhow::Result;
use sqlx::{Executor, SqlitePool};

/// One row per chat session; created implicitly on first message.
const CREATE_CONVERSATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    session_id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Append-only message sequence per session. topic/status stay NULL on
/// user messages until the turn has been classified.
const CREATE_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    topic TEXT,
    status TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (session_id) REFERENCES conversations(session_id) ON DELETE CASCADE
);
"#;

/// Per-turn classification audit log.
const CREATE_CLASSIFICATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS classifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    topic TEXT NOT NULL,
    status TEXT NOT NULL,
    response_message TEXT NOT NULL,
    confidence REAL,
    justification TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (session_id) REFERENCES conversations(session_id) ON DELETE CASCADE
);
"#;

const CREATE_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at);
CREATE INDEX IF NOT EXISTS idx_classifications_session ON classifications(session_id, created_at);
CREATE INDEX IF NOT EXISTS idx_classifications_topic ON classifications(topic, status);
"#;

/// Runs all required migrations. Safe to call at every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_CONVERSATIONS).await?;
    pool.execute(CREATE_MESSAGES).await?;
    pool.execute(CREATE_CLASSIFICATIONS).await?;
    pool.execute(CREATE_INDICES).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert!(tables.contains(&"conversations".to_string()));
        assert!(tables.contains(&"messages".to_string()));
        assert!(tables.contains(&"classifications".to_string()));
    }
}
