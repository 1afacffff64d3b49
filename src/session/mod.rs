//! Conversation persistence
//!
//! Append-only message sequences keyed by session id, plus the per-turn
//! classification audit log. Sessions are created implicitly on first
//! append and never expire.

mod types;

pub use types::StoredMessage;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use uuid::Uuid;

/// SQLite-backed store for sessions, messages and classification records.
#[derive(Clone)]
pub struct ConversationStore {
    db: SqlitePool,
}

impl ConversationStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a message to the session, creating the session if absent.
    /// Returns the new message id.
    pub async fn append(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        topic: Option<&str>,
        status: Option<&str>,
    ) -> Result<String> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO conversations (session_id, created_at, updated_at)
            VALUES ($1, $2, $2)
            ON CONFLICT (session_id) DO UPDATE SET updated_at = $2
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.db)
        .await?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, role, content, topic, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&id)
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(topic)
        .bind(status)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    /// Ordered message sequence for the session; empty if the session is
    /// unknown.
    pub async fn history(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, role, content, topic, status, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// Newest-first page of messages for the history endpoint.
    pub async fn recent(&self, session_id: &str, limit: i64) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, role, content, topic, status, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY created_at DESC, rowid DESC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// Number of messages stored for the session.
    pub async fn message_count(&self, session_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }

    /// Append a classification audit row for one turn.
    pub async fn record_classification(
        &self,
        session_id: &str,
        topic: &str,
        status: &str,
        response_message: &str,
        confidence: Option<f64>,
        justification: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO classifications
                (session_id, topic, status, response_message, confidence, justification, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session_id)
        .bind(topic)
        .bind(status)
        .bind(response_message)
        .bind(confidence)
        .bind(justification)
        .bind(Utc::now().timestamp())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> StoredMessage {
    StoredMessage {
        id: row.get("id"),
        role: row.get("role"),
        content: row.get("content"),
        topic: row.get("topic"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> ConversationStore {
        // One connection: each :memory: connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        ConversationStore::new(pool)
    }

    #[tokio::test]
    async fn append_creates_session_implicitly() {
        let store = memory_store().await;
        assert_eq!(store.message_count("s1").await.unwrap(), 0);

        store
            .append("s1", "user", "Hello", None, None)
            .await
            .unwrap();
        assert_eq!(store.message_count("s1").await.unwrap(), 1);

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&store.db)
            .await
            .unwrap();
        assert_eq!(sessions, 1);
    }

    #[tokio::test]
    async fn history_is_chronological_and_scoped() {
        let store = memory_store().await;
        store
            .append("s1", "user", "When is my blood test?", None, None)
            .await
            .unwrap();
        store
            .append("s1", "assistant", "Tomorrow at 9am.", Some("LAB"), Some("ok"))
            .await
            .unwrap();
        store
            .append("s2", "user", "unrelated", None, None)
            .await
            .unwrap();

        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].topic.as_deref(), Some("LAB"));
        assert_eq!(history[1].status.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn unknown_session_has_empty_history() {
        let store = memory_store().await;
        assert!(store.history("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let store = memory_store().await;
        for i in 0..5 {
            store
                .append("s1", "user", &format!("msg {}", i), None, None)
                .await
                .unwrap();
        }

        let recent = store.recent("s1", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "msg 4");
        assert_eq!(recent[2].content, "msg 2");
    }

    #[tokio::test]
    async fn classification_rows_are_recorded() {
        let store = memory_store().await;
        store
            .record_classification("s1", "OTHERS", "no_response", "NO_RESPONSE_ACK", None, None)
            .await
            .unwrap();
        store
            .record_classification(
                "s1",
                "LAB",
                "ok",
                "Your results are ready.",
                Some(0.9),
                Some("Lab report question."),
            )
            .await
            .unwrap();

        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT topic, status FROM classifications WHERE session_id = $1 ORDER BY id",
        )
        .bind("s1")
        .fetch_all(&store.db)
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("OTHERS".to_string(), "no_response".to_string()));
        assert_eq!(rows[1], ("LAB".to_string(), "ok".to_string()));
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("chat.db").display());

        {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&url)
                .await
                .unwrap();
            db::run_migrations(&pool).await.unwrap();
            let store = ConversationStore::new(pool.clone());
            store
                .append("stable", "user", "persist me", None, None)
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        let store = ConversationStore::new(pool);
        let history = store.history("stable").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "persist me");
    }
}
