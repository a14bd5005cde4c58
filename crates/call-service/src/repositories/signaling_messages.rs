//! Signaling messages repository.
//!
//! The relay is a post/poll/purge contract: append a message, read messages
//! past a cursor with the poster filtered out, hard-delete at teardown. A
//! relational table backs the contract here; per-session ordering rides on
//! the monotonic BIGSERIAL id, and nothing is promised about ordering
//! across sessions.
//!
//! Delivery is at-least-once: a consumer restarting with cursor 0 replays
//! the session's history, which is the intended reconnection path.

use crate::errors::CallError;
use crate::models::SignalMessageResponse;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Repository for signaling relay operations.
pub struct SignalingMessagesRepository;

impl SignalingMessagesRepository {
    /// Append a message to a session's channel.
    #[instrument(skip_all, fields(session_id = %session_id, sender = %sender))]
    pub async fn post(
        pool: &PgPool,
        session_id: Uuid,
        sender: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, CallError> {
        let start = Instant::now();

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO signaling_messages (session_id, sender, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(session_id)
        .bind(sender)
        .bind(payload)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("post_signal", "error", start.elapsed());
            CallError::Database(e.to_string())
        })?;

        metrics::record_db_query("post_signal", "success", start.elapsed());
        metrics::record_signal_posted();

        Ok(row.0)
    }

    /// Poll messages past the cursor, excluding the given sender.
    ///
    /// Returns up to `batch_size` messages with `id > cursor` in ascending
    /// id order. With no `exclude_sender`, every sender's messages are
    /// returned.
    #[instrument(skip_all, fields(session_id = %session_id, cursor = cursor))]
    pub async fn poll(
        pool: &PgPool,
        session_id: Uuid,
        cursor: i64,
        exclude_sender: Option<&str>,
        batch_size: i64,
    ) -> Result<Vec<SignalMessageResponse>, CallError> {
        let rows: Vec<SignalMessageRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, sender, payload, created_at
            FROM signaling_messages
            WHERE session_id = $1
              AND id > $2
              AND ($3::text IS NULL OR sender <> $3)
            ORDER BY id ASC
            LIMIT $4
            "#,
        )
        .bind(session_id)
        .bind(cursor)
        .bind(exclude_sender)
        .bind(batch_size)
        .fetch_all(pool)
        .await?;

        metrics::record_signals_polled(rows.len());

        Ok(rows
            .into_iter()
            .map(|r| SignalMessageResponse {
                id: r.id,
                session_id: r.session_id,
                sender: r.sender,
                payload: r.payload,
                created_at: r.created_at,
            })
            .collect())
    }

    /// Hard-delete all messages for a session. Used at teardown.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn purge(pool: &PgPool, session_id: Uuid) -> Result<u64, CallError> {
        let result = sqlx::query(
            r#"
            DELETE FROM signaling_messages
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete messages older than the retention window, across all sessions.
    ///
    /// Run opportunistically on every post and periodically by the
    /// background sweep, so the channel never grows unbounded.
    #[instrument(skip_all, fields(retention_seconds = retention_seconds))]
    pub async fn sweep_expired(pool: &PgPool, retention_seconds: u64) -> Result<u64, CallError> {
        let result = sqlx::query(
            r#"
            DELETE FROM signaling_messages
            WHERE created_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(retention_seconds.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete messages whose session has ended.
    ///
    /// Backstop for endpoints that crashed before calling purge.
    #[instrument(skip_all)]
    pub async fn purge_ended_sessions(pool: &PgPool) -> Result<u64, CallError> {
        let result = sqlx::query(
            r#"
            DELETE FROM signaling_messages
            USING call_sessions
            WHERE signaling_messages.session_id = call_sessions.id
              AND call_sessions.status = 'ended'
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct SignalMessageRow {
    id: i64,
    session_id: Uuid,
    sender: String,
    payload: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}
