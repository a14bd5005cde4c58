//! Call sessions repository for database operations.
//!
//! Every mutation is a single atomic row update; there is no multi-row
//! transaction guarding compound flows like answering a call. The answer
//! sequence (connect, decline-broadcast, answered-signal) is three
//! independent round trips by design and a failure between them leaves a
//! partially-converged state that the pollers resolve on later ticks.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)

use crate::errors::CallError;
use crate::models::CallSessionRow;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use common::types::{CallerType, SessionStatus};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Columns selected for every session query.
const SESSION_COLUMNS: &str = r#"
    id, project_id, kiosk_id, caller_type, status,
    staff_user_id, room_name, notes, started_at, ended_at
"#;

/// Filter for session lookups. All fields optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub caller_type: Option<CallerType>,
    pub project_id: Option<Uuid>,
    pub kiosk_id: Option<String>,
}

/// Repository for call session operations.
pub struct CallSessionsRepository;

impl CallSessionsRepository {
    /// Create a session in status `waiting`.
    #[instrument(skip_all, fields(project_id = %project_id, kiosk_id = %kiosk_id))]
    pub async fn create(
        pool: &PgPool,
        project_id: Uuid,
        kiosk_id: &str,
        caller_type: CallerType,
        room_name: &str,
        notes: Option<&str>,
    ) -> Result<CallSessionRow, CallError> {
        let start = Instant::now();

        let row: CallSessionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO call_sessions (project_id, kiosk_id, caller_type, status, room_name, notes)
            VALUES ($1, $2, $3, 'waiting', $4, $5)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(project_id)
        .bind(kiosk_id)
        .bind(caller_type.as_str())
        .bind(room_name)
        .bind(notes)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_session", "error", start.elapsed());
            CallError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_session", "success", start.elapsed());

        tracing::info!(
            target: "call.repository.sessions",
            session_id = %row.id,
            project_id = %project_id,
            kiosk_id = %kiosk_id,
            caller_type = %caller_type.as_str(),
            "Created call session"
        );

        Ok(row)
    }

    /// Claim a waiting session (transition to `connected`).
    ///
    /// Only rows currently `waiting` are updated; ended sessions are never
    /// resurrected. Returns whether a row changed.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn set_connected(
        pool: &PgPool,
        id: Uuid,
        staff_user_id: Option<Uuid>,
    ) -> Result<bool, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions
            SET status = 'connected', staff_user_id = $2
            WHERE id = $1
              AND status = 'waiting'
            "#,
        )
        .bind(id)
        .bind(staff_user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// End a session.
    ///
    /// Idempotent: a session already `ended` keeps its original `ended_at`.
    /// Returns whether a row changed.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn set_ended(
        pool: &PgPool,
        id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions
            SET status = 'ended', ended_at = $2
            WHERE id = $1
              AND status <> 'ended'
            "#,
        )
        .bind(id)
        .bind(ended_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Update the mutable descriptive fields of a session.
    ///
    /// Used by `PUT /video-sessions` for the non-lifecycle fields.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn update_details(
        pool: &PgPool,
        id: Uuid,
        started_at: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<bool, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions
            SET started_at = COALESCE($2, started_at),
                notes = COALESCE($3, notes)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(started_at)
        .bind(notes)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Find a session by id.
    #[instrument(skip_all, fields(session_id = %id))]
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<CallSessionRow>, CallError> {
        let row: Option<CallSessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM call_sessions
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Find sessions matching a filter, most recent first.
    #[instrument(skip_all)]
    pub async fn find(
        pool: &PgPool,
        filter: &SessionFilter,
    ) -> Result<Vec<CallSessionRow>, CallError> {
        let rows: Vec<CallSessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM call_sessions
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR caller_type = $2)
              AND ($3::uuid IS NULL OR project_id = $3)
              AND ($4::text IS NULL OR kiosk_id = $4)
            ORDER BY started_at DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.caller_type.map(|c| c.as_str()))
        .bind(filter.project_id)
        .bind(filter.kiosk_id.as_deref())
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Reap zombie connected sessions for a site.
    ///
    /// A connected session with no recorded end whose `started_at` is older
    /// than the threshold belongs to a crashed or abandoned endpoint; there
    /// is no heartbeat, so elapsed time is the only liveness signal.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn reap_stale_connected(
        pool: &PgPool,
        project_id: Uuid,
        threshold_seconds: u64,
    ) -> Result<u64, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions
            SET status = 'ended', ended_at = NOW()
            WHERE project_id = $1
              AND status = 'connected'
              AND ended_at IS NULL
              AND started_at < NOW() - ($2 || ' seconds')::INTERVAL
            "#,
        )
        .bind(project_id)
        .bind(threshold_seconds.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Reap abandoned waiting sessions for a site.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn reap_stale_waiting(
        pool: &PgPool,
        project_id: Uuid,
        threshold_seconds: u64,
    ) -> Result<u64, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions
            SET status = 'ended', ended_at = NOW()
            WHERE project_id = $1
              AND status = 'waiting'
              AND started_at < NOW() - ($2 || ' seconds')::INTERVAL
            "#,
        )
        .bind(project_id)
        .bind(threshold_seconds.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// The connected session for a site, if any remains after reaping.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn active_connected(
        pool: &PgPool,
        project_id: Uuid,
    ) -> Result<Option<CallSessionRow>, CallError> {
        let row: Option<CallSessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM call_sessions
            WHERE project_id = $1
              AND status = 'connected'
            ORDER BY started_at DESC
            LIMIT 1
            "#
        ))
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Count waiting kiosk-originated sessions for a site, leaving out the
    /// caller's own kiosk.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub async fn count_waiting_kiosk_calls(
        pool: &PgPool,
        project_id: Uuid,
        exclude_kiosk_id: Option<&str>,
    ) -> Result<i64, CallError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM call_sessions
            WHERE project_id = $1
              AND status = 'waiting'
              AND caller_type = 'kiosk'
              AND ($2::text IS NULL OR kiosk_id <> $2)
            "#,
        )
        .bind(project_id)
        .bind(exclude_kiosk_id)
        .fetch_one(pool)
        .await?;

        Ok(count.0)
    }

    /// End every other waiting kiosk-originated session for a site.
    ///
    /// Run when a session is answered: competing kiosks observe on their
    /// next poll that their request was superseded. Returns the number of
    /// sessions declined.
    #[instrument(skip_all, fields(answered_session_id = %answered_session_id, project_id = %project_id))]
    pub async fn decline_others(
        pool: &PgPool,
        answered_session_id: Uuid,
        project_id: Uuid,
    ) -> Result<u64, CallError> {
        let result = sqlx::query(
            r#"
            UPDATE call_sessions
            SET status = 'ended', ended_at = NOW()
            WHERE project_id = $1
              AND caller_type = 'kiosk'
              AND status = 'waiting'
              AND id <> $2
            "#,
        )
        .bind(project_id)
        .bind(answered_session_id)
        .execute(pool)
        .await?;

        let count = result.rows_affected();

        if count > 0 {
            tracing::info!(
                target: "call.repository.sessions",
                answered_session_id = %answered_session_id,
                project_id = %project_id,
                declined = count,
                "Declined competing waiting sessions"
            );
        }

        Ok(count)
    }
}
