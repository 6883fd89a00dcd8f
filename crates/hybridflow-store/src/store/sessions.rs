//! Per-chat session state: pause flag and activity timestamps.

use super::{parse_ts, ts, Store};
use chrono::{DateTime, Utc};
use hybridflow_core::error::HybridflowError;
use serde::Serialize;

/// One row per (tenant, chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub tenant_id: i64,
    pub chat_id: String,
    pub is_paused: bool,
    pub pause_reason: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_human_at: Option<DateTime<Utc>>,
}

type SessionRow = (i64, String, bool, Option<String>, Option<String>, Option<String>);

const SESSION_COLUMNS: &str =
    "tenant_id, chat_id, is_paused, pause_reason, last_message_at, last_human_at";

fn into_session(row: SessionRow) -> Session {
    let (tenant_id, chat_id, is_paused, pause_reason, last_message_at, last_human_at) = row;
    Session {
        tenant_id,
        chat_id,
        is_paused,
        pause_reason,
        last_message_at: parse_ts(last_message_at),
        last_human_at: parse_ts(last_human_at),
    }
}

impl Store {
    /// Record inbound activity for a chat, creating the session if needed.
    /// Pause state is left untouched.
    pub async fn upsert_session_activity(
        &self,
        tenant_id: i64,
        chat_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), HybridflowError> {
        let at = ts(at);
        sqlx::query(
            "INSERT INTO sessions (tenant_id, chat_id, last_message_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(tenant_id, chat_id) DO UPDATE SET \
                 last_message_at = excluded.last_message_at, \
                 updated_at = excluded.updated_at",
        )
        .bind(tenant_id)
        .bind(chat_id)
        .bind(&at)
        .bind(&at)
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("session upsert failed: {e}")))?;
        Ok(())
    }

    /// Pause a chat. `last_human_at` is always written with the flag.
    pub async fn set_paused(
        &self,
        tenant_id: i64,
        chat_id: &str,
        reason: &str,
        last_human_at: DateTime<Utc>,
    ) -> Result<(), HybridflowError> {
        let at = ts(last_human_at);
        sqlx::query(
            "INSERT INTO sessions (tenant_id, chat_id, is_paused, pause_reason, last_human_at, updated_at) \
             VALUES (?, ?, 1, ?, ?, ?) \
             ON CONFLICT(tenant_id, chat_id) DO UPDATE SET \
                 is_paused = 1, \
                 pause_reason = excluded.pause_reason, \
                 last_human_at = excluded.last_human_at, \
                 updated_at = excluded.updated_at",
        )
        .bind(tenant_id)
        .bind(chat_id)
        .bind(reason)
        .bind(&at)
        .bind(&at)
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("pause session failed: {e}")))?;
        Ok(())
    }

    pub async fn get_session(
        &self,
        tenant_id: i64,
        chat_id: &str,
    ) -> Result<Option<Session>, HybridflowError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE tenant_id = ? AND chat_id = ?"
        ))
        .bind(tenant_id)
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("get session failed: {e}")))?;

        Ok(row.map(into_session))
    }

    /// Resume a chat. Returns false if no session exists.
    pub async fn clear_pause(&self, tenant_id: i64, chat_id: &str) -> Result<bool, HybridflowError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_paused = 0, pause_reason = NULL, updated_at = ? \
             WHERE tenant_id = ? AND chat_id = ?",
        )
        .bind(ts(Utc::now()))
        .bind(tenant_id)
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("resume session failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Resume every session whose last human activity is older than `cutoff`.
    pub async fn resume_stale_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, HybridflowError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_paused = 0, pause_reason = NULL, updated_at = ? \
             WHERE is_paused = 1 AND last_human_at < ?",
        )
        .bind(ts(Utc::now()))
        .bind(ts(cutoff))
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("auto-resume failed: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Count sessions as `(total, paused)`.
    pub async fn session_counts(&self) -> Result<(i64, i64), HybridflowError> {
        sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(is_paused), 0) FROM sessions",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("count sessions failed: {e}")))
    }
}
