//! Idempotency ledger: one record per (tenant, message, event type) once an
//! action has been taken.

use super::{parse_ts, ts, Store};
use chrono::{DateTime, Utc};
use hybridflow_core::error::HybridflowError;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEvent {
    pub tenant_id: i64,
    pub instance_name: Option<String>,
    pub message_id: String,
    pub event_type: String,
    pub action_taken: String,
    pub processed_at: Option<DateTime<Utc>>,
}

type EventRow = (i64, Option<String>, String, String, String, Option<String>);

impl Store {
    pub async fn has_processed(
        &self,
        tenant_id: i64,
        message_id: &str,
        event_type: &str,
    ) -> Result<bool, HybridflowError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM processed_events \
             WHERE tenant_id = ? AND message_id = ? AND event_type = ? LIMIT 1",
        )
        .bind(tenant_id)
        .bind(message_id)
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("ledger check failed: {e}")))?;

        Ok(row.is_some())
    }

    /// Record an action. Returns false when the triple was already recorded,
    /// which means a concurrent delivery got there first.
    pub async fn record_processed(
        &self,
        tenant_id: i64,
        message_id: &str,
        event_type: &str,
        action_taken: &str,
    ) -> Result<bool, HybridflowError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed_events \
             (tenant_id, message_id, event_type, action_taken, processed_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(message_id)
        .bind(event_type)
        .bind(action_taken)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("ledger record failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete ledger rows processed before `cutoff`.
    pub async fn purge_processed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, HybridflowError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < ?")
            .bind(ts(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| HybridflowError::Store(format!("ledger purge failed: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Most recent ledger rows, newest first, optionally for one tenant.
    pub async fn recent_processed(
        &self,
        tenant_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<ProcessedEvent>, HybridflowError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT p.tenant_id, t.instance_name, p.message_id, p.event_type, \
                    p.action_taken, p.processed_at \
             FROM processed_events p LEFT JOIN tenants t ON t.id = p.tenant_id \
             WHERE (?1 IS NULL OR p.tenant_id = ?1) \
             ORDER BY p.id DESC LIMIT ?2",
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("list processed events failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(
                |(tenant_id, instance_name, message_id, event_type, action_taken, at)| {
                    ProcessedEvent {
                        tenant_id,
                        instance_name,
                        message_id,
                        event_type,
                        action_taken,
                        processed_at: parse_ts(at),
                    }
                },
            )
            .collect())
    }
}
