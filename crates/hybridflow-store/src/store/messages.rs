//! Inbound and outbound message rows.

use super::{parse_ts, Store};
use chrono::{DateTime, Utc};
use hybridflow_core::error::HybridflowError;
use serde::Serialize;
use serde_json::Value;

/// A message to persist.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub tenant_id: i64,
    pub chat_id: &'a str,
    pub message_id: &'a str,
    pub from_me: Option<bool>,
    pub message_type: Option<&'a str>,
    pub text: Option<&'a str>,
    pub raw: &'a Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub tenant_id: i64,
    pub chat_id: String,
    pub message_id: String,
    pub from_me: Option<bool>,
    pub message_type: Option<String>,
    pub text: Option<String>,
    pub raw: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

type MessageRow = (
    i64,
    String,
    String,
    Option<bool>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const MESSAGE_COLUMNS: &str =
    "tenant_id, chat_id, message_id, from_me, message_type, text, raw, created_at";

fn into_message(row: MessageRow) -> StoredMessage {
    let (tenant_id, chat_id, message_id, from_me, message_type, text, raw, created_at) = row;
    StoredMessage {
        tenant_id,
        chat_id,
        message_id,
        from_me,
        message_type,
        text,
        raw: raw.and_then(|r| serde_json::from_str(&r).ok()),
        created_at: parse_ts(created_at),
    }
}

impl Store {
    /// Insert or refresh a message keyed by (tenant, message id).
    ///
    /// Redeliveries of the same id overwrite the row. A missing sender flag or
    /// text on a redelivery keeps the stored value.
    pub async fn upsert_message(&self, msg: &NewMessage<'_>) -> Result<(), HybridflowError> {
        sqlx::query(
            "INSERT INTO messages (tenant_id, chat_id, message_id, from_me, message_type, text, raw) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(tenant_id, message_id) DO UPDATE SET \
                 chat_id = excluded.chat_id, \
                 from_me = COALESCE(excluded.from_me, messages.from_me), \
                 message_type = COALESCE(excluded.message_type, messages.message_type), \
                 text = COALESCE(excluded.text, messages.text), \
                 raw = excluded.raw",
        )
        .bind(msg.tenant_id)
        .bind(msg.chat_id)
        .bind(msg.message_id)
        .bind(msg.from_me)
        .bind(msg.message_type)
        .bind(msg.text)
        .bind(msg.raw.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("upsert message failed: {e}")))?;
        Ok(())
    }

    /// Insert a message. Returns false if the id already exists for the tenant.
    pub async fn insert_message(&self, msg: &NewMessage<'_>) -> Result<bool, HybridflowError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO messages \
             (tenant_id, chat_id, message_id, from_me, message_type, text, raw) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.tenant_id)
        .bind(msg.chat_id)
        .bind(msg.message_id)
        .bind(msg.from_me)
        .bind(msg.message_type)
        .bind(msg.text)
        .bind(msg.raw.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("insert message failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_message(
        &self,
        tenant_id: i64,
        message_id: &str,
    ) -> Result<Option<StoredMessage>, HybridflowError> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE tenant_id = ? AND message_id = ?"
        ))
        .bind(tenant_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("get message failed: {e}")))?;

        Ok(row.map(into_message))
    }

    /// Last `limit` messages of a chat, oldest first, skipping `exclude_message_id`.
    pub async fn recent_messages(
        &self,
        tenant_id: i64,
        chat_id: &str,
        limit: usize,
        exclude_message_id: &str,
    ) -> Result<Vec<StoredMessage>, HybridflowError> {
        let mut rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE tenant_id = ? AND chat_id = ? AND message_id != ? \
             ORDER BY id DESC LIMIT ?"
        ))
        .bind(tenant_id)
        .bind(chat_id)
        .bind(exclude_message_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("recent messages failed: {e}")))?;

        rows.reverse();
        Ok(rows.into_iter().map(into_message).collect())
    }
}
