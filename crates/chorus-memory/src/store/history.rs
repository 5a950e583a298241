//! Chat history log.
//!
//! The WhatsApp Web protocol only delivers messages live, so the transport
//! records everything it sees here and serves history fetches from it.

use super::Store;
use chorus_core::{
    error::ChorusError,
    message::{InboundMessage, Media, MessageKind},
};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

type HistoryRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    bool,
    Option<String>,
    bool,
    String,
);

/// Fixed-width UTC timestamp so text ordering matches time ordering.
pub(super) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn from_row(row: HistoryRow) -> InboundMessage {
    let (id, chat_id, sender_id, sender_name, body, kind, from_me, quoted_id, quoted_from_me, ts) =
        row;
    InboundMessage {
        id,
        chat_id,
        sender_id,
        sender_name,
        body,
        kind: MessageKind::parse(&kind),
        from_me,
        timestamp: parse_ts(&ts),
        quoted_id,
        quoted_from_me,
    }
}

impl Store {
    /// Record a message and its media. Re-recording the same id keeps the first copy.
    pub async fn record_message(
        &self,
        message: &InboundMessage,
        media: Option<&Media>,
    ) -> Result<(), ChorusError> {
        sqlx::query(
            "INSERT OR IGNORE INTO chat_messages \
             (id, chat_id, sender_id, sender_name, body, kind, from_me, quoted_id, \
              quoted_from_me, media, media_type, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.body)
        .bind(message.kind.as_str())
        .bind(message.from_me)
        .bind(&message.quoted_id)
        .bind(message.quoted_from_me)
        .bind(media.map(|m| m.data.as_slice()))
        .bind(media.map(|m| m.mime_type.as_str()))
        .bind(format_ts(message.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("record message failed: {e}")))?;
        Ok(())
    }

    /// Most recent messages of a chat, newest first.
    pub async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ChorusError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, chat_id, sender_id, sender_name, body, kind, from_me, quoted_id, \
             quoted_from_me, created_at \
             FROM chat_messages WHERE chat_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("recent messages failed: {e}")))?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Media stored with a message, if any.
    pub async fn message_media(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<Media>, ChorusError> {
        let row: Option<(Option<Vec<u8>>, Option<String>)> = sqlx::query_as(
            "SELECT media, media_type FROM chat_messages WHERE chat_id = ? AND id = ?",
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("message media failed: {e}")))?;

        Ok(match row {
            Some((Some(data), mime)) => Some(Media::new(
                data,
                mime.unwrap_or_else(|| "application/octet-stream".to_string()),
            )),
            _ => None,
        })
    }

    /// Whether a recorded message was sent by the bot. `None` if unknown.
    pub async fn is_from_me(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<bool>, ChorusError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT from_me FROM chat_messages WHERE chat_id = ? AND id = ?")
                .bind(chat_id)
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ChorusError::Memory(format!("is_from_me failed: {e}")))?;
        Ok(row.map(|(v,)| v))
    }

    /// Sender id and display name of a recorded message.
    pub async fn message_sender(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<(String, Option<String>)>, ChorusError> {
        sqlx::query_as(
            "SELECT sender_id, sender_name FROM chat_messages WHERE chat_id = ? AND id = ?",
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("message sender failed: {e}")))
    }

    /// Delete messages recorded before `cutoff`, and the spoken text of any
    /// voice note that went with them. Returns the number of messages removed.
    pub async fn purge_history_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ChorusError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE created_at < ?")
            .bind(format_ts(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| ChorusError::Memory(format!("purge history failed: {e}")))?;
        let removed = result.rows_affected();
        if removed == 0 {
            return Ok(0);
        }

        sqlx::query(
            "DELETE FROM spoken_replies WHERE NOT EXISTS \
             (SELECT 1 FROM chat_messages m \
              WHERE m.chat_id = spoken_replies.chat_id AND m.id = spoken_replies.message_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("purge spoken replies failed: {e}")))?;

        debug!("store: purged {removed} history messages older than {cutoff}");
        Ok(removed)
    }

    /// Latest known display name for a sender across all chats.
    pub async fn sender_name(&self, sender_id: &str) -> Result<Option<String>, ChorusError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT sender_name FROM chat_messages \
             WHERE sender_id = ? AND sender_name IS NOT NULL AND sender_name != '' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(sender_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("sender name failed: {e}")))?;
        Ok(row.map(|(n,)| n))
    }
}
