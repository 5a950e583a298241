//! Transcription TTL cache and spoken-reply cache.

use super::history::format_ts;
use super::Store;
use chorus_core::error::ChorusError;
use chrono::Utc;
use tracing::debug;

impl Store {
    /// Cached transcription for a message, ignoring expired entries.
    pub async fn get_transcript(&self, message_id: &str) -> Result<Option<String>, ChorusError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT text FROM transcripts WHERE message_id = ? AND expires_at > ?")
                .bind(message_id)
                .bind(format_ts(Utc::now()))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ChorusError::Memory(format!("get transcript failed: {e}")))?;
        Ok(row.map(|(t,)| t))
    }

    /// Cache a transcription for the configured TTL.
    pub async fn put_transcript(&self, message_id: &str, text: &str) -> Result<(), ChorusError> {
        let ttl = chrono::Duration::from_std(self.transcript_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(2));
        sqlx::query(
            "INSERT INTO transcripts (message_id, text, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(message_id) DO UPDATE SET text = excluded.text, expires_at = excluded.expires_at",
        )
        .bind(message_id)
        .bind(text)
        .bind(format_ts(Utc::now() + ttl))
        .execute(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("put transcript failed: {e}")))?;
        Ok(())
    }

    /// Delete expired transcriptions. Returns the number removed.
    pub async fn purge_expired_transcripts(&self) -> Result<u64, ChorusError> {
        let result = sqlx::query("DELETE FROM transcripts WHERE expires_at <= ?")
            .bind(format_ts(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| ChorusError::Memory(format!("purge transcripts failed: {e}")))?;
        let removed = result.rows_affected();
        if removed > 0 {
            debug!("store: purged {removed} expired transcripts");
        }
        Ok(removed)
    }

    /// Remember the text behind a voice note the bot sent.
    pub async fn save_spoken_reply(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), ChorusError> {
        sqlx::query(
            "INSERT OR REPLACE INTO spoken_replies (message_id, chat_id, text) VALUES (?, ?, ?)",
        )
        .bind(message_id)
        .bind(chat_id)
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(|e| ChorusError::Memory(format!("save spoken reply failed: {e}")))?;
        Ok(())
    }

    pub async fn get_spoken_reply(&self, message_id: &str) -> Result<Option<String>, ChorusError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT text FROM spoken_replies WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ChorusError::Memory(format!("get spoken reply failed: {e}")))?;
        Ok(row.map(|(t,)| t))
    }
}
