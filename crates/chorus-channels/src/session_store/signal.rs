//! Identity keys, sessions, prekeys, and sender keys.

use async_trait::async_trait;
use wacore::store::error::db_err;
use wacore::store::traits::SignalStore;

use super::{Result, SessionStore};

#[async_trait]
impl SignalStore for SessionStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        self.put_by_key(
            "INSERT OR REPLACE INTO wa_identities (address, key_data) VALUES (?, ?)",
            address,
            &key,
        )
        .await
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.blob_by_key("SELECT key_data FROM wa_identities WHERE address = ?", address)
            .await
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        self.delete_by_key("DELETE FROM wa_identities WHERE address = ?", address)
            .await
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.blob_by_key("SELECT session_data FROM wa_sessions WHERE address = ?", address)
            .await
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        self.put_by_key(
            "INSERT OR REPLACE INTO wa_sessions (address, session_data) VALUES (?, ?)",
            address,
            session,
        )
        .await
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        self.delete_by_key("DELETE FROM wa_sessions WHERE address = ?", address)
            .await
    }

    async fn store_prekey(&self, id: u32, record: &[u8], uploaded: bool) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO wa_prekeys (id, record, uploaded) VALUES (?, ?, ?)")
            .bind(i64::from(id))
            .bind(record)
            .bind(uploaded)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        self.blob_by_id("SELECT record FROM wa_prekeys WHERE id = ?", id)
            .await
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        self.delete_by_id("DELETE FROM wa_prekeys WHERE id = ?", id)
            .await
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO wa_signed_prekeys (id, record) VALUES (?, ?)")
            .bind(i64::from(id))
            .bind(record)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        self.blob_by_id("SELECT record FROM wa_signed_prekeys WHERE id = ?", id)
            .await
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let rows: Vec<(i64, Vec<u8>)> =
            sqlx::query_as("SELECT id, record FROM wa_signed_prekeys ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, record)| u32::try_from(id).ok().map(|id| (id, record)))
            .collect())
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        self.delete_by_id("DELETE FROM wa_signed_prekeys WHERE id = ?", id)
            .await
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        self.put_by_key(
            "INSERT OR REPLACE INTO wa_sender_keys (address, record) VALUES (?, ?)",
            address,
            record,
        )
        .await
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.blob_by_key("SELECT record FROM wa_sender_keys WHERE address = ?", address)
            .await
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        self.delete_by_key("DELETE FROM wa_sender_keys WHERE address = ?", address)
            .await
    }
}
