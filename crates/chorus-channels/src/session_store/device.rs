//! The paired device's identity, stored as a single row.

use async_trait::async_trait;
use wacore::store::error::{db_err, StoreError};
use wacore::store::traits::DeviceStore;
use wacore::store::Device;

use super::{Result, SessionStore};

const DEVICE_ROW: i64 = 1;

#[async_trait]
impl DeviceStore for SessionStore {
    async fn save(&self, device: &Device) -> Result<()> {
        // Device keys use serde helpers that need a binary format.
        let blob =
            bincode::serialize(device).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query("INSERT OR REPLACE INTO wa_device_info (id, data) VALUES (?, ?)")
            .bind(DEVICE_ROW)
            .bind(blob)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM wa_device_info WHERE id = ?")
            .bind(DEVICE_ROW)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|(blob,)| {
            bincode::deserialize(&blob).map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn exists(&self) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM wa_device_info WHERE id = ?")
            .bind(DEVICE_ROW)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn create(&self) -> Result<i32> {
        // The row itself is written by `save` once pairing produces keys.
        Ok(DEVICE_ROW as i32)
    }
}
