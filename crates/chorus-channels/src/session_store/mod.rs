//! Protocol session storage for `whatsapp-rust`, kept in SQLite through sqlx.
//!
//! The library needs four stores (signal keys, app-state sync, protocol
//! bookkeeping, device identity). `whatsapp-rust-sqlite-storage` would pull in
//! diesel, whose `libsqlite3-sys` clashes with the one sqlx links, so the
//! stores are implemented here on the same pool type the rest of Chorus uses.

mod app_sync;
mod device;
mod protocol;
mod signal;


use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::debug;
use wacore::store::error::db_err;

type Result<T> = wacore::store::error::Result<T>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS wa_identities (
    address  TEXT PRIMARY KEY,
    key_data BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS wa_sessions (
    address      TEXT PRIMARY KEY,
    session_data BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS wa_prekeys (
    id       INTEGER PRIMARY KEY,
    record   BLOB NOT NULL,
    uploaded INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS wa_signed_prekeys (
    id     INTEGER PRIMARY KEY,
    record BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS wa_sender_keys (
    address TEXT PRIMARY KEY,
    record  BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS wa_app_sync_keys (
    key_id      BLOB PRIMARY KEY,
    key_data    BLOB NOT NULL,
    timestamp   INTEGER NOT NULL DEFAULT 0,
    fingerprint BLOB
);
CREATE TABLE IF NOT EXISTS wa_app_versions (
    collection TEXT PRIMARY KEY,
    data       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS wa_mutation_macs (
    collection TEXT NOT NULL,
    index_mac  BLOB NOT NULL,
    version    INTEGER NOT NULL,
    value_mac  BLOB NOT NULL,
    PRIMARY KEY (collection, index_mac)
);
CREATE TABLE IF NOT EXISTS wa_skdm_recipients (
    group_jid  TEXT NOT NULL,
    device_jid TEXT NOT NULL,
    PRIMARY KEY (group_jid, device_jid)
);
CREATE TABLE IF NOT EXISTS wa_lid_mappings (
    lid             TEXT PRIMARY KEY,
    phone_number    TEXT NOT NULL,
    created_at      INTEGER NOT NULL DEFAULT 0,
    updated_at      INTEGER NOT NULL DEFAULT 0,
    learning_source TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS wa_base_keys (
    address    TEXT NOT NULL,
    message_id TEXT NOT NULL,
    base_key   BLOB NOT NULL,
    PRIMARY KEY (address, message_id)
);
CREATE TABLE IF NOT EXISTS wa_device_lists (
    user TEXT PRIMARY KEY,
    data TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS wa_forget_sender_keys (
    group_jid   TEXT NOT NULL,
    participant TEXT NOT NULL,
    PRIMARY KEY (group_jid, participant)
);
CREATE TABLE IF NOT EXISTS wa_device_info (
    id   INTEGER PRIMARY KEY,
    data BLOB NOT NULL
);
";

/// WhatsApp session store.
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Open (creating if needed) the session database at `path`.
    pub async fn open(path: &Path) -> std::result::Result<Self, sqlx::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display())).await?;
        Self::with_pool(pool).await
    }

    /// Single-connection in-memory store.
    pub async fn in_memory() -> std::result::Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> std::result::Result<Self, sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        debug!("session store: schema ready");
        Ok(Self { pool })
    }

    async fn blob_by_key(&self, sql: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(blob,)| blob))
    }

    async fn blob_by_id(&self, sql: &str, id: u32) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(sql)
            .bind(i64::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(blob,)| blob))
    }

    async fn put_by_key(&self, sql: &str, key: &str, blob: &[u8]) -> Result<()> {
        sqlx::query(sql)
            .bind(key)
            .bind(blob)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_by_key(&self, sql: &str, key: &str) -> Result<()> {
        sqlx::query(sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_by_id(&self, sql: &str, id: u32) -> Result<()> {
        sqlx::query(sql)
            .bind(i64::from(id))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn strings_by_key(&self, sql: &str, key: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(sql)
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}
