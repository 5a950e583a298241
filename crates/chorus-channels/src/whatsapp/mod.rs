//! WhatsApp transport over the WhatsApp Web protocol (`whatsapp-rust`).
//!
//! Pairing is done by scanning a QR code printed to the terminal. The
//! protocol session lives in `{data_dir}/whatsapp_session/whatsapp.db`.
//! WhatsApp Web only delivers messages live, so every message seen or sent
//! is recorded in the Chorus history log, which serves history fetches.

mod bot;
mod events;
mod qr;
mod send;
mod transport;

#[cfg(test)]
mod tests;

pub use qr::generate_qr_terminal;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chorus_core::{config::WhatsAppConfig, error::ChorusError};
use chorus_memory::Store;
use tokio::sync::Mutex;
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;

/// State shared between the transport and the bot's event handler.
pub(super) struct Shared {
    pub(super) config: WhatsAppConfig,
    pub(super) history: Store,
    /// Set once the bot connects, cleared on disconnect.
    pub(super) client: Mutex<Option<Arc<Client>>>,
    /// Ids of messages we sent, so their echoes are not treated as inbound.
    pub(super) sent_ids: Mutex<HashSet<String>>,
}

impl Shared {
    pub(super) async fn connected_client(&self) -> Result<Arc<Client>, ChorusError> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| ChorusError::Channel("whatsapp client not connected".into()))
    }
}

/// WhatsApp transport.
pub struct WhatsAppTransport {
    pub(super) shared: Arc<Shared>,
    pub(super) session_dir: PathBuf,
}

impl WhatsAppTransport {
    pub fn new(config: WhatsAppConfig, session_dir: impl Into<PathBuf>, history: Store) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                history,
                client: Mutex::new(None),
                sent_ids: Mutex::new(HashSet::new()),
            }),
            session_dir: session_dir.into(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.client.lock().await.is_some()
    }

    /// Whether a paired session exists on disk.
    pub fn is_paired(&self) -> bool {
        self.session_db_path().exists()
    }

    pub(super) fn session_db_path(&self) -> PathBuf {
        self.session_dir.join("whatsapp.db")
    }
}

pub(super) fn parse_jid(jid: &str) -> Result<Jid, ChorusError> {
    jid.parse()
        .map_err(|e| ChorusError::Channel(format!("invalid whatsapp JID '{jid}': {e}")))
}
