//! Bot lifecycle: build the `whatsapp-rust` bot, wire its events, run it.

use std::sync::Arc;

use chorus_core::{error::ChorusError, message::Inbound};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

use super::events::handle_message;
use super::qr::generate_qr_terminal;
use super::WhatsAppTransport;
use crate::session_store::SessionStore;

fn show_pairing_code(code: &str) {
    match generate_qr_terminal(code) {
        Ok(qr) => {
            eprintln!("\nScan with WhatsApp > Linked devices > Link a device:\n\n{qr}");
        }
        Err(e) => warn!("whatsapp: cannot render pairing QR: {e}"),
    }
}

impl WhatsAppTransport {
    /// Build the bot and run it in the background, forwarding messages to `tx`.
    pub(super) async fn build_and_run_bot(
        &self,
        tx: mpsc::Sender<Inbound>,
    ) -> Result<(), ChorusError> {
        let db_path = self.session_db_path();
        info!("whatsapp: building bot (session: {})", db_path.display());

        let backend = Arc::new(
            SessionStore::open(&db_path)
                .await
                .map_err(|e| ChorusError::Channel(format!("whatsapp store init failed: {e}")))?,
        );
        let shared = self.shared.clone();

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some("Chorus".to_string()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, client| {
                let shared = shared.clone();
                let tx = tx.clone();
                async move {
                    match event {
                        Event::PairingQrCode { code, .. } => {
                            info!("whatsapp: pairing QR generated");
                            debug!("whatsapp: QR data {code}");
                            show_pairing_code(&code);
                        }
                        Event::PairSuccess(_) => info!("whatsapp: paired"),
                        Event::Connected(_) => {
                            info!("whatsapp: connected");
                            *shared.client.lock().await = Some(client);
                        }
                        Event::Disconnected(_) => {
                            warn!("whatsapp: disconnected");
                            *shared.client.lock().await = None;
                        }
                        Event::LoggedOut(_) => {
                            warn!("whatsapp: logged out, delete the session to pair again");
                            *shared.client.lock().await = None;
                        }
                        Event::Message(msg, info) => {
                            handle_message(*msg, info, client, &shared, &tx).await;
                        }
                        _ => {}
                    }
                }
            })
            .build()
            .await
            .map_err(|e| ChorusError::Channel(format!("whatsapp bot build failed: {e}")))?;

        *self.shared.client.lock().await = Some(bot.client());

        let _handle = bot
            .run()
            .await
            .map_err(|e| ChorusError::Channel(format!("whatsapp bot run failed: {e}")))?;

        Ok(())
    }
}
