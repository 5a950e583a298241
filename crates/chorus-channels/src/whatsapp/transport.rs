//! `Transport` implementation for WhatsApp.

use async_trait::async_trait;
use chorus_core::{
    error::ChorusError,
    message::{Inbound, InboundMessage, Media, MessageKind},
    traits::Transport,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use waproto::whatsapp::{message, ContextInfo, Message};
use whatsapp_rust::download::MediaType;

use super::send::{retry_send, sanitize_for_whatsapp, split_message, MAX_MESSAGE_CHARS};
use super::{parse_jid, WhatsAppTransport};

/// Sender id recorded for the bot's own messages.
const OWN_SENDER: &str = "me";

/// Voice notes must be OGG/Opus to play inline.
const VOICE_NOTE_MIME: &str = "audio/ogg; codecs=opus";

/// Quote block that threads a reply under `original`.
fn quote(original: Option<&InboundMessage>) -> Option<Box<ContextInfo>> {
    let original = original?;
    Some(Box::new(ContextInfo {
        stanza_id: Some(original.id.clone()),
        participant: Some(format!("{}@s.whatsapp.net", original.sender_id)),
        quoted_message: Some(Box::new(Message {
            conversation: Some(original.body.clone()),
            ..Default::default()
        })),
        ..Default::default()
    }))
}

fn text_message(text: &str, reply_to: Option<&InboundMessage>) -> Message {
    match quote(reply_to) {
        None => Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        },
        Some(context) => Message {
            extended_text_message: Some(Box::new(message::ExtendedTextMessage {
                text: Some(text.to_string()),
                context_info: Some(context),
                ..Default::default()
            })),
            ..Default::default()
        },
    }
}

impl WhatsAppTransport {
    /// Remember an outbound message for echo suppression and history.
    async fn remember_sent(
        &self,
        chat_id: &str,
        id: &str,
        kind: MessageKind,
        body: &str,
        media: Option<&Media>,
    ) {
        self.shared.sent_ids.lock().await.insert(id.to_string());

        let record = InboundMessage {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            sender_id: OWN_SENDER.to_string(),
            sender_name: None,
            body: body.to_string(),
            kind,
            from_me: true,
            timestamp: Utc::now(),
            quoted_id: None,
            quoted_from_me: false,
        };
        if let Err(e) = self.shared.history.record_message(&record, media).await {
            warn!("whatsapp: failed to record sent {id}: {e}");
        }
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Inbound>, ChorusError> {
        let (tx, rx) = mpsc::channel(64);
        self.build_and_run_bot(tx).await?;
        info!("whatsapp: transport started");
        Ok(rx)
    }

    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ChorusError> {
        self.shared.history.recent_messages(chat_id, limit).await
    }

    async fn download_media(&self, message: &InboundMessage) -> Result<Media, ChorusError> {
        self.shared
            .history
            .message_media(&message.chat_id, &message.id)
            .await?
            .ok_or_else(|| ChorusError::Channel(format!("no media stored for {}", message.id)))
    }

    async fn contact_name(&self, message: &InboundMessage) -> Result<String, ChorusError> {
        if let Some(name) = message.sender_name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        let known = self.shared.history.sender_name(&message.sender_id).await?;
        Ok(known.unwrap_or_else(|| message.sender_id.clone()))
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError> {
        let client = self.shared.connected_client().await?;
        let jid = parse_jid(chat_id)?;

        let mut last_id = String::new();
        let chunks = split_message(&sanitize_for_whatsapp(text), MAX_MESSAGE_CHARS);
        for (i, chunk) in chunks.iter().enumerate() {
            let msg = text_message(chunk, if i == 0 { reply_to } else { None });
            let id = retry_send(&client, &jid, msg).await?;
            self.remember_sent(chat_id, &id, MessageKind::Text, chunk, None)
                .await;
            last_id = id;
        }
        debug!("whatsapp: sent {} chunk(s) to {chat_id}", chunks.len());
        Ok(last_id)
    }

    async fn send_voice(
        &self,
        chat_id: &str,
        audio: &Media,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError> {
        let client = self.shared.connected_client().await?;
        let jid = parse_jid(chat_id)?;

        let upload = client
            .upload(audio.data.clone(), MediaType::Audio)
            .await
            .map_err(|e| ChorusError::Channel(format!("whatsapp audio upload failed: {e}")))?;

        let mimetype = if audio.is_ogg() {
            VOICE_NOTE_MIME.to_string()
        } else {
            audio.mime_type.clone()
        };
        let msg = Message {
            audio_message: Some(Box::new(message::AudioMessage {
                mimetype: Some(mimetype),
                ptt: Some(audio.is_ogg()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                context_info: quote(reply_to),
                ..Default::default()
            })),
            ..Default::default()
        };

        let id = retry_send(&client, &jid, msg).await?;
        let kind = if audio.is_ogg() {
            MessageKind::Voice
        } else {
            MessageKind::Audio
        };
        self.remember_sent(chat_id, &id, kind, "", Some(audio)).await;
        Ok(id)
    }

    async fn send_image(
        &self,
        chat_id: &str,
        image: &Media,
        caption: Option<&str>,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError> {
        let client = self.shared.connected_client().await?;
        let jid = parse_jid(chat_id)?;

        let upload = client
            .upload(image.data.clone(), MediaType::Image)
            .await
            .map_err(|e| ChorusError::Channel(format!("whatsapp image upload failed: {e}")))?;

        let caption = caption.map(sanitize_for_whatsapp);
        let msg = Message {
            image_message: Some(Box::new(message::ImageMessage {
                mimetype: Some(image.mime_type.clone()),
                caption: caption.clone(),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                context_info: quote(reply_to),
                ..Default::default()
            })),
            ..Default::default()
        };

        let id = retry_send(&client, &jid, msg).await?;
        self.remember_sent(
            chat_id,
            &id,
            MessageKind::Image,
            caption.as_deref().unwrap_or_default(),
            Some(image),
        )
        .await;
        Ok(id)
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChorusError> {
        let Some(client) = self.shared.client.lock().await.clone() else {
            return Ok(());
        };
        let jid = parse_jid(chat_id)?;
        if let Err(e) = client.chatstate().send_composing(&jid).await {
            debug!("whatsapp: typing indicator failed: {e}");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChorusError> {
        *self.shared.client.lock().await = None;
        info!("whatsapp: transport stopped");
        Ok(())
    }
}
