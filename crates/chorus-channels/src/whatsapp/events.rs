//! Inbound message handling: unwrapping, classification, media download,
//! history recording, and forwarding to the gateway.

use std::sync::Arc;

use chorus_core::message::{Chat, Inbound, InboundMessage, Media, MessageKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wacore::types::message::MessageInfo;
use waproto::whatsapp::{ContextInfo, Message};
use whatsapp_rust::client::Client;

use super::Shared;

/// Content extracted from a protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Parsed {
    pub kind: MessageKind,
    pub body: String,
    pub quoted_id: Option<String>,
    /// JID of the author of the quoted message, when the client sent it.
    pub quoted_participant: Option<String>,
}

impl Parsed {
    fn new(kind: MessageKind, body: String, context: Option<&ContextInfo>) -> Self {
        Self {
            kind,
            body,
            quoted_id: context.and_then(|c| c.stanza_id.clone()),
            quoted_participant: context.and_then(|c| c.participant.clone()),
        }
    }
}

/// Strip the device-sent, ephemeral, and view-once envelopes.
pub(super) fn unwrap_message(msg: &Message) -> &Message {
    msg.device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| msg.ephemeral_message.as_ref().and_then(|e| e.message.as_deref()))
        .or_else(|| msg.view_once_message.as_ref().and_then(|v| v.message.as_deref()))
        .unwrap_or(msg)
}

/// Classify a message and pull out its text and quoted message reference.
pub(super) fn parse_content(msg: &Message) -> Parsed {
    if let Some(text) = msg.conversation.as_deref() {
        return Parsed::new(MessageKind::Text, text.to_string(), None);
    }
    if let Some(ext) = msg.extended_text_message.as_ref() {
        return Parsed::new(
            MessageKind::Text,
            ext.text.clone().unwrap_or_default(),
            ext.context_info.as_deref(),
        );
    }
    if let Some(img) = msg.image_message.as_ref() {
        return Parsed::new(
            MessageKind::Image,
            img.caption.clone().unwrap_or_default(),
            img.context_info.as_deref(),
        );
    }
    if let Some(sticker) = msg.sticker_message.as_ref() {
        return Parsed::new(
            MessageKind::Sticker,
            String::new(),
            sticker.context_info.as_deref(),
        );
    }
    if let Some(audio) = msg.audio_message.as_ref() {
        let kind = if audio.ptt.unwrap_or(false) {
            MessageKind::Voice
        } else {
            MessageKind::Audio
        };
        return Parsed::new(kind, String::new(), audio.context_info.as_deref());
    }
    Parsed::new(MessageKind::Other, String::new(), None)
}

/// Broadcast lists and status updates are never answered.
pub(super) fn is_broadcast_chat(chat_id: &str) -> bool {
    chat_id.ends_with("@broadcast")
}

/// User part of a JID string, without server or device suffix.
pub(super) fn jid_user(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user)
}

/// Whether a quoted participant is one of the bot's own accounts.
pub(super) fn quotes_own_account(participant: Option<&str>, own_users: &[String]) -> bool {
    participant
        .map(jid_user)
        .is_some_and(|user| !user.is_empty() && own_users.iter().any(|own| own == user))
}

/// Build the normalized message, keeping the protocol's send time.
pub(super) fn to_inbound(info: &MessageInfo, parsed: Parsed, quoted_from_me: bool) -> InboundMessage {
    InboundMessage {
        id: info.id.clone(),
        chat_id: info.source.chat.to_string(),
        sender_id: info.source.sender.user.clone(),
        sender_name: (!info.push_name.is_empty()).then(|| info.push_name.clone()),
        body: parsed.body,
        kind: parsed.kind,
        from_me: info.source.is_from_me,
        timestamp: info.timestamp,
        quoted_id: parsed.quoted_id,
        quoted_from_me,
    }
}

/// Download the media attached to an image, sticker, or audio message.
async fn download_media(client: &Client, msg: &Message, kind: MessageKind) -> Option<Media> {
    let (downloaded, mime) = match kind {
        MessageKind::Image => {
            let img = msg.image_message.as_ref()?;
            let mime = img.mimetype.clone().unwrap_or_else(|| "image/jpeg".into());
            (client.download(img.as_ref()).await, mime)
        }
        MessageKind::Sticker => {
            let sticker = msg.sticker_message.as_ref()?;
            let mime = sticker.mimetype.clone().unwrap_or_else(|| "image/webp".into());
            (client.download(sticker.as_ref()).await, mime)
        }
        MessageKind::Audio | MessageKind::Voice => {
            let audio = msg.audio_message.as_ref()?;
            let mime = audio.mimetype.clone().unwrap_or_else(|| "audio/ogg".into());
            (client.download(audio.as_ref()).await, mime)
        }
        _ => return None,
    };

    match downloaded {
        Ok(bytes) => {
            debug!("whatsapp: downloaded {} bytes of {mime}", bytes.len());
            Some(Media::new(bytes, mime))
        }
        Err(e) => {
            warn!("whatsapp: {} download failed: {e}", kind.as_str());
            None
        }
    }
}

/// Handle one `Event::Message` from the bot.
pub(super) async fn handle_message(
    msg: Message,
    info: MessageInfo,
    client: Arc<Client>,
    shared: &Shared,
    tx: &mpsc::Sender<Inbound>,
) {
    if shared.sent_ids.lock().await.remove(&info.id) {
        debug!("whatsapp: skipping own echo {}", info.id);
        return;
    }

    let chat_id = info.source.chat.to_string();
    if is_broadcast_chat(&chat_id) {
        debug!("whatsapp: ignoring broadcast {} in {chat_id}", info.id);
        return;
    }

    let inner = unwrap_message(&msg);
    let parsed = parse_content(inner);
    let sender_id = info.source.sender.user.clone();
    let is_group = info.source.is_group;

    debug!(
        "whatsapp: {} in {chat_id} from {sender_id} (group={is_group}, from_me={})",
        parsed.kind.as_str(),
        info.source.is_from_me
    );

    let quoted_from_me = match parsed.quoted_id.as_deref() {
        Some(quoted) => {
            let own_users: Vec<String> = [client.get_pn().await, client.get_lid().await]
                .into_iter()
                .flatten()
                .map(|jid| jid.user)
                .collect();
            if quotes_own_account(parsed.quoted_participant.as_deref(), &own_users) {
                true
            } else {
                shared
                    .history
                    .is_from_me(&chat_id, quoted)
                    .await
                    .unwrap_or_else(|e| {
                        warn!("whatsapp: quoted lookup failed: {e}");
                        None
                    })
                    .unwrap_or(false)
            }
        }
        None => false,
    };

    let message = to_inbound(&info, parsed, quoted_from_me);

    let media = if message.kind.is_visual() || message.kind.is_audio() {
        download_media(&client, inner, message.kind).await
    } else {
        None
    };

    if let Err(e) = shared.history.record_message(&message, media.as_ref()).await {
        warn!("whatsapp: failed to record {}: {e}", message.id);
    }

    let name = if is_group {
        shared.config.group_name(&chat_id)
    } else {
        message.sender_name.clone().unwrap_or_else(|| sender_id.clone())
    };
    let chat = Chat {
        id: chat_id,
        name,
        is_group,
    };

    if tx.send(Inbound { chat, message }).await.is_err() {
        info!("whatsapp: inbound receiver dropped");
    }
}
