use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message types as seen by the routing core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Sticker,
    Audio,
    Voice,
    Other,
}

impl MessageKind {
    /// Stable name used in the history log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Sticker => "sticker",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Other => "other",
        }
    }

    /// Parse a history-log name. Unknown names map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => Self::Text,
            "image" => Self::Image,
            "sticker" => Self::Sticker,
            "audio" => Self::Audio,
            "voice" => Self::Voice,
            _ => Self::Other,
        }
    }

    /// Image-like content that can be attached to a model request.
    pub fn is_visual(&self) -> bool {
        matches!(self, Self::Image | Self::Sticker)
    }

    /// Audio content that needs transcription before it can be used as text.
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio | Self::Voice)
    }

    /// Whether a message of this kind may trigger a persona reply.
    pub fn can_trigger(&self) -> bool {
        matches!(self, Self::Text | Self::Image | Self::Sticker)
    }
}

/// One chat message as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport message id.
    pub id: String,
    /// Chat this message belongs to.
    pub chat_id: String,
    /// Platform-specific sender id (phone number on WhatsApp).
    pub sender_id: String,
    /// Display name reported by the transport, if any.
    pub sender_name: Option<String>,
    /// Text body or media caption.
    pub body: String,
    pub kind: MessageKind,
    /// Whether the bot account authored this message.
    pub from_me: bool,
    pub timestamp: DateTime<Utc>,
    /// Id of the quoted message when this is a reply.
    #[serde(default)]
    pub quoted_id: Option<String>,
    /// Whether the quoted message was authored by the bot.
    #[serde(default)]
    pub quoted_from_me: bool,
}

impl InboundMessage {
    pub fn has_quoted_message(&self) -> bool {
        self.quoted_id.is_some()
    }

    /// True when this message replies to something the bot said.
    pub fn replies_to_bot(&self) -> bool {
        self.has_quoted_message() && self.quoted_from_me
    }

    /// Body truncated for log lines.
    pub fn preview(&self) -> String {
        if self.body.chars().count() > 60 {
            let truncated: String = self.body.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            self.body.clone()
        }
    }
}

/// Chat metadata needed for routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    /// Group subject or contact name.
    pub name: String,
    pub is_group: bool,
}

impl Chat {
    /// Broadcast lists and status updates are never answered.
    pub fn is_broadcast(&self) -> bool {
        self.id.ends_with("@broadcast")
    }
}

/// An inbound event: a message plus the chat it arrived in.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat: Chat,
    pub message: InboundMessage,
}

/// Binary media with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Media {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Whether the payload is already an OGG container (WhatsApp voice-note format).
    pub fn is_ogg(&self) -> bool {
        self.mime_type.starts_with("audio/ogg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(body: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            chat_id: "c1".into(),
            sender_id: "569".into(),
            sender_name: None,
            body: body.into(),
            kind: MessageKind::Text,
            from_me: false,
            timestamp: Utc::now(),
            quoted_id: None,
            quoted_from_me: false,
        }
    }

    #[test]
    fn test_kind_round_trip_names() {
        for kind in [
            MessageKind::Text,
            MessageKind::Image,
            MessageKind::Sticker,
            MessageKind::Audio,
            MessageKind::Voice,
            MessageKind::Other,
        ] {
            assert_eq!(MessageKind::parse(kind.as_str()), kind);
        }
        assert_eq!(MessageKind::parse("video"), MessageKind::Other);
    }

    #[test]
    fn test_trigger_kinds() {
        assert!(MessageKind::Text.can_trigger());
        assert!(MessageKind::Sticker.can_trigger());
        assert!(!MessageKind::Voice.can_trigger());
        assert!(!MessageKind::Other.can_trigger());
    }

    #[test]
    fn test_replies_to_bot_requires_quote() {
        let mut m = msg("hola");
        m.quoted_from_me = true;
        assert!(!m.replies_to_bot());
        m.quoted_id = Some("q1".into());
        assert!(m.replies_to_bot());
    }

    #[test]
    fn test_preview_truncates() {
        let m = msg(&"x".repeat(80));
        assert_eq!(m.preview().chars().count(), 63);
        assert_eq!(msg("short").preview(), "short");
    }

    #[test]
    fn test_broadcast_detection() {
        let chat = Chat {
            id: "status@broadcast".into(),
            name: "status".into(),
            is_group: false,
        };
        assert!(chat.is_broadcast());
    }
}
