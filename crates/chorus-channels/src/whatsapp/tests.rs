use super::events::{
    is_broadcast_chat, jid_user, parse_content, quotes_own_account, to_inbound, unwrap_message,
};
use super::send::{sanitize_for_whatsapp, split_message};
use super::*;
use chorus_core::message::MessageKind;
use chrono::{TimeZone, Utc};
use wacore::types::message::{MessageInfo, MessageSource};
use waproto::whatsapp::{message, ContextInfo, Message};

fn text(body: &str) -> Message {
    Message {
        conversation: Some(body.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_split_short_message() {
    assert_eq!(split_message("hello", 4096), vec!["hello"]);
    assert_eq!(split_message("", 4096), vec![""]);
}

#[test]
fn test_split_prefers_newlines() {
    let text = "aaaa\nbbbb\ncccc";
    let chunks = split_message(text, 7);
    assert_eq!(chunks, vec!["aaaa\n", "bbbb\n", "cccc"]);
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_split_counts_chars_not_bytes() {
    let text = "ñ".repeat(10);
    let chunks = split_message(&text, 4);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_sanitize_markdown() {
    assert_eq!(sanitize_for_whatsapp("## Hola"), "*Hola*");
    assert_eq!(sanitize_for_whatsapp("es **muy** bueno"), "es *muy* bueno");
    assert_eq!(
        sanitize_for_whatsapp("ver [docs](https://x.y) ya"),
        "ver docs (https://x.y) ya"
    );
    assert_eq!(sanitize_for_whatsapp("a\n---\nb"), "a\nb");
    assert_eq!(sanitize_for_whatsapp("#hashtag"), "#hashtag");
}

#[test]
fn test_sanitize_leaves_tags_alone() {
    assert_eq!(sanitize_for_whatsapp("[Text] hola"), "[Text] hola");
}

#[test]
fn test_generate_qr_terminal() {
    let qr = generate_qr_terminal("pairing-data").unwrap();
    assert!(!qr.is_empty());
    assert!(qr.lines().count() > 5);
}

#[test]
fn test_parse_plain_text() {
    let parsed = parse_content(&text("hola bel"));
    assert_eq!(parsed.kind, MessageKind::Text);
    assert_eq!(parsed.body, "hola bel");
    assert!(parsed.quoted_id.is_none());
}

#[test]
fn test_parse_image_caption() {
    let msg = Message {
        image_message: Some(Box::new(message::ImageMessage {
            caption: Some("mira".into()),
            ..Default::default()
        })),
        ..Default::default()
    };
    let parsed = parse_content(&msg);
    assert_eq!(parsed.kind, MessageKind::Image);
    assert_eq!(parsed.body, "mira");
}

#[test]
fn test_parse_voice_note_vs_audio() {
    let audio = |ptt: bool| Message {
        audio_message: Some(Box::new(message::AudioMessage {
            ptt: Some(ptt),
            ..Default::default()
        })),
        ..Default::default()
    };
    assert_eq!(parse_content(&audio(true)).kind, MessageKind::Voice);
    assert_eq!(parse_content(&audio(false)).kind, MessageKind::Audio);
}

#[test]
fn test_parse_unknown_is_other() {
    let parsed = parse_content(&Message::default());
    assert_eq!(parsed.kind, MessageKind::Other);
    assert!(parsed.body.is_empty());
}

#[test]
fn test_unwrap_plain_message_is_identity() {
    let msg = text("x");
    assert_eq!(unwrap_message(&msg).conversation.as_deref(), Some("x"));
}

#[test]
fn test_parse_jid() {
    assert!(parse_jid("56911111111@s.whatsapp.net").is_ok());
}

#[test]
fn test_parse_quote_carries_participant() {
    let msg = Message {
        extended_text_message: Some(Box::new(message::ExtendedTextMessage {
            text: Some("y eso?".into()),
            context_info: Some(Box::new(ContextInfo {
                stanza_id: Some("BOT1".into()),
                participant: Some("56900000000:12@s.whatsapp.net".into()),
                ..Default::default()
            })),
            ..Default::default()
        })),
        ..Default::default()
    };
    let parsed = parse_content(&msg);
    assert_eq!(parsed.body, "y eso?");
    assert_eq!(parsed.quoted_id.as_deref(), Some("BOT1"));
    assert_eq!(
        parsed.quoted_participant.as_deref(),
        Some("56900000000:12@s.whatsapp.net")
    );
}

#[test]
fn test_jid_user_strips_server_and_device() {
    assert_eq!(jid_user("56900000000:12@s.whatsapp.net"), "56900000000");
    assert_eq!(jid_user("123456789@lid"), "123456789");
    assert_eq!(jid_user("plain"), "plain");
}

#[test]
fn test_quote_of_own_account_detected_without_history() {
    let own = vec!["56900000000".to_string(), "998877".to_string()];
    assert!(quotes_own_account(Some("56900000000:3@s.whatsapp.net"), &own));
    assert!(quotes_own_account(Some("998877@lid"), &own));
    assert!(!quotes_own_account(Some("56911111111@s.whatsapp.net"), &own));
    assert!(!quotes_own_account(None, &own));
    assert!(!quotes_own_account(Some("@s.whatsapp.net"), &[String::new()]));
}

#[test]
fn test_broadcast_chats_are_ignored() {
    assert!(is_broadcast_chat("status@broadcast"));
    assert!(is_broadcast_chat("1234567@broadcast"));
    assert!(!is_broadcast_chat("120363000000000000@g.us"));
    assert!(!is_broadcast_chat("56911111111@s.whatsapp.net"));
}

#[test]
fn test_inbound_keeps_protocol_timestamp() {
    let sent_at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
    let info = MessageInfo {
        id: "OLD1".into(),
        push_name: "Ana".into(),
        timestamp: sent_at,
        source: MessageSource {
            chat: parse_jid("120363000000000000@g.us").unwrap(),
            sender: parse_jid("56911111111@s.whatsapp.net").unwrap(),
            is_group: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let message = to_inbound(&info, parse_content(&text("buenos días")), false);
    assert_eq!(message.timestamp, sent_at);
    assert_eq!(message.id, "OLD1");
    assert_eq!(message.chat_id, "120363000000000000@g.us");
    assert_eq!(message.sender_id, "56911111111");
    assert_eq!(message.sender_name.as_deref(), Some("Ana"));
    assert_eq!(message.body, "buenos días");
    assert!(!message.from_me);
}
