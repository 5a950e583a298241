use super::Store;
use chorus_core::message::{InboundMessage, Media, MessageKind};
use chorus_core::persona::PersonaConfig;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Create an in-memory store for testing.
async fn test_store_with_ttl(ttl: Duration) -> Store {
    Store::in_memory(ttl).await.unwrap()
}

async fn test_store() -> Store {
    test_store_with_ttl(Duration::from_secs(3600)).await
}

fn persona(name: &str, groups: &str) -> PersonaConfig {
    PersonaConfig {
        name: name.into(),
        prompt_text: format!("I am {name}"),
        build_prompt: true,
        groups: groups.into(),
        prefix: name.into(),
        limit: 20,
        hours_limit: 6,
        max_images: 1,
        max_tokens: 1500,
        character_limit: 300,
        voice_id: Some("voice-1".into()),
        pre_message: None,
    }
}

fn message(id: &str, chat: &str, minutes_ago: i64, from_me: bool) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        chat_id: chat.into(),
        sender_id: if from_me { "bot".into() } else { "5691".into() },
        sender_name: Some("Ana".into()),
        body: format!("body {id}"),
        kind: MessageKind::Text,
        from_me,
        timestamp: Utc::now() - ChronoDuration::minutes(minutes_ago),
        quoted_id: None,
        quoted_from_me: false,
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let store = test_store().await;
    Store::run_migrations(&store.pool).await.unwrap();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(&store.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 3);
}

#[tokio::test]
async fn test_persona_upsert_and_load() {
    let store = test_store().await;
    store.upsert_persona(&persona("bel", "*")).await.unwrap();
    store.upsert_persona(&persona("chef", "-")).await.unwrap();

    let mut updated = persona("bel", "Familia");
    updated.voice_id = None;
    store.upsert_persona(&updated).await.unwrap();

    let personas = store.load_personas().await.unwrap();
    assert_eq!(personas.len(), 2);
    assert_eq!(personas[0].name, "bel");
    assert_eq!(personas[0].groups, "Familia");
    assert!(personas[0].voice_id.is_none());
    assert_eq!(personas[1].limit, 20);
    assert_eq!(personas[1].voice_id.as_deref(), Some("voice-1"));
}

#[tokio::test]
async fn test_persona_delete() {
    let store = test_store().await;
    store.upsert_persona(&persona("bel", "*")).await.unwrap();
    assert!(store.delete_persona("bel").await.unwrap());
    assert!(!store.delete_persona("bel").await.unwrap());
    assert!(store.load_personas().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recent_messages_newest_first() {
    let store = test_store().await;
    store.record_message(&message("a", "c1", 30, false), None).await.unwrap();
    store.record_message(&message("b", "c1", 20, true), None).await.unwrap();
    store.record_message(&message("c", "c1", 10, false), None).await.unwrap();
    store.record_message(&message("x", "c2", 5, false), None).await.unwrap();

    let recent = store.recent_messages("c1", 2).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b"]);
    assert!(recent[1].from_me);
    assert_eq!(recent[0].kind, MessageKind::Text);
}

#[tokio::test]
async fn test_record_is_idempotent() {
    let store = test_store().await;
    let msg = message("a", "c1", 1, false);
    store.record_message(&msg, None).await.unwrap();
    store.record_message(&msg, None).await.unwrap();
    assert_eq!(store.recent_messages("c1", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_media_round_trip() {
    let store = test_store().await;
    let mut msg = message("img", "c1", 1, false);
    msg.kind = MessageKind::Image;
    let media = Media::new(vec![1, 2, 3], "image/jpeg");
    store.record_message(&msg, Some(&media)).await.unwrap();

    assert_eq!(store.message_media("c1", "img").await.unwrap(), Some(media));
    store.record_message(&message("t", "c1", 1, false), None).await.unwrap();
    assert!(store.message_media("c1", "t").await.unwrap().is_none());
}

#[tokio::test]
async fn test_from_me_and_sender_lookup() {
    let store = test_store().await;
    store.record_message(&message("a", "c1", 1, true), None).await.unwrap();
    store.record_message(&message("b", "c1", 1, false), None).await.unwrap();

    assert_eq!(store.is_from_me("c1", "a").await.unwrap(), Some(true));
    assert_eq!(store.is_from_me("c1", "b").await.unwrap(), Some(false));
    assert_eq!(store.is_from_me("c1", "zzz").await.unwrap(), None);

    let (sender, name) = store.message_sender("c1", "b").await.unwrap().unwrap();
    assert_eq!(sender, "5691");
    assert_eq!(name.as_deref(), Some("Ana"));
    assert_eq!(store.sender_name("5691").await.unwrap().as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_transcript_cache() {
    let store = test_store().await;
    assert!(store.get_transcript("v1").await.unwrap().is_none());
    store.put_transcript("v1", "hola").await.unwrap();
    assert_eq!(store.get_transcript("v1").await.unwrap().as_deref(), Some("hola"));
    store.put_transcript("v1", "hola de nuevo").await.unwrap();
    assert_eq!(
        store.get_transcript("v1").await.unwrap().as_deref(),
        Some("hola de nuevo")
    );
    assert_eq!(store.purge_expired_transcripts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_transcript_expiry() {
    let store = test_store_with_ttl(Duration::ZERO).await;
    store.put_transcript("v1", "hola").await.unwrap();
    assert!(store.get_transcript("v1").await.unwrap().is_none());
    assert_eq!(store.purge_expired_transcripts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_spoken_reply_cache() {
    let store = test_store().await;
    store.save_spoken_reply("c1", "sent-1", "texto").await.unwrap();
    assert_eq!(
        store.get_spoken_reply("sent-1").await.unwrap().as_deref(),
        Some("texto")
    );
    assert!(store.get_spoken_reply("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_history_before_cutoff() {
    let store = test_store().await;
    let mut old_voice = message("old", "c1", 600, true);
    old_voice.kind = MessageKind::Voice;
    store
        .record_message(&old_voice, Some(&Media::new(vec![9; 16], "audio/ogg")))
        .await
        .unwrap();
    store.save_spoken_reply("c1", "old", "hace rato").await.unwrap();
    store.record_message(&message("new", "c1", 5, true), None).await.unwrap();
    store.save_spoken_reply("c1", "new", "recién").await.unwrap();

    let cutoff = Utc::now() - ChronoDuration::hours(1);
    assert_eq!(store.purge_history_before(cutoff).await.unwrap(), 1);

    let ids: Vec<String> = store
        .recent_messages("c1", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, vec!["new"]);
    assert!(store.message_media("c1", "old").await.unwrap().is_none());
    assert!(store.get_spoken_reply("old").await.unwrap().is_none());
    assert_eq!(
        store.get_spoken_reply("new").await.unwrap().as_deref(),
        Some("recién")
    );
    assert_eq!(store.purge_history_before(cutoff).await.unwrap(), 0);
}
