//! In-memory collaborators for gateway and command tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chorus_core::{
    config::Config,
    context::CompletionRequest,
    error::ChorusError,
    message::{Chat, Inbound, InboundMessage, Media, MessageKind},
    persona::{PersonaConfig, PersonaRegistry},
    traits::{Backend, ImageGenerator, LanguageModel, SpeechSynthesizer, Transcriber, Transport},
};
use chorus_memory::Store;
use chorus_providers::ModelAdapter;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::gateway::Gateway;
use crate::services::MediaServices;

/// Something the bot sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: String,
        text: String,
        reply_to: Option<String>,
    },
    Voice {
        chat_id: String,
        mime_type: String,
        reply_to: Option<String>,
    },
    Image {
        chat_id: String,
        caption: Option<String>,
        reply_to: Option<String>,
    },
}

/// Transport backed by vectors. Sent messages join the history as the bot's own.
#[derive(Default)]
pub struct FakeTransport {
    history: Mutex<Vec<InboundMessage>>,
    media: Mutex<HashMap<String, Media>>,
    unknown_contacts: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<Sent>>,
    next_id: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a message to the history log.
    pub fn push(&self, message: InboundMessage, media: Option<Media>) {
        if let Some(media) = media {
            self.media.lock().unwrap().insert(message.id.clone(), media);
        }
        self.history.lock().unwrap().push(message);
    }

    /// Record an inbound message and wrap it the way the transport delivers it.
    pub fn receive(&self, chat: &Chat, message: InboundMessage) -> Inbound {
        self.push(message.clone(), None);
        Inbound {
            chat: chat.clone(),
            message,
        }
    }

    /// Make contact lookups fail for a sender.
    pub fn forget_contact(&self, sender_id: &str) {
        self.unknown_contacts
            .lock()
            .unwrap()
            .insert(sender_id.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record_sent(&self, chat_id: &str, kind: MessageKind, body: &str, sent: Sent) -> String {
        let id = format!("sent-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut msg = message(&id, chat_id, "me", body, kind, Utc::now());
        msg.from_me = true;
        self.history.lock().unwrap().push(msg);
        self.sent.lock().unwrap().push(sent);
        id
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &str {
        "fake"
    }

    async fn start(&self) -> Result<mpsc::Receiver<Inbound>, ChorusError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ChorusError> {
        let mut messages: Vec<InboundMessage> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        messages.reverse();
        messages.truncate(limit);
        Ok(messages)
    }

    async fn download_media(&self, message: &InboundMessage) -> Result<Media, ChorusError> {
        self.media
            .lock()
            .unwrap()
            .get(&message.id)
            .cloned()
            .ok_or_else(|| ChorusError::Channel(format!("no media for {}", message.id)))
    }

    async fn contact_name(&self, message: &InboundMessage) -> Result<String, ChorusError> {
        if self.unknown_contacts.lock().unwrap().contains(&message.sender_id) {
            return Err(ChorusError::Channel("contact lookup failed".into()));
        }
        Ok(message
            .sender_name
            .clone()
            .unwrap_or_else(|| message.sender_id.clone()))
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError> {
        let sent = Sent::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            reply_to: reply_to.map(|m| m.id.clone()),
        };
        Ok(self.record_sent(chat_id, MessageKind::Text, text, sent))
    }

    async fn send_voice(
        &self,
        chat_id: &str,
        audio: &Media,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError> {
        let sent = Sent::Voice {
            chat_id: chat_id.to_string(),
            mime_type: audio.mime_type.clone(),
            reply_to: reply_to.map(|m| m.id.clone()),
        };
        Ok(self.record_sent(chat_id, MessageKind::Voice, "", sent))
    }

    async fn send_image(
        &self,
        chat_id: &str,
        _image: &Media,
        caption: Option<&str>,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError> {
        let sent = Sent::Image {
            chat_id: chat_id.to_string(),
            caption: caption.map(str::to_string),
            reply_to: reply_to.map(|m| m.id.clone()),
        };
        Ok(self.record_sent(
            chat_id,
            MessageKind::Image,
            caption.unwrap_or_default(),
            sent,
        ))
    }

    async fn stop(&self) -> Result<(), ChorusError> {
        Ok(())
    }
}

/// Language model with a canned reply and an optional delay.
pub struct ScriptedModel {
    backend: Backend,
    reply: Result<String, String>,
    delay: Duration,
    pub requests: Mutex<Vec<CompletionRequest>>,
    /// Start and end of every call.
    pub windows: Mutex<Vec<(Instant, Instant)>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            backend: Backend::Anthropic,
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            backend: Backend::Anthropic,
            reply: Err("backend down".to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            backend: Backend::Anthropic,
            reply: Ok(reply.to_string()),
            delay,
            requests: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn backend(&self) -> Backend {
        self.backend
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChorusError> {
        let start = Instant::now();
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.windows.lock().unwrap().push((start, Instant::now()));
        self.reply.clone().map_err(ChorusError::Provider)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Speech vendor returning a fixed OGG payload and remembering what it said.
#[derive(Default)]
pub struct FakeSpeech {
    pub spoken: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Media, ChorusError> {
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), voice.map(str::to_string)));
        Ok(Media::new(b"OggS".to_vec(), "audio/ogg"))
    }
}

#[derive(Default)]
pub struct FakeImages {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, prompt: &str) -> Result<Media, ChorusError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Media::new(vec![0x89, b'P', b'N', b'G'], "image/png"))
    }
}

#[derive(Default)]
pub struct FakeTranscriber {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Media) -> Result<String, ChorusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("transcript of {} bytes", audio.data.len()))
    }
}

pub fn persona(name: &str, groups: &str, prefix: &str) -> PersonaConfig {
    PersonaConfig {
        name: name.into(),
        prompt_text: format!("You are {name}."),
        build_prompt: false,
        groups: groups.into(),
        prefix: prefix.into(),
        limit: 30,
        hours_limit: 24,
        max_images: 2,
        max_tokens: 100_000,
        character_limit: 500,
        voice_id: None,
        pre_message: None,
    }
}

pub fn message(
    id: &str,
    chat_id: &str,
    sender_id: &str,
    body: &str,
    kind: MessageKind,
    timestamp: DateTime<Utc>,
) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        chat_id: chat_id.into(),
        sender_id: sender_id.into(),
        sender_name: Some(format!("user{sender_id}")),
        body: body.into(),
        kind,
        from_me: false,
        timestamp,
        quoted_id: None,
        quoted_from_me: false,
    }
}

pub fn text(id: &str, chat_id: &str, body: &str) -> InboundMessage {
    message(id, chat_id, "5691", body, MessageKind::Text, Utc::now())
}

pub fn private_chat() -> Chat {
    Chat {
        id: "5691@s.whatsapp.net".into(),
        name: "user5691".into(),
        is_group: false,
    }
}

pub fn group_chat(name: &str) -> Chat {
    Chat {
        id: "120363@g.us".into(),
        name: name.into(),
        is_group: true,
    }
}

pub async fn test_store() -> Store {
    Store::in_memory(Duration::from_secs(3600)).await.unwrap()
}

/// Gateway over fakes with the given model and personas.
pub async fn gateway(
    transport: Arc<FakeTransport>,
    model: Arc<ScriptedModel>,
    personas: Vec<PersonaConfig>,
    config: Config,
    services: MediaServices,
) -> Gateway {
    let adapter = ModelAdapter::new(1, Duration::ZERO).with_backend(model);
    let registry = Arc::new(PersonaRegistry::new(
        personas,
        config.chorus.privileged_persona.clone(),
    ));
    Gateway::new(
        config,
        transport,
        registry,
        test_store().await,
        adapter,
        services,
        None,
    )
}
