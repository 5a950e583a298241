//! Context assembly: turn recent chat history into a bounded conversation.
//!
//! History is walked newest first. The walk stops at the most recent reset
//! marker, at the first message older than the persona's hour window, at the
//! persona's message limit, and (OpenAI only) once the token budget is spent.
//! Only the newest `max_images` images are attached; older ones become a
//! placeholder. Voice notes are transcribed concurrently and patched in.

use base64::Engine;
use chorus_core::{
    config::ContextConfig,
    context::{estimate_tokens, ContentItem, ConversationMessage, Role, IMAGE_PLACEHOLDER},
    error::ChorusError,
    message::{Chat, InboundMessage},
    persona::PersonaConfig,
    prompt::build_system_prompt,
    traits::{Backend, Transcriber, Transport},
};
use chorus_memory::Store;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

/// Stand-in for a voice note whose transcription is unavailable.
pub const AUDIO_PLACEHOLDER: &str = "<untranscribed audio>";

/// Prompt plus the assembled conversation, oldest first.
#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub system_prompt: String,
    pub messages: Vec<ConversationMessage>,
}

/// One converted history message.
struct Converted {
    message: ConversationMessage,
    /// The audio still needs transcribing.
    pending_audio: bool,
}

pub struct ContextBuilder<'a> {
    transport: &'a dyn Transport,
    store: &'a Store,
    transcriber: Option<&'a dyn Transcriber>,
    config: &'a ContextConfig,
    timezone: &'a str,
    command_prefix: &'a str,
    reset_markers: Vec<String>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        store: &'a Store,
        transcriber: Option<&'a dyn Transcriber>,
        config: &'a ContextConfig,
        timezone: &'a str,
        command_prefix: &'a str,
    ) -> Self {
        Self {
            transport,
            store,
            transcriber,
            config,
            timezone,
            command_prefix,
            reset_markers: reset_markers(command_prefix),
        }
    }

    /// Assemble the context for `persona` in `chat`. Empty messages mean
    /// there is nothing to answer.
    pub async fn build(
        &self,
        chat: &Chat,
        persona: &PersonaConfig,
        backend: Backend,
        now: DateTime<Utc>,
    ) -> Result<BuiltContext, ChorusError> {
        let system_prompt = build_system_prompt(persona, self.timezone, self.command_prefix, now);
        let history = self
            .transport
            .recent_messages(&chat.id, self.config.history_window)
            .await?;
        let history = after_reset(history, &self.reset_markers);

        let cutoff = now - Duration::hours(i64::from(persona.hours_limit));
        let max_images = persona.max_images as usize;
        let token_budget = persona.max_tokens as usize;

        let mut collected: Vec<ConversationMessage> = Vec::new();
        let mut pending: Vec<(usize, InboundMessage)> = Vec::new();
        let mut images = 0usize;
        let mut tokens = estimate_tokens(&system_prompt);

        for message in history {
            if collected.len() >= persona.limit as usize || message.timestamp < cutoff {
                break;
            }
            if !message.kind.can_trigger() && !message.kind.is_audio() {
                continue;
            }

            let converted = match self.convert(&message, images < max_images).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("context: skipping message {}: {e}", message.id);
                    continue;
                }
            };

            let cost = estimate_tokens(&converted.message.joined_text())
                + converted.message.image_count() * self.config.image_token_cost;
            if backend == Backend::OpenAi && !collected.is_empty() && tokens + cost > token_budget
            {
                debug!("context: token budget reached at {} messages", collected.len());
                break;
            }
            tokens += cost;
            images += converted.message.image_count();

            if converted.pending_audio {
                pending.push((collected.len(), message));
            }
            collected.push(converted.message);
        }

        self.transcribe_pending(&mut collected, pending).await;

        collected.reverse();
        if let Some(pre) = persona.pre_message.as_deref().filter(|p| !p.is_empty()) {
            if let Some(last) = collected.last_mut() {
                prepend_text(last, pre);
            }
        }
        cap_images(&mut collected, max_images);

        debug!(
            "context: {} messages, {images} images, ~{tokens} tokens for {}",
            collected.len(),
            persona.name
        );
        Ok(BuiltContext {
            system_prompt,
            messages: collected,
        })
    }

    /// Convert one history message; `attach_image` says whether the image quota has room.
    async fn convert(
        &self,
        message: &InboundMessage,
        attach_image: bool,
    ) -> Result<Converted, ChorusError> {
        let mut pending_audio = false;

        let content = if message.kind.is_visual() {
            let mut content = Vec::new();
            if attach_image {
                let media = self.transport.download_media(message).await?;
                let data = base64::engine::general_purpose::STANDARD.encode(&media.data);
                content.push(ContentItem::image(data, media.mime_type));
            } else {
                content.push(ContentItem::text(IMAGE_PLACEHOLDER));
            }
            if !message.body.trim().is_empty() {
                content.push(ContentItem::text(message.body.clone()));
            }
            content
        } else if message.kind.is_audio() {
            let known = if message.from_me {
                self.store.get_spoken_reply(&message.id).await?
            } else {
                self.store.get_transcript(&message.id).await?
            };
            match known {
                Some(text) => vec![ContentItem::text(text)],
                None => {
                    pending_audio = !message.from_me && self.transcriber.is_some();
                    vec![ContentItem::text(AUDIO_PLACEHOLDER)]
                }
            }
        } else {
            vec![ContentItem::text(message.body.clone())]
        };

        let message = if message.from_me {
            ConversationMessage::new(Role::Assistant, None, content)
        } else {
            let name = self.transport.contact_name(message).await?;
            ConversationMessage::new(Role::User, Some(name), content)
        };
        Ok(Converted {
            message,
            pending_audio,
        })
    }

    /// Transcribe all pending voice notes at once and patch the results in.
    async fn transcribe_pending(
        &self,
        collected: &mut [ConversationMessage],
        pending: Vec<(usize, InboundMessage)>,
    ) {
        let Some(transcriber) = self.transcriber else {
            return;
        };
        if pending.is_empty() {
            return;
        }

        let jobs = pending.iter().map(|(_, message)| async move {
            let audio = self.transport.download_media(message).await?;
            let text = transcriber.transcribe(&audio).await?;
            if let Err(e) = self.store.put_transcript(&message.id, &text).await {
                warn!("context: failed to cache transcript {}: {e}", message.id);
            }
            Ok::<_, ChorusError>(text)
        });
        let results = join_all(jobs).await;

        for ((index, message), result) in pending.iter().zip(results) {
            match result {
                Ok(text) => collected[*index].content = vec![ContentItem::text(text)],
                Err(e) => warn!("context: transcription of {} failed: {e}", message.id),
            }
        }
    }
}

/// Literal bodies that restart the conversation.
pub fn reset_markers(command_prefix: &str) -> Vec<String> {
    vec![
        format!("{command_prefix}reset"),
        format!("{command_prefix}r"),
        "!n".to_string(),
    ]
}

fn is_reset(message: &InboundMessage, markers: &[String]) -> bool {
    let body = message.body.trim();
    markers.iter().any(|m| body.eq_ignore_ascii_case(m))
}

/// Drop the newest reset marker and everything older than it.
fn after_reset(mut history: Vec<InboundMessage>, markers: &[String]) -> Vec<InboundMessage> {
    if let Some(pos) = history.iter().position(|m| is_reset(m, markers)) {
        history.truncate(pos);
    }
    history
}

fn prepend_text(message: &mut ConversationMessage, prefix: &str) {
    match message.content.first_mut() {
        Some(ContentItem::Text { text }) => *text = format!("{prefix} {text}"),
        _ => message.content.insert(0, ContentItem::text(prefix)),
    }
}

/// Keep the newest `max` images and replace older ones with the placeholder.
fn cap_images(messages: &mut [ConversationMessage], max: usize) {
    let mut kept = 0;
    for message in messages.iter_mut().rev() {
        for item in message.content.iter_mut().rev() {
            if item.is_image() {
                if kept < max {
                    kept += 1;
                } else {
                    *item = ContentItem::text(IMAGE_PLACEHOLDER);
                }
            }
        }
    }
}
