//! Reply routing: render a structured reply as text, a voice note, or an image.

use chorus_core::{
    config::FeaturesConfig,
    error::ChorusError,
    message::{Chat, InboundMessage},
    persona::PersonaConfig,
    reply::{Modality, StructuredReply},
    traits::Transport,
};
use chorus_memory::Store;
use chorus_providers::transcode::to_voice_note;
use tracing::{info, warn};

use crate::services::MediaServices;

pub struct ReplyRouter<'a> {
    transport: &'a dyn Transport,
    store: &'a Store,
    services: &'a MediaServices,
    features: &'a FeaturesConfig,
}

impl<'a> ReplyRouter<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        store: &'a Store,
        services: &'a MediaServices,
        features: &'a FeaturesConfig,
    ) -> Self {
        Self {
            transport,
            store,
            services,
            features,
        }
    }

    /// Send `reply` to `chat`. Group replies are threaded under `original`.
    pub async fn dispatch(
        &self,
        reply: StructuredReply,
        chat: &Chat,
        original: &InboundMessage,
        persona: &PersonaConfig,
    ) -> Result<(), ChorusError> {
        let reply_to = chat.is_group.then_some(original);

        match reply.modality {
            Modality::Text => self.send_text(chat, &reply.text, reply_to).await,
            Modality::Audio
                if !self.features.audio_creation_enabled
                    || !self.services.can_speak(persona.voice_id.as_deref()) =>
            {
                self.send_text(chat, &reply.text, reply_to).await
            }
            Modality::Audio => {
                let audio = self
                    .services
                    .persona_voice(&reply.text, persona.voice_id.as_deref())
                    .await?;
                let audio = to_voice_note(&self.services.ffmpeg, audio).await;
                let id = self
                    .transport
                    .send_voice(&chat.id, &audio, reply_to)
                    .await?;
                info!("reply: {} spoke in {}", persona.name, chat.name);
                if let Err(e) = self.store.save_spoken_reply(&chat.id, &id, &reply.text).await {
                    warn!("reply: failed to cache spoken text for {id}: {e}");
                }
                Ok(())
            }
            Modality::Image => {
                let generator = self
                    .services
                    .images
                    .as_ref()
                    .filter(|_| self.features.image_creation_enabled);
                let Some(generator) = generator else {
                    let fallback = reply.image_caption.as_deref().unwrap_or(&reply.text);
                    return self.send_text(chat, fallback, reply_to).await;
                };
                let image = generator.generate(&reply.text).await?;
                self.transport
                    .send_image(&chat.id, &image, reply.image_caption.as_deref(), reply_to)
                    .await?;
                info!("reply: {} drew an image in {}", persona.name, chat.name);
                Ok(())
            }
        }
    }

    async fn send_text(
        &self,
        chat: &Chat,
        text: &str,
        reply_to: Option<&InboundMessage>,
    ) -> Result<(), ChorusError> {
        if text.trim().is_empty() {
            warn!("reply: empty reply for {}, nothing sent", chat.name);
            return Ok(());
        }
        self.transport.send_text(&chat.id, text, reply_to).await?;
        Ok(())
    }
}
