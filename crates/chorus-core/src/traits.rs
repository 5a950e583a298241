use std::fmt;

use crate::{
    context::CompletionRequest,
    error::ChorusError,
    message::{Inbound, InboundMessage, Media},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Language-model backend families with distinct wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

impl Backend {
    /// Parse a user-supplied backend name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" | "gpt" => Some(Self::OpenAi),
            "anthropic" | "claude" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Wire family this backend speaks.
    fn backend(&self) -> Backend;

    /// Send a prepared request and return the raw reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChorusError>;

    /// Whether the backend is configured and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging transport: delivers inbound messages and sends replies.
///
/// Send operations return the id of the message that was sent.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening. Returns a receiver that yields inbound events.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<Inbound>, ChorusError>;

    /// Most recent messages of a chat, newest first.
    async fn recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ChorusError>;

    /// Fetch the media attached to a message.
    async fn download_media(&self, message: &InboundMessage) -> Result<Media, ChorusError>;

    /// Display name of a message's author.
    async fn contact_name(&self, message: &InboundMessage) -> Result<String, ChorusError>;

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError>;

    /// Send audio as a voice note.
    async fn send_voice(
        &self,
        chat_id: &str,
        audio: &Media,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError>;

    async fn send_image(
        &self,
        chat_id: &str,
        image: &Media,
        caption: Option<&str>,
        reply_to: Option<&InboundMessage>,
    ) -> Result<String, ChorusError>;

    /// Show a typing indicator.
    async fn send_typing(&self, _chat_id: &str) -> Result<(), ChorusError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), ChorusError>;
}

/// Text-to-speech vendor.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`; `voice` selects a vendor voice, `None` uses the default.
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Media, ChorusError>;
}

/// Image-generation vendor.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Media, ChorusError>;
}

/// Speech-to-text vendor.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Media) -> Result<String, ChorusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("OpenAI"), Some(Backend::OpenAi));
        assert_eq!(Backend::parse(" claude "), Some(Backend::Anthropic));
        assert_eq!(Backend::parse("gemini"), None);
    }

    #[test]
    fn test_backend_serde_names() {
        let json = serde_json::to_string(&Backend::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let back: Backend = serde_json::from_str("\"anthropic\"").unwrap();
        assert_eq!(back, Backend::Anthropic);
    }
}
