//! ElevenLabs text-to-speech.

use async_trait::async_trait;
use chorus_core::{
    config::ElevenLabsConfig, error::ChorusError, message::Media, traits::SpeechSynthesizer,
};
use serde::Serialize;
use tracing::debug;

/// ElevenLabs TTS client.
pub struct ElevenLabsTts {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_spanish: String,
    model_english: String,
}

/// Which ElevenLabs model family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceLanguage {
    Spanish,
    English,
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

impl ElevenLabsTts {
    pub fn from_config(config: &ElevenLabsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_spanish: config.model_spanish.clone(),
            model_english: config.model_english.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Synthesize `text` with a specific voice and model family. Returns MP3.
    pub async fn speak(
        &self,
        text: &str,
        voice_id: &str,
        language: VoiceLanguage,
    ) -> Result<Media, ChorusError> {
        let model_id = match language {
            VoiceLanguage::Spanish => &self.model_spanish,
            VoiceLanguage::English => &self.model_english,
        };
        let url = format!("{}/v1/text-to-speech/{voice_id}", self.base_url);
        debug!("elevenlabs: POST {url} model={model_id}");

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&TtsRequest {
                text,
                model_id,
                voice_settings: VoiceSettings {
                    stability: 0.4,
                    similarity_boost: 1.0,
                },
            })
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("elevenlabs request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChorusError::Media(format!(
                "elevenlabs returned {status}: {body}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChorusError::Media(format!("elevenlabs body failed: {e}")))?;
        Ok(Media::new(bytes.to_vec(), "audio/mpeg"))
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Media, ChorusError> {
        let voice = voice
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ChorusError::Media("elevenlabs: no voice id".to_string()))?;
        self.speak(text, voice, VoiceLanguage::Spanish).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let req = TtsRequest {
            text: "hola",
            model_id: "eleven_multilingual_v2",
            voice_settings: VoiceSettings {
                stability: 0.4,
                similarity_boost: 1.0,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model_id"], "eleven_multilingual_v2");
        assert_eq!(json["voice_settings"]["similarity_boost"], 1.0);
    }

    #[tokio::test]
    async fn test_synthesize_requires_voice() {
        let tts = ElevenLabsTts::from_config(&ElevenLabsConfig::default());
        assert!(!tts.is_configured());
        let err = tts.synthesize("hola", None).await.unwrap_err();
        assert!(matches!(err, ChorusError::Media(_)));
    }
}
