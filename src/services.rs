//! Media vendors the gateway and commands draw on.

use std::path::PathBuf;
use std::sync::Arc;

use chorus_core::{
    config::Config,
    error::ChorusError,
    message::Media,
    shellexpand,
    traits::{ImageGenerator, SpeechSynthesizer, Transcriber},
};
use chorus_providers::{ElevenLabsTts, FakeYouClient, OpenAiMedia};
use tracing::info;

/// Configured media vendors. `None` means the vendor has no credentials.
pub struct MediaServices {
    /// Default text-to-speech voice.
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    /// Named-voice synthesis keyed by vendor voice id.
    pub voices: Option<Arc<dyn SpeechSynthesizer>>,
    pub images: Option<Arc<dyn ImageGenerator>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub fakeyou: Option<Arc<FakeYouClient>>,
    pub ffmpeg: String,
    /// Directory of local clips served by the `a` command.
    pub audio_dir: PathBuf,
}

impl MediaServices {
    pub fn from_config(config: &Config) -> Self {
        let openai = Arc::new(OpenAiMedia::from_config(&config.provider.openai));
        let (speech, images, transcriber) = if openai.is_configured() {
            (
                Some(openai.clone() as Arc<dyn SpeechSynthesizer>),
                Some(openai.clone() as Arc<dyn ImageGenerator>),
                Some(openai as Arc<dyn Transcriber>),
            )
        } else {
            (None, None, None)
        };

        let eleven = ElevenLabsTts::from_config(&config.media.elevenlabs);
        let voices = eleven
            .is_configured()
            .then(|| Arc::new(eleven) as Arc<dyn SpeechSynthesizer>);

        let fakeyou = FakeYouClient::from_config(&config.media.fakeyou);
        let fakeyou = fakeyou.is_configured().then(|| Arc::new(fakeyou));

        info!(
            "media: openai={} elevenlabs={} fakeyou={}",
            speech.is_some(),
            voices.is_some(),
            fakeyou.is_some()
        );

        Self {
            speech,
            voices,
            images,
            transcriber,
            fakeyou,
            ffmpeg: config.media.ffmpeg_path.clone(),
            audio_dir: PathBuf::from(shellexpand(&config.media.audio_dir)),
        }
    }

    /// No vendors at all.
    pub fn none() -> Self {
        Self {
            speech: None,
            voices: None,
            images: None,
            transcriber: None,
            fakeyou: None,
            ffmpeg: "ffmpeg".to_string(),
            audio_dir: PathBuf::new(),
        }
    }

    /// Whether some vendor can voice a persona with this `voice_id`.
    pub fn can_speak(&self, voice_id: Option<&str>) -> bool {
        let named = voice_id.is_some_and(|v| !v.is_empty()) && self.voices.is_some();
        named || self.speech.is_some()
    }

    /// Speak `text` in a persona's voice, or the default voice when it has none.
    pub async fn persona_voice(
        &self,
        text: &str,
        voice_id: Option<&str>,
    ) -> Result<Media, ChorusError> {
        let voice_id = voice_id.filter(|v| !v.is_empty());
        if let (Some(voice_id), Some(voices)) = (voice_id, self.voices.as_ref()) {
            return voices.synthesize(text, Some(voice_id)).await;
        }
        match self.speech.as_ref() {
            Some(speech) => speech.synthesize(text, None).await,
            None => Err(ChorusError::Media(
                "no speech synthesizer is configured".to_string(),
            )),
        }
    }
}
