use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Local audio clips, transcoding and third-party voice vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory holding the clips played by the `a` command.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
    #[serde(default)]
    pub fakeyou: FakeYouConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            ffmpeg_path: default_ffmpeg_path(),
            elevenlabs: ElevenLabsConfig::default(),
            fakeyou: FakeYouConfig::default(),
        }
    }
}

/// ElevenLabs TTS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_eleven_base_url")]
    pub base_url: String,
    #[serde(default = "default_eleven_model")]
    pub model_spanish: String,
    #[serde(default = "default_eleven_model")]
    pub model_english: String,
    /// Voice name (as typed after `-sp`) → voice id.
    #[serde(default = "default_eleven_voices")]
    pub voices: HashMap<String, String>,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_eleven_base_url(),
            model_spanish: default_eleven_model(),
            model_english: default_eleven_model(),
            voices: default_eleven_voices(),
        }
    }
}

impl ElevenLabsConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Case-insensitive voice lookup by name.
    pub fn voice_id(&self, name: &str) -> Option<&str> {
        self.voices
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sorted voice names.
    pub fn voice_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.voices.keys().cloned().collect();
        names.sort();
        names
    }
}

/// FakeYou voice-clone TTS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakeYouConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_fakeyou_base_url")]
    pub base_url: String,
    /// Public bucket serving finished audio.
    #[serde(default = "default_fakeyou_cdn_url")]
    pub cdn_url: String,
    #[serde(default = "default_min_rating")]
    pub min_rating: f64,
    /// Creators whose models are always listed.
    #[serde(default)]
    pub creators: Vec<String>,
    #[serde(default = "default_fakeyou_language")]
    pub language: String,
}

impl Default for FakeYouConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            base_url: default_fakeyou_base_url(),
            cdn_url: default_fakeyou_cdn_url(),
            min_rating: default_min_rating(),
            creators: Vec::new(),
            language: default_fakeyou_language(),
        }
    }
}
