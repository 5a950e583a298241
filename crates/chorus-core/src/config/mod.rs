mod channels;
mod defaults;
mod media;

#[cfg(test)]
mod tests;

pub use channels::*;
pub use media::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::ChorusError;
use crate::traits::Backend;
use defaults::*;

/// Top-level Chorus configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chorus: ChorusConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChorusConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Phone number of the super-user. Empty = nobody is privileged.
    #[serde(default)]
    pub personal_number: String,
    /// Persona answering the super-user in 1:1 chats.
    #[serde(default = "default_privileged_persona")]
    pub privileged_persona: String,
    /// Senders denied the media commands.
    #[serde(default)]
    pub restricted_numbers: Vec<String>,
    /// IANA zone used for the date in system prompts.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            command_prefix: default_command_prefix(),
            personal_number: String::new(),
            privileged_persona: default_privileged_persona(),
            restricted_numbers: Vec::new(),
            timezone: default_timezone(),
        }
    }
}

impl ChorusConfig {
    /// The configured super-user, in any chat.
    pub fn is_super_user(&self, sender_id: &str) -> bool {
        !self.personal_number.is_empty() && sender_id == self.personal_number
    }

    /// The super-user writing in a 1:1 chat.
    pub fn is_privileged(&self, sender_id: &str, is_group: bool) -> bool {
        !is_group && self.is_super_user(sender_id)
    }

    /// Admin commands are open to everyone until a super-user is configured.
    pub fn may_administer(&self, sender_id: &str) -> bool {
        self.personal_number.is_empty() || sender_id == self.personal_number
    }

    pub fn is_restricted(&self, sender_id: &str) -> bool {
        self.restricted_numbers.iter().any(|n| n == sender_id)
    }
}

/// Language-model backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend used until `changeModel` selects another.
    #[serde(default = "default_backend")]
    pub default: Backend,
    /// Total attempts per model call, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_backend(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            openai: OpenAiConfig::default(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Default model id for a backend.
    pub fn model_for(&self, backend: Backend) -> &str {
        match backend {
            Backend::OpenAi => &self.openai.model,
            Backend::Anthropic => &self.anthropic.model,
        }
    }

    /// Completion token cap for a backend.
    pub fn completion_cap(&self, backend: Backend) -> u32 {
        match backend {
            Backend::OpenAi => self.openai.max_tokens,
            Backend::Anthropic => self.anthropic.max_tokens,
        }
    }
}

/// OpenAI API config (chat, speech, images, transcription).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Completion cap sent with every chat request.
    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,
    /// Models that reject a system role; the prompt becomes a user preamble.
    #[serde(default = "default_no_system_models")]
    pub no_system_models: Vec<String>,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_speech_voice")]
    pub speech_voice: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            max_tokens: default_openai_max_tokens(),
            no_system_models: default_no_system_models(),
            image_model: default_image_model(),
            speech_model: default_speech_model(),
            speech_voice: default_speech_voice(),
            transcription_model: default_transcription_model(),
        }
    }
}

/// Anthropic API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            max_tokens: default_anthropic_max_tokens(),
        }
    }
}

/// Feature flags for generated media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub image_creation_enabled: bool,
    #[serde(default = "default_true")]
    pub audio_creation_enabled: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            image_creation_enabled: false,
            audio_creation_enabled: true,
        }
    }
}

/// Context-assembly budgets shared by all personas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Messages fetched per reply cycle before filtering.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Token cost charged per image on the OpenAI path.
    #[serde(default = "default_image_token_cost")]
    pub image_token_cost: usize,
    /// How far back commands look for the last bot message.
    #[serde(default = "default_last_bot_message_scan")]
    pub last_bot_message_scan: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            image_token_cost: default_image_token_cost(),
            last_bot_message_scan: default_last_bot_message_scan(),
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_transcript_ttl_secs")]
    pub transcript_ttl_secs: u64,
    /// How long recorded chat messages are kept. Never shorter than the
    /// largest persona `hours_limit`.
    #[serde(default = "default_history_ttl_secs")]
    pub history_ttl_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            transcript_ttl_secs: default_transcript_ttl_secs(),
            history_ttl_secs: default_history_ttl_secs(),
        }
    }
}

impl Config {
    /// Fill empty secrets from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill empty secrets using `lookup` for each known variable.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |slot: &mut String, keys: &[&str]| {
            if !slot.is_empty() {
                return;
            }
            if let Some(value) = keys
                .iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.is_empty())
            {
                *slot = value;
            }
        };

        fill(&mut self.provider.openai.api_key, &["OPENAI_API_KEY"]);
        fill(
            &mut self.provider.anthropic.api_key,
            &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        );
        fill(&mut self.media.elevenlabs.api_key, &["ELEVEN_KEY"]);
        fill(&mut self.media.fakeyou.email, &["FAKEYOU_EMAIL"]);
        fill(&mut self.media.fakeyou.password, &["FAKEYOU_PASS"]);
        fill(&mut self.chorus.personal_number, &["PERSONAL_NUMBER"]);
    }

    /// Log directory under the data dir.
    pub fn logs_dir(&self) -> String {
        format!("{}/logs", shellexpand(&self.chorus.data_dir))
    }

    /// WhatsApp session directory under the data dir.
    pub fn whatsapp_session_dir(&self) -> String {
        format!("{}/whatsapp_session", shellexpand(&self.chorus.data_dir))
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, ChorusError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChorusError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str::<Config>(&content)
            .map_err(|e| ChorusError::Config(format!("failed to parse config: {}", e)))?
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides();
    Ok(config)
}
