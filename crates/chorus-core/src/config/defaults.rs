//! Serde default functions for configuration fields.

use std::collections::HashMap;

use crate::traits::Backend;

pub(super) fn default_true() -> bool {
    true
}
pub(super) fn default_name() -> String {
    "Chorus".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.chorus".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_command_prefix() -> String {
    "-".to_string()
}
pub(super) fn default_privileged_persona() -> String {
    "personal".to_string()
}
pub(super) fn default_timezone() -> String {
    "America/Santiago".to_string()
}

pub(super) fn default_backend() -> Backend {
    Backend::Anthropic
}
pub(super) fn default_retry_attempts() -> u32 {
    5
}
pub(super) fn default_retry_backoff_ms() -> u64 {
    1000
}

pub(super) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
pub(super) fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
pub(super) fn default_openai_max_tokens() -> u32 {
    1024
}
pub(super) fn default_no_system_models() -> Vec<String> {
    vec!["o1-mini".to_string(), "o1-preview".to_string()]
}
pub(super) fn default_image_model() -> String {
    "dall-e-3".to_string()
}
pub(super) fn default_speech_model() -> String {
    "tts-1".to_string()
}
pub(super) fn default_speech_voice() -> String {
    "nova".to_string()
}
pub(super) fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

pub(super) fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
pub(super) fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}
pub(super) fn default_anthropic_max_tokens() -> u32 {
    1250
}

pub(super) fn default_history_window() -> usize {
    300
}
pub(super) fn default_image_token_cost() -> usize {
    765
}
pub(super) fn default_last_bot_message_scan() -> usize {
    50
}

pub(super) fn default_db_path() -> String {
    "~/.chorus/data/chorus.db".to_string()
}
pub(super) fn default_transcript_ttl_secs() -> u64 {
    172_800
}
pub(super) fn default_history_ttl_secs() -> u64 {
    604_800
}

pub(super) fn default_audio_dir() -> String {
    "~/.chorus/audio".to_string()
}
pub(super) fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}
pub(super) fn default_eleven_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
pub(super) fn default_eleven_model() -> String {
    "eleven_multilingual_v2".to_string()
}
pub(super) fn default_eleven_voices() -> HashMap<String, String> {
    HashMap::new()
}
pub(super) fn default_fakeyou_base_url() -> String {
    "https://api.fakeyou.com".to_string()
}
pub(super) fn default_fakeyou_cdn_url() -> String {
    "https://storage.googleapis.com/vocodes-public".to_string()
}
pub(super) fn default_min_rating() -> f64 {
    3.7
}
pub(super) fn default_fakeyou_language() -> String {
    "es".to_string()
}
