//! OpenAI speech, image generation, and Whisper transcription.

use async_trait::async_trait;
use base64::Engine;
use chorus_core::{
    config::OpenAiConfig,
    error::ChorusError,
    message::Media,
    traits::{ImageGenerator, SpeechSynthesizer, Transcriber},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OpenAI media endpoints sharing one HTTP client.
pub struct OpenAiMedia {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    image_model: String,
    speech_model: String,
    speech_voice: String,
    transcription_model: String,
}

impl OpenAiMedia {
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            image_model: config.image_model.clone(),
            speech_model: config.speech_model.clone(),
            speech_voice: config.speech_voice.clone(),
            transcription_model: config.transcription_model.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    quality: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

/// Whisper API response.
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

async fn error_for_status(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, ChorusError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ChorusError::Media(format!("{what} returned {status}: {body}")))
}

/// File extension the transcription endpoint uses to sniff the format.
fn audio_file_name(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or_default().trim() {
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/mp4" | "audio/m4a" => "audio.m4a",
        "audio/wav" | "audio/x-wav" => "audio.wav",
        "audio/webm" => "audio.webm",
        _ => "audio.ogg",
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiMedia {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Media, ChorusError> {
        let voice = voice.unwrap_or(&self.speech_voice);
        let url = format!("{}/audio/speech", self.base_url);
        debug!("openai: POST {url} model={} voice={voice}", self.speech_model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.speech_model,
                voice,
                input: text,
                response_format: "mp3",
            })
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("openai speech request failed: {e}")))?;
        let resp = error_for_status(resp, "openai speech").await?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChorusError::Media(format!("openai speech body failed: {e}")))?;
        Ok(Media::new(bytes.to_vec(), "audio/mpeg"))
    }
}

#[async_trait]
impl ImageGenerator for OpenAiMedia {
    async fn generate(&self, prompt: &str) -> Result<Media, ChorusError> {
        let url = format!("{}/images/generations", self.base_url);
        debug!("openai: POST {url} model={}", self.image_model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                model: &self.image_model,
                prompt,
                quality: "standard",
                n: 1,
                size: "1024x1024",
            })
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("openai image request failed: {e}")))?;
        let resp = error_for_status(resp, "openai images").await?;

        let parsed: ImageResponse = resp
            .json()
            .await
            .map_err(|e| ChorusError::Media(format!("openai image parse failed: {e}")))?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ChorusError::Media("openai returned no image".to_string()))?;

        if let Some(b64) = first.b64_json {
            let data = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| ChorusError::Media(format!("openai image decode failed: {e}")))?;
            return Ok(Media::new(data, "image/png"));
        }

        let image_url = first
            .url
            .ok_or_else(|| ChorusError::Media("openai image has no url".to_string()))?;
        let resp = self
            .client
            .get(&image_url)
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("image download failed: {e}")))?;
        let resp = error_for_status(resp, "image download").await?;
        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChorusError::Media(format!("image download body failed: {e}")))?;
        Ok(Media::new(bytes.to_vec(), mime))
    }
}

#[async_trait]
impl Transcriber for OpenAiMedia {
    async fn transcribe(&self, audio: &Media) -> Result<String, ChorusError> {
        let mime = audio
            .mime_type
            .split(';')
            .next()
            .unwrap_or("audio/ogg")
            .trim()
            .to_string();
        let part = reqwest::multipart::Part::bytes(audio.data.clone())
            .file_name(audio_file_name(&audio.mime_type))
            .mime_str(&mime)
            .map_err(|e| ChorusError::Media(format!("whisper mime error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChorusError::Media(format!("whisper request failed: {e}")))?;
        let resp = error_for_status(resp, "whisper").await?;

        let result: WhisperResponse = resp
            .json()
            .await
            .map_err(|e| ChorusError::Media(format!("whisper response parse failed: {e}")))?;

        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_file_name() {
        assert_eq!(audio_file_name("audio/ogg; codecs=opus"), "audio.ogg");
        assert_eq!(audio_file_name("audio/mpeg"), "audio.mp3");
        assert_eq!(audio_file_name("application/octet-stream"), "audio.ogg");
    }

    #[test]
    fn test_image_request_shape() {
        let req = ImageRequest {
            model: "dall-e-3",
            prompt: "a fox",
            quality: "standard",
            n: 1,
            size: "1024x1024",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["size"], "1024x1024");
        assert_eq!(json["n"], 1);
    }

    #[test]
    fn test_not_configured_without_key() {
        assert!(!OpenAiMedia::from_config(&OpenAiConfig::default()).is_configured());
    }
}
