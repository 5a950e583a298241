//! ffmpeg transcoding to OGG/Opus, the format WhatsApp plays as a voice note.

use std::process::Stdio;

use chorus_core::{error::ChorusError, message::Media};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

pub const VOICE_NOTE_MIME: &str = "audio/ogg; codecs=opus";

/// Transcode audio through ffmpeg's stdin/stdout.
pub async fn transcode_to_ogg(ffmpeg: &str, audio: &Media) -> Result<Media, ChorusError> {
    let mut child = Command::new(ffmpeg)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-vn",
            "-c:a",
            "libopus",
            "-b:a",
            "64k",
            "-f",
            "ogg",
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ChorusError::Media(format!("failed to start {ffmpeg}: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ChorusError::Media("ffmpeg stdin unavailable".to_string()))?;
    let input = audio.data.clone();
    let writer = tokio::spawn(async move {
        let result = stdin.write_all(&input).await;
        drop(stdin);
        result
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ChorusError::Media(format!("ffmpeg failed: {e}")))?;
    if let Ok(Err(e)) = writer.await {
        debug!("transcode: stdin closed early: {e}");
    }

    if !output.status.success() || output.stdout.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChorusError::Media(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(Media::new(output.stdout, VOICE_NOTE_MIME))
}

/// Transcode for a voice note; on failure the original audio is returned as-is.
pub async fn to_voice_note(ffmpeg: &str, audio: Media) -> Media {
    if audio.is_ogg() {
        return audio;
    }
    match transcode_to_ogg(ffmpeg, &audio).await {
        Ok(ogg) => ogg,
        Err(e) => {
            warn!("transcode: sending original {} audio: {e}", audio.mime_type);
            audio
        }
    }
}

/// MIME type of a local clip, guessed from its extension.
pub fn mime_for_extension(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}
