//! Voice command handlers: local clips, speak, fakeyou, and sp.

use std::path::{Path, PathBuf};

use chorus_core::{error::ChorusError, message::Media};
use chorus_providers::transcode::{mime_for_extension, to_voice_note};
use tracing::{info, warn};

use super::CommandContext;

const CLIP_EXTENSIONS: [&str; 5] = ["ogg", "opus", "mp3", "wav", "m4a"];

/// Most FakeYou voices listed in one reply.
const MAX_LISTED_VOICES: usize = 40;

/// Audio clips in `dir`, sorted by name. A missing directory has no clips.
pub(crate) async fn list_clips(dir: &Path) -> Result<Vec<(String, PathBuf)>, ChorusError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut clips = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_clip = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| CLIP_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_clip {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            clips.push((stem.to_string(), path.clone()));
        }
    }
    clips.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(clips)
}

/// Split `"quoted name" text` or `name text`.
pub(crate) fn split_voice_args(args: &str) -> (String, String) {
    let args = args.trim();
    if let Some(rest) = args.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            return (
                rest[..end].trim().to_string(),
                rest[end + 1..].trim().to_string(),
            );
        }
    }
    match args.split_once(char::is_whitespace) {
        Some((name, text)) => (name.to_string(), text.trim().to_string()),
        None => (args.to_string(), String::new()),
    }
}

/// Transcode and send a voice note, remembering what it says.
async fn send_spoken(
    ctx: &CommandContext<'_>,
    audio: Media,
    text: Option<&str>,
) -> Result<(), ChorusError> {
    let audio = to_voice_note(&ctx.services.ffmpeg, audio).await;
    let id = ctx
        .transport
        .send_voice(&ctx.chat.id, &audio, Some(ctx.message))
        .await?;
    if let Some(text) = text {
        if let Err(e) = ctx.store.save_spoken_reply(&ctx.chat.id, &id, text).await {
            warn!("command: failed to cache spoken text for {id}: {e}");
        }
    }
    Ok(())
}

pub(super) async fn handle_clip(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let clips = list_clips(&ctx.services.audio_dir).await?;
    let name = ctx.args.trim();

    if name.is_empty() {
        if clips.is_empty() {
            return ctx.reply("No audio clips available.").await;
        }
        let names: Vec<&str> = clips.iter().map(|(n, _)| n.as_str()).collect();
        return ctx.reply(&format!("Audio clips:\n{}", names.join("\n"))).await;
    }

    let Some((clip, path)) = clips.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) else {
        return ctx
            .reply(&format!(
                "No clip named {name}. Write {}a to list them.",
                ctx.config.chorus.command_prefix
            ))
            .await;
    };

    let data = tokio::fs::read(path).await?;
    info!("command: playing clip {clip}");
    send_spoken(ctx, Media::new(data, mime_for_extension(path)), None).await
}

pub(super) async fn handle_speak(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    if !ctx.config.features.audio_creation_enabled {
        return ctx.reply("Audio creation is disabled.").await;
    }
    let Some(speech) = ctx.services.speech.as_ref() else {
        return ctx.reply("No speech synthesizer is configured.").await;
    };
    let Some(text) = ctx.text_or_last_bot_message(ctx.args).await? else {
        return ctx.reply("Nothing to say yet.").await;
    };

    let audio = speech.synthesize(&text, None).await?;
    send_spoken(ctx, audio, Some(&text)).await
}

pub(super) async fn handle_fakeyou(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let Some(fakeyou) = ctx.services.fakeyou.as_ref() else {
        return ctx.reply("FakeYou is not configured.").await;
    };

    let (query, text) = split_voice_args(ctx.args);
    if query.is_empty() {
        let models = fakeyou.models().await?;
        if models.is_empty() {
            return ctx.reply("No FakeYou voices available.").await;
        }
        let mut titles: Vec<&str> = models.iter().map(|m| m.title.as_str()).collect();
        titles.sort_unstable();
        let mut listing = titles
            .iter()
            .take(MAX_LISTED_VOICES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if titles.len() > MAX_LISTED_VOICES {
            listing.push_str(&format!("\n...and {} more", titles.len() - MAX_LISTED_VOICES));
        }
        return ctx.reply(&format!("FakeYou voices:\n{listing}")).await;
    }

    let Some(model) = fakeyou.find_model(&query).await? else {
        return ctx.reply(&format!("No FakeYou voice matches {query}.")).await;
    };
    let Some(text) = ctx.text_or_last_bot_message(&text).await? else {
        return ctx.reply("Nothing to say yet.").await;
    };

    info!("command: fakeyou {} speaking {} chars", model.title, text.len());
    let audio = fakeyou.synthesize(&model, &text).await?;
    send_spoken(ctx, audio, Some(&text)).await
}

pub(super) async fn handle_spanish(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let Some(voices) = ctx.services.voices.as_ref() else {
        return ctx.reply("ElevenLabs is not configured.").await;
    };
    let eleven = &ctx.config.media.elevenlabs;

    let (name, text) = split_voice_args(ctx.args);
    let Some(voice_id) = eleven.voice_id(&name) else {
        let names = eleven.voice_names();
        let listing = if names.is_empty() {
            "none configured".to_string()
        } else {
            names.join(", ")
        };
        return ctx
            .reply(&format!(
                "Usage: {}sp <voice> <text>\nVoices: {listing}",
                ctx.config.chorus.command_prefix
            ))
            .await;
    };
    let Some(text) = ctx.text_or_last_bot_message(&text).await? else {
        return ctx.reply("Nothing to say yet.").await;
    };

    let audio = voices.synthesize(&text, Some(voice_id)).await?;
    send_spoken(ctx, audio, Some(&text)).await
}
