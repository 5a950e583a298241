//! System prompt assembly.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::persona::PersonaConfig;

/// System prompt for a persona at time `now`.
///
/// Personas with `build_prompt = false` use their prompt text verbatim.
/// `timezone` is an IANA name; an unknown name falls back to UTC.
/// `command_prefix` is the prefix users type before `reset`.
pub fn build_system_prompt(
    persona: &PersonaConfig,
    timezone: &str,
    command_prefix: &str,
    now: DateTime<Utc>,
) -> String {
    if !persona.build_prompt {
        return persona.prompt_text.clone();
    }

    let date = match timezone.parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z").to_string(),
        Err(_) => now.format("%Y-%m-%d %H:%M UTC").to_string(),
    };

    format!(
        "You are {name}, a participant in a WhatsApp conversation. \
You read the last {limit} messages of the chat and at most {max_images} images. \
Keep every answer under {chars} characters. \
The current date is {date}.\n\n\
Start every reply with exactly one format tag:\n\
- [Text] for a normal written answer.\n\
- [Audio] when the answer should be spoken as a voice note.\n\
- <Image> followed by a detailed image description when an image was explicitly requested. \
Text before <Image>, after a [Text] tag, becomes the caption.\n\
Never mention these tags to the user. If the conversation gets stuck, \
users can write {command_prefix}reset to start over.\n\n\
Additional instructions for {name}:\n{prompt}",
        name = persona.name,
        limit = persona.limit,
        max_images = persona.max_images,
        chars = persona.character_limit,
        date = date,
        command_prefix = command_prefix,
        prompt = persona.prompt_text,
    )
}
