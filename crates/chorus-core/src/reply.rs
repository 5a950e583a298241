//! Modality tags in model output.
//!
//! Personas are instructed to start a reply with `[Text]` or `[Audio]`, or to
//! emit an `<Image>` marker followed by an image prompt. The tag is stripped
//! here and never reaches the user.

use serde::{Deserialize, Serialize};

const TEXT_TAG: &str = "[Text]";
const AUDIO_TAG: &str = "[Audio]";
const IMAGE_MARKERS: [&str; 2] = ["<Image>", "[Image]"];

/// How a reply should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    Text,
    Audio,
    Image,
}

/// Normalized model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReply {
    pub modality: Modality,
    /// Reply text, or the image prompt for `Modality::Image`.
    pub text: String,
    pub image_caption: Option<String>,
}

impl StructuredReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            modality: Modality::Text,
            text: text.into(),
            image_caption: None,
        }
    }

    /// Parse raw model output into a reply, stripping at most one modality tag.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some((header, prompt)) = split_image_marker(trimmed) {
            let caption = strip_leading_tag(header.trim()).1.trim().to_string();
            return Self {
                modality: Modality::Image,
                text: prompt.trim().to_string(),
                image_caption: (!caption.is_empty()).then_some(caption),
            };
        }

        let (modality, rest) = strip_leading_tag(trimmed);
        Self {
            modality: modality.unwrap_or(Modality::Text),
            text: rest.trim().to_string(),
            image_caption: None,
        }
    }
}

/// Split at the first image marker, returning (header, prompt).
fn split_image_marker(text: &str) -> Option<(&str, &str)> {
    IMAGE_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker).map(|pos| (pos, marker.len())))
        .min_by_key(|(pos, _)| *pos)
        .map(|(pos, len)| (&text[..pos], &text[pos + len..]))
}

/// Remove a leading `[Text]`/`[Audio]` tag (case-insensitive).
fn strip_leading_tag(text: &str) -> (Option<Modality>, &str) {
    for (tag, modality) in [(TEXT_TAG, Modality::Text), (AUDIO_TAG, Modality::Audio)] {
        if text.len() >= tag.len()
            && text.is_char_boundary(tag.len())
            && text[..tag.len()].eq_ignore_ascii_case(tag)
        {
            return (Some(modality), &text[tag.len()..]);
        }
    }
    (None, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_tag_stripped() {
        let reply = StructuredReply::parse("[Text] hello");
        assert_eq!(reply.modality, Modality::Text);
        assert_eq!(reply.text, "hello");
    }

    #[test]
    fn test_no_double_strip() {
        let first = StructuredReply::parse("[Text] hello");
        let second = StructuredReply::parse(&first.text);
        assert_eq!(second, first);
    }

    #[test]
    fn test_untagged_defaults_to_text() {
        let reply = StructuredReply::parse("  just words ");
        assert_eq!(reply, StructuredReply::text("just words"));
    }

    #[test]
    fn test_audio_tag() {
        let reply = StructuredReply::parse("[audio] dímelo cantando");
        assert_eq!(reply.modality, Modality::Audio);
        assert_eq!(reply.text, "dímelo cantando");
    }

    #[test]
    fn test_image_with_caption() {
        let reply = StructuredReply::parse("[Text] Here it is <Image> a red fox in snow");
        assert_eq!(reply.modality, Modality::Image);
        assert_eq!(reply.text, "a red fox in snow");
        assert_eq!(reply.image_caption.as_deref(), Some("Here it is"));
    }

    #[test]
    fn test_image_without_caption() {
        let reply = StructuredReply::parse("[Image] a lighthouse");
        assert_eq!(reply.modality, Modality::Image);
        assert_eq!(reply.text, "a lighthouse");
        assert!(reply.image_caption.is_none());
    }

    #[test]
    fn test_tag_only_in_middle_is_kept() {
        let reply = StructuredReply::parse("I said [Audio] before");
        assert_eq!(reply.modality, Modality::Text);
        assert_eq!(reply.text, "I said [Audio] before");
    }

    #[test]
    fn test_non_ascii_prefix_does_not_panic() {
        let reply = StructuredReply::parse("ñandú");
        assert_eq!(reply.text, "ñandú");
    }
}
