//! Generic conversation shape shared by the context builder and model backends.

use serde::{Deserialize, Serialize};

/// Placeholder text for an image that was dropped from a request.
pub const IMAGE_PLACEHOLDER: &str = "<unprocessed image>";

/// Role of the author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One unit of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
    Image { data_base64: String, media_type: String },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data_base64: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::Image {
            data_base64: data_base64.into(),
            media_type: media_type.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Text value, if this is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// One entry of the assembled conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    /// Speaker display name for user turns.
    pub name: Option<String>,
    pub content: Vec<ContentItem>,
}

impl ConversationMessage {
    pub fn new(role: Role, name: Option<String>, content: Vec<ContentItem>) -> Self {
        Self {
            role,
            name,
            content,
        }
    }

    pub fn user_text(name: Option<String>, text: impl Into<String>) -> Self {
        Self::new(Role::User, name, vec![ContentItem::text(text)])
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, None, vec![ContentItem::text(text)])
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(ContentItem::is_image)
    }

    pub fn image_count(&self) -> usize {
        self.content.iter().filter(|c| c.is_image()).count()
    }

    /// Replace every image with the placeholder text.
    pub fn replace_images_with_placeholder(&mut self) {
        for item in &mut self.content {
            if item.is_image() {
                *item = ContentItem::text(IMAGE_PLACEHOLDER);
            }
        }
    }

    /// Drop every image; an emptied message keeps a placeholder so it is never blank.
    pub fn strip_images(&mut self) {
        let before = self.content.len();
        self.content.retain(|c| !c.is_image());
        if self.content.is_empty() && before > 0 {
            self.content.push(ContentItem::text(IMAGE_PLACEHOLDER));
        }
    }

    /// Concatenated text items, joined by newlines.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A fully prepared request for a language model.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ConversationMessage>,
    /// Model id for the selected backend.
    pub model: String,
    pub max_tokens: u32,
}

/// Rough token estimate used for budgeting (about 4 bytes per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Render messages for log output with image payloads elided.
pub fn log_view(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let parts: Vec<String> = m
                .content
                .iter()
                .map(|c| match c {
                    ContentItem::Text { text } => text.clone(),
                    ContentItem::Image { .. } => "<image>".to_string(),
                })
                .collect();
            format!("{:?}: {}", m.role, parts.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_images_keeps_placeholder() {
        let mut msg = ConversationMessage::new(
            Role::User,
            None,
            vec![ContentItem::image("aGk=", "image/jpeg")],
        );
        msg.strip_images();
        assert_eq!(msg.content, vec![ContentItem::text(IMAGE_PLACEHOLDER)]);
    }

    #[test]
    fn test_strip_images_drops_only_images() {
        let mut msg = ConversationMessage::new(
            Role::User,
            None,
            vec![
                ContentItem::text("look"),
                ContentItem::image("aGk=", "image/jpeg"),
            ],
        );
        msg.strip_images();
        assert_eq!(msg.content, vec![ContentItem::text("look")]);
    }

    #[test]
    fn test_replace_images() {
        let mut msg = ConversationMessage::new(
            Role::Assistant,
            None,
            vec![ContentItem::image("aGk=", "image/png")],
        );
        assert!(msg.has_image());
        msg.replace_images_with_placeholder();
        assert!(!msg.has_image());
        assert_eq!(msg.joined_text(), IMAGE_PLACEHOLDER);
    }

    #[test]
    fn test_log_view_hides_base64() {
        let msgs = vec![ConversationMessage::new(
            Role::User,
            Some("ana".into()),
            vec![
                ContentItem::text("hi"),
                ContentItem::image("c2VjcmV0", "image/png"),
            ],
        )];
        let view = log_view(&msgs);
        assert!(view.contains("<image>"));
        assert!(!view.contains("c2VjcmV0"));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
