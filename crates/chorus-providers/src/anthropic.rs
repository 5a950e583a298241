//! Anthropic Messages API backend.
//!
//! The API takes the system prompt as a top-level field and requires the
//! message list to alternate user/assistant turns, starting with a user turn.
//! Assistant turns may not carry images.

use async_trait::async_trait;
use chorus_core::{
    config::AnthropicConfig,
    context::{CompletionRequest, ContentItem, ConversationMessage, Role},
    error::ChorusError,
    traits::{Backend, LanguageModel},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    /// Create from config values.
    pub fn from_config(config: &AnthropicConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<AnthropicMessage>,
    top_p: f32,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AnthropicRole {
    User,
    Assistant,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: Vec<ContentBlock>,
}

impl AnthropicMessage {
    fn has_image(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::Image { .. }))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct ImageSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub media_type: String,
    pub data: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContentBlock>>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn to_blocks(msg: &ConversationMessage) -> Vec<ContentBlock> {
    let mut named = false;
    let mut blocks: Vec<ContentBlock> = msg
        .content
        .iter()
        .filter_map(|item| match item {
            ContentItem::Text { text } if text.trim().is_empty() => None,
            ContentItem::Text { text } => {
                // The speaker name rides in the first text block.
                let text = match (&msg.name, named, msg.role) {
                    (Some(name), false, Role::User) => {
                        named = true;
                        format!("{name}: {text}")
                    }
                    _ => text.clone(),
                };
                Some(ContentBlock::Text { text })
            }
            ContentItem::Image {
                data_base64,
                media_type,
            } => Some(ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: media_type.clone(),
                    data: data_base64.clone(),
                },
            }),
        })
        .collect();

    if let (Some(name), false, Role::User) = (&msg.name, named, msg.role) {
        if !blocks.is_empty() {
            blocks.insert(0, ContentBlock::Text {
                text: format!("{name}:"),
            });
        }
    }
    blocks
}

fn merge_adjacent(messages: Vec<AnthropicMessage>) -> Vec<AnthropicMessage> {
    let mut merged: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());
    for msg in messages {
        match merged.last_mut() {
            Some(last) if last.role == msg.role => last.content.extend(msg.content),
            _ => merged.push(msg),
        }
    }
    merged
}

/// Convert generic messages into a valid Anthropic message list.
///
/// Order: merge same-role neighbours, move image-bearing assistant turns to
/// the user role, merge again, then drop leading assistant turns.
pub(crate) fn to_anthropic_messages(
    messages: &[ConversationMessage],
) -> Result<Vec<AnthropicMessage>, ChorusError> {
    let converted: Vec<AnthropicMessage> = messages
        .iter()
        .map(|m| AnthropicMessage {
            role: match m.role {
                Role::Assistant => AnthropicRole::Assistant,
                Role::User | Role::System => AnthropicRole::User,
            },
            content: to_blocks(m),
        })
        .filter(|m| !m.content.is_empty())
        .collect();

    let mut merged = merge_adjacent(converted);
    for msg in &mut merged {
        if msg.role == AnthropicRole::Assistant && msg.has_image() {
            msg.role = AnthropicRole::User;
        }
    }
    let mut merged = merge_adjacent(merged);

    let first_user = merged
        .iter()
        .position(|m| m.role == AnthropicRole::User)
        .unwrap_or(merged.len());
    merged.drain(..first_user);

    if merged.is_empty() {
        return Err(ChorusError::Provider(
            "anthropic: no user message to send".to_string(),
        ));
    }
    Ok(merged)
}

#[async_trait]
impl LanguageModel for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn backend(&self) -> Backend {
        Backend::Anthropic
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChorusError> {
        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system_prompt,
            messages: to_anthropic_messages(&request.messages)?,
            top_p: 1.0,
        };

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        debug!(
            "anthropic: POST {url} model={} messages={}",
            request.model,
            body.messages.len()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChorusError::Provider(format!("anthropic request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChorusError::Provider(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let parsed: AnthropicResponse = resp.json().await.map_err(|e| {
            ChorusError::Provider(format!("anthropic: failed to parse response: {e}"))
        })?;

        if let Some(u) = &parsed.usage {
            debug!(
                "anthropic: {} input / {} output tokens",
                u.input_tokens, u.output_tokens
            );
        }

        Ok(parsed
            .content
            .as_ref()
            .and_then(|blocks| blocks.first())
            .map(|b| b.text.clone())
            .unwrap_or_default())
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("anthropic: no API key configured");
            return false;
        }
        // No lightweight health endpoint; we trust the key is valid.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ContentItem {
        ContentItem::image("QUJD", "image/png")
    }

    #[test]
    fn test_anthropic_provider_name() {
        let p = AnthropicProvider::from_config(&AnthropicConfig::default());
        assert_eq!(p.name(), "anthropic");
        assert_eq!(p.backend(), Backend::Anthropic);
    }

    #[test]
    fn test_assistant_image_turns_merge_into_user() {
        let msgs = vec![
            ConversationMessage::new(Role::Assistant, None, vec![image()]),
            ConversationMessage::assistant_text("here you go"),
        ];
        let out = to_anthropic_messages(&msgs).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, AnthropicRole::User);
        assert_eq!(out[0].content.len(), 2);
    }

    #[test]
    fn test_coerced_turn_remerges_with_user() {
        let msgs = vec![
            ConversationMessage::user_text(None, "draw a cat"),
            ConversationMessage::new(Role::Assistant, None, vec![image()]),
            ConversationMessage::user_text(None, "nice"),
            ConversationMessage::assistant_text("thanks"),
        ];
        let out = to_anthropic_messages(&msgs).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, AnthropicRole::User);
        assert_eq!(out[0].content.len(), 3);
        assert_eq!(out[1].role, AnthropicRole::Assistant);
    }

    #[test]
    fn test_roles_alternate() {
        let msgs = vec![
            ConversationMessage::user_text(None, "a"),
            ConversationMessage::user_text(None, "b"),
            ConversationMessage::assistant_text("c"),
            ConversationMessage::assistant_text("d"),
            ConversationMessage::user_text(None, "e"),
        ];
        let out = to_anthropic_messages(&msgs).unwrap();
        let roles: Vec<AnthropicRole> = out.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                AnthropicRole::User,
                AnthropicRole::Assistant,
                AnthropicRole::User
            ]
        );
    }

    #[test]
    fn test_leading_assistant_dropped() {
        let msgs = vec![
            ConversationMessage::assistant_text("hello"),
            ConversationMessage::user_text(None, "hi"),
        ];
        let out = to_anthropic_messages(&msgs).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role, AnthropicRole::User);
    }

    #[test]
    fn test_only_assistant_is_error() {
        let msgs = vec![ConversationMessage::assistant_text("hello")];
        assert!(to_anthropic_messages(&msgs).is_err());
    }

    #[test]
    fn test_speaker_name_prefixed() {
        let msgs = vec![ConversationMessage::user_text(Some("Ana".into()), "hola")];
        let out = to_anthropic_messages(&msgs).unwrap();
        assert_eq!(
            out[0].content[0],
            ContentBlock::Text {
                text: "Ana: hola".into()
            }
        );
    }

    #[test]
    fn test_image_block_shape() {
        let msgs = vec![ConversationMessage::new(Role::User, None, vec![image()])];
        let out = to_anthropic_messages(&msgs).unwrap();
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["content"][0]["type"], "image");
        assert_eq!(json["content"][0]["source"]["type"], "base64");
        assert_eq!(json["content"][0]["source"]["media_type"], "image/png");
    }
}
