//! OpenAI chat-completions backend.

use async_trait::async_trait;
use chorus_core::{
    config::OpenAiConfig,
    context::{CompletionRequest, ContentItem, ConversationMessage, Role},
    error::ChorusError,
    traits::{Backend, LanguageModel},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    no_system_models: Vec<String>,
}

impl OpenAiProvider {
    /// Create from config values.
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            no_system_models: config.no_system_models.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: ChatContent,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub(crate) enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: Option<u64>,
}

/// The API accepts `^[a-zA-Z0-9_-]{1,64}$` as a participant name.
pub(crate) fn sanitize_name(name: &str) -> Option<String> {
    let clean: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(64)
        .collect();
    (!clean.is_empty()).then_some(clean)
}

fn to_chat_message(msg: &ConversationMessage) -> ChatMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        // Assistant turns may not carry images.
        Role::Assistant if msg.has_image() => "user",
        Role::Assistant => "assistant",
    };

    let content = match msg.content.as_slice() {
        [ContentItem::Text { text }] => ChatContent::Text(text.clone()),
        items => ChatContent::Parts(
            items
                .iter()
                .map(|item| match item {
                    ContentItem::Text { text } => ContentPart::Text { text: text.clone() },
                    ContentItem::Image {
                        data_base64,
                        media_type,
                    } => ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{media_type};base64,{data_base64}"),
                        },
                    },
                })
                .collect(),
        ),
    };

    ChatMessage {
        role,
        name: if role == "user" {
            msg.name.as_deref().and_then(sanitize_name)
        } else {
            None
        },
        content,
    }
}

/// Build OpenAI-format messages; the system prompt leads unless the model rejects it.
pub(crate) fn build_openai_messages(
    system: &str,
    messages: &[ConversationMessage],
    system_role_allowed: bool,
) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        out.push(ChatMessage {
            role: if system_role_allowed { "system" } else { "user" },
            name: None,
            content: ChatContent::Text(system.to_string()),
        });
    }
    out.extend(messages.iter().map(to_chat_message));
    out
}

#[async_trait]
impl LanguageModel for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ChorusError> {
        let start = Instant::now();
        let system_role_allowed = !self.no_system_models.iter().any(|m| m == &request.model);
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: build_openai_messages(
                &request.system_prompt,
                &request.messages,
                system_role_allowed,
            ),
            max_tokens: request.max_tokens,
            top_p: 1.0,
            frequency_penalty: 0.5,
            presence_penalty: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(
            "openai: POST {url} model={} messages={}",
            request.model,
            body.messages.len()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChorusError::Provider(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChorusError::Provider(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| ChorusError::Provider(format!("openai: failed to parse response: {e}")))?;

        let text = parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .unwrap_or_default();

        debug!(
            "openai: {} tokens in {}ms",
            parsed
                .usage
                .as_ref()
                .and_then(|u| u.total_tokens)
                .unwrap_or(0),
            start.elapsed().as_millis()
        );

        Ok(text)
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openai not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider_name() {
        let p = OpenAiProvider::from_config(&OpenAiConfig::default());
        assert_eq!(p.name(), "openai");
        assert_eq!(p.backend(), Backend::OpenAi);
    }

    #[test]
    fn test_system_prompt_first() {
        let msgs = vec![ConversationMessage::user_text(Some("Ana".into()), "Hi")];
        let out = build_openai_messages("Be nice", &msgs, true);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, "system");
        assert_eq!(out[1].role, "user");
        assert_eq!(out[1].name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_system_prompt_as_user_preamble() {
        let msgs = vec![ConversationMessage::user_text(None, "Hi")];
        let out = build_openai_messages("Be nice", &msgs, false);
        assert_eq!(out[0].role, "user");
        assert_eq!(out[0].content, ChatContent::Text("Be nice".into()));
    }

    #[test]
    fn test_image_becomes_data_uri() {
        let msgs = vec![ConversationMessage::new(
            Role::User,
            None,
            vec![
                ContentItem::text("what is this"),
                ContentItem::image("QUJD", "image/jpeg"),
            ],
        )];
        let out = build_openai_messages("", &msgs, true);
        assert_eq!(out.len(), 1);
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,QUJD"
        );
    }

    #[test]
    fn test_assistant_image_turn_sent_as_user() {
        let msgs = vec![ConversationMessage::new(
            Role::Assistant,
            None,
            vec![ContentItem::image("QUJD", "image/png")],
        )];
        let out = build_openai_messages("", &msgs, true);
        assert_eq!(out[0].role, "user");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("José Pérez").as_deref(), Some("JosPrez"));
        assert_eq!(sanitize_name("ñ ñ"), None);
        assert_eq!(sanitize_name(&"a".repeat(80)).map(|n| n.len()), Some(64));
    }

    #[test]
    fn test_plain_text_serializes_as_string() {
        let out = build_openai_messages("", &[ConversationMessage::assistant_text("ok")], true);
        let json = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(json["content"], "ok");
        assert!(json.get("name").is_none());
    }
}
