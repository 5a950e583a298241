//! Model adapter: backend selection, retries, and image degradation.
//!
//! Each call is retried up to `attempts` times with a fixed backoff. The
//! next-to-last attempt keeps only the images of the newest image-bearing
//! message; the last attempt sends no images at all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chorus_core::{
    config::ProviderConfig,
    context::{log_view, CompletionRequest, ConversationMessage},
    error::ChorusError,
    reply::StructuredReply,
    traits::{Backend, LanguageModel},
};
use tracing::{debug, info, warn};

/// How much image content an attempt may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImagePolicy {
    All,
    LatestOnly,
    Stripped,
}

fn policy_for(attempt: u32, attempts: u32) -> ImagePolicy {
    if attempt == 0 {
        ImagePolicy::All
    } else if attempt + 1 == attempts {
        ImagePolicy::Stripped
    } else if attempt + 2 == attempts {
        ImagePolicy::LatestOnly
    } else {
        ImagePolicy::All
    }
}

fn degrade(messages: &[ConversationMessage], policy: ImagePolicy) -> Vec<ConversationMessage> {
    let mut out = messages.to_vec();
    match policy {
        ImagePolicy::All => {}
        ImagePolicy::LatestOnly => {
            let latest = out.iter().rposition(ConversationMessage::has_image);
            for (i, msg) in out.iter_mut().enumerate() {
                if Some(i) != latest {
                    msg.replace_images_with_placeholder();
                }
            }
        }
        ImagePolicy::Stripped => out.iter_mut().for_each(ConversationMessage::strip_images),
    }
    out
}

/// Dispatches conversations to the selected backend.
pub struct ModelAdapter {
    backends: HashMap<Backend, Arc<dyn LanguageModel>>,
    attempts: u32,
    backoff: Duration,
}

impl ModelAdapter {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            backends: HashMap::new(),
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Register a backend under the family it reports.
    pub fn with_backend(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.backends.insert(model.backend(), model);
        self
    }

    pub fn backend(&self, backend: Backend) -> Option<&Arc<dyn LanguageModel>> {
        self.backends.get(&backend)
    }

    pub fn backends(&self) -> Vec<Backend> {
        let mut list: Vec<Backend> = self.backends.keys().copied().collect();
        list.sort_by_key(|b| b.as_str());
        list
    }

    /// Send a conversation and return the raw reply text.
    pub async fn send(
        &self,
        messages: &[ConversationMessage],
        system_prompt: &str,
        backend: Backend,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, ChorusError> {
        let provider = self.backends.get(&backend).ok_or_else(|| {
            ChorusError::Provider(format!("backend {backend} is not configured"))
        })?;

        info!(
            "adapter: sending {} messages to {backend} model={model}",
            messages.len()
        );
        debug!("adapter: last messages:\n{}", log_view(tail(messages, 3)));

        let mut last_err = None;
        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff).await;
            }
            let policy = policy_for(attempt, self.attempts);
            let request = CompletionRequest {
                system_prompt: system_prompt.to_string(),
                messages: degrade(messages, policy),
                model: model.to_string(),
                max_tokens,
            };

            match provider.complete(&request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(
                        "adapter: {backend} attempt {}/{} failed ({policy:?} images): {e}",
                        attempt + 1,
                        self.attempts
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ChorusError::Provider("no attempts made".to_string())))
    }

    /// Send a conversation and parse the reply's modality tag.
    pub async fn reply(
        &self,
        messages: &[ConversationMessage],
        system_prompt: &str,
        backend: Backend,
        model: &str,
        max_tokens: u32,
    ) -> Result<StructuredReply, ChorusError> {
        let raw = self
            .send(messages, system_prompt, backend, model, max_tokens)
            .await?;
        Ok(StructuredReply::parse(&raw))
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
