//! Per-message pipeline: commands, persona resolution, and the reply cycle.

use chorus_core::{
    error::ChorusError,
    message::{Chat, Inbound, InboundMessage},
    persona::PersonaConfig,
};
use chrono::Utc;
use tracing::{debug, error, info};

use super::{context::ContextBuilder, reply::ReplyRouter, Gateway};
use crate::commands::{self, Command, CommandContext};

impl Gateway {
    /// Handle one inbound message end to end.
    pub(crate) async fn handle_message(&self, inbound: Inbound) {
        let Inbound { chat, message } = inbound;

        if chat.is_broadcast() {
            debug!("gateway: ignoring broadcast {}", chat.id);
            return;
        }
        if message.from_me {
            return;
        }

        info!(
            "[{}] {} says: {}",
            chat.name,
            message.sender_name.as_deref().unwrap_or(&message.sender_id),
            message.preview()
        );

        // Commands never touch the chat lock.
        if let Some((command, args)) =
            Command::parse(&message.body, &self.config.chorus.command_prefix)
        {
            let backends = self.adapter.backends();
            let ctx = CommandContext {
                transport: self.transport.as_ref(),
                store: &self.store,
                personas: &self.personas,
                services: &self.services,
                config: &self.config,
                active_model: &self.active_model,
                backends: &backends,
                log_control: self.log_control.as_ref(),
                chat: &chat,
                message: &message,
                args: &args,
            };
            if let Err(e) = commands::handle(command, &ctx).await {
                error!("gateway: command {command:?} failed in {}: {e}", chat.name);
                self.apologize(&chat, &message).await;
            }
            return;
        }

        if !message.kind.can_trigger() {
            debug!("gateway: {} messages do not trigger replies", message.kind.as_str());
            return;
        }

        let privileged = self
            .config
            .chorus
            .is_privileged(&message.sender_id, chat.is_group);
        let Some(persona) = self.personas.resolve(&message, &chat, privileged) else {
            debug!("gateway: no persona for message {} in {}", message.id, chat.name);
            return;
        };
        info!("gateway: {} answers in {}", persona.name, chat.name);

        if let Err(e) = self.answer(&chat, &message, &persona).await {
            error!("gateway: {} failed in {}: {e}", persona.name, chat.name);
            self.apologize(&chat, &message).await;
        }
    }

    /// Build context and call the model under the chat lock, then send the reply.
    async fn answer(
        &self,
        chat: &Chat,
        message: &InboundMessage,
        persona: &PersonaConfig,
    ) -> Result<(), ChorusError> {
        if let Err(e) = self.transport.send_typing(&chat.id).await {
            debug!("gateway: typing indicator failed: {e}");
        }

        let active = self.active_model();
        let reply = {
            let _guard = self.chat_locks.acquire(&chat.id).await;
            let builder = ContextBuilder::new(
                self.transport.as_ref(),
                &self.store,
                self.services.transcriber.as_deref(),
                &self.config.context,
                &self.config.chorus.timezone,
                &self.config.chorus.command_prefix,
            );
            let context = builder
                .build(chat, persona, active.backend, Utc::now())
                .await?;
            if context.messages.is_empty() {
                debug!("gateway: empty context for {}, not answering", chat.name);
                return Ok(());
            }

            self.adapter
                .reply(
                    &context.messages,
                    &context.system_prompt,
                    active.backend,
                    &active.model,
                    self.config.provider.completion_cap(active.backend),
                )
                .await?
        };

        ReplyRouter::new(
            self.transport.as_ref(),
            &self.store,
            &self.services,
            &self.config.features,
        )
        .dispatch(reply, chat, message, persona)
        .await
    }

    /// Generic failure reply; details stay in the log.
    async fn apologize(&self, chat: &Chat, message: &InboundMessage) {
        let text = apology(&self.config.chorus.command_prefix);
        let reply_to = chat.is_group.then_some(message);
        if let Err(e) = self.transport.send_text(&chat.id, &text, reply_to).await {
            error!("gateway: failed to send apology to {}: {e}", chat.name);
        }
    }
}

pub(crate) fn apology(command_prefix: &str) -> String {
    format!(
        "Sorry, something went wrong. Write {command_prefix}reset to start a fresh conversation."
    )
}
