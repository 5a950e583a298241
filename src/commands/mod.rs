//! Command sub-dispatcher: `<prefix><verb> <args>` messages, answered without the model.

mod audio;
mod media;
mod settings;


use std::sync::RwLock;

use chorus_core::{
    config::Config,
    error::ChorusError,
    message::{Chat, InboundMessage, MessageKind},
    persona::PersonaRegistry,
    traits::{Backend, Transport},
};
use chorus_memory::Store;
use regex::Regex;
use tracing::info;

use crate::gateway::ActiveModel;
use crate::logging::LogControl;
use crate::services::MediaServices;

/// Everything a command handler may touch.
pub struct CommandContext<'a> {
    pub transport: &'a dyn Transport,
    pub store: &'a Store,
    pub personas: &'a PersonaRegistry,
    pub services: &'a MediaServices,
    pub config: &'a Config,
    pub active_model: &'a RwLock<ActiveModel>,
    /// Backends with credentials.
    pub backends: &'a [Backend],
    pub log_control: Option<&'a LogControl>,
    pub chat: &'a Chat,
    pub message: &'a InboundMessage,
    pub args: &'a str,
}

impl CommandContext<'_> {
    /// Reply to the command message.
    pub async fn reply(&self, text: &str) -> Result<(), ChorusError> {
        self.transport
            .send_text(&self.chat.id, text, Some(self.message))
            .await?;
        Ok(())
    }

    fn sender(&self) -> &str {
        &self.message.sender_id
    }

    /// Text of the newest bot message within the scan window.
    async fn last_bot_message(&self) -> Result<Option<String>, ChorusError> {
        let recent = self
            .transport
            .recent_messages(&self.chat.id, self.config.context.last_bot_message_scan)
            .await?;
        for message in recent.iter().filter(|m| m.from_me) {
            match message.kind {
                MessageKind::Text if !message.body.trim().is_empty() => {
                    return Ok(Some(message.body.clone()));
                }
                MessageKind::Voice | MessageKind::Audio => {
                    if let Some(text) = self.store.get_spoken_reply(&message.id).await? {
                        return Ok(Some(text));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// `args` if given, else the last bot message.
    async fn text_or_last_bot_message(&self, args: &str) -> Result<Option<String>, ChorusError> {
        if !args.trim().is_empty() {
            return Ok(Some(args.trim().to_string()));
        }
        self.last_bot_message().await
    }
}

/// Known command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Play or list local audio clips.
    Audio,
    Image,
    Speak,
    ReloadConfig,
    FakeYou,
    Reset,
    /// Spanish named-voice speech.
    Spanish,
    ChangeModel,
    LogLevel,
}

impl Command {
    /// Parse `text` as a command. Unknown verbs are not commands.
    ///
    /// Returns the command and its argument text.
    pub fn parse(text: &str, prefix: &str) -> Option<(Self, String)> {
        if prefix.is_empty() {
            return None;
        }
        let pattern = format!(r"(?s)^{}(\S+)\s*(.*)", regex::escape(prefix));
        let re = Regex::new(&pattern).ok()?;
        let caps = re.captures(text.trim_start())?;
        let verb = caps.get(1)?.as_str();
        let args = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        let command = match verb.to_ascii_lowercase().as_str() {
            "a" => Self::Audio,
            "image" => Self::Image,
            "speak" => Self::Speak,
            "reloadconfig" => Self::ReloadConfig,
            "fakeyou" => Self::FakeYou,
            "reset" | "r" => Self::Reset,
            "sp" => Self::Spanish,
            "changemodel" => Self::ChangeModel,
            "loglevel" => Self::LogLevel,
            _ => return None,
        };
        Some((command, args.to_string()))
    }

    /// Restricted to the super-user once one is configured.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::ReloadConfig | Self::ChangeModel | Self::LogLevel)
    }

    /// Refused for restricted senders.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Speak | Self::FakeYou | Self::Spanish)
    }
}

pub(crate) const ADMIN_ONLY: &str = "Only the owner can use this command.";
pub(crate) const RESTRICTED: &str = "You are not allowed to use this command.";

/// Run a command. Handlers send their own replies.
pub async fn handle(command: Command, ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    info!("command: {command:?} from {} in {}", ctx.sender(), ctx.chat.name);

    if command.is_admin() && !ctx.config.chorus.may_administer(ctx.sender()) {
        return ctx.reply(ADMIN_ONLY).await;
    }
    if command.is_media() && ctx.config.chorus.is_restricted(ctx.sender()) {
        return ctx.reply(RESTRICTED).await;
    }

    match command {
        Command::Audio => audio::handle_clip(ctx).await,
        Command::Speak => audio::handle_speak(ctx).await,
        Command::FakeYou => audio::handle_fakeyou(ctx).await,
        Command::Spanish => audio::handle_spanish(ctx).await,
        Command::Image => media::handle_image(ctx).await,
        Command::Reset => settings::handle_reset(ctx).await,
        Command::ReloadConfig => settings::handle_reload(ctx).await,
        Command::ChangeModel => settings::handle_change_model(ctx).await,
        Command::LogLevel => settings::handle_log_level(ctx).await,
    }
}
