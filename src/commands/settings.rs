//! Settings command handlers: reset, reloadConfig, changeModel, logLevel.

use chorus_core::{error::ChorusError, traits::Backend};
use tracing::info;

use super::CommandContext;
use crate::gateway::ActiveModel;
use crate::logging::LEVELS;

/// The reset message itself is the marker the context builder looks for.
pub(super) async fn handle_reset(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    ctx.reply("Conversation reset. I'll start fresh from here.")
        .await
}

pub(super) async fn handle_reload(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let personas = ctx.store.load_personas().await?;
    let count = personas.len();
    ctx.personas.replace(personas);
    info!("command: reloaded {count} personas");
    ctx.reply(&format!("Reloaded {count} personas.")).await
}

pub(super) async fn handle_change_model(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let mut parts = ctx.args.split_whitespace();
    let Some(backend_arg) = parts.next() else {
        return ctx.reply(&model_options(ctx)).await;
    };

    let Some(backend) = Backend::parse(backend_arg) else {
        return ctx
            .reply(&format!("Unknown backend: {backend_arg}\n\n{}", model_options(ctx)))
            .await;
    };
    if !ctx.backends.contains(&backend) {
        return ctx
            .reply(&format!("{backend} is not configured (missing API key)."))
            .await;
    }

    let model = parts
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| ctx.config.provider.model_for(backend).to_string());
    let active = ActiveModel {
        backend,
        model: model.clone(),
    };
    *ctx.active_model.write().unwrap_or_else(|e| e.into_inner()) = active;

    info!("command: active model is now {backend}/{model}");
    ctx.reply(&format!("Now using {backend} with model {model}."))
        .await
}

fn model_options(ctx: &CommandContext<'_>) -> String {
    let active = ctx
        .active_model
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    let mut lines = vec![
        format!("Current: {} {}", active.backend, active.model),
        "Available:".to_string(),
    ];
    for backend in ctx.backends {
        lines.push(format!(
            "- {backend} (default model {})",
            ctx.config.provider.model_for(*backend)
        ));
    }
    lines.push(format!(
        "Usage: {}changeModel <backend> [model]",
        ctx.config.chorus.command_prefix
    ));
    lines.join("\n")
}

pub(super) async fn handle_log_level(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let Some(control) = ctx.log_control else {
        return ctx.reply("Log level cannot be changed in this mode.").await;
    };

    let level = ctx.args.trim();
    if level.is_empty() {
        return ctx
            .reply(&format!(
                "Log level: {}\nOptions: {}",
                control.current(),
                LEVELS.join(", ")
            ))
            .await;
    }

    match control.set_level(level) {
        Ok(()) => {
            info!("command: log level set to {level}");
            ctx.reply(&format!("Log level set to {}.", level.to_ascii_lowercase()))
                .await
        }
        Err(e) => {
            ctx.reply(&format!("{e}. Options: {}", LEVELS.join(", ")))
                .await
        }
    }
}
