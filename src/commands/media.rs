//! Image command handler.

use chorus_core::error::ChorusError;

use super::CommandContext;

pub(super) async fn handle_image(ctx: &CommandContext<'_>) -> Result<(), ChorusError> {
    let allowed = ctx.config.features.image_creation_enabled
        || ctx.config.chorus.is_super_user(ctx.sender());
    if !allowed {
        return ctx.reply("Image creation is disabled.").await;
    }
    let Some(generator) = ctx.services.images.as_ref() else {
        return ctx.reply("No image generator is configured.").await;
    };

    let prompt = ctx.args.trim();
    if prompt.is_empty() {
        return ctx
            .reply(&format!(
                "Usage: {}image <description>",
                ctx.config.chorus.command_prefix
            ))
            .await;
    }

    let image = generator.generate(prompt).await?;
    ctx.transport
        .send_image(&ctx.chat.id, &image, None, Some(ctx.message))
        .await?;
    Ok(())
}
