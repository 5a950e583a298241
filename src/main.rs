mod commands;
mod gateway;
mod logging;
mod services;

#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use chorus_channels::WhatsAppTransport;
use chorus_core::{
    config::{self, Config},
    context::ConversationMessage,
    persona::{PersonaConfig, PersonaRegistry},
    prompt::build_system_prompt,
    traits::{LanguageModel, Transport},
};
use chorus_memory::Store;
use chorus_providers::{AnthropicProvider, ModelAdapter, OpenAiProvider};
use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(
    name = "chorus",
    version,
    about = "Chorus — WhatsApp persona bot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to WhatsApp and start answering.
    Start,
    /// Show configuration, backend availability, and persona count.
    Status,
    /// Manage the persona table.
    Personas {
        #[command(subcommand)]
        action: PersonaAction,
    },
    /// One-shot completion through a persona.
    Ask {
        /// Persona whose system prompt is used.
        #[arg(short, long)]
        persona: String,
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PersonaAction {
    /// Print every persona.
    List,
    /// Upsert personas from a TOML file with a `[[persona]]` array.
    Import { file: String },
}

/// Persona import file.
#[derive(Deserialize)]
struct PersonaFile {
    #[serde(default)]
    persona: Vec<PersonaConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let (log_control, _log_guard) =
                logging::init(Path::new(&cfg.logs_dir()), &cfg.chorus.log_level)?;

            if !cfg.channel.whatsapp.enabled {
                anyhow::bail!(
                    "WhatsApp is disabled. Set [channel.whatsapp] enabled = true in {}.",
                    cli.config
                );
            }

            let adapter = build_adapter(&cfg);
            if adapter.backends().is_empty() {
                anyhow::bail!(
                    "No language-model backend configured. \
                     Set OPENAI_API_KEY or ANTHROPIC_API_KEY."
                );
            }

            let store = Store::new(&cfg.memory).await?;
            let personas = store.load_personas().await?;
            if personas.is_empty() {
                tracing::warn!("no personas configured; only commands will be answered");
            }
            let registry = Arc::new(PersonaRegistry::new(
                personas,
                cfg.chorus.privileged_persona.clone(),
            ));

            let transport: Arc<dyn Transport> = Arc::new(WhatsAppTransport::new(
                cfg.channel.whatsapp.clone(),
                cfg.whatsapp_session_dir(),
                store.clone(),
            ));
            let services = services::MediaServices::from_config(&cfg);

            println!("Chorus — Starting bot...");
            let gw = Arc::new(gateway::Gateway::new(
                cfg,
                transport,
                registry,
                store,
                adapter,
                services,
                Some(log_control),
            ));
            gw.run().await?;
        }
        Commands::Status => {
            logging::init_console(&cfg.chorus.log_level);
            println!("Chorus — Status Check\n");
            println!("Config: {}", cli.config);
            println!("Default backend: {}", cfg.provider.default);
            println!("Data dir: {}", config::shellexpand(&cfg.chorus.data_dir));
            println!();

            let adapter = build_adapter(&cfg);
            for backend in adapter.backends() {
                if let Some(model) = adapter.backend(backend) {
                    let available = model.is_available().await;
                    println!(
                        "  {backend}: {} ({})",
                        if available { "available" } else { "unavailable" },
                        cfg.provider.model_for(backend)
                    );
                }
            }
            if adapter.backends().is_empty() {
                println!("  no backend configured");
            }
            println!();

            let session = Path::new(&cfg.whatsapp_session_dir()).join("whatsapp.db");
            println!(
                "  whatsapp: {}",
                match (cfg.channel.whatsapp.enabled, session.exists()) {
                    (true, true) => "enabled, paired",
                    (true, false) => "enabled, not paired",
                    (false, _) => "disabled",
                }
            );

            let store = Store::new(&cfg.memory).await?;
            println!("  personas: {}", store.load_personas().await?.len());
        }
        Commands::Personas { action } => {
            logging::init_console(&cfg.chorus.log_level);
            let store = Store::new(&cfg.memory).await?;
            match action {
                PersonaAction::List => {
                    let personas = store.load_personas().await?;
                    if personas.is_empty() {
                        println!("No personas.");
                    }
                    for p in personas {
                        println!(
                            "{:<16} groups={:<24} prefix={:<10} limit={} hours={} images={} voice={}",
                            p.name,
                            p.groups,
                            p.prefix,
                            p.limit,
                            p.hours_limit,
                            p.max_images,
                            p.voice_id.as_deref().unwrap_or("-")
                        );
                    }
                }
                PersonaAction::Import { file } => {
                    let content = std::fs::read_to_string(&file)
                        .map_err(|e| anyhow::anyhow!("failed to read {file}: {e}"))?;
                    let parsed: PersonaFile = toml::from_str(&content)
                        .map_err(|e| anyhow::anyhow!("failed to parse {file}: {e}"))?;
                    for persona in &parsed.persona {
                        store.upsert_persona(persona).await?;
                        println!("imported {}", persona.name);
                    }
                    println!("{} personas imported.", parsed.persona.len());
                }
            }
        }
        Commands::Ask { persona, message } => {
            logging::init_console(&cfg.chorus.log_level);
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: chorus ask --persona <name> <message>");
            }

            let store = Store::new(&cfg.memory).await?;
            let registry = PersonaRegistry::new(
                store.load_personas().await?,
                cfg.chorus.privileged_persona.clone(),
            );
            let persona = registry
                .get(&persona)
                .ok_or_else(|| anyhow::anyhow!("no persona named {persona}"))?;

            let adapter = build_adapter(&cfg);
            let backend = cfg.provider.default;
            let system_prompt = build_system_prompt(
                &persona,
                &cfg.chorus.timezone,
                &cfg.chorus.command_prefix,
                chrono::Utc::now(),
            );
            let messages = vec![ConversationMessage::user_text(None, message.join(" "))];

            let reply = adapter
                .reply(
                    &messages,
                    &system_prompt,
                    backend,
                    cfg.provider.model_for(backend),
                    cfg.provider.completion_cap(backend),
                )
                .await?;
            println!("[{:?}] {}", reply.modality, reply.text);
            if let Some(caption) = reply.image_caption {
                println!("caption: {caption}");
            }
        }
    }

    Ok(())
}

/// Register every backend that has credentials.
fn build_adapter(cfg: &Config) -> ModelAdapter {
    let mut adapter = ModelAdapter::from_config(&cfg.provider);
    if !cfg.provider.openai.api_key.is_empty() {
        let openai: Arc<dyn LanguageModel> =
            Arc::new(OpenAiProvider::from_config(&cfg.provider.openai));
        adapter = adapter.with_backend(openai);
    }
    if !cfg.provider.anthropic.api_key.is_empty() {
        let anthropic: Arc<dyn LanguageModel> =
            Arc::new(AnthropicProvider::from_config(&cfg.provider.anthropic));
        adapter = adapter.with_backend(anthropic);
    }
    adapter
}
