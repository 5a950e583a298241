//! Gateway: the event loop connecting the transport, personas, and the model.

mod chat_lock;
mod context;
mod pipeline;
mod reply;


pub use chat_lock::ChatLocks;
pub use context::{BuiltContext, ContextBuilder};
pub use reply::ReplyRouter;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chorus_core::{
    config::Config,
    error::ChorusError,
    persona::{PersonaConfig, PersonaRegistry},
    traits::{Backend, Transport},
};
use chorus_memory::Store;
use chorus_providers::ModelAdapter;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::logging::LogControl;
use crate::services::MediaServices;

/// How often expired transcripts and old history are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Backend and model used for new reply cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveModel {
    pub backend: Backend,
    pub model: String,
}

/// Routes inbound messages to personas and commands.
pub struct Gateway {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) personas: Arc<PersonaRegistry>,
    pub(crate) store: Store,
    pub(crate) adapter: ModelAdapter,
    pub(crate) services: MediaServices,
    pub(crate) chat_locks: ChatLocks,
    pub(crate) active_model: RwLock<ActiveModel>,
    pub(crate) config: Config,
    pub(crate) log_control: Option<LogControl>,
}

impl Gateway {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        personas: Arc<PersonaRegistry>,
        store: Store,
        adapter: ModelAdapter,
        services: MediaServices,
        log_control: Option<LogControl>,
    ) -> Self {
        let backend = config.provider.default;
        let active = ActiveModel {
            backend,
            model: config.provider.model_for(backend).to_string(),
        };
        if adapter.backend(backend).is_none() {
            warn!("gateway: default backend {backend} has no credentials");
        }
        Self {
            transport,
            personas,
            store,
            adapter,
            services,
            chat_locks: ChatLocks::new(),
            active_model: RwLock::new(active),
            config,
            log_control,
        }
    }

    /// Snapshot of the active backend and model.
    pub fn active_model(&self) -> ActiveModel {
        self.active_model
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run until the transport closes or Ctrl-C is pressed.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let active = self.active_model();
        info!(
            "Chorus gateway running | transport: {} | personas: {} | model: {}/{}",
            self.transport.name(),
            self.personas.len(),
            active.backend,
            active.model
        );

        let mut rx = self
            .transport
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start {}: {e}", self.transport.name()))?;

        let purge_gw = self.clone();
        let purge_handle = tokio::spawn(async move {
            purge_gw.purge_loop().await;
        });

        loop {
            tokio::select! {
                inbound = rx.recv() => {
                    let Some(inbound) = inbound else {
                        info!("gateway: transport closed");
                        break;
                    };
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_message(inbound).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("gateway: shutdown signal received");
                    break;
                }
            }
        }

        purge_handle.abort();
        if let Err(e) = self.transport.stop().await {
            error!("gateway: failed to stop {}: {e}", self.transport.name());
        }
        info!("Chorus gateway stopped");
        Ok(())
    }

    async fn purge_loop(&self) {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match self.store.purge_expired_transcripts().await {
                Ok(0) => {}
                Ok(n) => info!("gateway: purged {n} expired transcripts"),
                Err(e) => warn!("gateway: transcript purge failed: {e}"),
            }

            match self.purge_old_history(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => info!("gateway: purged {n} history messages"),
                Err(e) => warn!("gateway: history purge failed: {e}"),
            }
        }
    }

    /// Drop history older than the retention window ending at `now`.
    pub(crate) async fn purge_old_history(&self, now: DateTime<Utc>) -> Result<u64, ChorusError> {
        let retention = history_retention(
            Duration::from_secs(self.config.memory.history_ttl_secs),
            &self.personas.snapshot(),
        );
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|keep| now.checked_sub_signed(keep));
        match cutoff {
            Some(cutoff) => self.store.purge_history_before(cutoff).await,
            None => Ok(0),
        }
    }
}

/// How long history is kept: the configured TTL, stretched to cover the
/// widest persona hour window.
pub(crate) fn history_retention(ttl: Duration, personas: &[PersonaConfig]) -> Duration {
    let widest = personas
        .iter()
        .map(|p| Duration::from_secs(u64::from(p.hours_limit) * 3600))
        .max()
        .unwrap_or(Duration::ZERO);
    ttl.max(widest)
}
