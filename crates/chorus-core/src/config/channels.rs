use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// WhatsApp channel config.
///
/// Session data is stored at `{data_dir}/whatsapp_session/`.
/// Pairing is done by scanning a QR code (like WhatsApp Web).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Group JID → display name used when matching persona groups.
    #[serde(default)]
    pub group_names: HashMap<String, String>,
}

impl WhatsAppConfig {
    /// Display name for a group, falling back to the JID user part.
    pub fn group_name(&self, jid: &str) -> String {
        self.group_names
            .get(jid)
            .cloned()
            .unwrap_or_else(|| jid.split('@').next().unwrap_or(jid).to_string())
    }
}
