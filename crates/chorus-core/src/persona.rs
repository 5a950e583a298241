//! Persona configurations and the registry that picks one for a message.

use std::sync::{Arc, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::message::{Chat, InboundMessage};

/// A named behavior profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    /// Free-form persona instructions.
    #[serde(default)]
    pub prompt_text: String,
    /// Wrap `prompt_text` in the templated system prompt.
    #[serde(default = "default_true")]
    pub build_prompt: bool,
    /// `*`, `-`, or a `|`-delimited list of group names.
    #[serde(default = "default_groups")]
    pub groups: String,
    #[serde(default)]
    pub prefix: String,
    /// Max history messages considered.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_hours_limit")]
    pub hours_limit: u32,
    #[serde(default = "default_max_images")]
    pub max_images: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_character_limit")]
    pub character_limit: u32,
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Prepended to the newest context item before sending.
    #[serde(default)]
    pub pre_message: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_groups() -> String {
    "-".to_string()
}
fn default_limit() -> u32 {
    30
}
fn default_hours_limit() -> u32 {
    24
}
fn default_max_images() -> u32 {
    2
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_character_limit() -> u32 {
    500
}

/// Which chats a persona listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupScope {
    /// `*`: catch-all for unclaimed chats.
    Wildcard,
    /// `-`: invocable anywhere by prefix.
    Anywhere,
    Groups(Vec<String>),
}

impl GroupScope {
    pub fn parse(groups: &str) -> Self {
        match groups.trim() {
            "*" => Self::Wildcard,
            "-" => Self::Anywhere,
            list => Self::Groups(
                list.split('|')
                    .map(|g| g.trim().to_string())
                    .filter(|g| !g.is_empty())
                    .collect(),
            ),
        }
    }

    fn contains(&self, group_name: &str) -> bool {
        match self {
            Self::Groups(names) => names.iter().any(|n| n == group_name),
            _ => false,
        }
    }
}

impl PersonaConfig {
    pub fn scope(&self) -> GroupScope {
        GroupScope::parse(&self.groups)
    }

    pub fn is_wildcard(&self) -> bool {
        self.scope() == GroupScope::Wildcard
    }
}

/// Whole-word, case-insensitive prefix check.
///
/// Matches at the start or after whitespace, terminated by end of text,
/// `!?.`, whitespace, or a comma followed by whitespace.
pub fn includes_prefix(body: &str, prefix: &str) -> bool {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return false;
    }
    let pattern = format!(r"(?i)(^|\s){}($|[!?.]|\s|,\s)", regex::escape(prefix));
    Regex::new(&pattern)
        .map(|re| re.is_match(body))
        .unwrap_or(false)
}

/// Ordered persona list, replaced wholesale on reload.
pub struct PersonaRegistry {
    personas: RwLock<Arc<Vec<PersonaConfig>>>,
    privileged_name: String,
}

impl PersonaRegistry {
    pub fn new(personas: Vec<PersonaConfig>, privileged_name: impl Into<String>) -> Self {
        let registry = Self {
            personas: RwLock::new(Arc::new(Vec::new())),
            privileged_name: privileged_name.into(),
        };
        registry.replace(personas);
        registry
    }

    /// Swap in a new list. Wildcard personas are moved to the end.
    pub fn replace(&self, mut personas: Vec<PersonaConfig>) {
        // Stable sort keeps the store order among non-wildcards.
        personas.sort_by_key(PersonaConfig::is_wildcard);
        let mut guard = self.personas.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(personas);
    }

    /// Current list snapshot.
    pub fn snapshot(&self) -> Arc<Vec<PersonaConfig>> {
        self.personas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn get(&self, name: &str) -> Option<PersonaConfig> {
        self.snapshot()
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Pick the persona that should answer, if any. First match wins.
    pub fn resolve(
        &self,
        message: &InboundMessage,
        chat: &Chat,
        privileged_sender: bool,
    ) -> Option<PersonaConfig> {
        let personas = self.snapshot();

        if privileged_sender {
            if let Some(p) = personas.iter().find(|p| p.name == self.privileged_name) {
                return Some(p.clone());
            }
        }

        let replied_to_bot = message.replies_to_bot();
        personas
            .iter()
            .find(|persona| {
                let scope = persona.scope();
                let group_match = chat.is_group && scope.contains(&chat.name);
                let prefix_match = includes_prefix(&message.body, &persona.prefix);

                if group_match && (prefix_match || replied_to_bot) {
                    return true;
                }
                match scope {
                    GroupScope::Anywhere => prefix_match,
                    GroupScope::Wildcard => prefix_match || replied_to_bot || !chat.is_group,
                    GroupScope::Groups(_) => false,
                }
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use chrono::Utc;

    fn persona(name: &str, groups: &str, prefix: &str) -> PersonaConfig {
        PersonaConfig {
            name: name.into(),
            prompt_text: String::new(),
            build_prompt: true,
            groups: groups.into(),
            prefix: prefix.into(),
            limit: 30,
            hours_limit: 24,
            max_images: 2,
            max_tokens: 2000,
            character_limit: 500,
            voice_id: None,
            pre_message: None,
        }
    }

    fn message(body: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".into(),
            chat_id: "chat".into(),
            sender_id: "56911111111".into(),
            sender_name: Some("Ana".into()),
            body: body.into(),
            kind: MessageKind::Text,
            from_me: false,
            timestamp: Utc::now(),
            quoted_id: None,
            quoted_from_me: false,
        }
    }

    fn private_chat() -> Chat {
        Chat {
            id: "56911111111@s.whatsapp.net".into(),
            name: "Ana".into(),
            is_group: false,
        }
    }

    fn group_chat(name: &str) -> Chat {
        Chat {
            id: "120363@g.us".into(),
            name: name.into(),
            is_group: true,
        }
    }

    fn resolved_name(reg: &PersonaRegistry, msg: &InboundMessage, chat: &Chat) -> Option<String> {
        reg.resolve(msg, chat, false).map(|p| p.name)
    }

    #[test]
    fn test_prefix_whole_word() {
        assert!(includes_prefix("hey bel how are you", "bel"));
        assert!(includes_prefix("Bel!", "bel"));
        assert!(includes_prefix("bel, que tal", "bel"));
        assert!(includes_prefix("hola bel", "bel"));
        assert!(!includes_prefix("belinda is here", "bel"));
        assert!(!includes_prefix("isabel", "bel"));
        assert!(!includes_prefix("anything", ""));
    }

    #[test]
    fn test_prefix_is_escaped() {
        assert!(includes_prefix("hey c++ fix this", "c++"));
        assert!(!includes_prefix("hey cxx", "c.."));
    }

    #[test]
    fn test_wildcard_only_private_chat_any_text() {
        let reg = PersonaRegistry::new(vec![persona("bel", "*", "bel")], "personal");
        assert_eq!(
            resolved_name(&reg, &message("bel hola"), &private_chat()).as_deref(),
            Some("bel")
        );
        assert_eq!(
            resolved_name(&reg, &message("hola"), &private_chat()).as_deref(),
            Some("bel")
        );
        assert_eq!(resolved_name(&reg, &message("hola"), &group_chat("amigos")), None);
    }

    #[test]
    fn test_wildcard_in_group_needs_prefix_or_reply() {
        let reg = PersonaRegistry::new(vec![persona("bel", "*", "bel")], "personal");
        let chat = group_chat("amigos");
        assert!(reg.resolve(&message("bel hola"), &chat, false).is_some());

        let mut reply = message("y eso?");
        reply.quoted_id = Some("q".into());
        reply.quoted_from_me = true;
        assert!(reg.resolve(&reply, &chat, false).is_some());
    }

    #[test]
    fn test_group_persona_beats_wildcard() {
        let reg = PersonaRegistry::new(
            vec![persona("generic", "*", "bot"), persona("family", "Familia|Primos", "bot")],
            "personal",
        );
        // Wildcard is sorted last even though it was listed first.
        assert_eq!(reg.snapshot()[1].name, "generic");
        assert_eq!(
            resolved_name(&reg, &message("bot hola"), &group_chat("Primos")).as_deref(),
            Some("family")
        );
        assert_eq!(
            resolved_name(&reg, &message("bot hola"), &group_chat("Trabajo")).as_deref(),
            Some("generic")
        );
    }

    #[test]
    fn test_group_persona_needs_invocation() {
        let reg = PersonaRegistry::new(vec![persona("family", "Familia", "tio")], "personal");
        assert_eq!(resolved_name(&reg, &message("hola"), &group_chat("Familia")), None);
        assert_eq!(resolved_name(&reg, &message("tio hola"), &private_chat()), None);
    }

    #[test]
    fn test_anywhere_persona_by_prefix() {
        let reg = PersonaRegistry::new(vec![persona("chef", "-", "chef")], "personal");
        assert!(reg.resolve(&message("chef receta"), &private_chat(), false).is_some());
        assert!(reg.resolve(&message("chef receta"), &group_chat("x"), false).is_some());
        assert!(reg.resolve(&message("receta"), &private_chat(), false).is_none());
    }

    #[test]
    fn test_privileged_short_circuit() {
        let reg = PersonaRegistry::new(
            vec![persona("bel", "*", "bel"), persona("personal", "-", "zz")],
            "personal",
        );
        let p = reg.resolve(&message("bel hola"), &private_chat(), true);
        assert_eq!(p.map(|p| p.name).as_deref(), Some("personal"));
    }

    #[test]
    fn test_privileged_without_persona_falls_through() {
        let reg = PersonaRegistry::new(vec![persona("bel", "*", "bel")], "personal");
        let p = reg.resolve(&message("hola"), &private_chat(), true);
        assert_eq!(p.map(|p| p.name).as_deref(), Some("bel"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let reg = PersonaRegistry::new(
            vec![persona("a", "-", "a"), persona("b", "*", "b")],
            "personal",
        );
        let msg = message("a b c");
        let chat = group_chat("g");
        assert_eq!(
            reg.resolve(&msg, &chat, false),
            reg.resolve(&msg, &chat, false)
        );
    }

    #[test]
    fn test_replace_swaps_list() {
        let reg = PersonaRegistry::new(vec![persona("a", "*", "a")], "personal");
        let before = reg.snapshot();
        reg.replace(vec![persona("b", "-", "b"), persona("c", "-", "c")]);
        assert_eq!(before.len(), 1);
        assert_eq!(reg.len(), 2);
        assert!(reg.get("B").is_some());
    }

    #[test]
    fn test_persona_toml_defaults() {
        let p: PersonaConfig = toml::from_str("name = \"x\"\nprefix = \"x\"").unwrap();
        assert_eq!(p.groups, "-");
        assert!(p.build_prompt);
        assert_eq!(p.limit, 30);
        assert!(p.voice_id.is_none());
    }
}
