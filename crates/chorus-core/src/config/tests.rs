use super::*;
use std::collections::HashMap;

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.chorus.command_prefix, "-");
    assert_eq!(cfg.chorus.privileged_persona, "personal");
    assert_eq!(cfg.provider.default, Backend::Anthropic);
    assert_eq!(cfg.provider.retry_attempts, 5);
    assert_eq!(cfg.provider.openai.max_tokens, 1024);
    assert_eq!(cfg.provider.anthropic.max_tokens, 1250);
    assert_eq!(cfg.provider.completion_cap(Backend::OpenAi), 1024);
    assert_eq!(cfg.context.history_window, 300);
    assert_eq!(cfg.context.image_token_cost, 765);
    assert_eq!(cfg.memory.transcript_ttl_secs, 172_800);
    assert_eq!(cfg.memory.history_ttl_secs, 604_800);
    assert!(!cfg.features.image_creation_enabled);
    assert!(cfg.features.audio_creation_enabled);
    assert!((cfg.media.fakeyou.min_rating - 3.7).abs() < f64::EPSILON);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let toml_str = r#"
        [chorus]
        personal_number = "56911111111"

        [provider]
        default = "openai"

        [provider.openai]
        model = "gpt-4o"

        [channel.whatsapp]
        enabled = true
        group_names = { "120363@g.us" = "Familia" }
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.provider.default, Backend::OpenAi);
    assert_eq!(cfg.provider.openai.model, "gpt-4o");
    assert_eq!(cfg.provider.openai.image_model, "dall-e-3");
    assert_eq!(cfg.chorus.timezone, "America/Santiago");
    assert!(cfg.channel.whatsapp.enabled);
    assert_eq!(cfg.channel.whatsapp.group_name("120363@g.us"), "Familia");
}

#[test]
fn test_group_name_fallback() {
    let wa = WhatsAppConfig::default();
    assert_eq!(wa.group_name("999@g.us"), "999");
}

#[test]
fn test_env_overrides_fill_only_empty() {
    let mut cfg = Config::default();
    cfg.provider.openai.api_key = "from-file".into();
    let env: HashMap<&str, &str> = [
        ("OPENAI_API_KEY", "from-env"),
        ("CLAUDE_API_KEY", "claude-env"),
        ("ELEVEN_KEY", "eleven"),
        ("PERSONAL_NUMBER", "5690"),
    ]
    .into_iter()
    .collect();
    cfg.apply_env_with(|k| env.get(k).map(|v| v.to_string()));

    assert_eq!(cfg.provider.openai.api_key, "from-file");
    assert_eq!(cfg.provider.anthropic.api_key, "claude-env");
    assert_eq!(cfg.media.elevenlabs.api_key, "eleven");
    assert_eq!(cfg.chorus.personal_number, "5690");
    assert!(cfg.media.fakeyou.email.is_empty());
}

#[test]
fn test_privilege_rules() {
    let mut chorus = ChorusConfig::default();
    assert!(!chorus.is_privileged("5690", false));
    assert!(!chorus.is_super_user(""));
    assert!(chorus.may_administer("anyone"));

    chorus.personal_number = "5690".into();
    chorus.restricted_numbers = vec!["5691".into()];
    assert!(chorus.is_privileged("5690", false));
    assert!(!chorus.is_privileged("5690", true));
    assert!(chorus.is_super_user("5690"));
    assert!(chorus.may_administer("5690"));
    assert!(!chorus.may_administer("5691"));
    assert!(chorus.is_restricted("5691"));
}

#[test]
fn test_eleven_voice_lookup() {
    let mut eleven = ElevenLabsConfig::default();
    eleven.voices.insert("Jiro".into(), "abc".into());
    eleven.voices.insert("akara".into(), "def".into());
    assert_eq!(eleven.voice_id("jiro"), Some("abc"));
    assert_eq!(eleven.voice_names(), vec!["Jiro", "akara"]);
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__chorus_config__.toml").unwrap();
    assert_eq!(cfg.chorus.name, "Chorus");
}

#[test]
fn test_shellexpand() {
    assert_eq!(shellexpand("/abs/path"), "/abs/path");
    if let Some(home) = std::env::var_os("HOME") {
        assert_eq!(
            shellexpand("~/x"),
            format!("{}/x", home.to_string_lossy())
        );
    }
}
