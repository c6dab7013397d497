// Tests for configuration loading
//
// Config files are written to a temporary directory; every section is
// optional and falls back to its defaults.

use anyhow::Result;
use std::time::Duration;
use tempfile::TempDir;
use voiceflow::config::{Config, RecognizerChoice};
use voiceflow::environment::{EnvironmentKind, EnvironmentPreference};
use voiceflow::speech::{Language, DEFAULT_SCRIPT};

#[test]
fn test_defaults_without_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("missing");
    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.service.http.bind, "127.0.0.1");
    assert_eq!(cfg.service.http.port, 8765);
    assert_eq!(cfg.dictation.language, Language::Mixed);
    assert_eq!(cfg.dictation.grace_window(), Duration::from_millis(500));
    assert!(!cfg.dictation.auto_start);
    assert!(!cfg.bridge.enabled);
    assert_eq!(cfg.bridge.request_subject, "speech.bridge.request");
    assert_eq!(cfg.bridge.callback_subject, "speech.bridge.callback");
    assert_eq!(cfg.bridge.start_delay(), Duration::ZERO);
    assert_eq!(cfg.bridge.confirm_timeout(), Duration::from_millis(3000));
    assert_eq!(cfg.embedded.recognizer, RecognizerChoice::Scripted);
    assert_eq!(cfg.embedded.script, DEFAULT_SCRIPT);
    assert_eq!(cfg.embedded.char_interval(), Duration::from_millis(50));
    assert_eq!(cfg.environment.preference, EnvironmentPreference::Auto);
    assert_eq!(cfg.environment.dev_endpoint, "http://localhost:5173");
    assert_eq!(cfg.environment.probe_timeout(), Duration::from_millis(1000));

    Ok(())
}

#[test]
fn test_partial_file_overrides_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("voiceflow.toml");
    std::fs::write(
        &path,
        r#"
[dictation]
language = "en"
grace_window_ms = 250

[bridge]
enabled = true
start_delay_ms = 1500

[embedded]
recognizer = "none"

[environment]
preference = "prod"
prod_endpoint = "https://app.example.com"
"#,
    )?;

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.dictation.language, Language::En);
    assert_eq!(cfg.dictation.event_buffer, 64, "Unset keys keep their defaults");
    assert!(cfg.bridge.enabled);
    assert_eq!(cfg.bridge.start_delay(), Duration::from_millis(1500));
    assert_eq!(cfg.bridge.nats_url, "nats://localhost:4222");
    assert_eq!(cfg.embedded.recognizer, RecognizerChoice::None);
    assert_eq!(cfg.environment.preference, EnvironmentPreference::Prod);

    let session = cfg.dictation.session_config();
    assert_eq!(session.language, Language::En);
    assert_eq!(session.grace_window, Duration::from_millis(250));

    let engine = cfg.bridge.engine_config(cfg.dictation.event_buffer);
    assert_eq!(engine.start_delay, Duration::from_millis(1500));
    assert_eq!(engine.event_buffer, 64);

    let prod = cfg.environment.prod_candidate();
    assert_eq!(prod.kind, EnvironmentKind::Prod);
    assert_eq!(prod.endpoint_url, "https://app.example.com");

    Ok(())
}

#[test]
fn test_invalid_value_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[dictation]\nlanguage = \"fr\"\n")?;

    assert!(Config::load(path.to_str().unwrap()).is_err());

    Ok(())
}
