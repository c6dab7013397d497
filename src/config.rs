use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::bridge::BridgeConfig as BridgeEngineConfig;
use crate::environment::{BackendCandidate, EnvironmentKind, EnvironmentPreference};
use crate::session::SessionConfig;
use crate::speech::{Language, DEFAULT_SCRIPT};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub dictation: DictationConfig,
    pub bridge: BridgeConfig,
    pub embedded: EmbeddedConfig,
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voiceflow".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    pub language: Language,
    /// Wait after stop before the transcript is delivered
    pub grace_window_ms: u64,
    /// Start one session as soon as `serve` is up
    pub auto_start: bool,
    /// Capacity of each backend's event channel
    pub event_buffer: usize,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            language: Language::Mixed,
            grace_window_ms: 500,
            auto_start: false,
            event_buffer: 64,
        }
    }
}

impl DictationConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            language: self.language,
            grace_window: self.grace_window(),
            ..SessionConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub nats_url: String,
    pub request_subject: String,
    pub callback_subject: String,
    /// Delay before the start request is posted to the host
    pub start_delay_ms: u64,
    /// Deadline for the host's start confirmation
    pub confirm_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nats_url: "nats://localhost:4222".to_string(),
            request_subject: "speech.bridge.request".to_string(),
            callback_subject: "speech.bridge.callback".to_string(),
            start_delay_ms: 0,
            confirm_timeout_ms: 3000,
        }
    }
}

impl BridgeConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn engine_config(&self, event_buffer: usize) -> BridgeEngineConfig {
        BridgeEngineConfig {
            start_delay: self.start_delay(),
            confirm_timeout: self.confirm_timeout(),
            event_buffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerChoice {
    #[default]
    Scripted,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub recognizer: RecognizerChoice,
    pub script: String,
    pub char_interval_ms: u64,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerChoice::Scripted,
            script: DEFAULT_SCRIPT.to_string(),
            char_interval_ms: 50,
        }
    }
}

impl EmbeddedConfig {
    pub fn char_interval(&self) -> Duration {
        Duration::from_millis(self.char_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub preference: EnvironmentPreference,
    pub dev_endpoint: String,
    pub prod_endpoint: String,
    pub probe_timeout_ms: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            preference: EnvironmentPreference::Auto,
            dev_endpoint: "http://localhost:5173".to_string(),
            prod_endpoint: "bundle://index.html".to_string(),
            probe_timeout_ms: 1000,
        }
    }
}

impl EnvironmentConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn dev_candidate(&self) -> BackendCandidate {
        BackendCandidate {
            endpoint_url: self.dev_endpoint.clone(),
            kind: EnvironmentKind::Dev,
            probe_timeout: self.probe_timeout(),
        }
    }

    pub fn prod_candidate(&self) -> BackendCandidate {
        BackendCandidate {
            endpoint_url: self.prod_endpoint.clone(),
            kind: EnvironmentKind::Prod,
            probe_timeout: self.probe_timeout(),
        }
    }
}

impl Config {
    /// Load from `path` (extension optional) layered with `VOICEFLOW__*`
    /// environment variables. A missing file yields the defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICEFLOW").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Invalid config in {}", path))
    }
}
