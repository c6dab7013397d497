use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::embedded::{EmbeddedEngine, RecognizerFactory};
use super::locale::LocaleTag;
use crate::bridge::{BridgeConfig, BridgeEngine, HookRegistry, HostBridge};
use crate::error::DictationError;
use crate::session::Generation;

/// Which backend variant produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Recognizer running inside this process
    Embedded,
    /// Capture delegated to the host platform process
    Bridge,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Embedded => write!(f, "embedded"),
            BackendKind::Bridge => write!(f, "bridge"),
        }
    }
}

/// Payload of a backend event
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEventKind {
    /// The backend confirmed capture has begun
    Started,
    /// Interim text, replaces the previous interim text
    Partial(String),
    /// Finalized text, appended to the transcript
    Final(String),
    /// Hard failure, ends the session without a transcript
    Error(DictationError),
    /// End of stream, nothing more will arrive for this generation
    Ended,
}

/// A backend event tagged with the generation it was issued for
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechEvent {
    pub generation: Generation,
    pub kind: SpeechEventKind,
}

impl SpeechEvent {
    pub fn new(generation: Generation, kind: SpeechEventKind) -> Self {
        Self { generation, kind }
    }

    pub fn partial(generation: Generation, text: impl Into<String>) -> Self {
        Self::new(generation, SpeechEventKind::Partial(text.into()))
    }

    pub fn final_text(generation: Generation, text: impl Into<String>) -> Self {
        Self::new(generation, SpeechEventKind::Final(text.into()))
    }

    pub fn error(generation: Generation, error: DictationError) -> Self {
        Self::new(generation, SpeechEventKind::Error(error))
    }
}

/// Speech recognition backend trait
///
/// Implementations:
/// - Embedded: in-process continuous recognizer
/// - Bridge: host platform capture reached by message passing
#[async_trait::async_trait]
pub trait SpeechBackend: Send {
    /// Start capturing speech
    ///
    /// Returns a channel receiver yielding events tagged with `generation`
    async fn start(
        &mut self,
        locale: LocaleTag,
        generation: Generation,
    ) -> Result<mpsc::Receiver<SpeechEvent>, DictationError>;

    /// Ask the backend to stop. Graceful: one more final event may still
    /// arrive for the same generation.
    async fn stop(&mut self) -> Result<(), DictationError>;

    /// Tear down everything the backend registered. No event is delivered
    /// after this returns.
    fn release(&mut self);

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    fn kind(&self) -> BackendKind;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Builds a fresh backend for every capture session
pub trait BackendFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn SpeechBackend>, DictationError>;
}

/// Feature-detecting backend factory
///
/// Prefers the host bridge when one is attached and reachable, otherwise
/// falls back to the in-process recognizer.
pub struct PlatformBackendFactory {
    bridge: Option<BridgeSetup>,
    recognizer: Option<RecognizerFactory>,
    event_buffer: usize,
}

struct BridgeSetup {
    transport: Arc<dyn HostBridge>,
    hooks: Arc<HookRegistry>,
    config: BridgeConfig,
}

impl Default for PlatformBackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBackendFactory {
    pub fn new() -> Self {
        Self {
            bridge: None,
            recognizer: None,
            event_buffer: 64,
        }
    }

    pub fn with_bridge(
        mut self,
        transport: Arc<dyn HostBridge>,
        hooks: Arc<HookRegistry>,
        config: BridgeConfig,
    ) -> Self {
        self.bridge = Some(BridgeSetup {
            transport,
            hooks,
            config,
        });
        self
    }

    pub fn with_recognizer(mut self, recognizer: RecognizerFactory) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }
}

impl BackendFactory for PlatformBackendFactory {
    fn create(&self) -> Result<Box<dyn SpeechBackend>, DictationError> {
        if let Some(bridge) = &self.bridge {
            if bridge.transport.is_available() {
                info!("Using host bridge speech backend");
                return Ok(Box::new(BridgeEngine::new(
                    Arc::clone(&bridge.transport),
                    Arc::clone(&bridge.hooks),
                    bridge.config.clone(),
                )));
            }
            debug!("Host bridge attached but not available, trying embedded recognizer");
        }

        if let Some(recognizer) = &self.recognizer {
            let recognizer = recognizer()?;
            info!("Using embedded speech backend ({})", recognizer.name());
            return Ok(Box::new(EmbeddedEngine::new(recognizer, self.event_buffer)));
        }

        Err(DictationError::BackendUnavailable(
            "no speech recognition capability on this platform".to_string(),
        ))
    }
}
