pub mod bridge;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod session;
pub mod speech;

pub use bridge::{BridgeEngine, HookRegistry, HostBridge, NatsHostBridge};
pub use config::Config;
pub use environment::{
    BackendResolver, EnvironmentPreference, HttpProbe, ReachabilityProbe, ResolutionStatus,
    ResolvedEnvironment,
};
pub use error::DictationError;
pub use http::{create_router, AppState};
pub use session::{
    DictationController, DictationHandle, FinishedTranscript, Generation, SessionConfig,
    SessionNotice, SessionStatus, StaleGuard, TranscriptSession, TranscriptSnapshot,
};
pub use speech::{
    BackendFactory, BackendKind, EmbeddedEngine, Language, PlatformBackendFactory,
    ScriptedRecognizer, SpeechBackend, SpeechEvent, SpeechEventKind,
};
