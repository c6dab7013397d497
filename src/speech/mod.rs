pub mod backend;
pub mod embedded;
pub mod locale;
pub mod scripted;

pub use backend::{
    BackendFactory, BackendKind, PlatformBackendFactory, SpeechBackend, SpeechEvent,
    SpeechEventKind,
};
pub use embedded::{
    EmbeddedEngine, RecognitionBatch, RecognitionResult, Recognizer, RecognizerFactory,
    RecognizerSignal,
};
pub use locale::{Language, LocaleTag};
pub use scripted::{ScriptedRecognizer, DEFAULT_SCRIPT};
