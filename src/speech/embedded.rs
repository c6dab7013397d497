use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{BackendKind, SpeechBackend, SpeechEvent, SpeechEventKind};
use super::locale::LocaleTag;
use crate::error::DictationError;
use crate::session::Generation;

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Results delivered by a continuous recognizer. Entries before
/// `result_index` were already reported and are skipped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionBatch {
    pub result_index: usize,
    pub results: Vec<RecognitionResult>,
}

impl RecognitionBatch {
    pub fn new(result_index: usize, results: Vec<RecognitionResult>) -> Self {
        Self {
            result_index,
            results,
        }
    }

    /// Fold the batch into at most one final and one partial event.
    pub fn into_events(self) -> Vec<SpeechEventKind> {
        let mut final_text = String::new();
        let mut interim_text = String::new();

        for result in self.results.into_iter().skip(self.result_index) {
            if result.is_final {
                final_text.push_str(&result.transcript);
            } else {
                interim_text.push_str(&result.transcript);
            }
        }

        let mut events = Vec::with_capacity(2);
        let has_final = !final_text.is_empty();
        if has_final {
            events.push(SpeechEventKind::Final(final_text));
        }
        if !interim_text.is_empty() || !has_final {
            events.push(SpeechEventKind::Partial(interim_text));
        }
        events
    }
}

/// Signal emitted by an in-process recognizer
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerSignal {
    Results(RecognitionBatch),
    /// Engine error code, e.g. "not-allowed", "network"
    Error(String),
    /// The recognizer stopped listening
    End,
}

/// In-process continuous recognizer with interim results
#[async_trait::async_trait]
pub trait Recognizer: Send {
    async fn start(&mut self, locale: &LocaleTag) -> Result<mpsc::Receiver<RecognizerSignal>, DictationError>;

    /// Stop listening; the recognizer should flush pending results and
    /// then signal `End`.
    async fn stop(&mut self);

    fn name(&self) -> &str;
}

/// Constructs a recognizer, failing when the capability is absent
pub type RecognizerFactory =
    Arc<dyn Fn() -> Result<Box<dyn Recognizer>, DictationError> + Send + Sync>;

/// Speech backend running a recognizer inside this process
pub struct EmbeddedEngine {
    recognizer: Box<dyn Recognizer>,
    event_buffer: usize,
    pump: Option<JoinHandle<()>>,
    capturing: bool,
}

impl EmbeddedEngine {
    pub fn new(recognizer: Box<dyn Recognizer>, event_buffer: usize) -> Self {
        Self {
            recognizer,
            event_buffer: event_buffer.max(1),
            pump: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl SpeechBackend for EmbeddedEngine {
    async fn start(
        &mut self,
        locale: LocaleTag,
        generation: Generation,
    ) -> Result<mpsc::Receiver<SpeechEvent>, DictationError> {
        if self.capturing {
            return Err(DictationError::TransientRecognition(
                "embedded recognizer is already capturing".to_string(),
            ));
        }

        info!(%generation, %locale, recognizer = self.recognizer.name(), "Starting embedded recognizer");

        let mut signals = self.recognizer.start(&locale).await?;
        let (tx, rx) = mpsc::channel(self.event_buffer);

        self.pump = Some(tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let kinds = match signal {
                    RecognizerSignal::Results(batch) => batch.into_events(),
                    RecognizerSignal::Error(code) => {
                        warn!(%generation, %code, "Embedded recognizer error");
                        vec![SpeechEventKind::Error(DictationError::classify(&code))]
                    }
                    RecognizerSignal::End => vec![SpeechEventKind::Ended],
                };

                let terminal = kinds
                    .iter()
                    .any(|k| matches!(k, SpeechEventKind::Error(_) | SpeechEventKind::Ended));

                for kind in kinds {
                    if tx.send(SpeechEvent::new(generation, kind)).await.is_err() {
                        return;
                    }
                }

                if terminal {
                    break;
                }
            }

            debug!(%generation, "Embedded recognizer stream closed");
        }));
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DictationError> {
        if !self.capturing {
            return Ok(());
        }

        info!(recognizer = self.recognizer.name(), "Stopping embedded recognizer");
        self.recognizer.stop().await;
        self.capturing = false;

        Ok(())
    }

    fn release(&mut self) {
        self.capturing = false;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn name(&self) -> &str {
        self.recognizer.name()
    }
}

impl Drop for EmbeddedEngine {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
