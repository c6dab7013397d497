// Scripted recognizer: "speaks" a fixed sentence one character at a time.
//
// Used where no real recognizer is installed, so the whole dictation flow can
// be exercised end to end.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::embedded::{RecognitionBatch, RecognitionResult, Recognizer, RecognizerSignal};
use super::locale::LocaleTag;
use crate::error::DictationError;

pub const DEFAULT_SCRIPT: &str = "Hello this is a test of the smart words input method";

pub struct ScriptedRecognizer {
    script: String,
    char_interval: Duration,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl ScriptedRecognizer {
    pub fn new(script: impl Into<String>, char_interval: Duration) -> Self {
        Self {
            script: script.into(),
            char_interval,
            stop_tx: None,
            task: None,
        }
    }
}

impl Default for ScriptedRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT, Duration::from_millis(50))
    }
}

#[async_trait::async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn start(&mut self, locale: &LocaleTag) -> Result<mpsc::Receiver<RecognizerSignal>, DictationError> {
        if self.task.is_some() {
            return Err(DictationError::TransientRecognition(
                "scripted recognizer already running".to_string(),
            ));
        }

        debug!(%locale, chars = self.script.chars().count(), "Scripted recognizer started");

        let (tx, rx) = mpsc::channel(16);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let script: Vec<char> = self.script.chars().collect();
        let interval = self.char_interval;

        self.task = Some(tokio::spawn(async move {
            let mut typed = String::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            for ch in script {
                tokio::select! {
                    _ = ticker.tick() => {
                        typed.push(ch);
                        let batch = RecognitionBatch::new(0, vec![RecognitionResult::interim(typed.clone())]);
                        if tx.send(RecognizerSignal::Results(batch)).await.is_err() {
                            return;
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            if !typed.is_empty() {
                let batch = RecognitionBatch::new(0, vec![RecognitionResult::finalized(typed)]);
                let _ = tx.send(RecognizerSignal::Results(batch)).await;
            }
            let _ = tx.send(RecognizerSignal::End).await;
        }));
        self.stop_tx = Some(stop_tx);

        Ok(rx)
    }

    async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        // The task flushes and ends on its own
        self.task = None;
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl Drop for ScriptedRecognizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
