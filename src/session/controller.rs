use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::snapshot::{FinishedTranscript, SessionNotice, TranscriptSnapshot};
use super::stale::Generation;
use super::transcript::{EventOutcome, SessionStatus, TranscriptSession};
use crate::error::DictationError;
use crate::speech::{BackendFactory, BackendKind, Language, SpeechBackend, SpeechEvent};

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started {
        generation: Generation,
        backend: BackendKind,
    },
    /// A session is already Listening or Finalizing; nothing changed
    AlreadyActive { status: SessionStatus },
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Finalizing { generation: Generation },
    /// Not Listening; nothing changed
    NotListening { status: SessionStatus },
}

enum Input {
    Start {
        language: Option<Language>,
        reply: oneshot::Sender<Result<StartOutcome, DictationError>>,
    },
    Stop {
        reply: oneshot::Sender<StopOutcome>,
    },
    Speech(SpeechEvent),
    GraceElapsed(Generation),
    Shutdown,
}

/// Cloneable handle to a running dictation controller
#[derive(Clone)]
pub struct DictationHandle {
    inbox: mpsc::Sender<Input>,
    snapshots: watch::Receiver<TranscriptSnapshot>,
}

impl DictationHandle {
    /// Start a capture session. `None` uses the configured language.
    ///
    /// Fails when no backend could be constructed or started; the session
    /// stays Idle in that case.
    pub async fn start(&self, language: Option<Language>) -> Result<StartOutcome, DictationError> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(Input::Start { language, reply })
            .await
            .map_err(|_| DictationError::SessionClosed)?;
        rx.await.map_err(|_| DictationError::SessionClosed)?
    }

    /// Request a graceful stop. The transcript is delivered once the grace
    /// window has elapsed.
    pub async fn stop(&self) -> Result<StopOutcome, DictationError> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(Input::Stop { reply })
            .await
            .map_err(|_| DictationError::SessionClosed)?;
        rx.await.map_err(|_| DictationError::SessionClosed)
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.snapshots.clone()
    }

    pub async fn shutdown(&self) {
        let _ = self.inbox.send(Input::Shutdown).await;
    }
}

/// Owns the transcript session and its active backend.
///
/// All inputs (caller commands, backend events, grace timers) go through
/// one queue and are applied in arrival order by a single task.
pub struct DictationController {
    session: TranscriptSession,
    factory: Arc<dyn BackendFactory>,
    backend: Option<Box<dyn SpeechBackend>>,
    config: SessionConfig,
    language: Language,
    inbox: mpsc::WeakSender<Input>,
    notices: mpsc::UnboundedSender<SessionNotice>,
    snapshots: watch::Sender<TranscriptSnapshot>,
}

impl DictationController {
    /// Spawn the controller task.
    ///
    /// Returns the command handle and the receiver of session outcomes.
    pub fn spawn(
        factory: Arc<dyn BackendFactory>,
        config: SessionConfig,
    ) -> (DictationHandle, mpsc::UnboundedReceiver<SessionNotice>) {
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let session = TranscriptSession::new();
        let (snapshots_tx, snapshots_rx) = watch::channel(session.snapshot());

        let controller = Self {
            session,
            factory,
            backend: None,
            language: config.language,
            config,
            inbox: inbox_tx.downgrade(),
            notices: notices_tx,
            snapshots: snapshots_tx,
        };

        tokio::spawn(controller.run(inbox_rx));

        let handle = DictationHandle {
            inbox: inbox_tx,
            snapshots: snapshots_rx,
        };
        (handle, notices_rx)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Input>) {
        info!("Dictation controller started");

        while let Some(input) = inbox.recv().await {
            match input {
                Input::Start { language, reply } => {
                    let outcome = self.handle_start(language).await;
                    let _ = reply.send(outcome);
                }
                Input::Stop { reply } => {
                    let outcome = self.handle_stop().await;
                    let _ = reply.send(outcome);
                }
                Input::Speech(event) => self.handle_event(event),
                Input::GraceElapsed(generation) => self.handle_grace_elapsed(generation),
                Input::Shutdown => break,
            }
        }

        self.release_backend();
        info!("Dictation controller stopped");
    }

    async fn handle_start(&mut self, language: Option<Language>) -> Result<StartOutcome, DictationError> {
        let Some(generation) = self.session.begin() else {
            debug!(status = %self.session.status(), "Start ignored, session already active");
            return Ok(StartOutcome::AlreadyActive {
                status: self.session.status(),
            });
        };
        self.publish();

        let language = language.unwrap_or(self.config.language);

        let mut backend = match self.factory.create() {
            Ok(backend) => backend,
            Err(e) => {
                warn!(%generation, error = %e, "No speech backend available");
                return Err(e);
            }
        };

        let events = match backend.start(language.locale(), generation).await {
            Ok(events) => events,
            Err(e) => {
                warn!(%generation, backend = backend.name(), error = %e, "Speech backend failed to start");
                backend.release();
                return Err(e);
            }
        };

        let kind = backend.kind();
        self.session.listening(kind);
        self.language = language;
        self.spawn_forwarder(events);
        self.backend = Some(backend);
        self.publish();

        info!(%generation, backend = %kind, %language, "Dictation session listening");

        Ok(StartOutcome::Started {
            generation,
            backend: kind,
        })
    }

    async fn handle_stop(&mut self) -> StopOutcome {
        if !self.session.begin_finalizing() {
            debug!(status = %self.session.status(), "Stop ignored, session not listening");
            return StopOutcome::NotListening {
                status: self.session.status(),
            };
        }

        let generation = self.session.generation();
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.stop().await {
                warn!(%generation, error = %e, "Speech backend did not stop cleanly");
            }
        }
        self.publish();
        self.schedule_grace_window(generation);

        info!(
            %generation,
            grace_ms = self.config.grace_window.as_millis() as u64,
            "Dictation session finalizing"
        );

        StopOutcome::Finalizing { generation }
    }

    fn handle_event(&mut self, event: SpeechEvent) {
        match self.session.apply(&event) {
            EventOutcome::Applied | EventOutcome::Stale => self.publish(),
            EventOutcome::Ignored => {
                debug!(generation = %event.generation, status = %self.session.status(), "Speech event ignored");
            }
            EventOutcome::EndOfStream => {
                debug!(generation = %event.generation, "Speech backend ended");
                self.finalize();
            }
            EventOutcome::Failed(error) => self.fail(error),
        }
    }

    fn handle_grace_elapsed(&mut self, generation: Generation) {
        if generation != self.session.generation() || self.session.status() != SessionStatus::Finalizing {
            return;
        }
        self.finalize();
    }

    fn finalize(&mut self) {
        let generation = self.session.generation();
        let backend = self.session.active_backend();
        let text = self.session.finish();
        self.release_backend();
        self.publish();

        match text {
            Some(text) => {
                info!(%generation, chars = text.chars().count(), "Dictation session finished");
                let finished = FinishedTranscript::new(generation, text, backend, self.language);
                self.notify(SessionNotice::Finished(finished));
            }
            None => {
                info!(%generation, "Dictation session finished with no text");
            }
        }
    }

    fn fail(&mut self, error: DictationError) {
        let generation = self.session.generation();
        error!(%generation, error = %error, "Dictation session failed");

        self.session.abort();
        self.release_backend();
        self.publish();
        self.notify(SessionNotice::Failed { generation, error });
    }

    fn release_backend(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.release();
            debug!(backend = backend.name(), "Speech backend released");
        }
    }

    fn spawn_forwarder(&self, mut events: mpsc::Receiver<SpeechEvent>) {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inbox) = inbox.upgrade() else { break };
                if inbox.send(Input::Speech(event)).await.is_err() {
                    break;
                }
            }
        });
    }

    fn schedule_grace_window(&self, generation: Generation) {
        let inbox = self.inbox.clone();
        let grace = self.config.grace_window;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(Input::GraceElapsed(generation)).await;
            }
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }

    fn notify(&self, notice: SessionNotice) {
        if self.notices.send(notice).is_err() {
            debug!("Session notice receiver dropped");
        }
    }
}
