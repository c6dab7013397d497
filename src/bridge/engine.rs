use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::hooks::{HookEvent, HookRegistry, HookSubscription};
use super::messages::{BridgeCallback, BridgeRequest};
use crate::error::DictationError;
use crate::session::Generation;
use crate::speech::{BackendKind, LocaleTag, SpeechBackend, SpeechEvent, SpeechEventKind};

/// Message transport to the host platform process
#[async_trait::async_trait]
pub trait HostBridge: Send + Sync {
    /// Fire-and-forget delivery of a request to the host
    async fn post(&self, request: BridgeRequest) -> anyhow::Result<()>;

    /// Whether a host process is attached and accepting requests
    fn is_available(&self) -> bool;

    fn name(&self) -> &str;
}

/// Timing knobs for the host bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Wait before sending the start request, for hosts that need time to
    /// come to the foreground
    pub start_delay: Duration,
    /// How long to wait for `onStarted` before failing the session
    pub confirm_timeout: Duration,
    /// Capacity of the per-session event channel
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::ZERO,
            confirm_timeout: Duration::from_millis(3000),
            event_buffer: 64,
        }
    }
}

/// Speech backend that delegates capture to the host platform.
///
/// Results come back through the process-wide [`HookRegistry`]; the engine
/// holds the registration from `start` until `release`.
pub struct BridgeEngine {
    transport: Arc<dyn HostBridge>,
    hooks: Arc<HookRegistry>,
    config: BridgeConfig,
    subscription: Option<HookSubscription>,
    pump: Option<JoinHandle<()>>,
    capturing: bool,
}

impl BridgeEngine {
    pub fn new(transport: Arc<dyn HostBridge>, hooks: Arc<HookRegistry>, config: BridgeConfig) -> Self {
        Self {
            transport,
            hooks,
            config,
            subscription: None,
            pump: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl SpeechBackend for BridgeEngine {
    async fn start(
        &mut self,
        locale: LocaleTag,
        generation: Generation,
    ) -> Result<mpsc::Receiver<SpeechEvent>, DictationError> {
        if self.capturing {
            return Err(DictationError::TransientRecognition(
                "host bridge is already capturing".to_string(),
            ));
        }

        let (subscription, callbacks) = self.hooks.acquire()?;
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));

        let pump = CallbackPump {
            generation,
            locale,
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            events: tx,
        };

        info!(
            %generation,
            host = self.transport.name(),
            token = subscription.token(),
            "Starting host bridge capture"
        );

        self.pump = Some(tokio::spawn(pump.run(callbacks)));
        self.subscription = Some(subscription);
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DictationError> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(subscription) = &self.subscription {
            subscription.request_stop();
        }
        self.capturing = false;

        info!(host = self.transport.name(), "Stopping host bridge capture");

        self.transport
            .post(BridgeRequest::Stop)
            .await
            .map_err(|e| DictationError::TransientRecognition(format!("failed to send stop request: {}", e)))
    }

    fn release(&mut self) {
        self.capturing = false;

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if self.subscription.take().is_some() {
            debug!("Host bridge hooks released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Bridge
    }

    fn name(&self) -> &str {
        "host bridge"
    }
}

impl Drop for BridgeEngine {
    fn drop(&mut self) {
        self.release();
    }
}

/// Turns host callbacks into generation-tagged speech events
struct CallbackPump {
    generation: Generation,
    locale: LocaleTag,
    transport: Arc<dyn HostBridge>,
    config: BridgeConfig,
    events: mpsc::Sender<SpeechEvent>,
}

impl CallbackPump {
    async fn run(self, mut inbox: mpsc::UnboundedReceiver<HookEvent>) {
        let delay = tokio::time::sleep(self.config.start_delay);
        tokio::pin!(delay);

        // Anything queued before the start request belongs to an earlier capture.
        loop {
            tokio::select! {
                biased;
                event = inbox.recv() => match event {
                    Some(HookEvent::Callback(callback)) => {
                        debug!(generation = %self.generation, ?callback, "Dropping callback from before start request");
                    }
                    Some(HookEvent::StopRequested) | None => {
                        debug!(generation = %self.generation, "Stopped before start request was sent");
                        return;
                    }
                },
                _ = &mut delay => break,
            }
        }

        let request = BridgeRequest::Start {
            language: self.locale.to_string(),
        };
        if let Err(e) = self.transport.post(request).await {
            let error = DictationError::BackendUnavailable(format!("failed to send start request: {}", e));
            self.emit(SpeechEventKind::Error(error)).await;
            return;
        }

        let deadline = tokio::time::sleep(self.config.confirm_timeout);
        tokio::pin!(deadline);
        let mut confirmed = false;
        let mut stopped = false;

        loop {
            tokio::select! {
                event = inbox.recv() => match event {
                    Some(HookEvent::Callback(callback)) => {
                        if !self.handle(callback, &mut confirmed, stopped).await {
                            break;
                        }
                    }
                    Some(HookEvent::StopRequested) => stopped = true,
                    None => break,
                },
                _ = &mut deadline, if !confirmed => {
                    if stopped {
                        debug!(generation = %self.generation, "No start confirmation before stop");
                        break;
                    }
                    warn!(
                        generation = %self.generation,
                        timeout_ms = self.config.confirm_timeout.as_millis() as u64,
                        "Host bridge never confirmed start"
                    );
                    self.emit(SpeechEventKind::Error(DictationError::StartTimeout(
                        self.config.confirm_timeout,
                    )))
                    .await;
                    break;
                }
            }
        }
    }

    /// Returns `false` once the pump should exit.
    ///
    /// `stopped` is true when the callback was queued behind the stop marker.
    async fn handle(&self, callback: BridgeCallback, confirmed: &mut bool, stopped: bool) -> bool {
        match callback {
            BridgeCallback::Started => {
                if stopped {
                    debug!(generation = %self.generation, "Start confirmation arrived after stop, ignoring");
                    return true;
                }
                if *confirmed {
                    return true;
                }
                *confirmed = true;
                info!(generation = %self.generation, "Host bridge capture started");
                self.emit(SpeechEventKind::Started).await
            }
            BridgeCallback::Result { transcript, is_final } => {
                if !*confirmed {
                    debug!(generation = %self.generation, "Dropping result received before start confirmation");
                    return true;
                }
                let kind = if is_final {
                    SpeechEventKind::Final(transcript)
                } else {
                    SpeechEventKind::Partial(transcript)
                };
                self.emit(kind).await
            }
            BridgeCallback::Error { message } => {
                warn!(generation = %self.generation, %message, "Host bridge reported an error");
                self.emit(SpeechEventKind::Error(DictationError::classify(&message)))
                    .await;
                false
            }
        }
    }

    async fn emit(&self, kind: SpeechEventKind) -> bool {
        self.events
            .send(SpeechEvent::new(self.generation, kind))
            .await
            .is_ok()
    }
}
