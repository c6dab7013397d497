// Integration tests for the dictation controller
//
// A manual backend hands its event sender back to the test, so each scenario
// can inject speech events in a precise order and observe the snapshots and
// session notices the controller produces.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use voiceflow::error::DictationError;
use voiceflow::session::{
    DictationController, DictationHandle, Generation, SessionConfig, SessionNotice, SessionStatus,
    StartOutcome, StopOutcome, TranscriptSnapshot,
};
use voiceflow::speech::{
    BackendFactory, BackendKind, Language, LocaleTag, SpeechBackend, SpeechEvent, SpeechEventKind,
};

#[derive(Default)]
struct Shared {
    sessions: Mutex<Vec<(Generation, LocaleTag, mpsc::Sender<SpeechEvent>)>>,
    stops: AtomicUsize,
    releases: AtomicUsize,
}

impl Shared {
    fn sender(&self, index: usize) -> (Generation, mpsc::Sender<SpeechEvent>) {
        let sessions = self.sessions.lock().unwrap();
        let (generation, _, tx) = &sessions[index];
        (*generation, tx.clone())
    }

    fn locale(&self, index: usize) -> String {
        self.sessions.lock().unwrap()[index].1.as_str().to_string()
    }
}

struct ManualBackend {
    shared: Arc<Shared>,
    capturing: bool,
}

#[async_trait::async_trait]
impl SpeechBackend for ManualBackend {
    async fn start(
        &mut self,
        locale: LocaleTag,
        generation: Generation,
    ) -> Result<mpsc::Receiver<SpeechEvent>, DictationError> {
        let (tx, rx) = mpsc::channel(64);
        self.shared.sessions.lock().unwrap().push((generation, locale, tx));
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DictationError> {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        self.capturing = false;
        Ok(())
    }

    fn release(&mut self) {
        self.shared.releases.fetch_add(1, Ordering::SeqCst);
        self.capturing = false;
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn name(&self) -> &str {
        "manual"
    }
}

struct ManualFactory {
    shared: Arc<Shared>,
    unavailable: bool,
}

impl BackendFactory for ManualFactory {
    fn create(&self) -> Result<Box<dyn SpeechBackend>, DictationError> {
        if self.unavailable {
            return Err(DictationError::BackendUnavailable("no recognizer".to_string()));
        }
        Ok(Box::new(ManualBackend {
            shared: Arc::clone(&self.shared),
            capturing: false,
        }))
    }
}

fn spawn_controller(
    grace: Duration,
) -> (DictationHandle, mpsc::UnboundedReceiver<SessionNotice>, Arc<Shared>) {
    let shared = Arc::new(Shared::default());
    let factory = ManualFactory {
        shared: Arc::clone(&shared),
        unavailable: false,
    };
    let config = SessionConfig {
        grace_window: grace,
        ..SessionConfig::default()
    };
    let (handle, notices) = DictationController::spawn(Arc::new(factory), config);
    (handle, notices, shared)
}

async fn wait_for(
    handle: &DictationHandle,
    predicate: impl FnMut(&TranscriptSnapshot) -> bool,
) -> Result<TranscriptSnapshot> {
    let mut snapshots = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), snapshots.wait_for(predicate)).await??;
    Ok(snapshot.clone())
}

async fn next_notice(notices: &mut mpsc::UnboundedReceiver<SessionNotice>) -> Result<SessionNotice> {
    let notice = tokio::time::timeout(Duration::from_secs(2), notices.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("notice channel closed"))?;
    Ok(notice)
}

fn finished_text(notice: SessionNotice) -> String {
    match notice {
        SessionNotice::Finished(transcript) => transcript.text,
        other => panic!("Expected a finished transcript, got {:?}", other),
    }
}

#[tokio::test]
async fn test_start_stop_delivers_transcript_after_grace() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(50));

    let outcome = handle.start(Some(Language::En)).await?;
    let generation = match outcome {
        StartOutcome::Started { generation, backend } => {
            assert_eq!(backend, BackendKind::Embedded);
            generation
        }
        other => panic!("Expected Started, got {:?}", other),
    };
    assert_eq!(handle.snapshot().status, SessionStatus::Listening);
    assert_eq!(shared.locale(0), "en-US");

    let (_, tx) = shared.sender(0);
    tx.send(SpeechEvent::partial(generation, "hel")).await?;
    tx.send(SpeechEvent::final_text(generation, "hello ")).await?;
    tx.send(SpeechEvent::partial(generation, "world")).await?;

    let live = wait_for(&handle, |s| s.display_text() == "hello world").await?;
    assert_eq!(live.final_text, "hello ");
    assert_eq!(live.interim_text, "world");

    assert_eq!(handle.stop().await?, StopOutcome::Finalizing { generation });
    assert_eq!(handle.snapshot().status, SessionStatus::Finalizing);

    let notice = next_notice(&mut notices).await?;
    match notice {
        SessionNotice::Finished(transcript) => {
            assert_eq!(transcript.text, "hello world");
            assert_eq!(transcript.generation, generation);
            assert_eq!(transcript.language, Language::En);
            assert_eq!(transcript.backend, Some(BackendKind::Embedded));
        }
        other => panic!("Expected Finished, got {:?}", other),
    }

    let idle = wait_for(&handle, |s| s.status == SessionStatus::Idle).await?;
    assert_eq!(idle.interim_text, "");
    assert_eq!(shared.stops.load(Ordering::SeqCst), 1);
    assert_eq!(shared.releases.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_final_replaces_partials_in_transcript() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(50));

    handle.start(None).await?;
    let (generation, tx) = shared.sender(0);
    tx.send(SpeechEvent::partial(generation, "hell")).await?;
    tx.send(SpeechEvent::partial(generation, "hello")).await?;
    tx.send(SpeechEvent::final_text(generation, "hello world ")).await?;
    wait_for(&handle, |s| s.final_text == "hello world ").await?;

    handle.stop().await?;
    assert_eq!(finished_text(next_notice(&mut notices).await?), "hello world ");

    let idle = wait_for(&handle, |s| s.status == SessionStatus::Idle).await?;
    assert_eq!(idle.interim_text, "");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(notices.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn test_mixed_language_uses_chinese_locale() -> Result<()> {
    let (handle, _notices, shared) = spawn_controller(Duration::from_millis(50));

    handle.start(None).await?;
    assert_eq!(shared.locale(0), "zh-CN");

    Ok(())
}

#[tokio::test]
async fn test_start_while_active_is_noop() -> Result<()> {
    let (handle, _notices, shared) = spawn_controller(Duration::from_millis(200));

    handle.start(None).await?;
    let generation = handle.snapshot().generation;

    let second = handle.start(None).await?;
    assert_eq!(
        second,
        StartOutcome::AlreadyActive {
            status: SessionStatus::Listening
        }
    );
    assert_eq!(handle.snapshot().generation, generation);
    assert_eq!(shared.sessions.lock().unwrap().len(), 1, "No second backend created");

    handle.stop().await?;
    let third = handle.start(None).await?;
    assert_eq!(
        third,
        StartOutcome::AlreadyActive {
            status: SessionStatus::Finalizing
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_double_stop_delivers_once() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(50));

    handle.start(None).await?;
    let (generation, tx) = shared.sender(0);
    tx.send(SpeechEvent::final_text(generation, "once")).await?;
    wait_for(&handle, |s| s.final_text == "once").await?;

    assert!(matches!(handle.stop().await?, StopOutcome::Finalizing { .. }));
    assert_eq!(
        handle.stop().await?,
        StopOutcome::NotListening {
            status: SessionStatus::Finalizing
        }
    );

    assert_eq!(finished_text(next_notice(&mut notices).await?), "once");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(notices.try_recv().is_err(), "Transcript must be delivered exactly once");
    assert_eq!(shared.stops.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_is_noop() -> Result<()> {
    let (handle, mut notices, _shared) = spawn_controller(Duration::from_millis(50));

    assert_eq!(
        handle.stop().await?,
        StopOutcome::NotListening {
            status: SessionStatus::Idle
        }
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(notices.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn test_grace_window_admits_late_final() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(300));

    handle.start(None).await?;
    let (generation, tx) = shared.sender(0);
    tx.send(SpeechEvent::partial(generation, "almost")).await?;
    wait_for(&handle, |s| s.interim_text == "almost").await?;

    handle.stop().await?;
    tx.send(SpeechEvent::final_text(generation, "almost there")).await?;

    let live = wait_for(&handle, |s| s.final_text == "almost there").await?;
    assert_eq!(live.status, SessionStatus::Finalizing);
    assert_eq!(live.interim_text, "");

    assert_eq!(finished_text(next_notice(&mut notices).await?), "almost there");

    Ok(())
}

#[tokio::test]
async fn test_stale_events_after_restart_are_discarded() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(30));

    handle.start(None).await?;
    let (old_generation, old_tx) = shared.sender(0);
    old_tx.send(SpeechEvent::final_text(old_generation, "first")).await?;
    wait_for(&handle, |s| s.final_text == "first").await?;
    handle.stop().await?;
    assert_eq!(finished_text(next_notice(&mut notices).await?), "first");

    let outcome = handle.start(None).await?;
    let StartOutcome::Started { generation, .. } = outcome else {
        panic!("Expected Started, got {:?}", outcome);
    };
    assert!(generation > old_generation);

    // The first backend keeps talking after its session ended
    old_tx.send(SpeechEvent::final_text(old_generation, "late")).await?;
    old_tx
        .send(SpeechEvent::error(
            old_generation,
            DictationError::TransientRecognition("network".to_string()),
        ))
        .await?;

    let snapshot = wait_for(&handle, |s| s.stale_discarded == 2).await?;
    assert_eq!(snapshot.final_text, "", "Stale text must not leak into the new session");
    assert_eq!(snapshot.status, SessionStatus::Listening);

    let (_, tx) = shared.sender(1);
    tx.send(SpeechEvent::final_text(generation, "second")).await?;
    wait_for(&handle, |s| s.final_text == "second").await?;
    handle.stop().await?;
    assert_eq!(finished_text(next_notice(&mut notices).await?), "second");

    Ok(())
}

#[tokio::test]
async fn test_hard_error_fails_session() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(50));

    handle.start(None).await?;
    let (generation, tx) = shared.sender(0);
    tx.send(SpeechEvent::partial(generation, "partial text")).await?;
    tx.send(SpeechEvent::error(
        generation,
        DictationError::PermissionDenied("not-allowed".to_string()),
    ))
    .await?;

    match next_notice(&mut notices).await? {
        SessionNotice::Failed {
            generation: failed,
            error,
        } => {
            assert_eq!(failed, generation);
            assert!(matches!(error, DictationError::PermissionDenied(_)));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }

    let snapshot = wait_for(&handle, |s| s.status == SessionStatus::Idle).await?;
    assert_eq!(snapshot.interim_text, "");
    assert_eq!(shared.releases.load(Ordering::SeqCst), 1);

    // Surfaced once; the grace timer was never armed
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(notices.try_recv().is_err());

    // Idle again, so a new session may start
    assert!(matches!(handle.start(None).await?, StartOutcome::Started { .. }));

    Ok(())
}

#[tokio::test]
async fn test_error_during_grace_window_fails_session() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_millis(200));

    handle.start(None).await?;
    let (generation, tx) = shared.sender(0);
    tx.send(SpeechEvent::final_text(generation, "text")).await?;
    wait_for(&handle, |s| s.final_text == "text").await?;

    assert!(matches!(handle.stop().await?, StopOutcome::Finalizing { .. }));
    tx.send(SpeechEvent::error(
        generation,
        DictationError::TransientRecognition("network".to_string()),
    ))
    .await?;

    match next_notice(&mut notices).await? {
        SessionNotice::Failed {
            generation: failed,
            error,
        } => {
            assert_eq!(failed, generation);
            assert!(matches!(error, DictationError::TransientRecognition(_)));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }

    // The grace timer fires into an idle session and delivers nothing
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(notices.try_recv().is_err(), "No transcript after a failed session");

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert_eq!(shared.releases.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn test_end_of_stream_finalizes_immediately() -> Result<()> {
    let (handle, mut notices, shared) = spawn_controller(Duration::from_secs(30));

    handle.start(None).await?;
    let (generation, tx) = shared.sender(0);
    tx.send(SpeechEvent::final_text(generation, "done")).await?;
    tx.send(SpeechEvent::new(generation, SpeechEventKind::Ended)).await?;

    // Well before the 30s grace window
    assert_eq!(finished_text(next_notice(&mut notices).await?), "done");
    assert_eq!(handle.snapshot().status, SessionStatus::Idle);

    Ok(())
}

#[tokio::test]
async fn test_empty_session_delivers_nothing() -> Result<()> {
    let (handle, mut notices, _shared) = spawn_controller(Duration::from_millis(30));

    handle.start(None).await?;
    handle.stop().await?;

    wait_for(&handle, |s| s.status == SessionStatus::Idle).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(notices.try_recv().is_err(), "Empty transcripts are not delivered");

    Ok(())
}

#[tokio::test]
async fn test_backend_unavailable_keeps_session_idle() -> Result<()> {
    let factory = ManualFactory {
        shared: Arc::new(Shared::default()),
        unavailable: true,
    };
    let (handle, _notices) = DictationController::spawn(Arc::new(factory), SessionConfig::default());

    let err = handle.start(None).await.unwrap_err();
    assert!(matches!(err, DictationError::BackendUnavailable(_)));
    assert_eq!(handle.snapshot().status, SessionStatus::Idle);

    Ok(())
}

#[tokio::test]
async fn test_handle_after_shutdown_reports_closed() -> Result<()> {
    let (handle, _notices, _shared) = spawn_controller(Duration::from_millis(50));

    handle.shutdown().await;
    let err = handle.start(None).await.unwrap_err();
    assert_eq!(err, DictationError::SessionClosed);

    Ok(())
}
