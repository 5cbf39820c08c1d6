//! Interview session shim
//!
//! Translates signals from the realtime client into local session state and
//! issues the start/stop commands. The platform does all media and workflow
//! work; this module only tracks what the screen needs to render and where
//! to go when the call ends.

mod state;
mod transcript;

pub use state::CallPhase;
pub use transcript::{TranscriptBuffer, Utterance};

use crate::client::{ClientEvent, StartRequest, VoiceClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// What the screen needs to render one frame
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub phase: CallPhase,
    pub speaking: bool,
    pub latest: Option<Utterance>,
    pub utterance_count: usize,
}

#[derive(Debug, Default)]
struct SessionState {
    phase: CallPhase,
    speaking: bool,
    transcript: TranscriptBuffer,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            speaking: self.speaking,
            latest: self.transcript.latest().cloned(),
            utterance_count: self.transcript.len(),
        }
    }
}

/// Where the screen goes when the session ends
pub trait Navigator: Send + Sync + 'static {
    /// Fire-and-forget redirect to the landing location.
    fn go_home(&self);
}

/// Opens the landing URL with the host system's URL handler
pub struct LandingPage {
    url: String,
}

impl LandingPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Navigator for LandingPage {
    fn go_home(&self) {
        info!("Returning to {}", self.url);
        if let Err(e) = open::that(&self.url) {
            warn!("Failed to open landing page: {}", e);
        }
    }
}

/// Session shim for one interview screen.
///
/// Owns the event loop that consumes client signals. Dropping the session
/// (or calling [`InterviewSession::shutdown`]) releases the subscription, so
/// a start command that completes after teardown updates nothing.
pub struct InterviewSession<C: VoiceClient> {
    client: Arc<C>,
    state: Arc<Mutex<SessionState>>,
    navigator: Arc<dyn Navigator>,
    should_stop: Arc<AtomicBool>,
    shutdown_tx: mpsc::Sender<()>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<C: VoiceClient> InterviewSession<C> {
    pub fn new(client: Arc<C>, navigator: Arc<dyn Navigator>) -> Self {
        let state = Arc::new(Mutex::new(SessionState::default()));
        let should_stop = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (snapshot_tx, _) = watch::channel(SessionState::default().snapshot());

        spawn_event_loop(
            client.subscribe(),
            shutdown_rx,
            state.clone(),
            navigator.clone(),
            should_stop.clone(),
            snapshot_tx.clone(),
        );

        Self {
            client,
            state,
            navigator,
            should_stop,
            shutdown_tx,
            snapshot_tx,
        }
    }

    /// Request the platform to begin a session.
    ///
    /// Rejection is logged and resets the phase to Idle; no error is
    /// surfaced beyond the log.
    pub async fn start(&self, request: StartRequest) {
        let phase = self.snapshot().phase;
        if phase != CallPhase::Idle {
            warn!("Ignoring start request while {}", phase);
            return;
        }

        self.apply(|s| s.phase = s.phase.on_start_requested());
        info!("Starting {:?} session {}", request.kind, request.id);

        match self.client.start(request).await {
            Ok(()) => {
                if self.should_stop.load(Ordering::SeqCst) {
                    debug!("Start completed after shutdown, ignoring");
                    return;
                }
                self.apply(|s| s.phase = s.phase.on_start_accepted());
            }
            Err(e) => {
                error!("Failed to start interview session: {}", e);
                self.apply(|s| s.phase = s.phase.on_start_rejected());
            }
        }
    }

    /// Request session teardown. Completion moves the phase to Finished.
    pub async fn stop(&self) {
        info!("Stopping interview session");
        match self.client.stop().await {
            Ok(()) => self.apply(|s| s.phase = s.phase.on_stop_completed()),
            Err(e) => error!("Failed to stop interview session: {}", e),
        }
    }

    /// Current state for rendering. Recovers the data if the lock was
    /// poisoned.
    pub fn snapshot(&self) -> SessionSnapshot {
        lock_state(&self.state).snapshot()
    }

    /// The accumulated transcript, one line per finalized utterance.
    pub fn transcript_text(&self) -> String {
        lock_state(&self.state).transcript.full_text()
    }

    /// Subscribe to snapshot updates.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Detach from the client's signal stream. Safe to call more than once.
    pub fn shutdown(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.try_send(());
    }

    fn apply(&self, f: impl FnOnce(&mut SessionState)) {
        apply_transition(&self.state, self.navigator.as_ref(), &self.snapshot_tx, f);
    }
}

impl<C: VoiceClient> Drop for InterviewSession<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_state(state: &Arc<Mutex<SessionState>>) -> MutexGuard<'_, SessionState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Session state mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Apply one state mutation and its side effects.
///
/// Every phase write funnels through here, so entering Finished fires the
/// navigation exactly once: Finished is absorbing, and a transition that
/// starts there can never re-enter it.
fn apply_transition(
    state: &Arc<Mutex<SessionState>>,
    navigator: &dyn Navigator,
    snapshot_tx: &watch::Sender<SessionSnapshot>,
    f: impl FnOnce(&mut SessionState),
) {
    let (was, now, snapshot) = {
        let mut guard = lock_state(state);
        let was = guard.phase;
        f(&mut guard);
        (was, guard.phase, guard.snapshot())
    };

    snapshot_tx.send_replace(snapshot);

    if now == CallPhase::Finished && was != CallPhase::Finished {
        info!("Session finished");
        navigator.go_home();
    }
}

fn spawn_event_loop(
    mut event_rx: broadcast::Receiver<ClientEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
    state: Arc<Mutex<SessionState>>,
    navigator: Arc<dyn Navigator>,
    should_stop: Arc<AtomicBool>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    debug!("Session event loop shutting down");
                    break;
                }
                event = event_rx.recv() => match event {
                    Ok(event) => {
                        if should_stop.load(Ordering::SeqCst) {
                            break;
                        }
                        handle_client_event(event, &state, navigator.as_ref(), &snapshot_tx);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Session event loop lagged, skipped {} signals", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Client signal channel closed");
                        break;
                    }
                }
            }
        }
    });
}

fn handle_client_event(
    event: ClientEvent,
    state: &Arc<Mutex<SessionState>>,
    navigator: &dyn Navigator,
    snapshot_tx: &watch::Sender<SessionSnapshot>,
) {
    match event {
        ClientEvent::StateChange(connection) => {
            debug!("Platform connection state: {:?}", connection);
            apply_transition(state, navigator, snapshot_tx, |s| {
                s.phase = s.phase.on_connection_state(&connection);
            });
        }
        ClientEvent::Message(message) => {
            if let Some((role, text)) = message.final_transcript() {
                let text = text.to_string();
                apply_transition(state, navigator, snapshot_tx, |s| {
                    s.transcript.push(role, text);
                });
            } else {
                trace!("Dropping non-final message: {:?}", message);
            }
        }
        ClientEvent::SpeechStart => {
            apply_transition(state, navigator, snapshot_tx, |s| s.speaking = true);
        }
        ClientEvent::SpeechEnd => {
            apply_transition(state, navigator, snapshot_tx, |s| s.speaking = false);
        }
        ClientEvent::Error(payload) => log_platform_error(&payload),
    }
}

/// Errors from the platform are logged and swallowed; they never touch
/// session state.
fn log_platform_error(payload: &serde_json::Value) {
    match payload.get("message").and_then(|m| m.as_str()) {
        Some(message) => {
            error!("Platform error: {}", message);
            if let Some(stack) = payload.get("stack").and_then(|s| s.as_str()) {
                error!("Platform error stack: {}", stack);
            }
        }
        None => error!("Platform error: {}", payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, ConnectionState, ServerMessage};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct RecordingNavigator {
        navigations: AtomicUsize,
    }

    impl RecordingNavigator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                navigations: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.navigations.load(Ordering::SeqCst)
        }
    }

    impl Navigator for RecordingNavigator {
        fn go_home(&self) {
            self.navigations.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeClient {
        event_tx: broadcast::Sender<ClientEvent>,
        start_error: std::sync::Mutex<Option<ClientError>>,
        start_calls: AtomicUsize,
    }

    impl FakeClient {
        fn new() -> Arc<Self> {
            let (event_tx, _) = broadcast::channel(16);
            Arc::new(Self {
                event_tx,
                start_error: std::sync::Mutex::new(None),
                start_calls: AtomicUsize::new(0),
            })
        }

        fn rejecting(error: ClientError) -> Arc<Self> {
            let client = Self::new();
            *client.start_error.lock().unwrap() = Some(error);
            client
        }

        fn emit(&self, event: ClientEvent) {
            let _ = self.event_tx.send(event);
        }
    }

    impl VoiceClient for FakeClient {
        fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
            self.event_tx.subscribe()
        }

        async fn start(&self, _request: StartRequest) -> Result<(), ClientError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            match self.start_error.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn stop(&self) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn transcript_message(role: &str, stage: &str, text: &str) -> ServerMessage {
        serde_json::from_value(serde_json::json!({
            "type": "transcript",
            "role": role,
            "transcriptType": stage,
            "transcript": text,
        }))
        .unwrap()
    }

    fn new_session(
        client: &Arc<FakeClient>,
    ) -> (InterviewSession<FakeClient>, Arc<RecordingNavigator>) {
        let navigator = RecordingNavigator::new();
        let session = InterviewSession::new(client.clone(), navigator.clone());
        (session, navigator)
    }

    #[tokio::test]
    async fn test_connected_signal_activates_session() {
        let client = FakeClient::new();
        let (session, _navigator) = new_session(&client);
        let mut snapshots = session.watch();

        client.emit(ClientEvent::StateChange(ConnectionState::Connected));
        snapshots.changed().await.unwrap();

        assert_eq!(session.snapshot().phase, CallPhase::Active);
    }

    #[tokio::test]
    async fn test_accepted_start_activates_session() {
        let client = FakeClient::new();
        let (session, navigator) = new_session(&client);

        session.start(StartRequest::workflow("wf_1")).await;

        assert_eq!(session.snapshot().phase, CallPhase::Active);
        assert_eq!(client.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(navigator.count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_start_resets_to_idle() {
        let client = FakeClient::rejecting(ClientError::Rejected("no capacity".to_string()));
        let (session, navigator) = new_session(&client);

        session.start(StartRequest::workflow("wf_1")).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, CallPhase::Idle);
        assert_eq!(snapshot.utterance_count, 0);
        assert_eq!(navigator.count(), 0);
    }

    #[tokio::test]
    async fn test_start_is_ignored_outside_idle() {
        let client = FakeClient::new();
        let (session, _navigator) = new_session(&client);

        session.start(StartRequest::workflow("wf_1")).await;
        session.start(StartRequest::workflow("wf_1")).await;

        assert_eq!(client.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disconnect_finishes_and_navigates_once() {
        let client = FakeClient::new();
        let (session, navigator) = new_session(&client);
        session.start(StartRequest::workflow("wf_1")).await;

        let mut snapshots = session.watch();
        client.emit(ClientEvent::StateChange(ConnectionState::Disconnected));
        snapshots.changed().await.unwrap();

        assert_eq!(session.snapshot().phase, CallPhase::Finished);
        assert_eq!(navigator.count(), 1);

        // A stop after the disconnect must not navigate again.
        session.stop().await;
        assert_eq!(session.snapshot().phase, CallPhase::Finished);
        assert_eq!(navigator.count(), 1);
    }

    #[tokio::test]
    async fn test_stop_finishes_and_navigates_once() {
        let client = FakeClient::new();
        let (session, navigator) = new_session(&client);
        session.start(StartRequest::workflow("wf_1")).await;

        session.stop().await;

        assert_eq!(session.snapshot().phase, CallPhase::Finished);
        assert_eq!(navigator.count(), 1);
    }

    #[tokio::test]
    async fn test_final_transcripts_append_in_order() {
        let client = FakeClient::new();
        let (session, _navigator) = new_session(&client);
        let mut snapshots = session.watch();

        client.emit(ClientEvent::Message(transcript_message(
            "assistant", "final", "Tell me about Rust.",
        )));
        snapshots.changed().await.unwrap();
        client.emit(ClientEvent::Message(transcript_message(
            "user", "final", "hello",
        )));
        snapshots.changed().await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.utterance_count, 2);
        let latest = snapshot.latest.unwrap();
        assert_eq!(latest.role, crate::client::TranscriptRole::User);
        assert_eq!(latest.text, "hello");
    }

    #[tokio::test]
    async fn test_partial_transcripts_are_dropped() {
        let client = FakeClient::new();
        let (session, _navigator) = new_session(&client);
        let mut snapshots = session.watch();

        client.emit(ClientEvent::Message(transcript_message(
            "user", "partial", "hel",
        )));
        // A speech signal flushes the loop so we can observe the buffer.
        client.emit(ClientEvent::SpeechStart);
        snapshots.changed().await.unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.utterance_count, 0);
        assert!(snapshot.latest.is_none());
        assert!(snapshot.speaking);
    }

    #[tokio::test]
    async fn test_speaking_flag_follows_speech_signals() {
        let client = FakeClient::new();
        let (session, _navigator) = new_session(&client);
        let mut snapshots = session.watch();

        client.emit(ClientEvent::SpeechStart);
        snapshots.changed().await.unwrap();
        assert!(session.snapshot().speaking);

        client.emit(ClientEvent::SpeechEnd);
        snapshots.changed().await.unwrap();
        assert!(!session.snapshot().speaking);

        // A start without a matching end leaves the flag set.
        client.emit(ClientEvent::SpeechStart);
        snapshots.changed().await.unwrap();
        assert!(session.snapshot().speaking);
    }

    #[tokio::test]
    async fn test_platform_errors_do_not_touch_state() {
        let client = FakeClient::new();
        let (session, navigator) = new_session(&client);
        session.start(StartRequest::workflow("wf_1")).await;

        let mut snapshots = session.watch();
        client.emit(ClientEvent::Error(serde_json::json!({
            "message": "meeting has ended",
        })));
        client.emit(ClientEvent::SpeechStart);
        snapshots.changed().await.unwrap();

        assert_eq!(session.snapshot().phase, CallPhase::Active);
        assert_eq!(navigator.count(), 0);
    }

    #[tokio::test]
    async fn test_signals_after_shutdown_are_ignored() {
        let client = FakeClient::new();
        let (session, _navigator) = new_session(&client);

        session.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.emit(ClientEvent::StateChange(ConnectionState::Connected));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.snapshot().phase, CallPhase::Idle);
    }
}
