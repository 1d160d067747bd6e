//! Speech capture state machine.
//!
//! The recognition platform is callback-driven in the original environment;
//! here it is modeled as an explicit finite event set delivered over a
//! channel and processed one event at a time, which removes reentrancy
//! between overlapping callback registrations.

use std::future::Future;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PermissionErrorKind {
    #[error("microphone permission denied")]
    Denied,
    #[error("no audio input device found")]
    NoDevice,
    #[error("audio input device is busy")]
    DeviceBusy,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionErrorKind {
    #[error("no speech detected")]
    NoSpeech,
    #[error("audio capture failed")]
    AudioCapture,
    #[error("microphone access blocked")]
    PermissionBlocked,
    #[error("network error during recognition")]
    Network,
    #[error("recognition failed: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture already active, ignoring re-entrant start")]
    AlreadyActive,
    #[error("no active listening session")]
    NotListening,
    #[error(transparent)]
    Permission(#[from] PermissionErrorKind),
    #[error(transparent)]
    Recognition(#[from] RecognitionErrorKind),
}

/// Events a recognition session can emit, in the order the platform
/// produced them.
#[derive(Debug)]
pub enum RecognitionEvent {
    /// A finalized utterance with its best-confidence alternative.
    Result { transcript: String, confidence: f32 },
    Error(RecognitionErrorKind),
    Ended,
}

/// A live one-shot recognition session. Dropping the session aborts
/// recognition: the platform observes the abort guard closing and must stop
/// emitting events, so no handler outlives its session.
pub struct RecognitionSession {
    events: mpsc::Receiver<RecognitionEvent>,
    _abort: oneshot::Sender<()>,
}

impl RecognitionSession {
    pub fn new(events: mpsc::Receiver<RecognitionEvent>, abort: oneshot::Sender<()>) -> Self {
        Self { events, _abort: abort }
    }

    async fn next_event(&mut self) -> Option<RecognitionEvent> {
        self.events.recv().await
    }
}

/// External speech capability: a permission prompt and a one-shot,
/// non-continuous recognition session in the requested locale.
pub trait SpeechPlatform: Send + Sync {
    fn request_microphone(
        &self,
    ) -> impl Future<Output = Result<(), PermissionErrorKind>> + Send;

    fn start_session(
        &self,
        locale: &str,
    ) -> impl Future<Output = Result<RecognitionSession, RecognitionErrorKind>> + Send;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CaptureState {
    #[default]
    Idle,
    RequestingPermission,
    Listening,
    Processing,
    Error,
}

/// Transient per-attempt session record, reset at the start of each capture.
#[derive(Debug, Clone, Default)]
pub struct VoiceSession {
    pub state: CaptureState,
    pub transcript: Option<String>,
    pub error_message: Option<String>,
}

pub struct CaptureController<P: SpeechPlatform> {
    platform: P,
    locale: String,
    session: VoiceSession,
    active: Option<RecognitionSession>,
}

impl<P: SpeechPlatform> CaptureController<P> {
    pub fn new(platform: P, locale: impl Into<String>) -> Self {
        Self {
            platform,
            locale: locale.into(),
            session: VoiceSession::default(),
            active: None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.session.state
    }

    pub fn session(&self) -> &VoiceSession {
        &self.session
    }

    /// Begin a capture attempt. Valid only from Idle or Error; a start while
    /// a session is active is rejected without touching the session.
    pub async fn start_capture(&mut self) -> Result<(), CaptureError> {
        match self.session.state {
            CaptureState::Idle | CaptureState::Error => {}
            _ => return Err(CaptureError::AlreadyActive),
        }

        self.session = VoiceSession {
            state: CaptureState::RequestingPermission,
            ..VoiceSession::default()
        };

        if let Err(kind) = self.platform.request_microphone().await {
            self.fail(kind.to_string());
            return Err(kind.into());
        }

        match self.platform.start_session(&self.locale).await {
            Ok(active) => {
                debug!(locale = %self.locale, "recognition session started");
                self.active = Some(active);
                self.session.state = CaptureState::Listening;
                Ok(())
            }
            Err(kind) => {
                self.fail(kind.to_string());
                Err(kind.into())
            }
        }
    }

    /// Wait for the session to finalize an utterance. The first result wins;
    /// the session is aborted afterwards so later alternates are discarded.
    pub async fn await_transcript(&mut self) -> Result<String, CaptureError> {
        if self.session.state != CaptureState::Listening {
            return Err(CaptureError::NotListening);
        }
        let Some(mut active) = self.active.take() else {
            return Err(CaptureError::NotListening);
        };

        match active.next_event().await {
            Some(RecognitionEvent::Result { transcript, confidence }) => {
                info!(confidence, "transcript finalized");
                // Dropping `active` here aborts the session before any
                // further alternates arrive.
                self.session.state = CaptureState::Processing;
                self.session.transcript = Some(transcript.clone());
                Ok(transcript)
            }
            Some(RecognitionEvent::Error(kind)) => {
                self.fail(kind.to_string());
                Err(kind.into())
            }
            Some(RecognitionEvent::Ended) | None => {
                let kind = RecognitionErrorKind::NoSpeech;
                self.fail(kind.to_string());
                Err(kind.into())
            }
        }
    }

    /// Abort an active listening session without emitting a transcript.
    /// A no-op from any other state.
    pub fn stop_capture(&mut self) {
        if self.session.state == CaptureState::Listening {
            self.active = None;
            self.session.state = CaptureState::Idle;
            debug!("capture stopped by user");
        }
    }

    /// Return to Idle once downstream processing of the transcript finished.
    pub fn finish_processing(&mut self) {
        if self.session.state == CaptureState::Processing {
            self.session.state = CaptureState::Idle;
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.active = None;
        self.session.state = CaptureState::Error;
        self.session.error_message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    type AbortLog = Arc<Mutex<Vec<oneshot::Receiver<()>>>>;

    /// Scripted platform: each started session is fed the next prepared
    /// event list, and every session's abort guard is logged so tests can
    /// check teardown.
    struct ScriptedPlatform {
        permission: Result<(), PermissionErrorKind>,
        scripts: Mutex<VecDeque<Vec<RecognitionEvent>>>,
        aborts: AbortLog,
    }

    impl ScriptedPlatform {
        fn granting(scripts: Vec<Vec<RecognitionEvent>>) -> Self {
            Self {
                permission: Ok(()),
                scripts: Mutex::new(scripts.into()),
                aborts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn denying(kind: PermissionErrorKind) -> Self {
            Self {
                permission: Err(kind),
                scripts: Mutex::new(VecDeque::new()),
                aborts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn abort_log(&self) -> AbortLog {
            Arc::clone(&self.aborts)
        }

        fn last_session_aborted(&self) -> bool {
            last_aborted(&self.aborts)
        }
    }

    fn last_aborted(log: &AbortLog) -> bool {
        let mut aborts = log.lock().unwrap();
        match aborts.last_mut() {
            Some(rx) => matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)),
            None => false,
        }
    }

    impl SpeechPlatform for ScriptedPlatform {
        async fn request_microphone(&self) -> Result<(), PermissionErrorKind> {
            self.permission
        }

        async fn start_session(
            &self,
            _locale: &str,
        ) -> Result<RecognitionSession, RecognitionErrorKind> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            let (event_tx, event_rx) = mpsc::channel(8);
            let (abort_tx, abort_rx) = oneshot::channel();
            for event in script {
                event_tx.try_send(event).expect("channel capacity");
            }
            self.aborts.lock().unwrap().push(abort_rx);
            Ok(RecognitionSession::new(event_rx, abort_tx))
        }
    }

    fn utterance(text: &str) -> RecognitionEvent {
        RecognitionEvent::Result {
            transcript: text.to_string(),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn successful_capture_reaches_processing() {
        let platform = ScriptedPlatform::granting(vec![vec![
            utterance("mera naam Rajesh hai"),
            utterance("discarded alternate"),
        ]]);
        let mut controller = CaptureController::new(platform, "hi-IN");

        controller.start_capture().await.unwrap();
        assert_eq!(*controller.state(), CaptureState::Listening);

        let transcript = controller.await_transcript().await.unwrap();
        assert_eq!(transcript, "mera naam Rajesh hai");
        assert_eq!(*controller.state(), CaptureState::Processing);

        controller.finish_processing();
        assert_eq!(*controller.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn first_utterance_wins_and_session_aborts() {
        let platform = ScriptedPlatform::granting(vec![vec![
            utterance("first"),
            utterance("second"),
        ]]);
        let mut controller = CaptureController::new(platform, "hi-IN");
        controller.start_capture().await.unwrap();
        let transcript = controller.await_transcript().await.unwrap();
        assert_eq!(transcript, "first");
        assert!(controller.platform.last_session_aborted());
    }

    #[tokio::test]
    async fn permission_denial_is_classified() {
        let platform = ScriptedPlatform::denying(PermissionErrorKind::DeviceBusy);
        let mut controller = CaptureController::new(platform, "hi-IN");

        let err = controller.start_capture().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Permission(PermissionErrorKind::DeviceBusy)
        ));
        assert_eq!(*controller.state(), CaptureState::Error);
        assert!(controller
            .session()
            .error_message
            .as_deref()
            .unwrap()
            .contains("busy"));
    }

    #[tokio::test]
    async fn recognition_error_moves_to_error_state() {
        let platform = ScriptedPlatform::granting(vec![vec![RecognitionEvent::Error(
            RecognitionErrorKind::Network,
        )]]);
        let mut controller = CaptureController::new(platform, "hi-IN");
        controller.start_capture().await.unwrap();

        let err = controller.await_transcript().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Recognition(RecognitionErrorKind::Network)
        ));
        assert_eq!(*controller.state(), CaptureState::Error);
    }

    #[tokio::test]
    async fn session_end_without_result_is_no_speech() {
        let platform = ScriptedPlatform::granting(vec![vec![RecognitionEvent::Ended]]);
        let mut controller = CaptureController::new(platform, "hi-IN");
        controller.start_capture().await.unwrap();

        let err = controller.await_transcript().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Recognition(RecognitionErrorKind::NoSpeech)
        ));
    }

    #[tokio::test]
    async fn reentrant_start_is_rejected() {
        let platform = ScriptedPlatform::granting(vec![vec![utterance("hello")]]);
        let mut controller = CaptureController::new(platform, "hi-IN");
        controller.start_capture().await.unwrap();

        let err = controller.start_capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::AlreadyActive));
        // The original session is untouched.
        assert_eq!(*controller.state(), CaptureState::Listening);
        let transcript = controller.await_transcript().await.unwrap();
        assert_eq!(transcript, "hello");
    }

    #[tokio::test]
    async fn stop_capture_from_idle_is_a_no_op() {
        let platform = ScriptedPlatform::granting(Vec::new());
        let mut controller = CaptureController::new(platform, "hi-IN");
        controller.stop_capture();
        assert_eq!(*controller.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn repeated_cycles_never_leak_a_session() {
        let platform = ScriptedPlatform::granting(Vec::new());
        let mut controller = CaptureController::new(platform, "hi-IN");

        for _ in 0..3 {
            controller.start_capture().await.unwrap();
            assert_eq!(*controller.state(), CaptureState::Listening);
            controller.stop_capture();
            assert_eq!(*controller.state(), CaptureState::Idle);
            assert!(controller.active.is_none());
            assert!(controller.platform.last_session_aborted());
        }
    }

    #[tokio::test]
    async fn restart_after_error_is_allowed() {
        let platform = ScriptedPlatform::granting(vec![
            vec![RecognitionEvent::Error(RecognitionErrorKind::AudioCapture)],
            vec![utterance("second try")],
        ]);
        let mut controller = CaptureController::new(platform, "hi-IN");

        controller.start_capture().await.unwrap();
        assert!(controller.await_transcript().await.is_err());
        assert_eq!(*controller.state(), CaptureState::Error);

        controller.start_capture().await.unwrap();
        // The session record was reset for the new attempt.
        assert!(controller.session().error_message.is_none());
        let transcript = controller.await_transcript().await.unwrap();
        assert_eq!(transcript, "second try");
    }

    #[tokio::test]
    async fn drop_aborts_in_flight_session() {
        let platform = ScriptedPlatform::granting(vec![Vec::new()]);
        let abort_log = platform.abort_log();
        let mut controller = CaptureController::new(platform, "hi-IN");
        controller.start_capture().await.unwrap();
        assert!(!last_aborted(&abort_log));

        drop(controller);
        assert!(last_aborted(&abort_log));
    }
}
