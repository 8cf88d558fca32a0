//! Scan and chat orchestration.

use std::sync::Arc;

use dermalens_capture::{CancelMode, CaptureController, PermissionState};
use dermalens_core::DiagnosticRequest;
use dermalens_diagnosis_contract::{ChatReply, DiagnosticResult};
use dermalens_service::{ChatClient, DiagnosticClient};
use dermalens_ui::{
    ChatTranscript, DiagnosisPublisher, DiagnosisView, ScanProgress, ScanScreenState,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{AppError, redact_sensitive};

/// Drives one scan screen: camera or file capture, submission, and
/// publication of the result.
pub struct ScanWorkflow {
    capture: Arc<CaptureController>,
    client: DiagnosticClient,
    publisher: DiagnosisPublisher,
    screen: ScanScreenState,
}

impl ScanWorkflow {
    /// Creates a workflow on the choice screen.
    pub fn new(
        capture: Arc<CaptureController>,
        client: DiagnosticClient,
        publisher: DiagnosisPublisher,
    ) -> Self {
        Self {
            capture,
            client,
            publisher,
            screen: ScanScreenState::new(),
        }
    }

    /// Shared capture controller, for cancelling from another task.
    pub fn capture(&self) -> &Arc<CaptureController> {
        &self.capture
    }

    /// Current screen state.
    pub fn screen(&self) -> &ScanScreenState {
        &self.screen
    }

    /// Creates another view on the latest diagnosis.
    pub fn view(&self) -> DiagnosisView {
        self.publisher.view()
    }

    /// Requests the camera and projects the outcome onto the screen.
    ///
    /// # Errors
    /// Returns [`AppError::Permission`] on denial, exhaustion, or cancellation.
    /// The file path stays available in every case.
    pub async fn request_camera(&mut self) -> Result<(), AppError> {
        self.screen.apply_permission(PermissionState::Requesting, None);
        let outcome = self.capture.request_camera_access().await;
        self.sync_permission();
        outcome.map_err(AppError::from)
    }

    /// Captures the live frame and analyzes it.
    ///
    /// # Errors
    /// Capture failures leave the screen untouched; submission failures reset
    /// it so the user may capture again.
    pub async fn run_live(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Arc<DiagnosticResult>, AppError> {
        let request = self.capture.capture_frame()?;
        self.analyze(request, cancel).await
    }

    /// Ingests an uploaded image and analyzes it. Works in every permission
    /// state, including after a camera denial.
    ///
    /// # Errors
    /// Same as [`ScanWorkflow::run_live`], plus decode failures.
    pub async fn run_file(
        &mut self,
        name: &str,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Arc<DiagnosticResult>, AppError> {
        let request = self.capture.ingest_file(name, bytes)?;
        self.sync_permission();
        self.analyze(request, cancel).await
    }

    /// Cancels the current capture and projects the new state.
    pub fn cancel(&mut self, mode: CancelMode) {
        self.capture.cancel(mode);
        self.screen.showing_preview = false;
        self.sync_permission();
    }

    fn sync_permission(&mut self) {
        self.screen.apply_permission(
            self.capture.permission_state(),
            self.capture.denial_reason(),
        );
    }

    async fn analyze(
        &mut self,
        request: DiagnosticRequest,
        cancel: &CancellationToken,
    ) -> Result<Arc<DiagnosticResult>, AppError> {
        let capture = Arc::clone(&self.capture);
        let guard = capture.begin_submission()?;
        self.screen.show_preview();
        self.screen.start_analysis()?;
        self.screen.advance(ScanProgress::Submitted);

        let outcome = self.client.submit(&request, cancel).await;
        drop(guard);

        match outcome {
            Ok(result) => {
                self.screen.advance(ScanProgress::Received);
                let shared = self.publisher.publish(result);
                self.screen.advance(ScanProgress::Done);
                info!(
                    classification = %shared.classification,
                    fingerprint = %request.fingerprint(),
                    "diagnosis published"
                );
                Ok(shared)
            }
            Err(error) => {
                self.screen.reset_after_failure();
                warn!(
                    error = %redact_sensitive(&error.to_string()),
                    retryable = error.is_retryable(),
                    "scan failed; ready to capture again"
                );
                Err(error.into())
            }
        }
    }
}

/// Follow-up chat: ordered transcript plus the chat client.
pub struct ChatFlow {
    client: ChatClient,
    transcript: ChatTranscript,
}

impl ChatFlow {
    /// Creates a flow with a transcript seeded by the greeting.
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            transcript: ChatTranscript::new(),
        }
    }

    /// Current transcript.
    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    /// Sends one message with every prior turn as history.
    ///
    /// On failure the user message stays in the transcript and the flow
    /// accepts the next message.
    ///
    /// # Errors
    /// Returns [`AppError::Ui`] for blank input or while a reply is pending,
    /// and [`AppError::Service`] when the call fails.
    pub async fn send(
        &mut self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, AppError> {
        let history = self.transcript.push_user(message)?;
        match self.client.chat(message, &history, cancel).await {
            Ok(reply) => {
                self.transcript.push_model_reply(&reply);
                Ok(reply)
            }
            Err(error) => {
                self.transcript.abandon_reply();
                Err(error.into())
            }
        }
    }
}
