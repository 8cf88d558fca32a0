#![warn(missing_docs)]
//! # dermalens-ui
//!
//! ## Purpose
//! Defines the UI-facing state driven by the capture and submission
//! workflows.
//!
//! ## Responsibilities
//! - Track scan screen phase, progress checkpoints, and denial narratives.
//! - Hold the latest diagnosis in an explicit container with one writer.
//! - Project a diagnosis into a display-safe report summary.
//! - Keep the ordered chat transcript that supplies chat history.
//!
//! ## Data flow
//! Workflow events mutate [`ScanScreenState`] and [`ChatTranscript`]; a
//! successful scan is published through [`DiagnosisPublisher`] and read by
//! every screen through [`DiagnosisView`].
//!
//! ## Ownership and lifetimes
//! Results are shared as `Arc<DiagnosticResult>` so readers never copy the
//! payload and never hold a lock.
//!
//! ## Error model
//! Illegal interactions (overlapping analysis, blank chat input) are rejected
//! with [`UiError`]; everything else is explicit state.
//!
//! ## Security and privacy notes
//! UI state carries no image bytes and no credentials.

use std::sync::Arc;

use dermalens_capture::{DenialReason, PermissionState};
use dermalens_diagnosis_contract::{ChatReply, ChatRole, ChatTurn, DiagnosticResult, Severity};
use thiserror::Error;
use tokio::sync::watch;

/// First message of every chat transcript.
pub const CHAT_GREETING: &str = "Hi! I'm Monica, your AI skin companion. I've analyzed your \
recent reports. Do you have any concerns about redness or hydration today?";

/// Scan screen phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Choosing between live camera and gallery upload.
    Choosing,
    /// Live feed or preview shown; ready to capture.
    Live,
    /// Submission in flight.
    Analyzing,
    /// Result received and published.
    Complete,
}

/// Progress checkpoints of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScanProgress {
    /// Image captured, analysis started.
    Started,
    /// Request sent to the service.
    Submitted,
    /// Response received.
    Received,
    /// Result published.
    Done,
}

impl ScanProgress {
    /// Percentage shown by the progress indicator.
    pub fn percent(self) -> u8 {
        match self {
            Self::Started => 10,
            Self::Submitted => 40,
            Self::Received => 90,
            Self::Done => 100,
        }
    }
}

/// Heading and body copy for the capture choice screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Narrative {
    /// Heading.
    pub title: &'static str,
    /// Body text.
    pub body: &'static str,
}

/// Copy shown before any camera request.
pub const CHOICE_NARRATIVE: Narrative = Narrative {
    title: "How to Scan?",
    body: "Capture a live photo for the most accurate diagnostic, or upload an existing image \
           from your gallery.",
};

/// Returns the narrative for a denial reason.
pub fn denial_narrative(reason: DenialReason) -> Narrative {
    match reason {
        DenialReason::Refused => Narrative {
            title: "Access Denied",
            body: "Monica needs camera access for live analysis, but you can still upload a \
                   photo from your gallery.",
        },
        DenialReason::Unavailable => Narrative {
            title: "Camera Unavailable",
            body: "Camera hardware unavailable or access denied.",
        },
    }
}

/// State of the scan screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanScreenState {
    /// Current phase.
    pub phase: ScanPhase,
    /// Progress percentage, `0` when idle.
    pub progress: u8,
    /// Whether a captured or uploaded image is shown.
    pub showing_preview: bool,
    /// Narrative for the choice screen.
    pub narrative: Narrative,
    /// Whether the live-camera button is offered.
    pub camera_offered: bool,
    /// Whether a camera request is pending.
    pub requesting: bool,
}

impl ScanScreenState {
    /// Creates the initial choice screen.
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Choosing,
            progress: 0,
            showing_preview: false,
            narrative: CHOICE_NARRATIVE,
            camera_offered: true,
            requesting: false,
        }
    }

    /// Projects a capture permission state onto the screen.
    pub fn apply_permission(&mut self, state: PermissionState, denial: Option<DenialReason>) {
        self.requesting = state == PermissionState::Requesting;
        match state {
            PermissionState::Granted => {
                if self.phase == ScanPhase::Choosing {
                    self.phase = ScanPhase::Live;
                }
            }
            PermissionState::Denied => {
                self.phase = ScanPhase::Choosing;
                self.camera_offered = false;
                self.narrative = denial_narrative(denial.unwrap_or(DenialReason::Unavailable));
            }
            PermissionState::Prompt | PermissionState::Requesting => {
                self.phase = ScanPhase::Choosing;
                self.camera_offered = true;
                self.narrative = CHOICE_NARRATIVE;
            }
        }
    }

    /// Shows a captured or uploaded image.
    pub fn show_preview(&mut self) {
        self.showing_preview = true;
        if self.phase == ScanPhase::Choosing {
            self.phase = ScanPhase::Live;
        }
    }

    /// Enters the analyzing phase.
    ///
    /// # Errors
    /// Returns [`UiError::AlreadyAnalyzing`] while another analysis runs.
    pub fn start_analysis(&mut self) -> Result<(), UiError> {
        if self.is_analyzing() {
            return Err(UiError::AlreadyAnalyzing);
        }
        self.phase = ScanPhase::Analyzing;
        self.progress = ScanProgress::Started.percent();
        Ok(())
    }

    /// Moves the progress indicator forward; never moves it back.
    pub fn advance(&mut self, checkpoint: ScanProgress) {
        self.progress = self.progress.max(checkpoint.percent());
        if checkpoint == ScanProgress::Done {
            self.phase = ScanPhase::Complete;
            self.showing_preview = false;
        }
    }

    /// Resets after a failed analysis so the user may capture or upload again.
    pub fn reset_after_failure(&mut self) {
        self.progress = 0;
        self.showing_preview = false;
        if self.phase != ScanPhase::Choosing {
            self.phase = ScanPhase::Live;
        }
    }

    /// Returns `true` while a submission is in flight.
    pub fn is_analyzing(&self) -> bool {
        self.phase == ScanPhase::Analyzing
    }
}

impl Default for ScanScreenState {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the latest-diagnosis container.
///
/// The publisher is the single writer; views are cheap read-only handles.
pub fn latest_diagnosis() -> (DiagnosisPublisher, DiagnosisView) {
    let (tx, rx) = watch::channel(None);
    (DiagnosisPublisher { tx }, DiagnosisView { rx })
}

/// Single writer of the latest diagnosis. Deliberately not `Clone`.
#[derive(Debug)]
pub struct DiagnosisPublisher {
    tx: watch::Sender<Option<Arc<DiagnosticResult>>>,
}

impl DiagnosisPublisher {
    /// Replaces the latest diagnosis.
    pub fn publish(&self, result: DiagnosticResult) -> Arc<DiagnosticResult> {
        let shared = Arc::new(result);
        self.tx.send_replace(Some(shared.clone()));
        shared
    }

    /// Creates another read-only view.
    pub fn view(&self) -> DiagnosisView {
        DiagnosisView {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only handle on the latest diagnosis.
#[derive(Debug, Clone)]
pub struct DiagnosisView {
    rx: watch::Receiver<Option<Arc<DiagnosticResult>>>,
}

impl DiagnosisView {
    /// Returns the latest diagnosis, if any scan has succeeded.
    pub fn current(&self) -> Option<Arc<DiagnosticResult>> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published diagnosis.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<Arc<DiagnosticResult>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Projects the latest diagnosis into a report summary.
    pub fn report(&self) -> Option<ReportSummary> {
        self.current().map(|result| ReportSummary::from_result(&result))
    }
}

/// One labeled metric on the report.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    /// Display label.
    pub label: &'static str,
    /// Score.
    pub value: f64,
}

/// Display-safe projection of a diagnosis.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    /// Condition name.
    pub classification: String,
    /// Severity label.
    pub severity: &'static str,
    /// Human-readable status line.
    pub status: String,
    /// Confidence rounded to a whole percent.
    pub confidence_percent: u8,
    /// Metric readings in display order.
    pub metrics: Vec<MetricReading>,
    /// Number of home remedies.
    pub remedy_count: usize,
}

impl ReportSummary {
    /// Builds the summary from a validated result.
    pub fn from_result(result: &DiagnosticResult) -> Self {
        let status = match result.severity {
            Severity::Low => "Low severity",
            Severity::Moderate => "Moderate severity",
            Severity::High => "High severity: consider seeing a dermatologist",
        };

        Self {
            classification: result.classification.clone(),
            severity: result.severity.label(),
            status: status.to_string(),
            confidence_percent: result.confidence_percent().round().clamp(0.0, 100.0) as u8,
            metrics: vec![
                MetricReading {
                    label: "Inflammation",
                    value: result.metrics.inflammation,
                },
                MetricReading {
                    label: "Hydration",
                    value: result.metrics.hydration,
                },
                MetricReading {
                    label: "Pigmentation",
                    value: result.metrics.pigmentation,
                },
            ],
            remedy_count: result.home_remedies.len(),
        }
    }
}

/// One message on the chat screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Monotonic message id.
    pub id: u64,
    /// Speaker.
    pub role: ChatRole,
    /// Text.
    pub text: String,
}

/// Ordered chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
    next_id: u64,
    awaiting_reply: bool,
}

impl ChatTranscript {
    /// Creates a transcript seeded with the greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage {
                id: 1,
                role: ChatRole::Model,
                text: CHAT_GREETING.to_string(),
            }],
            next_id: 2,
            awaiting_reply: false,
        }
    }

    /// Returns all messages in conversation order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Returns `true` while a reply is pending.
    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Returns all turns in conversation order.
    pub fn history(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .map(|message| ChatTurn {
                role: message.role,
                text: message.text.clone(),
            })
            .collect()
    }

    /// Appends a user message and returns the history that preceded it.
    ///
    /// # Errors
    /// Returns [`UiError::EmptyMessage`] for blank input and
    /// [`UiError::AwaitingReply`] while the previous reply is pending.
    pub fn push_user(&mut self, text: &str) -> Result<Vec<ChatTurn>, UiError> {
        if text.trim().is_empty() {
            return Err(UiError::EmptyMessage);
        }
        if self.awaiting_reply {
            return Err(UiError::AwaitingReply);
        }

        let history = self.history();
        self.push(ChatRole::User, text.to_string());
        self.awaiting_reply = true;
        Ok(history)
    }

    /// Appends the model reply and ends the pending state.
    pub fn push_model_reply(&mut self, reply: &ChatReply) {
        self.push(ChatRole::Model, reply.text.clone());
        self.awaiting_reply = false;
    }

    /// Ends the pending state without a reply; the user message stays.
    pub fn abandon_reply(&mut self) {
        self.awaiting_reply = false;
    }

    fn push(&mut self, role: ChatRole, text: String) {
        self.messages.push(ChatMessage {
            id: self.next_id,
            role,
            text,
        });
        self.next_id += 1;
    }
}

impl Default for ChatTranscript {
    fn default() -> Self {
        Self::new()
    }
}

/// UI interaction errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum UiError {
    /// An analysis is already running.
    #[error("an analysis is already running")]
    AlreadyAnalyzing,
    /// Chat input is blank.
    #[error("message is empty")]
    EmptyMessage,
    /// The previous chat reply is still pending.
    #[error("still waiting for the previous reply")]
    AwaitingReply,
}

#[cfg(test)]
mod tests {
    //! Unit tests for scan screen transitions.

    use super::*;

    #[test]
    fn failure_resets_progress_and_preview() {
        let mut state = ScanScreenState::new();
        state.apply_permission(PermissionState::Granted, None);
        state.show_preview();
        state.start_analysis().expect("first analysis");
        state.advance(ScanProgress::Submitted);
        assert_eq!(state.progress, 40);

        state.reset_after_failure();

        assert_eq!(state.progress, 0);
        assert!(!state.showing_preview);
        assert_eq!(state.phase, ScanPhase::Live);
        assert!(state.start_analysis().is_ok());
    }

    #[test]
    fn progress_never_moves_backwards() {
        let mut state = ScanScreenState::new();
        state.start_analysis().expect("analysis");
        state.advance(ScanProgress::Received);
        state.advance(ScanProgress::Submitted);
        assert_eq!(state.progress, 90);
    }

    #[test]
    fn denial_narratives_differ_by_reason() {
        let mut state = ScanScreenState::new();
        state.apply_permission(PermissionState::Denied, Some(DenialReason::Refused));
        assert_eq!(state.narrative.title, "Access Denied");
        assert!(!state.camera_offered);

        state.apply_permission(PermissionState::Denied, Some(DenialReason::Unavailable));
        assert_eq!(state.narrative.title, "Camera Unavailable");
    }
}
