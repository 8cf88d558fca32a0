#![warn(missing_docs)]
//! # dermalens-capture
//!
//! ## Purpose
//! Mediates between camera hardware (or a user-selected file) and the
//! diagnostic submission client.
//!
//! ## Responsibilities
//! - Run the camera permission state machine with ordered constraint fallback.
//! - Own the single live stream and guarantee it is stopped on every exit path.
//! - Normalize live frames and uploaded files into one JPEG payload.
//! - Guard against overlapping submissions.
//! - Expose deterministic synthetic devices for CI and unit tests.
//!
//! ## Data flow
//! [`CaptureController::request_camera_access`] acquires a [`MediaStream`]
//! through [`MediaDevices`] -> [`CaptureController::capture_frame`] or
//! [`CaptureController::ingest_file`] produces a
//! [`dermalens_core::DiagnosticRequest`] -> the caller holds a
//! [`SubmissionGuard`] while the request is in flight.
//!
//! ## Ownership and lifetimes
//! The controller exclusively owns the stream handle. Session state lives
//! behind a mutex that is never held across an `.await`; an acquisition that
//! resolves after `cancel`/`teardown` is detected through a generation counter
//! and its stream is stopped instead of attached.
//!
//! ## Error model
//! Camera acquisition failures are [`PermissionError`] values; frame capture
//! and file ingestion failures are [`CaptureError`] values. Both are
//! recoverable: the file path is always available as a fallback.
//!
//! ## Security and privacy notes
//! Captured images live only in memory and are dropped when a submission
//! finishes, fails, or is cancelled.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dermalens_core::{CoreError, DiagnosticRequest, Frame, ImagePayload};
use thiserror::Error;
use tracing::{debug, info, warn};

mod source;
mod synthetic;

pub use source::{
    CaptureSource, DEFAULT_JPEG_QUALITY, FileSource, LiveStreamSource, encode_jpeg,
};
pub use synthetic::{ScriptedOutcome, StreamLedger, SyntheticMediaDevices, SyntheticStream};

/// Camera permission state of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Nothing requested yet.
    Prompt,
    /// Acquisition in progress.
    Requesting,
    /// Live stream held, or an image was ingested from a file.
    Granted,
    /// Every constraint failed.
    Denied,
}

/// Why camera access ended in [`PermissionState::Denied`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// User or system refused access.
    Refused,
    /// No camera satisfied any constraint.
    Unavailable,
}

/// Preferred camera direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacingMode {
    /// Front-facing camera.
    User,
    /// Rear camera.
    Environment,
}

/// One device-capability request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaConstraint {
    /// Video from a camera facing the given direction.
    Facing(FacingMode),
    /// Video from any camera.
    AnyCamera,
}

impl fmt::Display for MediaConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Facing(FacingMode::User) => f.write_str("video.facingMode=user"),
            Self::Facing(FacingMode::Environment) => f.write_str("video.facingMode=environment"),
            Self::AnyCamera => f.write_str("video=true"),
        }
    }
}

/// Default fallback order: front camera first, then any camera.
pub fn default_constraints() -> Vec<MediaConstraint> {
    vec![
        MediaConstraint::Facing(FacingMode::User),
        MediaConstraint::AnyCamera,
    ]
}

/// Failure reported by a [`MediaDevices`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaAccessError {
    /// Access was refused by the user or the system.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// No device matches the constraint.
    #[error("no matching device: {0}")]
    NoDevice(String),
    /// Any other device failure.
    #[error("media device failure: {0}")]
    Other(String),
}

/// A live device-media stream.
pub trait MediaStream: Send + Sync {
    /// Stable stream identifier.
    fn id(&self) -> &str;

    /// Native resolution as `(width, height)`.
    fn resolution(&self) -> (u32, u32);

    /// Reads the current frame at native resolution.
    ///
    /// # Errors
    /// Returns [`CaptureError::StreamEnded`] once the stream was stopped.
    fn grab_frame(&self, captured_at_ms: u64) -> Result<Frame, CaptureError>;

    /// Stops every underlying hardware track. Must be idempotent.
    fn stop(&self);

    /// Returns `true` until [`MediaStream::stop`] is called.
    fn is_live(&self) -> bool;
}

/// Device-media capability (`getUserMedia` equivalent).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Attempts to open a stream satisfying `constraint`.
    async fn get_user_media(
        &self,
        constraint: &MediaConstraint,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError>;
}

/// [`MediaDevices`] for hosts without a camera. Every constraint fails with
/// [`MediaAccessError::NoDevice`], which leaves the file path as the only
/// capture source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCameraDevices;

#[async_trait]
impl MediaDevices for NoCameraDevices {
    async fn get_user_media(
        &self,
        constraint: &MediaConstraint,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        Err(MediaAccessError::NoDevice(constraint.to_string()))
    }
}

/// How [`CaptureController::cancel`] treats a held stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Leave the scan: stop the stream and return to `Prompt`.
    Abandon,
    /// Discard the pending image and show the live feed again.
    Retake,
}

/// What currently drives the preview surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Nothing to show.
    Empty,
    /// Live feed of the held stream.
    LiveStream {
        /// Stream identifier.
        stream_id: String,
    },
    /// A captured or uploaded image awaiting submission.
    Image {
        /// Image MIME type.
        mime_type: String,
        /// Encoded size in bytes.
        len: usize,
    },
}

/// Capture controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Ordered constraint fallback list.
    pub constraints: Vec<MediaConstraint>,
    /// JPEG quality in `1..=100`.
    pub jpeg_quality: u8,
}

impl CaptureConfig {
    /// Creates validated capture configuration.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidConfig`] for an empty constraint list or
    /// a quality outside `1..=100`.
    pub fn new(constraints: Vec<MediaConstraint>, jpeg_quality: u8) -> Result<Self, CaptureError> {
        if constraints.is_empty() {
            return Err(CaptureError::InvalidConfig(
                "constraint list must not be empty".to_string(),
            ));
        }
        if !(1..=100).contains(&jpeg_quality) {
            return Err(CaptureError::InvalidConfig(format!(
                "jpeg quality {jpeg_quality} is outside 1..=100"
            )));
        }
        Ok(Self {
            constraints,
            jpeg_quality,
        })
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            constraints: default_constraints(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

struct CaptureSession {
    permission: PermissionState,
    denial: Option<DenialReason>,
    stream: Option<Box<dyn MediaStream>>,
    pending_image: Option<ImagePayload>,
    analyzing: bool,
    generation: u64,
}

impl CaptureSession {
    fn new() -> Self {
        Self {
            permission: PermissionState::Prompt,
            denial: None,
            stream: None,
            pending_image: None,
            analyzing: false,
            generation: 0,
        }
    }

    fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            info!(stream_id = stream.id(), "camera stream released");
        }
    }
}

/// Owns one capture session: permission state, live stream, pending image.
pub struct CaptureController {
    devices: Arc<dyn MediaDevices>,
    config: CaptureConfig,
    session: Mutex<CaptureSession>,
}

impl CaptureController {
    /// Creates a controller with the default constraint list.
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self::with_config(devices, CaptureConfig::default())
    }

    /// Creates a controller with caller-provided configuration.
    pub fn with_config(devices: Arc<dyn MediaDevices>, config: CaptureConfig) -> Self {
        Self {
            devices,
            config,
            session: Mutex::new(CaptureSession::new()),
        }
    }

    fn session(&self) -> MutexGuard<'_, CaptureSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the current permission state.
    pub fn permission_state(&self) -> PermissionState {
        self.session().permission
    }

    /// Returns why access was denied, when the state is `Denied`.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        self.session().denial
    }

    /// Returns `true` while a live stream is held.
    pub fn holds_stream(&self) -> bool {
        self.session().stream.is_some()
    }

    /// Returns `true` while an image awaits submission.
    pub fn has_pending_image(&self) -> bool {
        self.session().pending_image.is_some()
    }

    /// Returns `true` while a submission is in flight.
    pub fn is_analyzing(&self) -> bool {
        self.session().analyzing
    }

    /// Returns what drives the preview. A pending image supersedes the stream.
    pub fn preview(&self) -> Preview {
        let session = self.session();
        if let Some(image) = &session.pending_image {
            return Preview::Image {
                mime_type: image.mime_type().to_string(),
                len: image.len(),
            };
        }
        match &session.stream {
            Some(stream) => Preview::LiveStream {
                stream_id: stream.id().to_string(),
            },
            None => Preview::Empty,
        }
    }

    /// Acquires a live stream, trying each configured constraint in order.
    ///
    /// # Errors
    /// - [`PermissionError::AlreadyRequesting`] when an acquisition is pending.
    /// - [`PermissionError::Refused`] when a device reported an explicit denial;
    ///   no further constraints are tried.
    /// - [`PermissionError::Unavailable`] when every constraint failed otherwise.
    /// - [`PermissionError::Cancelled`] when `cancel`/`teardown` ran before the
    ///   acquisition resolved; the late stream is stopped.
    pub async fn request_camera_access(&self) -> Result<(), PermissionError> {
        let generation = {
            let mut session = self.session();
            if session.permission == PermissionState::Requesting {
                return Err(PermissionError::AlreadyRequesting);
            }
            session.release_stream();
            session.permission = PermissionState::Requesting;
            session.denial = None;
            session.generation
        };

        let mut denial = DenialReason::Unavailable;
        let mut acquired = None;
        for (attempt, constraint) in self.config.constraints.iter().enumerate() {
            match self.devices.get_user_media(constraint).await {
                Ok(stream) => {
                    debug!(attempt, %constraint, stream_id = stream.id(), "constraint satisfied");
                    acquired = Some(stream);
                    break;
                }
                Err(MediaAccessError::PermissionDenied(detail)) => {
                    warn!(attempt, %constraint, %detail, "camera access refused");
                    denial = DenialReason::Refused;
                    break;
                }
                Err(error) => {
                    warn!(attempt, %constraint, %error, "constraint failed; trying next");
                }
            }
        }

        let mut session = self.session();
        if session.generation != generation {
            if let Some(stream) = acquired {
                stream.stop();
                info!(stream_id = stream.id(), "late stream stopped after cancellation");
            }
            return Err(PermissionError::Cancelled);
        }

        match acquired {
            Some(stream) => {
                session.release_stream();
                let (width, height) = stream.resolution();
                info!(stream_id = stream.id(), width, height, "camera access granted");
                session.stream = Some(stream);
                session.permission = PermissionState::Granted;
                Ok(())
            }
            None => {
                session.release_stream();
                session.permission = PermissionState::Denied;
                session.denial = Some(denial);
                Err(match denial {
                    DenialReason::Refused => PermissionError::Refused,
                    DenialReason::Unavailable => PermissionError::Unavailable,
                })
            }
        }
    }

    /// Captures the current live frame as the pending image.
    ///
    /// # Errors
    /// - [`CaptureError::Busy`] while a submission is in flight.
    /// - [`CaptureError::NotGranted`] unless the state is `Granted`.
    /// - [`CaptureError::NoActiveStream`] when no stream is held.
    /// - [`CaptureError::Superseded`] when `cancel`, `teardown`, or a file
    ///   ingestion ran while the frame was being encoded.
    /// - Stream, encode, and empty-encode failures.
    pub fn capture_frame(&self) -> Result<DiagnosticRequest, CaptureError> {
        let (source, generation) = {
            let session = self.session();
            if session.analyzing {
                return Err(CaptureError::Busy);
            }
            if session.permission != PermissionState::Granted {
                return Err(CaptureError::NotGranted);
            }
            let stream = session
                .stream
                .as_deref()
                .ok_or(CaptureError::NoActiveStream)?;
            let source =
                LiveStreamSource::grab(stream, unix_timestamp_ms(), self.config.jpeg_quality)?;
            (source, session.generation)
        };

        // Encoding runs without the session lock.
        let payload = source.acquire()?;

        let mut session = self.session();
        if session.generation != generation {
            return Err(CaptureError::Superseded);
        }
        if session.analyzing {
            return Err(CaptureError::Busy);
        }
        debug!(source = source.kind(), len = payload.len(), "frame captured");

        session.pending_image = Some(payload.clone());
        Ok(DiagnosticRequest::from_payload(payload))
    }

    /// Ingests user-selected image bytes as the pending image.
    ///
    /// File upload bypasses camera permission: on success the state is
    /// `Granted` regardless of what it was before. A pending camera
    /// acquisition is invalidated and its stream is stopped when it resolves.
    ///
    /// # Errors
    /// - [`CaptureError::Busy`] while a submission is in flight.
    /// - [`CaptureError::Decode`] when the bytes are not an image.
    pub fn ingest_file(&self, name: &str, bytes: &[u8]) -> Result<DiagnosticRequest, CaptureError> {
        if self.session().analyzing {
            return Err(CaptureError::Busy);
        }

        let source = FileSource::new(name, bytes, unix_timestamp_ms(), self.config.jpeg_quality);
        let payload = source.acquire()?;

        let mut session = self.session();
        if session.analyzing {
            return Err(CaptureError::Busy);
        }
        if session.permission == PermissionState::Requesting {
            info!("file ingested while camera acquisition pending; acquisition abandoned");
        }
        session.generation = session.generation.wrapping_add(1);
        debug!(source = source.kind(), len = payload.len(), "file ingested");
        session.pending_image = Some(payload.clone());
        session.permission = PermissionState::Granted;
        session.denial = None;
        Ok(DiagnosticRequest::from_payload(payload))
    }

    /// Marks the pending image as in flight.
    ///
    /// The returned guard clears the pending image and the in-flight flag when
    /// dropped, whether the submission succeeded, failed, or was abandoned.
    ///
    /// # Errors
    /// Returns [`CaptureError::Busy`] when a submission is already in flight
    /// and [`CaptureError::NothingPending`] when no image is pending.
    pub fn begin_submission(&self) -> Result<SubmissionGuard<'_>, CaptureError> {
        let mut session = self.session();
        if session.analyzing {
            return Err(CaptureError::Busy);
        }
        if session.pending_image.is_none() {
            return Err(CaptureError::NothingPending);
        }
        session.analyzing = true;
        Ok(SubmissionGuard { controller: self })
    }

    /// Cancels the current capture. Idempotent.
    ///
    /// Any pending acquisition is invalidated; its stream is stopped when it
    /// resolves.
    pub fn cancel(&self, mode: CancelMode) {
        let mut session = self.session();
        session.generation = session.generation.wrapping_add(1);
        session.pending_image = None;

        let keep_stream = mode == CancelMode::Retake && session.stream.is_some();
        if keep_stream {
            session.permission = PermissionState::Granted;
            return;
        }

        session.release_stream();
        session.permission = PermissionState::Prompt;
        session.denial = None;
    }

    /// Releases every held resource and resets the session. Idempotent.
    ///
    /// Also runs on drop.
    pub fn teardown(&self) {
        let mut session = self.session();
        session.generation = session.generation.wrapping_add(1);
        session.release_stream();
        session.pending_image = None;
        session.permission = PermissionState::Prompt;
        session.denial = None;
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// In-flight submission marker returned by
/// [`CaptureController::begin_submission`].
pub struct SubmissionGuard<'a> {
    controller: &'a CaptureController,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.controller.session();
        session.analyzing = false;
        session.pending_image = None;
    }
}

/// Camera acquisition errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// An acquisition is already pending.
    #[error("camera access is already being requested")]
    AlreadyRequesting,
    /// User or system refused camera access.
    #[error("camera access was refused")]
    Refused,
    /// No camera satisfied any constraint.
    #[error("camera hardware unavailable")]
    Unavailable,
    /// The session was cancelled before acquisition resolved.
    #[error("camera request cancelled")]
    Cancelled,
}

impl PermissionError {
    /// Returns the denial reason for terminal denials.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            Self::Refused => Some(DenialReason::Refused),
            Self::Unavailable => Some(DenialReason::Unavailable),
            Self::AlreadyRequesting | Self::Cancelled => None,
        }
    }
}

/// Frame capture and file ingestion errors.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Invalid controller configuration.
    #[error("invalid capture config: {0}")]
    InvalidConfig(String),
    /// Capture requires `Granted`.
    #[error("camera permission not granted")]
    NotGranted,
    /// No live stream is held.
    #[error("no active camera stream")]
    NoActiveStream,
    /// The stream was stopped.
    #[error("stream {0} has ended")]
    StreamEnded(String),
    /// A submission is already in flight.
    #[error("a submission is already in flight")]
    Busy,
    /// No image is pending submission.
    #[error("no image pending submission")]
    NothingPending,
    /// The session was cancelled or replaced while the frame was encoded.
    #[error("capture superseded before it completed")]
    Superseded,
    /// Bytes could not be decoded as an image.
    #[error("image decode failure: {0}")]
    Decode(String),
    /// JPEG encoder failure.
    #[error("image encode failure: {0}")]
    Encode(String),
    /// Encoder produced no data.
    #[error("image encoder produced no data")]
    EmptyEncode,
    /// Core model validation failure.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
