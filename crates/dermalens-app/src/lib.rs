#![warn(missing_docs)]
//! # dermalens-app
//!
//! ## Purpose
//! Orchestrates capture, diagnostic submission, the latest-diagnosis
//! container, and chat for `dermalens`.
//!
//! ## Responsibilities
//! - Read runtime configuration from the environment once at startup.
//! - Drive one scan from capture to a published result or a reset screen.
//! - Keep the chat transcript and the chat client in step.
//! - Install structured logging and redact secrets from error text.
//!
//! ## Data flow
//! [`AppConfig`] -> [`ScanWorkflow`] (capture -> submission guard -> service
//! round trip -> publish) and [`ChatFlow`] (transcript -> chat client ->
//! transcript).
//!
//! ## Ownership and lifetimes
//! The capture controller is shared through `Arc` so a second task can cancel
//! a pending camera request. Screen state and the diagnosis publisher are
//! owned by the workflow and mutated through `&mut self` only.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Every scan ends with
//! exactly one outcome: a published result or an error with the screen reset.
//!
//! ## Security and privacy notes
//! - The api key is never logged and is redacted from `Debug` output.
//! - [`redact_sensitive`] strips key/token markers from text before it is
//!   logged or printed.

use std::path::PathBuf;

use dermalens_capture::{CaptureError, PermissionError};
use dermalens_service::{ConfigurationError, ServiceError};
use dermalens_ui::UiError;
use thiserror::Error;

mod config;
mod logging;
mod workflow;

pub use config::{
    API_KEY_VARS, AppConfig, BASE_URL_VAR, DEFAULT_LOG_FILTER, LOG_VAR, MODEL_VAR, TIMEOUT_VAR,
};
pub use logging::{LogFormatter, init_logging};
pub use workflow::{ChatFlow, ScanWorkflow};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("DERMALENS_VERSION");

const REDACTED: &str = "<redacted>";

const SECRET_MARKERS: [&str; 5] = ["key", "token", "secret", "password", "authorization"];

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Redacts values following common secret markers.
///
/// Handles `marker=value`, `marker: value`, and `Bearer value` forms, so
/// `x-goog-api-key: AIza...` and `?key=AIza...` both lose their values.
pub fn redact_sensitive(input: &str) -> String {
    let mut redact_next = false;
    let mut output = String::with_capacity(input.len());
    for piece in input.split_inclusive(char::is_whitespace) {
        let word = piece.trim_end_matches(char::is_whitespace);
        let separator = &piece[word.len()..];

        if redact_next && !word.is_empty() {
            redact_next = word.eq_ignore_ascii_case("bearer");
            output.push_str(REDACTED);
        } else {
            let (redacted, next) = redact_word(word);
            redact_next = redact_next || next;
            output.push_str(&redacted);
        }
        output.push_str(separator);
    }
    output
}

/// Redacts one word; the flag asks for the following word to be redacted.
fn redact_word(word: &str) -> (String, bool) {
    let lower = word.to_ascii_lowercase();
    if lower == "bearer" {
        return (word.to_string(), true);
    }

    // Earliest marker occurrence followed by a separator wins.
    let after = SECRET_MARKERS
        .iter()
        .flat_map(|&marker| {
            lower
                .match_indices(marker)
                .map(move |(position, _)| position + marker.len())
        })
        .filter(|&after| matches!(lower.as_bytes().get(after).copied(), Some(b'=' | b':')))
        .min();
    let Some(after) = after else {
        return (word.to_string(), false);
    };

    // Separators are ASCII, so byte offsets match between both strings.
    let cut = after + 1;
    let value = &lower[cut..];
    if value.is_empty() {
        return (word.to_string(), true);
    }
    (format!("{}{REDACTED}", &word[..cut]), value == "bearer")
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Startup configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Camera access failed.
    #[error("camera error: {0}")]
    Permission(#[from] PermissionError),
    /// Frame capture or file ingestion failed.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Diagnostic submission or chat failed.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    /// Interaction rejected by screen state.
    #[error("ui error: {0}")]
    Ui(#[from] UiError),
    /// Image file could not be read.
    #[error("cannot read image {path}: {source}")]
    ReadImage {
        /// Path given on the command line.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Logging could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
    /// Result could not be rendered.
    #[error("output error: {0}")]
    Output(String),
}

impl AppError {
    /// Returns `true` when the user can fix the failure by retrying the same
    /// action, for example after a network blip.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service(error) => error.is_retryable(),
            Self::Permission(PermissionError::Cancelled) => true,
            _ => false,
        }
    }
}
