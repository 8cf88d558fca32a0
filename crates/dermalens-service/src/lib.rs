#![warn(missing_docs)]
//! # dermalens-service
//!
//! ## Purpose
//! Implements the request/response contract with the hosted generative model:
//! skin-image diagnosis and search-augmented chat.
//!
//! ## Responsibilities
//! - Validate service configuration (api key, HTTPS base URL, timeout).
//! - Build `generateContent` requests for diagnosis and chat.
//! - Execute exactly one round trip per call through an injectable
//!   [`GenerativeTransport`], bounded by a timeout and a cancellation token.
//! - Enforce the diagnostic response schema; results are all-or-nothing.
//!
//! ## Data flow
//! [`dermalens_core::DiagnosticRequest`] -> [`build_diagnosis_request`] ->
//! [`GenerativeTransport::generate`] -> response text ->
//! [`dermalens_diagnosis_contract::parse_diagnostic_result`].
//!
//! ## Ownership and lifetimes
//! Clients share configuration and transport through `Arc` so they can be
//! cloned into tasks cheaply.
//!
//! ## Error model
//! Every failure is a [`ServiceError`]. Nothing is retried here; callers own
//! retry policy and may consult [`ServiceError::is_retryable`].
//!
//! ## Security and privacy notes
//! The api key is redacted from `Debug` output and never logged. Images are
//! logged by fingerprint only.
//!
//! ## Example
//! ```rust
//! use dermalens_service::{ConfigurationError, ServiceConfig};
//!
//! assert!(matches!(
//!     ServiceConfig::new("  "),
//!     Err(ConfigurationError::MissingApiKey)
//! ));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dermalens_core::DiagnosticRequest;
use dermalens_diagnosis_contract::{
    CHAT_FALLBACK_REPLY, CHAT_SYSTEM_INSTRUCTION, ChatReply, ChatRole, ChatTurn,
    DIAGNOSIS_INSTRUCTION, DiagnosticResult, SchemaError, diagnostic_response_schema,
    parse_diagnostic_result,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

mod http;
pub mod wire;

pub use http::{API_KEY_HEADER, HttpTransport};
use wire::{Content, GenerateRequest, GenerateResponse, GenerationConfig, Part, Tool};

/// Default hosted model.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default bound on one round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Validated service configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    api_key: String,
    model: String,
    base_url: Url,
    timeout: Duration,
}

impl ServiceConfig {
    /// Creates configuration with default model, base URL, and timeout.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MissingApiKey`] for a blank key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigurationError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigurationError::MissingApiKey);
        }

        Ok(Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: validate_service_endpoint(DEFAULT_BASE_URL)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Overrides the model name.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidModel`] for blank names or names
    /// containing path separators.
    pub fn with_model(mut self, model: impl Into<String>) -> Result<Self, ConfigurationError> {
        let model = model.into().trim().to_string();
        if model.is_empty() || model.contains('/') || model.contains(':') {
            return Err(ConfigurationError::InvalidModel(model));
        }
        self.model = model;
        Ok(self)
    }

    /// Overrides the base URL.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidEndpoint`] unless the URL is HTTPS.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigurationError> {
        self.base_url = validate_service_endpoint(base_url)?;
        Ok(self)
    }

    /// Overrides the round-trip timeout.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidTimeout`] for a zero duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigurationError> {
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Returns the api key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the round-trip timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `{base}/v1beta/models/{model}:generateContent`.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::InvalidEndpoint`] if the joined URL is
    /// malformed.
    pub fn generate_url(&self) -> Result<Url, ConfigurationError> {
        self.base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|error| ConfigurationError::InvalidEndpoint(error.to_string()))
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validates that a service base URL uses HTTPS and normalizes it to end
/// with `/`.
///
/// # Errors
/// Returns [`ConfigurationError::InvalidEndpoint`] for unparsable or non-HTTPS
/// URLs.
pub fn validate_service_endpoint(endpoint: &str) -> Result<Url, ConfigurationError> {
    let mut parsed = Url::parse(endpoint).map_err(|error| {
        ConfigurationError::InvalidEndpoint(format!("invalid service url: {error}"))
    })?;

    if parsed.scheme() != "https" {
        return Err(ConfigurationError::InvalidEndpoint(
            "service endpoint must use https".to_string(),
        ));
    }

    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }

    Ok(parsed)
}

/// Abstract transport to the generative service.
#[async_trait]
pub trait GenerativeTransport: Send + Sync {
    /// Sends one `generateContent` request.
    async fn generate(
        &self,
        config: &ServiceConfig,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError>;
}

/// Builds the diagnosis request: inline image, fixed instruction, and the
/// declared JSON response schema.
pub fn build_diagnosis_request(request: &DiagnosticRequest) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content::with_role(
            "user",
            vec![
                Part::inline(request.mime_type(), request.to_base64()),
                Part::text(DIAGNOSIS_INSTRUCTION),
            ],
        )],
        system_instruction: None,
        tools: Vec::new(),
        generation_config: Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: diagnostic_response_schema(),
        }),
    }
}

/// Builds the chat request: persona, prior turns in order, the new message,
/// and the web-search tool.
pub fn build_chat_request(message: &str, history: &[ChatTurn]) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            Content::with_role(role, vec![Part::text(turn.text.clone())])
        })
        .collect();
    contents.push(Content::with_role("user", vec![Part::text(message)]));

    GenerateRequest {
        contents,
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::text(CHAT_SYSTEM_INSTRUCTION)],
        }),
        tools: vec![Tool::google_search()],
        generation_config: None,
    }
}

/// Sends one request bounded by the configured timeout and `cancel`.
async fn round_trip(
    config: &ServiceConfig,
    transport: &dyn GenerativeTransport,
    request: &GenerateRequest,
    cancel: &CancellationToken,
) -> Result<GenerateResponse, ServiceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServiceError::Cancelled),
        outcome = tokio::time::timeout(config.timeout(), transport.generate(config, request)) => {
            match outcome {
                Ok(response) => response,
                Err(_) => Err(ServiceError::Timeout(config.timeout())),
            }
        }
    }
}

/// Diagnostic Submission Client.
#[derive(Clone)]
pub struct DiagnosticClient {
    config: Arc<ServiceConfig>,
    transport: Arc<dyn GenerativeTransport>,
}

impl DiagnosticClient {
    /// Creates a client over a transport.
    pub fn new(config: Arc<ServiceConfig>, transport: Arc<dyn GenerativeTransport>) -> Self {
        Self { config, transport }
    }

    /// Submits one image and returns a complete, validated result.
    ///
    /// Exactly one round trip is made; nothing is retried.
    ///
    /// # Errors
    /// - [`ServiceError::Schema`] when the response text is empty, malformed,
    ///   or incomplete.
    /// - [`ServiceError::Timeout`] / [`ServiceError::Cancelled`] when the call
    ///   is abandoned.
    /// - Transport and status failures from the transport.
    pub async fn submit(
        &self,
        request: &DiagnosticRequest,
        cancel: &CancellationToken,
    ) -> Result<DiagnosticResult, ServiceError> {
        let fingerprint = request.fingerprint();
        let body = build_diagnosis_request(request);
        let started = Instant::now();
        info!(
            %fingerprint,
            len = request.image_bytes().len(),
            model = self.config.model(),
            "submitting image for analysis"
        );

        let response = round_trip(&self.config, self.transport.as_ref(), &body, cancel)
            .await
            .inspect_err(|error| warn!(%fingerprint, %error, "analysis call failed"))?;

        let text = response.text().ok_or(SchemaError::EmptyResponse)?;
        let result = parse_diagnostic_result(&text)
            .inspect_err(|error| warn!(%fingerprint, %error, "analysis response rejected"))?;

        info!(
            %fingerprint,
            classification = %result.classification,
            severity = result.severity.label(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(result)
    }
}

/// Conversational follow-up client.
#[derive(Clone)]
pub struct ChatClient {
    config: Arc<ServiceConfig>,
    transport: Arc<dyn GenerativeTransport>,
}

impl ChatClient {
    /// Creates a client over a transport.
    pub fn new(config: Arc<ServiceConfig>, transport: Arc<dyn GenerativeTransport>) -> Self {
        Self { config, transport }
    }

    /// Sends one message with caller-supplied history.
    ///
    /// An empty model reply is replaced by [`CHAT_FALLBACK_REPLY`].
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidInput`] for a blank message, plus
    /// transport, status, and timeout failures.
    pub async fn chat(
        &self,
        message: &str,
        history: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> Result<ChatReply, ServiceError> {
        if message.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "chat message is empty".to_string(),
            ));
        }

        let body = build_chat_request(message, history);
        let response = round_trip(&self.config, self.transport.as_ref(), &body, cancel)
            .await
            .inspect_err(|error| warn!(%error, "chat call failed"))?;

        let grounding = response.grounding_references();
        info!(
            history_turns = history.len(),
            citations = grounding.len(),
            "chat reply received"
        );
        Ok(ChatReply {
            text: response
                .text()
                .unwrap_or_else(|| CHAT_FALLBACK_REPLY.to_string()),
            grounding,
        })
    }
}

/// Configuration errors. Fatal at startup; never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No api key configured.
    #[error("service api key is not set")]
    MissingApiKey,
    /// Base URL violates endpoint policy.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Model name is unusable in a request path.
    #[error("invalid model name: {0:?}")]
    InvalidModel(String),
    /// Timeout must be positive.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
}

/// Submission and chat errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration problem discovered at call time.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Caller input rejected before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Network or envelope failure.
    #[error("service transport failure: {0}")]
    Transport(String),
    /// Non-success HTTP status.
    #[error("service returned status {code}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Response failed the diagnostic schema.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// Round trip exceeded the configured timeout.
    #[error("service call timed out after {0:?}")]
    Timeout(Duration),
    /// Caller cancelled the call.
    #[error("service call cancelled")]
    Cancelled,
}

impl ServiceError {
    /// Returns `true` for failures a caller-owned retry policy may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Configuration(_) | Self::InvalidInput(_) | Self::Schema(_) | Self::Cancelled => {
                false
            }
        }
    }
}
