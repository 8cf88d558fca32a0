//! Environment-driven runtime configuration.

use std::sync::Arc;
use std::time::Duration;

use dermalens_capture::{CaptureConfig, CaptureController, MediaDevices};
use dermalens_service::{
    ChatClient, ConfigurationError, DiagnosticClient, GenerativeTransport, ServiceConfig,
};
use dermalens_ui::{DiagnosisView, latest_diagnosis};

use crate::workflow::{ChatFlow, ScanWorkflow};

/// Api key variables, in lookup order.
pub const API_KEY_VARS: [&str; 3] = ["DERMALENS_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Model override.
pub const MODEL_VAR: &str = "DERMALENS_MODEL";

/// Base URL override; must be HTTPS.
pub const BASE_URL_VAR: &str = "DERMALENS_BASE_URL";

/// Round-trip timeout in whole seconds.
pub const TIMEOUT_VAR: &str = "DERMALENS_TIMEOUT_SECS";

/// `tracing-subscriber` filter directive.
pub const LOG_VAR: &str = "DERMALENS_LOG";

/// Filter used when [`LOG_VAR`] is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Generative service settings.
    pub service: Arc<ServiceConfig>,
    /// Capture controller settings.
    pub capture: CaptureConfig,
    /// Log filter directive.
    pub log_filter: String,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::MissingApiKey`] when no api key variable
    /// is set, plus endpoint, model, and timeout validation failures.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = API_KEY_VARS
            .iter()
            .find_map(|name| read(*name))
            .ok_or(ConfigurationError::MissingApiKey)?;

        let mut service = ServiceConfig::new(api_key)?;
        if let Some(model) = read(MODEL_VAR) {
            service = service.with_model(model)?;
        }
        if let Some(base_url) = read(BASE_URL_VAR) {
            service = service.with_base_url(&base_url)?;
        }
        if let Some(seconds) = read(TIMEOUT_VAR) {
            let seconds: u64 = seconds
                .trim()
                .parse()
                .map_err(|_| ConfigurationError::InvalidTimeout)?;
            service = service.with_timeout(Duration::from_secs(seconds))?;
        }

        Ok(Self {
            service: Arc::new(service),
            capture: CaptureConfig::default(),
            log_filter: read(LOG_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    /// Wires a scan workflow over `devices` and `transport`, returning it with
    /// a view on the latest diagnosis.
    pub fn scan_workflow(
        &self,
        devices: Arc<dyn MediaDevices>,
        transport: Arc<dyn GenerativeTransport>,
    ) -> (ScanWorkflow, DiagnosisView) {
        let capture = Arc::new(CaptureController::with_config(devices, self.capture.clone()));
        let client = DiagnosticClient::new(self.service.clone(), transport);
        let (publisher, view) = latest_diagnosis();
        (ScanWorkflow::new(capture, client, publisher), view)
    }

    /// Wires a chat flow over `transport`.
    pub fn chat_flow(&self, transport: Arc<dyn GenerativeTransport>) -> ChatFlow {
        ChatFlow::new(ChatClient::new(self.service.clone(), transport))
    }
}
