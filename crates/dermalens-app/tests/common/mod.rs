//! Shared fixtures for app integration tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dermalens_app::{AppConfig, ChatFlow, ScanWorkflow};
use dermalens_capture::SyntheticMediaDevices;
use dermalens_service::wire::{Candidate, Content, GenerateRequest, GenerateResponse, Part};
use dermalens_service::{GenerativeTransport, ServiceConfig, ServiceError};
use dermalens_ui::DiagnosisView;

/// Mild Acne fixture as returned by the service.
#[allow(dead_code)]
pub const MILD_ACNE: &str =
    include_str!("../../../../contracts/fixtures/diagnostic-result.valid.json");

/// One scripted service reply.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Candidate with the given text.
    Text(String),
    /// Response with no candidates.
    Empty,
    /// Transport failure.
    Fail(String),
    /// Never resolves.
    Hang,
}

/// Transport answering each call with the next scripted reply.
#[derive(Debug)]
pub struct QueuedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

#[allow(dead_code)]
impl QueuedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().expect("request log lock").clone()
    }
}

#[async_trait]
impl GenerativeTransport for QueuedTransport {
    async fn generate(
        &self,
        _config: &ServiceConfig,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError> {
        self.requests
            .lock()
            .expect("request log lock")
            .push(request.clone());
        let reply = self.replies.lock().expect("reply lock").pop_front();

        match reply {
            Some(Reply::Text(text)) => Ok(GenerateResponse {
                candidates: vec![Candidate {
                    content: Some(Content::with_role("model", vec![Part::text(text)])),
                    grounding_metadata: None,
                }],
            }),
            Some(Reply::Empty) => Ok(GenerateResponse::default()),
            Some(Reply::Fail(detail)) => Err(ServiceError::Transport(detail)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ServiceError::Transport("script exhausted".to_string())),
        }
    }
}

/// Configuration with only an api key set.
#[allow(dead_code)]
pub fn config() -> AppConfig {
    AppConfig::from_lookup(|name| (name == "DERMALENS_API_KEY").then(|| "test-key".to_string()))
        .expect("config should build")
}

/// Scan workflow over synthetic devices and scripted replies.
#[allow(dead_code)]
pub fn scan_workflow(
    devices: SyntheticMediaDevices,
    replies: impl IntoIterator<Item = Reply>,
) -> (
    ScanWorkflow,
    DiagnosisView,
    Arc<SyntheticMediaDevices>,
    Arc<QueuedTransport>,
) {
    let devices = Arc::new(devices);
    let transport = QueuedTransport::new(replies);
    let (workflow, view) = config().scan_workflow(devices.clone(), transport.clone());
    (workflow, view, devices, transport)
}

/// Chat flow over scripted replies.
#[allow(dead_code)]
pub fn chat_flow(replies: impl IntoIterator<Item = Reply>) -> (ChatFlow, Arc<QueuedTransport>) {
    let transport = QueuedTransport::new(replies);
    (config().chat_flow(transport.clone()), transport)
}

/// Encodes a solid-color PNG used as an uploaded gallery image.
#[allow(dead_code)]
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([180, 120, 100, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png fixture should encode");
    bytes.into_inner()
}
