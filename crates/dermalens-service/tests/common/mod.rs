//! Shared fixtures for service integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dermalens_core::{DiagnosticRequest, ImagePayload, MIME_JPEG};
use dermalens_service::wire::{
    Candidate, Content, GenerateRequest, GenerateResponse, GroundingChunk, GroundingMetadata,
    Part, WebSource,
};
use dermalens_service::{GenerativeTransport, ServiceConfig, ServiceError};

/// Mild Acne fixture as returned by the service.
#[allow(dead_code)]
pub const MILD_ACNE: &str =
    include_str!("../../../../contracts/fixtures/diagnostic-result.valid.json");

/// Scripted reply of [`ScriptedTransport`].
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    /// Candidate with the given text.
    Text(String),
    /// Candidate with text and cited web sources.
    Grounded(String, Vec<(String, String)>),
    /// Response with no candidates.
    Empty,
    /// Transport failure.
    Fail(String),
    /// Never resolves.
    Hang,
}

/// Transport that records every request and answers from a script.
#[derive(Debug)]
pub struct ScriptedTransport {
    reply: Reply,
    requests: Mutex<Vec<GenerateRequest>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().expect("request log lock").clone()
    }
}

fn candidate(text: &str, metadata: Option<GroundingMetadata>) -> GenerateResponse {
    GenerateResponse {
        candidates: vec![Candidate {
            content: Some(Content::with_role("model", vec![Part::text(text)])),
            grounding_metadata: metadata,
        }],
    }
}

#[async_trait]
impl GenerativeTransport for ScriptedTransport {
    async fn generate(
        &self,
        _config: &ServiceConfig,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError> {
        self.requests
            .lock()
            .expect("request log lock")
            .push(request.clone());

        match &self.reply {
            Reply::Text(text) => Ok(candidate(text, None)),
            Reply::Grounded(text, sources) => Ok(candidate(
                text,
                Some(GroundingMetadata {
                    grounding_chunks: sources
                        .iter()
                        .map(|(uri, title)| GroundingChunk {
                            web: Some(WebSource {
                                uri: uri.clone(),
                                title: Some(title.clone()),
                            }),
                        })
                        .collect(),
                }),
            )),
            Reply::Empty => Ok(GenerateResponse::default()),
            Reply::Fail(detail) => Err(ServiceError::Transport(detail.clone())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Config with a short timeout for hang tests.
#[allow(dead_code)]
pub fn config() -> Arc<ServiceConfig> {
    Arc::new(
        ServiceConfig::new("test-key")
            .and_then(|config| config.with_timeout(Duration::from_millis(50)))
            .expect("config should build"),
    )
}

/// Small JPEG-tagged request.
#[allow(dead_code)]
pub fn image_request() -> DiagnosticRequest {
    DiagnosticRequest::from_payload(
        ImagePayload::new(vec![0xff, 0xd8, 0xff, 0xe0], MIME_JPEG).expect("payload"),
    )
}
