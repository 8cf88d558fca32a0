//! Blocking HTTPS transport for the hosted model, driven from a tokio
//! blocking task.

use async_trait::async_trait;
use tracing::debug;

use crate::wire::{GenerateRequest, GenerateResponse};
use crate::{GenerativeTransport, ServiceConfig, ServiceError};

/// Header carrying the api key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// [`GenerativeTransport`] over `ureq`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Creates a transport whose socket timeout matches the service timeout.
    pub fn new(config: &ServiceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(concat!("dermalens/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

#[async_trait]
impl GenerativeTransport for HttpTransport {
    async fn generate(
        &self,
        config: &ServiceConfig,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ServiceError> {
        let url = config.generate_url()?;
        let api_key = config.api_key().to_string();
        let agent = self.agent.clone();
        let body = request.clone();

        debug!(model = config.model(), "posting generateContent");
        tokio::task::spawn_blocking(move || {
            let response = agent
                .post(url.as_str())
                .set(API_KEY_HEADER, &api_key)
                .send_json(&body)
                .map_err(|error| match error {
                    ureq::Error::Status(code, response) => ServiceError::Status {
                        code,
                        body: response.into_string().unwrap_or_default(),
                    },
                    ureq::Error::Transport(transport) => {
                        ServiceError::Transport(transport.to_string())
                    }
                })?;

            response
                .into_json::<GenerateResponse>()
                .map_err(|error| ServiceError::Transport(format!("invalid response body: {error}")))
        })
        .await
        .map_err(|error| ServiceError::Transport(format!("transport task failed: {error}")))?
    }
}
