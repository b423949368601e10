use crate::errors::{SessionError, SessionResult};
use crate::models::{SubmitRequest, SubmitResponse};
use async_trait::async_trait;

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> SessionResult<SubmitResponse>;
}

/// Submission gateway over HTTP: `POST <base>/submit`, synchronous job id in
/// the response body. Scheduling and sandboxing behind it are opaque.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn submit(&self, request: &SubmitRequest) -> SessionResult<SubmitResponse> {
        let url = format!("{}/submit", self.base_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(SessionError::Gateway(format!(
                "submission rejected with status {}",
                response.status()
            )));
        }
        let body = response.json::<SubmitResponse>().await?;
        Ok(body)
    }
}
