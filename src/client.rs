//! HTTP client for a running proxy.
//!
//! [`RemoteJobProvider`] lets [`crate::jobs::JobPoller`] drive jobs that live
//! behind the proxy rather than in-process.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    errors::{AppError, AppResult},
    jobs::{AssetKind, GeneratedAsset, Job, JobStatus, JobTicket, PollPolicy},
    providers::{GenerationRequest, JobProvider, http},
};

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    details: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ImagesResponse {
    images: Vec<String>,
    model: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct JobStatusResponse {
    job_id: String,
    status: JobStatus,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Typed client for the proxy routes
#[derive(Clone, Debug)]
pub struct ProxyClient {
    base_url: String,
    http: Client,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        http::endpoint_url("proxy", &self.base_url, segments)
    }

    /// `POST /api/images/{provider}`
    pub async fn generate_images(&self, provider: &str, request: &GenerationRequest) -> AppResult<Vec<GeneratedAsset>> {
        let body: ImagesResponse = self
            .send(self.http.post(self.url(&["api", "images", provider])?).json(request))
            .await?;

        Ok(body
            .images
            .iter()
            .map(|url| GeneratedAsset::from_url(url, request, &body.model, AssetKind::Image))
            .collect())
    }

    /// `POST /api/jobs/{provider}`
    pub async fn create_job(&self, provider: &str, request: &GenerationRequest) -> AppResult<JobTicket> {
        self.send(self.http.post(self.url(&["api", "jobs", provider])?).json(request))
            .await
    }

    /// `GET /api/jobs/{provider}/{job_id}`
    pub async fn job_status(&self, provider: &str, job_id: &str) -> AppResult<Job> {
        let body: JobStatusResponse = self
            .send(self.http.get(self.url(&["api", "jobs", provider, job_id])?))
            .await?;

        Ok(Job {
            id: body.job_id,
            status: body.status,
            result_url: body.result_url,
            error: body.error,
        })
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::network(format!("Failed to reach proxy: {}", e)))?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorEnvelope>(&bytes) {
                Ok(envelope) => AppError::from_envelope(
                    status.as_u16(),
                    &envelope.error.kind,
                    envelope.error.message,
                    envelope.error.details,
                ),
                Err(_) => AppError::provider_error_with_details(
                    status.as_u16(),
                    format!("Proxy returned status {}", status.as_u16()),
                    Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                ),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::provider_error_with_details(
                502,
                format!("Unexpected proxy response: {}", e),
                Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            )
        })
    }
}

/// A job provider reached through the proxy
pub struct RemoteJobProvider {
    client: ProxyClient,
    provider: String,
    kind: AssetKind,
    policy: PollPolicy,
}

impl RemoteJobProvider {
    pub fn new(client: ProxyClient, provider: impl Into<String>, kind: AssetKind, policy: PollPolicy) -> Self {
        Self {
            client,
            provider: provider.into(),
            kind,
            policy,
        }
    }
}

#[async_trait]
impl JobProvider for RemoteJobProvider {
    fn id(&self) -> &str {
        &self.provider
    }

    fn asset_kind(&self) -> AssetKind {
        self.kind
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    async fn submit(&self, request: &GenerationRequest) -> AppResult<JobTicket> {
        self.client.create_job(&self.provider, request).await
    }

    async fn status(&self, job_id: &str) -> AppResult<Job> {
        self.client.job_status(&self.provider, job_id).await
    }
}
