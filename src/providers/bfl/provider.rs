use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::ProviderDetail,
    errors::AppResult,
    jobs::{AssetKind, Job, JobTicket, PollPolicy},
    providers::{GenerationRequest, JobProvider, http},
};
use super::model::*;

const PROVIDER_NAME: &str = "Flux";
const API_KEY_ENV: &str = "BFL_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://api.bfl.ai";
pub const DEFAULT_MODEL: &str = "flux-pro-1.1";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 180;

/// Black Forest Labs Flux image jobs
pub struct BflProvider {
    config: ProviderDetail,
    client: Client,
}

impl BflProvider {
    pub fn new(config: ProviderDetail, client: Client) -> Self {
        Self { config, client }
    }

    fn base_url(&self) -> String {
        self.config.base_url(DEFAULT_API_BASE)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    fn build_request(request: &GenerationRequest, prompt: &str) -> FluxRequest {
        FluxRequest {
            prompt: prompt.to_string(),
            aspect_ratio: request.aspect_ratio().to_string(),
            input_image: request.first_reference().map(str::to_string),
            seed: request.seed,
            output_format: "jpeg".to_string(),
            safety_tolerance: 2,
        }
    }
}

#[async_trait]
impl JobProvider for BflProvider {
    fn id(&self) -> &str {
        "bfl"
    }

    fn asset_kind(&self) -> AssetKind {
        AssetKind::Image
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_secs(
            self.config.poll_interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            self.config.poll_timeout_seconds.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
        )
    }

    fn has_credentials(&self) -> bool {
        self.config.api_key().is_some()
    }

    async fn submit(&self, request: &GenerationRequest) -> AppResult<JobTicket> {
        let prompt = request.validated_prompt()?;
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;

        let model = request.model_or(self.config.model_or(DEFAULT_MODEL)).to_string();
        let body = Self::build_request(request, prompt);
        let url = http::endpoint_url(PROVIDER_NAME, &self.base_url(), &["v1", &model])?;

        tracing::info!(provider = "bfl", model = %model, "Submitting Flux job");

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .post(url)
                .header("x-key", api_key)
                .timeout(self.timeout())
                .json(&body),
        )
        .await?;

        match serde_json::from_value::<FluxSubmitResponse>(payload.clone()) {
            Ok(FluxSubmitResponse::Accepted { id, polling_url }) => Ok(JobTicket {
                job_id: id,
                model,
                polling_url,
            }),
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }

    async fn status(&self, job_id: &str) -> AppResult<Job> {
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;
        let url = format!("{}/v1/get_result", self.base_url());

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .get(&url)
                .query(&[("id", job_id)])
                .header("x-key", api_key)
                .timeout(self.timeout()),
        )
        .await?;

        match serde_json::from_value::<FluxStatusResponse>(payload.clone()) {
            Ok(FluxStatusResponse::Known { status, result, details }) => {
                Ok(normalize_status(job_id, &status, result, details))
            }
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }
}
