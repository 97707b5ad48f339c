use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::{
    config::ProviderDetail,
    errors::{AppError, AppResult},
    jobs::{AssetKind, Job, JobTicket, PollPolicy},
    providers::{GenerationRequest, JobProvider, http},
};
use super::model::*;

const PROVIDER_NAME: &str = "Runway";
const API_KEY_ENV: &str = "RUNWAY_API_KEY";
const API_VERSION: &str = "2024-11-06";
pub const DEFAULT_API_BASE: &str = "https://api.dev.runwayml.com";
pub const DEFAULT_IMAGE_MODEL: &str = "gen4_turbo";
pub const DEFAULT_TEXT_MODEL: &str = "veo3";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Runway video tasks
pub struct RunwayProvider {
    config: ProviderDetail,
    client: Client,
}

impl RunwayProvider {
    pub fn new(config: ProviderDetail, client: Client) -> Self {
        Self { config, client }
    }

    fn base_url(&self) -> String {
        self.config.base_url(DEFAULT_API_BASE)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Image-to-video when a reference is supplied, text-to-video otherwise
    fn build_body(&self, request: &GenerationRequest, prompt: &str) -> AppResult<(&'static str, String, Value)> {
        let ratio = runway_ratio(request.aspect_ratio());
        let duration = runway_duration(request.duration);

        let (endpoint, model, body) = match request.first_reference() {
            Some(image) => {
                let model = request.model_or(self.config.model_or(DEFAULT_IMAGE_MODEL)).to_string();
                let body = serde_json::to_value(ImageToVideoRequest {
                    model: model.clone(),
                    prompt_image: image.to_string(),
                    prompt_text: prompt.to_string(),
                    ratio,
                    duration,
                    seed: request.seed,
                });
                ("image_to_video", model, body)
            }
            None => {
                let model = request.model_or(DEFAULT_TEXT_MODEL).to_string();
                let body = serde_json::to_value(TextToVideoRequest {
                    model: model.clone(),
                    prompt_text: prompt.to_string(),
                    ratio,
                    duration,
                    seed: request.seed,
                });
                ("text_to_video", model, body)
            }
        };

        let body = body.map_err(|e| AppError::internal(format!("Failed to encode Runway request: {}", e)))?;
        Ok((endpoint, model, body))
    }
}

#[async_trait]
impl JobProvider for RunwayProvider {
    fn id(&self) -> &str {
        "runway"
    }

    fn asset_kind(&self) -> AssetKind {
        AssetKind::Video
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

        let (endpoint, model, body) = self.build_body(request, prompt)?;
        let url = format!("{}/v1/{}", self.base_url(), endpoint);

        tracing::info!(provider = "runway", model = %model, endpoint, "Submitting Runway task");

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .post(&url)
                .bearer_auth(api_key)
                .header("X-Runway-Version", API_VERSION)
                .timeout(self.timeout())
                .json(&body),
        )
        .await?;

        match serde_json::from_value::<RunwayCreateResponse>(payload.clone()) {
            Ok(RunwayCreateResponse::Created { id }) => Ok(JobTicket {
                job_id: id,
                model,
                polling_url: None,
            }),
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }

    async fn status(&self, job_id: &str) -> AppResult<Job> {
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;
        let url = http::endpoint_url(PROVIDER_NAME, &self.base_url(), &["v1", "tasks", job_id])?;

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .get(url)
                .bearer_auth(api_key)
                .header("X-Runway-Version", API_VERSION)
                .timeout(self.timeout()),
        )
        .await?;

        match serde_json::from_value::<RunwayTaskResponse>(payload.clone()) {
            Ok(RunwayTaskResponse::Task { status, output, failure, failure_code }) => {
                Ok(normalize_task(job_id, &status, output, failure, failure_code))
            }
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }
}
