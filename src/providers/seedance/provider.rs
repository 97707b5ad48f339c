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

const PROVIDER_NAME: &str = "Seedance";
const API_KEY_ENV: &str = "ARK_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://ark.cn-beijing.volces.com/api/v3";
pub const DEFAULT_MODEL: &str = "seedance-1-0-pro-250528";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Seedance video tasks on the Ark platform
pub struct SeedanceProvider {
    config: ProviderDetail,
    client: Client,
}

impl SeedanceProvider {
    pub fn new(config: ProviderDetail, client: Client) -> Self {
        Self { config, client }
    }

    fn tasks_url(&self) -> String {
        format!("{}/contents/generations/tasks", self.config.base_url(DEFAULT_API_BASE))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }
}

#[async_trait]
impl JobProvider for SeedanceProvider {
    fn id(&self) -> &str {
        "seedance"
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

        let model = request.model_or(self.config.model_or(DEFAULT_MODEL)).to_string();
        let body = ArkTaskRequest {
            model: model.clone(),
            content: build_content(prompt, request.aspect_ratio(), request.duration, request.first_reference()),
        };

        tracing::info!(provider = "seedance", model = %model, "Submitting Seedance task");

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .post(self.tasks_url())
                .bearer_auth(api_key)
                .timeout(self.timeout())
                .json(&body),
        )
        .await?;

        match serde_json::from_value::<ArkCreateResponse>(payload.clone()) {
            Ok(ArkCreateResponse::Created { id }) => Ok(JobTicket {
                job_id: id,
                model,
                polling_url: None,
            }),
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }

    async fn status(&self, job_id: &str) -> AppResult<Job> {
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;
        let url = http::endpoint_url(
            PROVIDER_NAME,
            &self.config.base_url(DEFAULT_API_BASE),
            &["contents", "generations", "tasks", job_id],
        )?;

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .get(url)
                .bearer_auth(api_key)
                .timeout(self.timeout()),
        )
        .await?;

        match serde_json::from_value::<ArkTaskResponse>(payload.clone()) {
            Ok(ArkTaskResponse::Task { status, content, error }) => {
                Ok(normalize_task(job_id, &status, content, error))
            }
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }
}
