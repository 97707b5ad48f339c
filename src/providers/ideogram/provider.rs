use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::ProviderDetail,
    errors::{AppError, AppResult},
    providers::{GenerationRequest, ImageBatch, ImageProvider, http},
};
use super::model::*;

const PROVIDER_NAME: &str = "Ideogram";
const API_KEY_ENV: &str = "IDEOGRAM_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://api.ideogram.ai";
pub const DEFAULT_MODEL: &str = "V_2";

/// Ideogram text-to-image
pub struct IdeogramProvider {
    config: ProviderDetail,
    client: Client,
}

impl IdeogramProvider {
    pub fn new(config: ProviderDetail, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl ImageProvider for IdeogramProvider {
    fn id(&self) -> &str {
        "ideogram"
    }

    fn has_credentials(&self) -> bool {
        self.config.api_key().is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<ImageBatch> {
        let prompt = request.validated_prompt()?;
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;

        let model = request.model_or(self.config.model_or(DEFAULT_MODEL)).to_string();
        let body = IdeogramRequest {
            image_request: ImageRequest {
                prompt: prompt.to_string(),
                aspect_ratio: ideogram_aspect_ratio(request.aspect_ratio())?,
                model: model.clone(),
                num_images: request.num_images(),
                style_type: request.style.clone(),
                seed: request.seed,
                magic_prompt_option: "AUTO".to_string(),
            },
        };

        tracing::info!(provider = "ideogram", model = %model, "Generating Ideogram image");

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .post(format!("{}/generate", self.config.base_url(DEFAULT_API_BASE)))
                .header("Api-Key", api_key)
                .timeout(Duration::from_secs(self.config.timeout_seconds))
                .json(&body),
        )
        .await?;

        match serde_json::from_value::<IdeogramResponse>(payload.clone()) {
            Ok(IdeogramResponse::Data { data }) => {
                let images = safe_urls(data);
                if images.is_empty() {
                    return Err(AppError::provider_error_with_details(
                        502,
                        "Ideogram returned no usable images",
                        payload,
                    ));
                }
                Ok(ImageBatch { images, model })
            }
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }
}
