use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::{
    config::ProviderDetail,
    errors::{AppError, AppResult},
    providers::{GenerationRequest, ImageBatch, ImageProvider, http},
};

const PROVIDER_NAME: &str = "Recraft";
const API_KEY_ENV: &str = "RECRAFT_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://external.api.recraft.ai/v1";
pub const DEFAULT_MODEL: &str = "recraftv3";
pub const DEFAULT_STYLE: &str = "realistic_image";

#[derive(Serialize, Debug)]
pub struct RecraftRequest {
    pub prompt: String,
    pub style: String,
    pub size: String,
    pub model: String,
    pub n: u32,
}

#[derive(Deserialize, Debug)]
pub struct RecraftImage {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RecraftResponse {
    Data { data: Vec<RecraftImage> },
    Unknown(Value),
}

/// Recraft image generation
pub struct RecraftProvider {
    config: ProviderDetail,
    client: Client,
}

impl RecraftProvider {
    pub fn new(config: ProviderDetail, client: Client) -> Self {
        Self { config, client }
    }

    fn build_request(&self, request: &GenerationRequest, prompt: &str) -> RecraftRequest {
        RecraftRequest {
            prompt: prompt.to_string(),
            style: request
                .style
                .as_deref()
                .filter(|style| !style.trim().is_empty())
                .unwrap_or(DEFAULT_STYLE)
                .to_string(),
            size: request.size().to_string(),
            model: request.model_or(self.config.model_or(DEFAULT_MODEL)).to_string(),
            n: request.num_images(),
        }
    }
}

#[async_trait]
impl ImageProvider for RecraftProvider {
    fn id(&self) -> &str {
        "recraft"
    }

    fn has_credentials(&self) -> bool {
        self.config.api_key().is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<ImageBatch> {
        let prompt = request.validated_prompt()?;
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;

        let body = self.build_request(request, prompt);
        let model = body.model.clone();

        tracing::info!(provider = "recraft", model = %model, size = %body.size, "Generating Recraft image");

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .post(format!("{}/images/generations", self.config.base_url(DEFAULT_API_BASE)))
                .bearer_auth(api_key)
                .timeout(Duration::from_secs(self.config.timeout_seconds))
                .json(&body),
        )
        .await?;

        match serde_json::from_value::<RecraftResponse>(payload.clone()) {
            Ok(RecraftResponse::Data { data }) => {
                let images: Vec<String> = data
                    .into_iter()
                    .filter_map(|image| image.url)
                    .filter(|url| !url.trim().is_empty())
                    .collect();
                if images.is_empty() {
                    return Err(AppError::provider_error_with_details(
                        502,
                        "Recraft returned no images",
                        payload,
                    ));
                }
                Ok(ImageBatch { images, model })
            }
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let provider = RecraftProvider::new(ProviderDetail::default(), Client::new());
        let request = GenerationRequest::new("lighthouse");
        let body = provider.build_request(&request, "lighthouse");
        assert_eq!(body.size, "1024x1024");
        assert_eq!(body.style, "realistic_image");
        assert_eq!(body.model, "recraftv3");
        assert_eq!(body.n, 1);
    }

    #[test]
    fn test_request_overrides() {
        let mut detail = ProviderDetail::default();
        detail.model = Some("recraft20b".to_string());
        let provider = RecraftProvider::new(detail, Client::new());

        let mut request = GenerationRequest::new("lighthouse");
        request.size = Some("1365x1024".to_string());
        request.style = Some("digital_illustration".to_string());
        let body = provider.build_request(&request, "lighthouse");
        assert_eq!(body.size, "1365x1024");
        assert_eq!(body.style, "digital_illustration");
        assert_eq!(body.model, "recraft20b");
    }
}
