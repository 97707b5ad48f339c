use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::ProviderDetail,
    errors::{AppError, AppResult},
    providers::{GenerationRequest, ImageBatch, ImageProvider, http},
};
use super::model::*;

const PROVIDER_NAME: &str = "Gemini";
const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Google Gemini native image generation
pub struct GeminiProvider {
    config: ProviderDetail,
    client: Client,
}

impl GeminiProvider {
    /// 创建新的Gemini提供商实例
    ///
    /// ## 参数说明
    /// - `config`: Gemini提供商配置，包含API密钥、基础URL等
    /// - `client`: 共享的HTTP客户端
    pub fn new(config: ProviderDetail, client: Client) -> Self {
        Self { config, client }
    }

    fn build_request(request: &GenerationRequest, prompt: &str) -> AppResult<GeminiRequest> {
        let mut parts = vec![GeminiPart::Text { text: prompt.to_string() }];
        for reference in request.references.iter().filter(|r| !r.trim().is_empty()) {
            parts.push(GeminiPart::Inline {
                inline_data: parse_data_url(reference.trim())?,
            });
        }

        Ok(GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: ImageConfig {
                    aspect_ratio: request.aspect_ratio().to_string(),
                },
            },
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn has_credentials(&self) -> bool {
        self.config.api_key().is_some()
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<ImageBatch> {
        let prompt = request.validated_prompt()?;
        let api_key = http::require_key(&self.config, PROVIDER_NAME, API_KEY_ENV)?;

        let model = request.model_or(self.config.model_or(DEFAULT_MODEL)).to_string();
        let body = Self::build_request(request, prompt)?;
        let url = http::endpoint_url(
            PROVIDER_NAME,
            &self.config.base_url(DEFAULT_API_BASE),
            &["models", &format!("{}:generateContent", model)],
        )?;

        tracing::info!(provider = "gemini", model = %model, references = request.references.len(), "Generating Gemini image");

        let payload = http::send_json(
            PROVIDER_NAME,
            self.client
                .post(url)
                .header("x-goog-api-key", api_key)
                .timeout(Duration::from_secs(self.config.timeout_seconds))
                .json(&body),
        )
        .await?;

        match serde_json::from_value::<GeminiResponse>(payload.clone()) {
            Ok(GeminiResponse::Candidates { candidates }) => {
                let images = extract_images(&candidates);
                if images.is_empty() {
                    let finish_reason = candidates
                        .first()
                        .and_then(|c| c.finish_reason.clone())
                        .unwrap_or_else(|| "unknown".to_string());
                    return Err(AppError::provider_error_with_details(
                        502,
                        format!("Gemini returned no image (finish reason: {})", finish_reason),
                        payload,
                    ));
                }
                Ok(ImageBatch { images, model })
            }
            Ok(GeminiResponse::Blocked { prompt_feedback }) => Err(AppError::provider_error_with_details(
                400,
                format!(
                    "Gemini blocked the prompt ({})",
                    prompt_feedback.block_reason.as_deref().unwrap_or("no reason given")
                ),
                payload,
            )),
            _ => Err(http::unrecognized(PROVIDER_NAME, payload)),
        }
    }
}
