pub mod bfl;
pub mod gemini;
pub mod http;
pub mod ideogram;
pub mod recraft;
pub mod registry;
pub mod runway;
pub mod seedance;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AppError, AppResult},
    jobs::{AssetKind, Job, JobTicket, PollPolicy},
};

// Re-export registry for easier access
pub use registry::ProviderRegistry;

pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
const MAX_IMAGES_PER_REQUEST: u32 = 4;

/// Request body accepted by every generation route
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_images: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Input images, either URLs or `data:` URLs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// The trimmed prompt, or a validation error when missing or blank
    pub fn validated_prompt(&self) -> AppResult<&str> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .ok_or_else(|| AppError::validation("Prompt is required"))
    }

    pub fn model_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_blank(self.model.as_deref()).unwrap_or(fallback)
    }

    pub fn size(&self) -> &str {
        non_blank(self.size.as_deref()).unwrap_or(DEFAULT_IMAGE_SIZE)
    }

    pub fn aspect_ratio(&self) -> &str {
        non_blank(self.aspect_ratio.as_deref()).unwrap_or(DEFAULT_ASPECT_RATIO)
    }

    pub fn num_images(&self) -> u32 {
        self.num_images.unwrap_or(1).clamp(1, MAX_IMAGES_PER_REQUEST)
    }

    pub fn first_reference(&self) -> Option<&str> {
        self.references
            .iter()
            .map(|reference| reference.trim())
            .find(|reference| !reference.is_empty())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Vendor job ids are plain identifiers: ASCII alphanumerics, `-` and `_`
pub fn validate_job_id(job_id: &str) -> AppResult<&str> {
    if job_id.is_empty() {
        return Err(AppError::validation("Job id is required"));
    }
    if !job_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return Err(AppError::validation(format!("Invalid job id '{}'", job_id)));
    }
    Ok(job_id)
}

/// Result of a synchronous image generation
#[derive(Debug, Clone, Serialize)]
pub struct ImageBatch {
    /// Image URLs or `data:` URLs
    pub images: Vec<String>,
    pub model: String,
}

/// Providers that answer a generation request in a single call
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn id(&self) -> &str;

    fn has_credentials(&self) -> bool;

    async fn generate(&self, request: &GenerationRequest) -> AppResult<ImageBatch>;
}

/// Providers that accept a job and complete it later
///
/// Implemented both by in-process vendor adapters and by
/// [`crate::client::RemoteJobProvider`], so the poller can drive either.
#[async_trait]
pub trait JobProvider: Send + Sync {
    fn id(&self) -> &str;

    fn asset_kind(&self) -> AssetKind;

    fn poll_policy(&self) -> PollPolicy;

    fn has_credentials(&self) -> bool {
        true
    }

    /// Create the job upstream
    async fn submit(&self, request: &GenerationRequest) -> AppResult<JobTicket>;

    /// One status check, normalized
    async fn status(&self, job_id: &str) -> AppResult<Job>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_validation() {
        assert!(GenerationRequest::default().validated_prompt().is_err());
        assert!(GenerationRequest::new("").validated_prompt().is_err());
        assert!(GenerationRequest::new(" \n\t ").validated_prompt().is_err());
        assert_eq!(GenerationRequest::new("  sunset ").validated_prompt().unwrap(), "sunset");
    }

    #[test]
    fn test_job_id_validation() {
        for id in ["job-1", "cgt-20250601", "f3c1a2b4_9d", "8d6a1e0c-7b52-4f0e-9b1a-2a7f5d1c3e44"] {
            assert_eq!(validate_job_id(id).unwrap(), id);
        }
        for id in ["", "..", "../../v1/organization", "a/b", "a?b=c", "a%2Fb", "job 1", "a#b"] {
            assert!(matches!(validate_job_id(id), Err(AppError::ValidationError(_))), "accepted {id:?}");
        }
    }

    #[test]
    fn test_defaults() {
        let request = GenerationRequest::new("cat");
        assert_eq!(request.size(), "1024x1024");
        assert_eq!(request.aspect_ratio(), "1:1");
        assert_eq!(request.num_images(), 1);
        assert_eq!(request.model_or("fallback"), "fallback");
        assert!(request.first_reference().is_none());
    }

    #[test]
    fn test_num_images_clamped() {
        let mut request = GenerationRequest::new("cat");
        request.num_images = Some(0);
        assert_eq!(request.num_images(), 1);
        request.num_images = Some(12);
        assert_eq!(request.num_images(), 4);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let request: GenerationRequest = serde_json::from_value(serde_json::json!({
            "prompt": "a fox",
            "aspectRatio": "16:9",
            "numImages": 2,
            "references": ["https://example.com/a.png"],
            "ownerId": "u-1"
        }))
        .unwrap();
        assert_eq!(request.aspect_ratio(), "16:9");
        assert_eq!(request.num_images(), 2);
        assert_eq!(request.first_reference(), Some("https://example.com/a.png"));
        assert_eq!(request.owner_id.as_deref(), Some("u-1"));
    }
}
