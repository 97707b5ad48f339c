use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

// Ideogram wire types

#[derive(Serialize, Debug)]
pub struct IdeogramRequest {
    pub image_request: ImageRequest,
}

#[derive(Serialize, Debug)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub model: String,
    pub num_images: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub magic_prompt_option: String,
}

#[derive(Deserialize, Debug)]
pub struct IdeogramImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_image_safe: Option<bool>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum IdeogramResponse {
    Data { data: Vec<IdeogramImage> },
    Unknown(Value),
}

const SUPPORTED_RATIOS: &[&str] = &[
    "1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3", "16:10", "10:16", "3:1", "1:3",
];

/// `16:9` → `ASPECT_16_9`
pub fn ideogram_aspect_ratio(aspect_ratio: &str) -> AppResult<String> {
    if !SUPPORTED_RATIOS.contains(&aspect_ratio) {
        return Err(AppError::validation(format!(
            "Unsupported aspect ratio '{}' for Ideogram, expected one of {:?}",
            aspect_ratio, SUPPORTED_RATIOS
        )));
    }
    Ok(format!("ASPECT_{}", aspect_ratio.replace(':', "_")))
}

/// URLs of images that passed the provider's safety check
pub fn safe_urls(images: Vec<IdeogramImage>) -> Vec<String> {
    images
        .into_iter()
        .filter(|image| image.is_image_safe != Some(false))
        .filter_map(|image| image.url)
        .filter(|url| !url.trim().is_empty())
        .collect()
}
