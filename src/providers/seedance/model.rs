use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jobs::Job;

// Ark (Seedance) content-generation wire types

#[derive(Serialize, Debug)]
pub struct ArkTaskRequest {
    pub model: String,
    pub content: Vec<ArkContent>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArkContent {
    Text { text: String },
    ImageUrl { image_url: ArkImageUrl },
}

#[derive(Serialize, Debug, PartialEq)]
pub struct ArkImageUrl {
    pub url: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ArkCreateResponse {
    Created { id: String },
    Unknown(Value),
}

#[derive(Deserialize, Debug)]
pub struct ArkTaskContent {
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ArkTaskError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ArkTaskResponse {
    Task {
        status: String,
        #[serde(default)]
        content: Option<ArkTaskContent>,
        #[serde(default)]
        error: Option<ArkTaskError>,
    },
    Unknown(Value),
}

/// Seedance takes generation parameters as inline flags on the prompt
pub fn prompt_with_flags(prompt: &str, aspect_ratio: &str, duration: Option<u32>) -> String {
    let duration = duration.unwrap_or(5).clamp(3, 12);
    format!("{} --ratio {} --duration {}", prompt, aspect_ratio, duration)
}

pub fn build_content(prompt: &str, aspect_ratio: &str, duration: Option<u32>, image: Option<&str>) -> Vec<ArkContent> {
    let mut content = vec![ArkContent::Text {
        text: prompt_with_flags(prompt, aspect_ratio, duration),
    }];
    if let Some(url) = image {
        content.push(ArkContent::ImageUrl {
            image_url: ArkImageUrl { url: url.to_string() },
        });
    }
    content
}

pub fn normalize_task(job_id: &str, status: &str, content: Option<ArkTaskContent>, error: Option<ArkTaskError>) -> Job {
    match status.to_ascii_lowercase().as_str() {
        "succeeded" => Job::succeeded(job_id, content.and_then(|c| c.video_url)),
        "failed" | "cancelled" | "canceled" | "expired" => {
            let reason = error.and_then(|e| e.message.or(e.code));
            Job::failed(job_id, reason)
        }
        "queued" => Job::queued(job_id),
        _ => Job::running(job_id),
    }
}
