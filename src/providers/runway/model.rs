use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jobs::Job;

// Runway wire types

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ImageToVideoRequest {
    pub model: String,
    pub prompt_image: String,
    pub prompt_text: String,
    pub ratio: String,
    pub duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TextToVideoRequest {
    pub model: String,
    pub prompt_text: String,
    pub ratio: String,
    pub duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RunwayCreateResponse {
    Created { id: String },
    Unknown(Value),
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RunwayTaskResponse {
    Task {
        status: String,
        #[serde(default)]
        output: Option<Vec<String>>,
        #[serde(default)]
        failure: Option<String>,
        #[serde(default, rename = "failureCode")]
        failure_code: Option<String>,
    },
    Unknown(Value),
}

/// Map an aspect ratio onto one of Runway's pixel ratios.
///
/// Values already in pixel form (`1280:720`) pass through.
pub fn runway_ratio(aspect_ratio: &str) -> String {
    let mapped = match aspect_ratio {
        "16:9" => "1280:720",
        "9:16" => "720:1280",
        "1:1" => "960:960",
        "4:3" => "1104:832",
        "3:4" => "832:1104",
        "21:9" => "1584:672",
        other => other,
    };
    mapped.to_string()
}

/// Runway only renders 5 or 10 second clips
pub fn runway_duration(requested: Option<u32>) -> u32 {
    match requested {
        Some(seconds) if seconds > 5 => 10,
        _ => 5,
    }
}

pub fn normalize_task(
    job_id: &str,
    status: &str,
    output: Option<Vec<String>>,
    failure: Option<String>,
    failure_code: Option<String>,
) -> Job {
    match status {
        "SUCCEEDED" => Job::succeeded(job_id, output.and_then(|urls| urls.into_iter().next())),
        "FAILED" | "CANCELED" | "CANCELLED" | "STOPPED" => {
            Job::failed(job_id, failure.or(failure_code).or_else(|| Some(format!("Task {}", status.to_lowercase()))))
        }
        "PENDING" | "THROTTLED" => Job::queued(job_id),
        _ => Job::running(job_id),
    }
}
