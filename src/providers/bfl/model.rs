use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jobs::Job;

// Black Forest Labs wire types

#[derive(Serialize, Debug)]
pub struct FluxRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub output_format: String,
    pub safety_tolerance: u8,
}

/// Create-call response
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum FluxSubmitResponse {
    Accepted {
        id: String,
        #[serde(default)]
        polling_url: Option<String>,
    },
    Unknown(Value),
}

#[derive(Deserialize, Debug)]
pub struct FluxResultBody {
    #[serde(default)]
    pub sample: Option<String>,
}

/// `get_result` response
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum FluxStatusResponse {
    Known {
        status: String,
        #[serde(default)]
        result: Option<FluxResultBody>,
        #[serde(default)]
        details: Option<Value>,
    },
    Unknown(Value),
}

const FAILURE_STATUSES: &[&str] = &[
    "Error",
    "Failed",
    "Request Moderated",
    "Content Moderated",
    "Task not found",
];

/// Normalize a known status payload. Unrecognized status strings keep the job running.
pub fn normalize_status(job_id: &str, status: &str, result: Option<FluxResultBody>, details: Option<Value>) -> Job {
    match status {
        "Ready" => Job::succeeded(job_id, result.and_then(|body| body.sample)),
        "Pending" => Job::running(job_id),
        "Queued" => Job::queued(job_id),
        failed if FAILURE_STATUSES.contains(&failed) => {
            let reason = details
                .as_ref()
                .and_then(describe_details)
                .unwrap_or_else(|| failed.to_string());
            Job::failed(job_id, Some(reason))
        }
        other => {
            tracing::debug!(job_id, status = other, "Unrecognized Flux status, treating as running");
            Job::running(job_id)
        }
    }
}

fn describe_details(details: &Value) -> Option<String> {
    match details {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(map) if !map.is_empty() => Some(details.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use serde_json::json;

    fn decode(value: Value) -> Job {
        match serde_json::from_value::<FluxStatusResponse>(value).unwrap() {
            FluxStatusResponse::Known { status, result, details } => {
                normalize_status("job-1", &status, result, details)
            }
            FluxStatusResponse::Unknown(other) => panic!("unexpected shape: {other}"),
        }
    }

    #[test]
    fn test_ready_with_sample() {
        let job = decode(json!({"id": "job-1", "status": "Ready", "result": {"sample": "https://bfl/img.jpg"}}));
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.result_url(), Some("https://bfl/img.jpg"));
    }

    #[test]
    fn test_ready_without_result_has_no_url() {
        let job = decode(json!({"id": "job-1", "status": "Ready", "result": null}));
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.result_url().is_none());
    }

    #[test]
    fn test_moderated_is_failure() {
        let job = decode(json!({"status": "Content Moderated", "details": {"reason": "nsfw"}}));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("nsfw"));

        let job = decode(json!({"status": "Error"}));
        assert_eq!(job.error.as_deref(), Some("Error"));
    }

    #[test]
    fn test_pending_and_unknown_keep_running() {
        assert_eq!(decode(json!({"status": "Pending"})).status, JobStatus::Running);
        assert_eq!(decode(json!({"status": "Warming"})).status, JobStatus::Running);
    }

    #[test]
    fn test_submit_without_id_is_unknown() {
        let response: FluxSubmitResponse = serde_json::from_value(json!({"polling_url": "https://x"})).unwrap();
        assert!(matches!(response, FluxSubmitResponse::Unknown(_)));
    }
}
