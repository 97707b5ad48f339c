pub mod clock;
pub mod poller;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::GenerationRequest;

pub use clock::{Clock, TokioClock};
pub use poller::{Failure, JobPoller, PollPolicy, PollState};

/// Normalized provider job status
///
/// `Timeout` is never reported by a provider, the poller synthesizes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Timeout,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
        }
    }
}

/// Read-only snapshot of a provider-side generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn queued(id: impl Into<String>) -> Self {
        Self { id: id.into(), status: JobStatus::Queued, result_url: None, error: None }
    }

    pub fn running(id: impl Into<String>) -> Self {
        Self { id: id.into(), status: JobStatus::Running, result_url: None, error: None }
    }

    pub fn succeeded(id: impl Into<String>, result_url: Option<String>) -> Self {
        Self { id: id.into(), status: JobStatus::Succeeded, result_url, error: None }
    }

    pub fn failed(id: impl Into<String>, error: Option<String>) -> Self {
        Self { id: id.into(), status: JobStatus::Failed, result_url: None, error }
    }

    /// Result URL, ignoring blank values
    pub fn result_url(&self) -> Option<&str> {
        self.result_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Result of a successful create call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    /// Empty when the creating side returned no identifier
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

/// Normalized generation result shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAsset {
    pub url: String,
    pub prompt: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub kind: AssetKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl GeneratedAsset {
    /// Build an asset from a finished job.
    ///
    /// Returns `None` unless the job succeeded and carries a result URL.
    pub fn from_job(job: &Job, request: &GenerationRequest, model: &str, kind: AssetKind) -> Option<Self> {
        if job.status != JobStatus::Succeeded {
            return None;
        }
        let url = job.result_url()?;
        Some(Self::from_url(url, request, model, kind))
    }

    /// Build an asset from a synchronous provider result
    pub fn from_url(url: &str, request: &GenerationRequest, model: &str, kind: AssetKind) -> Self {
        Self {
            url: url.to_string(),
            prompt: request.prompt.as_deref().unwrap_or_default().trim().to_string(),
            model: model.to_string(),
            timestamp: Utc::now(),
            kind,
            references: request.references.clone(),
            owner_id: request.owner_id.clone(),
        }
    }
}
