use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    errors::{AppError, AppResult},
    providers::{GenerationRequest, JobProvider},
};
use super::{Clock, GeneratedAsset, JobStatus, TokioClock};

/// How often to check a job and when to give up on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_secs(interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }
}

/// Why a job ended in `Failed`, kept in a form that can be rebuilt into an [`AppError`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: u16,
    pub kind: String,
    pub message: String,
}

impl Failure {
    fn generation(message: impl Into<String>) -> Self {
        Self {
            status: 502,
            kind: "provider_error".to_string(),
            message: message.into(),
        }
    }

    pub fn into_error(self) -> AppError {
        AppError::from_envelope(self.status, &self.kind, self.message, None)
    }
}

impl From<&AppError> for Failure {
    fn from(err: &AppError) -> Self {
        Self {
            status: err.status_code().as_u16(),
            kind: err.error_type().to_string(),
            message: err.message(),
        }
    }
}

/// Observable poller state
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Creating,
    Queued { job_id: String },
    Polling { job_id: String, status: JobStatus, checks: u32 },
    Succeeded { job_id: String, asset: GeneratedAsset },
    Failed { job_id: Option<String>, failure: Failure },
    TimedOut { job_id: String, elapsed: Duration },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded { .. } | PollState::Failed { .. } | PollState::TimedOut { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Creating => "creating",
            PollState::Queued { .. } => "queued",
            PollState::Polling { .. } => "polling",
            PollState::Succeeded { .. } => "succeeded",
            PollState::Failed { .. } => "failed",
            PollState::TimedOut { .. } => "timeout",
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            PollState::Queued { job_id }
            | PollState::Polling { job_id, .. }
            | PollState::Succeeded { job_id, .. }
            | PollState::TimedOut { job_id, .. } => Some(job_id),
            PollState::Failed { job_id, .. } => job_id.as_deref(),
            PollState::Idle | PollState::Creating => None,
        }
    }
}

/// State tagged with the generation that produced it.
///
/// Every `generate`/`reset` bumps the generation; a task only publishes
/// while its generation is current.
#[derive(Debug, Clone)]
struct Slot {
    generation: u64,
    state: PollState,
}

/// Drives one provider job at a time from creation to a terminal state.
///
/// Starting a new generation abandons the previous one (the upstream job is
/// not cancelled). Dropping the poller stops observing.
pub struct JobPoller {
    provider: Arc<dyn JobProvider>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    slot: Arc<watch::Sender<Slot>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl JobPoller {
    pub fn new(provider: Arc<dyn JobProvider>) -> Self {
        let policy = provider.poll_policy();
        let (slot, _) = watch::channel(Slot { generation: 0, state: PollState::Idle });
        Self {
            provider,
            clock: Arc::new(TokioClock),
            policy,
            slot: Arc::new(slot),
            task: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn state(&self) -> PollState {
        self.slot.borrow().state.clone()
    }

    /// Start a new job. Must be called from within a tokio runtime.
    ///
    /// A blank prompt is rejected before anything is sent and leaves the
    /// current state untouched.
    pub fn generate(&self, request: GenerationRequest) -> AppResult<()> {
        request.validated_prompt()?;

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            debug!(provider = self.provider.id(), "Abandoning in-flight job poll");
            previous.abort();
        }

        let generation = self.advance(PollState::Creating);
        let driver = Driver {
            provider: Arc::clone(&self.provider),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
            slot: Arc::clone(&self.slot),
            generation,
        };
        *task = Some(tokio::spawn(driver.run(request)));

        Ok(())
    }

    /// Stop observing the current job and return to `Idle`.
    ///
    /// The provider is not told; the job may keep running upstream.
    pub fn reset(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.advance(PollState::Idle);
        debug!(provider = self.provider.id(), "Job poller reset");
    }

    /// Wait until the current generation reaches a terminal state or is superseded
    pub async fn wait(&self) -> PollState {
        let mut rx = self.slot.subscribe();
        let generation = rx.borrow().generation;
        let settled = rx
            .wait_for(|slot| {
                slot.generation != generation
                    || slot.state.is_terminal()
                    || slot.state == PollState::Idle
            })
            .await
            .map(|slot| slot.state.clone());

        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Generate and wait for the asset
    pub async fn run(&self, request: GenerationRequest) -> AppResult<GeneratedAsset> {
        self.generate(request)?;
        match self.wait().await {
            PollState::Succeeded { asset, .. } => Ok(asset),
            PollState::Failed { failure, .. } => Err(failure.into_error()),
            PollState::TimedOut { elapsed, .. } => Err(AppError::PollingTimeout {
                elapsed_secs: elapsed.as_secs(),
            }),
            other => Err(AppError::internal(format!(
                "Generation stopped before completion (state: {})",
                other.name()
            ))),
        }
    }

    fn advance(&self, state: PollState) -> u64 {
        let mut generation = 0;
        self.slot.send_modify(|slot| {
            slot.generation += 1;
            slot.state = state;
            generation = slot.generation;
        });
        generation
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

/// The scheduled task behind one `generate` call
struct Driver {
    provider: Arc<dyn JobProvider>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    slot: Arc<watch::Sender<Slot>>,
    generation: u64,
}

impl Driver {
    fn is_current(&self) -> bool {
        self.slot.borrow().generation == self.generation
    }

    fn publish(&self, state: PollState) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.generation != self.generation {
                return false;
            }
            slot.state = state;
            true
        })
    }

    async fn run(self, request: GenerationRequest) {
        let provider = self.provider.id().to_string();
        let started = self.clock.now();

        let ticket = match self.provider.submit(&request).await {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(provider = %provider, error = %err, "Job creation failed");
                self.publish(PollState::Failed { job_id: None, failure: Failure::from(&err) });
                return;
            }
        };

        let job_id = ticket.job_id.trim().to_string();
        if job_id.is_empty() {
            warn!(provider = %provider, "Job creation response carried no job id");
            self.publish(PollState::Failed {
                job_id: None,
                failure: Failure::generation("Job creation response did not include a job id"),
            });
            return;
        }

        info!(provider = %provider, job_id = %job_id, "Job created");
        if !self.publish(PollState::Queued { job_id: job_id.clone() }) {
            return;
        }

        let mut checks = 0u32;
        loop {
            self.clock.sleep(self.policy.interval).await;

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= self.policy.timeout {
                warn!(
                    provider = %provider,
                    job_id = %job_id,
                    elapsed_secs = elapsed.as_secs(),
                    "Job polling timed out"
                );
                self.publish(PollState::TimedOut { job_id, elapsed });
                return;
            }

            if !self.is_current() {
                return;
            }

            checks += 1;
            let job = match self.provider.status(&job_id).await {
                Ok(job) => job,
                Err(err) => {
                    warn!(provider = %provider, job_id = %job_id, error = %err, "Job status check failed");
                    self.publish(PollState::Failed { job_id: Some(job_id), failure: Failure::from(&err) });
                    return;
                }
            };

            debug!(
                provider = %provider,
                job_id = %job_id,
                status = job.status.as_str(),
                checks,
                "Job status checked"
            );

            match job.status {
                JobStatus::Succeeded => {
                    match GeneratedAsset::from_job(&job, &request, &ticket.model, self.provider.asset_kind()) {
                        Some(asset) => {
                            info!(provider = %provider, job_id = %job_id, checks, "Job succeeded");
                            self.publish(PollState::Succeeded { job_id, asset });
                            return;
                        }
                        None => {
                            warn!(provider = %provider, job_id = %job_id, "Job reported success without a result URL");
                        }
                    }
                }
                JobStatus::Failed | JobStatus::Timeout => {
                    let message = job
                        .error
                        .filter(|reason| !reason.trim().is_empty())
                        .unwrap_or_else(|| "Generation failed".to_string());
                    info!(provider = %provider, job_id = %job_id, reason = %message, "Job failed");
                    self.publish(PollState::Failed {
                        job_id: Some(job_id),
                        failure: Failure::generation(message),
                    });
                    return;
                }
                JobStatus::Queued | JobStatus::Running => {}
            }

            if !self.publish(PollState::Polling { job_id: job_id.clone(), status: job.status, checks }) {
                return;
            }
        }
    }
}
