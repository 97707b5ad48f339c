pub mod client;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod payments;
pub mod providers;
pub mod server;

// Re-export commonly used types for easier access
pub use client::{ProxyClient, RemoteJobProvider};
pub use config::{Config, load_config};
pub use errors::{AppError, AppResult};
pub use jobs::{GeneratedAsset, Job, JobPoller, JobStatus, PollState};
pub use providers::GenerationRequest;
pub use server::{AppState, create_app, start_server};
