//! Collaborator contracts and production drivers for Tollgate.
//!
//! The evaluation core only sees the traits defined here. Each trait ships
//! with one network-backed implementation: GitHub Actions logs, HTTP health
//! probes, TCP database probes, layered environment config, and a Slack-style
//! webhook.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tollgate_contract::{HealthStatus, ReadinessStatus};

pub mod database;
pub mod env_config;
pub mod github_actions;
pub mod health;
mod transport;
pub mod webhook;

pub use database::{DatabaseKind, TcpDatabaseProber};
pub use env_config::{parse_env_value, LayeredConfigFetcher};
pub use github_actions::{GithubActionsClient, GithubActionsConfig, DEFAULT_GITHUB_API_BASE};
pub use health::HttpHealthProber;
pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
/// Errors raised by collaborator drivers.
pub enum DriverError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported database scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
}

/// Filters applied when listing workflow runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    /// Case-insensitive substring of the run name, or a substring of the
    /// workflow file path.
    pub workflow_name: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub message: String,
    pub author: String,
}

/// One CI workflow run, flattened for hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub head_branch: Option<String>,
    pub head_commit: CommitSummary,
    pub html_url: Option<String>,
}

#[async_trait]
/// Retrieves build logs and run metadata from CI.
pub trait BuildLogFetcher: Send + Sync {
    async fn fetch_log(&self, repo: &str, run_id: &str) -> Result<String, DriverError>;

    async fn list_runs(
        &self,
        repo: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, DriverError>;

    /// Most recent completed run matching the filters.
    async fn latest_run(
        &self,
        repo: &str,
        workflow_name: Option<&str>,
        branch: Option<&str>,
    ) -> Result<Option<WorkflowRun>, DriverError> {
        let filter = RunFilter {
            workflow_name: workflow_name.map(str::to_string),
            branch: branch.map(str::to_string),
            status: Some("completed".to_string()),
            limit: 1,
        };
        Ok(self.list_runs(repo, &filter).await?.into_iter().next())
    }
}

/// Raw outcome of one health probe. `http_code == 0` marks a transport
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthProbe {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub http_code: u16,
    pub error: Option<String>,
}

#[async_trait]
pub trait HealthProber: Send + Sync {
    /// Probes `url`. Unreachable services yield a DOWN probe; only an
    /// unusable URL is an error.
    async fn probe(&self, url: &str) -> Result<HealthProbe, DriverError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbProbe {
    pub kind: DatabaseKind,
    pub connected: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationProbe {
    pub matches: bool,
    pub current_version: Option<String>,
    pub note: Option<String>,
}

#[async_trait]
pub trait DatabaseProber: Send + Sync {
    /// Refused or timed-out connections yield `connected == false`; an
    /// unparseable URL or unknown scheme is an error.
    async fn check_connectivity(&self, db_url: &str) -> Result<DbProbe, DriverError>;

    async fn check_migrations(&self, db_url: &str) -> Result<MigrationProbe, DriverError>;
}

#[async_trait]
/// Supplies the live configuration tree of an environment.
pub trait EnvironmentConfigFetcher: Send + Sync {
    async fn fetch(&self, environment: &str) -> Result<Value, DriverError>;
}

/// Payload of a readiness notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentAlert {
    pub score: u32,
    pub status: ReadinessStatus,
    pub summary: String,
    pub penalties: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    /// No destination configured.
    Skipped,
}

#[async_trait]
pub trait DeploymentNotifier: Send + Sync {
    async fn send_deployment_alert(
        &self,
        alert: &DeploymentAlert,
    ) -> Result<NotificationOutcome, DriverError>;
}
