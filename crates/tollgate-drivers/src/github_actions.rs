use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::transport::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use crate::{BuildLogFetcher, CommitSummary, DriverError, RunFilter, WorkflowRun};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
/// Public struct `GithubActionsConfig` used across Tollgate components.
pub struct GithubActionsConfig {
    pub api_base: String,
    /// Requests are sent anonymously when no token is set.
    pub token: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for GithubActionsConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token: None,
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

/// GitHub Actions REST client backing [`BuildLogFetcher`].
///
/// Logs are assembled from the per-job plain-text endpoint, one
/// `--- Job: <name> ---` section per job.
#[derive(Clone)]
pub struct GithubActionsClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl std::fmt::Debug for GithubActionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubActionsClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GithubActionsClient {
    pub fn new(config: GithubActionsConfig) -> Result<Self, DriverError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("tollgate-readiness"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        if let Some(token) = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            let auth_header = format!("Bearer {token}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_header).map_err(|error| {
                    DriverError::InvalidArgument(format!("invalid github token header: {error}"))
                })?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    async fn list_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<RawJob>, DriverError> {
        let page: JobsPage = self
            .request_json("list run jobs", || {
                self.http
                    .get(format!(
                        "{}/repos/{repo}/actions/runs/{run_id}/jobs",
                        self.api_base
                    ))
                    .query(&[("per_page", MAX_PAGE_SIZE.to_string())])
            })
            .await?;
        Ok(page.jobs)
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T, DriverError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        let raw = response.text().await?;
        serde_json::from_str(&raw).map_err(|error| DriverError::Decode {
            what: format!("github {operation}"),
            message: error.to_string(),
        })
    }

    async fn request_text<F>(&self, operation: &str, request_builder: F) -> Result<String, DriverError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        Ok(response.text().await?)
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut request_builder: F,
    ) -> Result<reqwest::Response, DriverError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(
                    "x-tollgate-retry-attempt",
                    attempt.saturating_sub(1).to_string(),
                )
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        tracing::debug!(operation, attempt, status = status.as_u16(), "retrying github request");
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(DriverError::HttpStatus {
                        operation: format!("github api {operation}"),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(DriverError::Http(error));
                }
            }
        }
    }
}

#[async_trait]
impl BuildLogFetcher for GithubActionsClient {
    async fn fetch_log(&self, repo: &str, run_id: &str) -> Result<String, DriverError> {
        let repo = validate_repo(repo)?;
        let run_id = parse_run_id(run_id)?;
        let jobs = self.list_jobs(repo, run_id).await?;

        let mut sections = Vec::with_capacity(jobs.len());
        for job in jobs {
            let job_id = job.id;
            let text = self
                .request_text("download job log", || {
                    self.http.get(format!(
                        "{}/repos/{repo}/actions/jobs/{job_id}/logs",
                        self.api_base
                    ))
                })
                .await?;
            let name = job.name.unwrap_or_else(|| format!("job-{job_id}"));
            sections.push(format!("--- Job: {name} ---\n{text}"));
        }

        if sections.is_empty() {
            return Ok(format!("No job logs found for run {run_id}."));
        }
        tracing::debug!(repo, run_id, jobs = sections.len(), "fetched build log");
        Ok(sections.join("\n\n"))
    }

    async fn list_runs(
        &self,
        repo: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, DriverError> {
        let repo = validate_repo(repo)?;
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        // Name filtering happens client-side, so pull a full page first.
        let per_page = if filter.workflow_name.is_some() {
            MAX_PAGE_SIZE
        } else {
            limit
        };

        let page: RunsPage = self
            .request_json("list workflow runs", || {
                let mut request = self
                    .http
                    .get(format!("{}/repos/{repo}/actions/runs", self.api_base))
                    .query(&[("per_page", per_page.to_string())]);
                if let Some(status) = filter.status.as_deref() {
                    request = request.query(&[("status", status)]);
                }
                if let Some(branch) = filter.branch.as_deref() {
                    request = request.query(&[("branch", branch)]);
                }
                request
            })
            .await?;

        Ok(page
            .workflow_runs
            .into_iter()
            .filter(|run| run_matches_workflow(run, filter.workflow_name.as_deref()))
            .take(limit)
            .map(RawRun::into_workflow_run)
            .collect())
    }
}

fn validate_repo(repo: &str) -> Result<&str, DriverError> {
    let repo = repo.trim();
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(repo)
        }
        _ => Err(DriverError::InvalidArgument(format!(
            "repository '{repo}' must be in owner/name form"
        ))),
    }
}

fn parse_run_id(run_id: &str) -> Result<u64, DriverError> {
    run_id.trim().parse::<u64>().map_err(|_| {
        DriverError::InvalidArgument(format!("build id '{run_id}' must be a numeric run id"))
    })
}

fn run_matches_workflow(run: &RawRun, workflow_name: Option<&str>) -> bool {
    let Some(needle) = workflow_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return true;
    };
    let name_match = run
        .name
        .as_deref()
        .is_some_and(|name| name.to_lowercase().contains(&needle.to_lowercase()));
    let path_match = run.path.as_deref().is_some_and(|path| path.contains(needle));
    name_match || path_match
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    workflow_runs: Vec<RawRun>,
}

#[derive(Debug, Deserialize)]
struct RawRun {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(default)]
    head_commit: Option<RawCommit>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<String>,
}

impl RawRun {
    fn into_workflow_run(self) -> WorkflowRun {
        let head_commit = self
            .head_commit
            .map(|commit| CommitSummary {
                message: commit.message.unwrap_or_default(),
                author: commit
                    .author
                    .and_then(|author| author.name)
                    .unwrap_or_default(),
            })
            .unwrap_or_default();
        WorkflowRun {
            id: self.id,
            name: self.name.unwrap_or_else(|| "Unknown".to_string()),
            status: self.status.unwrap_or_else(|| "unknown".to_string()),
            conclusion: self.conclusion,
            created_at: self.created_at,
            updated_at: self.updated_at,
            head_branch: self.head_branch,
            head_commit,
            html_url: self.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobsPage {
    #[serde(default)]
    jobs: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}
