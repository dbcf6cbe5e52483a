use std::sync::Arc;

use serde_json::{json, Value};
use tollgate_ai::{NarrationPair, Narrator};
use tollgate_contract::{BuildLog, CheckErrorCode, CheckResult};
use tollgate_drivers::{BuildLogFetcher, WorkflowRun};

use super::{is_blank, narrated_failure};
use crate::registry::{FetchBuildLogArgs, LatestBuildArgs};

const LOG_TAIL_CHARS: usize = 5_000;
const LOG_NOT_FETCHED: &str = "[Log not fetched - set include_log=true]";

fn resolve_repo(requested: Option<&str>, default_repo: Option<&str>) -> Option<String> {
    requested
        .filter(|repo| !is_blank(repo))
        .or(default_repo.filter(|repo| !is_blank(repo)))
        .map(|repo| repo.trim().to_string())
}

/// Fetches the raw log for a CI run.
#[derive(Clone)]
pub struct FetchBuildLogCheck {
    fetcher: Arc<dyn BuildLogFetcher>,
    default_repo: Option<String>,
}

impl std::fmt::Debug for FetchBuildLogCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchBuildLogCheck")
            .field("default_repo", &self.default_repo)
            .finish_non_exhaustive()
    }
}

impl FetchBuildLogCheck {
    pub fn new(fetcher: Arc<dyn BuildLogFetcher>, default_repo: Option<String>) -> Self {
        Self {
            fetcher,
            default_repo,
        }
    }

    pub async fn execute(&self, args: FetchBuildLogArgs) -> CheckResult {
        let Some(repo) = resolve_repo(args.repo.as_deref(), self.default_repo.as_deref()) else {
            return CheckResult::failure(
                CheckErrorCode::ConfigError,
                "No repository specified and GITHUB_REPOSITORY env not set.",
            );
        };
        if is_blank(&args.build_id) {
            return CheckResult::failure(CheckErrorCode::FetchLogError, "build_id must not be empty");
        }

        match self.fetcher.fetch_log(&repo, args.build_id.trim()).await {
            Ok(log_text) => {
                let log = BuildLog {
                    build_id: args.build_id.trim().to_string(),
                    repo,
                    log_text,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                };
                match serde_json::to_value(&log) {
                    Ok(data) => CheckResult::ok(data),
                    Err(error) => CheckResult::failure(CheckErrorCode::FetchLogError, error.to_string()),
                }
            }
            Err(error) => {
                tracing::warn!(repo = %repo, build_id = %args.build_id, error = %error, "build log fetch failed");
                CheckResult::failure(CheckErrorCode::FetchLogError, error.to_string())
            }
        }
    }
}

/// Finds the newest completed workflow run and narrates its outcome.
#[derive(Clone)]
pub struct LatestBuildCheck {
    fetcher: Arc<dyn BuildLogFetcher>,
    narrator: Narrator,
    default_repo: Option<String>,
}

impl std::fmt::Debug for LatestBuildCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestBuildCheck")
            .field("default_repo", &self.default_repo)
            .finish_non_exhaustive()
    }
}

impl LatestBuildCheck {
    pub fn new(
        fetcher: Arc<dyn BuildLogFetcher>,
        narrator: Narrator,
        default_repo: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            narrator,
            default_repo,
        }
    }

    pub async fn execute(&self, args: LatestBuildArgs) -> CheckResult {
        let Some(repo) = resolve_repo(args.repo.as_deref(), self.default_repo.as_deref()) else {
            return narrated_failure(
                &self.narrator,
                CheckErrorCode::ConfigError,
                "No repository specified.".to_string(),
                "A build lookup was requested but no repository is configured. Return JSON with 'explanation' and 'suggested_fix'.",
                NarrationPair::new(
                    "Target repository is undefined.",
                    "Set GITHUB_REPOSITORY or pass a repo argument.",
                ),
            )
            .await;
        };

        let latest = self
            .fetcher
            .latest_run(&repo, args.workflow_name.as_deref(), args.branch.as_deref())
            .await;
        let run = match latest {
            Ok(Some(run)) => run,
            Ok(None) => {
                return CheckResult::failure(
                    CheckErrorCode::NoRunsFound,
                    "No workflow runs found matching the criteria.",
                )
                .with_narration(
                    format!("No completed builds found in {repo}."),
                    "Check the repository, workflow name, and branch filters.",
                )
            }
            Err(error) => {
                let message = error.to_string();
                let prompt = format!(
                    "Looking up the latest build of {repo} failed.\nError: {message}\n\
                     Explain the likely cause and how to resolve it. Return JSON with 'explanation' and 'suggested_fix'."
                );
                return narrated_failure(
                    &self.narrator,
                    CheckErrorCode::FetchError,
                    message,
                    &prompt,
                    NarrationPair::new(
                        "Failed to retrieve build information.",
                        "Verify GitHub credentials and repository access.",
                    ),
                )
                .await;
            }
        };
        tracing::info!(repo = %repo, run_id = run.id, conclusion = ?run.conclusion, "found latest workflow run");

        let failed = run.conclusion.as_deref() == Some("failure");
        let log_text = if args.include_log || failed {
            match self.fetcher.fetch_log(&repo, &run.id.to_string()).await {
                Ok(text) => Some(text),
                Err(error) => {
                    tracing::warn!(run_id = run.id, error = %error, "latest build log fetch failed");
                    Some(format!("[Log fetch failed: {error}]"))
                }
            }
        } else {
            None
        };

        let narration = self.narrate_run(&run, log_text.as_deref()).await;
        let field = |name: &str, fallback: String| {
            narration
                .get(name)
                .and_then(Value::as_str)
                .filter(|text| !is_blank(text))
                .map(str::to_string)
                .unwrap_or(fallback)
        };
        let (explanation, root_cause, suggested_fix) = run_fallbacks(&run);
        let reported_log = if args.include_log {
            log_text.unwrap_or_default()
        } else {
            LOG_NOT_FETCHED.to_string()
        };

        CheckResult::ok(json!({
            "run_id": run.id,
            "workflow_name": run.name,
            "status": run.status,
            "conclusion": run.conclusion,
            "created_at": run.created_at,
            "updated_at": run.updated_at,
            "branch": run.head_branch,
            "commit": run.head_commit,
            "html_url": run.html_url,
            "log_text": reported_log,
            "explanation": field("explanation", explanation),
            "root_cause": field("root_cause", root_cause),
            "suggested_fix": field("suggested_fix", suggested_fix),
        }))
    }

    async fn narrate_run(&self, run: &WorkflowRun, log_text: Option<&str>) -> Value {
        let conclusion = run.conclusion.as_deref().unwrap_or("unknown");
        let mut prompt = format!(
            "Analyze this GitHub Actions build result.\n\nWorkflow: {}\nStatus: {}\nConclusion: {conclusion}\n\
             Branch: {}\nCommit: {}\n",
            run.name,
            run.status,
            run.head_branch.as_deref().unwrap_or("unknown"),
            run.head_commit.message,
        );
        if conclusion == "failure" {
            if let Some(log_text) = log_text {
                prompt.push_str(&format!("\nLog tail:\n{}\n", tail_chars(log_text, LOG_TAIL_CHARS)));
            }
        }
        prompt.push_str(
            "\nReturn JSON with 'explanation' (what happened), 'root_cause' (why, or N/A for success), \
             and 'suggested_fix'.",
        );
        match self.narrator.generate_structured(&prompt).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(error = %error, "latest build narration failed; using fallback text");
                Value::Null
            }
        }
    }
}

fn run_fallbacks(run: &WorkflowRun) -> (String, String, String) {
    match run.conclusion.as_deref() {
        Some("success") => (
            format!("Build completed successfully for {}.", run.name),
            "N/A".to_string(),
            "No action required.".to_string(),
        ),
        other => (
            format!(
                "Build {} for {}. Check logs for details.",
                other.unwrap_or("unknown"),
                run.name
            ),
            "Unable to analyze - AI narration failed.".to_string(),
            "Review build logs manually.".to_string(),
        ),
    }
}

fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_repo, run_fallbacks, tail_chars};
    use tollgate_drivers::{CommitSummary, WorkflowRun};

    fn run(conclusion: Option<&str>) -> WorkflowRun {
        WorkflowRun {
            id: 1,
            name: "CI".to_string(),
            status: "completed".to_string(),
            conclusion: conclusion.map(str::to_string),
            created_at: None,
            updated_at: None,
            head_branch: Some("main".to_string()),
            head_commit: CommitSummary::default(),
            html_url: None,
        }
    }

    #[test]
    fn unit_resolve_repo_prefers_request_then_default() {
        assert_eq!(
            resolve_repo(Some("acme/api"), Some("acme/web")).as_deref(),
            Some("acme/api")
        );
        assert_eq!(resolve_repo(Some("  "), Some("acme/web")).as_deref(), Some("acme/web"));
        assert_eq!(resolve_repo(None, None), None);
    }

    #[test]
    fn unit_tail_chars_keeps_last_characters() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 3), "ab");
        assert_eq!(tail_chars("\u{e9}\u{e9}\u{e9}x", 2), "\u{e9}x");
    }

    #[test]
    fn unit_run_fallbacks_depend_on_conclusion() {
        let (explanation, root_cause, _) = run_fallbacks(&run(Some("success")));
        assert_eq!(explanation, "Build completed successfully for CI.");
        assert_eq!(root_cause, "N/A");
        let (explanation, _, fix) = run_fallbacks(&run(Some("failure")));
        assert_eq!(explanation, "Build failure for CI. Check logs for details.");
        assert_eq!(fix, "Review build logs manually.");
    }
}
