use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tollgate_ai::{NarrationPair, Narrator};
use tollgate_audit::{compare_configs, resolve_baseline_path};
use tollgate_contract::{CheckErrorCode, CheckResult, DriftReport};
use tollgate_drivers::EnvironmentConfigFetcher;

use super::{is_blank, narrated_failure};
use crate::registry::{CompareConfigArgs, FetchConfigArgs};

const MAX_KEYS_IN_PROMPT: usize = 50;

/// Returns the live configuration of an environment.
#[derive(Clone)]
pub struct FetchConfigCheck {
    fetcher: Arc<dyn EnvironmentConfigFetcher>,
}

impl std::fmt::Debug for FetchConfigCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfigCheck").finish_non_exhaustive()
    }
}

impl FetchConfigCheck {
    pub fn new(fetcher: Arc<dyn EnvironmentConfigFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn execute(&self, args: FetchConfigArgs) -> CheckResult {
        match self.fetcher.fetch(&args.environment).await {
            Ok(config) => CheckResult::ok(config),
            Err(error) => {
                tracing::warn!(environment = %args.environment, error = %error, "environment config fetch failed");
                CheckResult::failure(CheckErrorCode::FetchConfigError, error.to_string())
            }
        }
    }
}

/// Audits an environment's live configuration against a baseline artifact.
#[derive(Clone)]
pub struct CompareConfigCheck {
    fetcher: Arc<dyn EnvironmentConfigFetcher>,
    narrator: Narrator,
    template_dir: PathBuf,
}

impl std::fmt::Debug for CompareConfigCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareConfigCheck")
            .field("template_dir", &self.template_dir)
            .finish_non_exhaustive()
    }
}

impl CompareConfigCheck {
    pub fn new(
        fetcher: Arc<dyn EnvironmentConfigFetcher>,
        narrator: Narrator,
        template_dir: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            narrator,
            template_dir,
        }
    }

    /// Resolves `env_2` to a baseline path. Names without a path separator
    /// that match no file map to `{template_dir}/{name}.yaml`.
    pub fn baseline_path(&self, env_2: &str) -> PathBuf {
        let literal = Path::new(env_2.trim());
        if literal.exists() || resolve_baseline_path(literal).is_some() {
            return literal.to_path_buf();
        }
        if !env_2.contains(['/', '\\']) {
            return self.template_dir.join(format!("{}.yaml", env_2.trim()));
        }
        literal.to_path_buf()
    }

    pub async fn execute(&self, args: CompareConfigArgs) -> CheckResult {
        if is_blank(&args.env_2) {
            return CheckResult::failure(
                CheckErrorCode::ConfigCompareError,
                "env_2 must name a baseline template",
            );
        }
        let actual = match args.actual {
            Some(actual) => actual,
            None if args.integrity_mode => Value::Object(Default::default()),
            None => match self.fetcher.fetch(&args.env_1).await {
                Ok(actual) => actual,
                Err(error) => {
                    return self
                        .config_fetch_failure(&args.env_1, &args.env_2, error.to_string())
                        .await
                }
            },
        };

        let baseline = self.baseline_path(&args.env_2);
        let integrity_mode = args.integrity_mode;
        let audit =
            tokio::task::spawn_blocking(move || compare_configs(&baseline, &actual, integrity_mode))
                .await;
        let report = match audit {
            Ok(report) => report,
            Err(error) => {
                let message = format!("configuration audit did not complete: {error}");
                let prompt = compare_error_prompt(&message, &args.env_2);
                return narrated_failure(
                    &self.narrator,
                    CheckErrorCode::ConfigCompareError,
                    message,
                    &prompt,
                    NarrationPair::new("Internal audit failure.", "Check system logs."),
                )
                .await;
            }
        };
        tracing::info!(
            env_1 = %args.env_1,
            baseline = %report.resolved_path(),
            drift_keys = report.drift_keys().len(),
            "configuration audit finished"
        );

        let narration = self
            .narrator
            .narrate_pair(
                &drift_prompt(&report, &args.env_1, &args.env_2),
                drift_fallback(&report),
            )
            .await;
        CheckResult::ok(json!({
            "env_1": args.env_1,
            "env_2": args.env_2,
            "drift_detected": report.drift_detected(),
            "drift_keys": report.drift_keys(),
            "explanation": narration.explanation,
            "suggested_fix": narration.suggested_fix,
            "analysis_type": report.analysis_type(),
            "resolved_path": report.resolved_path(),
        }))
    }

    /// Failure reported when the live configuration could not be fetched.
    pub async fn config_fetch_failure(&self, env_1: &str, env_2: &str, message: String) -> CheckResult {
        tracing::warn!(environment = %env_1, error = %message, "live configuration unavailable for audit");
        let prompt = compare_error_prompt(&message, env_2);
        narrated_failure(
            &self.narrator,
            CheckErrorCode::ConfigFetchError,
            message,
            &prompt,
            NarrationPair::new(
                format!("Failed to fetch configuration for {env_1}."),
                "Ensure environment configuration is available.",
            ),
        )
        .await
    }
}

fn drift_prompt(report: &DriftReport, env_1: &str, env_2: &str) -> String {
    let keys = report
        .drift_keys()
        .iter()
        .take(MAX_KEYS_IN_PROMPT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mode = report.analysis_type().as_str();
    format!(
        "Interpret these configuration audit results.\n\
         Audit mode: {mode}\nEnvironment: {env_1}\nBaseline: {env_2} ({})\n\
         Issues: {}\n\n\
         In DRIFT mode the issues are keys present in the baseline but missing from the environment. \
         In INTEGRITY mode they are keys holding empty or placeholder values. \
         Return JSON with 'explanation' and 'suggested_fix'.",
        report.resolved_path(),
        if keys.is_empty() { "none" } else { keys.as_str() },
    )
}

fn drift_fallback(report: &DriftReport) -> NarrationPair {
    if report.drift_detected() {
        NarrationPair::new(
            format!(
                "Audit complete based on raw findings: {} issue(s) found.",
                report.drift_keys().len()
            ),
            "Review results manually.",
        )
    } else {
        NarrationPair::new("Audit complete based on raw findings.", "No action required.")
    }
}

fn compare_error_prompt(message: &str, env_2: &str) -> String {
    format!(
        "The configuration auditor failed while checking baseline '{env_2}'.\nError: {message}\n\
         Explain why this check failed and how to resolve it. Return JSON with 'explanation' and 'suggested_fix'."
    )
}
