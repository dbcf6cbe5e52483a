//! Evaluation orchestrator.
//!
//! Sequences the checks for one `(project, build, environment)` triple,
//! absorbs failures of best-effort checks, and folds the surviving signals
//! into a single readiness verdict.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use serde_json::{json, Value};
use tollgate_contract::{
    AnalysisType, AuditReport, CheckErrorCode, CheckResult, DriftReport, EnvironmentCatalog,
    EnvironmentDescriptor, HealthResult, LogAnalysis, ToolDefinition,
};
use tollgate_drivers::{DeploymentAlert, DeploymentNotifier, NotificationOutcome};
use tollgate_scoring::ScoreInputs;

use crate::checks::score_envelope;
use crate::context::{EvaluationContext, EvaluationStage};
use crate::registry::{
    AnalyzeLogArgs, CheckRegistry, CheckSettings, CheckStep, Collaborators, CompareConfigArgs,
    DatabaseCheckArgs, FetchBuildLogArgs, FetchConfigArgs, HealthCheckArgs, StepRequest,
};

/// Substitutions applied when a best-effort check produced no usable
/// signal.
///
/// A failed config audit counts as no drift, a failed health probe as no
/// services, and a failed or unconfigured database check as
/// [`NeutralSignals::DB_SKIPPED`], which no scoring policy penalises.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSignals;

impl NeutralSignals {
    pub const DB_SKIPPED: &'static str = "SKIPPED";

    pub fn drift(compare: &CheckResult) -> DriftReport {
        compare
            .success_data()
            .and_then(|data| serde_json::from_value::<DriftReport>(data.clone()).ok())
            .unwrap_or_else(|| DriftReport::clean(AnalysisType::Drift))
    }

    pub fn health(result: &CheckResult) -> Vec<HealthResult> {
        result
            .success_data()
            .and_then(|data| serde_json::from_value::<HealthResult>(data.clone()).ok())
            .into_iter()
            .collect()
    }

    pub fn db_status(result: Option<&CheckResult>) -> String {
        result
            .and_then(CheckResult::success_data)
            .and_then(|data| data.get("db_status"))
            .and_then(Value::as_str)
            .unwrap_or(Self::DB_SKIPPED)
            .to_string()
    }
}

/// Display name of the service probed for a project environment, e.g.
/// `Checkout (staging)`.
pub fn service_label(project: &str, environment: &str) -> String {
    let mut chars = project.chars();
    let capitalized = match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect::<String>(),
        None => String::new(),
    };
    format!("{capitalized} ({environment})")
}

fn abort(prefix: &str, result: &CheckResult) -> CheckResult {
    CheckResult::failure(
        CheckErrorCode::EvaluationAborted,
        format!(
            "{prefix}: {}",
            result.error_message().unwrap_or("Unknown error")
        ),
    )
}

/// Reads the log analysis out of an ANALYZE_LOG envelope, or the
/// `EVALUATION_ABORTED` envelope that ends the pipeline.
fn analysis_gate(result: &CheckResult) -> Result<LogAnalysis, CheckResult> {
    result
        .success_data()
        .and_then(|data| serde_json::from_value::<LogAnalysis>(data.clone()).ok())
        .ok_or_else(|| abort("Failed to analyze log", result))
}

fn unknown_environment(project: &str, environment: &str) -> CheckResult {
    CheckResult::failure(
        CheckErrorCode::ConfigError,
        format!("Project '{project}' or environment '{environment}' not found in schema."),
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Deployment readiness agent.
///
/// Holds only shared, immutable collaborators plus a swappable
/// [`EnvironmentCatalog`]; every evaluation builds its own
/// [`EvaluationContext`], so `evaluate` may run concurrently.
pub struct ReadinessAgent {
    registry: CheckRegistry,
    catalog: ArcSwap<EnvironmentCatalog>,
    notifier: Arc<dyn DeploymentNotifier>,
    default_repo: Option<String>,
    target_db_url: Option<String>,
}

impl std::fmt::Debug for ReadinessAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessAgent")
            .field("projects", &self.catalog.load().project_names())
            .field("default_repo", &self.default_repo)
            .finish_non_exhaustive()
    }
}

impl ReadinessAgent {
    pub fn new(
        collaborators: Collaborators,
        settings: CheckSettings,
        catalog: EnvironmentCatalog,
    ) -> Self {
        let default_repo = settings.default_repo.clone();
        let target_db_url = settings.target_db_url.clone();
        Self {
            registry: CheckRegistry::new(&collaborators, settings),
            catalog: ArcSwap::from_pointee(catalog),
            notifier: collaborators.notifier,
            default_repo,
            target_db_url,
        }
    }

    pub fn catalog(&self) -> Arc<EnvironmentCatalog> {
        self.catalog.load_full()
    }

    /// Swaps in a new catalog; evaluations already running keep the old one.
    pub fn replace_catalog(&self, catalog: EnvironmentCatalog) {
        tracing::info!(projects = catalog.projects.len(), "environment catalog replaced");
        self.catalog.store(Arc::new(catalog));
    }

    pub fn check_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Runs the full evaluation pipeline and returns the score envelope.
    pub async fn evaluate(&self, project: &str, build_id: &str, environment: &str) -> CheckResult {
        self.evaluate_with_context(project, build_id, environment)
            .await
            .0
    }

    /// Like [`ReadinessAgent::evaluate`], also returning the per-step
    /// context.
    pub async fn evaluate_with_context(
        &self,
        project: &str,
        build_id: &str,
        environment: &str,
    ) -> (CheckResult, EvaluationContext) {
        let mut context = EvaluationContext::new(project, environment, build_id);
        let catalog = self.catalog.load_full();
        let Some(descriptor) = catalog.resolve(project, environment) else {
            tracing::warn!(project, environment, "evaluation target not found in catalog");
            return (unknown_environment(project, environment), context);
        };
        tracing::info!(project, environment, build_id, "starting readiness evaluation");

        let outcome = AssertUnwindSafe(self.run_pipeline(&mut context, descriptor))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                tracing::error!(project, environment, stage = %context.stage(), error = %message, "evaluation pipeline panicked");
                CheckResult::failure(CheckErrorCode::AgentError, message)
            }
        };
        (result, context)
    }

    async fn run_step(&self, context: &mut EvaluationContext, request: StepRequest) -> CheckResult {
        let step = request.step();
        let result = self.registry.run(request).await;
        context.record(step, result.clone());
        result
    }

    async fn run_pipeline(
        &self,
        context: &mut EvaluationContext,
        descriptor: EnvironmentDescriptor,
    ) -> CheckResult {
        let project = context.project().to_string();
        let environment = context.environment().to_string();

        let build_id = context.build_id().to_string();

        context.enter(EvaluationStage::FetchLog);
        let repo = descriptor.repo.clone().or_else(|| self.default_repo.clone());
        let log_result = self
            .run_step(
                context,
                StepRequest::FetchBuildLog(FetchBuildLogArgs { build_id, repo }),
            )
            .await;
        let Some(log_text) = log_result
            .success_data()
            .and_then(|data| data.get("log_text"))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            tracing::warn!(project = %project, "evaluation aborted at log fetch");
            return abort("Failed to fetch log", &log_result);
        };

        context.enter(EvaluationStage::AnalyzeLog);
        let analysis_result = self
            .run_step(
                context,
                StepRequest::AnalyzeBuildLog(AnalyzeLogArgs { log_text }),
            )
            .await;
        let analysis = match analysis_gate(&analysis_result) {
            Ok(analysis) => analysis,
            Err(aborted) => {
                tracing::warn!(project = %project, "evaluation aborted at log analysis");
                return aborted;
            }
        };

        context.enter(EvaluationStage::FetchConfig);
        let fetched = self
            .run_step(
                context,
                StepRequest::FetchEnvironmentConfig(FetchConfigArgs {
                    environment: environment.clone(),
                }),
            )
            .await;

        context.enter(EvaluationStage::CompareConfig);
        let compare_result = match fetched.success_data() {
            Some(actual) => {
                self.run_step(
                    context,
                    StepRequest::CompareEnvironmentConfigs(CompareConfigArgs {
                        env_1: environment.clone(),
                        env_2: descriptor.config_template.clone(),
                        integrity_mode: false,
                        actual: Some(actual.clone()),
                    }),
                )
                .await
            }
            None => {
                let message = fetched
                    .error_message()
                    .unwrap_or("environment configuration unavailable")
                    .to_string();
                let result = self
                    .registry
                    .compare()
                    .config_fetch_failure(&environment, &descriptor.config_template, message)
                    .await;
                context.record(CheckStep::CompareEnvironmentConfigs, result.clone());
                result
            }
        };

        context.enter(EvaluationStage::CheckHealth);
        let health_result = self
            .run_step(
                context,
                StepRequest::CheckServiceHealth(HealthCheckArgs {
                    service_name: service_label(&project, &environment),
                    health_url: descriptor.health_url.clone(),
                }),
            )
            .await;

        context.enter(EvaluationStage::CheckDb);
        let db_result = match descriptor.database_url() {
            Some(db_url) => Some(
                self.run_step(
                    context,
                    StepRequest::CheckDatabaseConnection(DatabaseCheckArgs {
                        environment: environment.clone(),
                        db_url: Some(db_url.to_string()),
                    }),
                )
                .await,
            ),
            None => {
                tracing::debug!(environment = %environment, "no database configured; skipping probe");
                None
            }
        };

        context.enter(EvaluationStage::Score);
        let drift = NeutralSignals::drift(&compare_result);
        let health = NeutralSignals::health(&health_result);
        let db_status = NeutralSignals::db_status(db_result.as_ref());
        let inputs = ScoreInputs::from_signals(Some(&analysis), &drift, &health, &db_status);
        let mut score = self.registry.score().calculator().calculate(&inputs);
        score.audit_report = Some(AuditReport {
            build_analysis: analysis_result.payload_or_error(),
            config_audit: compare_result.payload_or_error(),
            health_status: health_result.payload_or_error(),
            db_connectivity: db_result
                .as_ref()
                .map_or_else(|| json!({}), CheckResult::payload_or_error),
        });
        let score_result = score_envelope(&score);
        context.record(CheckStep::CalculateReadinessScore, score_result.clone());
        tracing::info!(
            project = %project,
            environment = %environment,
            score = score.readiness_score,
            status = %score.status,
            penalties = score.penalties.len(),
            "readiness score calculated"
        );

        if score_result.success {
            context.enter(EvaluationStage::Notify);
            let alert = DeploymentAlert {
                score: score.readiness_score,
                status: score.status,
                summary: analysis.explanation.clone(),
                penalties: score.penalties.clone(),
            };
            match self.notifier.send_deployment_alert(&alert).await {
                Ok(NotificationOutcome::Sent) => tracing::debug!("readiness alert delivered"),
                Ok(NotificationOutcome::Skipped) => {
                    tracing::debug!("readiness alert skipped; no destination")
                }
                Err(error) => tracing::warn!(error = %error, "readiness alert failed"),
            }
        }

        context.enter(EvaluationStage::Done);
        score_result
    }

    /// Fetches and analyses one build without touching any environment.
    pub async fn verify_build(&self, project: &str, build_id: &str) -> CheckResult {
        let repo = self
            .catalog
            .load()
            .repo_for(project)
            .map(str::to_string)
            .or_else(|| self.default_repo.clone());
        self.guarded("verify_build", async {
            let log_result = self
                .registry
                .run(StepRequest::FetchBuildLog(FetchBuildLogArgs {
                    build_id: build_id.to_string(),
                    repo,
                }))
                .await;
            let Some(log_text) = log_result
                .success_data()
                .and_then(|data| data.get("log_text"))
                .and_then(Value::as_str)
            else {
                return log_result;
            };
            self.registry
                .run(StepRequest::AnalyzeBuildLog(AnalyzeLogArgs {
                    log_text: log_text.to_string(),
                }))
                .await
        })
        .await
    }

    /// Audits an environment's configuration against its template.
    pub async fn verify_config(&self, project: &str, environment: &str) -> CheckResult {
        let Some(descriptor) = self.catalog.load().resolve(project, environment) else {
            return unknown_environment(project, environment);
        };
        self.guarded(
            "verify_config",
            self.registry
                .run(StepRequest::CompareEnvironmentConfigs(CompareConfigArgs {
                    env_1: environment.to_string(),
                    env_2: descriptor.config_template,
                    integrity_mode: false,
                    actual: None,
                })),
        )
        .await
    }

    /// Probes the health endpoint of a project environment.
    pub async fn verify_health(&self, project: &str, environment: &str) -> CheckResult {
        let Some(descriptor) = self.catalog.load().resolve(project, environment) else {
            return unknown_environment(project, environment);
        };
        self.guarded(
            "verify_health",
            self.registry
                .run(StepRequest::CheckServiceHealth(HealthCheckArgs {
                    service_name: service_label(project, environment),
                    health_url: descriptor.health_url,
                })),
        )
        .await
    }

    /// Runs a single check by tool name with host-supplied JSON arguments.
    ///
    /// Database checks without an explicit `db_url` use the URL configured
    /// for the named environment in the catalog, then the target database
    /// from [`CheckSettings`].
    pub async fn invoke_check(&self, tool_name: &str, arguments: Value) -> CheckResult {
        let Some(step) = CheckStep::from_tool_name(tool_name) else {
            return CheckResult::failure(
                CheckErrorCode::ToolNotFound,
                format!("Tool {tool_name} not found"),
            );
        };
        let mut request = match StepRequest::from_arguments(step, arguments) {
            Ok(request) => request,
            Err(error) => {
                return CheckResult::failure(
                    CheckErrorCode::InvalidArguments,
                    format!("invalid arguments for {tool_name}: {error}"),
                )
            }
        };
        if let StepRequest::CheckDatabaseConnection(args) = &mut request {
            if args.db_url.is_none() {
                args.db_url = self
                    .catalog
                    .load()
                    .find_environment(&args.environment)
                    .and_then(|descriptor| descriptor.database_url().map(str::to_string))
                    .or_else(|| self.target_db_url.clone());
            }
        }
        self.guarded(step.tool_name(), self.registry.run(request))
            .await
    }

    async fn guarded<F>(&self, operation: &str, future: F) -> CheckResult
    where
        F: std::future::Future<Output = CheckResult>,
    {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                tracing::error!(operation, error = %message, "check panicked");
                CheckResult::failure(CheckErrorCode::AgentError, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{analysis_gate, service_label, NeutralSignals};
    use serde_json::json;
    use tollgate_contract::{CheckErrorCode, CheckResult, HealthStatus, LogCategory};

    #[test]
    fn regression_analysis_gate_aborts_on_failed_or_malformed_analysis() {
        let failed = CheckResult::failure(CheckErrorCode::AnalyzeLogError, "classifier offline");
        let aborted = analysis_gate(&failed).expect_err("failed analysis must abort");
        assert_eq!(aborted.error_code(), Some(CheckErrorCode::EvaluationAborted));
        assert_eq!(
            aborted.error_message(),
            Some("Failed to analyze log: classifier offline")
        );

        let malformed = CheckResult::ok(json!({"category": "CODE"}));
        let aborted = analysis_gate(&malformed).expect_err("malformed analysis must abort");
        assert_eq!(
            aborted.error_message(),
            Some("Failed to analyze log: Unknown error")
        );

        let analysed = CheckResult::ok(json!({
            "category": "CODE",
            "severity": "MEDIUM",
            "confidence": 0.4,
            "explanation": "Rule-based analysis (Fallback)",
            "suggested_fix": "Check logs manually for specific error."
        }));
        let analysis = analysis_gate(&analysed).expect("analysis passes the gate");
        assert_eq!(analysis.category, LogCategory::Code);
    }

    #[test]
    fn unit_service_label_capitalizes_project() {
        assert_eq!(service_label("checkout", "staging"), "Checkout (staging)");
        assert_eq!(service_label("API", "prod"), "Api (prod)");
        assert_eq!(service_label("", "prod"), " (prod)");
    }

    #[test]
    fn functional_neutral_signals_substitute_failed_checks() {
        let failed = CheckResult::failure(CheckErrorCode::HealthCheckError, "boom");
        assert!(!NeutralSignals::drift(&failed).drift_detected());
        assert!(NeutralSignals::health(&failed).is_empty());
        assert_eq!(NeutralSignals::db_status(Some(&failed)), "SKIPPED");
        assert_eq!(NeutralSignals::db_status(None), "SKIPPED");
    }

    #[test]
    fn functional_neutral_signals_read_successful_payloads() {
        let compare = CheckResult::ok(json!({
            "env_1": "staging",
            "env_2": "config/app.json",
            "drift_detected": true,
            "drift_keys": ["db.port"],
            "explanation": "x",
            "suggested_fix": "y",
            "analysis_type": "DRIFT",
            "resolved_path": "config/app.json"
        }));
        let drift = NeutralSignals::drift(&compare);
        assert!(drift.drift_keys().contains("db.port"));

        let health = CheckResult::ok(json!({
            "service_name": "Api (staging)",
            "health_url": "http://api/health",
            "status": "DOWN",
            "latency_ms": 0,
            "http_code": 0,
            "explanation": "down",
            "suggested_fix": "restart"
        }));
        assert_eq!(NeutralSignals::health(&health)[0].status, HealthStatus::Down);

        let db = CheckResult::ok(json!({"db_status": "FAILED"}));
        assert_eq!(NeutralSignals::db_status(Some(&db)), "FAILED");
    }
}
