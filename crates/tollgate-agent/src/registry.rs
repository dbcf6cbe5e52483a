//! Compile-time registry of readiness checks.
//!
//! Steps are a closed enum; tool names are only looked up when a request
//! arrives from the host boundary.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tollgate_ai::Narrator;
use tollgate_contract::{CheckResult, ToolDefinition};
use tollgate_drivers::{
    BuildLogFetcher, DatabaseProber, DeploymentNotifier, EnvironmentConfigFetcher, HealthProber,
};
use tollgate_scoring::{PenaltyTable, ReadinessCalculator};

use crate::checks::{
    AnalyzeLogCheck, CompareConfigCheck, DatabaseCheck, FetchBuildLogCheck, FetchConfigCheck,
    HealthCheck, LatestBuildCheck, ScoreCheck,
};

pub const DEFAULT_TEMPLATE_DIR: &str = "config/templates";

/// Enumerates the individually invokable readiness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckStep {
    FetchBuildLog,
    GetLatestBuild,
    AnalyzeBuildLog,
    FetchEnvironmentConfig,
    CompareEnvironmentConfigs,
    CheckServiceHealth,
    CheckDatabaseConnection,
    CalculateReadinessScore,
}

impl CheckStep {
    pub const ALL: [CheckStep; 8] = [
        CheckStep::FetchBuildLog,
        CheckStep::GetLatestBuild,
        CheckStep::AnalyzeBuildLog,
        CheckStep::FetchEnvironmentConfig,
        CheckStep::CompareEnvironmentConfigs,
        CheckStep::CheckServiceHealth,
        CheckStep::CheckDatabaseConnection,
        CheckStep::CalculateReadinessScore,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            CheckStep::FetchBuildLog => "fetch_build_log",
            CheckStep::GetLatestBuild => "get_latest_build",
            CheckStep::AnalyzeBuildLog => "analyze_build_log",
            CheckStep::FetchEnvironmentConfig => "fetch_environment_config",
            CheckStep::CompareEnvironmentConfigs => "compare_environment_configs",
            CheckStep::CheckServiceHealth => "check_service_health",
            CheckStep::CheckDatabaseConnection => "check_database_connection",
            CheckStep::CalculateReadinessScore => "calculate_readiness_score",
        }
    }

    /// Resolves a host-supplied tool name.
    ///
    /// # Examples
    ///
    /// ```
    /// use tollgate_agent::CheckStep;
    ///
    /// assert_eq!(
    ///     CheckStep::from_tool_name("check_service_health"),
    ///     Some(CheckStep::CheckServiceHealth)
    /// );
    /// assert_eq!(CheckStep::from_tool_name("deploy_now"), None);
    /// ```
    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|step| step.tool_name() == name.trim())
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, parameters) = match self {
            CheckStep::FetchBuildLog => (
                "Fetch the raw CI log for a build run.",
                json!({
                    "type": "object",
                    "properties": {
                        "build_id": {"type": "string", "description": "CI run id"},
                        "repo": {"type": "string", "description": "owner/name; defaults to the configured repository"}
                    },
                    "required": ["build_id"]
                }),
            ),
            CheckStep::GetLatestBuild => (
                "Find the most recent completed workflow run and narrate its outcome.",
                json!({
                    "type": "object",
                    "properties": {
                        "repo": {"type": "string"},
                        "workflow_name": {"type": "string"},
                        "branch": {"type": "string"},
                        "include_log": {"type": "boolean", "default": false}
                    }
                }),
            ),
            CheckStep::AnalyzeBuildLog => (
                "Classify a build log by root-cause category and severity.",
                json!({
                    "type": "object",
                    "properties": {"log_text": {"type": "string"}},
                    "required": ["log_text"]
                }),
            ),
            CheckStep::FetchEnvironmentConfig => (
                "Fetch the live configuration of an environment.",
                json!({
                    "type": "object",
                    "properties": {"environment": {"type": "string"}},
                    "required": ["environment"]
                }),
            ),
            CheckStep::CompareEnvironmentConfigs => (
                "Audit an environment's configuration against a baseline template for drift or integrity defects.",
                json!({
                    "type": "object",
                    "properties": {
                        "env_1": {"type": "string", "description": "environment whose live config is audited"},
                        "env_2": {"type": "string", "description": "baseline template path or name"},
                        "integrity_mode": {"type": "boolean", "default": false}
                    },
                    "required": ["env_1", "env_2"]
                }),
            ),
            CheckStep::CheckServiceHealth => (
                "Probe a service health endpoint.",
                json!({
                    "type": "object",
                    "properties": {
                        "service_name": {"type": "string"},
                        "health_url": {"type": "string"}
                    },
                    "required": ["service_name", "health_url"]
                }),
            ),
            CheckStep::CheckDatabaseConnection => (
                "Check database reachability for an environment.",
                json!({
                    "type": "object",
                    "properties": {
                        "environment": {"type": "string"},
                        "db_url": {"type": "string", "description": "overrides the configured database URL"}
                    },
                    "required": ["environment"]
                }),
            ),
            CheckStep::CalculateReadinessScore => (
                "Fold check results into a 0-100 readiness score and recommendation.",
                json!({
                    "type": "object",
                    "properties": {
                        "log_analysis": {"type": "object"},
                        "drift_analysis": {"type": "object"},
                        "health_checks": {"type": "array", "items": {"type": "object"}},
                        "db_status": {"type": "string"}
                    },
                    "required": ["log_analysis", "drift_analysis", "health_checks", "db_status"]
                }),
            ),
        };
        ToolDefinition {
            name: self.tool_name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

impl std::fmt::Display for CheckStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool_name())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

fn default_db_status() -> String {
    "SKIPPED".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchBuildLogArgs {
    #[serde(deserialize_with = "string_or_number")]
    pub build_id: String,
    #[serde(default)]
    pub repo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LatestBuildArgs {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub include_log: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalyzeLogArgs {
    pub log_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchConfigArgs {
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompareConfigArgs {
    pub env_1: String,
    pub env_2: String,
    #[serde(default)]
    pub integrity_mode: bool,
    /// Live config already fetched by the caller; fetched on demand when
    /// absent.
    #[serde(skip)]
    pub actual: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthCheckArgs {
    pub service_name: String,
    pub health_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseCheckArgs {
    pub environment: String,
    #[serde(default)]
    pub db_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoreArgs {
    #[serde(default)]
    pub log_analysis: Value,
    #[serde(default)]
    pub drift_analysis: Value,
    #[serde(default)]
    pub health_checks: Value,
    #[serde(default = "default_db_status")]
    pub db_status: String,
}

/// A check invocation with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRequest {
    FetchBuildLog(FetchBuildLogArgs),
    GetLatestBuild(LatestBuildArgs),
    AnalyzeBuildLog(AnalyzeLogArgs),
    FetchEnvironmentConfig(FetchConfigArgs),
    CompareEnvironmentConfigs(CompareConfigArgs),
    CheckServiceHealth(HealthCheckArgs),
    CheckDatabaseConnection(DatabaseCheckArgs),
    CalculateReadinessScore(ScoreArgs),
}

impl StepRequest {
    pub fn step(&self) -> CheckStep {
        match self {
            StepRequest::FetchBuildLog(_) => CheckStep::FetchBuildLog,
            StepRequest::GetLatestBuild(_) => CheckStep::GetLatestBuild,
            StepRequest::AnalyzeBuildLog(_) => CheckStep::AnalyzeBuildLog,
            StepRequest::FetchEnvironmentConfig(_) => CheckStep::FetchEnvironmentConfig,
            StepRequest::CompareEnvironmentConfigs(_) => CheckStep::CompareEnvironmentConfigs,
            StepRequest::CheckServiceHealth(_) => CheckStep::CheckServiceHealth,
            StepRequest::CheckDatabaseConnection(_) => CheckStep::CheckDatabaseConnection,
            StepRequest::CalculateReadinessScore(_) => CheckStep::CalculateReadinessScore,
        }
    }

    /// Decodes host-supplied JSON arguments for `step`. `null` is treated as
    /// an empty object.
    pub fn from_arguments(step: CheckStep, arguments: Value) -> Result<Self, serde_json::Error> {
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };
        Ok(match step {
            CheckStep::FetchBuildLog => StepRequest::FetchBuildLog(serde_json::from_value(arguments)?),
            CheckStep::GetLatestBuild => {
                StepRequest::GetLatestBuild(serde_json::from_value(arguments)?)
            }
            CheckStep::AnalyzeBuildLog => {
                StepRequest::AnalyzeBuildLog(serde_json::from_value(arguments)?)
            }
            CheckStep::FetchEnvironmentConfig => {
                StepRequest::FetchEnvironmentConfig(serde_json::from_value(arguments)?)
            }
            CheckStep::CompareEnvironmentConfigs => {
                StepRequest::CompareEnvironmentConfigs(serde_json::from_value(arguments)?)
            }
            CheckStep::CheckServiceHealth => {
                StepRequest::CheckServiceHealth(serde_json::from_value(arguments)?)
            }
            CheckStep::CheckDatabaseConnection => {
                StepRequest::CheckDatabaseConnection(serde_json::from_value(arguments)?)
            }
            CheckStep::CalculateReadinessScore => {
                StepRequest::CalculateReadinessScore(serde_json::from_value(arguments)?)
            }
        })
    }
}

/// External services the checks depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub build_logs: Arc<dyn BuildLogFetcher>,
    pub health: Arc<dyn HealthProber>,
    pub database: Arc<dyn DatabaseProber>,
    pub environment_config: Arc<dyn EnvironmentConfigFetcher>,
    pub notifier: Arc<dyn DeploymentNotifier>,
    pub narrator: Narrator,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("narrator", &self.narrator)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
/// Public struct `CheckSettings` used across Tollgate components.
pub struct CheckSettings {
    /// Repository used when a request names none.
    pub default_repo: Option<String>,
    /// Directory searched for `{name}.yaml` when a baseline is given by name.
    pub template_dir: PathBuf,
    pub penalties: PenaltyTable,
    /// Database probed by direct checks when neither the request nor the
    /// catalog names one.
    pub target_db_url: Option<String>,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            default_repo: None,
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            penalties: PenaltyTable::default(),
            target_db_url: None,
        }
    }
}

/// Owns one instance of every check and dispatches [`StepRequest`]s to them.
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    fetch_log: FetchBuildLogCheck,
    latest_build: LatestBuildCheck,
    analyze: AnalyzeLogCheck,
    fetch_config: FetchConfigCheck,
    compare: CompareConfigCheck,
    health: HealthCheck,
    database: DatabaseCheck,
    score: ScoreCheck,
}

impl CheckRegistry {
    pub fn new(collaborators: &Collaborators, settings: CheckSettings) -> Self {
        let narrator = collaborators.narrator.clone();
        Self {
            fetch_log: FetchBuildLogCheck::new(
                collaborators.build_logs.clone(),
                settings.default_repo.clone(),
            ),
            latest_build: LatestBuildCheck::new(
                collaborators.build_logs.clone(),
                narrator.clone(),
                settings.default_repo.clone(),
            ),
            analyze: AnalyzeLogCheck::new(narrator.clone()),
            fetch_config: FetchConfigCheck::new(collaborators.environment_config.clone()),
            compare: CompareConfigCheck::new(
                collaborators.environment_config.clone(),
                narrator.clone(),
                settings.template_dir,
            ),
            health: HealthCheck::new(collaborators.health.clone(), narrator),
            database: DatabaseCheck::new(collaborators.database.clone()),
            score: ScoreCheck::new(ReadinessCalculator::new(settings.penalties)),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        CheckStep::ALL.into_iter().map(CheckStep::definition).collect()
    }

    pub fn compare(&self) -> &CompareConfigCheck {
        &self.compare
    }

    pub fn score(&self) -> &ScoreCheck {
        &self.score
    }

    pub async fn run(&self, request: StepRequest) -> CheckResult {
        let step = request.step();
        tracing::debug!(step = step.tool_name(), "running check");
        let result = match request {
            StepRequest::FetchBuildLog(args) => self.fetch_log.execute(args).await,
            StepRequest::GetLatestBuild(args) => self.latest_build.execute(args).await,
            StepRequest::AnalyzeBuildLog(args) => self.analyze.execute(args).await,
            StepRequest::FetchEnvironmentConfig(args) => self.fetch_config.execute(args).await,
            StepRequest::CompareEnvironmentConfigs(args) => self.compare.execute(args).await,
            StepRequest::CheckServiceHealth(args) => self.health.execute(args).await,
            StepRequest::CheckDatabaseConnection(args) => self.database.execute(args).await,
            StepRequest::CalculateReadinessScore(args) => self.score.execute(args),
        };
        if let Some(code) = result.error_code() {
            tracing::debug!(step = step.tool_name(), code = code.as_str(), "check failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{CheckStep, StepRequest};
    use serde_json::{json, Value};

    #[test]
    fn unit_tool_names_round_trip_through_lookup() {
        for step in CheckStep::ALL {
            assert_eq!(CheckStep::from_tool_name(step.tool_name()), Some(step));
            assert_eq!(step.definition().name, step.tool_name());
        }
        assert_eq!(CheckStep::from_tool_name("evaluate_build"), None);
    }

    #[test]
    fn functional_from_arguments_accepts_numeric_build_ids() {
        let request =
            StepRequest::from_arguments(CheckStep::FetchBuildLog, json!({"build_id": 12345}))
                .expect("request");
        match request {
            StepRequest::FetchBuildLog(args) => {
                assert_eq!(args.build_id, "12345");
                assert!(args.repo.is_none());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn functional_from_arguments_applies_defaults() {
        let request = StepRequest::from_arguments(CheckStep::GetLatestBuild, Value::Null)
            .expect("request");
        assert_eq!(request.step(), CheckStep::GetLatestBuild);

        let score = StepRequest::from_arguments(
            CheckStep::CalculateReadinessScore,
            json!({"log_analysis": {"severity": "LOW"}}),
        )
        .expect("score");
        match score {
            StepRequest::CalculateReadinessScore(args) => {
                assert_eq!(args.db_status, "SKIPPED");
                assert!(args.health_checks.is_null());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn regression_from_arguments_rejects_missing_required_fields() {
        assert!(StepRequest::from_arguments(
            CheckStep::CheckServiceHealth,
            json!({"service_name": "api"})
        )
        .is_err());
        assert!(StepRequest::from_arguments(
            CheckStep::FetchBuildLog,
            json!({"build_id": ["nested"]})
        )
        .is_err());
    }
}
