use std::collections::BTreeMap;

use serde_json::Value;
use tollgate_contract::CheckResult;

use crate::registry::CheckStep;

/// Named states of one evaluation, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvaluationStage {
    ConfigLookup,
    FetchLog,
    AnalyzeLog,
    FetchConfig,
    CompareConfig,
    CheckHealth,
    CheckDb,
    Score,
    Notify,
    Done,
}

impl EvaluationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationStage::ConfigLookup => "CONFIG_LOOKUP",
            EvaluationStage::FetchLog => "FETCH_LOG",
            EvaluationStage::AnalyzeLog => "ANALYZE_LOG",
            EvaluationStage::FetchConfig => "FETCH_CONFIG",
            EvaluationStage::CompareConfig => "COMPARE_CONFIG",
            EvaluationStage::CheckHealth => "CHECK_HEALTH",
            EvaluationStage::CheckDb => "CHECK_DB",
            EvaluationStage::Score => "SCORE",
            EvaluationStage::Notify => "NOTIFY",
            EvaluationStage::Done => "DONE",
        }
    }

    /// Failures in gate stages abort the evaluation.
    pub fn is_gate(self) -> bool {
        matches!(self, EvaluationStage::FetchLog | EvaluationStage::AnalyzeLog)
    }

    /// Check executed by this stage, if any.
    pub fn step(self) -> Option<CheckStep> {
        match self {
            EvaluationStage::FetchLog => Some(CheckStep::FetchBuildLog),
            EvaluationStage::AnalyzeLog => Some(CheckStep::AnalyzeBuildLog),
            EvaluationStage::FetchConfig => Some(CheckStep::FetchEnvironmentConfig),
            EvaluationStage::CompareConfig => Some(CheckStep::CompareEnvironmentConfigs),
            EvaluationStage::CheckHealth => Some(CheckStep::CheckServiceHealth),
            EvaluationStage::CheckDb => Some(CheckStep::CheckDatabaseConnection),
            EvaluationStage::Score => Some(CheckStep::CalculateReadinessScore),
            EvaluationStage::ConfigLookup | EvaluationStage::Notify | EvaluationStage::Done => {
                None
            }
        }
    }
}

impl std::fmt::Display for EvaluationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-evaluation record of step results, keyed by tool name.
///
/// Each `evaluate` call builds its own context, so concurrent evaluations
/// never observe each other's results.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    project: String,
    environment: String,
    build_id: String,
    stage: EvaluationStage,
    results: BTreeMap<&'static str, CheckResult>,
}

impl EvaluationContext {
    pub fn new(
        project: impl Into<String>,
        environment: impl Into<String>,
        build_id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
            build_id: build_id.into(),
            stage: EvaluationStage::ConfigLookup,
            results: BTreeMap::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn stage(&self) -> EvaluationStage {
        self.stage
    }

    pub fn enter(&mut self, stage: EvaluationStage) {
        tracing::debug!(
            project = %self.project,
            environment = %self.environment,
            stage = stage.as_str(),
            "entering evaluation stage"
        );
        self.stage = stage;
    }

    /// Stores `result` under the step's tool name, replacing any earlier one.
    pub fn record(&mut self, step: CheckStep, result: CheckResult) {
        self.results.insert(step.tool_name(), result);
    }

    pub fn result(&self, step: CheckStep) -> Option<&CheckResult> {
        self.results.get(step.tool_name())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Copy of every recorded result as JSON.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.results
            .iter()
            .map(|(name, result)| (name.to_string(), result.to_value()))
            .collect()
    }
}
