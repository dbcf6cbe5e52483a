use serde_json::Value;
use thiserror::Error;
use tollgate_contract::{
    DriftReport, HealthResult, LogAnalysis, ReadinessStatus, Recommendation, ScoreResult,
};

use crate::policy::{PenaltyTable, ScoringPolicy};

pub const SAFE_THRESHOLD: u32 = 80;
pub const CAUTION_THRESHOLD: u32 = 50;
const MAX_SCORE: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreInputError {
    #[error("'{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Health signal for one service as seen by the calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSignal {
    pub service_name: String,
    pub down: bool,
}

/// Normalised calculator inputs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScoreInputs {
    /// Build-log severity; `None` is scored as LOW.
    pub severity: Option<String>,
    pub drift_detected: bool,
    pub services: Vec<ServiceSignal>,
    pub db_status: String,
}

impl ScoreInputs {
    pub fn from_signals(
        log_analysis: Option<&LogAnalysis>,
        drift_report: &DriftReport,
        health_results: &[HealthResult],
        db_status: &str,
    ) -> Self {
        Self {
            severity: log_analysis.map(|analysis| analysis.severity.as_str().to_string()),
            drift_detected: drift_report.drift_detected(),
            services: health_results
                .iter()
                .map(|result| ServiceSignal {
                    service_name: result.service_name.clone(),
                    down: result.status == tollgate_contract::HealthStatus::Down,
                })
                .collect(),
            db_status: db_status.to_string(),
        }
    }

    /// Builds inputs from the loosely-typed payloads a host forwards from
    /// earlier tool calls. `drift_analysis` may be `{}` and `health_checks`
    /// may be empty.
    pub fn from_loose_json(
        log_analysis: &Value,
        drift_analysis: &Value,
        health_checks: &Value,
        db_status: &str,
    ) -> Result<Self, ScoreInputError> {
        let log_analysis = match log_analysis {
            Value::Null => None,
            Value::Object(map) => Some(map),
            _ => {
                return Err(ScoreInputError::InvalidField {
                    field: "log_analysis",
                    expected: "an object",
                })
            }
        };
        let drift_detected = match drift_analysis {
            Value::Null => false,
            Value::Object(map) => map
                .get("drift_detected")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            _ => {
                return Err(ScoreInputError::InvalidField {
                    field: "drift_analysis",
                    expected: "an object",
                })
            }
        };
        let services = match health_checks {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    let item = item.as_object().ok_or(ScoreInputError::InvalidField {
                        field: "health_checks",
                        expected: "an array of objects",
                    })?;
                    Ok(ServiceSignal {
                        service_name: item
                            .get("service_name")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string(),
                        down: item
                            .get("status")
                            .and_then(Value::as_str)
                            .is_some_and(|status| status.eq_ignore_ascii_case("DOWN")),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(ScoreInputError::InvalidField {
                    field: "health_checks",
                    expected: "an array of objects",
                })
            }
        };
        Ok(Self {
            severity: log_analysis
                .and_then(|map| map.get("severity"))
                .and_then(Value::as_str)
                .map(str::to_string),
            drift_detected,
            services,
            db_status: db_status.to_string(),
        })
    }
}

/// Folds penalties from a [`ScoringPolicy`] into a [`ScoreResult`].
///
/// # Examples
///
/// ```
/// use tollgate_contract::ReadinessStatus;
/// use tollgate_scoring::{ReadinessCalculator, ScoreInputs};
///
/// let calculator = ReadinessCalculator::with_default_policy();
/// let result = calculator.calculate(&ScoreInputs {
///     severity: Some("MEDIUM".to_string()),
///     ..ScoreInputs::default()
/// });
/// assert_eq!(result.readiness_score, 80);
/// assert_eq!(result.status, ReadinessStatus::Safe);
/// ```
#[derive(Debug, Clone)]
pub struct ReadinessCalculator<P = PenaltyTable> {
    policy: P,
}

impl ReadinessCalculator<PenaltyTable> {
    /// Calculator using the built-in [`PenaltyTable`] defaults.
    pub fn with_default_policy() -> Self {
        Self::new(PenaltyTable::default())
    }
}

impl Default for ReadinessCalculator<PenaltyTable> {
    fn default() -> Self {
        Self::with_default_policy()
    }
}

impl<P: ScoringPolicy> ReadinessCalculator<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn calculate(&self, inputs: &ScoreInputs) -> ScoreResult {
        let mut penalties = Vec::new();
        let mut deducted: u32 = 0;

        let severity = inputs
            .severity
            .as_deref()
            .map(|severity| severity.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "LOW".to_string());
        let penalty = self.policy.severity_penalty(&severity);
        if penalty > 0 {
            deducted = deducted.saturating_add(penalty);
            penalties.push(format!("Build log severity {severity}: -{penalty}"));
        }

        if inputs.drift_detected {
            let penalty = self.policy.drift_penalty();
            deducted = deducted.saturating_add(penalty);
            penalties.push(format!("Config drift detected: -{penalty}"));
        }

        for service in inputs.services.iter().filter(|service| service.down) {
            let penalty = self.policy.service_down_penalty();
            deducted = deducted.saturating_add(penalty);
            penalties.push(format!(
                "Service {} is DOWN: -{penalty}",
                service.service_name
            ));
        }

        if inputs.db_status.trim().eq_ignore_ascii_case("FAILED") {
            let penalty = self.policy.db_failure_penalty();
            deducted = deducted.saturating_add(penalty);
            penalties.push(format!("Database connection failed: -{penalty}"));
        }

        let score = MAX_SCORE.saturating_sub(deducted);
        let (status, recommendation) = classify(score);
        let suggested_fix = if penalties.is_empty() {
            "No immediate action required."
        } else {
            "Address the highest severity penalties in the audit report to improve the score."
        };
        ScoreResult {
            readiness_score: score,
            status,
            explanation: format!(
                "Readiness Score: {score}/100. Status: {status}. {} risks identified.",
                penalties.len()
            ),
            penalties,
            recommendation,
            suggested_fix: suggested_fix.to_string(),
            audit_report: None,
        }
    }
}

fn classify(score: u32) -> (ReadinessStatus, Recommendation) {
    if score >= SAFE_THRESHOLD {
        (ReadinessStatus::Safe, Recommendation::AllowAutomation)
    } else if score >= CAUTION_THRESHOLD {
        (ReadinessStatus::Caution, Recommendation::BlockAutomation)
    } else {
        (ReadinessStatus::NotSafe, Recommendation::BlockAutomation)
    }
}
