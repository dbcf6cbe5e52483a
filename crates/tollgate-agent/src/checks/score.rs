use tollgate_contract::{CheckErrorCode, CheckResult, ScoreResult};
use tollgate_scoring::{PenaltyTable, ReadinessCalculator, ScoreInputs};

use crate::registry::ScoreArgs;

/// Scores loosely-typed signals forwarded by a host.
#[derive(Debug, Clone)]
pub struct ScoreCheck {
    calculator: ReadinessCalculator<PenaltyTable>,
}

impl ScoreCheck {
    pub fn new(calculator: ReadinessCalculator<PenaltyTable>) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &ReadinessCalculator<PenaltyTable> {
        &self.calculator
    }

    pub fn execute(&self, args: ScoreArgs) -> CheckResult {
        match ScoreInputs::from_loose_json(
            &args.log_analysis,
            &args.drift_analysis,
            &args.health_checks,
            &args.db_status,
        ) {
            Ok(inputs) => score_envelope(&self.calculator.calculate(&inputs)),
            Err(error) => CheckResult::failure(CheckErrorCode::ScoreError, error.to_string()),
        }
    }
}

pub(crate) fn score_envelope(score: &ScoreResult) -> CheckResult {
    match serde_json::to_value(score) {
        Ok(data) => CheckResult::ok(data),
        Err(error) => CheckResult::failure(CheckErrorCode::ScoreError, error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::ScoreCheck;
    use crate::registry::ScoreArgs;
    use serde_json::json;
    use tollgate_contract::CheckErrorCode;
    use tollgate_scoring::ReadinessCalculator;

    #[test]
    fn functional_score_check_folds_forwarded_payloads() {
        let result = ScoreCheck::new(ReadinessCalculator::with_default_policy()).execute(ScoreArgs {
            log_analysis: json!({"severity": "MEDIUM"}),
            drift_analysis: json!({"drift_detected": true}),
            health_checks: json!([{"service_name": "api", "status": "DOWN"}]),
            db_status: "CONNECTED".to_string(),
        });
        let data = result.data.expect("data");
        assert_eq!(data["readiness_score"], json!(40));
        assert_eq!(data["status"], json!("NOT_SAFE"));
        assert_eq!(
            data["penalties"],
            json!([
                "Build log severity MEDIUM: -20",
                "Config drift detected: -15",
                "Service api is DOWN: -25"
            ])
        );
        assert!(data.get("audit_report").is_none());
    }

    #[test]
    fn regression_malformed_health_checks_fail_with_score_error() {
        let result = ScoreCheck::new(ReadinessCalculator::with_default_policy()).execute(ScoreArgs {
            log_analysis: json!({}),
            drift_analysis: json!({}),
            health_checks: json!("UP"),
            db_status: "SKIPPED".to_string(),
        });
        assert_eq!(result.error_code(), Some(CheckErrorCode::ScoreError));
    }
}
