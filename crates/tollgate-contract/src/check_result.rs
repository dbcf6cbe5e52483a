use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enumerates the machine-readable failure codes a check can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckErrorCode {
    ConfigError,
    EvaluationAborted,
    AgentError,
    ToolNotFound,
    InvalidArguments,
    FetchLogError,
    AnalyzeLogError,
    FetchConfigError,
    ConfigFetchError,
    ConfigCompareError,
    HealthCheckError,
    DbCheckError,
    ScoreError,
    NoRunsFound,
    FetchError,
}

impl CheckErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckErrorCode::ConfigError => "CONFIG_ERROR",
            CheckErrorCode::EvaluationAborted => "EVALUATION_ABORTED",
            CheckErrorCode::AgentError => "AGENT_ERROR",
            CheckErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            CheckErrorCode::InvalidArguments => "INVALID_ARGUMENTS",
            CheckErrorCode::FetchLogError => "FETCH_LOG_ERROR",
            CheckErrorCode::AnalyzeLogError => "ANALYZE_LOG_ERROR",
            CheckErrorCode::FetchConfigError => "FETCH_CONFIG_ERROR",
            CheckErrorCode::ConfigFetchError => "CONFIG_FETCH_ERROR",
            CheckErrorCode::ConfigCompareError => "CONFIG_COMPARE_ERROR",
            CheckErrorCode::HealthCheckError => "HEALTH_CHECK_ERROR",
            CheckErrorCode::DbCheckError => "DB_CHECK_ERROR",
            CheckErrorCode::ScoreError => "SCORE_ERROR",
            CheckErrorCode::NoRunsFound => "NO_RUNS_FOUND",
            CheckErrorCode::FetchError => "FETCH_ERROR",
        }
    }
}

impl std::fmt::Display for CheckErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure half of a [`CheckResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckError {
    pub code: CheckErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

/// Uniform envelope returned by every check and by the composite evaluation.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tollgate_contract::{CheckErrorCode, CheckResult};
///
/// let ok = CheckResult::ok(json!({ "status": "UP" }));
/// assert!(ok.success);
///
/// let failed = CheckResult::failure(CheckErrorCode::FetchLogError, "run not found");
/// assert!(!failed.success);
/// assert_eq!(failed.error_message(), Some("run not found"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckError>,
}

impl CheckResult {
    /// Creates a successful result carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Creates a failed result with a code and human-readable message.
    pub fn failure(code: CheckErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CheckError {
                code,
                message: message.into(),
                explanation: None,
                suggested_fix: None,
            }),
        }
    }

    /// Attaches narration to a failed result. No-op on success.
    pub fn with_narration(
        mut self,
        explanation: impl Into<String>,
        suggested_fix: impl Into<String>,
    ) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.explanation = Some(explanation.into());
            error.suggested_fix = Some(suggested_fix.into());
        }
        self
    }

    pub fn error_code(&self) -> Option<CheckErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }

    /// Returns the payload when the check succeeded.
    pub fn success_data(&self) -> Option<&Value> {
        if self.success {
            self.data.as_ref()
        } else {
            None
        }
    }

    /// Returns the payload for a successful check or the serialized error
    /// envelope for a failed one.
    pub fn payload_or_error(&self) -> Value {
        match (self.success, &self.data, &self.error) {
            (true, Some(data), _) => data.clone(),
            (false, _, Some(error)) => {
                serde_json::to_value(error).unwrap_or_else(|_| Value::Object(Default::default()))
            }
            _ => Value::Object(Default::default()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "success": self.success,
            })
        })
    }
}
