use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool metadata advertised to the invoking host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Enumerates supported `LogCategory` values.
pub enum LogCategory {
    Infra,
    Code,
    Config,
    Dependency,
    Flaky,
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            LogCategory::Infra => "INFRA",
            LogCategory::Code => "CODE",
            LogCategory::Config => "CONFIG",
            LogCategory::Dependency => "DEPENDENCY",
            LogCategory::Flaky => "FLAKY",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the known set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INFRA" => Some(Self::Infra),
            "CODE" => Some(Self::Code),
            "CONFIG" => Some(Self::Config),
            "DEPENDENCY" => Some(Self::Dependency),
            "FLAKY" => Some(Self::Flaky),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Enumerates supported `Severity` values, ordered from least to most severe.
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the known set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnosis of a build log. Confidence is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAnalysis {
    pub category: LogCategory,
    pub severity: Severity,
    pub confidence: f64,
    pub explanation: String,
    pub suggested_fix: String,
}

impl LogAnalysis {
    pub fn new(
        category: LogCategory,
        severity: Severity,
        confidence: f64,
        explanation: impl Into<String>,
        suggested_fix: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.5
        };
        Self {
            category,
            severity,
            confidence,
            explanation: explanation.into(),
            suggested_fix: suggested_fix.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
/// Enumerates supported `AnalysisType` values.
pub enum AnalysisType {
    Drift,
    Integrity,
}

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::Drift => "DRIFT",
            AnalysisType::Integrity => "INTEGRITY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DriftReportWire {
    #[serde(default)]
    drift_detected: bool,
    #[serde(default)]
    drift_keys: BTreeSet<String>,
    analysis_type: AnalysisType,
    #[serde(default)]
    resolved_path: String,
}

/// Outcome of a drift or integrity audit.
///
/// `drift_detected` is derived from `drift_keys` and cannot be set on its own.
///
/// # Examples
///
/// ```
/// use tollgate_contract::{AnalysisType, DriftReport};
///
/// let clean = DriftReport::new(Vec::<String>::new(), AnalysisType::Drift, "app.env");
/// assert!(!clean.drift_detected());
///
/// let drifted = DriftReport::new(["db.host"], AnalysisType::Drift, "app.env");
/// assert!(drifted.drift_detected());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DriftReportWire", from = "DriftReportWire")]
pub struct DriftReport {
    drift_keys: BTreeSet<String>,
    analysis_type: AnalysisType,
    resolved_path: String,
}

impl DriftReport {
    pub fn new<I, K>(keys: I, analysis_type: AnalysisType, resolved_path: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            drift_keys: keys.into_iter().map(Into::into).collect(),
            analysis_type,
            resolved_path: resolved_path.into(),
        }
    }

    /// Report with no findings.
    pub fn clean(analysis_type: AnalysisType) -> Self {
        Self::new(Vec::<String>::new(), analysis_type, "")
    }

    pub fn drift_detected(&self) -> bool {
        !self.drift_keys.is_empty()
    }

    pub fn drift_keys(&self) -> &BTreeSet<String> {
        &self.drift_keys
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.analysis_type
    }

    pub fn resolved_path(&self) -> &str {
        &self.resolved_path
    }
}

impl From<DriftReport> for DriftReportWire {
    fn from(report: DriftReport) -> Self {
        Self {
            drift_detected: report.drift_detected(),
            drift_keys: report.drift_keys,
            analysis_type: report.analysis_type,
            resolved_path: report.resolved_path,
        }
    }
}

impl From<DriftReportWire> for DriftReport {
    fn from(wire: DriftReportWire) -> Self {
        Self {
            drift_keys: wire.drift_keys,
            analysis_type: wire.analysis_type,
            resolved_path: wire.resolved_path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Down => "DOWN",
        }
    }
}

/// Result of probing one service health endpoint. `http_code == 0` marks a
/// transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub service_name: String,
    pub health_url: String,
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub http_code: u16,
    pub explanation: String,
    pub suggested_fix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DbStatus {
    Connected,
    Failed,
}

impl DbStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DbStatus::Connected => "CONNECTED",
            DbStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbResult {
    pub environment: String,
    pub db_type: String,
    pub db_status: DbStatus,
    pub response_time_ms: u64,
    pub migrations_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessStatus {
    Safe,
    Caution,
    NotSafe,
}

impl ReadinessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadinessStatus::Safe => "SAFE",
            ReadinessStatus::Caution => "CAUTION",
            ReadinessStatus::NotSafe => "NOT_SAFE",
        }
    }
}

impl std::fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    AllowAutomation,
    BlockAutomation,
}

/// Raw per-step payloads that fed a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub build_analysis: Value,
    pub config_audit: Value,
    pub health_status: Value,
    pub db_connectivity: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub readiness_score: u32,
    pub status: ReadinessStatus,
    pub penalties: Vec<String>,
    pub recommendation: Recommendation,
    pub explanation: String,
    pub suggested_fix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_report: Option<AuditReport>,
}

/// Build log text fetched from CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLog {
    pub build_id: String,
    pub repo: String,
    pub log_text: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::{AnalysisType, DriftReport, LogAnalysis, LogCategory, Severity};
    use serde_json::json;

    #[test]
    fn unit_log_analysis_clamps_confidence() {
        let high = LogAnalysis::new(LogCategory::Code, Severity::High, 3.5, "x", "y");
        assert_eq!(high.confidence, 1.0);
        let low = LogAnalysis::new(LogCategory::Code, Severity::High, -1.0, "x", "y");
        assert_eq!(low.confidence, 0.0);
        let nan = LogAnalysis::new(LogCategory::Code, Severity::High, f64::NAN, "x", "y");
        assert_eq!(nan.confidence, 0.5);
    }

    #[test]
    fn unit_enum_parse_is_case_insensitive() {
        assert_eq!(LogCategory::parse(" infra "), Some(LogCategory::Infra));
        assert_eq!(LogCategory::parse("network"), None);
        assert_eq!(Severity::parse("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse("CRITICAL"), None);
        assert!(Severity::High > Severity::Medium && Severity::Medium > Severity::Low);
    }

    #[test]
    fn functional_drift_report_serializes_derived_flag() {
        let report = DriftReport::new(["b.c", "a", "b.c"], AnalysisType::Drift, "/tmp/app.json");
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["drift_detected"], json!(true));
        assert_eq!(value["drift_keys"], json!(["a", "b.c"]));
        assert_eq!(value["analysis_type"], json!("DRIFT"));
        assert_eq!(value["resolved_path"], json!("/tmp/app.json"));
    }

    #[test]
    fn regression_drift_report_ignores_inconsistent_wire_flag() {
        let report: DriftReport = serde_json::from_value(json!({
            "drift_detected": true,
            "drift_keys": [],
            "analysis_type": "INTEGRITY"
        }))
        .expect("deserialize");
        assert!(!report.drift_detected());
        assert_eq!(report.analysis_type(), AnalysisType::Integrity);
    }
}
