use serde_json::Value;
use tollgate_ai::Narrator;
use tollgate_contract::{CheckErrorCode, CheckResult, LogAnalysis, LogCategory, Severity};

use super::is_blank;
use crate::registry::AnalyzeLogArgs;

const PROMPT_LOG_CHARS: usize = 12_000;
const FALLBACK_CONFIDENCE: f64 = 0.4;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Classifies a build log, preferring the narration service and falling
/// back to keyword rules.
#[derive(Debug, Clone)]
pub struct AnalyzeLogCheck {
    narrator: Narrator,
}

impl AnalyzeLogCheck {
    pub fn new(narrator: Narrator) -> Self {
        Self { narrator }
    }

    pub async fn execute(&self, args: AnalyzeLogArgs) -> CheckResult {
        let analysis = if is_blank(&args.log_text) {
            tracing::debug!("build log is empty; using rule-based analysis");
            rule_based_analysis(&args.log_text)
        } else {
            self.analyze(&args.log_text).await
        };
        match serde_json::to_value(&analysis) {
            Ok(data) => CheckResult::ok(data),
            Err(error) => CheckResult::failure(CheckErrorCode::AnalyzeLogError, error.to_string()),
        }
    }

    pub async fn analyze(&self, log_text: &str) -> LogAnalysis {
        let prompt = format!(
            "Analyze the following build log and determine the root cause. \
             Return JSON only with keys: category (INFRA|CODE|CONFIG|DEPENDENCY|FLAKY), \
             severity (LOW|MEDIUM|HIGH), confidence (float 0-1), root_cause_summary (string), \
             suggested_fix (string).\n\nLog:\n{}",
            prompt_excerpt(log_text)
        );
        match self.narrator.generate_structured(&prompt).await {
            Ok(reply) => match validate_reply(&reply) {
                Some(analysis) => analysis,
                None => {
                    tracing::debug!("narration reply was unstructured; using rule-based analysis");
                    rule_based_analysis(log_text)
                }
            },
            Err(error) => {
                tracing::warn!(error = %error, "log analysis narration failed; using rule-based analysis");
                rule_based_analysis(log_text)
            }
        }
    }
}

// Long logs keep their tail, where failures usually surface.
fn prompt_excerpt(log_text: &str) -> &str {
    let count = log_text.chars().count();
    if count <= PROMPT_LOG_CHARS {
        return log_text;
    }
    log_text
        .char_indices()
        .nth(count - PROMPT_LOG_CHARS)
        .map_or(log_text, |(index, _)| &log_text[index..])
}

/// Converts a structured reply into a [`LogAnalysis`]. Replies carrying
/// neither `category` nor `severity` are rejected.
fn validate_reply(reply: &Value) -> Option<LogAnalysis> {
    let object = reply.as_object()?;
    let category = object.get("category").and_then(Value::as_str);
    let severity = object.get("severity").and_then(Value::as_str);
    if category.is_none() && severity.is_none() {
        return None;
    }
    let text = |keys: &[&str], fallback: &str| {
        keys.iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .filter(|text| !is_blank(text))
            .unwrap_or(fallback)
            .to_string()
    };
    let confidence = match object.get("confidence") {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        Some(Value::String(raw)) => raw.trim().parse().unwrap_or(DEFAULT_CONFIDENCE),
        _ => DEFAULT_CONFIDENCE,
    };
    Some(LogAnalysis::new(
        category.and_then(LogCategory::parse).unwrap_or(LogCategory::Infra),
        severity.and_then(Severity::parse).unwrap_or(Severity::Medium),
        confidence,
        text(&["root_cause_summary", "explanation"], "Unknown"),
        text(&["suggested_fix"], "Manual review required"),
    ))
}

/// Keyword classifier used when narration is unavailable.
///
/// # Examples
///
/// ```
/// use tollgate_agent::checks::rule_based_analysis;
/// use tollgate_contract::{LogCategory, Severity};
///
/// let analysis = rule_based_analysis("ERROR: database connection refused");
/// assert_eq!(analysis.category, LogCategory::Infra);
/// assert_eq!(analysis.severity, Severity::High);
/// ```
pub fn rule_based_analysis(log_text: &str) -> LogAnalysis {
    let upper = log_text.to_uppercase();
    let (category, severity) = if upper.contains("DB") || upper.contains("DATABASE") {
        (LogCategory::Infra, Severity::High)
    } else if upper.contains("DRIFT") {
        (LogCategory::Config, Severity::Medium)
    } else {
        (LogCategory::Code, Severity::Medium)
    };
    LogAnalysis::new(
        category,
        severity,
        FALLBACK_CONFIDENCE,
        "Rule-based analysis (Fallback)",
        "Check logs manually for specific error.",
    )
}

#[cfg(test)]
mod tests {
    use super::{rule_based_analysis, validate_reply, AnalyzeLogCheck};
    use crate::registry::AnalyzeLogArgs;
    use serde_json::json;
    use tollgate_ai::Narrator;
    use tollgate_contract::{LogCategory, Severity};

    #[test]
    fn unit_rule_based_analysis_keyword_order() {
        let drift = rule_based_analysis("config drift found");
        assert_eq!((drift.category, drift.severity), (LogCategory::Config, Severity::Medium));
        let code = rule_based_analysis("assertion failed in test_login");
        assert_eq!((code.category, code.severity), (LogCategory::Code, Severity::Medium));
        let both = rule_based_analysis("db drift");
        assert_eq!(both.category, LogCategory::Infra);
        assert_eq!(code.confidence, 0.4);
        assert_eq!(code.explanation, "Rule-based analysis (Fallback)");
    }

    #[test]
    fn functional_validate_reply_normalises_fields() {
        let analysis = validate_reply(&json!({
            "category": "dependency",
            "severity": "high",
            "confidence": 1.7,
            "root_cause_summary": "lockfile out of date",
            "suggested_fix": "run npm install"
        }))
        .expect("analysis");
        assert_eq!(analysis.category, LogCategory::Dependency);
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.explanation, "lockfile out of date");
    }

    #[test]
    fn regression_validate_reply_defaults_unknown_enums_and_rejects_raw_text() {
        let analysis = validate_reply(&json!({"category": "COSMIC_RAYS", "severity": "??"}))
            .expect("analysis");
        assert_eq!(analysis.category, LogCategory::Infra);
        assert_eq!(analysis.severity, Severity::Medium);
        assert_eq!(analysis.confidence, 0.5);
        assert!(validate_reply(&json!({"raw_text": "looks broken"})).is_none());
    }

    #[tokio::test]
    async fn functional_disabled_narrator_falls_back_to_keyword_rules() {
        let check = AnalyzeLogCheck::new(Narrator::disabled());
        let result = check
            .execute(AnalyzeLogArgs {
                log_text: "Database timeout while migrating".to_string(),
            })
            .await;
        assert!(result.success);
        assert_eq!(result.data.expect("data")["severity"], json!("HIGH"));

    }

    #[tokio::test]
    async fn regression_blank_log_uses_rule_based_analysis() {
        let check = AnalyzeLogCheck::new(Narrator::disabled());
        for log_text in ["", "   \n"] {
            let result = check
                .execute(AnalyzeLogArgs {
                    log_text: log_text.to_string(),
                })
                .await;
            assert!(result.success);
            let data = result.data.expect("data");
            assert_eq!(data["category"], json!("CODE"));
            assert_eq!(data["severity"], json!("MEDIUM"));
            assert_eq!(data["explanation"], json!("Rule-based analysis (Fallback)"));
        }
    }
}
