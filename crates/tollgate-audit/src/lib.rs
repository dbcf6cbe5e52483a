//! Baseline configuration parsing and drift/integrity auditing for Tollgate.
//!
//! A baseline artifact (JSON, YAML, dotenv, `.properties`, Maven `pom.xml`,
//! `Dockerfile`) is parsed into a nested JSON tree and either compared against
//! an actual environment tree (drift mode) or inspected alone for unset and
//! placeholder values (integrity mode). Audits never fail: unreadable
//! baselines surface as sentinel keys in the returned report.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tollgate_contract::{AnalysisType, DriftReport};

pub mod drift;
pub mod formats;
pub mod resolve;

pub use drift::{find_integrity_defects, find_missing_keys};
pub use formats::{parse_baseline, parse_dotenv, BaselineFormat};
pub use resolve::{resolve_baseline_path, DOTENV_VARIANTS};

pub const BASELINE_MISSING: &str = "BASELINE_MISSING";
pub const BASELINE_PARSE_ERROR: &str = "BASELINE_PARSE_ERROR";
pub const BASELINE_EMPTY: &str = "BASELINE_EMPTY";

#[derive(Debug, Error)]
/// Errors raised while loading a baseline artifact.
pub enum AuditError {
    #[error("failed to read baseline {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format} baseline: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Reads and parses the baseline at `path` using the format implied by its
/// file name.
pub fn load_baseline(path: &Path) -> Result<Value, AuditError> {
    let text = std::fs::read_to_string(path).map_err(|source| AuditError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_baseline(BaselineFormat::detect(path), &text)
}

/// Audits `actual` against the baseline found at `baseline_locator`.
///
/// In drift mode every baseline key absent from `actual` is reported as a
/// dotted path. In integrity mode `actual` is ignored and the baseline is
/// inspected for null, empty, and placeholder values.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tollgate_audit::{compare_configs, BASELINE_MISSING};
///
/// let report = compare_configs("/nonexistent/app.json", &json!({}), false);
/// assert!(report.drift_detected());
/// assert!(report.drift_keys().contains(BASELINE_MISSING));
/// ```
pub fn compare_configs(
    baseline_locator: impl AsRef<Path>,
    actual: &Value,
    integrity_mode: bool,
) -> DriftReport {
    let locator = baseline_locator.as_ref();
    let analysis_type = if integrity_mode {
        AnalysisType::Integrity
    } else {
        AnalysisType::Drift
    };

    let Some(path) = resolve_baseline_path(locator) else {
        tracing::warn!(path = %locator.display(), "baseline not found");
        return DriftReport::new(
            [BASELINE_MISSING],
            analysis_type,
            locator.display().to_string(),
        );
    };
    let resolved_path = path.display().to_string();

    let baseline = match load_baseline(&path) {
        Ok(baseline) => baseline,
        Err(error) => {
            tracing::warn!(path = %resolved_path, error = %error, "baseline unreadable");
            return DriftReport::new([BASELINE_PARSE_ERROR], analysis_type, resolved_path);
        }
    };

    let Some(baseline) = baseline.as_object().filter(|map| !map.is_empty()) else {
        tracing::warn!(path = %resolved_path, "baseline has no keys");
        return DriftReport::new([BASELINE_EMPTY], analysis_type, resolved_path);
    };

    let keys = if integrity_mode {
        find_integrity_defects(baseline)
    } else {
        find_missing_keys(baseline, actual)
    };
    tracing::debug!(
        path = %resolved_path,
        mode = analysis_type.as_str(),
        findings = keys.len(),
        "baseline audit complete"
    );
    DriftReport::new(keys, analysis_type, resolved_path)
}

#[cfg(test)]
mod tests {
    use super::{compare_configs, BASELINE_EMPTY, BASELINE_MISSING, BASELINE_PARSE_ERROR};
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;
    use tollgate_contract::AnalysisType;

    #[test]
    fn functional_drift_mode_reports_missing_nested_leaf() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("baseline.json");
        fs::write(&path, r#"{"a":1,"b":{"c":2}}"#).expect("write");

        let report = compare_configs(&path, &json!({"a": 1}), false);
        assert!(report.drift_detected());
        assert!(report.drift_keys().contains("b.c"));
        assert_eq!(report.analysis_type(), AnalysisType::Drift);
        assert_eq!(report.resolved_path(), path.display().to_string());

        let report = compare_configs(&path, &json!({"a": 1, "b": {}}), false);
        assert!(report.drift_keys().contains("b.c"));
    }

    #[test]
    fn functional_integrity_mode_flags_placeholders_only() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("app.yaml");
        fs::write(&path, "key: CHANGE_ME\nhost: example.com/api\n").expect("write");

        let report = compare_configs(&path, &json!({}), true);
        let keys = report.drift_keys().iter().cloned().collect::<Vec<_>>();
        assert_eq!(keys, vec!["key (CHANGE_ME)".to_string()]);
        assert_eq!(report.analysis_type(), AnalysisType::Integrity);
    }

    #[test]
    fn unit_missing_baseline_yields_sentinel() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("absent.json");
        let report = compare_configs(&path, &json!({"a": 1}), false);
        assert_eq!(report.drift_keys().len(), 1);
        assert!(report.drift_keys().contains(BASELINE_MISSING));
        assert_eq!(report.resolved_path(), path.display().to_string());
    }

    #[test]
    fn unit_unparseable_baseline_yields_parse_sentinel() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");
        let report = compare_configs(&path, &json!({}), false);
        assert!(report.drift_keys().contains(BASELINE_PARSE_ERROR));
        assert!(report.drift_detected());
    }

    #[test]
    fn unit_empty_or_scalar_baseline_yields_empty_sentinel() {
        let temp = tempdir().expect("tempdir");
        let empty = temp.path().join("empty.json");
        fs::write(&empty, "{}").expect("write");
        let scalar = temp.path().join("scalar.yaml");
        fs::write(&scalar, "just a string\n").expect("write");

        for path in [empty, scalar] {
            let report = compare_configs(&path, &json!({}), false);
            assert_eq!(
                report.drift_keys().iter().collect::<Vec<_>>(),
                vec![BASELINE_EMPTY]
            );
        }
    }

    #[test]
    fn functional_dotenv_variant_resolution_reports_read_path() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join(".env.example"), "DB_URL=\nAPI_KEY=abc\n").expect("write");

        let report = compare_configs(temp.path().join(".env"), &json!({"API_KEY": "x"}), false);
        assert!(report.resolved_path().ends_with(".env.example"));
        assert_eq!(
            report.drift_keys().iter().collect::<Vec<_>>(),
            vec!["DB_URL"]
        );

        let integrity = compare_configs(temp.path().join(".env"), &json!({}), true);
        assert!(integrity.drift_keys().contains("DB_URL (EMPTY)"));
    }

    #[test]
    fn regression_compare_configs_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("service.properties");
        fs::write(&path, "server.port=8080\nspring.profile: TODO\n# note\n").expect("write");
        let actual = json!({"server.port": 9090});

        let first = compare_configs(&path, &actual, false);
        let second = compare_configs(&path, &actual, false);
        assert_eq!(first, second);
        assert_eq!(
            first.drift_keys().iter().collect::<Vec<_>>(),
            vec!["spring.profile"]
        );
    }
}
