use serde::{Deserialize, Serialize};
use thiserror::Error;
use tollgate_contract::Severity;

/// Maps readiness signals to score penalties.
pub trait ScoringPolicy: Send + Sync {
    /// Penalty for a build-log severity. Unknown severities cost nothing.
    fn severity_penalty(&self, severity: &str) -> u32;
    fn drift_penalty(&self) -> u32;
    /// Charged once per service reported DOWN.
    fn service_down_penalty(&self) -> u32;
    fn db_failure_penalty(&self) -> u32;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PenaltyTableError {
    #[error("severity penalties must be strictly ordered HIGH > MEDIUM > LOW > 0 (got {high}/{medium}/{low})")]
    SeverityOrder { high: u32, medium: u32, low: u32 },
}

/// Data-driven [`ScoringPolicy`], overridable from the `scoring` block of
/// `readiness_schema.json`.
///
/// # Examples
///
/// ```
/// use tollgate_scoring::{PenaltyTable, ScoringPolicy};
///
/// let table = PenaltyTable::default();
/// assert_eq!(table.severity_penalty("high"), 40);
/// assert_eq!(table.severity_penalty("CRITICAL"), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyTable {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub drift: u32,
    pub service_down: u32,
    pub db_failure: u32,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            high: 40,
            medium: 20,
            low: 5,
            drift: 15,
            service_down: 25,
            db_failure: 50,
        }
    }
}

impl PenaltyTable {
    pub fn validate(&self) -> Result<(), PenaltyTableError> {
        if self.high > self.medium && self.medium > self.low && self.low > 0 {
            Ok(())
        } else {
            Err(PenaltyTableError::SeverityOrder {
                high: self.high,
                medium: self.medium,
                low: self.low,
            })
        }
    }
}

impl ScoringPolicy for PenaltyTable {
    fn severity_penalty(&self, severity: &str) -> u32 {
        match Severity::parse(severity) {
            Some(Severity::High) => self.high,
            Some(Severity::Medium) => self.medium,
            Some(Severity::Low) => self.low,
            None => 0,
        }
    }

    fn drift_penalty(&self) -> u32 {
        self.drift
    }

    fn service_down_penalty(&self) -> u32 {
        self.service_down
    }

    fn db_failure_penalty(&self) -> u32 {
        self.db_failure
    }
}

#[cfg(test)]
mod tests {
    use super::{PenaltyTable, PenaltyTableError, ScoringPolicy};
    use serde_json::json;

    #[test]
    fn unit_default_severity_penalties_are_strictly_ordered() {
        let table = PenaltyTable::default();
        let high = table.severity_penalty("HIGH");
        let medium = table.severity_penalty("MEDIUM");
        let low = table.severity_penalty("LOW");
        let unknown = table.severity_penalty("BLOCKER");
        assert!(high > medium && medium > low && low > unknown);
        assert_eq!(unknown, 0);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn unit_severity_lookup_ignores_case() {
        let table = PenaltyTable::default();
        assert_eq!(table.severity_penalty("medium"), 20);
        assert_eq!(table.severity_penalty(" Low "), 5);
    }

    #[test]
    fn functional_partial_override_keeps_remaining_defaults() {
        let table: PenaltyTable =
            serde_json::from_value(json!({"drift": 30, "db_failure": 60})).expect("table");
        assert_eq!(table.drift_penalty(), 30);
        assert_eq!(table.db_failure_penalty(), 60);
        assert_eq!(table.service_down_penalty(), 25);
        assert_eq!(table.severity_penalty("HIGH"), 40);
    }

    #[test]
    fn regression_validate_rejects_inverted_severity_order() {
        let table = PenaltyTable {
            medium: 50,
            ..PenaltyTable::default()
        };
        assert_eq!(
            table.validate(),
            Err(PenaltyTableError::SeverityOrder {
                high: 40,
                medium: 50,
                low: 5
            })
        );
    }
}
