//! Shared data contracts for Tollgate readiness evaluation.
//!
//! Defines the `CheckResult` envelope returned by every check, the typed
//! payload models those checks produce, and the resolved environment catalog
//! handed to the evaluation core.

pub mod check_result;
pub mod environment;
pub mod models;

pub use check_result::{CheckError, CheckErrorCode, CheckResult};
pub use environment::{EnvironmentCatalog, EnvironmentDescriptor, ProjectEntry};
pub use models::{
    AnalysisType, AuditReport, BuildLog, DbResult, DbStatus, DriftReport, HealthResult,
    HealthStatus, LogAnalysis, LogCategory, ReadinessStatus, Recommendation, ScoreResult,
    Severity, ToolDefinition,
};
