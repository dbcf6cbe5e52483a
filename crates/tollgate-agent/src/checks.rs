//! Individual readiness checks. Each check returns a [`CheckResult`]
//! envelope and never panics on collaborator failure.

use tollgate_ai::{NarrationPair, Narrator};
use tollgate_contract::{CheckErrorCode, CheckResult};

mod analyze;
mod build_log;
mod config;
mod database;
mod health;
mod score;

pub use analyze::{rule_based_analysis, AnalyzeLogCheck};
pub use build_log::{FetchBuildLogCheck, LatestBuildCheck};
pub use config::{CompareConfigCheck, FetchConfigCheck};
pub use database::DatabaseCheck;
pub use health::HealthCheck;
pub use score::ScoreCheck;
pub(crate) use score::score_envelope;

/// Failure envelope narrated by `narrator`, falling back to `fallback`.
pub(crate) async fn narrated_failure(
    narrator: &Narrator,
    code: CheckErrorCode,
    message: String,
    prompt: &str,
    fallback: NarrationPair,
) -> CheckResult {
    let narration = narrator.narrate_pair(prompt, fallback).await;
    CheckResult::failure(code, message).with_narration(narration.explanation, narration.suggested_fix)
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
