use std::sync::Arc;

use tollgate_contract::{CheckErrorCode, CheckResult, DbResult, DbStatus};
use tollgate_drivers::{DatabaseKind, DatabaseProber};

use super::is_blank;
use crate::registry::DatabaseCheckArgs;

/// Checks database reachability and migration state for an environment.
///
/// A configured database that cannot be reached or probed is a successful
/// check with `db_status: FAILED`; only a missing URL fails the check itself.
#[derive(Clone)]
pub struct DatabaseCheck {
    prober: Arc<dyn DatabaseProber>,
}

impl std::fmt::Debug for DatabaseCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCheck").finish_non_exhaustive()
    }
}

impl DatabaseCheck {
    pub fn new(prober: Arc<dyn DatabaseProber>) -> Self {
        Self { prober }
    }

    pub async fn execute(&self, args: DatabaseCheckArgs) -> CheckResult {
        let Some(db_url) = args
            .db_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !is_blank(url) && !url.eq_ignore_ascii_case("none"))
        else {
            return CheckResult::failure(
                CheckErrorCode::DbCheckError,
                format!(
                    "No database URL configured for environment '{}'.",
                    args.environment
                ),
            );
        };

        let probe = match self.prober.check_connectivity(db_url).await {
            Ok(probe) => probe,
            Err(error) => {
                tracing::warn!(environment = %args.environment, error = %error, "database probe failed");
                let result = DbResult {
                    environment: args.environment,
                    db_type: DatabaseKind::detect(db_url)
                        .map_or("unknown", DatabaseKind::as_str)
                        .to_string(),
                    db_status: DbStatus::Failed,
                    response_time_ms: 0,
                    migrations_ok: false,
                    error: Some(error.to_string()),
                };
                return db_envelope(&result);
            }
        };
        let migrations_ok = if probe.connected {
            match self.prober.check_migrations(db_url).await {
                Ok(migrations) => migrations.matches,
                Err(error) => {
                    tracing::warn!(environment = %args.environment, error = %error, "migration probe failed");
                    false
                }
            }
        } else {
            false
        };

        let result = DbResult {
            environment: args.environment,
            db_type: probe.kind.as_str().to_string(),
            db_status: if probe.connected {
                DbStatus::Connected
            } else {
                DbStatus::Failed
            },
            response_time_ms: probe.latency_ms,
            migrations_ok,
            error: probe.error,
        };
        db_envelope(&result)
    }
}

fn db_envelope(result: &DbResult) -> CheckResult {
    match serde_json::to_value(result) {
        Ok(data) => CheckResult::ok(data),
        Err(error) => CheckResult::failure(CheckErrorCode::DbCheckError, error.to_string()),
    }
}
