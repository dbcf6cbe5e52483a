use std::time::Duration;

use tollgate_settings::TimeoutSettings;

use crate::Cli;

pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DB_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Driver timeouts after applying CLI flags, schema values, and defaults in
/// that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimeouts {
    pub health: Duration,
    pub database: Duration,
    pub request: Duration,
}

impl ResolvedTimeouts {
    pub fn resolve(cli: &Cli, schema: &TimeoutSettings) -> Self {
        Self {
            health: pick(cli.health_timeout_ms, schema.health_check(), DEFAULT_HEALTH_TIMEOUT_MS),
            database: pick(cli.db_timeout_ms, schema.db_check(), DEFAULT_DB_TIMEOUT_MS),
            request: pick(cli.request_timeout_ms, schema.request(), DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn request_ms(&self) -> u64 {
        u64::try_from(self.request.as_millis()).unwrap_or(u64::MAX)
    }
}

fn pick(flag_ms: Option<u64>, schema: Option<Duration>, default_ms: u64) -> Duration {
    flag_ms
        .map(Duration::from_millis)
        .or(schema)
        .unwrap_or_else(|| Duration::from_millis(default_ms))
}

#[cfg(test)]
mod tests {
    use super::{ResolvedTimeouts, DEFAULT_REQUEST_TIMEOUT_MS};
    use crate::Cli;
    use clap::Parser;
    use std::time::Duration;
    use tollgate_settings::TimeoutSettings;

    #[test]
    fn functional_flag_beats_schema_beats_default() {
        let cli = Cli::try_parse_from(["tollgate-server", "--health-timeout-ms", "250"])
            .expect("parse");
        let schema = TimeoutSettings {
            health_check_seconds: Some(10),
            db_check_seconds: Some(3),
            request_seconds: None,
        };

        let resolved = ResolvedTimeouts::resolve(&cli, &schema);

        assert_eq!(resolved.health, Duration::from_millis(250));
        assert_eq!(resolved.database, Duration::from_secs(3));
        assert_eq!(resolved.request_ms(), DEFAULT_REQUEST_TIMEOUT_MS);
    }
}
