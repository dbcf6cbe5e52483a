use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use crate::{DatabaseProber, DbProbe, DriverError, MigrationProbe};

/// Database engine inferred from a connection URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Postgresql,
    Mysql,
    Mongodb,
}

impl DatabaseKind {
    /// Detects the engine from `db_url`'s scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use tollgate_drivers::DatabaseKind;
    ///
    /// assert_eq!(
    ///     DatabaseKind::detect("postgres://db:5432/app").unwrap(),
    ///     DatabaseKind::Postgresql
    /// );
    /// assert_eq!(
    ///     DatabaseKind::detect("mongodb+srv://cluster.example.net/app").unwrap(),
    ///     DatabaseKind::Mongodb
    /// );
    /// assert!(DatabaseKind::detect("redis://cache:6379").is_err());
    /// ```
    pub fn detect(db_url: &str) -> Result<Self, DriverError> {
        let Some((scheme, _)) = db_url.trim().split_once("://") else {
            return Err(DriverError::InvalidUrl {
                url: db_url.to_string(),
                reason: "missing scheme".to_string(),
            });
        };
        let scheme = scheme.to_ascii_lowercase();
        let base = scheme.split('+').next().unwrap_or_default();
        match base {
            "postgres" | "postgresql" => Ok(Self::Postgresql),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "mongodb" => Ok(Self::Mongodb),
            _ => Err(DriverError::UnsupportedScheme(scheme)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Mongodb => "mongodb",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Postgresql => 5432,
            Self::Mysql => 3306,
            Self::Mongodb => 27017,
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves `(host, port)` for the first host named in `db_url`.
pub fn database_endpoint(db_url: &str) -> Result<(DatabaseKind, String, u16), DriverError> {
    let kind = DatabaseKind::detect(db_url)?;
    let normalized = first_host_only(db_url.trim());
    let parsed = url::Url::parse(&normalized).map_err(|error| DriverError::InvalidUrl {
        url: redact_credentials(db_url),
        reason: error.to_string(),
    })?;
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| DriverError::InvalidUrl {
            url: redact_credentials(db_url),
            reason: "missing host".to_string(),
        })?
        .trim_matches(|c| c == '[' || c == ']')
        .to_string();
    let port = parsed.port().unwrap_or_else(|| kind.default_port());
    Ok((kind, host, port))
}

// Mongo seed lists ("h1:27017,h2:27017") are not valid URL authorities.
fn first_host_only(db_url: &str) -> String {
    let Some((scheme, rest)) = db_url.split_once("://") else {
        return db_url.to_string();
    };
    let (authority, tail) = match rest.find(['/', '?']) {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };
    let (userinfo, hosts) = match authority.rsplit_once('@') {
        Some((userinfo, hosts)) => (Some(userinfo), hosts),
        None => (None, authority),
    };
    let first = hosts.split(',').next().unwrap_or(hosts);
    match userinfo {
        Some(userinfo) => format!("{scheme}://{userinfo}@{first}{tail}"),
        None => format!("{scheme}://{first}{tail}"),
    }
}

fn redact_credentials(db_url: &str) -> String {
    match (db_url.split_once("://"), db_url.rfind('@')) {
        (Some((scheme, _)), Some(at)) => format!("{scheme}://***{}", &db_url[at..]),
        _ => db_url.to_string(),
    }
}

/// Probes reachability by opening a TCP connection to the database host.
///
/// Schema verification needs an engine-specific driver, so
/// [`DatabaseProber::check_migrations`] only reports that no mismatch was
/// observed.
#[derive(Debug, Clone)]
pub struct TcpDatabaseProber {
    connect_timeout: Duration,
}

impl TcpDatabaseProber {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout: connect_timeout.max(Duration::from_millis(1)),
        }
    }
}

#[async_trait]
impl DatabaseProber for TcpDatabaseProber {
    async fn check_connectivity(&self, db_url: &str) -> Result<DbProbe, DriverError> {
        let (kind, host, port) = database_endpoint(db_url)?;
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port)))
                .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let error = match outcome {
            Ok(Ok(_stream)) => None,
            Ok(Err(error)) => Some(error.to_string()),
            Err(_) => Some(format!(
                "connection timed out after {}ms",
                self.connect_timeout.as_millis()
            )),
        };
        tracing::debug!(
            db_type = %kind,
            host = %host,
            port,
            connected = error.is_none(),
            latency_ms,
            "database probe finished"
        );
        Ok(DbProbe {
            kind,
            connected: error.is_none(),
            latency_ms,
            error,
        })
    }

    async fn check_migrations(&self, db_url: &str) -> Result<MigrationProbe, DriverError> {
        let kind = DatabaseKind::detect(db_url)?;
        Ok(MigrationProbe {
            matches: true,
            current_version: None,
            note: Some(format!(
                "{kind} schema version not inspected; connectivity only"
            )),
        })
    }
}
