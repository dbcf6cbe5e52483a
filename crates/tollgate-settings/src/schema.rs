use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tollgate_contract::{EnvironmentCatalog, EnvironmentDescriptor, ProjectEntry};
use tollgate_scoring::{PenaltyTable, PenaltyTableError};

pub const DEFAULT_SCHEMA_PATH: &str = "readiness_schema.json";

const REQUIRED_TOP_LEVEL_KEYS: [&str; 3] = ["project_name", "projects", "mandatory_env_vars"];
const REQUIRED_ENVIRONMENT_KEYS: [&str; 3] = ["health_url", "db_url", "config_template"];

#[derive(Debug, Error)]
/// Errors raised while loading `readiness_schema.json`.
pub enum SettingsError {
    #[error(
        "Config file not found: {}\nTo generate a default config, run the 'initialize_config' tool or: tollgate-server --init-config",
        .path.display()
    )]
    NotFound { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON format in {}: {message}", .path.display())]
    InvalidJson { path: PathBuf, message: String },
    #[error("Missing required top-level key: '{0}'")]
    MissingTopLevelKey(String),
    #[error("'projects' must be a JSON object")]
    ProjectsNotObject,
    #[error("Project '{0}' is missing 'environments' object")]
    MissingEnvironments(String),
    #[error("Project '{project}' env '{environment}' is missing required key: '{key}'")]
    MissingEnvironmentKey {
        project: String,
        environment: String,
        key: String,
    },
    #[error("invalid readiness schema: {0}")]
    InvalidField(String),
    #[error("invalid scoring block: {0}")]
    InvalidScoring(#[from] PenaltyTableError),
    #[error("Missing required environment variables in .env:\n{}", format_missing(.0))]
    MissingEnvVars(Vec<String>),
}

fn format_missing(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!(" - {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Optional probe timeouts, in seconds.
pub struct TimeoutSettings {
    #[serde(default)]
    pub health_check_seconds: Option<u64>,
    #[serde(default)]
    pub db_check_seconds: Option<u64>,
    #[serde(default)]
    pub request_seconds: Option<u64>,
}

impl TimeoutSettings {
    pub fn health_check(&self) -> Option<Duration> {
        self.health_check_seconds.map(Duration::from_secs)
    }

    pub fn db_check(&self) -> Option<Duration> {
        self.db_check_seconds.map(Duration::from_secs)
    }

    pub fn request(&self) -> Option<Duration> {
        self.request_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `EnvironmentSchema` used across Tollgate components.
pub struct EnvironmentSchema {
    pub health_url: String,
    /// Connection URL, or `none` when the environment has no database.
    pub db_url: String,
    pub config_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ProjectSchema` used across Tollgate components.
pub struct ProjectSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    pub environments: BTreeMap<String, EnvironmentSchema>,
}

/// Typed contents of `readiness_schema.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessSchema {
    pub project_name: String,
    pub projects: BTreeMap<String, ProjectSchema>,
    pub mandatory_env_vars: Vec<String>,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<PenaltyTable>,
}

impl ReadinessSchema {
    /// True for the empty schema returned when a non-fail-fast load finds
    /// no file.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.project_name.is_empty()
    }

    pub fn penalties(&self) -> PenaltyTable {
        self.scoring.unwrap_or_default()
    }

    pub fn to_catalog(&self) -> EnvironmentCatalog {
        let projects = self
            .projects
            .iter()
            .map(|(name, project)| {
                let environments = project
                    .environments
                    .iter()
                    .map(|(env_name, env)| {
                        (
                            env_name.clone(),
                            EnvironmentDescriptor {
                                health_url: env.health_url.clone(),
                                db_url: Some(env.db_url.clone()),
                                config_template: env.config_template.clone(),
                                repo: env.repo.clone(),
                            },
                        )
                    })
                    .collect();
                (
                    name.clone(),
                    ProjectEntry {
                        repo: project.repo.clone(),
                        environments,
                    },
                )
            })
            .collect();
        EnvironmentCatalog { projects }
    }
}

/// Loads and validates `path` against the process environment.
///
/// With `fail_fast == false` a missing file yields an empty schema; every
/// other problem is still an error.
pub fn load_schema(path: &Path, fail_fast: bool) -> Result<ReadinessSchema, SettingsError> {
    load_schema_with_env(path, fail_fast, |name| std::env::var(name).ok())
}

/// Like [`load_schema`], resolving mandatory variables through `lookup`.
pub fn load_schema_with_env<F>(
    path: &Path,
    fail_fast: bool,
    lookup: F,
) -> Result<ReadinessSchema, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    if !path.exists() {
        if fail_fast {
            return Err(SettingsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(path = %path.display(), "readiness schema not found; using empty schema");
        return Ok(ReadinessSchema::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document =
        serde_json::from_str::<Value>(&raw).map_err(|error| SettingsError::InvalidJson {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
    validate_structure(&document)?;

    let schema = serde_json::from_value::<ReadinessSchema>(document)
        .map_err(|error| SettingsError::InvalidField(error.to_string()))?;
    if let Some(scoring) = schema.scoring.as_ref() {
        scoring.validate()?;
    }

    let missing = schema
        .mandatory_env_vars
        .iter()
        .filter(|name| !lookup(name.as_str()).is_some_and(|value| !value.is_empty()))
        .cloned()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(SettingsError::MissingEnvVars(missing));
    }

    tracing::info!(
        path = %path.display(),
        projects = schema.projects.len(),
        "readiness schema loaded"
    );
    Ok(schema)
}

/// Checks required keys before typed decoding so the first missing key is
/// reported by name.
fn validate_structure(document: &Value) -> Result<(), SettingsError> {
    let Some(root) = document.as_object() else {
        return Err(SettingsError::InvalidField(
            "top level must be a JSON object".to_string(),
        ));
    };
    for key in REQUIRED_TOP_LEVEL_KEYS {
        if !root.contains_key(key) {
            return Err(SettingsError::MissingTopLevelKey(key.to_string()));
        }
    }
    let Some(projects) = root.get("projects").and_then(Value::as_object) else {
        return Err(SettingsError::ProjectsNotObject);
    };
    for (project, entry) in projects {
        let Some(environments) = entry.get("environments").and_then(Value::as_object) else {
            return Err(SettingsError::MissingEnvironments(project.clone()));
        };
        for (environment, descriptor) in environments {
            for key in REQUIRED_ENVIRONMENT_KEYS {
                if descriptor.get(key).is_none() {
                    return Err(SettingsError::MissingEnvironmentKey {
                        project: project.clone(),
                        environment: environment.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_schema_with_env, SettingsError};
    use serde_json::json;
    use std::path::Path;
    use tempfile::tempdir;

    fn sample_schema() -> serde_json::Value {
        json!({
            "project_name": "Readiness Hub",
            "projects": {
                "checkout": {
                    "repo": "acme/checkout",
                    "environments": {
                        "staging": {
                            "health_url": "http://checkout.staging/health",
                            "db_url": "postgres://app@db:5432/app",
                            "config_template": "config/staging.json"
                        },
                        "preview": {
                            "health_url": "http://checkout.preview/health",
                            "db_url": "none",
                            "config_template": "config/preview.json",
                            "repo": "acme/checkout-preview"
                        }
                    }
                }
            },
            "mandatory_env_vars": ["COHERE_API_KEY", "GITHUB_TOKEN"],
            "timeouts": {"health_check_seconds": 10}
        })
    }

    fn write(path: &Path, value: &serde_json::Value) {
        std::fs::write(path, serde_json::to_string_pretty(value).expect("encode"))
            .expect("write schema");
    }

    fn all_set(_name: &str) -> Option<String> {
        Some("set".to_string())
    }

    #[test]
    fn functional_schema_loads_into_catalog() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("readiness_schema.json");
        write(&path, &sample_schema());

        let schema = load_schema_with_env(&path, true, all_set).expect("schema");
        assert_eq!(schema.timeouts.health_check_seconds, Some(10));
        assert_eq!(schema.penalties(), tollgate_scoring::PenaltyTable::default());

        let catalog = schema.to_catalog();
        let staging = catalog.resolve("checkout", "staging").expect("staging");
        assert_eq!(staging.repo.as_deref(), Some("acme/checkout"));
        assert_eq!(staging.database_url(), Some("postgres://app@db:5432/app"));
        let preview = catalog.resolve("checkout", "preview").expect("preview");
        assert_eq!(preview.repo.as_deref(), Some("acme/checkout-preview"));
        assert_eq!(preview.database_url(), None);
    }

    #[test]
    fn functional_missing_file_depends_on_fail_fast() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("absent.json");

        let error = load_schema_with_env(&path, true, all_set).expect_err("missing");
        assert!(matches!(error, SettingsError::NotFound { .. }));
        assert!(error.to_string().contains("--init-config"));

        let schema = load_schema_with_env(&path, false, all_set).expect("empty schema");
        assert!(schema.is_empty());
        assert!(schema.to_catalog().is_empty());
    }

    #[test]
    fn regression_missing_top_level_key_is_named() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("schema.json");
        let mut document = sample_schema();
        document
            .as_object_mut()
            .expect("object")
            .remove("mandatory_env_vars");
        write(&path, &document);

        let error = load_schema_with_env(&path, true, all_set).expect_err("invalid");
        assert_eq!(
            error.to_string(),
            "Missing required top-level key: 'mandatory_env_vars'"
        );
    }

    #[test]
    fn regression_missing_environment_key_is_named() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("schema.json");
        let mut document = sample_schema();
        document["projects"]["checkout"]["environments"]["staging"]
            .as_object_mut()
            .expect("staging")
            .remove("db_url");
        write(&path, &document);

        let error = load_schema_with_env(&path, true, all_set).expect_err("invalid");
        assert_eq!(
            error.to_string(),
            "Project 'checkout' env 'staging' is missing required key: 'db_url'"
        );
    }

    #[test]
    fn regression_projects_must_be_an_object() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("schema.json");
        let mut document = sample_schema();
        document["projects"] = json!([]);
        write(&path, &document);

        let error = load_schema_with_env(&path, true, all_set).expect_err("invalid");
        assert!(matches!(error, SettingsError::ProjectsNotObject));
    }

    #[test]
    fn functional_missing_env_vars_are_reported_together() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("schema.json");
        write(&path, &sample_schema());

        let error = load_schema_with_env(&path, true, |name| {
            (name == "GITHUB_TOKEN").then(String::new)
        })
        .expect_err("missing vars");
        assert_eq!(
            error.to_string(),
            "Missing required environment variables in .env:\n - COHERE_API_KEY\n - GITHUB_TOKEN"
        );
    }

    #[test]
    fn regression_invalid_json_reports_path() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("schema.json");
        std::fs::write(&path, "{not json").expect("write");

        let error = load_schema_with_env(&path, false, all_set).expect_err("invalid json");
        assert!(error.to_string().starts_with("Invalid JSON format in"));
    }

    #[test]
    fn regression_scoring_block_must_keep_severity_order() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("schema.json");
        let mut document = sample_schema();
        document["scoring"] = json!({"high": 10, "medium": 20});
        write(&path, &document);

        let error = load_schema_with_env(&path, true, all_set).expect_err("bad scoring");
        assert!(matches!(error, SettingsError::InvalidScoring(_)));
    }
}
