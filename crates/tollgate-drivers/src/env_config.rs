use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Number, Value};

use crate::{DriverError, EnvironmentConfigFetcher};

/// Resolves an environment's live configuration from, in order: process
/// variables prefixed `{ENV}_`, `{config_dir}/{env}.json`, then
/// `{config_dir}/{env}.yaml` or `.yml`.
#[derive(Debug, Clone)]
pub struct LayeredConfigFetcher {
    config_dir: PathBuf,
    vars: Vec<(String, String)>,
}

impl LayeredConfigFetcher {
    /// Snapshots the current process environment.
    pub fn from_process_env(config_dir: impl Into<PathBuf>) -> Self {
        Self::with_vars(config_dir, std::env::vars().collect())
    }

    pub fn with_vars(config_dir: impl Into<PathBuf>, vars: Vec<(String, String)>) -> Self {
        Self {
            config_dir: config_dir.into(),
            vars,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn from_prefixed_vars(&self, environment: &str) -> Option<Value> {
        let prefix = format!("{}_", environment.to_ascii_uppercase());
        let mut config = Map::new();
        for (key, value) in &self.vars {
            if let Some(stripped) = key.strip_prefix(&prefix).filter(|k| !k.is_empty()) {
                config.insert(stripped.to_ascii_lowercase(), parse_env_value(value));
            }
        }
        (!config.is_empty()).then_some(Value::Object(config))
    }

    async fn from_file(&self, path: &Path) -> Option<Value> {
        let raw = tokio::fs::read_to_string(path).await.ok()?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let parsed = if is_json {
            serde_json::from_str::<Value>(&raw).map_err(|error| error.to_string())
        } else {
            serde_yaml::from_str::<Value>(&raw).map_err(|error| error.to_string())
        };
        match parsed {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "environment config is not a mapping; skipping");
                None
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "failed to parse environment config; skipping");
                None
            }
        }
    }
}

#[async_trait]
impl EnvironmentConfigFetcher for LayeredConfigFetcher {
    async fn fetch(&self, environment: &str) -> Result<Value, DriverError> {
        let environment = environment.trim();
        if environment.is_empty() {
            return Err(DriverError::InvalidArgument(
                "environment name must not be empty".to_string(),
            ));
        }
        if let Some(config) = self.from_prefixed_vars(environment) {
            tracing::debug!(environment, source = "env", "resolved environment config");
            return Ok(config);
        }
        for extension in ["json", "yaml", "yml"] {
            let path = self.config_dir.join(format!("{environment}.{extension}"));
            if let Some(config) = self.from_file(&path).await {
                tracing::debug!(environment, path = %path.display(), "resolved environment config");
                return Ok(config);
            }
        }
        Err(DriverError::NotFound(format!(
            "no configuration found for environment '{environment}'; set {}_* variables or add {}/{environment}.json or .yaml",
            environment.to_ascii_uppercase(),
            self.config_dir.display()
        )))
    }
}

/// Coerces an environment variable value into the closest JSON type.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tollgate_drivers::parse_env_value;
///
/// assert_eq!(parse_env_value("yes"), json!(true));
/// assert_eq!(parse_env_value("8080"), json!(8080));
/// assert_eq!(parse_env_value("[1, 2]"), json!([1, 2]));
/// assert_eq!(parse_env_value("db.internal"), json!("db.internal"));
/// ```
pub fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Value::Bool(true),
        "false" | "no" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }
    Value::String(raw.to_string())
}
