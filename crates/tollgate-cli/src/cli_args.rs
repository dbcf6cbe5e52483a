use std::path::PathBuf;

use clap::{ArgAction, Parser};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_non_empty(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("value must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tollgate-server",
    about = "Deployment readiness evaluator served over MCP stdio",
    version
)]
/// Public struct `Cli` used across Tollgate components.
pub struct Cli {
    #[arg(
        long = "schema-path",
        env = "TOLLGATE_SCHEMA_PATH",
        default_value = "readiness_schema.json",
        help = "Path to the readiness schema describing projects and environments"
    )]
    pub schema_path: PathBuf,

    #[arg(
        long = "init-config",
        default_value_t = false,
        action = ArgAction::SetTrue,
        help = "Scan the workspace, write a starter readiness schema, and exit"
    )]
    pub init_config: bool,

    #[arg(
        long = "workspace-root",
        env = "TOLLGATE_WORKSPACE_ROOT",
        default_value = ".",
        help = "Directory scanned for project markers by --init-config and the initialize_config tool"
    )]
    pub workspace_root: PathBuf,

    #[arg(
        long = "config-dir",
        env = "CONFIG_DIR",
        default_value = "./config",
        help = "Directory holding per-environment JSON or YAML files for live config fetches"
    )]
    pub config_dir: PathBuf,

    #[arg(
        long = "template-dir",
        env = "TOLLGATE_TEMPLATE_DIR",
        help = "Base directory used to resolve relative config_template paths"
    )]
    pub template_dir: Option<PathBuf>,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token for the GitHub Actions API; requests are anonymous when unset"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "github-api-base",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        value_parser = parse_non_empty,
        help = "Base URL for the GitHub REST API"
    )]
    pub github_api_base: String,

    #[arg(
        long = "github-repo",
        env = "GITHUB_REPOSITORY",
        help = "Default owner/name repository used when a project does not declare one"
    )]
    pub github_repo: Option<String>,

    #[arg(
        long = "cohere-api-key",
        env = "COHERE_API_KEY",
        hide_env_values = true,
        help = "Cohere API key; narration falls back to rule-based text when unset"
    )]
    pub cohere_api_key: Option<String>,

    #[arg(
        long = "cohere-api-base",
        env = "COHERE_API_BASE",
        default_value = "https://api.cohere.ai/v1",
        value_parser = parse_non_empty,
        help = "Base URL for the Cohere chat API"
    )]
    pub cohere_api_base: String,

    #[arg(
        long = "cohere-model",
        env = "COHERE_MODEL",
        default_value = "command-r-08-2024",
        value_parser = parse_non_empty,
        help = "Cohere model used for narration and log classification"
    )]
    pub cohere_model: String,

    #[arg(
        long = "slack-webhook-url",
        env = "SLACK_WEBHOOK_URL",
        hide_env_values = true,
        help = "Incoming webhook for deployment alerts; alerts are skipped when unset"
    )]
    pub slack_webhook_url: Option<String>,

    #[arg(
        long = "target-db-url",
        env = "TARGET_DB_URL",
        hide_env_values = true,
        help = "Fallback database URL for check_database_connection calls without db_url"
    )]
    pub target_db_url: Option<String>,

    #[arg(
        long = "health-timeout-ms",
        value_parser = parse_positive_u64,
        help = "Health probe timeout in milliseconds (defaults to schema timeouts, then 5000)"
    )]
    pub health_timeout_ms: Option<u64>,

    #[arg(
        long = "db-timeout-ms",
        value_parser = parse_positive_u64,
        help = "Database connect timeout in milliseconds (defaults to schema timeouts, then 5000)"
    )]
    pub db_timeout_ms: Option<u64>,

    #[arg(
        long = "request-timeout-ms",
        value_parser = parse_positive_u64,
        help = "Timeout for GitHub, Cohere, and webhook requests in milliseconds (defaults to schema timeouts, then 30000)"
    )]
    pub request_timeout_ms: Option<u64>,

    #[arg(
        long = "app-env",
        env = "APP_ENV",
        default_value = "production",
        help = "Environment label reported by the server_health tool"
    )]
    pub app_env: String,
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn unit_defaults_cover_server_startup() {
        let cli = Cli::try_parse_from(["tollgate-server"]).expect("parse");
        assert!(!cli.init_config);
        assert!(cli.health_timeout_ms.is_none());
    }

    #[test]
    fn functional_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "tollgate-server",
            "--schema-path",
            "ops/schema.json",
            "--init-config",
            "--github-repo",
            "acme/shop",
            "--db-timeout-ms",
            "750",
        ])
        .expect("parse");
        assert_eq!(cli.schema_path, PathBuf::from("ops/schema.json"));
        assert!(cli.init_config);
        assert_eq!(cli.github_repo.as_deref(), Some("acme/shop"));
        assert_eq!(cli.db_timeout_ms, Some(750));
    }

    #[test]
    fn regression_zero_timeout_is_rejected() {
        let error = Cli::try_parse_from(["tollgate-server", "--health-timeout-ms", "0"])
            .expect_err("zero timeout must fail");
        assert!(error.to_string().contains("greater than 0"));
    }
}
