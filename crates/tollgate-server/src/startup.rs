use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tollgate_agent::{CheckSettings, Collaborators, ReadinessAgent};
use tollgate_ai::{CohereClient, CohereConfig, Narrator};
use tollgate_cli::{Cli, ResolvedTimeouts};
use tollgate_drivers::{
    GithubActionsClient, GithubActionsConfig, HttpHealthProber, LayeredConfigFetcher,
    TcpDatabaseProber, WebhookNotifier,
};
use tollgate_settings::{
    discover_workspace_projects, generate_default_config, load_schema, EnvLookup, LogicalKey,
    ReadinessSchema,
};
use tollgate_tools::ReadinessToolbox;

/// Credentials after falling back from explicit flags to loosely named
/// environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResolvedCredentials {
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub cohere_api_key: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub target_db_url: Option<String>,
}

impl ResolvedCredentials {
    pub(crate) fn resolve(cli: &Cli, lookup: &EnvLookup) -> Self {
        let pick = |flag: &Option<String>, key: LogicalKey| {
            flag.as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .or_else(|| lookup.get(key))
                .map(str::to_string)
        };
        Self {
            github_token: pick(&cli.github_token, LogicalKey::GithubToken),
            github_repo: pick(&cli.github_repo, LogicalKey::GithubRepo),
            cohere_api_key: pick(&cli.cohere_api_key, LogicalKey::CohereKey),
            slack_webhook_url: pick(&cli.slack_webhook_url, LogicalKey::SlackWebhook),
            target_db_url: pick(&cli.target_db_url, LogicalKey::DbUrl),
        }
    }
}

/// Handles `--init-config`: scans the workspace and writes a starter schema.
pub(crate) fn run_init_config(cli: &Cli) -> Result<()> {
    let discovered = discover_workspace_projects(&cli.workspace_root)?;
    generate_default_config(&cli.schema_path, &discovered)?;
    eprintln!(
        "wrote {} with {} discovered project(s)",
        cli.schema_path.display(),
        discovered.len()
    );
    Ok(())
}

/// Loads the schema for serving. An invalid or incomplete schema is logged
/// and replaced by an empty one so `initialize_config` can still repair it.
pub(crate) fn load_serving_schema(path: &Path) -> ReadinessSchema {
    match load_schema(path, false) {
        Ok(schema) => {
            if schema.is_empty() {
                tracing::warn!(path = %path.display(), "readiness schema not found; run initialize_config to create one");
            } else {
                tracing::info!(path = %path.display(), projects = schema.projects.len(), "readiness schema loaded");
            }
            schema
        }
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "readiness schema rejected; serving with an empty catalog");
            ReadinessSchema::default()
        }
    }
}

fn build_narrator(cli: &Cli, api_key: Option<&str>, timeouts: &ResolvedTimeouts) -> Result<Narrator> {
    let Some(api_key) = api_key else {
        tracing::info!("no Cohere API key configured; narration uses rule-based fallbacks");
        return Ok(Narrator::disabled());
    };
    let config = CohereConfig {
        api_base: cli.cohere_api_base.clone(),
        request_timeout_ms: timeouts.request_ms(),
        ..CohereConfig::new(api_key)
    };
    let client = CohereClient::new(config).context("failed to build Cohere client")?;
    Ok(Narrator::new(Arc::new(client), cli.cohere_model.clone()))
}

/// Wires drivers, narration, and the agent behind an MCP toolbox.
pub(crate) fn build_toolbox(cli: &Cli, lookup: &EnvLookup) -> Result<ReadinessToolbox> {
    let schema = load_serving_schema(&cli.schema_path);
    let timeouts = ResolvedTimeouts::resolve(cli, &schema.timeouts);
    let credentials = ResolvedCredentials::resolve(cli, lookup);

    let build_logs = GithubActionsClient::new(GithubActionsConfig {
        api_base: cli.github_api_base.clone(),
        token: credentials.github_token.clone(),
        request_timeout_ms: timeouts.request_ms(),
        ..GithubActionsConfig::default()
    })
    .context("failed to build GitHub Actions client")?;
    let health =
        HttpHealthProber::new(timeouts.health).context("failed to build health prober")?;
    let notifier = WebhookNotifier::new(credentials.slack_webhook_url.clone(), timeouts.request)
        .context("failed to build webhook notifier")?;

    let collaborators = Collaborators {
        build_logs: Arc::new(build_logs),
        health: Arc::new(health),
        database: Arc::new(TcpDatabaseProber::new(timeouts.database)),
        environment_config: Arc::new(LayeredConfigFetcher::from_process_env(
            cli.config_dir.clone(),
        )),
        notifier: Arc::new(notifier),
        narrator: build_narrator(cli, credentials.cohere_api_key.as_deref(), &timeouts)?,
    };

    let mut settings = CheckSettings {
        default_repo: credentials.github_repo.clone(),
        penalties: schema.penalties(),
        target_db_url: credentials.target_db_url.clone(),
        ..CheckSettings::default()
    };
    if let Some(template_dir) = &cli.template_dir {
        settings.template_dir = template_dir.clone();
    }

    let agent = ReadinessAgent::new(collaborators, settings, schema.to_catalog());
    Ok(ReadinessToolbox::new(
        Arc::new(agent),
        cli.schema_path.clone(),
        cli.workspace_root.clone(),
        cli.app_env.clone(),
    ))
}
