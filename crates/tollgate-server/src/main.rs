//! `tollgate-server`: deployment readiness checks served over MCP stdio.

mod bootstrap_helpers;
mod startup;

use anyhow::{Context, Result};
use clap::Parser;
use tollgate_cli::Cli;
use tollgate_settings::EnvLookup;
use tollgate_tools::execute_mcp_server;

use crate::bootstrap_helpers::{init_tracing, load_dotenv};
use crate::startup::{build_toolbox, run_init_config};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let exported = load_dotenv(&cwd)?;
    tracing::debug!(exported, "dotenv files loaded");

    let cli = Cli::parse();
    if cli.init_config {
        return run_init_config(&cli);
    }

    let lookup = EnvLookup::from_process_env().context("failed to compile env lookup patterns")?;
    let toolbox = build_toolbox(&cli, &lookup)?;
    tracing::info!(
        schema = %cli.schema_path.display(),
        environment = %cli.app_env,
        "tollgate MCP server ready"
    );
    execute_mcp_server(&toolbox)
}
