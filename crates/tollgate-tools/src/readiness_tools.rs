use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tollgate_agent::{CheckStep, ReadinessAgent};
use tollgate_contract::{CheckErrorCode, CheckResult, ToolDefinition};
use tollgate_settings::{discover_workspace_projects, generate_default_config, load_schema};

const INITIALIZE_CONFIG_MESSAGE: &str = "Workspace scanned and readiness_schema.json registered.";

/// Tools served by the host itself rather than a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostTool {
    EvaluateBuild,
    VerifyBuild,
    VerifyConfig,
    VerifyHealth,
    ServerHealth,
    InitializeConfig,
}

impl HostTool {
    pub const ALL: [HostTool; 6] = [
        HostTool::EvaluateBuild,
        HostTool::VerifyBuild,
        HostTool::VerifyConfig,
        HostTool::VerifyHealth,
        HostTool::ServerHealth,
        HostTool::InitializeConfig,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            HostTool::EvaluateBuild => "evaluate_build",
            HostTool::VerifyBuild => "verify_build",
            HostTool::VerifyConfig => "verify_config",
            HostTool::VerifyHealth => "verify_health",
            HostTool::ServerHealth => "server_health",
            HostTool::InitializeConfig => "initialize_config",
        }
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, parameters) = match self {
            HostTool::EvaluateBuild => (
                "Run the full deployment readiness assessment for a project, build, and environment.",
                object_schema(&[
                    ("project", "string", true),
                    ("build_id", "string", true),
                    ("environment", "string", true),
                ]),
            ),
            HostTool::VerifyBuild => (
                "Fetch and classify the log of one build without probing any environment.",
                object_schema(&[("project", "string", true), ("build_id", "string", true)]),
            ),
            HostTool::VerifyConfig => (
                "Audit an environment's configuration against its registered template.",
                object_schema(&[("project", "string", true), ("environment", "string", true)]),
            ),
            HostTool::VerifyHealth => (
                "Probe the health endpoint registered for a project environment.",
                object_schema(&[("project", "string", true), ("environment", "string", true)]),
            ),
            HostTool::ServerHealth => (
                "Report server status, registered tool count, and whether a schema is loaded.",
                object_schema(&[]),
            ),
            HostTool::InitializeConfig => (
                "Scan the workspace for projects and write readiness_schema.json.",
                object_schema(&[]),
            ),
        };
        ToolDefinition {
            name: self.tool_name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

fn object_schema(fields: &[(&str, &str, bool)]) -> Value {
    let properties = fields
        .iter()
        .map(|(name, kind, _)| (name.to_string(), json!({"type": kind})))
        .collect::<serde_json::Map<_, _>>();
    let required = fields
        .iter()
        .filter(|(_, _, required)| *required)
        .map(|(name, _, _)| Value::String(name.to_string()))
        .collect::<Vec<_>>();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// A tool exposed over MCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McpTool {
    Check(CheckStep),
    Host(HostTool),
}

impl McpTool {
    /// Every exposed tool. Live config fetching stays internal to the
    /// evaluation pipeline.
    pub fn all() -> Vec<McpTool> {
        let mut tools = vec![McpTool::Host(HostTool::EvaluateBuild)];
        tools.extend(
            CheckStep::ALL
                .into_iter()
                .filter(|step| *step != CheckStep::FetchEnvironmentConfig)
                .map(McpTool::Check),
        );
        tools.extend(
            HostTool::ALL
                .into_iter()
                .filter(|tool| *tool != HostTool::EvaluateBuild)
                .map(McpTool::Host),
        );
        tools
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|tool| tool.tool_name() == name)
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            McpTool::Check(step) => step.tool_name(),
            McpTool::Host(tool) => tool.tool_name(),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        match self {
            McpTool::Check(step) => step.definition(),
            McpTool::Host(tool) => tool.definition(),
        }
    }
}

/// Result of one tool call: the JSON payload and whether it reports a
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: Value,
    pub is_error: bool,
}

impl ToolOutcome {
    fn from_check(result: CheckResult) -> Self {
        Self {
            is_error: !result.success,
            content: result.to_value(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EvaluateArgs {
    project: String,
    build_id: Value,
    environment: String,
}

#[derive(Debug, Deserialize)]
struct VerifyBuildArgs {
    project: String,
    build_id: Value,
}

#[derive(Debug, Deserialize)]
struct ProjectEnvironmentArgs {
    project: String,
    environment: String,
}

fn build_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn invalid_arguments(tool: &str, message: impl std::fmt::Display) -> ToolOutcome {
    ToolOutcome::from_check(CheckResult::failure(
        CheckErrorCode::InvalidArguments,
        format!("invalid arguments for {tool}: {message}"),
    ))
}

fn decode<T: DeserializeOwned>(tool: HostTool, arguments: Value) -> Result<T, ToolOutcome> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|error| invalid_arguments(tool.tool_name(), error))
}

/// Dispatches MCP tool calls to the readiness agent.
pub struct ReadinessToolbox {
    agent: Arc<ReadinessAgent>,
    schema_path: PathBuf,
    workspace_root: PathBuf,
    app_env: String,
}

impl std::fmt::Debug for ReadinessToolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessToolbox")
            .field("schema_path", &self.schema_path)
            .field("workspace_root", &self.workspace_root)
            .field("app_env", &self.app_env)
            .finish_non_exhaustive()
    }
}

impl ReadinessToolbox {
    pub fn new(
        agent: Arc<ReadinessAgent>,
        schema_path: impl Into<PathBuf>,
        workspace_root: impl Into<PathBuf>,
        app_env: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            schema_path: schema_path.into(),
            workspace_root: workspace_root.into(),
            app_env: app_env.into(),
        }
    }

    pub fn agent(&self) -> &ReadinessAgent {
        &self.agent
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        McpTool::all().into_iter().map(McpTool::definition).collect()
    }

    /// Runs `name` with `arguments`. Unknown tools are an error; tool
    /// failures are reported through [`ToolOutcome::is_error`].
    pub async fn call(&self, name: &str, arguments: Value) -> Result<ToolOutcome> {
        let tool = McpTool::from_name(name)
            .with_context(|| format!("unknown tool '{name}'"))?;
        tracing::info!(tool = name, "tool call");
        let outcome = match tool {
            McpTool::Check(step) => {
                ToolOutcome::from_check(self.agent.invoke_check(step.tool_name(), arguments).await)
            }
            McpTool::Host(host) => self.call_host(host, arguments).await?,
        };
        Ok(outcome)
    }

    async fn call_host(&self, tool: HostTool, arguments: Value) -> Result<ToolOutcome> {
        let outcome = match tool {
            HostTool::EvaluateBuild => match decode::<EvaluateArgs>(tool, arguments) {
                Ok(args) => match build_id_text(&args.build_id) {
                    Some(build_id) => ToolOutcome::from_check(
                        self.agent
                            .evaluate(&args.project, &build_id, &args.environment)
                            .await,
                    ),
                    None => invalid_arguments(tool.tool_name(), "build_id must be a string or number"),
                },
                Err(outcome) => outcome,
            },
            HostTool::VerifyBuild => match decode::<VerifyBuildArgs>(tool, arguments) {
                Ok(args) => match build_id_text(&args.build_id) {
                    Some(build_id) => ToolOutcome::from_check(
                        self.agent.verify_build(&args.project, &build_id).await,
                    ),
                    None => invalid_arguments(tool.tool_name(), "build_id must be a string or number"),
                },
                Err(outcome) => outcome,
            },
            HostTool::VerifyConfig => match decode::<ProjectEnvironmentArgs>(tool, arguments) {
                Ok(args) => ToolOutcome::from_check(
                    self.agent
                        .verify_config(&args.project, &args.environment)
                        .await,
                ),
                Err(outcome) => outcome,
            },
            HostTool::VerifyHealth => match decode::<ProjectEnvironmentArgs>(tool, arguments) {
                Ok(args) => ToolOutcome::from_check(
                    self.agent
                        .verify_health(&args.project, &args.environment)
                        .await,
                ),
                Err(outcome) => outcome,
            },
            HostTool::ServerHealth => ToolOutcome {
                content: self.server_health(),
                is_error: false,
            },
            HostTool::InitializeConfig => self.initialize_config().await?,
        };
        Ok(outcome)
    }

    pub fn server_health(&self) -> Value {
        json!({
            "status": "UP",
            "tools_registered": McpTool::all().len(),
            "environment": self.app_env,
            "config_loaded": self.schema_path.exists(),
        })
    }

    /// Scans the workspace, writes a starter schema, and swaps the reloaded
    /// catalog into the agent.
    pub async fn initialize_config(&self) -> Result<ToolOutcome> {
        let workspace_root = self.workspace_root.clone();
        let schema_path = self.schema_path.clone();
        let (discovered, reloaded) = tokio::task::spawn_blocking(move || -> Result<_> {
            let discovered = discover_workspace_projects(&workspace_root)?;
            generate_default_config(&schema_path, &discovered)?;
            Ok((discovered, load_schema(&schema_path, true)))
        })
        .await
        .context("workspace discovery task failed")??;

        let names = discovered.keys().cloned().collect::<Vec<_>>();
        match reloaded {
            Ok(schema) => {
                self.agent.replace_catalog(schema.to_catalog());
                Ok(ToolOutcome {
                    content: json!({
                        "success": true,
                        "message": INITIALIZE_CONFIG_MESSAGE,
                        "discovered_projects": names,
                    }),
                    is_error: false,
                })
            }
            Err(error) => {
                tracing::warn!(error = %error, "generated schema could not be loaded");
                Ok(ToolOutcome {
                    content: json!({
                        "success": false,
                        "message": error.to_string(),
                        "discovered_projects": names,
                    }),
                    is_error: true,
                })
            }
        }
    }
}
