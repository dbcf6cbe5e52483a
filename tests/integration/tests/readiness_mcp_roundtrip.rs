use std::{
    io::{BufRead, BufReader, Cursor, Read},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tollgate_agent::{CheckSettings, Collaborators, ReadinessAgent};
use tollgate_ai::{
    ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, Narrator, TollgateAiError,
};
use tollgate_contract::{HealthStatus, ReadinessStatus};
use tollgate_drivers::{
    BuildLogFetcher, DatabaseKind, DatabaseProber, DbProbe, DeploymentAlert, DeploymentNotifier,
    DriverError, EnvironmentConfigFetcher, HealthProbe, HealthProber, MigrationProbe,
    NotificationOutcome, RunFilter, WorkflowRun,
};
use tollgate_settings::load_schema_with_env;
use tollgate_tools::{serve_mcp_jsonrpc_reader, ReadinessToolbox};

const LOG_ANALYSIS_REPLY: &str = "Here is the analysis:\n```json\n{\"category\": \"CODE\", \"severity\": \"LOW\", \"confidence\": 0.92, \"root_cause_summary\": \"Deprecated API warning in checkout tests\", \"suggested_fix\": \"Migrate to the v2 client\"}\n```";
const NARRATION_REPLY: &str =
    "{\"explanation\": \"Checkout answered within budget\", \"suggested_fix\": \"None needed\"}";

struct ScriptedClient {
    requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, TollgateAiError> {
        let is_log_prompt = request
            .messages
            .iter()
            .any(|message| message.text.contains("Analyze the following build log"));
        self.requests.lock().expect("requests lock").push(request);
        let text = if is_log_prompt {
            LOG_ANALYSIS_REPLY
        } else {
            NARRATION_REPLY
        };
        Ok(ChatResponse {
            message: Message::assistant(text),
            finish_reason: Some("COMPLETE".to_string()),
            usage: ChatUsage::default(),
        })
    }
}

struct StubLogs;

#[async_trait]
impl BuildLogFetcher for StubLogs {
    async fn fetch_log(&self, repo: &str, run_id: &str) -> Result<String, DriverError> {
        if repo == "acme/checkout" && run_id == "42" {
            Ok("compiling checkout\nwarning: deprecated API\ntests passed".to_string())
        } else {
            Err(DriverError::NotFound(format!("run {run_id} not found in {repo}")))
        }
    }

    async fn list_runs(
        &self,
        _repo: &str,
        _filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, DriverError> {
        Ok(Vec::new())
    }
}

struct StubHealth {
    status: HealthStatus,
}

#[async_trait]
impl HealthProber for StubHealth {
    async fn probe(&self, _url: &str) -> Result<HealthProbe, DriverError> {
        Ok(HealthProbe {
            status: self.status,
            latency_ms: 8,
            http_code: if self.status == HealthStatus::Up { 200 } else { 503 },
            error: None,
        })
    }
}

struct StubDatabase {
    connected: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl DatabaseProber for StubDatabase {
    async fn check_connectivity(&self, db_url: &str) -> Result<DbProbe, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DbProbe {
            kind: DatabaseKind::detect(db_url)?,
            connected: self.connected,
            latency_ms: 2,
            error: (!self.connected).then(|| "connection refused".to_string()),
        })
    }

    async fn check_migrations(&self, _db_url: &str) -> Result<MigrationProbe, DriverError> {
        Ok(MigrationProbe {
            matches: true,
            current_version: None,
            note: None,
        })
    }
}

struct StubConfig {
    live: Value,
}

#[async_trait]
impl EnvironmentConfigFetcher for StubConfig {
    async fn fetch(&self, _environment: &str) -> Result<Value, DriverError> {
        Ok(self.live.clone())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<DeploymentAlert>>,
}

#[async_trait]
impl DeploymentNotifier for RecordingNotifier {
    async fn send_deployment_alert(
        &self,
        alert: &DeploymentAlert,
    ) -> Result<NotificationOutcome, DriverError> {
        self.alerts.lock().expect("alerts lock").push(alert.clone());
        Ok(NotificationOutcome::Sent)
    }
}

struct Scenario {
    health: HealthStatus,
    db_connected: bool,
    live: Value,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            health: HealthStatus::Up,
            db_connected: true,
            live: json!({"API_URL": "https://api.internal", "FEATURE_FLAGS": "beta"}),
        }
    }
}

struct Fixture {
    toolbox: ReadinessToolbox,
    llm: Arc<ScriptedClient>,
    database: Arc<StubDatabase>,
    notifier: Arc<RecordingNotifier>,
}

fn write_workspace(root: &Path) {
    std::fs::create_dir_all(root.join("checkout/config")).expect("config dir");
    std::fs::write(
        root.join("checkout/config/staging.env"),
        "API_URL=https://api.example\nFEATURE_FLAGS=\n",
    )
    .expect("baseline");
    let schema = json!({
        "project_name": "Acme Platform",
        "projects": {
            "checkout": {
                "repo": "acme/checkout",
                "environments": {
                    "staging": {
                        "health_url": "http://checkout.staging/health",
                        "db_url": "postgres://app@db.staging:5432/checkout",
                        "config_template": root.join("checkout/config/staging.env").display().to_string()
                    }
                }
            }
        },
        "mandatory_env_vars": [],
        "scoring": {"high": 40, "medium": 20, "low": 10}
    });
    std::fs::write(
        root.join("readiness_schema.json"),
        serde_json::to_string_pretty(&schema).expect("encode schema"),
    )
    .expect("schema");
}

fn fixture(root: &Path, scenario: Scenario) -> Fixture {
    write_workspace(root);
    let schema_path = root.join("readiness_schema.json");
    let schema = load_schema_with_env(&schema_path, true, |_| None).expect("schema loads");

    let llm = Arc::new(ScriptedClient {
        requests: Mutex::new(Vec::new()),
    });
    let database = Arc::new(StubDatabase {
        connected: scenario.db_connected,
        calls: AtomicUsize::new(0),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        build_logs: Arc::new(StubLogs),
        health: Arc::new(StubHealth {
            status: scenario.health,
        }),
        database: database.clone(),
        environment_config: Arc::new(StubConfig {
            live: scenario.live,
        }),
        notifier: notifier.clone(),
        narrator: Narrator::new(llm.clone(), "command-r-08-2024"),
    };
    let settings = CheckSettings {
        penalties: schema.penalties(),
        template_dir: root.to_path_buf(),
        ..CheckSettings::default()
    };
    let agent = ReadinessAgent::new(collaborators, settings, schema.to_catalog());
    Fixture {
        toolbox: ReadinessToolbox::new(Arc::new(agent), schema_path, root, "integration"),
        llm,
        database,
        notifier,
    }
}

fn encode_frames(frames: &[Value]) -> Vec<u8> {
    let mut encoded = Vec::new();
    for frame in frames {
        let payload = serde_json::to_vec(frame).expect("encode frame");
        encoded.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
        encoded.extend_from_slice(&payload);
    }
    encoded
}

fn decode_frames(raw: &[u8]) -> Vec<Value> {
    let mut frames = Vec::new();
    let mut reader = BufReader::new(Cursor::new(raw));
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).expect("header") == 0 {
            break;
        }
        if header.trim().is_empty() {
            continue;
        }
        let length = header
            .split_once(':')
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .expect("content length");
        let mut separator = String::new();
        reader.read_line(&mut separator).expect("separator");
        let mut body = vec![0_u8; length];
        reader.read_exact(&mut body).expect("body");
        frames.push(serde_json::from_slice(&body).expect("json frame"));
    }
    frames
}

fn call_tool(toolbox: &ReadinessToolbox, name: &str, arguments: Value) -> Value {
    let frames = [json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })];
    let mut reader = BufReader::new(Cursor::new(encode_frames(&frames)));
    let mut writer = Vec::new();
    let report = serve_mcp_jsonrpc_reader(&mut reader, &mut writer, toolbox).expect("serve");
    assert_eq!(report.processed_frames, 1);
    let mut responses = decode_frames(&writer);
    assert_eq!(responses.len(), 1);
    responses.remove(0)["result"].take()
}

#[test]
fn integration_evaluate_build_over_mcp_applies_schema_penalties() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(temp.path(), Scenario::default());

    let result = call_tool(
        &fixture.toolbox,
        "evaluate_build",
        json!({"project": "checkout", "build_id": 42, "environment": "staging"}),
    );

    assert_eq!(result["isError"], false);
    let data = &result["structuredContent"]["data"];
    assert_eq!(data["readiness_score"], 90);
    assert_eq!(data["status"], "SAFE");
    assert_eq!(data["penalties"], json!(["Build log severity LOW: -10"]));
    assert_eq!(
        data["audit_report"]["build_analysis"]["category"],
        "CODE"
    );
    assert_eq!(
        data["audit_report"]["health_status"]["explanation"],
        "Checkout answered within budget"
    );
    assert_eq!(data["audit_report"]["db_connectivity"]["db_status"], "CONNECTED");
    assert_eq!(fixture.database.calls.load(Ordering::SeqCst), 1);

    let alerts = fixture.notifier.alerts.lock().expect("alerts lock");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].status, ReadinessStatus::Safe);
    assert_eq!(alerts[0].summary, "Deprecated API warning in checkout tests");
    assert!(!fixture.llm.requests.lock().expect("requests lock").is_empty());
}

#[test]
fn integration_degraded_environment_blocks_automation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(
        temp.path(),
        Scenario {
            health: HealthStatus::Down,
            db_connected: false,
            live: json!({"API_URL": "https://api.internal"}),
        },
    );

    let result = call_tool(
        &fixture.toolbox,
        "evaluate_build",
        json!({"project": "checkout", "build_id": "42", "environment": "staging"}),
    );

    let data = &result["structuredContent"]["data"];
    assert_eq!(data["readiness_score"], 0);
    assert_eq!(data["status"], "NOT_SAFE");
    assert_eq!(
        data["penalties"],
        json!([
            "Build log severity LOW: -10",
            "Config drift detected: -15",
            "Service Checkout (staging) is DOWN: -25",
            "Database connection failed: -50"
        ])
    );
    assert_eq!(
        data["audit_report"]["config_audit"]["drift_keys"],
        json!(["FEATURE_FLAGS"])
    );
}

#[test]
fn integration_missing_build_aborts_and_skips_alerts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(temp.path(), Scenario::default());

    let result = call_tool(
        &fixture.toolbox,
        "evaluate_build",
        json!({"project": "checkout", "build_id": 7, "environment": "staging"}),
    );

    assert_eq!(result["isError"], true);
    assert_eq!(
        result["structuredContent"]["error"]["code"],
        "EVALUATION_ABORTED"
    );
    assert_eq!(fixture.database.calls.load(Ordering::SeqCst), 0);
    assert!(fixture.notifier.alerts.lock().expect("alerts lock").is_empty());
}

#[test]
fn integration_direct_database_check_uses_catalog_url() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = fixture(temp.path(), Scenario::default());

    let result = call_tool(
        &fixture.toolbox,
        "check_database_connection",
        json!({"environment": "staging"}),
    );

    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["data"]["db_status"], "CONNECTED");
    assert_eq!(fixture.database.calls.load(Ordering::SeqCst), 1);
}
