use std::future::Future;
use std::io::{BufRead, BufReader, Write};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use crate::readiness_tools::{ReadinessToolbox, ToolOutcome};

const MCP_JSONRPC_VERSION: &str = "2.0";
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "tollgate-readiness";
const MCP_ERROR_PARSE: i64 = -32700;
const MCP_ERROR_INVALID_REQUEST: i64 = -32600;
const MCP_ERROR_METHOD_NOT_FOUND: i64 = -32601;
const MCP_ERROR_INVALID_PARAMS: i64 = -32602;
const MCP_CONTENT_TYPE_TEXT: &str = "text";

#[derive(Debug, Clone)]
/// Public struct `McpServeReport` used across Tollgate components.
pub struct McpServeReport {
    pub processed_frames: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone)]
struct McpJsonRpcRequest {
    id: Option<Value>,
    method: String,
    params: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone)]
struct McpDispatchError {
    id: Value,
    code: i64,
    message: String,
}

impl McpDispatchError {
    fn new(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            code,
            message: message.into(),
        }
    }
}

/// Serves MCP over the process stdin/stdout until the host closes stdin.
pub fn execute_mcp_server(toolbox: &ReadinessToolbox) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();
    let report = serve_mcp_jsonrpc_reader(&mut reader, &mut writer, toolbox)?;
    tracing::info!(
        frames = report.processed_frames,
        errors = report.error_count,
        "mcp session closed"
    );
    Ok(())
}

/// Reads Content-Length framed JSON-RPC requests from `reader` and writes
/// one response per request to `writer`. Notifications get no response.
pub fn serve_mcp_jsonrpc_reader<R, W>(
    reader: &mut R,
    writer: &mut W,
    toolbox: &ReadinessToolbox,
) -> Result<McpServeReport>
where
    R: BufRead,
    W: Write,
{
    let mut processed_frames = 0usize;
    let mut error_count = 0usize;

    loop {
        let frame = match read_jsonrpc_content_length_frame(reader) {
            Ok(Some(value)) => value,
            Ok(None) => break,
            Err(error) => {
                let response = jsonrpc_error_frame(
                    Value::Null,
                    MCP_ERROR_PARSE,
                    format!("failed to read mcp frame: {error}"),
                );
                write_jsonrpc_content_length_frame(writer, &response)?;
                error_count = error_count.saturating_add(1);
                break;
            }
        };
        processed_frames = processed_frames.saturating_add(1);

        let response = match parse_jsonrpc_request(&frame) {
            Ok(request) => {
                let Some(id) = request.id.clone() else {
                    tracing::debug!(method = %request.method, "mcp notification received");
                    continue;
                };
                match dispatch_jsonrpc_request(&request, id.clone(), toolbox) {
                    Ok(result) => jsonrpc_result_frame(id, result),
                    Err(error) => {
                        error_count = error_count.saturating_add(1);
                        jsonrpc_error_frame(error.id, error.code, error.message)
                    }
                }
            }
            Err(error) => {
                error_count = error_count.saturating_add(1);
                jsonrpc_error_frame(error.id, error.code, error.message)
            }
        };
        write_jsonrpc_content_length_frame(writer, &response)?;
    }

    Ok(McpServeReport {
        processed_frames,
        error_count,
    })
}

fn parse_jsonrpc_request(value: &Value) -> Result<McpJsonRpcRequest, McpDispatchError> {
    let Some(object) = value.as_object() else {
        return Err(McpDispatchError::new(
            Value::Null,
            MCP_ERROR_INVALID_REQUEST,
            "jsonrpc request must be an object",
        ));
    };
    let id = object.get("id").cloned();
    let error_id = id.clone().unwrap_or(Value::Null);
    let jsonrpc = object
        .get("jsonrpc")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if jsonrpc != MCP_JSONRPC_VERSION {
        return Err(McpDispatchError::new(
            error_id,
            MCP_ERROR_INVALID_REQUEST,
            format!("jsonrpc must be '{}'", MCP_JSONRPC_VERSION),
        ));
    }
    let method = object
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            McpDispatchError::new(
                error_id.clone(),
                MCP_ERROR_INVALID_REQUEST,
                "jsonrpc request must include non-empty method",
            )
        })?;
    let params = match object.get("params") {
        Some(Value::Object(params)) => params.clone(),
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(_) => {
            return Err(McpDispatchError::new(
                error_id,
                MCP_ERROR_INVALID_PARAMS,
                "jsonrpc request params must be an object",
            ))
        }
    };
    Ok(McpJsonRpcRequest {
        id,
        method: method.to_string(),
        params,
    })
}

fn dispatch_jsonrpc_request(
    request: &McpJsonRpcRequest,
    id: Value,
    toolbox: &ReadinessToolbox,
) -> Result<Value, McpDispatchError> {
    match request.method.as_str() {
        "initialize" => Ok(handle_initialize()),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(handle_tools_list(toolbox)),
        "tools/call" => handle_tools_call(toolbox, &request.params)
            .map_err(|error| McpDispatchError::new(id, MCP_ERROR_INVALID_PARAMS, error.to_string())),
        other => Err(McpDispatchError::new(
            id,
            MCP_ERROR_METHOD_NOT_FOUND,
            format!("unsupported method '{}'", other),
        )),
    }
}

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        }
    })
}

fn handle_tools_list(toolbox: &ReadinessToolbox) -> Value {
    json!({
        "tools": toolbox
            .definitions()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.parameters
                })
            })
            .collect::<Vec<_>>()
    })
}

fn handle_tools_call(
    toolbox: &ReadinessToolbox,
    params: &serde_json::Map<String, Value>,
) -> Result<Value> {
    let tool_name = params
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("tools/call requires non-empty field 'name'"))?;
    let arguments = match params.get("arguments") {
        Some(Value::Object(arguments)) => Value::Object(arguments.clone()),
        Some(Value::Null) | None => Value::Object(serde_json::Map::new()),
        Some(_) => bail!("tools/call field 'arguments' must be an object when provided"),
    };

    let outcome = block_on_tool_future(toolbox.call(tool_name, arguments))?;
    Ok(mcp_tool_call_result(outcome))
}

fn block_on_tool_future<F>(future: F) -> Result<ToolOutcome>
where
    F: Future<Output = Result<ToolOutcome>>,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => tokio::task::block_in_place(|| handle.block_on(future)),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to create tokio runtime for mcp tool execution")?
            .block_on(future),
    }
}

fn mcp_tool_call_result(outcome: ToolOutcome) -> Value {
    let text = serde_json::to_string_pretty(&outcome.content)
        .unwrap_or_else(|_| "{\"error\":\"failed to serialize tool result\"}".to_string());
    json!({
        "content": [{
            "type": MCP_CONTENT_TYPE_TEXT,
            "text": text
        }],
        "isError": outcome.is_error,
        "structuredContent": outcome.content,
    })
}

fn read_jsonrpc_content_length_frame<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: BufRead,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    loop {
        let mut line = String::new();
        let bytes = reader
            .read_line(&mut line)
            .context("failed to read mcp frame header line")?;
        if bytes == 0 {
            if saw_header {
                bail!("unexpected eof while reading mcp frame headers");
            }
            return Ok(None);
        }
        if line == "\n" || line == "\r\n" {
            if !saw_header {
                continue;
            }
            break;
        }
        saw_header = true;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let (name, value) = trimmed.split_once(':').ok_or_else(|| {
            anyhow!(
                "invalid mcp header '{}': expected 'Name: value' format",
                trimmed
            )
        })?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .context("invalid Content-Length header value")?;
            content_length = Some(parsed);
        }
    }

    let content_length =
        content_length.ok_or_else(|| anyhow!("mcp frame is missing Content-Length header"))?;
    let mut body = vec![0_u8; content_length];
    reader
        .read_exact(&mut body)
        .context("failed to read mcp frame body bytes")?;
    let value = serde_json::from_slice::<Value>(&body).context("failed to parse mcp JSON frame")?;
    Ok(Some(value))
}

fn write_jsonrpc_content_length_frame<W>(writer: &mut W, value: &Value) -> Result<()>
where
    W: Write,
{
    let encoded = serde_json::to_vec(value).context("failed to encode mcp jsonrpc response")?;
    write!(writer, "Content-Length: {}\r\n\r\n", encoded.len())
        .context("failed to write mcp frame header")?;
    writer
        .write_all(&encoded)
        .context("failed to write mcp frame body")?;
    writer.flush().context("failed to flush mcp frame output")?;
    Ok(())
}

fn jsonrpc_result_frame(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": MCP_JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

fn jsonrpc_error_frame(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": MCP_JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        }
    })
}
