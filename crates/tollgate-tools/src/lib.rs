//! Host-facing tool surface for Tollgate.
//!
//! `readiness_tools` maps MCP tool names onto the readiness agent and the
//! schema bootstrap; `mcp_server_runtime` speaks JSON-RPC 2.0 with
//! Content-Length framing over any reader/writer pair.

pub mod mcp_server_runtime;
pub mod readiness_tools;

pub use mcp_server_runtime::{execute_mcp_server, serve_mcp_jsonrpc_reader, McpServeReport};
pub use readiness_tools::{HostTool, McpTool, ReadinessToolbox, ToolOutcome};
