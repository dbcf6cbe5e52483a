//! CLI argument models for the Tollgate MCP server binary.
//!
//! Flags can also be supplied through the environment; timeouts fall back
//! to the schema's `timeouts` block and then to built-in defaults.

pub mod cli_args;
pub mod timeouts;

pub use cli_args::Cli;
pub use timeouts::{
    ResolvedTimeouts, DEFAULT_DB_TIMEOUT_MS, DEFAULT_HEALTH_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS,
};
