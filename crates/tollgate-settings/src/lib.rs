//! Readiness schema loading, workspace discovery, and environment lookup.
//!
//! `readiness_schema.json` is validated structurally first so operators get
//! the exact key that is missing, then decoded into typed settings and
//! converted into the [`tollgate_contract::EnvironmentCatalog`] the agent
//! consumes.

pub mod discovery;
pub mod env_lookup;
pub mod schema;

pub use discovery::{
    discover_workspace_projects, generate_default_config, DiscoveredProject,
    DEFAULT_SCHEMA_PROJECT_NAME,
};
pub use env_lookup::{EnvLookup, LogicalKey};
pub use schema::{
    load_schema, load_schema_with_env, EnvironmentSchema, ProjectSchema, ReadinessSchema,
    SettingsError, TimeoutSettings, DEFAULT_SCHEMA_PATH,
};
