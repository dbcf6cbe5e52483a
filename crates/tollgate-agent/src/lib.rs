//! Deployment readiness orchestration for Tollgate.
//!
//! [`ReadinessAgent`] sequences the individual checks in [`checks`] over the
//! collaborator traits from `tollgate-drivers` and folds their signals into
//! one readiness score. Checks are addressed by the compile-time
//! [`CheckStep`] enum; hosts that speak tool names go through
//! [`ReadinessAgent::invoke_check`].

pub mod agent;
pub mod checks;
pub mod context;
pub mod registry;

pub use agent::{service_label, NeutralSignals, ReadinessAgent};
pub use context::{EvaluationContext, EvaluationStage};
pub use registry::{
    CheckRegistry, CheckSettings, CheckStep, Collaborators, LatestBuildArgs, StepRequest,
    DEFAULT_TEMPLATE_DIR,
};
