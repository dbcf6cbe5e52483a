//! Readiness scoring for Tollgate.
//!
//! `policy` maps categorical signals to penalties; `calculator` folds them
//! into a 0-100 score, a status tier, and an automation recommendation.

pub mod calculator;
pub mod policy;

pub use calculator::{ReadinessCalculator, ScoreInputError, ScoreInputs, ServiceSignal};
pub use policy::{PenaltyTable, PenaltyTableError, ScoringPolicy};
