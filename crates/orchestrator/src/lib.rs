//! Upgrade orchestrator for the DKG module registry.
//!
//! An [`Orchestrator`] walks the module table in dependency order, decides
//! for every step whether to deploy fresh, redeploy, replace or skip, binds
//! new deployments in the Hub and records them in the deployment ledger.
//! Once every module is in place, it seeds module parameters and, on
//! networks that grant it, hands ownership of the Hub over to the Hub
//! Controller.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]

mod call_style;
mod encoding;
mod error;
mod orchestrator;
mod plan;
mod report;
mod seeding;

pub use call_style::CallStyle;
pub use error::{OrchestratorError, SeedingError};
pub use orchestrator::{Mismatch, Orchestrator};
pub use plan::{Network, Plan, PlannedStep, Selection};
pub use report::{RunReport, StepReport};
pub use seeding::{SeedBatch, SeedCall, SeedQueue};
