//! Per-module upgrade decision procedure.
//!
//! Given one step of the module table and what the Ledger records for its
//! logical name, [`decide`] classifies the deployment and picks the action
//! the orchestrator must take. The procedure is pure and evaluated once
//! per step and per run.

#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unused_import_braces,
    unused_qualifications
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod state;
mod state_machine;
mod transition;

pub use state::{Decision, Installed, SkipReason, State};
pub use state_machine::{classify, decide};
pub use transition::Transition;
