//! Core types of the DKG deployment orchestrator: module descriptors,
//! logical names, versions and the module table.

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

mod descriptor;
mod name;
mod table;
mod version;

pub use alloy_primitives::{Address, Bytes, B256};

pub use descriptor::{
    ArgValue, Capability, ConstructorPolicy, ForwardCall, ForwardCheck, ModuleDescriptor,
    RegistrationPolicy, UpgradeStrategy,
};
pub use name::{LogicalName, NameError, DEPRECATED_SUFFIX};
pub use table::{ModuleTable, StepId, TableError};
pub use version::{Band, Version, VersionError};
