//! Module table file.
//!
//! One `[[module]]` entry per step, in deployment declaration order:
//!
//! ```toml
//! [[module]]
//! name = "Staking"
//! implementation = "StakingV2"
//! version = "2.0"
//! strategy = "replace"
//! dependencies = ["ParametersStorage", "ShardingTable"]
//! initialize = true
//!
//! [[module.forward]]
//! target = "ShardingTable"
//! signature = "setStakingAddress(address)"
//! args = ["@Staking"]
//! verify = { signature = "stakingAddress() returns (address)", expected = "@Staking" }
//! ```
//!
//! `constructor` is either `"pass-hub-address"` (default), `"pass-nothing"`
//! or `{ args = [...] }`.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use dkg_deploy_core_types::{
    ArgValue, Capability, ConstructorPolicy, ForwardCall, ForwardCheck, LogicalName,
    ModuleDescriptor, ModuleTable, RegistrationPolicy, UpgradeStrategy, Version,
};
use serde::Deserialize;
use tracing::debug;

use crate::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModulesFile {
    #[serde(default, rename = "module")]
    modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    name: LogicalName,
    implementation: Option<String>,
    version: Option<Version>,
    #[serde(default = "default_registration")]
    registration: RegistrationPolicy,
    #[serde(default)]
    constructor: RawConstructor,
    #[serde(default)]
    dependencies: Vec<LogicalName>,
    #[serde(default)]
    strategy: UpgradeStrategy,
    #[serde(default)]
    initialize: bool,
    #[serde(default)]
    forward: Vec<RawForward>,
    #[serde(default)]
    tags: BTreeSet<String>,
    requires: Option<Capability>,
}

fn default_registration() -> RegistrationPolicy {
    RegistrationPolicy::RegisterInHub
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawConstructor {
    Policy(ConstructorKind),
    Args {
        args: Vec<ArgValue>,
    },
}

impl Default for RawConstructor {
    fn default() -> Self {
        Self::Policy(ConstructorKind::PassHubAddress)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ConstructorKind {
    PassHubAddress,
    PassNothing,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForward {
    target: LogicalName,
    signature: String,
    #[serde(default)]
    args: Vec<ArgValue>,
    verify: Option<RawCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCheck {
    signature: String,
    #[serde(default)]
    args: Vec<ArgValue>,
    expected: ArgValue,
}

impl From<RawModule> for ModuleDescriptor {
    fn from(raw: RawModule) -> Self {
        let constructor = match raw.constructor {
            RawConstructor::Policy(ConstructorKind::PassHubAddress) => {
                ConstructorPolicy::PassHubAddress
            }
            RawConstructor::Policy(ConstructorKind::PassNothing) => ConstructorPolicy::PassNothing,
            RawConstructor::Args { args } => ConstructorPolicy::PassExplicitArgs(args),
        };

        let mut descriptor = ModuleDescriptor::new(raw.name)
            .with_registration(raw.registration)
            .with_constructor(constructor)
            .with_dependencies(raw.dependencies)
            .with_strategy(raw.strategy)
            .with_initialize(raw.initialize)
            .with_tags(raw.tags);

        if let Some(implementation) = raw.implementation {
            descriptor = descriptor.with_implementation(implementation);
        }

        if let Some(version) = raw.version {
            descriptor = descriptor.with_version(version);
        }

        if let Some(capability) = raw.requires {
            descriptor = descriptor.with_requires(capability);
        }

        for forward in raw.forward {
            descriptor = descriptor.with_forward_call(ForwardCall {
                target: forward.target,
                signature: forward.signature,
                args: forward.args,
                verify: forward.verify.map(|check| ForwardCheck {
                    signature: check.signature,
                    args: check.args,
                    expected: check.expected,
                }),
            });
        }

        descriptor
    }
}

/// Parses and validates a module table: step uniqueness, self dependencies,
/// deprecated names and the absence of dependency cycles.
///
/// `path` only serves diagnostics.
pub fn parse_modules(path: &Path, source: &str) -> Result<ModuleTable, ConfigError> {
    let file: ModulesFile = toml::from_str(source).map_err(|source| ConfigError::Toml {
        path: path.to_owned(),
        source,
    })?;

    let steps = file.modules.into_iter().map(ModuleDescriptor::from).collect();

    let table = ModuleTable::new(steps)?;
    dkg_deploy_graph::check_acyclic(&table)?;

    Ok(table)
}

/// Loads the module table at `path`.
pub fn load_modules(path: impl AsRef<Path>) -> Result<ModuleTable, ConfigError> {
    let path = path.as_ref();

    let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;

    let table = parse_modules(path, &source)?;
    debug!(path = %path.display(), steps = table.len(), "Loaded module table");

    Ok(table)
}
