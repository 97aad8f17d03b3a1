use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;

use crate::{LogicalName, NameError, Version};

/// Where a module is bound in the Hub once deployed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum RegistrationPolicy {
    /// Bind in the general module namespace via `setContractAddress`.
    RegisterInHub,
    /// Bind in the asset-storage namespace via `setAssetStorageContractAddress`.
    RegisterAsAssetStorage,
    /// Record in the Ledger only.
    DoNotRegister,
}

impl RegistrationPolicy {
    pub fn registers(&self) -> bool {
        !matches!(self, Self::DoNotRegister)
    }
}

/// How a module's constructor arguments are built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructorPolicy {
    /// The constructor takes the Hub address as its only argument.
    PassHubAddress,
    /// The constructor takes the given arguments, in order.
    PassExplicitArgs(Vec<ArgValue>),
    /// The constructor takes no arguments.
    PassNothing,
}

/// What a step does with a module that is already recorded in an older band.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum UpgradeStrategy {
    /// Deploy only when absent, never touch an existing deployment.
    #[default]
    Once,
    /// Redeploy under the same logical name, dropping the previous address.
    InPlace,
    /// Deploy the new implementation, rebind the logical name and keep the
    /// previous address under `<name>Deprecated`.
    Replace,
}

/// A constructor or call argument.
///
/// Written as `@Name` for the address of another module, `$deployer` for the
/// deployer account, anything else is a literal coerced against the ABI type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum ArgValue {
    Literal(String),
    Module(LogicalName),
    Deployer,
}

impl ArgValue {
    pub const DEPLOYER: &'static str = "$deployer";

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// The module this argument refers to, if any.
    pub fn module(&self) -> Option<&LogicalName> {
        match self {
            Self::Module(name) => Some(name),
            _ => None,
        }
    }
}

impl FromStr for ArgValue {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::DEPLOYER {
            Ok(Self::Deployer)
        } else if let Some(name) = s.strip_prefix('@') {
            LogicalName::new(name).map(Self::Module)
        } else {
            Ok(Self::Literal(s.to_owned()))
        }
    }
}

impl TryFrom<String> for ArgValue {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArgValue> for String {
    fn from(value: ArgValue) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Module(name) => write!(f, "@{name}"),
            Self::Deployer => f.write_str(Self::DEPLOYER),
        }
    }
}

/// A configuration call issued into another, already deployed module
/// once this module is bound (eg. registering a hash function in `HashingProxy`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardCall {
    pub target: LogicalName,
    /// Human-readable function signature, eg. `setContractAddress(uint8,address)`.
    pub signature: String,
    pub args: Vec<ArgValue>,
    pub verify: Option<ForwardCheck>,
}

/// A view call whose result tells whether a [`ForwardCall`] is still in effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardCheck {
    /// Signature with its outputs, eg. `getContractAddress(uint8) returns (address)`.
    pub signature: String,
    pub args: Vec<ArgValue>,
    pub expected: ArgValue,
}

/// A named network feature a step may require (eg. `mock-token`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Capability(String);

impl Capability {
    /// Hand the Hub over to the Hub Controller at the end of a run.
    pub const TRANSFER_HUB_OWNERSHIP: &'static str = "transfer_hub_ownership";

    /// Every deployed module gets a funded account on the companion chain.
    pub const COMPANION_ACCOUNTS: &'static str = "companion_accounts";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable metadata about one deployable step of the module table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub logical_name: LogicalName,
    pub implementation_name: String,
    pub version: Option<Version>,
    pub registration: RegistrationPolicy,
    pub constructor: ConstructorPolicy,
    pub dependencies: Vec<LogicalName>,
    pub strategy: UpgradeStrategy,
    pub initialize: bool,
    pub forward_calls: Vec<ForwardCall>,
    pub tags: BTreeSet<String>,
    pub requires: Option<Capability>,
}

impl ModuleDescriptor {
    /// A step deploying `name` from the contract of the same name, registered
    /// in the Hub, taking the Hub address and depending on nothing else.
    pub fn new(name: LogicalName) -> Self {
        Self {
            implementation_name: name.as_str().to_owned(),
            logical_name: name,
            version: None,
            registration: RegistrationPolicy::RegisterInHub,
            constructor: ConstructorPolicy::PassHubAddress,
            dependencies: Vec::new(),
            strategy: UpgradeStrategy::Once,
            initialize: false,
            forward_calls: Vec::new(),
            tags: BTreeSet::new(),
            requires: None,
        }
    }

    pub fn with_implementation(mut self, name: impl Into<String>) -> Self {
        self.implementation_name = name.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_registration(mut self, registration: RegistrationPolicy) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorPolicy) -> Self {
        self.constructor = constructor;
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = LogicalName>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_strategy(mut self, strategy: UpgradeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }

    pub fn with_forward_call(mut self, call: ForwardCall) -> Self {
        self.forward_calls.push(call);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_requires(mut self, capability: Capability) -> Self {
        self.requires = Some(capability);
        self
    }

    /// Whether this step needs the Hub address, either to register itself
    /// or to pass it to its constructor.
    pub fn needs_hub(&self) -> bool {
        !self.logical_name.is_hub()
            && (self.registration.registers()
                || self.constructor == ConstructorPolicy::PassHubAddress)
    }

    /// Every logical name that must be resolvable before this step runs:
    /// the declared dependencies, the Hub when [`Self::needs_hub`], modules
    /// referenced by `@Name` arguments and forward-call targets.
    /// Duplicates and the step's own name are removed, first occurrence wins.
    pub fn effective_dependencies(&self) -> Vec<LogicalName> {
        let hub = self.needs_hub().then(LogicalName::hub);

        let constructor_refs: &[ArgValue] = match &self.constructor {
            ConstructorPolicy::PassExplicitArgs(args) => args.as_slice(),
            _ => &[],
        };

        let forward_refs = self.forward_calls.iter().flat_map(|call| {
            let verify = call.verify.iter().flat_map(|check| {
                check.args.iter().chain(core::iter::once(&check.expected))
            });

            core::iter::once(&call.target).chain(
                call.args
                    .iter()
                    .chain(verify)
                    .filter_map(ArgValue::module),
            )
        });

        let candidates = hub
            .iter()
            .chain(&self.dependencies)
            .chain(constructor_refs.iter().filter_map(ArgValue::module))
            .chain(forward_refs);

        let mut seen = BTreeSet::new();
        let mut deps = Vec::new();

        for name in candidates {
            if *name != self.logical_name && seen.insert(name) {
                deps.push(name.clone());
            }
        }

        deps
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
