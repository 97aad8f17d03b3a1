//! Fixtures shared by the end-to-end scenarios: module tables modelled on the
//! DKG contracts, matching in-memory artifacts and a parameter table.

use std::path::Path;
use std::sync::Arc;

use dkg_deploy_chain::memory::MemoryChain;
use dkg_deploy_chain::StaticArtifacts;
use dkg_deploy_config::{parse_modules, ParameterTable, DEFAULT_SECTION};
use dkg_deploy_core_types::{Address, LogicalName, ModuleTable};
use dkg_deploy_ledger::Ledger;
use dkg_deploy_orchestrator::{Network, Orchestrator};
use serde_json::json;

pub const DEPLOYER: Address = Address::repeat_byte(0xd0);
pub const NETWORK: &str = "hardhat";
pub const ENVIRONMENT: &str = "development";

const HUB: &str = r#"
[[module]]
name = "Hub"
registration = "do-not-register"
constructor = "pass-nothing"
tags = ["hub"]

[[module]]
name = "HubController"
registration = "do-not-register"
tags = ["hub"]

[[module]]
name = "ParametersStorage"
version = "1.0"
initialize = true
tags = ["storage"]

[[module]]
name = "KnowledgeCollectionStorage"
version = "1.0"
registration = "register-as-asset-storage"
tags = ["storage"]
"#;

const STAKING_V1: &str = r#"
[[module]]
name = "Staking"
version = "1.0"
strategy = "replace"
dependencies = ["ParametersStorage"]
initialize = true
tags = ["staking"]
"#;

const STAKING_V2: &str = r#"
[[module]]
name = "Staking"
implementation = "StakingV2"
version = "2.0"
strategy = "replace"
dependencies = ["ParametersStorage"]
initialize = true
tags = ["staking"]
"#;

const SHARDING_TABLE: &str = r#"
[[module]]
name = "ShardingTable"
version = "1.0"
strategy = "in-place"
dependencies = ["Staking"]
initialize = true
tags = ["staking"]

[[module.forward]]
target = "ParametersStorage"
signature = "setShardingTableAddress(address)"
args = ["@ShardingTable"]
verify = { signature = "shardingTableAddress() returns (address)", expected = "@ShardingTable" }
"#;

const SHARDING_TABLE_UNCHECKED: &str = r#"
[[module]]
name = "ShardingTable"
version = "1.0"
strategy = "in-place"
dependencies = ["Staking"]
initialize = true
tags = ["staking"]

[[module.forward]]
target = "ParametersStorage"
signature = "setShardingTableAddress(address)"
args = ["@ShardingTable"]
"#;

/// Module table with the first release of `Staking`.
pub fn modules_v1() -> ModuleTable {
    modules(&[HUB, STAKING_V1, SHARDING_TABLE].concat())
}

/// Module table where `Staking` moved to its second major version.
pub fn modules_v2() -> ModuleTable {
    modules(&[HUB, STAKING_V2, SHARDING_TABLE].concat())
}

/// Same as [`modules_v1`], but the `ShardingTable` forward call has no view check.
pub fn modules_v1_unchecked_forward() -> ModuleTable {
    modules(&[HUB, STAKING_V1, SHARDING_TABLE_UNCHECKED].concat())
}

pub fn modules(source: &str) -> ModuleTable {
    parse_modules(Path::new("modules.toml"), source).expect("valid module table")
}

/// Artifacts for every contract of the fixture tables.
pub fn artifacts() -> StaticArtifacts {
    let staking = [
        "constructor(address hubAddress)",
        "function initialize()",
        "function setMinimumStake(uint96 minimumStake)",
        "function minimumStake() view returns (uint96)",
    ];

    StaticArtifacts::new()
        .with("Hub", ["function owner() view returns (address)"])
        .and_then(|a| a.with("HubController", ["constructor(address hubAddress)"]))
        .and_then(|a| {
            a.with(
                "ParametersStorage",
                [
                    "constructor(address hubAddress)",
                    "function initialize()",
                    "function setReleaseEpoch(uint256 releaseEpoch)",
                    "function releaseEpoch() view returns (uint256)",
                    "function setEpochLength(uint256 epochLength)",
                    "function epochLength() view returns (uint256)",
                    "function setShardingTableAddress(address shardingTable)",
                    "function shardingTableAddress() view returns (address)",
                ],
            )
        })
        .and_then(|a| a.with("KnowledgeCollectionStorage", ["constructor(address hubAddress)"]))
        .and_then(|a| a.with("Staking", staking))
        .and_then(|a| a.with("StakingV2", staking))
        .and_then(|a| {
            a.with(
                "ShardingTable",
                ["constructor(address hubAddress)", "function initialize()"],
            )
        })
        .expect("valid artifacts")
}

/// Parameters of the `development` environment.
pub fn parameters() -> ParameterTable {
    let mut table = ParameterTable::default();

    table.insert(
        ENVIRONMENT,
        name("ParametersStorage"),
        DEFAULT_SECTION,
        "releaseEpoch",
        json!(42),
    );
    table.insert(
        ENVIRONMENT,
        name("ParametersStorage"),
        DEFAULT_SECTION,
        "epochLength",
        json!("3600"),
    );
    table.insert(
        ENVIRONMENT,
        name("Staking"),
        DEFAULT_SECTION,
        "minimumStake",
        json!("50000"),
    );

    table
}

pub fn name(name: &str) -> LogicalName {
    LogicalName::new(name).expect("valid logical name")
}

pub fn network() -> Network {
    Network::new(NETWORK, ENVIRONMENT)
}

/// An in-memory chain and the ledger of the deployments made on it.
pub struct TestNet {
    pub chain: Arc<MemoryChain>,
    pub ledger: Ledger,
}

impl TestNet {
    pub fn new() -> Self {
        Self {
            chain: Arc::new(MemoryChain::new(DEPLOYER)),
            ledger: Ledger::in_memory(NETWORK),
        }
    }

    pub fn orchestrator(&self, table: ModuleTable, network: Network) -> Orchestrator {
        Orchestrator::new(self.chain.clone(), Arc::new(artifacts()), table, network)
            .with_parameters(parameters())
    }

    /// Address recorded in the ledger for `module`.
    pub fn address(&self, module: &str) -> Address {
        self.ledger
            .get(&name(module))
            .map(|entry| entry.evm_address)
            .unwrap_or_else(|| panic!("{module} is not recorded"))
    }
}

impl Default for TestNet {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_logging() {
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter = EnvFilter::builder()
        .parse("info,dkg_deploy=debug")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_ids(false);

    let _ = builder.finish().try_init();
}
