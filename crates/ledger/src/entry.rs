use std::collections::BTreeMap;
use std::time::SystemTime;

use dkg_deploy_core_types::{Address, LogicalName, Version, B256};
use serde::{Deserialize, Serialize};

/// What the Ledger records for one logical name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Address on the primary chain.
    pub evm_address: Address,

    /// Equivalent account on the companion chain, used for funding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_address: Option<String>,

    /// Last deployed version, absent for legacy deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,

    /// Block in which the contract was deployed, used as the replay start
    /// point by event indexers.
    pub block_number: u64,

    /// Contract the address was deployed from, when it differs from the logical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,

    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub deployed_at: Option<SystemTime>,

    /// Digest of the last parameter batch applied to the module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_digest: Option<B256>,

    /// Set from the deployment until every forward call of the step went
    /// through, so that calls without a view check are reissued by later runs.
    #[serde(default, skip_serializing_if = "is_false")]
    pub forwards_pending: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LedgerEntry {
    pub fn new(evm_address: Address, block_number: u64) -> Self {
        Self {
            evm_address,
            secondary_address: None,
            version: None,
            block_number,
            implementation: None,
            deployed_at: None,
            parameters_digest: None,
            forwards_pending: false,
        }
    }

    pub fn with_version(mut self, version: Option<Version>) -> Self {
        self.version = version;
        self
    }

    pub fn with_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }

    pub fn with_secondary_address(mut self, secondary: Option<String>) -> Self {
        self.secondary_address = secondary;
        self
    }

    pub fn with_deployed_at(mut self, at: SystemTime) -> Self {
        self.deployed_at = Some(at);
        self
    }

    pub fn with_forwards_pending(mut self, pending: bool) -> Self {
        self.forwards_pending = pending;
        self
    }
}

/// On-disk layout of a Ledger file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LedgerFile {
    #[serde(default)]
    pub contracts: BTreeMap<LogicalName, LedgerEntry>,
}
