use alloy_primitives::Address;
use dkg_deploy_chain::{ArtifactError, ChainError};
use dkg_deploy_core_types::{LogicalName, NameError};
use dkg_deploy_graph::GraphError;
use dkg_deploy_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Seeding(#[from] SeedingError),

    #[error(transparent)]
    Name(#[from] NameError),

    #[error("Invalid arguments for `{step}`: {reason}")]
    Arguments { step: LogicalName, reason: String },

    #[error(
        "Hub is owned by {owner}, which is neither the deployer nor the recorded Hub Controller"
    )]
    UnknownHubOwner { owner: Address },

    #[error("Hub Controller at {controller} is owned by {owner}, not by the deployer {deployer}")]
    ControllerNotOwned {
        controller: Address,
        owner: Address,
        deployer: Address,
    },

    #[error("Network `{network}` requires companion accounts but has no companion configuration")]
    MissingCompanion { network: String },

    #[error("`{0}` is not deployed")]
    NotDeployed(LogicalName),

    #[error("Unexpected output of `{call}`: {reason}")]
    Decode { call: String, reason: String },

    /// A transaction or call failed, the run stops at this module.
    #[error("`{step}` failed: {source}")]
    Chain {
        step: LogicalName,
        #[source]
        source: ChainError,
    },
}

impl OrchestratorError {
    pub(crate) fn chain(step: &LogicalName) -> impl FnOnce(ChainError) -> Self + '_ {
        move |source| Self::Chain {
            step: step.clone(),
            source,
        }
    }

    pub(crate) fn arguments(step: &LogicalName, reason: impl ToString) -> Self {
        Self::Arguments {
            step: step.clone(),
            reason: reason.to_string(),
        }
    }
}

/// The parameter table does not fit the module ABI.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SeedingError {
    #[error("`{module}` has no single-argument setter `{setter}` for parameter `{variable}`")]
    UnknownSetter {
        module: LogicalName,
        variable: String,
        setter: String,
    },

    #[error("Invalid value for parameter `{variable}` of `{module}`: {reason}")]
    InvalidValue {
        module: LogicalName,
        variable: String,
        reason: String,
    },
}
