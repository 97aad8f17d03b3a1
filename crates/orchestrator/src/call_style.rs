use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolValue};
use dkg_deploy_chain::{Chain, ChainError};
use dkg_deploy_core_types::LogicalName;
use dkg_deploy_ledger::Ledger;
use dkg_deploy_registry::abi::{IHub, IHubController};
use tracing::debug;

use crate::error::OrchestratorError;

/// How owner-gated calls (Hub mutations, module configuration) reach their target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallStyle {
    /// The deployer owns the Hub and calls targets itself.
    Direct,
    /// The Hub Controller owns the Hub, every call is wrapped in `forwardCall`.
    Forwarded { controller: Address },
}

impl CallStyle {
    /// The transaction to send for an owner-gated call of `data` on `target`.
    pub fn route(&self, target: Address, data: Bytes) -> (Address, Bytes) {
        match *self {
            Self::Direct => (target, data),
            Self::Forwarded { controller } => {
                let call = IHubController::forwardCallCall { target, data };
                (controller, call.abi_encode().into())
            }
        }
    }

    /// Determines the call style from the current owner of the Hub.
    ///
    /// A Hub that is not recorded yet will be deployed, and owned, by the deployer.
    pub async fn detect(chain: &dyn Chain, ledger: &Ledger) -> Result<Self, OrchestratorError> {
        let Some(hub) = ledger.get(&LogicalName::hub()) else {
            return Ok(Self::Direct);
        };

        let deployer = chain.deployer();
        let owner = owner_of(chain, hub.evm_address, &LogicalName::hub()).await?;

        if owner == deployer {
            debug!(%owner, "Hub is owned by the deployer");
            return Ok(Self::Direct);
        }

        let controller = ledger
            .get(&LogicalName::hub_controller())
            .map(|entry| entry.evm_address)
            .filter(|controller| *controller == owner)
            .ok_or(OrchestratorError::UnknownHubOwner { owner })?;

        let controller_owner = owner_of(chain, controller, &LogicalName::hub_controller()).await?;
        if controller_owner != deployer {
            return Err(OrchestratorError::ControllerNotOwned {
                controller,
                owner: controller_owner,
                deployer,
            });
        }

        debug!(%controller, "Hub is owned by the Hub Controller");
        Ok(Self::Forwarded { controller })
    }
}

/// Reads `owner()` of a Hub or Hub Controller.
pub(crate) async fn owner_of(
    chain: &dyn Chain,
    contract: Address,
    name: &LogicalName,
) -> Result<Address, OrchestratorError> {
    // Both contracts share the `owner()` selector
    let output = chain
        .call(contract, IHub::ownerCall {}.abi_encode().into())
        .await
        .map_err(OrchestratorError::chain(name))?;

    decode_address(&output, "owner()")
}

pub(crate) fn decode_address(output: &[u8], call: &str) -> Result<Address, OrchestratorError> {
    Address::abi_decode(output).map_err(|e| OrchestratorError::Decode {
        call: call.to_owned(),
        reason: e.to_string(),
    })
}

/// Sends an owner-gated call, routed according to `style`.
pub(crate) async fn send_gated(
    chain: &dyn Chain,
    style: CallStyle,
    target: Address,
    data: Bytes,
) -> Result<(), ChainError> {
    let (to, data) = style.route(target, data);
    chain.send(to, data).await.map(|_| ())
}
