mod companion;
mod deploy;
mod ownership;
mod recovery;
mod rewiring;
mod seeding;
mod upgrade;

use alloy_primitives::Address;
use alloy_sol_types::{sol, SolCall};
use dkg_deploy_chain::Chain;
use dkg_deploy_registry::abi::IHub;
use dkg_deploy_test::{name, TestNet};

sol! {
    interface IParametersStorage {
        function releaseEpoch() external view returns (uint256);
        function epochLength() external view returns (uint256);
        function shardingTableAddress() external view returns (address);
        function setShardingTableAddress(address shardingTable) external;
    }

    interface IStaking {
        function minimumStake() external view returns (uint96);
    }
}

/// Executes a view call against the latest state and decodes its return value.
pub async fn view<C: SolCall>(net: &TestNet, to: Address, call: C) -> C::Return {
    let output = net.chain.call(to, call.abi_encode().into()).await.unwrap();
    C::abi_decode_returns(&output).unwrap()
}

/// Address the Hub binds `module` to in its contract namespace.
pub async fn bound(net: &TestNet, module: &str) -> Address {
    let call = IHub::getContractAddressCall {
        contractName: name(module).to_bytes32(),
    };

    view(net, net.address("Hub"), call).await
}
