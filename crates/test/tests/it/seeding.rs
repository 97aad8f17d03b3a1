use alloy_primitives::{Uint, U256};
use dkg_deploy_orchestrator::Selection;
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{view, IParametersStorage, IStaking};

#[tokio::test]
async fn parameters_are_set_after_deployment() {
    let mut net = TestNet::new();

    let report = net
        .orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert_eq!(report.seeded, [name("ParametersStorage"), name("Staking")]);

    let storage = net.address("ParametersStorage");
    assert_eq!(
        view(&net, storage, IParametersStorage::releaseEpochCall {}).await,
        U256::from(42)
    );
    assert_eq!(
        view(&net, storage, IParametersStorage::epochLengthCall {}).await,
        U256::from(3600)
    );
    assert_eq!(
        view(&net, net.address("Staking"), IStaking::minimumStakeCall {}).await,
        Uint::<96, 2>::from(50_000u64)
    );

    let setters: Vec<_> = net
        .chain
        .module(storage)
        .unwrap()
        .calls()
        .iter()
        .map(|call| call.signature.clone())
        .collect();

    assert_eq!(
        setters,
        [
            "initialize()",
            "setShardingTableAddress(address)",
            "setReleaseEpoch(uint256)",
            "setEpochLength(uint256)",
        ]
    );
}

#[tokio::test]
async fn changed_parameters_are_applied_again() {
    let mut net = TestNet::new();

    net.orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let mut parameters = parameters();
    parameters.insert(ENVIRONMENT, name("ParametersStorage"), NETWORK, "releaseEpoch", json!(43));

    let report = net
        .orchestrator(modules_v1(), network())
        .with_parameters(parameters)
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert!(report.deployed().next().is_none());
    assert_eq!(report.seeded, [name("ParametersStorage")]);
    // The whole batch is sent again
    assert_eq!(report.transactions, 2);

    assert_eq!(
        view(&net, net.address("ParametersStorage"), IParametersStorage::releaseEpochCall {}).await,
        U256::from(43)
    );
}
