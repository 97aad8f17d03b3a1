use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use dkg_deploy_core_types::Capability;
use dkg_deploy_orchestrator::{OrchestratorError, Selection};
use dkg_deploy_registry::abi::{IHub, IHubController};
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;

use crate::bound;

const MULTISIG: Address = Address::repeat_byte(0x5a);

fn mainnet_like() -> dkg_deploy_orchestrator::Network {
    network().with_capabilities(
        [Capability::new(Capability::TRANSFER_HUB_OWNERSHIP)]
            .into_iter()
            .collect(),
    )
}

#[tokio::test]
async fn hub_is_handed_over_and_later_calls_are_forwarded() {
    init_logging();

    let mut net = TestNet::new();

    let report = net
        .orchestrator(modules_v1(), mainnet_like())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let hub = net.address("Hub");
    let controller = net.address("HubController");

    assert!(report.ownership_transferred);
    assert_eq!(net.chain.hub(hub).unwrap().owner(), controller);
    assert_eq!(net.chain.controller(controller).unwrap().owner(), DEPLOYER);

    // Nothing left to do, and ownership is not transferred twice
    let report = net
        .orchestrator(modules_v1(), mainnet_like())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert!(report.is_noop());
    assert!(!report.ownership_transferred);

    let before = net.chain.transaction_count();
    let orchestrator = net.orchestrator(modules_v2(), mainnet_like());
    let report = orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();

    assert_eq!(report.reinitialized, [name("ShardingTable")]);

    // Every owner-gated call goes through the Hub Controller
    let transactions = net.chain.transactions();
    assert!(transactions.len() > before + 1);
    for tx in &transactions[before..] {
        match tx.to {
            None => {}
            Some(to) => {
                assert_eq!(to, controller);
                assert!(IHubController::forwardCallCall::abi_decode(&tx.data).is_ok());
            }
        }
    }

    let staking = net.address("Staking");
    assert_eq!(bound(&net, "Staking").await, staking);

    let module = net.chain.module(staking).unwrap();
    assert!(module.initialized() == 1);
    assert!(module.calls().iter().all(|call| call.sender == controller));

    assert!(orchestrator.check(&net.ledger).await.unwrap().is_empty());
}

#[tokio::test]
async fn hub_held_by_a_third_party_is_refused() {
    let mut net = TestNet::new();

    net.orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let transfer = IHub::transferOwnershipCall { newOwner: MULTISIG };
    net.chain
        .send_from(DEPLOYER, net.address("Hub"), transfer.abi_encode().into())
        .unwrap();

    let before = net.chain.transaction_count();

    let result = net
        .orchestrator(modules_v2(), network())
        .run(&mut net.ledger, &Selection::all())
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::UnknownHubOwner { owner }) if owner == MULTISIG
    ));
    assert_eq!(net.chain.transaction_count(), before);
}

#[tokio::test]
async fn controller_must_be_owned_by_the_deployer() {
    let mut net = TestNet::new();

    net.orchestrator(modules_v1(), mainnet_like())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let controller = net.address("HubController");
    let transfer = IHubController::transferOwnershipCall { newOwner: MULTISIG };
    net.chain
        .send_from(DEPLOYER, controller, transfer.abi_encode().into())
        .unwrap();

    let result = net
        .orchestrator(modules_v2(), mainnet_like())
        .run(&mut net.ledger, &Selection::all())
        .await;

    match result {
        Err(OrchestratorError::ControllerNotOwned {
            controller: c,
            owner,
            deployer,
        }) => {
            assert_eq!(c, controller);
            assert_eq!(owner, MULTISIG);
            assert_eq!(deployer, DEPLOYER);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
