use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use dkg_deploy_core_state_machine::{Decision, SkipReason};
use dkg_deploy_core_types::ModuleTable;
use dkg_deploy_orchestrator::{OrchestratorError, Selection};
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;

use crate::{view, IParametersStorage};

/// Deploys the Hub and storages, then makes `setShardingTableAddress` revert
/// and runs the whole table, which fails on the `ShardingTable` forward call.
async fn fail_sharding_table_wiring(net: &mut TestNet, table: fn() -> ModuleTable) {
    net.orchestrator(table(), network())
        .run(&mut net.ledger, &Selection::tagged(["hub", "storage"]))
        .await
        .unwrap();

    let storage = net.address("ParametersStorage");
    net.chain.fail_calls(
        storage,
        IParametersStorage::setShardingTableAddressCall::SELECTOR,
    );

    let result = net
        .orchestrator(table(), network())
        .run(&mut net.ledger, &Selection::all())
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Chain { step, .. }) if step == name("ShardingTable")
    ));

    // The module itself is in place, only the wiring is missing
    assert!(net.ledger.contains(&name("ShardingTable")));
    assert_eq!(
        view(net, storage, IParametersStorage::shardingTableAddressCall {}).await,
        Address::ZERO
    );

    net.chain.clear_failures();
}

#[tokio::test]
async fn checked_forward_call_is_reissued_when_its_view_disagrees() {
    init_logging();

    let mut net = TestNet::new();
    fail_sharding_table_wiring(&mut net, modules_v1).await;

    let sharding_table = net.address("ShardingTable");

    let report = net
        .orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let step = report
        .steps
        .iter()
        .find(|s| s.name == name("ShardingTable"))
        .unwrap();

    assert_eq!(step.decision, Decision::Skip(SkipReason::AlreadyCurrent));
    assert_eq!(report.forward_calls, 1);
    assert_eq!(net.address("ShardingTable"), sharding_table);
    assert_eq!(
        view(
            &net,
            net.address("ParametersStorage"),
            IParametersStorage::shardingTableAddressCall {}
        )
        .await,
        sharding_table
    );

    let report = net
        .orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert_eq!(report.forward_calls, 0);
    assert!(report.is_noop());
}

#[tokio::test]
async fn unchecked_forward_call_is_retried_until_it_goes_through() {
    let mut net = TestNet::new();
    fail_sharding_table_wiring(&mut net, modules_v1_unchecked_forward).await;

    assert!(net.ledger.get(&name("ShardingTable")).unwrap().forwards_pending);

    let sharding_table = net.address("ShardingTable");

    let report = net
        .orchestrator(modules_v1_unchecked_forward(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert_eq!(report.forward_calls, 1);
    assert!(report.deployed().all(|s| s.name != name("ShardingTable")));
    assert!(!net.ledger.get(&name("ShardingTable")).unwrap().forwards_pending);
    assert_eq!(
        view(
            &net,
            net.address("ParametersStorage"),
            IParametersStorage::shardingTableAddressCall {}
        )
        .await,
        sharding_table
    );

    // Once through, a call without a view check is not sent again
    let report = net
        .orchestrator(modules_v1_unchecked_forward(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert_eq!(report.forward_calls, 0);
    assert!(report.is_noop());
}
