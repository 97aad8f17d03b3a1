use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use dkg_deploy_chain::ChainError;
use dkg_deploy_ledger::{FlushMode, Ledger};
use dkg_deploy_orchestrator::{Mismatch, OrchestratorError, Selection};
use dkg_deploy_registry::abi::IHub;
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn failed_run_resumes_from_the_failing_module() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let net = TestNet::new();
    net.chain.fail_deployments_of("Staking");

    let mut ledger = Ledger::open(dir.path(), NETWORK).unwrap();
    let result = net
        .orchestrator(modules_v1(), network())
        .run(&mut ledger, &Selection::all())
        .await;

    match result {
        Err(OrchestratorError::Chain { step, source }) => {
            assert_eq!(step, name("Staking"));
            assert!(matches!(source, ChainError::Reverted { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    drop(ledger);

    // Everything before the failing module made it to disk
    let mut ledger = Ledger::open(dir.path(), NETWORK).unwrap();
    let recorded: Vec<_> = ledger.iter().map(|(name, _)| name.to_string()).collect();
    assert_eq!(
        recorded,
        [
            "Hub",
            "HubController",
            "KnowledgeCollectionStorage",
            "ParametersStorage",
        ]
    );

    // Parameters are only seeded once every module is in place
    assert!(ledger
        .get(&name("ParametersStorage"))
        .unwrap()
        .parameters_digest
        .is_none());

    net.chain.clear_failures();

    let report = net
        .orchestrator(modules_v1(), network())
        .run(&mut ledger, &Selection::all())
        .await
        .unwrap();

    let deployed: Vec<_> = report.deployed().map(|s| s.name.to_string()).collect();
    assert_eq!(deployed, ["Staking", "ShardingTable"]);
    assert_eq!(report.seeded, [name("ParametersStorage"), name("Staking")]);
    assert_eq!(ledger.len(), 6);
}

#[tokio::test]
async fn end_of_run_flush_keeps_completed_modules_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let net = TestNet::new();
    net.chain.fail_deployments_of("ShardingTable");

    let mut ledger = Ledger::open(dir.path(), NETWORK).unwrap();
    let result = net
        .orchestrator(modules_v1(), network())
        .with_flush_mode(FlushMode::EndOfRun)
        .run(&mut ledger, &Selection::all())
        .await;

    assert!(result.is_err());
    drop(ledger);

    let ledger = Ledger::open(dir.path(), NETWORK).unwrap();
    assert!(ledger.contains(&name("Staking")));
    assert!(!ledger.contains(&name("ShardingTable")));
}

#[tokio::test]
async fn check_reports_bindings_changed_behind_the_ledger() {
    let mut net = TestNet::new();
    let orchestrator = net.orchestrator(modules_v1(), network());

    orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();
    assert!(orchestrator.check(&net.ledger).await.unwrap().is_empty());

    let rogue = Address::repeat_byte(0x99);
    let rebind = IHub::setContractAddressCall {
        contractName: name("ShardingTable").to_bytes32(),
        newContractAddress: rogue,
    };
    net.chain
        .send_from(DEPLOYER, net.address("Hub"), rebind.abi_encode().into())
        .unwrap();

    assert_eq!(
        orchestrator.check(&net.ledger).await.unwrap(),
        [Mismatch {
            name: name("ShardingTable"),
            recorded: net.address("ShardingTable"),
            registered: rogue,
        }]
    );
}
