use alloy_primitives::Address;
use dkg_deploy_chain::ArtifactError;
use dkg_deploy_config::{ParameterTable, DEFAULT_SECTION};
use dkg_deploy_core_state_machine::Decision;
use dkg_deploy_core_types::Version;
use dkg_deploy_graph::GraphError;
use dkg_deploy_orchestrator::{OrchestratorError, SeedingError, Selection};
use dkg_deploy_registry::abi::IHub;
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::{bound, view, IParametersStorage};

#[tokio::test]
async fn fresh_deploy_binds_every_module() {
    init_logging();

    let mut net = TestNet::new();
    let orchestrator = net.orchestrator(modules_v1(), network());
    let report = orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();

    let deployed: Vec<_> = report.deployed().map(|s| s.name.to_string()).collect();
    assert_eq!(
        deployed,
        [
            "Hub",
            "HubController",
            "ParametersStorage",
            "KnowledgeCollectionStorage",
            "Staking",
            "ShardingTable",
        ]
    );

    // 6 deployments, 4 Hub bindings, 3 initializations, 1 forward call, 3 setters
    assert_eq!(report.transactions, 17);
    assert_eq!(net.chain.transaction_count(), report.transactions);

    let hub = net.address("Hub");
    assert_eq!(hub, DEPLOYER.create(0));
    assert_eq!(net.chain.hub(hub).unwrap().owner(), DEPLOYER);
    assert!(!report.ownership_transferred);

    assert_eq!(bound(&net, "ParametersStorage").await, net.address("ParametersStorage"));
    assert_eq!(bound(&net, "Staking").await, net.address("Staking"));
    assert_eq!(bound(&net, "Hub").await, Address::ZERO);

    let storage = IHub::getAssetStorageAddressCall {
        contractName: name("KnowledgeCollectionStorage").to_bytes32(),
    };
    assert_eq!(view(&net, hub, storage).await, net.address("KnowledgeCollectionStorage"));
    assert_eq!(bound(&net, "KnowledgeCollectionStorage").await, Address::ZERO);

    let sharding_table = net.address("ShardingTable");
    assert_eq!(report.forward_calls, 1);
    assert_eq!(
        view(&net, net.address("ParametersStorage"), IParametersStorage::shardingTableAddressCall {}).await,
        sharding_table
    );

    let staking = net.chain.module(net.address("Staking")).unwrap();
    assert_eq!(staking.hub(), Some(hub));
    assert_eq!(staking.initialized(), 1);

    let entry = net.ledger.get(&name("Staking")).unwrap();
    assert_eq!(entry.version, Some(Version::new(1, 0, 0)));
    assert_eq!(entry.implementation, None);
    assert!(entry.parameters_digest.is_some());
    assert!(entry.secondary_address.is_none());

    // Every module lands in a later block than the modules it depends on
    for (_, step) in modules_v1().iter() {
        let dependent = net.ledger.get(&step.logical_name).unwrap();

        for dependency in step.effective_dependencies() {
            let recorded = net.ledger.get(&dependency).unwrap();
            assert!(
                recorded.block_number < dependent.block_number,
                "{dependency} (block {}) is not deployed before {} (block {})",
                recorded.block_number,
                step.logical_name,
                dependent.block_number,
            );
        }
    }
}

#[tokio::test]
async fn rerun_sends_no_transaction() {
    let mut net = TestNet::new();
    let orchestrator = net.orchestrator(modules_v1(), network());

    orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();
    let transactions = net.chain.transaction_count();
    let entries = |net: &TestNet| -> Vec<_> {
        net.ledger.iter().map(|(n, e)| (n.clone(), e.clone())).collect()
    };
    let recorded = entries(&net);

    let plan = orchestrator.plan(&net.ledger, &Selection::all()).unwrap();
    assert!(plan.is_noop());

    let report = orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();

    assert!(report.is_noop());
    assert!(report.steps.iter().all(|s| matches!(s.decision, Decision::Skip(_))));
    assert_eq!(report.forward_calls, 0);
    assert!(report.seeded.is_empty());
    assert_eq!(net.chain.transaction_count(), transactions);
    assert_eq!(entries(&net), recorded);
}

#[tokio::test]
async fn missing_dependency_stops_before_any_transaction() {
    let mut net = TestNet::new();
    let orchestrator = net.orchestrator(modules_v1(), network());

    let result = orchestrator
        .run(&mut net.ledger, &Selection::tagged(["staking"]))
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Graph(GraphError::MissingDependency { .. }))
    ));
    assert_eq!(net.chain.transaction_count(), 0);
    assert!(net.ledger.is_empty());
}

#[tokio::test]
async fn tagged_run_on_top_of_recorded_dependencies() {
    let mut net = TestNet::new();
    let orchestrator = net.orchestrator(modules_v1(), network());

    orchestrator
        .run(&mut net.ledger, &Selection::tagged(["hub", "storage"]))
        .await
        .unwrap();

    assert!(!net.ledger.contains(&name("Staking")));

    let report = orchestrator
        .run(&mut net.ledger, &Selection::tagged(["staking"]))
        .await
        .unwrap();

    let deployed: Vec<_> = report.deployed().map(|s| s.name.to_string()).collect();
    assert_eq!(deployed, ["Staking", "ShardingTable"]);
}

#[tokio::test]
async fn configuration_errors_stop_before_any_transaction() {
    let mut net = TestNet::new();

    let mut parameters = ParameterTable::default();
    parameters.insert(ENVIRONMENT, name("Staking"), DEFAULT_SECTION, "unknownVar", json!(1));

    let orchestrator = net.orchestrator(modules_v1(), network()).with_parameters(parameters);
    let result = orchestrator.run(&mut net.ledger, &Selection::all()).await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Seeding(SeedingError::UnknownSetter { .. }))
    ));

    let table = modules(
        r#"
[[module]]
name = "Hub"
registration = "do-not-register"
constructor = "pass-nothing"

[[module]]
name = "ParametersStorage"

[[module]]
name = "ShardingTable"

[[module.forward]]
target = "ParametersStorage"
signature = "setShardingTableAddress(address)"
args = ["@ShardingTable", "1"]
"#,
    );

    let result = net
        .orchestrator(table, network())
        .run(&mut net.ledger, &Selection::all())
        .await;

    assert!(matches!(result, Err(OrchestratorError::Arguments { step, .. }) if step == name("ShardingTable")));

    let table = modules(
        r#"
[[module]]
name = "Hub"
registration = "do-not-register"
constructor = "pass-nothing"

[[module]]
name = "RandomSampling"
"#,
    );

    let result = net
        .orchestrator(table, network())
        .run(&mut net.ledger, &Selection::all())
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Artifact(ArtifactError::NotFound(contract))) if contract == "RandomSampling"
    ));

    assert_eq!(net.chain.transaction_count(), 0);
    assert!(net.ledger.is_empty());
}
