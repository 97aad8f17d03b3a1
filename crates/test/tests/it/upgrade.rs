use dkg_deploy_core_state_machine::{Decision, SkipReason};
use dkg_deploy_core_types::Version;
use dkg_deploy_orchestrator::Selection;
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;

use crate::bound;

#[tokio::test]
async fn major_upgrade_replaces_and_keeps_the_previous_address() {
    init_logging();

    let mut net = TestNet::new();

    net.orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let v1 = net.address("Staking");
    let sharding_table = net.address("ShardingTable");

    let orchestrator = net.orchestrator(modules_v2(), network());
    let report = orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();

    let deployed: Vec<_> = report.deployed().map(|s| (s.name.to_string(), s.decision)).collect();
    assert_eq!(deployed, [("Staking".to_owned(), Decision::Replace)]);

    let v2 = net.address("Staking");
    assert_ne!(v2, v1);
    assert_eq!(net.address("StakingDeprecated"), v1);

    let entry = net.ledger.get(&name("Staking")).unwrap();
    assert_eq!(entry.version, Some(Version::new(2, 0, 0)));
    assert_eq!(entry.implementation.as_deref(), Some("StakingV2"));

    assert_eq!(bound(&net, "Staking").await, v2);
    assert_eq!(bound(&net, "StakingDeprecated").await, v1);

    // In-place modules depending on the replaced one are re-initialized, not redeployed
    assert_eq!(net.address("ShardingTable"), sharding_table);
    assert_eq!(report.reinitialized, [name("ShardingTable")]);
    assert_eq!(net.chain.module(sharding_table).unwrap().initialized(), 2);

    // The new deployment gets its own parameters
    assert_eq!(report.seeded, [name("Staking")]);
    assert_eq!(net.chain.module(v2).unwrap().name(), "StakingV2");

    assert!(orchestrator.check(&net.ledger).await.unwrap().is_empty());
}

#[tokio::test]
async fn newer_deployments_are_never_downgraded() {
    let mut net = TestNet::new();

    net.orchestrator(modules_v2(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let v2 = net.address("Staking");
    let transactions = net.chain.transaction_count();

    let orchestrator = net.orchestrator(modules_v1(), network());

    let plan = orchestrator.plan(&net.ledger, &Selection::tagged(["staking"])).unwrap();
    assert_eq!(
        plan.steps[0].to_string(),
        "#4 Staking v1.0.0: deployed in a newer band, skip: a newer band is installed"
    );

    let report = orchestrator.run(&mut net.ledger, &Selection::all()).await.unwrap();

    let staking = report.steps.iter().find(|s| s.name == name("Staking")).unwrap();
    assert_eq!(staking.decision, Decision::Skip(SkipReason::NewerInstalled));
    assert_eq!(staking.address, Some(v2));

    assert!(report.is_noop());
    assert_eq!(net.chain.transaction_count(), transactions);
    assert_eq!(net.address("Staking"), v2);
}

#[tokio::test]
async fn second_replace_overwrites_the_deprecated_entry() {
    let mut net = TestNet::new();

    net.orchestrator(modules_v1(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    net.orchestrator(modules_v2(), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let v2 = net.address("Staking");

    let staking_v3 = r#"
[[module]]
name = "Hub"
registration = "do-not-register"
constructor = "pass-nothing"

[[module]]
name = "ParametersStorage"
version = "1.0"
initialize = true

[[module]]
name = "Staking"
implementation = "StakingV2"
version = "3.0"
strategy = "replace"
dependencies = ["ParametersStorage"]
initialize = true
"#;

    net.orchestrator(modules(staking_v3), network())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    assert_eq!(net.address("StakingDeprecated"), v2);
    assert_eq!(bound(&net, "StakingDeprecated").await, v2);
    assert_eq!(
        net.ledger.get(&name("Staking")).unwrap().version,
        Some(Version::new(3, 0, 0))
    );
}
