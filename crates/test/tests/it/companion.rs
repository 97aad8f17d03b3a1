use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dkg_deploy_chain::{convert_address, ChainError, Funder};
use dkg_deploy_config::CompanionConfig;
use dkg_deploy_core_types::Capability;
use dkg_deploy_orchestrator::{OrchestratorError, Selection};
use dkg_deploy_test::*;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingFunder {
    funded: Mutex<Vec<(String, u128)>>,
}

#[async_trait]
impl Funder for RecordingFunder {
    async fn fund(&self, secondary: &str, amount: u128) -> Result<(), ChainError> {
        self.funded.lock().unwrap().push((secondary.to_owned(), amount));
        Ok(())
    }
}

fn neuroweb() -> dkg_deploy_orchestrator::Network {
    network().with_capabilities(
        [Capability::new(Capability::COMPANION_ACCOUNTS)]
            .into_iter()
            .collect(),
    )
}

#[tokio::test]
async fn companion_accounts_need_a_companion_section() {
    let mut net = TestNet::new();

    let result = net
        .orchestrator(modules_v1(), neuroweb())
        .run(&mut net.ledger, &Selection::all())
        .await;

    assert!(matches!(
        result,
        Err(OrchestratorError::MissingCompanion { network }) if network == NETWORK
    ));
    assert_eq!(net.chain.transaction_count(), 0);
}

#[tokio::test]
async fn every_deployment_gets_a_funded_companion_account() {
    let mut net = TestNet::new();
    let funder = Arc::new(RecordingFunder::default());

    let companion = CompanionConfig {
        ss58_prefix: 101,
        funding_amount: 1_000,
    };

    net.orchestrator(modules_v1(), neuroweb().with_companion(companion))
        .with_funder(funder.clone())
        .run(&mut net.ledger, &Selection::all())
        .await
        .unwrap();

    let funded = funder.funded.lock().unwrap().clone();
    assert_eq!(funded.len(), 6);
    assert!(funded.iter().all(|(_, amount)| *amount == 1_000));

    for (name, entry) in net.ledger.iter() {
        let expected = convert_address(entry.evm_address, 101);
        assert_eq!(entry.secondary_address.as_ref(), Some(&expected), "{name}");
        assert!(funded.iter().any(|(account, _)| *account == expected));
    }
}
