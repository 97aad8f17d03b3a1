//! Deploy command

use std::sync::Arc;

use color_eyre::eyre::{Report, Result};
use dkg_deploy_chain::Chain;
use dkg_deploy_config::Config;
use tracing::{info, Instrument};

use crate::args::DeployArgs;

pub async fn run(config: &Config, args: &DeployArgs) -> Result<()> {
    let name = &args.network.network;
    let chain = super::connect(config.network(name)?, &args.signer)?;

    let span = tracing::error_span!("deploy", network = %name);

    async move {
        info!(deployer = %chain.deployer(), "Deploying");

        let orchestrator = super::orchestrator(config, name, Arc::new(chain))?;
        let mut ledger = super::open_ledger(config, name)?;

        let report = orchestrator
            .run(&mut ledger, &args.selection.selection())
            .await?;

        for step in report.deployed() {
            if let Some(address) = step.address {
                info!(module = %step.name, %address, decision = %step.decision, "Deployed");
            }
        }

        info!(
            deployed = report.deployed().count(),
            forward_calls = report.forward_calls,
            reinitialized = report.reinitialized.len(),
            seeded = report.seeded.len(),
            ownership_transferred = report.ownership_transferred,
            transactions = report.transactions,
            "Done"
        );

        Ok::<_, Report>(())
    }
    .instrument(span)
    .await
}
