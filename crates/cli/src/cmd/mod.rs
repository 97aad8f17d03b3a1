use std::sync::Arc;

use color_eyre::eyre::Result;
use dkg_deploy_chain::evm::EvmChain;
use dkg_deploy_chain::{ArtifactDir, Chain};
use dkg_deploy_config::{load_modules, Config, NetworkConfig, ParameterTable};
use dkg_deploy_ledger::Ledger;
use dkg_deploy_orchestrator::{Network, Orchestrator};
use tracing::debug;

use crate::args::SignerArgs;

pub mod check;
pub mod deploy;
pub mod ledger;
pub mod plan;

fn open_ledger(config: &Config, network: &str) -> Result<Ledger> {
    Ok(Ledger::open(&config.ledger.dir, network)?)
}

fn connect(network: &NetworkConfig, signer: &SignerArgs) -> Result<EvmChain> {
    let chain = EvmChain::connect(&network.rpc_url, &signer.private_key)?
        .with_confirmations(network.confirmations)
        .with_receipt_timeout(network.receipt_timeout);

    Ok(chain)
}

/// The parameter table, empty when the configured file does not exist.
fn load_parameters(config: &Config) -> Result<ParameterTable> {
    if !config.parameters.exists() {
        debug!(path = %config.parameters.display(), "No parameter table");
        return Ok(ParameterTable::default());
    }

    Ok(ParameterTable::load(&config.parameters)?)
}

fn orchestrator(config: &Config, name: &str, chain: Arc<dyn Chain>) -> Result<Orchestrator> {
    let network = Network::from_config(name, config.network(name)?);
    let table = load_modules(&config.modules)?;
    let artifacts = Arc::new(ArtifactDir::new(&config.artifacts));

    let orchestrator = Orchestrator::new(chain, artifacts, table, network)
        .with_parameters(load_parameters(config)?)
        .with_flush_mode(config.ledger.flush);

    Ok(orchestrator)
}
