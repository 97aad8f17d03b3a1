//! Check command

use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use dkg_deploy_config::Config;

use crate::args::CheckArgs;

pub async fn run(config: &Config, args: &CheckArgs) -> Result<()> {
    let name = &args.network.network;
    let chain = super::connect(config.network(name)?, &args.signer)?;

    let orchestrator = super::orchestrator(config, name, Arc::new(chain))?;
    let ledger = super::open_ledger(config, name)?;

    let mismatches = orchestrator.check(&ledger).await?;

    for mismatch in &mismatches {
        println!(
            "{}: ledger has {}, Hub has {}",
            mismatch.name, mismatch.recorded, mismatch.registered
        );
    }

    if !mismatches.is_empty() {
        return Err(eyre!(
            "{} Hub binding(s) differ from the ledger of {name}",
            mismatches.len()
        ));
    }

    println!("Hub bindings match the ledger of {name}");
    Ok(())
}
