//! Ledger command

use color_eyre::eyre::Result;
use dkg_deploy_config::Config;

use crate::args::NetworkArgs;

pub fn run(config: &Config, args: &NetworkArgs) -> Result<()> {
    let ledger = super::open_ledger(config, &args.network)?;

    for (name, entry) in ledger.iter() {
        let version = entry
            .version
            .map(|v| format!("v{v}"))
            .unwrap_or_else(|| "-".to_owned());

        println!(
            "{name:<32} {} {version:<8} block {:<10} {}",
            entry.evm_address,
            entry.block_number,
            entry.secondary_address.as_deref().unwrap_or_default(),
        );
    }

    Ok(())
}
