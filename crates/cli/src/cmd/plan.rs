//! Plan command

use color_eyre::eyre::Result;
use dkg_deploy_config::{load_modules, Config};
use dkg_deploy_orchestrator::{Network, Plan};

use crate::args::PlanArgs;

pub fn run(config: &Config, args: &PlanArgs) -> Result<()> {
    let name = &args.network.network;
    let network = Network::from_config(name, config.network(name)?);
    let table = load_modules(&config.modules)?;
    let ledger = super::open_ledger(config, name)?;

    let plan = Plan::build(&table, &ledger, &network, &args.selection.selection())?;

    print!("{plan}");

    if plan.is_noop() {
        println!("Nothing to deploy on {name}");
    } else {
        println!("{} deployment(s) on {name}", plan.deployments().count());
    }

    Ok(())
}
