use color_eyre::eyre::Result;
use tracing::debug;

use args::{Args, Commands};

mod args;
mod cmd;
mod logging;

#[tokio::main(flavor = "current_thread")]
pub async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::new();
    let config = args.load_config()?;

    logging::init(
        args.log_level.unwrap_or(config.logging.log_level),
        args.log_format.unwrap_or(config.logging.log_format),
    );

    debug!("Command-line parameters: {args:?}");

    match &args.command {
        Commands::Deploy(deploy) => cmd::deploy::run(&config, deploy).await,
        Commands::Plan(plan) => cmd::plan::run(&config, plan),
        Commands::Check(check) => cmd::check::run(&config, check).await,
        Commands::Ledger(network) => cmd::ledger::run(&config, network),
    }
}
