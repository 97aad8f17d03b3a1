//! Command-line interface
//!
//! Settings come from the configuration file given with `--config`, with
//! environment overrides prefixed by `DKG_DEPLOY__`. The log settings can be
//! overridden on the command-line.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dkg_deploy_config::{load_config, Config, ConfigError, LogFormat, LogLevel, ENV_PREFIX};
use dkg_deploy_orchestrator::Selection;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE", default_value = "deploy/config.toml")]
    pub config: PathBuf,

    /// Log level, overrides the config file
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log format (plaintext or json), overrides the config file
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Deploy, upgrade and configure the modules of a network
    Deploy(DeployArgs),
    /// Show what `deploy` would do, without sending any transaction
    Plan(PlanArgs),
    /// Compare the Hub bindings with the ledger
    Check(CheckArgs),
    /// Print the ledger of a network
    Ledger(NetworkArgs),
}

#[derive(clap::Args, Clone, Debug, PartialEq, Eq)]
pub struct NetworkArgs {
    /// Network name, as configured under `[networks]`
    #[arg(short, long, env = "DKG_DEPLOY_NETWORK")]
    pub network: String,
}

#[derive(clap::Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionArgs {
    /// Only run the steps carrying one of these tags (and their dependencies must be deployed)
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,
}

impl SelectionArgs {
    pub fn selection(&self) -> Selection {
        if self.tags.is_empty() {
            Selection::all()
        } else {
            Selection::tagged(self.tags.iter().cloned())
        }
    }
}

#[derive(clap::Args, Clone, PartialEq, Eq)]
pub struct SignerArgs {
    /// Hex-encoded private key of the deployer
    #[arg(long, env = "DKG_DEPLOY_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,
}

// Keep the key out of debug logs
impl std::fmt::Debug for SignerArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerArgs").finish_non_exhaustive()
    }
}

#[derive(clap::Args, Clone, Debug, PartialEq, Eq)]
pub struct DeployArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub signer: SignerArgs,
}

#[derive(clap::Args, Clone, Debug, PartialEq, Eq)]
pub struct PlanArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(clap::Args, Clone, Debug, PartialEq, Eq)]
pub struct CheckArgs {
    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub signer: SignerArgs,
}

impl Args {
    pub fn new() -> Args {
        Args::parse()
    }

    /// Loads the config file, with paths relative to the directory holding it.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let config = load_config(&self.config, Some(ENV_PREFIX))?;
        let base = self.config.parent().unwrap_or(Path::new("."));

        Ok(config.relative_to(base))
    }
}
