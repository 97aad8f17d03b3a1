//! Configuration of the DKG deployment orchestrator.
//!
//! - [`Config`]: orchestrator settings and the per-network capability table,
//!   loaded from a TOML file with `DKG_DEPLOY__*` environment overrides.
//! - [`modules`]: the module table file (`modules.toml`).
//! - [`parameters`]: the parameter table file (`parameters.json`).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]

use core::fmt;
use core::str::FromStr;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dkg_deploy_core_types::{Capability, NameError, TableError};
use dkg_deploy_graph::GraphError;
use dkg_deploy_ledger::FlushMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod modules;
pub mod parameters;
mod utils;

pub use modules::{load_modules, parse_modules};
pub use parameters::{ParameterTable, Parameters, DEFAULT_SECTION};

/// Prefix of environment variables overriding configuration values,
/// eg. `DKG_DEPLOY__LOGGING__LOG_LEVEL=debug`.
pub const ENV_PREFIX: &str = "DKG_DEPLOY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid module table `{}`: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid parameter table `{}`: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Network `{0}` is not configured")]
    UnknownNetwork(String),

    #[error("Network name `{0}` is reserved")]
    ReservedNetwork(String),

    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Orchestrator configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the compiled contract artifacts
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,

    /// Module table file
    #[serde(default = "default_modules")]
    pub modules: PathBuf,

    /// Parameter table file
    #[serde(default = "default_parameters")]
    pub parameters: PathBuf,

    /// Log configuration options
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Deployment Ledger options
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Networks the orchestrator can deploy to, by name
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_modules() -> PathBuf {
    PathBuf::from("deploy/modules.toml")
}

fn default_parameters() -> PathBuf {
    PathBuf::from("deploy/parameters.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifacts: default_artifacts(),
            modules: default_modules(),
            parameters: default_parameters(),
            logging: LoggingConfig::default(),
            ledger: LedgerConfig::default(),
            networks: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork(name.to_owned()))
    }

    /// Resolves the relative file paths of this configuration against `base`,
    /// typically the directory holding the configuration file.
    pub fn relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.artifacts,
            &mut self.modules,
            &mut self.parameters,
            &mut self.ledger.dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }

        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if let Some(name) = self
            .networks
            .keys()
            .find(|name| name.as_str() == parameters::DEFAULT_SECTION)
        {
            return Err(ConfigError::ReservedNetwork(name.clone()));
        }

        Ok(self)
    }
}

/// Settings of one network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,

    /// Environment section of the parameter table used on this network
    pub environment: String,

    /// Confirmations to wait for before a transaction counts as done
    #[serde(
        default = "default_confirmations",
        deserialize_with = "utils::uint_from_anything"
    )]
    pub confirmations: u64,

    /// Give up waiting for a receipt after this long
    #[serde(default, with = "humantime_serde")]
    pub receipt_timeout: Option<Duration>,

    /// Features enabled on this network
    #[serde(default)]
    pub capabilities: Capabilities,

    /// Set on EVM parachains with a Substrate-side companion account per contract
    #[serde(default)]
    pub companion: Option<CompanionConfig>,
}

fn default_confirmations() -> u64 {
    1
}

/// Set of [`Capability`] granted to a network.
///
/// Steps requiring a capability are only part of runs on networks granting it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    pub fn grants(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Companion-chain account settings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionConfig {
    /// SS58 address format of the companion chain (eg. 101 on NeuroWeb)
    pub ss58_prefix: u16,

    /// Amount transferred to every new companion account, in the smallest unit
    #[serde(default, deserialize_with = "utils::uint_from_anything")]
    pub funding_amount: u128,
}

/// Deployment Ledger options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding the `<network>_contracts.json` files
    #[serde(default = "default_ledger_dir")]
    pub dir: PathBuf,

    /// When the Ledger is written back to disk
    #[serde(default)]
    pub flush: FlushMode,
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from("deployments")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: default_ledger_dir(),
            flush: FlushMode::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            e => Err(format!("Invalid log level: {e}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plaintext" => Ok(Self::Plaintext),
            "json" => Ok(Self::Json),
            e => Err(format!("Invalid log format: {e}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext => f.write_str("plaintext"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Loads the configuration file at `path`, then applies the environment
/// overrides starting with `prefix` (default [`ENV_PREFIX`]), eg.
/// `DKG_DEPLOY__NETWORKS__MAINNET__CONFIRMATIONS=3`.
pub fn load_config(path: impl AsRef<Path>, prefix: Option<&str>) -> Result<Config, ConfigError> {
    let config: Config = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(config::Environment::with_prefix(prefix.unwrap_or(ENV_PREFIX)).separator("__"))
        .build()?
        .try_deserialize()?;

    config.validate()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const CONFIG: &str = r#"
artifacts = "artifacts"

[logging]
log_level = "debug"
log_format = "json"

[ledger]
dir = "deployments"
flush = "end-of-run"

[networks.hardhat]
rpc_url = "http://127.0.0.1:8545"
environment = "development"

[networks.neuroweb_mainnet]
rpc_url = "https://astrosat-parachain-rpc.origin-trail.network"
environment = "mainnet"
confirmations = 3
receipt_timeout = "5m"
capabilities = ["transfer_hub_ownership"]
companion = { ss58_prefix = 101, funding_amount = "50000000000000000000" }
"#;

    #[test]
    fn parse_config_file() {
        let config = toml::from_str::<Config>(CONFIG).unwrap();

        assert_eq!(config.logging.log_level, LogLevel::Debug);
        assert_eq!(config.logging.log_format, LogFormat::Json);
        assert_eq!(config.ledger.flush, FlushMode::EndOfRun);
        assert_eq!(config.modules, PathBuf::from("deploy/modules.toml"));

        let hardhat = config.network("hardhat").unwrap();
        assert_eq!(hardhat.confirmations, 1);
        assert_eq!(hardhat.receipt_timeout, None);
        assert_eq!(hardhat.companion, None);
        assert!(!hardhat
            .capabilities
            .grants(&Capability::new(Capability::TRANSFER_HUB_OWNERSHIP)));

        let mainnet = config.network("neuroweb_mainnet").unwrap();
        assert_eq!(mainnet.confirmations, 3);
        assert_eq!(mainnet.receipt_timeout, Some(Duration::from_secs(300)));
        assert!(mainnet
            .capabilities
            .grants(&Capability::new(Capability::TRANSFER_HUB_OWNERSHIP)));
        assert_eq!(
            mainnet.companion,
            Some(CompanionConfig {
                ss58_prefix: 101,
                funding_amount: 50_000_000_000_000_000_000,
            })
        );

        assert!(matches!(
            config.network("gnosis"),
            Err(ConfigError::UnknownNetwork(_))
        ));
    }

    #[test]
    fn load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, CONFIG).unwrap();

        // Use a prefix no environment variable starts with
        let config = load_config(&path, Some("DKG_DEPLOY_TEST_UNSET")).unwrap();
        assert_eq!(config.networks.len(), 2);

        let config = config.relative_to(dir.path());
        assert_eq!(config.artifacts, dir.path().join("artifacts"));
        assert_eq!(config.ledger.dir, dir.path().join("deployments"));
    }

    #[test]
    fn default_network_name_is_reserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[networks.default]\nrpc_url = \"http://localhost\"\nenvironment = \"development\"\n",
        )
        .unwrap();

        assert!(matches!(
            load_config(&path, Some("DKG_DEPLOY_TEST_UNSET")),
            Err(ConfigError::ReservedNetwork(_))
        ));
    }

    #[test]
    fn log_settings_from_str() {
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
