//! Parameter table file.
//!
//! ```json
//! {
//!   "mainnet": {
//!     "ParametersStorage": {
//!       "default": { "epochLength": "2592000", "releaseEpoch": 42 },
//!       "neuroweb_mainnet": { "releaseEpoch": 50 }
//!     }
//!   }
//! }
//! ```
//!
//! Values of a network section override the `default` section of the same module.
//! Variables keep the order in which the file lists them: setters are called in
//! that order, and an overridden variable keeps its position in `default`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use dkg_deploy_core_types::LogicalName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::ConfigError;

/// Section of a module applying to every network.
pub const DEFAULT_SECTION: &str = "default";

/// Parameters of one module on one network, by variable name, in file order.
pub type Parameters = Map<String, Value>;

type Sections = BTreeMap<String, Parameters>;

/// Initial values of module parameters:
/// environment → module → (`default` | network) → variable → value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTable {
    environments: BTreeMap<String, BTreeMap<LogicalName, Sections>>,
}

impl ParameterTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;

        let table: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
            path: path.to_owned(),
            source,
        })?;

        debug!(path = %path.display(), environments = table.environments.len(), "Loaded parameter table");

        Ok(table)
    }

    /// Sets `variable` of `module` in the given section, eg. for tests.
    pub fn insert(
        &mut self,
        environment: &str,
        module: LogicalName,
        section: &str,
        variable: &str,
        value: Value,
    ) {
        self.environments
            .entry(environment.to_owned())
            .or_default()
            .entry(module)
            .or_default()
            .entry(section.to_owned())
            .or_default()
            .insert(variable.to_owned(), value);
    }

    /// Modules of `environment` with at least one parameter section.
    pub fn modules<'a>(&'a self, environment: &str) -> impl Iterator<Item = &'a LogicalName> + 'a {
        self.environments
            .get(environment)
            .into_iter()
            .flat_map(|modules| modules.keys())
    }

    /// Parameters of `module` on `network`: the `default` section merged with
    /// the network section. Empty when the table has no entry for the module.
    pub fn parameters(&self, environment: &str, module: &LogicalName, network: &str) -> Parameters {
        let Some(sections) = self
            .environments
            .get(environment)
            .and_then(|modules| modules.get(module))
        else {
            return Parameters::new();
        };

        let mut parameters = sections.get(DEFAULT_SECTION).cloned().unwrap_or_default();

        if let Some(overrides) = sections.get(network) {
            for (variable, value) in overrides {
                parameters.insert(variable.clone(), value.clone());
            }
        }

        parameters
    }
}
