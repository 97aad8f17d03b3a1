use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::{LogicalName, ModuleDescriptor, NameError, UpgradeStrategy, Version};

/// Position of a step in its [`ModuleTable`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepId(usize);

impl StepId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors detected while assembling a [`ModuleTable`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Module `{name}` is declared twice for version {}", display_version(.version))]
    DuplicateStep {
        name: LogicalName,
        version: Option<Version>,
    },

    #[error("Module `{0}` depends on itself")]
    SelfDependency(LogicalName),

    #[error("Module `{name}` is replaced on upgrade but has no valid deprecated name: {source}")]
    DeprecatedName {
        name: LogicalName,
        #[source]
        source: NameError,
    },

    #[error("Module `{0}` is replaced on upgrade but is not registered in the Hub")]
    ReplaceUnregistered(LogicalName),

    #[error("The Hub must be deployed once and must not register in itself")]
    InvalidHubStep,
}

fn display_version(version: &Option<Version>) -> String {
    version.map_or_else(|| "<none>".to_owned(), |v| v.to_string())
}

/// The ordered list of deployment steps for a fleet of modules.
///
/// The same logical name may appear in several steps, as long as each
/// targets a different version (eg. `Staking` v1 and `StakingV2` bound as `Staking`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleTable {
    steps: Vec<ModuleDescriptor>,
}

impl ModuleTable {
    pub fn new(steps: Vec<ModuleDescriptor>) -> Result<Self, TableError> {
        let mut seen = BTreeSet::new();

        for step in &steps {
            let name = &step.logical_name;

            if !seen.insert((name, step.version)) {
                return Err(TableError::DuplicateStep {
                    name: name.clone(),
                    version: step.version,
                });
            }

            if step.dependencies.contains(name) {
                return Err(TableError::SelfDependency(name.clone()));
            }

            if step.strategy == UpgradeStrategy::Replace {
                if !step.registration.registers() {
                    return Err(TableError::ReplaceUnregistered(name.clone()));
                }

                name.deprecated()
                    .map_err(|source| TableError::DeprecatedName {
                        name: name.clone(),
                        source,
                    })?;
            }

            if name.is_hub()
                && (step.strategy != UpgradeStrategy::Once || step.registration.registers())
            {
                return Err(TableError::InvalidHubStep);
            }
        }

        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, id: StepId) -> Option<&ModuleDescriptor> {
        self.steps.get(id.0)
    }

    pub fn steps(&self) -> &[ModuleDescriptor] {
        &self.steps
    }

    /// Steps with their ids, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (StepId, &ModuleDescriptor)> {
        self.steps.iter().enumerate().map(|(i, s)| (StepId(i), s))
    }

    /// Steps bound to the given logical name, in declaration order.
    pub fn steps_for<'a>(
        &'a self,
        name: &'a LogicalName,
    ) -> impl Iterator<Item = (StepId, &'a ModuleDescriptor)> + 'a {
        self.iter().filter(move |(_, s)| s.logical_name == *name)
    }

    /// Every logical name of the table.
    pub fn names(&self) -> BTreeSet<&LogicalName> {
        self.steps.iter().map(|s| &s.logical_name).collect()
    }

    /// Union of the effective dependencies of every step, keyed by logical name.
    pub fn dependency_map(&self) -> BTreeMap<&LogicalName, BTreeSet<LogicalName>> {
        let mut map: BTreeMap<_, BTreeSet<_>> = BTreeMap::new();

        for step in &self.steps {
            map.entry(&step.logical_name)
                .or_default()
                .extend(step.effective_dependencies());
        }

        map
    }
}
