use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use dkg_deploy_config::{Capabilities, CompanionConfig, NetworkConfig};
use dkg_deploy_core_state_machine::{decide, Decision, Installed, Transition};
use dkg_deploy_core_types::{Band, LogicalName, ModuleDescriptor, ModuleTable, StepId, Version};
use dkg_deploy_ledger::Ledger;

use crate::error::OrchestratorError;

/// The network a run targets, as far as the orchestrator is concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    /// Environment section of the parameter table.
    pub environment: String,
    pub capabilities: Capabilities,
    pub companion: Option<CompanionConfig>,
}

impl Network {
    pub fn new(name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: environment.into(),
            capabilities: Capabilities::default(),
            companion: None,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &NetworkConfig) -> Self {
        Self {
            name: name.into(),
            environment: config.environment.clone(),
            capabilities: config.capabilities.clone(),
            companion: config.companion,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_companion(mut self, companion: CompanionConfig) -> Self {
        self.companion = Some(companion);
        self
    }

    /// Whether `step` exists on this network.
    pub fn supports(&self, step: &ModuleDescriptor) -> bool {
        step.requires
            .as_ref()
            .is_none_or(|capability| self.capabilities.grants(capability))
    }
}

/// Which steps of the module table a run covers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    tags: BTreeSet<String>,
}

impl Selection {
    /// Every step of the table.
    pub fn all() -> Self {
        Self::default()
    }

    /// Steps carrying at least one of `tags`.
    pub fn tagged<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, step: &ModuleDescriptor) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|tag| step.has_tag(tag))
    }
}

/// Decision for one step, made from the Ledger alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedStep {
    pub id: StepId,
    pub name: LogicalName,
    pub implementation: String,
    pub version: Option<Version>,
    pub transition: Transition,
}

impl PlannedStep {
    pub fn decision(&self) -> Decision {
        self.transition.decision
    }
}

impl fmt::Display for PlannedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.name)?;

        if self.implementation != self.name.as_str() {
            write!(f, " ({})", self.implementation)?;
        }

        match &self.version {
            Some(version) => write!(f, " v{version}")?,
            None => write!(f, " {}", Band::OLDEST)?,
        }

        write!(
            f,
            ": {}, {}",
            self.transition.state, self.transition.decision
        )
    }
}

/// Ordered per-step decisions of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub steps: Vec<PlannedStep>,
}

impl Plan {
    /// Orders the selected steps and decides each of them against the Ledger,
    /// as updated by the steps before it.
    pub fn build(
        table: &ModuleTable,
        ledger: &Ledger,
        network: &Network,
        selection: &Selection,
    ) -> Result<Self, OrchestratorError> {
        let selected: Vec<StepId> = table
            .iter()
            .filter(|(_, step)| selection.matches(step) && network.supports(step))
            .map(|(id, _)| id)
            .collect();

        let order = dkg_deploy_graph::resolve(table, &selected, |name| ledger.contains(name))?;

        let mut installed: BTreeMap<LogicalName, Installed> = ledger
            .iter()
            .map(|(name, entry)| (name.clone(), Installed::new(entry.version)))
            .collect();

        let steps = order
            .into_iter()
            .filter_map(|id| table.get(id).map(|step| (id, step)))
            .map(|(id, step)| {
                let transition = decide(step, installed.get(&step.logical_name));

                if transition.decision.deploys() {
                    installed.insert(step.logical_name.clone(), Installed::new(step.version));
                }

                PlannedStep {
                    id,
                    name: step.logical_name.clone(),
                    implementation: step.implementation_name.clone(),
                    version: step.version,
                    transition,
                }
            })
            .collect();

        Ok(Self { steps })
    }

    pub fn deployments(&self) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter().filter(|s| s.decision().deploys())
    }

    /// Whether the run deploys nothing.
    pub fn is_noop(&self) -> bool {
        self.deployments().next().is_none()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{step}")?;
        }

        Ok(())
    }
}
