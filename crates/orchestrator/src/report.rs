use alloy_primitives::Address;
use dkg_deploy_core_state_machine::Decision;
use dkg_deploy_core_types::{LogicalName, Version};

/// What a run did for one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub name: LogicalName,
    pub version: Option<Version>,
    pub decision: Decision,
    /// Address the logical name is bound to after the step.
    pub address: Option<Address>,
}

/// Summary of a successful run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    /// Forward calls issued, on deployment or because their check failed.
    pub forward_calls: usize,
    /// Modules re-initialized because a dependency was rebound.
    pub reinitialized: Vec<LogicalName>,
    /// Modules whose parameter batch was applied.
    pub seeded: Vec<LogicalName>,
    pub ownership_transferred: bool,
    /// Transactions sent, deployments included.
    pub transactions: usize,
}

impl RunReport {
    pub fn deployed(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.decision.deploys())
    }

    pub fn is_noop(&self) -> bool {
        self.transactions == 0
    }
}
