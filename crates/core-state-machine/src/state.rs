use dkg_deploy_core_types::Version;
use displaydoc::Display;

/// What the Ledger records for a logical name, as far as decisions go.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Installed {
    pub version: Option<Version>,
}

impl Installed {
    pub fn new(version: Option<Version>) -> Self {
        Self { version }
    }
}

/// Deployment state of a logical name relative to the band a step targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum State {
    /// not deployed
    NotDeployed,
    /// deployed in an older band
    DeployedLegacy,
    /// deployed in the target band
    DeployedCurrent,
    /// deployed in a newer band
    DeployedNewer,
}

/// Why a step leaves a deployed module untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum SkipReason {
    /// already at the target band
    AlreadyCurrent,
    /// a newer band is installed
    NewerInstalled,
    /// deployed once and pinned
    Pinned,
}

/// Action the orchestrator takes for one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum Decision {
    /// deploy fresh
    FreshDeploy,
    /// redeploy in place
    RedeployInPlace,
    /// replace and deprecate the previous address
    Replace,
    /// skip: {0}
    Skip(SkipReason),
}

impl Decision {
    /// Whether the decision deploys a new contract.
    pub fn deploys(&self) -> bool {
        !matches!(self, Self::Skip(_))
    }

    /// Whether the decision binds a previously bound logical name to a new address.
    pub fn rebinds(&self) -> bool {
        matches!(self, Self::RedeployInPlace | Self::Replace)
    }
}
