use core::cmp::Ordering;

use dkg_deploy_core_types::{Band, ModuleDescriptor, UpgradeStrategy};

use crate::state::{Decision, Installed, SkipReason, State};
use crate::transition::Transition;

/// Classify a recorded deployment against the band targeted by a step.
///
/// Only the major band is compared: a module recorded at `2.3` is current
/// for a step targeting `2.1`, and also for one targeting `2.5`.
/// A missing recorded version falls into the oldest band.
pub fn classify(step: &ModuleDescriptor, recorded: Option<&Installed>) -> State {
    let Some(installed) = recorded else {
        return State::NotDeployed;
    };

    let target = Band::of(step.version.as_ref());
    let current = Band::of(installed.version.as_ref());

    match current.cmp(&target) {
        Ordering::Less => State::DeployedLegacy,
        Ordering::Equal => State::DeployedCurrent,
        Ordering::Greater => State::DeployedNewer,
    }
}

/// Decide what to do for a step given what the Ledger records for its logical name.
pub fn decide(step: &ModuleDescriptor, recorded: Option<&Installed>) -> Transition {
    let state = classify(step, recorded);

    let decision = match (state, step.strategy) {
        (State::NotDeployed, _) => Decision::FreshDeploy,
        (State::DeployedNewer, _) => Decision::Skip(SkipReason::NewerInstalled),
        (State::DeployedCurrent, _) => Decision::Skip(SkipReason::AlreadyCurrent),
        (State::DeployedLegacy, UpgradeStrategy::Once) => Decision::Skip(SkipReason::Pinned),
        (State::DeployedLegacy, UpgradeStrategy::InPlace) => Decision::RedeployInPlace,
        (State::DeployedLegacy, UpgradeStrategy::Replace) => Decision::Replace,
    };

    Transition::to(state).with_decision(decision)
}
