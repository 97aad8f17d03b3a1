//! Dependency graph over the logical names of a module table.
//!
//! An edge `A -> B` means `B` must be resolvable before `A` is deployed.
//! Eligibility is keyed on logical names rather than steps, since the same
//! name may be targeted by several steps (eg. `Staking` v1 and v2).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]

use std::collections::{BTreeMap, BTreeSet};

use dkg_deploy_core_types::{LogicalName, ModuleDescriptor, ModuleTable, StepId};
use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Dependency cycle: {}", .path.iter().join(" -> "))]
    Cycle { path: Vec<LogicalName> },

    #[error("Module `{step}` depends on `{missing}`, which is neither deployed nor part of this run")]
    MissingDependency {
        step: LogicalName,
        missing: LogicalName,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

type DependencyMap<'a> = BTreeMap<&'a LogicalName, BTreeSet<LogicalName>>;

/// Check that the logical-name graph of the whole table is acyclic.
///
/// Runs over every step, selected or not, so a cycle is reported before any
/// side effect whatever the selection of the run.
pub fn check_acyclic(table: &ModuleTable) -> Result<(), GraphError> {
    let deps = table.dependency_map();

    let mut marks = BTreeMap::new();
    let mut path = Vec::new();

    for name in deps.keys() {
        visit(name, &deps, &mut marks, &mut path)?;
    }

    Ok(())
}

fn visit<'a>(
    name: &'a LogicalName,
    deps: &'a DependencyMap<'a>,
    marks: &mut BTreeMap<&'a LogicalName, Mark>,
    path: &mut Vec<&'a LogicalName>,
) -> Result<(), GraphError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == name).unwrap_or(0);

            let path = path[start..]
                .iter()
                .copied()
                .chain([name])
                .cloned()
                .collect();

            return Err(GraphError::Cycle { path });
        }
        None => (),
    }

    marks.insert(name, Mark::Visiting);
    path.push(name);

    if let Some(next) = deps.get(name) {
        for dep in next {
            visit(dep, deps, marks, path)?;
        }
    }

    path.pop();
    marks.insert(name, Mark::Done);

    Ok(())
}

/// Compute the processing order of the selected steps.
///
/// Steps are taken in declaration order whenever possible. A step becomes
/// eligible once every one of its effective dependencies is satisfied and
/// every earlier selected step with the same logical name has been ordered.
/// A dependency is satisfied when all selected steps bound to that name are
/// ordered or, if no selected step is bound to it, when `is_recorded` says
/// a previous run deployed it.
pub fn resolve<F>(
    table: &ModuleTable,
    selected: &[StepId],
    is_recorded: F,
) -> Result<Vec<StepId>, GraphError>
where
    F: Fn(&LogicalName) -> bool,
{
    let mut pending: Vec<(StepId, &ModuleDescriptor)> = selected
        .iter()
        .copied()
        .sorted()
        .dedup()
        .filter_map(|id| table.get(id).map(|step| (id, step)))
        .collect();

    let mut remaining: BTreeMap<&LogicalName, usize> = BTreeMap::new();
    for (_, step) in &pending {
        *remaining.entry(&step.logical_name).or_default() += 1;
    }

    let mut order = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let satisfied = |dep: &LogicalName| match remaining.get(dep) {
            Some(count) => *count == 0,
            None => is_recorded(dep),
        };

        let next = pending.iter().enumerate().position(|(i, (_, step))| {
            let first_of_name = pending[..i]
                .iter()
                .all(|(_, earlier)| earlier.logical_name != step.logical_name);

            first_of_name
                && step
                    .effective_dependencies()
                    .iter()
                    .all(|dep| satisfied(dep))
        });

        let Some(index) = next else {
            return Err(blocked(&pending, &remaining, &is_recorded));
        };

        let (id, step) = pending.remove(index);

        if let Some(count) = remaining.get_mut(&step.logical_name) {
            *count -= 1;
        }

        trace!(step = %step.logical_name, %id, "Step is eligible");
        order.push(id);
    }

    Ok(order)
}

/// Explain why none of the pending steps is eligible.
fn blocked<F>(
    pending: &[(StepId, &ModuleDescriptor)],
    remaining: &BTreeMap<&LogicalName, usize>,
    is_recorded: &F,
) -> GraphError
where
    F: Fn(&LogicalName) -> bool,
{
    let missing = pending.iter().find_map(|(_, step)| {
        step.effective_dependencies()
            .into_iter()
            .find(|dep| !remaining.contains_key(dep) && !is_recorded(dep))
            .map(|missing| (step.logical_name.clone(), missing))
    });

    match missing {
        Some((step, missing)) => GraphError::MissingDependency { step, missing },
        None => GraphError::Cycle {
            path: pending
                .iter()
                .map(|(_, step)| step.logical_name.clone())
                .dedup()
                .collect(),
        },
    }
}
